use crate::simulation::types::TileCoord;

/// A bounded 2D tilemap grid. Coordinates outside the grid have no cell.
#[derive(Clone, Debug)]
pub struct Tilemap<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Tilemap<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }
}

impl<T: Clone> Tilemap<T> {
    pub fn new_with(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    fn index(&self, coord: TileCoord) -> Option<usize> {
        if coord.x < 0 || coord.y < 0 {
            return None;
        }
        let (x, y) = (coord.x as usize, coord.y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y * self.width + x)
    }

    pub fn in_bounds(&self, coord: TileCoord) -> bool {
        self.index(coord).is_some()
    }

    pub fn get(&self, coord: TileCoord) -> Option<&T> {
        self.index(coord).map(|idx| &self.data[idx])
    }

    pub fn get_mut(&mut self, coord: TileCoord) -> Option<&mut T> {
        match self.index(coord) {
            Some(idx) => Some(&mut self.data[idx]),
            None => None,
        }
    }

    /// Set a cell, returns false if the coordinate is off the map
    pub fn set(&mut self, coord: TileCoord, value: T) -> bool {
        match self.index(coord) {
            Some(idx) => {
                self.data[idx] = value;
                true
            }
            None => false,
        }
    }

    /// Fill the entire map with a value.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// In-bounds 4-connected neighbors (north, east, south, west).
    pub fn neighbors(&self, coord: TileCoord) -> Vec<TileCoord> {
        coord
            .orthogonal_neighbours()
            .into_iter()
            .filter(|n| self.in_bounds(*n))
            .collect()
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (TileCoord, &T)> {
        let width = self.width;
        self.data.iter().enumerate().map(move |(idx, val)| {
            let x = (idx % width) as i32;
            let y = (idx / width) as i32;
            (TileCoord::new(x, y), val)
        })
    }

    /// Iterate mutably over all cells with their coordinates.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TileCoord, &mut T)> {
        let width = self.width;
        self.data.iter_mut().enumerate().map(move |(idx, val)| {
            let x = (idx % width) as i32;
            let y = (idx / width) as i32;
            (TileCoord::new(x, y), val)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_has_no_cell() {
        let map: Tilemap<u8> = Tilemap::new(4, 3);
        assert!(map.get(TileCoord::new(3, 2)).is_some());
        assert!(map.get(TileCoord::new(4, 0)).is_none());
        assert!(map.get(TileCoord::new(-1, 0)).is_none());
    }

    #[test]
    fn test_corner_neighbors() {
        let map: Tilemap<u8> = Tilemap::new(4, 4);
        let n = map.neighbors(TileCoord::new(0, 0));
        assert_eq!(n.len(), 2);
    }

    #[test]
    fn test_set_and_iter() {
        let mut map = Tilemap::new_with(2, 2, 0u8);
        assert!(map.set(TileCoord::new(1, 1), 7));
        assert!(!map.set(TileCoord::new(2, 1), 7));
        let sevens: Vec<_> = map.iter().filter(|(_, v)| **v == 7).map(|(c, _)| c).collect();
        assert_eq!(sevens, vec![TileCoord::new(1, 1)]);
    }
}
