//! Colony map collaborator
//!
//! The scheduler never pathfinds. It only asks a map whether a tile can be
//! walked on and which connectivity region it belongs to; two tiles sharing a
//! region id are treated as mutually reachable.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::simulation::types::{MaterialType, TileCoord};
use crate::tilemap::Tilemap;

/// Region id given to tiles that cannot be walked on
pub const NO_REGION: u32 = 0;

/// What the scheduler needs from the map
pub trait TileMap {
    fn contains(&self, coord: TileCoord) -> bool;

    fn is_navigable(&self, coord: TileCoord) -> bool;

    /// Connectivity region of a tile, `None` when off the map
    fn region_id(&self, coord: TileCoord) -> Option<u32>;

    fn orthogonal_neighbours(&self, coord: TileCoord) -> Vec<TileCoord> {
        coord
            .orthogonal_neighbours()
            .into_iter()
            .filter(|n| self.contains(*n))
            .collect()
    }

    fn diagonal_neighbours(&self, coord: TileCoord) -> Vec<TileCoord> {
        coord
            .diagonal_neighbours()
            .into_iter()
            .filter(|n| self.contains(*n))
            .collect()
    }

    /// Wall standing on a tile, if any
    fn wall_at(&self, _coord: TileCoord) -> Option<Wall> {
        None
    }
}

/// A wall occupying a tile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wall {
    pub material: MaterialType,
    /// Built by colonists rather than natural rock
    pub constructed: bool,
}

impl Wall {
    pub fn natural(material: MaterialType) -> Self {
        Wall { material, constructed: false }
    }

    pub fn constructed(material: MaterialType) -> Self {
        Wall { material, constructed: true }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct GridTile {
    wall: Option<Wall>,
    region: u32,
}

/// Grid-backed map with flood-filled regions
#[derive(Clone, Debug)]
pub struct GridMap {
    tiles: Tilemap<GridTile>,
    region_count: u32,
}

impl GridMap {
    /// An open map, all tiles navigable and in one region
    pub fn open(width: usize, height: usize) -> Self {
        let mut map = GridMap {
            tiles: Tilemap::new(width, height),
            region_count: 0,
        };
        map.recompute_regions();
        map
    }

    pub fn width(&self) -> usize {
        self.tiles.width
    }

    pub fn height(&self) -> usize {
        self.tiles.height
    }

    pub fn region_count(&self) -> u32 {
        self.region_count
    }

    /// Place or remove a wall; regions are recomputed immediately
    pub fn set_wall(&mut self, coord: TileCoord, wall: Option<Wall>) -> bool {
        let changed = match self.tiles.get_mut(coord) {
            Some(tile) if tile.wall != wall => {
                tile.wall = wall;
                true
            }
            _ => false,
        };
        if changed {
            self.recompute_regions();
        }
        changed
    }

    /// Place many walls with a single region pass
    pub fn set_walls(&mut self, coords: impl IntoIterator<Item = TileCoord>, wall: Wall) {
        for coord in coords {
            if let Some(tile) = self.tiles.get_mut(coord) {
                tile.wall = Some(wall);
            }
        }
        self.recompute_regions();
    }

    /// Flood fill navigable tiles into regions numbered from 1
    pub fn recompute_regions(&mut self) {
        for (_, tile) in self.tiles.iter_mut() {
            tile.region = NO_REGION;
        }

        let mut next_region = NO_REGION;
        let coords: Vec<TileCoord> = self.tiles.iter().map(|(c, _)| c).collect();
        for start in coords {
            let needs_fill = matches!(
                self.tiles.get(start),
                Some(tile) if tile.wall.is_none() && tile.region == NO_REGION
            );
            if !needs_fill {
                continue;
            }

            next_region += 1;
            let mut frontier = VecDeque::new();
            frontier.push_back(start);
            if let Some(tile) = self.tiles.get_mut(start) {
                tile.region = next_region;
            }

            while let Some(current) = frontier.pop_front() {
                for neighbour in self.tiles.neighbors(current) {
                    if let Some(tile) = self.tiles.get_mut(neighbour) {
                        if tile.wall.is_none() && tile.region == NO_REGION {
                            tile.region = next_region;
                            frontier.push_back(neighbour);
                        }
                    }
                }
            }
        }
        self.region_count = next_region;
    }
}

impl TileMap for GridMap {
    fn contains(&self, coord: TileCoord) -> bool {
        self.tiles.in_bounds(coord)
    }

    fn is_navigable(&self, coord: TileCoord) -> bool {
        matches!(self.tiles.get(coord), Some(tile) if tile.wall.is_none())
    }

    fn region_id(&self, coord: TileCoord) -> Option<u32> {
        self.tiles.get(coord).map(|tile| tile.region)
    }

    fn wall_at(&self, coord: TileCoord) -> Option<Wall> {
        self.tiles.get(coord).and_then(|tile| tile.wall)
    }
}
