//! Core types shared by the job scheduler and its collaborators

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of any world entity (worker, item, plant, furniture, stockpile...)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity#{}", self.0)
    }
}

/// Identifier of an item, liquid or hauling allocation
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AllocationId(pub u64);

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Allocation#{}", self.0)
    }
}

/// Monotonic id source owned by a simulation instance.
///
/// Each `World` and `JobSystem` carries its own generator, so two simulations
/// running side by side (or two tests) never share a counter.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        IdGenerator { next: 1 }
    }

    /// Start counting from a specific value (used when restoring a world)
    pub fn starting_at(next: u64) -> Self {
        IdGenerator { next }
    }

    pub fn next_raw(&mut self) -> u64 {
        // 0 is never handed out
        if self.next == 0 {
            self.next = 1;
        }
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn next_entity(&mut self) -> EntityId {
        EntityId(self.next_raw())
    }

    pub fn next_allocation(&mut self) -> AllocationId {
        AllocationId(self.next_raw())
    }

    pub fn reset(&mut self) {
        self.next = 1;
    }
}

/// Grid coordinate on the colony map
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub fn new(x: i32, y: i32) -> Self {
        TileCoord { x, y }
    }

    /// Manhattan distance to another coordinate
    pub fn distance_to(&self, other: &TileCoord) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// Squared euclidean distance, used for ranking
    pub fn distance_squared(&self, other: &TileCoord) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }

    /// North, east, south, west
    pub fn orthogonal_neighbours(&self) -> [TileCoord; 4] {
        [
            TileCoord::new(self.x, self.y + 1),
            TileCoord::new(self.x + 1, self.y),
            TileCoord::new(self.x, self.y - 1),
            TileCoord::new(self.x - 1, self.y),
        ]
    }

    pub fn diagonal_neighbours(&self) -> [TileCoord; 4] {
        [
            TileCoord::new(self.x + 1, self.y + 1),
            TileCoord::new(self.x + 1, self.y - 1),
            TileCoord::new(self.x - 1, self.y - 1),
            TileCoord::new(self.x - 1, self.y + 1),
        ]
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Broad material family, drives which profession works with a resource
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialType {
    Stone,
    Wood,
    Metal,
    Food,
    Liquid,
}

impl MaterialType {
    pub fn name(&self) -> &'static str {
        match self {
            MaterialType::Stone => "Stone",
            MaterialType::Wood => "Wood",
            MaterialType::Metal => "Metal",
            MaterialType::Food => "Food",
            MaterialType::Liquid => "Liquid",
        }
    }
}

/// Item types that can exist on the map and be hauled
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Boulder,
    StoneBlock,
    Logs,
    Planks,
    Ore,
    MetalBar,
    Vegetable,
    Seeds,
    Meal,
}

impl ResourceType {
    pub fn all() -> &'static [ResourceType] {
        &[
            ResourceType::Boulder,
            ResourceType::StoneBlock,
            ResourceType::Logs,
            ResourceType::Planks,
            ResourceType::Ore,
            ResourceType::MetalBar,
            ResourceType::Vegetable,
            ResourceType::Seeds,
            ResourceType::Meal,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResourceType::Boulder => "Boulder",
            ResourceType::StoneBlock => "Stone Block",
            ResourceType::Logs => "Logs",
            ResourceType::Planks => "Planks",
            ResourceType::Ore => "Ore",
            ResourceType::MetalBar => "Metal Bar",
            ResourceType::Vegetable => "Vegetable",
            ResourceType::Seeds => "Seeds",
            ResourceType::Meal => "Meal",
        }
    }

    pub fn material_type(&self) -> MaterialType {
        match self {
            ResourceType::Boulder | ResourceType::StoneBlock => MaterialType::Stone,
            ResourceType::Logs | ResourceType::Planks => MaterialType::Wood,
            ResourceType::Ore | ResourceType::MetalBar => MaterialType::Metal,
            ResourceType::Vegetable | ResourceType::Seeds | ResourceType::Meal => {
                MaterialType::Food
            }
        }
    }

    /// Resource left behind when something built from this material is torn down
    pub fn salvage_of(material: MaterialType) -> Option<ResourceType> {
        match material {
            MaterialType::Stone => Some(ResourceType::StoneBlock),
            MaterialType::Wood => Some(ResourceType::Planks),
            MaterialType::Metal => Some(ResourceType::MetalBar),
            MaterialType::Food | MaterialType::Liquid => None,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Liquids held in containers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiquidType {
    Water,
    Soup,
    Beer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generator_is_monotonic() {
        let mut ids = IdGenerator::new();
        let a = ids.next_raw();
        let b = ids.next_entity();
        let c = ids.next_allocation();
        assert!(a < b.0);
        assert!(b.0 < c.0);
    }

    #[test]
    fn test_id_generators_are_independent() {
        let mut first = IdGenerator::new();
        let mut second = IdGenerator::new();
        first.next_raw();
        first.next_raw();
        assert_eq!(second.next_raw(), 1);

        first.reset();
        assert_eq!(first.next_raw(), 1);
    }

    #[test]
    fn test_default_generator_never_hands_out_zero() {
        let mut ids = IdGenerator::default();
        assert_eq!(ids.next_raw(), 1);
    }

    #[test]
    fn test_distances() {
        let a = TileCoord::new(0, 0);
        let b = TileCoord::new(3, 4);
        assert_eq!(a.distance_squared(&b), 25);
        assert_eq!(a.distance_to(&b), 7);
    }

    #[test]
    fn test_orthogonal_neighbours() {
        let n = TileCoord::new(2, 2).orthogonal_neighbours();
        assert!(n.contains(&TileCoord::new(2, 3)));
        assert!(n.contains(&TileCoord::new(1, 2)));
        assert!(!n.contains(&TileCoord::new(3, 3)));
    }
}
