//! Allocation primitives
//!
//! An allocation reserves part of a resource's quantity for one purpose so
//! that no two jobs can plan around the same logs, boulder or bucket of water.
//! The records here are handles; the registries that own the resources hold
//! the authoritative list of what is still reserved.

use serde::{Deserialize, Serialize};

use crate::simulation::types::{AllocationId, EntityId, LiquidType, ResourceType, TileCoord};

/// Why a quantity is reserved
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocationPurpose {
    DueToBeHauled,
    HeldInInventory,
    ContentsToBeDumped,
    UsedInCrafting,
    DueToBeConsumed,
}

/// A reservation of part of an item stack
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemAllocation {
    pub id: AllocationId,
    pub item: EntityId,
    pub resource_type: ResourceType,
    pub quantity: u32,
    pub purpose: AllocationPurpose,
    /// Entity that asked for the reservation
    pub requester: Option<EntityId>,
}

/// A reservation of part of a liquid container's contents
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiquidAllocation {
    pub id: AllocationId,
    /// Container the liquid is drawn from
    pub container: EntityId,
    pub liquid: LiquidType,
    pub quantity: f32,
    pub purpose: AllocationPurpose,
    pub requester: Option<EntityId>,
}

/// Kind of place a hauling job delivers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HaulingTargetType {
    /// Drop on an open tile
    Floor,
    /// Into a piece of furniture such as a crafting station
    Furniture,
    /// Into a room stockpile
    Room,
    /// To a construction site
    Construction,
    /// Into a zone, e.g. dumping liquid into a river
    Zone,
}

/// A planned move of a resource from a source to a target
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HaulingAllocation {
    pub id: AllocationId,
    pub source_position: TileCoord,
    /// Container the resource is taken out of, if not lying loose
    pub source_container: Option<EntityId>,
    pub target_position: TileCoord,
    pub target_id: Option<EntityId>,
    pub target_type: HaulingTargetType,
    pub item_allocation: Option<ItemAllocation>,
    pub liquid_allocation: Option<LiquidAllocation>,
}

impl HaulingAllocation {
    /// Resource type being moved, when it is an item
    pub fn resource_type(&self) -> Option<ResourceType> {
        self.item_allocation.as_ref().map(|a| a.resource_type)
    }

    pub fn item_quantity(&self) -> u32 {
        self.item_allocation.as_ref().map_or(0, |a| a.quantity)
    }
}

/// Something a hauling allocation can deliver into.
///
/// Targets keep pending-delivery bookkeeping keyed by hauling allocation id,
/// so repeated notifications for the same allocation are harmless.
pub trait AllocationTarget {
    /// Can this target still take the resource?
    fn can_accept(&self, resource: ResourceType) -> bool;

    fn allocation_created(&mut self, hauling: &HaulingAllocation);

    fn allocation_cancelled(&mut self, hauling: &HaulingAllocation);

    /// The hauled resource arrived
    fn delivered(&mut self, hauling: &HaulingAllocation);

    /// Quantity currently on its way
    fn pending_quantity(&self) -> u32;
}

/// Running totals kept by a resource registry.
///
/// `allocated_total == released_total + consumed_total + active` holds at all
/// times.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationStats {
    /// Quantity ever reserved
    pub allocated_total: f64,
    /// Quantity returned to the unallocated pool by cancellation
    pub released_total: f64,
    /// Quantity used up by completed jobs
    pub consumed_total: f64,
    /// Allocation attempts refused for lack of quantity
    pub refused: u64,
}

impl AllocationStats {
    pub fn active(&self) -> f64 {
        self.allocated_total - self.released_total - self.consumed_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hauling_resource_type() {
        let hauling = HaulingAllocation {
            id: AllocationId(1),
            source_position: TileCoord::new(0, 0),
            source_container: None,
            target_position: TileCoord::new(1, 1),
            target_id: None,
            target_type: HaulingTargetType::Floor,
            item_allocation: Some(ItemAllocation {
                id: AllocationId(2),
                item: EntityId(3),
                resource_type: ResourceType::Logs,
                quantity: 4,
                purpose: AllocationPurpose::DueToBeHauled,
                requester: None,
            }),
            liquid_allocation: None,
        };
        assert_eq!(hauling.resource_type(), Some(ResourceType::Logs));
        assert_eq!(hauling.item_quantity(), 4);
    }

    #[test]
    fn test_stats_active() {
        let stats = AllocationStats {
            allocated_total: 10.0,
            released_total: 3.0,
            consumed_total: 2.0,
            refused: 0,
        };
        assert_eq!(stats.active(), 5.0);
    }
}
