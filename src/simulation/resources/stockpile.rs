//! Room stockpiles - hauling destinations for loose resources

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::simulation::resources::allocation::{AllocationTarget, HaulingAllocation};
use crate::simulation::types::{AllocationId, EntityId, ResourceType, TileCoord};

/// Resource storage area made of floor tiles
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Stockpile {
    pub id: EntityId,
    pub tiles: Vec<TileCoord>,
    /// Resource types the player allows here
    accepted: HashSet<ResourceType>,
    /// Maximum units stored per tile
    pub capacity_per_tile: u32,
    /// Current resource amounts
    stored: HashMap<ResourceType, u32>,
    /// In-flight deliveries by hauling allocation
    pending: BTreeMap<AllocationId, (ResourceType, u32)>,
}

impl Stockpile {
    pub fn new(id: EntityId, tiles: Vec<TileCoord>, capacity_per_tile: u32) -> Self {
        Stockpile {
            id,
            tiles,
            accepted: HashSet::new(),
            capacity_per_tile,
            stored: HashMap::new(),
            pending: BTreeMap::new(),
        }
    }

    /// Allow a resource type to be stored here
    pub fn accept(&mut self, resource: ResourceType) {
        self.accepted.insert(resource);
    }

    /// Stop accepting a resource type; existing hauls should be revalidated
    pub fn refuse(&mut self, resource: ResourceType) {
        self.accepted.remove(&resource);
    }

    pub fn accepts(&self, resource: ResourceType) -> bool {
        self.accepted.contains(&resource)
    }

    /// Get current amount of a resource
    pub fn get(&self, resource: ResourceType) -> u32 {
        self.stored.get(&resource).copied().unwrap_or(0)
    }

    pub fn total_capacity(&self) -> u32 {
        self.tiles.len() as u32 * self.capacity_per_tile
    }

    pub fn total_stored(&self) -> u32 {
        self.stored.values().sum()
    }

    /// Capacity left once stored and in-flight resources are counted
    pub fn free_capacity(&self) -> u32 {
        self.total_capacity()
            .saturating_sub(self.total_stored())
            .saturating_sub(self.pending_quantity())
    }

    /// Tile to drop the next delivery on
    pub fn drop_tile(&self) -> Option<TileCoord> {
        if self.tiles.is_empty() {
            return None;
        }
        let idx = (self.total_stored() + self.pending_quantity()) / self.capacity_per_tile.max(1);
        Some(self.tiles[(idx as usize).min(self.tiles.len() - 1)])
    }

    /// Remove resources, returns actual amount removed
    pub fn remove(&mut self, resource: ResourceType, amount: u32) -> u32 {
        let current = self.get(resource);
        let to_remove = amount.min(current);
        let new_amount = current - to_remove;
        if new_amount > 0 {
            self.stored.insert(resource, new_amount);
        } else {
            self.stored.remove(&resource);
        }
        to_remove
    }

    /// In-flight hauls still heading here
    pub fn pending_allocations(&self) -> impl Iterator<Item = &AllocationId> {
        self.pending.keys()
    }
}

impl AllocationTarget for Stockpile {
    fn can_accept(&self, resource: ResourceType) -> bool {
        self.accepts(resource) && self.free_capacity() > 0
    }

    fn allocation_created(&mut self, hauling: &HaulingAllocation) {
        if let Some(resource) = hauling.resource_type() {
            self.pending.insert(hauling.id, (resource, hauling.item_quantity()));
        }
    }

    fn allocation_cancelled(&mut self, hauling: &HaulingAllocation) {
        self.pending.remove(&hauling.id);
    }

    fn delivered(&mut self, hauling: &HaulingAllocation) {
        if let Some((resource, quantity)) = self.pending.remove(&hauling.id) {
            *self.stored.entry(resource).or_insert(0) += quantity;
        }
    }

    fn pending_quantity(&self) -> u32 {
        self.pending.values().map(|(_, q)| q).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::resources::allocation::{
        AllocationPurpose, HaulingTargetType, ItemAllocation,
    };

    fn hauling(id: u64, quantity: u32) -> HaulingAllocation {
        HaulingAllocation {
            id: AllocationId(id),
            source_position: TileCoord::new(0, 0),
            source_container: None,
            target_position: TileCoord::new(5, 5),
            target_id: Some(EntityId(1)),
            target_type: HaulingTargetType::Room,
            item_allocation: Some(ItemAllocation {
                id: AllocationId(id + 100),
                item: EntityId(9),
                resource_type: ResourceType::Logs,
                quantity,
                purpose: AllocationPurpose::DueToBeHauled,
                requester: None,
            }),
            liquid_allocation: None,
        }
    }

    fn stockpile() -> Stockpile {
        let mut s =
            Stockpile::new(EntityId(1), vec![TileCoord::new(5, 5), TileCoord::new(6, 5)], 5);
        s.accept(ResourceType::Logs);
        s
    }

    #[test]
    fn test_pending_counts_against_capacity() {
        let mut s = stockpile();
        assert_eq!(s.free_capacity(), 10);
        s.allocation_created(&hauling(1, 4));
        assert_eq!(s.pending_quantity(), 4);
        assert_eq!(s.free_capacity(), 6);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut s = stockpile();
        let h = hauling(1, 4);
        s.allocation_created(&h);
        s.allocation_cancelled(&h);
        s.allocation_cancelled(&h);
        assert_eq!(s.pending_quantity(), 0);
        assert_eq!(s.free_capacity(), 10);
    }

    #[test]
    fn test_delivery_moves_pending_to_stored() {
        let mut s = stockpile();
        let h = hauling(1, 4);
        s.allocation_created(&h);
        s.delivered(&h);
        s.delivered(&h);
        assert_eq!(s.get(ResourceType::Logs), 4);
        assert_eq!(s.pending_quantity(), 0);
        assert_eq!(s.remove(ResourceType::Logs, 10), 4);
    }

    #[test]
    fn test_refused_resource_is_not_accepted() {
        let mut s = stockpile();
        assert!(s.can_accept(ResourceType::Logs));
        s.refuse(ResourceType::Logs);
        assert!(!s.can_accept(ResourceType::Logs));
        assert!(!s.can_accept(ResourceType::Ore));
    }
}
