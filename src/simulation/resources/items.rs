//! Item stacks lying in the world and the reservations held against them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::simulation::error::AllocationError;
use crate::simulation::resources::allocation::{AllocationPurpose, AllocationStats, ItemAllocation};
use crate::simulation::types::{EntityId, IdGenerator, ResourceType, TileCoord};

/// A stack of one resource type
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: EntityId,
    pub resource_type: ResourceType,
    pub quantity: u32,
    pub location: TileCoord,
    /// Live reservations, the single record of what is spoken for
    allocations: Vec<ItemAllocation>,
}

impl Item {
    pub fn new(
        id: EntityId,
        resource_type: ResourceType,
        quantity: u32,
        location: TileCoord,
    ) -> Self {
        Item {
            id,
            resource_type,
            quantity,
            location,
            allocations: Vec::new(),
        }
    }

    pub fn allocated_quantity(&self) -> u32 {
        self.allocations.iter().map(|a| a.quantity).sum()
    }

    pub fn unallocated_quantity(&self) -> u32 {
        self.quantity.saturating_sub(self.allocated_quantity())
    }

    pub fn allocations(&self) -> &[ItemAllocation] {
        &self.allocations
    }

    fn take_allocation(&mut self, allocation: &ItemAllocation) -> Option<ItemAllocation> {
        let pos = self.allocations.iter().position(|a| a.id == allocation.id)?;
        Some(self.allocations.remove(pos))
    }
}

/// All item stacks in the world
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ItemRegistry {
    items: BTreeMap<EntityId, Item>,
    pub stats: AllocationStats,
}

impl ItemRegistry {
    pub fn new() -> Self {
        ItemRegistry {
            items: BTreeMap::new(),
            stats: AllocationStats::default(),
        }
    }

    /// Create a new stack on the map
    pub fn spawn(
        &mut self,
        ids: &mut IdGenerator,
        resource_type: ResourceType,
        quantity: u32,
        location: TileCoord,
    ) -> EntityId {
        let id = ids.next_entity();
        self.items.insert(id, Item::new(id, resource_type, quantity, location));
        id
    }

    pub fn get(&self, id: EntityId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.items.contains_key(&id)
    }

    /// Move a stack; its reservations travel with it
    pub fn relocate(&mut self, id: EntityId, location: TileCoord) -> bool {
        match self.items.get_mut(&id) {
            Some(item) => {
                item.location = location;
                true
            }
            None => false,
        }
    }

    /// Destroy a stack, returning it with any reservations it still carried
    pub fn remove(&mut self, id: EntityId) -> Option<Item> {
        let item = self.items.remove(&id)?;
        self.stats.released_total += item.allocated_quantity() as f64;
        Some(item)
    }

    pub fn items_at(&self, location: TileCoord) -> impl Iterator<Item = &Item> {
        self.items.values().filter(move |i| i.location == location)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn unallocated_quantity(&self, id: EntityId) -> u32 {
        self.items.get(&id).map_or(0, |i| i.unallocated_quantity())
    }

    /// Reserve `quantity` of a stack.
    ///
    /// Fails without touching the stack when less than `quantity` is unallocated.
    pub fn allocate(
        &mut self,
        ids: &mut IdGenerator,
        item_id: EntityId,
        quantity: u32,
        purpose: AllocationPurpose,
        requester: Option<EntityId>,
    ) -> Result<ItemAllocation, AllocationError> {
        if quantity == 0 {
            return Err(AllocationError::EmptyRequest);
        }
        let item = self
            .items
            .get_mut(&item_id)
            .ok_or(AllocationError::UnknownResource(item_id))?;

        let available = item.unallocated_quantity();
        if quantity > available {
            self.stats.refused += 1;
            return Err(AllocationError::Insufficient {
                requested: quantity,
                available,
            });
        }

        let allocation = ItemAllocation {
            id: ids.next_allocation(),
            item: item_id,
            resource_type: item.resource_type,
            quantity,
            purpose,
            requester,
        };
        item.allocations.push(allocation.clone());
        self.stats.allocated_total += quantity as f64;
        Ok(allocation)
    }

    /// Return a reservation to the unallocated pool.
    ///
    /// Returns the quantity released; cancelling twice releases nothing the second time.
    pub fn cancel(&mut self, allocation: &ItemAllocation) -> u32 {
        let released = self
            .items
            .get_mut(&allocation.item)
            .and_then(|item| item.take_allocation(allocation))
            .map_or(0, |a| a.quantity);
        self.stats.released_total += released as f64;
        released
    }

    /// Use up a reservation: the reserved quantity leaves the stack.
    ///
    /// Empty stacks are removed. Returns the consumed quantity, 0 if the
    /// reservation was no longer live.
    pub fn consume(&mut self, allocation: &ItemAllocation) -> u32 {
        let Some(item) = self.items.get_mut(&allocation.item) else {
            return 0;
        };
        let Some(taken) = item.take_allocation(allocation) else {
            return 0;
        };
        item.quantity = item.quantity.saturating_sub(taken.quantity);
        let now_empty = item.quantity == 0;
        if now_empty {
            self.items.remove(&allocation.item);
        }
        self.stats.consumed_total += taken.quantity as f64;
        taken.quantity
    }

    /// Remove unreserved quantity from a stack directly (e.g. eaten, burnt)
    pub fn take_unallocated(&mut self, id: EntityId, quantity: u32) -> u32 {
        let Some(item) = self.items.get_mut(&id) else {
            return 0;
        };
        let taken = quantity.min(item.unallocated_quantity());
        item.quantity -= taken;
        if item.quantity == 0 {
            self.items.remove(&id);
        }
        taken
    }

    /// Is a reservation still live?
    pub fn is_active(&self, allocation: &ItemAllocation) -> bool {
        self.items
            .get(&allocation.item)
            .map_or(false, |i| i.allocations.iter().any(|a| a.id == allocation.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(quantity: u32) -> (ItemRegistry, IdGenerator, EntityId) {
        let mut ids = IdGenerator::new();
        let mut items = ItemRegistry::new();
        let id = items.spawn(&mut ids, ResourceType::Logs, quantity, TileCoord::new(1, 1));
        (items, ids, id)
    }

    #[test]
    fn test_allocate_reduces_unallocated() {
        let (mut items, mut ids, id) = registry_with(5);
        let alloc = items
            .allocate(&mut ids, id, 3, AllocationPurpose::DueToBeHauled, None)
            .unwrap();
        assert_eq!(alloc.quantity, 3);
        assert_eq!(items.unallocated_quantity(id), 2);
        assert_eq!(items.get(id).unwrap().quantity, 5);
    }

    #[test]
    fn test_over_allocation_is_refused() {
        let (mut items, mut ids, id) = registry_with(3);
        let result = items.allocate(&mut ids, id, 5, AllocationPurpose::DueToBeHauled, None);
        assert_eq!(
            result,
            Err(AllocationError::Insufficient { requested: 5, available: 3 })
        );
        assert_eq!(items.unallocated_quantity(id), 3);
        assert_eq!(items.stats.refused, 1);
        assert_eq!(items.stats.allocated_total, 0.0);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let (mut items, mut ids, id) = registry_with(4);
        let alloc = items
            .allocate(&mut ids, id, 4, AllocationPurpose::DueToBeHauled, None)
            .unwrap();
        assert_eq!(items.cancel(&alloc), 4);
        assert_eq!(items.cancel(&alloc), 0);
        assert_eq!(items.unallocated_quantity(id), 4);
        assert_eq!(items.stats.released_total, 4.0);
        assert!(!items.is_active(&alloc));
    }

    #[test]
    fn test_consume_removes_empty_stack() {
        let (mut items, mut ids, id) = registry_with(2);
        let alloc = items
            .allocate(&mut ids, id, 2, AllocationPurpose::DueToBeConsumed, None)
            .unwrap();
        assert_eq!(items.consume(&alloc), 2);
        assert!(!items.contains(id));
        assert_eq!(items.consume(&alloc), 0);
        assert_eq!(items.stats.active(), 0.0);
    }

    #[test]
    fn test_take_unallocated_respects_reservations() {
        let (mut items, mut ids, id) = registry_with(5);
        items
            .allocate(&mut ids, id, 4, AllocationPurpose::HeldInInventory, None)
            .unwrap();
        assert_eq!(items.take_unallocated(id, 3), 1);
        assert_eq!(items.get(id).unwrap().quantity, 4);
        assert_eq!(items.unallocated_quantity(id), 0);
    }

    #[test]
    fn test_conservation_over_mixed_operations() {
        let (mut items, mut ids, id) = registry_with(10);
        let a = items.allocate(&mut ids, id, 3, AllocationPurpose::DueToBeHauled, None).unwrap();
        let b = items.allocate(&mut ids, id, 4, AllocationPurpose::DueToBeHauled, None).unwrap();
        assert!(items.allocate(&mut ids, id, 4, AllocationPurpose::DueToBeHauled, None).is_err());
        items.cancel(&a);
        items.consume(&b);
        items.cancel(&a);

        let item = items.get(id).unwrap();
        assert!(item.allocated_quantity() <= item.quantity);
        assert_eq!(items.stats.allocated_total, 7.0);
        let stats = &items.stats;
        assert_eq!(stats.released_total + stats.consumed_total + stats.active(), 7.0);
        assert_eq!(item.quantity, 6);
    }
}
