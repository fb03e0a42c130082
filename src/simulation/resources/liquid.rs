//! Liquid containers (barrels, cauldrons, water troughs)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::simulation::error::AllocationError;
use crate::simulation::resources::allocation::{
    AllocationPurpose, AllocationStats, LiquidAllocation,
};
use crate::simulation::types::{EntityId, IdGenerator, LiquidType, TileCoord};

/// Quantities below this are treated as empty
const LIQUID_EPSILON: f32 = 0.0001;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiquidContainer {
    pub id: EntityId,
    pub location: TileCoord,
    pub capacity: f32,
    pub liquid: Option<LiquidType>,
    pub quantity: f32,
    allocations: Vec<LiquidAllocation>,
}

impl LiquidContainer {
    pub fn new(id: EntityId, location: TileCoord, capacity: f32) -> Self {
        LiquidContainer {
            id,
            location,
            capacity,
            liquid: None,
            quantity: 0.0,
            allocations: Vec::new(),
        }
    }

    pub fn allocated_quantity(&self) -> f32 {
        self.allocations.iter().map(|a| a.quantity).sum()
    }

    pub fn unallocated_quantity(&self) -> f32 {
        (self.quantity - self.allocated_quantity()).max(0.0)
    }

    pub fn free_capacity(&self) -> f32 {
        (self.capacity - self.quantity).max(0.0)
    }

    pub fn allocations(&self) -> &[LiquidAllocation] {
        &self.allocations
    }

    fn take_allocation(&mut self, allocation: &LiquidAllocation) -> Option<LiquidAllocation> {
        let pos = self.allocations.iter().position(|a| a.id == allocation.id)?;
        Some(self.allocations.remove(pos))
    }
}

/// All liquid containers in the world
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LiquidRegistry {
    containers: BTreeMap<EntityId, LiquidContainer>,
    pub stats: AllocationStats,
}

impl LiquidRegistry {
    pub fn new() -> Self {
        LiquidRegistry {
            containers: BTreeMap::new(),
            stats: AllocationStats::default(),
        }
    }

    pub fn spawn(&mut self, ids: &mut IdGenerator, location: TileCoord, capacity: f32) -> EntityId {
        let id = ids.next_entity();
        self.containers.insert(id, LiquidContainer::new(id, location, capacity));
        id
    }

    pub fn get(&self, id: EntityId) -> Option<&LiquidContainer> {
        self.containers.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.containers.contains_key(&id)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<LiquidContainer> {
        let container = self.containers.remove(&id)?;
        self.stats.released_total += container.allocated_quantity() as f64;
        Some(container)
    }

    /// Pour liquid in, returns how much fit
    pub fn fill(&mut self, id: EntityId, liquid: LiquidType, amount: f32) -> f32 {
        let Some(container) = self.containers.get_mut(&id) else {
            return 0.0;
        };
        if container.quantity > LIQUID_EPSILON && container.liquid != Some(liquid) {
            return 0.0;
        }
        let added = amount.min(container.free_capacity());
        if added > 0.0 {
            container.liquid = Some(liquid);
            container.quantity += added;
        }
        added
    }

    pub fn unallocated_quantity(&self, id: EntityId) -> f32 {
        self.containers.get(&id).map_or(0.0, |c| c.unallocated_quantity())
    }

    /// Reserve liquid from a container, failing cleanly when there is not enough
    pub fn allocate(
        &mut self,
        ids: &mut IdGenerator,
        container_id: EntityId,
        quantity: f32,
        purpose: AllocationPurpose,
        requester: Option<EntityId>,
    ) -> Result<LiquidAllocation, AllocationError> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(AllocationError::EmptyRequest);
        }
        let container = self
            .containers
            .get_mut(&container_id)
            .ok_or(AllocationError::UnknownResource(container_id))?;
        let Some(liquid) = container.liquid else {
            self.stats.refused += 1;
            return Err(AllocationError::InsufficientLiquid {
                requested: quantity,
                available: 0.0,
            });
        };

        let available = container.unallocated_quantity();
        if quantity > available + LIQUID_EPSILON {
            self.stats.refused += 1;
            return Err(AllocationError::InsufficientLiquid {
                requested: quantity,
                available,
            });
        }

        let allocation = LiquidAllocation {
            id: ids.next_allocation(),
            container: container_id,
            liquid,
            quantity,
            purpose,
            requester,
        };
        container.allocations.push(allocation.clone());
        self.stats.allocated_total += quantity as f64;
        Ok(allocation)
    }

    /// Release a reservation back to its source container. Safe to repeat.
    pub fn cancel(&mut self, allocation: &LiquidAllocation) -> f32 {
        let released = self
            .containers
            .get_mut(&allocation.container)
            .and_then(|c| c.take_allocation(allocation))
            .map_or(0.0, |a| a.quantity);
        self.stats.released_total += released as f64;
        released
    }

    /// Draw the reserved liquid out of its source container
    pub fn consume(&mut self, allocation: &LiquidAllocation) -> f32 {
        let Some(container) = self.containers.get_mut(&allocation.container) else {
            return 0.0;
        };
        let Some(taken) = container.take_allocation(allocation) else {
            return 0.0;
        };
        container.quantity = (container.quantity - taken.quantity).max(0.0);
        if container.quantity <= LIQUID_EPSILON {
            container.quantity = 0.0;
            container.liquid = None;
        }
        self.stats.consumed_total += taken.quantity as f64;
        taken.quantity
    }

    /// Can `target` take `liquid` at all?
    pub fn accepts(&self, target: EntityId, liquid: LiquidType) -> bool {
        self.containers.get(&target).map_or(false, |c| {
            c.free_capacity() > LIQUID_EPSILON
                && (c.quantity <= LIQUID_EPSILON || c.liquid == Some(liquid))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &LiquidContainer> {
        self.containers.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn barrel(amount: f32) -> (LiquidRegistry, IdGenerator, EntityId) {
        let mut ids = IdGenerator::new();
        let mut liquids = LiquidRegistry::new();
        let id = liquids.spawn(&mut ids, TileCoord::new(0, 0), 10.0);
        liquids.fill(id, LiquidType::Water, amount);
        (liquids, ids, id)
    }

    #[test]
    fn test_fill_respects_capacity_and_type() {
        let (mut liquids, _, id) = barrel(8.0);
        assert_eq!(liquids.fill(id, LiquidType::Water, 5.0), 2.0);
        assert_eq!(liquids.fill(id, LiquidType::Beer, 1.0), 0.0);
        assert!(!liquids.accepts(id, LiquidType::Water));
    }

    #[test]
    fn test_allocate_and_cancel() {
        let (mut liquids, mut ids, id) = barrel(6.0);
        let alloc = liquids
            .allocate(&mut ids, id, 4.0, AllocationPurpose::ContentsToBeDumped, None)
            .unwrap();
        assert_eq!(liquids.unallocated_quantity(id), 2.0);
        assert!(liquids
            .allocate(&mut ids, id, 3.0, AllocationPurpose::ContentsToBeDumped, None)
            .is_err());

        assert_eq!(liquids.cancel(&alloc), 4.0);
        assert_eq!(liquids.cancel(&alloc), 0.0);
        assert_eq!(liquids.unallocated_quantity(id), 6.0);
    }

    #[test]
    fn test_empty_container_cannot_be_allocated() {
        let (mut liquids, mut ids, id) = barrel(0.0);
        assert!(matches!(
            liquids.allocate(&mut ids, id, 1.0, AllocationPurpose::DueToBeHauled, None),
            Err(AllocationError::InsufficientLiquid { .. })
        ));
    }

    #[test]
    fn test_consume_empties_container() {
        let (mut liquids, mut ids, id) = barrel(3.0);
        let alloc = liquids
            .allocate(&mut ids, id, 3.0, AllocationPurpose::DueToBeHauled, None)
            .unwrap();
        assert_eq!(liquids.consume(&alloc), 3.0);
        let c = liquids.get(id).unwrap();
        assert_eq!(c.quantity, 0.0);
        assert_eq!(c.liquid, None);
    }

    #[test]
    fn test_allocate_rejects_non_finite_quantity() {
        let (mut liquids, mut ids, id) = barrel(8.0);
        for quantity in [f32::NAN, f32::INFINITY, -1.0, 0.0] {
            assert!(matches!(
                liquids.allocate(&mut ids, id, quantity, AllocationPurpose::DueToBeHauled, None),
                Err(AllocationError::EmptyRequest)
            ));
        }
        assert!(liquids.get(id).unwrap().allocations().is_empty());
        assert_eq!(liquids.unallocated_quantity(id), 8.0);
        assert!(liquids
            .allocate(&mut ids, id, 1.0, AllocationPurpose::DueToBeHauled, None)
            .is_ok());
    }
}
