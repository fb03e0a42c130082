//! The colony world the scheduler works against
//!
//! `World` bundles the map, the resource registries and every entity a job
//! can target (stockpiles, crafting stations, construction sites, plants).
//! Hauling allocations are planned, cancelled and completed here so that the
//! source reservation and the target's pending-delivery bookkeeping always
//! move together.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::simulation::error::AllocationError;
use crate::simulation::map::GridMap;
use crate::simulation::resources::allocation::{
    AllocationPurpose, AllocationTarget, HaulingAllocation, HaulingTargetType,
};
use crate::simulation::resources::{ItemRegistry, LiquidRegistry, Stockpile};
use crate::simulation::structures::{Construction, StructureType};
use crate::simulation::types::{EntityId, IdGenerator, ResourceType, TileCoord};
use crate::simulation::workplaces::{CraftingStation, WorkplaceType};

/// What grows on a plant tile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlantKind {
    /// Felled rather than harvested
    Tree,
    /// Harvested for the given resource
    Crop(ResourceType),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    pub id: EntityId,
    pub location: TileCoord,
    pub kind: PlantKind,
    /// Units produced when harvested
    pub yield_quantity: u32,
}

/// Where a hauled resource is going
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HaulingDestination {
    pub target_type: HaulingTargetType,
    pub target_id: Option<EntityId>,
    pub position: TileCoord,
}

impl HaulingDestination {
    /// Drop on an open tile
    pub fn floor(position: TileCoord) -> Self {
        HaulingDestination {
            target_type: HaulingTargetType::Floor,
            target_id: None,
            position,
        }
    }

    /// Pour out into a zone (river, drain)
    pub fn zone(position: TileCoord) -> Self {
        HaulingDestination {
            target_type: HaulingTargetType::Zone,
            target_id: None,
            position,
        }
    }
}

/// Everything jobs act upon
#[derive(Clone, Debug)]
pub struct World {
    pub map: GridMap,
    pub items: ItemRegistry,
    pub liquids: LiquidRegistry,
    pub stockpiles: BTreeMap<EntityId, Stockpile>,
    pub stations: BTreeMap<EntityId, CraftingStation>,
    pub constructions: BTreeMap<EntityId, Construction>,
    pub plants: BTreeMap<EntityId, Plant>,
    /// Entity and allocation ids
    pub ids: IdGenerator,
}

impl World {
    pub fn new(map: GridMap) -> Self {
        World {
            map,
            items: ItemRegistry::new(),
            liquids: LiquidRegistry::new(),
            stockpiles: BTreeMap::new(),
            stations: BTreeMap::new(),
            constructions: BTreeMap::new(),
            plants: BTreeMap::new(),
            ids: IdGenerator::new(),
        }
    }

    pub fn spawn_item(
        &mut self,
        resource: ResourceType,
        quantity: u32,
        location: TileCoord,
    ) -> EntityId {
        self.items.spawn(&mut self.ids, resource, quantity, location)
    }

    pub fn add_liquid_container(&mut self, location: TileCoord, capacity: f32) -> EntityId {
        self.liquids.spawn(&mut self.ids, location, capacity)
    }

    pub fn add_stockpile(
        &mut self,
        tiles: Vec<TileCoord>,
        capacity_per_tile: u32,
        accepts: &[ResourceType],
    ) -> EntityId {
        let id = self.ids.next_entity();
        let mut stockpile = Stockpile::new(id, tiles, capacity_per_tile);
        for &resource in accepts {
            stockpile.accept(resource);
        }
        self.stockpiles.insert(id, stockpile);
        id
    }

    pub fn add_station(&mut self, workplace_type: WorkplaceType, location: TileCoord) -> EntityId {
        let id = self.ids.next_entity();
        self.stations.insert(id, CraftingStation::new(id, workplace_type, location));
        id
    }

    pub fn add_construction(
        &mut self,
        structure_type: StructureType,
        location: TileCoord,
        resource: ResourceType,
    ) -> EntityId {
        let id = self.ids.next_entity();
        self.constructions.insert(id, Construction::new(id, structure_type, location, resource));
        id
    }

    pub fn add_plant(
        &mut self,
        kind: PlantKind,
        location: TileCoord,
        yield_quantity: u32,
    ) -> EntityId {
        let id = self.ids.next_entity();
        self.plants.insert(id, Plant { id, location, kind, yield_quantity });
        id
    }

    /// Where an entity currently is
    pub fn entity_location(&self, id: EntityId) -> Option<TileCoord> {
        if let Some(item) = self.items.get(id) {
            return Some(item.location);
        }
        if let Some(container) = self.liquids.get(id) {
            return Some(container.location);
        }
        self.stations
            .get(&id)
            .map(|s| s.location)
            .or_else(|| self.constructions.get(&id).map(|c| c.location))
            .or_else(|| self.plants.get(&id).map(|p| p.location))
            .or_else(|| self.stockpiles.get(&id).and_then(|s| s.tiles.first().copied()))
    }

    pub fn entity_exists(&self, id: EntityId) -> bool {
        self.items.contains(id)
            || self.liquids.contains(id)
            || self.stockpiles.contains_key(&id)
            || self.stations.contains_key(&id)
            || self.constructions.contains_key(&id)
            || self.plants.contains_key(&id)
    }

    /// Remove an entity of any kind. Outstanding reservations on it are dropped
    /// with it and counted as released.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        self.items.remove(id).is_some()
            || self.liquids.remove(id).is_some()
            || self.stockpiles.remove(&id).is_some()
            || self.stations.remove(&id).is_some()
            || self.constructions.remove(&id).is_some()
            || self.plants.remove(&id).is_some()
    }

    /// Destination for delivering into a container entity
    pub fn destination_for(
        &self,
        target_type: HaulingTargetType,
        id: EntityId,
    ) -> Option<HaulingDestination> {
        let position = match target_type {
            HaulingTargetType::Room => self.stockpiles.get(&id)?.drop_tile()?,
            HaulingTargetType::Furniture => self
                .stations
                .get(&id)
                .map(|s| s.location)
                .or_else(|| self.liquids.get(id).map(|c| c.location))?,
            HaulingTargetType::Construction => self.constructions.get(&id)?.location,
            HaulingTargetType::Floor | HaulingTargetType::Zone => return None,
        };
        Some(HaulingDestination {
            target_type,
            target_id: Some(id),
            position,
        })
    }

    /// Nearest stockpile still able to take `resource`
    pub fn find_stockpile_for(&self, resource: ResourceType, near: TileCoord) -> Option<EntityId> {
        self.stockpiles
            .values()
            .filter(|s| s.can_accept(resource))
            .filter_map(|s| s.drop_tile().map(|tile| (tile.distance_squared(&near), s.id)))
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, id)| id)
    }

    /// The container-specific hauling target, if the target type has one
    pub fn allocation_target(
        &self,
        target_type: HaulingTargetType,
        id: EntityId,
    ) -> Option<&dyn AllocationTarget> {
        match target_type {
            HaulingTargetType::Room => {
                self.stockpiles.get(&id).map(|s| s as &dyn AllocationTarget)
            }
            HaulingTargetType::Furniture => {
                self.stations.get(&id).map(|s| s as &dyn AllocationTarget)
            }
            HaulingTargetType::Construction => {
                self.constructions.get(&id).map(|c| c as &dyn AllocationTarget)
            }
            HaulingTargetType::Floor | HaulingTargetType::Zone => None,
        }
    }

    pub fn allocation_target_mut(
        &mut self,
        target_type: HaulingTargetType,
        id: EntityId,
    ) -> Option<&mut dyn AllocationTarget> {
        match target_type {
            HaulingTargetType::Room => {
                self.stockpiles.get_mut(&id).map(|s| s as &mut dyn AllocationTarget)
            }
            HaulingTargetType::Furniture => {
                self.stations.get_mut(&id).map(|s| s as &mut dyn AllocationTarget)
            }
            HaulingTargetType::Construction => {
                self.constructions.get_mut(&id).map(|c| c as &mut dyn AllocationTarget)
            }
            HaulingTargetType::Floor | HaulingTargetType::Zone => None,
        }
    }

    /// Reserve part of an item stack and plan moving it to `destination`.
    ///
    /// Nothing is reserved unless the whole plan succeeds.
    pub fn plan_item_hauling(
        &mut self,
        item_id: EntityId,
        quantity: u32,
        destination: HaulingDestination,
        requester: Option<EntityId>,
    ) -> Result<HaulingAllocation, AllocationError> {
        let item = self
            .items
            .get(item_id)
            .ok_or(AllocationError::UnknownResource(item_id))?;
        let source_position = item.location;
        let resource = item.resource_type;

        if let Some(target_id) = destination.target_id {
            let has_hook = !matches!(
                destination.target_type,
                HaulingTargetType::Floor | HaulingTargetType::Zone
            );
            if has_hook {
                let target = self
                    .allocation_target(destination.target_type, target_id)
                    .ok_or(AllocationError::MissingTarget)?;
                if !target.can_accept(resource) {
                    return Err(AllocationError::TargetRefused(target_id));
                }
            }
        }

        let item_allocation = self.items.allocate(
            &mut self.ids,
            item_id,
            quantity,
            AllocationPurpose::DueToBeHauled,
            requester,
        )?;
        let hauling = HaulingAllocation {
            id: self.ids.next_allocation(),
            source_position,
            source_container: None,
            target_position: destination.position,
            target_id: destination.target_id,
            target_type: destination.target_type,
            item_allocation: Some(item_allocation),
            liquid_allocation: None,
        };
        self.notify_created(&hauling);
        debug!(allocation = %hauling.id, item = %item_id, quantity, "hauling planned");
        Ok(hauling)
    }

    /// Reserve liquid in a container and plan moving it to `destination`:
    /// another container (furniture) or a zone to dump into
    pub fn plan_liquid_transfer(
        &mut self,
        container_id: EntityId,
        quantity: f32,
        destination: HaulingDestination,
        requester: Option<EntityId>,
    ) -> Result<HaulingAllocation, AllocationError> {
        let container = self
            .liquids
            .get(container_id)
            .ok_or(AllocationError::UnknownResource(container_id))?;
        let source_position = container.location;

        let purpose = match destination.target_type {
            HaulingTargetType::Zone => AllocationPurpose::ContentsToBeDumped,
            _ => AllocationPurpose::DueToBeHauled,
        };
        if let (Some(target_id), Some(liquid)) = (destination.target_id, container.liquid) {
            if !self.liquids.contains(target_id) {
                return Err(AllocationError::MissingTarget);
            }
            if !self.liquids.accepts(target_id, liquid) {
                return Err(AllocationError::LiquidMismatch(target_id));
            }
        }

        let liquid_allocation =
            self.liquids.allocate(&mut self.ids, container_id, quantity, purpose, requester)?;
        Ok(HaulingAllocation {
            id: self.ids.next_allocation(),
            source_position,
            source_container: Some(container_id),
            target_position: destination.position,
            target_id: destination.target_id,
            target_type: destination.target_type,
            item_allocation: None,
            liquid_allocation: Some(liquid_allocation),
        })
    }

    /// Release every reservation a hauling allocation holds and tell its
    /// target the delivery is off. Safe to call more than once.
    pub fn cancel_hauling(&mut self, hauling: &HaulingAllocation) {
        if let Some(item_allocation) = &hauling.item_allocation {
            self.items.cancel(item_allocation);
        }
        if let Some(liquid_allocation) = &hauling.liquid_allocation {
            self.liquids.cancel(liquid_allocation);
        }
        if let Some(target_id) = hauling.target_id {
            if let Some(target) = self.allocation_target_mut(hauling.target_type, target_id) {
                target.allocation_cancelled(hauling);
            }
        }
    }

    /// Carry out a planned haul: take the reserved resource from its source
    /// and hand it to the target. Returns false if the reservation was gone.
    pub fn complete_hauling(&mut self, hauling: &HaulingAllocation) -> bool {
        let mut moved = false;

        if let Some(item_allocation) = &hauling.item_allocation {
            let quantity = self.items.consume(item_allocation);
            if quantity > 0 {
                moved = true;
                if matches!(
                    hauling.target_type,
                    HaulingTargetType::Floor | HaulingTargetType::Room | HaulingTargetType::Zone
                ) {
                    self.items.spawn(
                        &mut self.ids,
                        item_allocation.resource_type,
                        quantity,
                        hauling.target_position,
                    );
                }
            }
        }

        if let Some(liquid_allocation) = &hauling.liquid_allocation {
            let quantity = self.liquids.consume(liquid_allocation);
            if quantity > 0.0 {
                moved = true;
                if let Some(target_id) = hauling.target_id {
                    self.liquids.fill(target_id, liquid_allocation.liquid, quantity);
                }
            }
        }

        if let Some(target_id) = hauling.target_id {
            if let Some(target) = self.allocation_target_mut(hauling.target_type, target_id) {
                if moved {
                    target.delivered(hauling);
                } else {
                    target.allocation_cancelled(hauling);
                }
            }
        }
        moved
    }

    fn notify_created(&mut self, hauling: &HaulingAllocation) {
        if let Some(target_id) = hauling.target_id {
            if let Some(target) = self.allocation_target_mut(hauling.target_type, target_id) {
                target.allocation_created(hauling);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::colonists::professions::Profession;
    use crate::simulation::types::LiquidType;
    use crate::simulation::workplaces::Recipe;

    fn world() -> World {
        World::new(GridMap::open(10, 10))
    }

    #[test]
    fn test_plan_hauling_to_stockpile_tracks_pending() {
        let mut world = world();
        let logs = world.spawn_item(ResourceType::Logs, 5, TileCoord::new(1, 1));
        let pile = world.add_stockpile(vec![TileCoord::new(8, 8)], 10, &[ResourceType::Logs]);
        let destination = world.destination_for(HaulingTargetType::Room, pile).unwrap();

        let hauling = world.plan_item_hauling(logs, 3, destination, None).unwrap();
        assert_eq!(world.items.unallocated_quantity(logs), 2);
        assert_eq!(world.stockpiles[&pile].pending_quantity(), 3);
        assert_eq!(hauling.source_position, TileCoord::new(1, 1));

        world.cancel_hauling(&hauling);
        world.cancel_hauling(&hauling);
        assert_eq!(world.items.unallocated_quantity(logs), 5);
        assert_eq!(world.stockpiles[&pile].pending_quantity(), 0);
        assert_eq!(world.items.stats.released_total, 3.0);
    }

    #[test]
    fn test_plan_hauling_refused_leaves_item_untouched() {
        let mut world = world();
        let boulder = world.spawn_item(ResourceType::Boulder, 3, TileCoord::new(1, 1));
        let pile = world.add_stockpile(vec![TileCoord::new(8, 8)], 10, &[ResourceType::Logs]);
        let destination = world.destination_for(HaulingTargetType::Room, pile).unwrap();

        assert_eq!(
            world.plan_item_hauling(boulder, 3, destination, None),
            Err(AllocationError::TargetRefused(pile))
        );
        assert_eq!(
            world.plan_item_hauling(
                boulder,
                5,
                HaulingDestination::floor(TileCoord::new(2, 2)),
                None,
            ),
            Err(AllocationError::Insufficient { requested: 5, available: 3 })
        );
        assert_eq!(world.items.unallocated_quantity(boulder), 3);
    }

    #[test]
    fn test_complete_hauling_moves_items() {
        let mut world = world();
        let logs = world.spawn_item(ResourceType::Logs, 4, TileCoord::new(1, 1));
        let pile = world.add_stockpile(vec![TileCoord::new(8, 8)], 10, &[ResourceType::Logs]);
        let destination = world.destination_for(HaulingTargetType::Room, pile).unwrap();
        let hauling = world.plan_item_hauling(logs, 4, destination, None).unwrap();

        assert!(world.complete_hauling(&hauling));
        assert!(!world.items.contains(logs));
        assert_eq!(world.items.items_at(TileCoord::new(8, 8)).count(), 1);
        assert_eq!(world.stockpiles[&pile].get(ResourceType::Logs), 4);
        assert!(!world.complete_hauling(&hauling));
    }

    #[test]
    fn test_hauling_into_station_consumes_into_inputs() {
        let mut world = world();
        let veg = world.spawn_item(ResourceType::Vegetable, 2, TileCoord::new(1, 1));
        let kitchen = world.add_station(WorkplaceType::Kitchen, TileCoord::new(5, 5));
        world.stations.get_mut(&kitchen).unwrap().recipe = Some(Recipe::new(
            "Stew",
            Profession::Chef,
            &[(ResourceType::Vegetable, 2)],
            (ResourceType::Meal, 1),
        ));

        let destination = world.destination_for(HaulingTargetType::Furniture, kitchen).unwrap();
        let hauling = world.plan_item_hauling(veg, 2, destination, None).unwrap();
        assert!(world.complete_hauling(&hauling));
        assert_eq!(world.stations[&kitchen].input(ResourceType::Vegetable), 2);
        assert_eq!(world.items.len(), 0);
    }

    #[test]
    fn test_liquid_transfer_between_containers() {
        let mut world = world();
        let well = world.add_liquid_container(TileCoord::new(1, 1), 10.0);
        let pot = world.add_liquid_container(TileCoord::new(4, 4), 5.0);
        world.liquids.fill(well, LiquidType::Water, 8.0);

        let destination = world.destination_for(HaulingTargetType::Furniture, pot).unwrap();
        let hauling = world.plan_liquid_transfer(well, 3.0, destination, None).unwrap();
        assert_eq!(hauling.source_container, Some(well));
        assert!(world.complete_hauling(&hauling));
        assert!((world.liquids.get(pot).unwrap().quantity - 3.0).abs() < 1e-4);
        assert!((world.liquids.get(well).unwrap().quantity - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_entity_lookup_and_destroy() {
        let mut world = world();
        let tree = world.add_plant(PlantKind::Tree, TileCoord::new(3, 4), 3);
        assert_eq!(world.entity_location(tree), Some(TileCoord::new(3, 4)));
        assert!(world.destroy_entity(tree));
        assert!(!world.entity_exists(tree));
        assert!(!world.destroy_entity(tree));
    }
}
