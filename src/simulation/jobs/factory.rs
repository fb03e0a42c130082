//! Job construction
//!
//! `JobFactory` turns designations and resource requests into fully populated
//! jobs with their initial accessibility state. Jobs that need a physical
//! resource get their allocation here, before the job exists; if the
//! allocation fails there is no job and nothing stays reserved.

use serde::{Deserialize, Serialize};

use crate::simulation::colonists::professions::Profession;
use crate::simulation::error::JobCreationError;
use crate::simulation::jobs::accessibility::initial_state;
use crate::simulation::jobs::definitions::{
    JobTypeDictionary, CONSTRUCT, COOKING, CRAFTING, DECONSTRUCT, HAULING, LIQUID_TRANSFER, MINING,
};
use crate::simulation::jobs::types::{Job, JobId, JobPriority};
use crate::simulation::map::{TileMap, Wall};
use crate::simulation::types::{EntityId, IdGenerator, TileCoord};
use crate::simulation::workplaces::{Recipe, WorkplaceType};
use crate::simulation::world::{HaulingDestination, PlantKind, World};

/// A player or system marker asking for work of one type
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Designation {
    pub name: String,
    /// Job type created for designated targets
    pub job_type: String,
    /// Replaces the job type's profession when set
    pub profession_override: Option<Profession>,
}

impl Designation {
    pub fn new(name: impl Into<String>, job_type: &str) -> Self {
        Designation {
            name: name.into(),
            job_type: job_type.to_string(),
            profession_override: None,
        }
    }

    pub fn with_profession(mut self, profession: Profession) -> Self {
        self.profession_override = Some(profession);
        self
    }
}

/// What a designation was applied to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DesignationTarget {
    Tile(TileCoord),
    Entity(EntityId),
}

#[derive(Clone, Debug)]
pub struct JobFactory {
    dictionary: JobTypeDictionary,
    default_priority: JobPriority,
}

impl JobFactory {
    pub fn new(dictionary: JobTypeDictionary, default_priority: JobPriority) -> Self {
        JobFactory {
            dictionary,
            default_priority,
        }
    }

    pub fn dictionary(&self) -> &JobTypeDictionary {
        &self.dictionary
    }

    /// A bare job of a named type with its initial state worked out
    pub fn create_job(
        &self,
        job_ids: &mut IdGenerator,
        job_type: &str,
        location: Option<TileCoord>,
        map: &dyn TileMap,
    ) -> Result<Job, JobCreationError> {
        let descriptor = self
            .dictionary
            .get(job_type)
            .ok_or_else(|| JobCreationError::UnknownJobType(job_type.to_string()))?;
        let mut job = Job::new(JobId(job_ids.next_raw()), descriptor.clone(), location)
            .with_priority(self.default_priority);
        job.state = initial_state(map, descriptor, location);
        Ok(job)
    }

    /// Create the job a designation asks for
    pub fn from_designation(
        &self,
        job_ids: &mut IdGenerator,
        designation: &Designation,
        target: DesignationTarget,
        world: &World,
    ) -> Result<Job, JobCreationError> {
        let location = match target {
            DesignationTarget::Tile(coord) => coord,
            DesignationTarget::Entity(id) => world
                .entity_location(id)
                .ok_or(JobCreationError::MissingTarget(id))?,
        };

        if designation.job_type == MINING {
            if let Some(wall) = world.map.wall_at(location).filter(|w| w.constructed) {
                return self.deconstruct_wall(job_ids, location, wall, &world.map);
            }
        }

        let mut job = self.create_job(job_ids, &designation.job_type, Some(location), &world.map)?;
        if let Some(profession) = designation.profession_override {
            job.required_profession = Some(profession);
        }
        if let DesignationTarget::Entity(id) = target {
            job.target_entity = Some(id);
            if let Some(PlantKind::Crop(resource)) = world.plants.get(&id).map(|p| p.kind) {
                job.required_resource_type = Some(resource);
            }
        }
        Ok(job)
    }

    /// Tear down a built wall; the trade that builds with its material does it
    pub fn deconstruct_wall(
        &self,
        job_ids: &mut IdGenerator,
        location: TileCoord,
        wall: Wall,
        map: &dyn TileMap,
    ) -> Result<Job, JobCreationError> {
        let mut job = self.create_job(job_ids, DECONSTRUCT, Some(location), map)?;
        job.required_profession = Profession::for_material(wall.material);
        job.required_resource_material = Some(wall.material);
        Ok(job)
    }

    /// Reserve `quantity` of an item and create the job that carries it
    pub fn create_hauling_job(
        &self,
        job_ids: &mut IdGenerator,
        world: &mut World,
        item: EntityId,
        quantity: u32,
        destination: HaulingDestination,
        requester: Option<EntityId>,
    ) -> Result<Job, JobCreationError> {
        let hauling = world.plan_item_hauling(item, quantity, destination, requester)?;
        let source = Some(hauling.source_position);
        let mut job = match self.create_job(job_ids, HAULING, source, &world.map) {
            Ok(job) => job,
            Err(err) => {
                world.cancel_hauling(&hauling);
                return Err(err);
            }
        };
        job.required_resource_type = hauling.resource_type();
        job.required_resource_material = hauling.resource_type().map(|r| r.material_type());
        job.target_entity = destination.target_id;
        job.hauling_allocation = Some(hauling);
        Ok(job)
    }

    /// Reserve liquid in a container and create the job that moves it
    pub fn create_liquid_transfer_job(
        &self,
        job_ids: &mut IdGenerator,
        world: &mut World,
        container: EntityId,
        quantity: f32,
        destination: HaulingDestination,
        requester: Option<EntityId>,
    ) -> Result<Job, JobCreationError> {
        let hauling = world.plan_liquid_transfer(container, quantity, destination, requester)?;
        let source = Some(hauling.source_position);
        let mut job = match self.create_job(job_ids, LIQUID_TRANSFER, source, &world.map) {
            Ok(job) => job,
            Err(err) => {
                world.cancel_hauling(&hauling);
                return Err(err);
            }
        };
        job.target_entity = destination.target_id;
        job.hauling_allocation = Some(hauling);
        Ok(job)
    }

    /// Work a recipe at a crafting station. Kitchens cook, everything else crafts.
    pub fn create_crafting_job(
        &self,
        job_ids: &mut IdGenerator,
        world: &World,
        station: EntityId,
        recipe: Recipe,
    ) -> Result<Job, JobCreationError> {
        let found = world
            .stations
            .get(&station)
            .ok_or(JobCreationError::MissingTarget(station))?;
        let job_type = match found.workplace_type {
            WorkplaceType::Kitchen => COOKING,
            _ => CRAFTING,
        };
        let mut job = self.create_job(job_ids, job_type, Some(found.location), &world.map)?;
        job.required_profession = Some(recipe.profession);
        job.target_entity = Some(station);
        job.recipe = Some(recipe);
        Ok(job)
    }

    /// Build a construction site once its materials are in
    pub fn create_construction_job(
        &self,
        job_ids: &mut IdGenerator,
        world: &World,
        construction: EntityId,
    ) -> Result<Job, JobCreationError> {
        let site = world
            .constructions
            .get(&construction)
            .ok_or(JobCreationError::MissingTarget(construction))?;
        let mut job = self.create_job(job_ids, CONSTRUCT, Some(site.location), &world.map)?;
        job.required_profession = Profession::for_material(site.material);
        job.required_resource_type = Some(site.resource);
        job.required_resource_material = Some(site.material);
        job.target_entity = Some(construction);
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::error::AllocationError;
    use crate::simulation::jobs::definitions::{FELLING, HARVEST};
    use crate::simulation::jobs::types::JobState;
    use crate::simulation::map::GridMap;
    use crate::simulation::resources::allocation::HaulingTargetType;
    use crate::simulation::structures::StructureType;
    use crate::simulation::types::{MaterialType, ResourceType};

    fn factory() -> JobFactory {
        JobFactory::new(JobTypeDictionary::builtin(), JobPriority::Normal)
    }

    #[test]
    fn test_designation_on_natural_rock_mines() {
        let mut world = World::new(GridMap::open(8, 8));
        let at = TileCoord::new(3, 3);
        world.map.set_wall(at, Some(Wall::natural(MaterialType::Stone)));
        let mut job_ids = IdGenerator::new();

        let dig = Designation::new("Dig", MINING);
        let job = factory()
            .from_designation(&mut job_ids, &dig, DesignationTarget::Tile(at), &world)
            .unwrap();
        assert_eq!(job.type_name(), MINING);
        assert_eq!(job.required_profession(), Some(Profession::Miner));
        assert_eq!(job.state(), JobState::PotentiallyAccessible);
        assert_eq!(job.id, JobId(1));
    }

    #[test]
    fn test_designation_on_constructed_wall_deconstructs() {
        let mut world = World::new(GridMap::open(8, 8));
        let at = TileCoord::new(3, 3);
        world.map.set_wall(at, Some(Wall::constructed(MaterialType::Wood)));
        let mut job_ids = IdGenerator::new();

        let dig = Designation::new("Dig", MINING);
        let job = factory()
            .from_designation(&mut job_ids, &dig, DesignationTarget::Tile(at), &world)
            .unwrap();
        assert_eq!(job.type_name(), DECONSTRUCT);
        assert_eq!(job.required_profession(), Some(Profession::Carpenter));
        assert_eq!(job.required_resource_material, Some(MaterialType::Wood));
    }

    #[test]
    fn test_entity_designation_targets_plant() {
        let mut world = World::new(GridMap::open(8, 8));
        let crop =
            world.add_plant(PlantKind::Crop(ResourceType::Vegetable), TileCoord::new(2, 5), 4);
        let tree = world.add_plant(PlantKind::Tree, TileCoord::new(6, 6), 3);
        let mut job_ids = IdGenerator::new();
        let factory = factory();

        let reap = Designation::new("Harvest", HARVEST);
        let harvest = factory
            .from_designation(&mut job_ids, &reap, DesignationTarget::Entity(crop), &world)
            .unwrap();
        assert_eq!(harvest.location(), Some(TileCoord::new(2, 5)));
        assert_eq!(harvest.target_entity, Some(crop));
        assert_eq!(harvest.required_resource_type, Some(ResourceType::Vegetable));

        let designation = Designation::new("Chop", FELLING).with_profession(Profession::Carpenter);
        let felling = factory
            .from_designation(&mut job_ids, &designation, DesignationTarget::Entity(tree), &world)
            .unwrap();
        assert_eq!(felling.required_profession(), Some(Profession::Carpenter));

        let missing = factory.from_designation(
            &mut job_ids,
            &Designation::new("Chop", FELLING),
            DesignationTarget::Entity(EntityId(999)),
            &world,
        );
        assert_eq!(missing.unwrap_err(), JobCreationError::MissingTarget(EntityId(999)));
    }

    #[test]
    fn test_unknown_job_type() {
        let world = World::new(GridMap::open(4, 4));
        let mut job_ids = IdGenerator::new();
        let result = factory().from_designation(
            &mut job_ids,
            &Designation::new("Odd", "JUGGLE"),
            DesignationTarget::Tile(TileCoord::new(1, 1)),
            &world,
        );
        assert_eq!(result.unwrap_err(), JobCreationError::UnknownJobType("JUGGLE".to_string()));
    }

    #[test]
    fn test_hauling_job_allocates_or_creates_nothing() {
        let mut world = World::new(GridMap::open(8, 8));
        let logs = world.spawn_item(ResourceType::Logs, 3, TileCoord::new(1, 1));
        let mut job_ids = IdGenerator::new();
        let factory = factory();
        let floor = HaulingDestination::floor(TileCoord::new(6, 6));

        let refused = factory.create_hauling_job(&mut job_ids, &mut world, logs, 5, floor, None);
        assert_eq!(
            refused.unwrap_err(),
            JobCreationError::Allocation(AllocationError::Insufficient {
                requested: 5,
                available: 3
            })
        );
        assert_eq!(world.items.unallocated_quantity(logs), 3);

        let job = factory
            .create_hauling_job(&mut job_ids, &mut world, logs, 2, floor, None)
            .unwrap();
        assert_eq!(job.location(), Some(TileCoord::new(1, 1)));
        assert_eq!(job.required_resource_type, Some(ResourceType::Logs));
        assert_eq!(job.hauling_allocation().unwrap().item_quantity(), 2);
        assert_eq!(world.items.unallocated_quantity(logs), 1);
    }

    #[test]
    fn test_hauling_without_job_type_releases_allocation() {
        let mut world = World::new(GridMap::open(8, 8));
        let logs = world.spawn_item(ResourceType::Logs, 3, TileCoord::new(1, 1));
        let mut job_ids = IdGenerator::new();
        let factory = JobFactory::new(JobTypeDictionary::new(), JobPriority::Normal);

        let result = factory.create_hauling_job(
            &mut job_ids,
            &mut world,
            logs,
            2,
            HaulingDestination::floor(TileCoord::new(6, 6)),
            None,
        );
        assert_eq!(result.unwrap_err(), JobCreationError::UnknownJobType(HAULING.to_string()));
        assert_eq!(world.items.unallocated_quantity(logs), 3);
    }

    #[test]
    fn test_crafting_and_construction_jobs() {
        let mut world = World::new(GridMap::open(8, 8));
        let smithy = world.add_station(WorkplaceType::Smithy, TileCoord::new(4, 4));
        let kitchen = world.add_station(WorkplaceType::Kitchen, TileCoord::new(2, 2));
        let site = world.add_construction(
            StructureType::Wall,
            TileCoord::new(5, 1),
            ResourceType::StoneBlock,
        );
        let mut job_ids = IdGenerator::new();
        let factory = factory();

        let bar = Recipe::new(
            "Bar",
            Profession::Blacksmith,
            &[(ResourceType::Ore, 2)],
            (ResourceType::MetalBar, 1),
        );
        let craft = factory.create_crafting_job(&mut job_ids, &world, smithy, bar).unwrap();
        assert_eq!(craft.type_name(), CRAFTING);
        assert_eq!(craft.required_profession(), Some(Profession::Blacksmith));
        assert_eq!(craft.target_entity, Some(smithy));

        let stew = Recipe::new(
            "Stew",
            Profession::Chef,
            &[(ResourceType::Vegetable, 1)],
            (ResourceType::Meal, 1),
        );
        let cook = factory.create_crafting_job(&mut job_ids, &world, kitchen, stew).unwrap();
        assert_eq!(cook.type_name(), COOKING);

        let build = factory.create_construction_job(&mut job_ids, &world, site).unwrap();
        assert_eq!(build.required_profession(), Some(Profession::Stonemason));
        assert!(world.destination_for(HaulingTargetType::Construction, site).is_some());
    }
}
