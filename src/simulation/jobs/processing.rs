//! Job completion effects
//!
//! Each job type names a completion effect; effects are registered strategies
//! looked up by that key. An effect mutates the world for one finished job and
//! records what should happen next (events for outside behaviors, follow-on
//! jobs) in its context. Follow-on jobs are added by the caller after the
//! effect returns, never from inside it.

use std::collections::HashMap;
use std::fmt;
use serde::{Deserialize, Serialize};

use crate::simulation::error::CompletionError;
use crate::simulation::jobs::types::{Job, JobId};
use crate::simulation::map::{TileMap, Wall};
use crate::simulation::resources::allocation::HaulingTargetType;
use crate::simulation::types::{EntityId, MaterialType, ResourceType, TileCoord};
use crate::simulation::world::{PlantKind, World};

/// Side effects for collaborators outside the scheduler
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum JobEvent {
    /// A felled tree starts falling; the falling behavior drops the logs
    TreeFalling { tree: EntityId, location: TileCoord },
    /// Forwarded to the target entity's own behavior
    EntityJobCompleted { entity: EntityId, job: JobId, worker: Option<EntityId> },
    ConstructionCompleted { construction: EntityId, location: TileCoord },
    FireStarted { job: JobId, location: TileCoord },
    SoundRequested { asset: String, location: TileCoord },
    ParticleRequested { effect: String, location: TileCoord },
}

/// Work a completed job asks for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FollowOn {
    /// Carry an item to the nearest stockpile that takes it
    HaulToStockpile { item: EntityId },
    /// All materials are in; build it
    Construct { construction: EntityId },
    /// The station holds every input its recipe needs
    Craft { station: EntityId },
}

/// Everything a completion effect may read or change
pub struct CompletionContext<'a> {
    pub job: &'a Job,
    pub worker: Option<EntityId>,
    pub world: &'a mut World,
    pub events: Vec<JobEvent>,
    pub follow_ons: Vec<FollowOn>,
}

impl<'a> CompletionContext<'a> {
    pub fn new(job: &'a Job, worker: Option<EntityId>, world: &'a mut World) -> Self {
        CompletionContext {
            job,
            worker,
            world,
            events: Vec::new(),
            follow_ons: Vec::new(),
        }
    }

    fn location(&self) -> Result<TileCoord, CompletionError> {
        self.job.location().ok_or(CompletionError::MissingTarget(self.job.id))
    }

    fn target(&self) -> Result<EntityId, CompletionError> {
        self.job.target_entity.ok_or(CompletionError::MissingTarget(self.job.id))
    }
}

/// One job type's completion behavior
pub trait CompletionEffect {
    fn apply(&self, ctx: &mut CompletionContext<'_>) -> Result<(), CompletionError>;
}

impl<F> CompletionEffect for F
where
    F: Fn(&mut CompletionContext<'_>) -> Result<(), CompletionError>,
{
    fn apply(&self, ctx: &mut CompletionContext<'_>) -> Result<(), CompletionError> {
        self(ctx)
    }
}

/// Completion effects keyed by the name job types refer to them by
#[derive(Default)]
pub struct CompletionRegistry {
    effects: HashMap<String, Box<dyn CompletionEffect>>,
}

impl fmt::Debug for CompletionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.effects.keys().collect();
        keys.sort();
        f.debug_struct("CompletionRegistry").field("effects", &keys).finish()
    }
}

impl CompletionRegistry {
    pub fn new() -> Self {
        CompletionRegistry {
            effects: HashMap::new(),
        }
    }

    /// The effects the built-in job types use
    pub fn builtin() -> Self {
        let mut registry = CompletionRegistry::new();
        registry.register("mining", mine);
        registry.register("deconstruct", deconstruct);
        registry.register("fell_tree", fell_tree);
        registry.register("harvest", harvest);
        registry.register("haul", haul);
        registry.register("liquid_transfer", haul);
        registry.register("construct", construct);
        registry.register("notify_entity", notify_entity);
        registry.register("craft", craft);
        registry
    }

    pub fn register(&mut self, key: &str, effect: impl CompletionEffect + 'static) {
        self.effects.insert(key.to_string(), Box::new(effect));
    }

    pub fn get(&self, key: &str) -> Option<&dyn CompletionEffect> {
        self.effects.get(key).map(|e| e.as_ref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.effects.contains_key(key)
    }
}

/// What digging out natural rock of a material leaves behind
fn mined_resource(material: MaterialType) -> Option<ResourceType> {
    match material {
        MaterialType::Stone => Some(ResourceType::Boulder),
        MaterialType::Metal => Some(ResourceType::Ore),
        MaterialType::Wood => Some(ResourceType::Logs),
        MaterialType::Food | MaterialType::Liquid => None,
    }
}

fn clear_wall(
    ctx: &mut CompletionContext<'_>,
    resource_for: fn(&Wall) -> Option<ResourceType>,
) -> Result<(), CompletionError> {
    let location = ctx.location()?;
    let wall = ctx
        .world
        .map
        .wall_at(location)
        .ok_or(CompletionError::MissingTarget(ctx.job.id))?;
    ctx.world.map.set_wall(location, None);

    if let Some(resource) = resource_for(&wall) {
        let item = ctx.world.spawn_item(resource, 1, location);
        ctx.follow_ons.push(FollowOn::HaulToStockpile { item });
    }
    Ok(())
}

/// Dig out a wall, leaving a boulder (or ore, or logs)
pub fn mine(ctx: &mut CompletionContext<'_>) -> Result<(), CompletionError> {
    clear_wall(ctx, |wall| mined_resource(wall.material))
}

/// Take down a built wall, salvaging its material
pub fn deconstruct(ctx: &mut CompletionContext<'_>) -> Result<(), CompletionError> {
    clear_wall(ctx, |wall| ResourceType::salvage_of(wall.material))
}

/// The tree starts falling. Logs come from the falling behavior, not from here.
pub fn fell_tree(ctx: &mut CompletionContext<'_>) -> Result<(), CompletionError> {
    let tree = ctx.target()?;
    let plant = ctx
        .world
        .plants
        .remove(&tree)
        .ok_or(CompletionError::MissingTarget(ctx.job.id))?;
    ctx.events.push(JobEvent::TreeFalling {
        tree,
        location: plant.location,
    });
    Ok(())
}

pub fn harvest(ctx: &mut CompletionContext<'_>) -> Result<(), CompletionError> {
    let target = ctx.target()?;
    let plant = ctx
        .world
        .plants
        .remove(&target)
        .ok_or(CompletionError::MissingTarget(ctx.job.id))?;
    if let PlantKind::Crop(resource) = plant.kind {
        if plant.yield_quantity > 0 {
            let item = ctx.world.spawn_item(resource, plant.yield_quantity, plant.location);
            ctx.follow_ons.push(FollowOn::HaulToStockpile { item });
        }
    }
    Ok(())
}

/// Deliver a hauling allocation (items or liquid) to its target
pub fn haul(ctx: &mut CompletionContext<'_>) -> Result<(), CompletionError> {
    let hauling = ctx
        .job
        .hauling_allocation()
        .ok_or(CompletionError::MissingAllocation(ctx.job.id))?;
    if !ctx.world.complete_hauling(hauling) {
        return Err(CompletionError::MissingAllocation(ctx.job.id));
    }

    let Some(target) = hauling.target_id else {
        return Ok(());
    };
    match hauling.target_type {
        HaulingTargetType::Construction => {
            let ready = ctx
                .world
                .constructions
                .get(&target)
                .map_or(false, |c| c.is_ready_to_build());
            if ready {
                ctx.follow_ons.push(FollowOn::Construct { construction: target });
            }
        }
        HaulingTargetType::Furniture => {
            let ready = ctx
                .world
                .stations
                .get(&target)
                .map_or(false, |s| s.recipe.as_ref().map_or(false, |r| s.has_inputs_for(r)));
            if ready {
                ctx.follow_ons.push(FollowOn::Craft { station: target });
            }
        }
        _ => {}
    }
    Ok(())
}

pub fn construct(ctx: &mut CompletionContext<'_>) -> Result<(), CompletionError> {
    let id = ctx.target()?;
    let site = ctx
        .world
        .constructions
        .get_mut(&id)
        .ok_or(CompletionError::MissingTarget(ctx.job.id))?;
    if !site.complete() {
        return Err(CompletionError::MissingAllocation(ctx.job.id));
    }
    let location = site.location;
    let material = site.material;
    let blocks = site.structure_type.blocks_movement();

    if blocks {
        ctx.world.map.set_wall(location, Some(Wall::constructed(material)));
    }
    ctx.world.constructions.remove(&id);
    ctx.events.push(JobEvent::ConstructionCompleted {
        construction: id,
        location,
    });
    Ok(())
}

/// Tell the target entity's behavior its job is done
pub fn notify_entity(ctx: &mut CompletionContext<'_>) -> Result<(), CompletionError> {
    let entity = ctx.target()?;
    if !ctx.world.entity_exists(entity) {
        return Err(CompletionError::MissingTarget(ctx.job.id));
    }
    ctx.events.push(JobEvent::EntityJobCompleted {
        entity,
        job: ctx.job.id,
        worker: ctx.worker,
    });
    Ok(())
}

/// Turn the station's delivered inputs into the recipe output
pub fn craft(ctx: &mut CompletionContext<'_>) -> Result<(), CompletionError> {
    let id = ctx.target()?;
    let station = ctx
        .world
        .stations
        .get_mut(&id)
        .ok_or(CompletionError::MissingTarget(ctx.job.id))?;
    let recipe = ctx
        .job
        .recipe
        .clone()
        .or_else(|| station.recipe.clone())
        .ok_or(CompletionError::MissingAllocation(ctx.job.id))?;
    if !station.consume_inputs(&recipe) {
        return Err(CompletionError::MissingAllocation(ctx.job.id));
    }
    station.completed_crafts += 1;
    let location = station.location;

    if let Some(liquid) = &ctx.job.liquid_allocation {
        ctx.world.liquids.consume(liquid);
    }
    let (output, quantity) = recipe.output;
    ctx.world.spawn_item(output, quantity, location);
    notify_entity(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::colonists::professions::Profession;
    use crate::simulation::jobs::definitions::{
        JobTypeDictionary, FELLING, HARVEST, HAULING, MINING,
    };
    use crate::simulation::map::GridMap;
    use crate::simulation::structures::StructureType;
    use crate::simulation::workplaces::{Recipe, WorkplaceType};

    fn job(job_type: &str, at: TileCoord) -> Job {
        Job::new(JobId(1), JobTypeDictionary::builtin().get(job_type).cloned().unwrap(), Some(at))
    }

    type Applied = (Result<(), CompletionError>, Vec<JobEvent>, Vec<FollowOn>);

    fn run(registry: &CompletionRegistry, key: &str, job: &Job, world: &mut World) -> Applied {
        let mut ctx = CompletionContext::new(job, Some(EntityId(500)), world);
        let result = registry.get(key).unwrap().apply(&mut ctx);
        (result, ctx.events, ctx.follow_ons)
    }

    #[test]
    fn test_builtin_registry_covers_builtin_job_types() {
        let registry = CompletionRegistry::builtin();
        let dictionary = JobTypeDictionary::builtin();
        for name in dictionary.names() {
            let key = dictionary.get(name).unwrap().completion_effect.clone().unwrap();
            assert!(registry.contains(&key), "no effect for {}", key);
        }
    }

    #[test]
    fn test_mining_clears_wall_and_drops_boulder() {
        let mut world = World::new(GridMap::open(6, 6));
        let at = TileCoord::new(2, 2);
        world.map.set_wall(at, Some(Wall::natural(MaterialType::Stone)));
        let registry = CompletionRegistry::builtin();

        let (result, _, follow_ons) = run(&registry, "mining", &job(MINING, at), &mut world);
        assert_eq!(result, Ok(()));
        assert!(world.map.is_navigable(at));
        let boulder = world.items.items_at(at).next().unwrap();
        assert_eq!(boulder.resource_type, ResourceType::Boulder);
        assert_eq!(follow_ons, vec![FollowOn::HaulToStockpile { item: boulder.id }]);
    }

    #[test]
    fn test_mining_open_tile_fails() {
        let mut world = World::new(GridMap::open(6, 6));
        let registry = CompletionRegistry::builtin();
        let mine = job(MINING, TileCoord::new(1, 1));
        let (result, _, _) = run(&registry, "mining", &mine, &mut world);
        assert_eq!(result, Err(CompletionError::MissingTarget(JobId(1))));
    }

    #[test]
    fn test_fell_tree_emits_event_without_resources() {
        let mut world = World::new(GridMap::open(6, 6));
        let at = TileCoord::new(4, 4);
        let tree = world.add_plant(PlantKind::Tree, at, 3);
        let registry = CompletionRegistry::builtin();

        let fell = job(FELLING, at).with_target(tree);
        let (result, events, follow_ons) = run(&registry, "fell_tree", &fell, &mut world);
        assert_eq!(result, Ok(()));
        assert_eq!(events, vec![JobEvent::TreeFalling { tree, location: at }]);
        assert!(follow_ons.is_empty());
        assert!(world.items.is_empty());
    }

    #[test]
    fn test_harvest_spawns_crop() {
        let mut world = World::new(GridMap::open(6, 6));
        let at = TileCoord::new(1, 3);
        let crop = world.add_plant(PlantKind::Crop(ResourceType::Vegetable), at, 4);
        let registry = CompletionRegistry::builtin();

        let harvest = job(HARVEST, at).with_target(crop);
        let (result, _, follow_ons) = run(&registry, "harvest", &harvest, &mut world);
        assert_eq!(result, Ok(()));
        assert_eq!(world.items.items_at(at).map(|i| i.quantity).sum::<u32>(), 4);
        assert_eq!(follow_ons.len(), 1);
        assert!(!world.plants.contains_key(&crop));
    }

    #[test]
    fn test_haul_into_construction_queues_building() {
        let mut world = World::new(GridMap::open(8, 8));
        let blocks = world.spawn_item(ResourceType::StoneBlock, 1, TileCoord::new(1, 1));
        let site = world.add_construction(
            StructureType::Floor,
            TileCoord::new(6, 6),
            ResourceType::StoneBlock,
        );
        let destination = world.destination_for(HaulingTargetType::Construction, site).unwrap();
        let hauling = world.plan_item_hauling(blocks, 1, destination, None).unwrap();
        let haul_job = job(HAULING, TileCoord::new(1, 1)).with_hauling_allocation(hauling);
        let registry = CompletionRegistry::builtin();

        let (result, _, follow_ons) = run(&registry, "haul", &haul_job, &mut world);
        assert_eq!(result, Ok(()));
        assert_eq!(follow_ons, vec![FollowOn::Construct { construction: site }]);

        // Second delivery of the same allocation finds nothing to move
        let (again, _, _) = run(&registry, "haul", &haul_job, &mut world);
        assert_eq!(again, Err(CompletionError::MissingAllocation(JobId(1))));
    }

    #[test]
    fn test_last_input_delivery_queues_crafting() {
        let mut world = World::new(GridMap::open(8, 8));
        let kitchen = world.add_station(WorkplaceType::Kitchen, TileCoord::new(5, 5));
        let recipe = Recipe::new(
            "Stew",
            Profession::Chef,
            &[(ResourceType::Vegetable, 2)],
            (ResourceType::Meal, 1),
        );
        world.stations.get_mut(&kitchen).unwrap().recipe = Some(recipe);
        let veg = world.spawn_item(ResourceType::Vegetable, 2, TileCoord::new(1, 1));
        let destination = world.destination_for(HaulingTargetType::Furniture, kitchen).unwrap();
        let registry = CompletionRegistry::builtin();

        let first = world.plan_item_hauling(veg, 1, destination, None).unwrap();
        let second = world.plan_item_hauling(veg, 1, destination, None).unwrap();
        let haul_first = job(HAULING, TileCoord::new(1, 1)).with_hauling_allocation(first);
        let (_, _, follow_ons) = run(&registry, "haul", &haul_first, &mut world);
        assert!(follow_ons.is_empty());

        let haul_second = job(HAULING, TileCoord::new(1, 1)).with_hauling_allocation(second);
        let (_, _, follow_ons) = run(&registry, "haul", &haul_second, &mut world);
        assert_eq!(follow_ons, vec![FollowOn::Craft { station: kitchen }]);
    }

    #[test]
    fn test_construct_wall_blocks_tile() {
        let mut world = World::new(GridMap::open(8, 8));
        let at = TileCoord::new(3, 3);
        let blocks = world.spawn_item(ResourceType::StoneBlock, 4, TileCoord::new(1, 1));
        let site = world.add_construction(StructureType::Wall, at, ResourceType::StoneBlock);
        let destination = world.destination_for(HaulingTargetType::Construction, site).unwrap();
        let hauling = world.plan_item_hauling(blocks, 4, destination, None).unwrap();
        world.complete_hauling(&hauling);
        let registry = CompletionRegistry::builtin();

        let build = job(MINING, at).with_target(site);
        let (result, events, _) = run(&registry, "construct", &build, &mut world);
        assert_eq!(result, Ok(()));
        assert_eq!(
            events,
            vec![JobEvent::ConstructionCompleted { construction: site, location: at }]
        );
        assert_eq!(world.map.wall_at(at), Some(Wall::constructed(MaterialType::Stone)));
    }

    #[test]
    fn test_craft_consumes_inputs_and_notifies_station() {
        let mut world = World::new(GridMap::open(8, 8));
        let kitchen = world.add_station(WorkplaceType::Kitchen, TileCoord::new(5, 5));
        let recipe = Recipe::new(
            "Stew",
            Profession::Chef,
            &[(ResourceType::Vegetable, 2)],
            (ResourceType::Meal, 1),
        );
        world.stations.get_mut(&kitchen).unwrap().recipe = Some(recipe.clone());
        let registry = CompletionRegistry::builtin();

        let mut cook = job(HAULING, TileCoord::new(5, 5)).with_target(kitchen);
        cook.recipe = Some(recipe);
        let (missing, _, _) = run(&registry, "craft", &cook, &mut world);
        assert_eq!(missing, Err(CompletionError::MissingAllocation(JobId(1))));

        let veg = world.spawn_item(ResourceType::Vegetable, 2, TileCoord::new(1, 1));
        let destination = world.destination_for(HaulingTargetType::Furniture, kitchen).unwrap();
        let hauling = world.plan_item_hauling(veg, 2, destination, None).unwrap();
        world.complete_hauling(&hauling);

        let (result, events, _) = run(&registry, "craft", &cook, &mut world);
        assert_eq!(result, Ok(()));
        assert_eq!(world.stations[&kitchen].completed_crafts, 1);
        let meal = world.items.items_at(TileCoord::new(5, 5)).next().unwrap();
        assert_eq!(meal.resource_type, ResourceType::Meal);
        assert_eq!(
            events,
            vec![JobEvent::EntityJobCompleted {
                entity: kitchen,
                job: JobId(1),
                worker: Some(EntityId(500)),
            }]
        );
    }

    fn ring_bell(ctx: &mut CompletionContext<'_>) -> Result<(), CompletionError> {
        ctx.events.push(JobEvent::SoundRequested {
            asset: "bell".to_string(),
            location: TileCoord::new(0, 0),
        });
        Ok(())
    }

    #[test]
    fn test_custom_effect_registration() {
        let mut registry = CompletionRegistry::new();
        registry.register("ring_bell", ring_bell);
        let mut world = World::new(GridMap::open(2, 2));
        let ring = job(HARVEST, TileCoord::new(0, 0));
        let (result, events, _) = run(&registry, "ring_bell", &ring, &mut world);
        assert_eq!(result, Ok(()));
        assert_eq!(events.len(), 1);
        assert!(registry.get("missing").is_none());
    }
}
