//! Job lifecycle messages
//!
//! `JobMessageHandler` is the one place jobs are created and destroyed
//! outside of tests. It reacts to designations, resource requests, cancelled
//! assignments, completions and destroyed entities, and it is responsible for
//! releasing every allocation a dying job holds so that hauling targets see
//! their in-flight counts go down.
//!
//! Completion follows a fixed order: the job leaves the store, its effect
//! runs against the world, leftover reservations are released, and only then
//! are follow-on jobs created. Nothing here re-enters the store while an
//! effect is running.

use rand::Rng;
use tracing::{debug, error, warn};

use crate::simulation::activity_log::{ActivityCategory, ActivityLog};
use crate::simulation::colonists::roster::WorkerBehaviors;
use crate::simulation::error::{ClaimError, CompletionError, JobCreationError};
use crate::simulation::jobs::definitions::{DECONSTRUCT, MINING};
use crate::simulation::jobs::factory::{Designation, DesignationTarget, JobFactory};
use crate::simulation::jobs::processing::{
    CompletionContext, CompletionRegistry, FollowOn, JobEvent,
};
use crate::simulation::jobs::store::{JobStore, SweepOutcome};
use crate::simulation::jobs::types::{Job, JobId, JobState};
use crate::simulation::map::TileMap;
use crate::simulation::resources::allocation::HaulingTargetType;
use crate::simulation::types::{EntityId, IdGenerator, ResourceType, TileCoord};
use crate::simulation::workplaces::Recipe;
use crate::simulation::world::{HaulingDestination, World};

#[derive(Debug)]
pub struct JobMessageHandler {
    factory: JobFactory,
    completions: CompletionRegistry,
    job_ids: IdGenerator,
    events: Vec<JobEvent>,
    activity: ActivityLog,
    tick: u64,
}

impl JobMessageHandler {
    pub fn new(
        factory: JobFactory,
        completions: CompletionRegistry,
        activity_capacity: usize,
    ) -> Self {
        JobMessageHandler {
            factory,
            completions,
            job_ids: IdGenerator::new(),
            events: Vec::new(),
            activity: ActivityLog::new(activity_capacity),
            tick: 0,
        }
    }

    pub fn factory(&self) -> &JobFactory {
        &self.factory
    }

    /// Register extra completion effects
    pub fn completions_mut(&mut self) -> &mut CompletionRegistry {
        &mut self.completions
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Tick stamped on activity entries from now on
    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// Events for outside behaviors collected since the last drain
    pub fn drain_events(&mut self) -> Vec<JobEvent> {
        std::mem::take(&mut self.events)
    }

    /// Add a job built elsewhere. It is renumbered from this handler's id
    /// sequence so it can never shadow a job already in the store.
    pub fn add_job(
        &mut self,
        store: &mut JobStore,
        mut job: Job,
    ) -> Result<JobId, JobCreationError> {
        let mut id = JobId(self.job_ids.next_raw());
        while store.contains(id) {
            id = JobId(self.job_ids.next_raw());
        }
        job.id = id;
        self.register(store, job)
    }

    fn register(&mut self, store: &mut JobStore, job: Job) -> Result<JobId, JobCreationError> {
        let taken = job.id;
        let location = job.location();
        let message = format!("{} created", job.type_name());
        let Some(id) = store.add(job) else {
            let err = JobCreationError::DuplicateId(taken);
            self.note_creation_failure(&err, location);
            return Err(err);
        };
        self.activity
            .log_job(self.tick, ActivityCategory::Created, id, location, None, message);
        Ok(id)
    }

    /// Like `register`, but a refused job gives its reservations back
    fn register_reserving(
        &mut self,
        store: &mut JobStore,
        world: &mut World,
        job: Job,
    ) -> Result<JobId, JobCreationError> {
        if store.contains(job.id) {
            release_allocations(world, &job);
        }
        self.register(store, job)
    }

    /// Create and add a bare job of a named type
    pub fn create_job(
        &mut self,
        store: &mut JobStore,
        job_type: &str,
        location: TileCoord,
        map: &dyn TileMap,
    ) -> Result<JobId, JobCreationError> {
        match self.factory.create_job(&mut self.job_ids, job_type, Some(location), map) {
            Ok(job) => self.register(store, job),
            Err(err) => {
                self.note_creation_failure(&err, Some(location));
                Err(err)
            }
        }
    }

    /// A designation was placed on a tile or entity
    pub fn apply_designation(
        &mut self,
        store: &mut JobStore,
        world: &World,
        designation: &Designation,
        target: DesignationTarget,
    ) -> Option<JobId> {
        match self
            .factory
            .from_designation(&mut self.job_ids, designation, target, world)
        {
            Ok(job) => self.register(store, job).ok(),
            Err(err) => {
                let location = match target {
                    DesignationTarget::Tile(coord) => Some(coord),
                    DesignationTarget::Entity(id) => world.entity_location(id),
                };
                self.note_creation_failure(&err, location);
                None
            }
        }
    }

    /// A designation was taken off; drop the jobs it created.
    /// Returns how many jobs were removed.
    pub fn designation_removed(
        &mut self,
        store: &mut JobStore,
        world: &mut World,
        workers: &mut dyn WorkerBehaviors,
        designation: &Designation,
        target: DesignationTarget,
    ) -> usize {
        let created_by = |job: &Job| {
            job.type_name() == designation.job_type
                || (designation.job_type == MINING && job.type_name() == DECONSTRUCT)
        };
        let doomed: Vec<JobId> = match target {
            DesignationTarget::Tile(location) => store
                .jobs_at_location(location)
                .iter()
                .copied()
                .filter(|id| store.get(*id).map_or(false, |job| created_by(job)))
                .collect(),
            DesignationTarget::Entity(entity) => store
                .iter()
                .filter(|job| job.target_entity == Some(entity) && created_by(*job))
                .map(|job| job.id)
                .collect(),
        };

        let mut removed = 0;
        for id in doomed {
            if self.remove_job(store, world, workers, id) {
                removed += 1;
            }
        }
        removed
    }

    /// Carry part of an item stack somewhere. On error nothing is reserved.
    pub fn request_hauling(
        &mut self,
        store: &mut JobStore,
        world: &mut World,
        item: EntityId,
        quantity: u32,
        destination: HaulingDestination,
        requester: Option<EntityId>,
    ) -> Result<JobId, JobCreationError> {
        match self
            .factory
            .create_hauling_job(&mut self.job_ids, world, item, quantity, destination, requester)
        {
            Ok(job) => self.register_reserving(store, world, job),
            Err(err) => {
                self.note_creation_failure(&err, Some(destination.position));
                Err(err)
            }
        }
    }

    /// Move liquid out of a container, into another or dumped in a zone
    pub fn request_liquid_transfer(
        &mut self,
        store: &mut JobStore,
        world: &mut World,
        container: EntityId,
        quantity: f32,
        destination: HaulingDestination,
        requester: Option<EntityId>,
    ) -> Result<JobId, JobCreationError> {
        match self.factory.create_liquid_transfer_job(
            &mut self.job_ids,
            world,
            container,
            quantity,
            destination,
            requester,
        ) {
            Ok(job) => self.register_reserving(store, world, job),
            Err(err) => {
                self.note_creation_failure(&err, Some(destination.position));
                Err(err)
            }
        }
    }

    /// Set a station working on a recipe.
    ///
    /// Missing inputs are hauled in first; the crafting job itself is created
    /// when the last input lands. If the station already holds everything the
    /// crafting job is created straight away. Returns the jobs created now.
    pub fn request_crafting(
        &mut self,
        store: &mut JobStore,
        world: &mut World,
        station: EntityId,
        recipe: Recipe,
    ) -> Result<Vec<JobId>, JobCreationError> {
        let entry = world
            .stations
            .get_mut(&station)
            .ok_or(JobCreationError::MissingTarget(station))?;
        let missing: Vec<(ResourceType, u32)> = recipe
            .inputs
            .iter()
            .map(|(resource, needed)| {
                let covered = entry.input(*resource) + entry.pending_input(*resource);
                (*resource, needed.saturating_sub(covered))
            })
            .filter(|(_, quantity)| *quantity > 0)
            .collect();
        let ready = entry.has_inputs_for(&recipe);
        entry.recipe = Some(recipe.clone());

        if ready {
            let job = self
                .factory
                .create_crafting_job(&mut self.job_ids, world, station, recipe)?;
            return Ok(vec![self.register(store, job)?]);
        }

        let Some(destination) = world.destination_for(HaulingTargetType::Furniture, station) else {
            return Err(JobCreationError::NoLocation);
        };
        let mut created = Vec::new();
        for (resource, quantity) in missing {
            created.extend(self.haul_resource_to(store, world, resource, quantity, destination));
        }
        Ok(created)
    }

    /// Haul in whatever a construction site still lacks
    pub fn request_construction_materials(
        &mut self,
        store: &mut JobStore,
        world: &mut World,
        construction: EntityId,
    ) -> Vec<JobId> {
        let Some(site) = world.constructions.get(&construction) else {
            return Vec::new();
        };
        if site.is_ready_to_build() {
            return self.construct(store, world, construction).into_iter().collect();
        }
        let (resource, outstanding) = (site.resource, site.outstanding());
        match world.destination_for(HaulingTargetType::Construction, construction) {
            Some(destination) => {
                self.haul_resource_to(store, world, resource, outstanding, destination)
            }
            None => Vec::new(),
        }
    }

    /// Send a loose item to the nearest stockpile that takes it
    pub fn haul_to_stockpile(
        &mut self,
        store: &mut JobStore,
        world: &mut World,
        item: EntityId,
    ) -> Option<JobId> {
        let (resource, location, available) = world
            .items
            .get(item)
            .map(|i| (i.resource_type, i.location, i.unallocated_quantity()))?;
        if available == 0 {
            return None;
        }
        let Some(pile) = world.find_stockpile_for(resource, location) else {
            debug!(item = %item, resource = %resource, "no stockpile takes this resource");
            return None;
        };
        let room = world.stockpiles.get(&pile).map_or(0, |s| s.free_capacity());
        let destination = world.destination_for(HaulingTargetType::Room, pile)?;
        self.request_hauling(store, world, item, available.min(room), destination, None)
            .ok()
    }

    /// Accept a worker's claim and record it
    pub fn claim(
        &mut self,
        store: &mut JobStore,
        id: JobId,
        worker: EntityId,
    ) -> Result<(), ClaimError> {
        store.claim(id, worker)?;
        let location = store.get(id).and_then(|job| job.location());
        self.activity.log_job(
            self.tick,
            ActivityCategory::Assigned,
            id,
            location,
            Some(worker),
            format!("claimed by {worker}"),
        );
        Ok(())
    }

    /// Remove a job and release everything it reserved.
    /// Removing a job that is already gone does nothing.
    pub fn remove_job(
        &mut self,
        store: &mut JobStore,
        world: &mut World,
        workers: &mut dyn WorkerBehaviors,
        id: JobId,
    ) -> bool {
        let Some(job) = store.remove(id, workers) else {
            return false;
        };
        release_allocations(world, &job);
        self.activity.log_job(
            self.tick,
            ActivityCategory::Removed,
            id,
            job.location(),
            None,
            format!("{} removed", job.type_name()),
        );
        true
    }

    /// The assigned worker gave the job up (reassigned, died, gave up).
    ///
    /// Jobs whose type asks for it are removed; the rest go back for another
    /// accessibility check at their target's current position.
    pub fn assignment_cancelled(
        &mut self,
        store: &mut JobStore,
        world: &mut World,
        workers: &mut dyn WorkerBehaviors,
        id: JobId,
    ) -> bool {
        let Some(job) = store.get(id) else {
            return false;
        };
        let remove = job.job_type.remove_job_when_assignment_cancelled;
        let target = job.target_entity;
        let worker = store.unassign(id);

        if remove {
            return self.remove_job(store, world, workers, id);
        }
        if let Some(location) = target.and_then(|t| world.entity_location(t)) {
            store.relocate(id, location);
        }
        store.switch_state(id, JobState::PotentiallyAccessible);
        debug!(job = %id, worker = ?worker, "assignment cancelled, job requeued");
        true
    }

    /// A worker finished a job. Returns false if the job was already gone.
    ///
    /// A failing or missing completion effect is logged; the job is removed
    /// either way.
    pub fn job_completed<R: Rng>(
        &mut self,
        store: &mut JobStore,
        world: &mut World,
        workers: &mut dyn WorkerBehaviors,
        rng: &mut R,
        id: JobId,
        worker: Option<EntityId>,
    ) -> bool {
        // The finishing worker is not interrupted by the removal
        store.unassign(id);
        let Some(job) = store.remove(id, workers) else {
            return false;
        };
        let location = job.location();

        let effect = job
            .job_type
            .completion_effect
            .as_deref()
            .and_then(|key| self.completions.get(key));
        let mut ctx = CompletionContext::new(&job, worker, world);
        let result = match effect {
            Some(effect) => effect.apply(&mut ctx),
            None => Err(CompletionError::UnknownJobType(job.type_name().to_string())),
        };
        let CompletionContext {
            events, follow_ons, ..
        } = ctx;

        match &result {
            Ok(()) => self.activity.log_job(
                self.tick,
                ActivityCategory::Completed,
                id,
                location,
                worker,
                format!("{} completed", job.type_name()),
            ),
            Err(err) => {
                if matches!(err, CompletionError::UnknownJobType(_)) {
                    error!(job = %id, error = %err, "job completed with no completion effect");
                } else {
                    warn!(job = %id, error = %err, "completion effect failed");
                }
                let message = err.to_string();
                self.activity
                    .log_job(self.tick, ActivityCategory::Error, id, location, worker, message);
            }
        }

        self.events.extend(events);
        if result.is_ok() {
            if let Some(location) = location {
                self.side_effects(&job, location, rng);
            }
        }
        release_allocations(world, &job);

        for follow_on in follow_ons {
            self.resolve_follow_on(store, world, follow_on);
        }
        true
    }

    /// An entity left the world: drop every job that targets it or hauls
    /// to or from it, then destroy it. Returns how many jobs were removed.
    pub fn entity_destroyed(
        &mut self,
        store: &mut JobStore,
        world: &mut World,
        workers: &mut dyn WorkerBehaviors,
        entity: EntityId,
    ) -> usize {
        let doomed: Vec<JobId> = store
            .iter()
            .filter(|job| involves(job, entity))
            .map(|job| job.id)
            .collect();
        let mut removed = 0;
        for id in doomed {
            if self.remove_job(store, world, workers, id) {
                removed += 1;
            }
        }
        world.destroy_entity(entity);
        removed
    }

    /// Cancel hauls into a stockpile that no longer takes what they carry
    pub fn revalidate_stockpile(
        &mut self,
        store: &mut JobStore,
        world: &mut World,
        workers: &mut dyn WorkerBehaviors,
        stockpile: EntityId,
    ) -> usize {
        let pile = world.stockpiles.get(&stockpile);
        let doomed: Vec<JobId> = store
            .iter()
            .filter_map(|job| {
                let hauling = job.hauling_allocation()?;
                if hauling.target_type != HaulingTargetType::Room
                    || hauling.target_id != Some(stockpile)
                {
                    return None;
                }
                let accepted = match (pile, hauling.resource_type()) {
                    (Some(pile), Some(resource)) => pile.accepts(resource),
                    _ => false,
                };
                (!accepted).then_some(job.id)
            })
            .collect();

        let mut removed = 0;
        for id in doomed {
            if self.remove_job(store, world, workers, id) {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(stockpile = %stockpile, removed, "stockpile revalidated");
        }
        removed
    }

    /// Record what the store's periodic sweep found
    pub fn record_sweep(&mut self, store: &JobStore, outcome: SweepOutcome) {
        if let SweepOutcome::Orphaned { job, worker } = outcome {
            let location = store.get(job).and_then(|j| j.location());
            self.activity.log_job(
                self.tick,
                ActivityCategory::Orphaned,
                job,
                location,
                Some(worker),
                format!("{worker} no longer working on it"),
            );
        }
    }

    fn side_effects<R: Rng>(&mut self, job: &Job, location: TileCoord, rng: &mut R) {
        if let Some(chance) = job.job_type.may_start_fire {
            if chance > 0.0 && rng.gen::<f32>() < chance {
                warn!(job = %job.id, location = %location, "fire started");
                self.events.push(JobEvent::FireStarted { job: job.id, location });
            }
        }
        if let Some(asset) = &job.job_type.completion_sound {
            self.events.push(JobEvent::SoundRequested {
                asset: asset.clone(),
                location,
            });
        }
        if let Some(effect) = &job.job_type.work_particle_effect {
            self.events.push(JobEvent::ParticleRequested {
                effect: effect.clone(),
                location,
            });
        }
    }

    fn resolve_follow_on(&mut self, store: &mut JobStore, world: &mut World, follow_on: FollowOn) {
        match follow_on {
            FollowOn::HaulToStockpile { item } => {
                self.haul_to_stockpile(store, world, item);
            }
            FollowOn::Construct { construction } => {
                self.construct(store, world, construction);
            }
            FollowOn::Craft { station } => {
                let recipe = world.stations.get(&station).and_then(|s| s.recipe.clone());
                let Some(recipe) = recipe else {
                    return;
                };
                match self
                    .factory
                    .create_crafting_job(&mut self.job_ids, world, station, recipe)
                {
                    Ok(job) => {
                        // A refused job has already been logged
                        let _ = self.register(store, job);
                    }
                    Err(err) => self.note_creation_failure(&err, world.entity_location(station)),
                }
            }
        }
    }

    fn construct(
        &mut self,
        store: &mut JobStore,
        world: &World,
        construction: EntityId,
    ) -> Option<JobId> {
        match self
            .factory
            .create_construction_job(&mut self.job_ids, world, construction)
        {
            Ok(job) => self.register(store, job).ok(),
            Err(err) => {
                self.note_creation_failure(&err, world.entity_location(construction));
                None
            }
        }
    }

    /// Reserve `needed` units of a resource from the nearest loose stacks
    fn haul_resource_to(
        &mut self,
        store: &mut JobStore,
        world: &mut World,
        resource: ResourceType,
        mut needed: u32,
        destination: HaulingDestination,
    ) -> Vec<JobId> {
        let mut sources: Vec<(i64, EntityId, u32)> = world
            .items
            .iter()
            .filter(|item| item.resource_type == resource && item.unallocated_quantity() > 0)
            .map(|item| {
                (
                    item.location.distance_squared(&destination.position),
                    item.id,
                    item.unallocated_quantity(),
                )
            })
            .collect();
        sources.sort();

        let mut created = Vec::new();
        for (_, item, available) in sources {
            if needed == 0 {
                break;
            }
            let quantity = available.min(needed);
            match self.request_hauling(store, world, item, quantity, destination, None) {
                Ok(id) => {
                    created.push(id);
                    needed -= quantity;
                }
                Err(_) => break,
            }
        }
        if needed > 0 {
            debug!(
                resource = %resource,
                missing = needed,
                "not enough loose resource to fill request"
            );
        }
        created
    }

    fn note_creation_failure(&mut self, err: &JobCreationError, location: Option<TileCoord>) {
        let category = match err {
            JobCreationError::UnknownJobType(name) => {
                error!(job_type = %name, "no job type with this name");
                ActivityCategory::Error
            }
            JobCreationError::Allocation(reason) => {
                debug!(error = %reason, "resource request refused");
                ActivityCategory::AllocationFailed
            }
            other => {
                warn!(error = %other, "job not created");
                ActivityCategory::Error
            }
        };
        self.activity
            .log_event(self.tick, category, location, err.to_string());
    }
}

/// Give back every reservation a job holds. Harmless if already released.
fn release_allocations(world: &mut World, job: &Job) {
    if let Some(hauling) = job.hauling_allocation() {
        world.cancel_hauling(hauling);
    }
    if let Some(liquid) = &job.liquid_allocation {
        world.liquids.cancel(liquid);
    }
}

fn involves(job: &Job, entity: EntityId) -> bool {
    if job.target_entity == Some(entity) {
        return true;
    }
    if let Some(liquid) = &job.liquid_allocation {
        if liquid.container == entity {
            return true;
        }
    }
    job.hauling_allocation().map_or(false, |hauling| {
        hauling.target_id == Some(entity)
            || hauling.source_container == Some(entity)
            || hauling
                .item_allocation
                .as_ref()
                .map_or(false, |a| a.item == entity)
    })
}
