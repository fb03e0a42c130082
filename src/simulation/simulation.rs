//! Scheduler facade and demo colony
//!
//! `JobSystem` owns the scheduler components and runs them in a fixed order
//! each tick: the assigned-job sweep, one accessibility evaluation, then a
//! batch of job requests. `Colony` wires a `JobSystem` to a world and a roster
//! with a plain worker routine (ask, claim, walk, work, finish) so the whole
//! lifecycle can be driven end to end.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::simulation::activity_log::{ActivityLog, ActivityStats};
use crate::simulation::colonists::professions::Profession;
use crate::simulation::colonists::roster::{Roster, WorkerBehaviors};
use crate::simulation::colonists::types::{Colonist, ColonistActivityState};
use crate::simulation::error::{ClaimError, JobCreationError};
use crate::simulation::jobs::accessibility::{
    entry_tiles, AccessibilityOutcome, AccessibilityReport, JobAccessibilityUpdater,
};
use crate::simulation::jobs::assignment::{JobRequestHandler, RequestId};
use crate::simulation::jobs::definitions::{JobTypeDictionary, FELLING, HARVEST, MINING};
use crate::simulation::jobs::factory::{Designation, DesignationTarget, JobFactory};
use crate::simulation::jobs::messages::JobMessageHandler;
use crate::simulation::jobs::processing::{CompletionRegistry, JobEvent};
use crate::simulation::jobs::store::{JobStore, SweepOutcome};
use crate::simulation::jobs::types::{Job, JobId, JobState};
use crate::simulation::map::{GridMap, TileMap, Wall};
use crate::simulation::params::SchedulerParams;
use crate::simulation::structures::StructureType;
use crate::simulation::types::{EntityId, MaterialType, ResourceType, TileCoord};
use crate::simulation::workplaces::Recipe;
use crate::simulation::world::{HaulingDestination, PlantKind, World};

/// What one scheduler tick did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickReport {
    pub sweep: SweepOutcome,
    pub accessibility: AccessibilityReport,
    /// Job requests answered this tick
    pub answered: usize,
}

/// The job scheduler: store, accessibility updater, request handler and
/// lifecycle handler behind one API
#[derive(Debug)]
pub struct JobSystem {
    params: SchedulerParams,
    store: JobStore,
    accessibility: JobAccessibilityUpdater,
    requests: JobRequestHandler,
    messages: JobMessageHandler,
    current_tick: u64,
}

impl JobSystem {
    pub fn new(params: SchedulerParams) -> Self {
        Self::with_job_types(params, JobTypeDictionary::builtin())
    }

    pub fn with_job_types(params: SchedulerParams, dictionary: JobTypeDictionary) -> Self {
        let factory = JobFactory::new(dictionary, params.default_priority);
        JobSystem {
            store: JobStore::new(params.assigned_sweep_interval),
            accessibility: JobAccessibilityUpdater::new(params.inaccessible_retry_interval),
            requests: JobRequestHandler::new(params.min_requests_per_tick),
            messages: JobMessageHandler::new(
                factory,
                CompletionRegistry::builtin(),
                params.activity_log_capacity,
            ),
            params,
            current_tick: 0,
        }
    }

    pub fn params(&self) -> &SchedulerParams {
        &self.params
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn activity(&self) -> &ActivityLog {
        self.messages.activity()
    }

    pub fn completions_mut(&mut self) -> &mut CompletionRegistry {
        self.messages.completions_mut()
    }

    /// Run one scheduler tick of `delta` simulated seconds
    pub fn tick<R: Rng>(
        &mut self,
        delta: f32,
        map: &dyn TileMap,
        workers: &dyn WorkerBehaviors,
        rng: &mut R,
    ) -> TickReport {
        self.current_tick += 1;
        self.messages.set_tick(self.current_tick);

        let sweep = self.store.update(delta, workers);
        if let SweepOutcome::Purged(id) = sweep {
            debug!(job = %id, "stale assigned entry purged");
        }
        self.messages.record_sweep(&self.store, sweep);

        let accessibility = self.accessibility.update(delta, &mut self.store, map, workers, rng);
        match accessibility.outcome {
            AccessibilityOutcome::Assignable { job, worker } => {
                debug!(job = %job, worker = %worker, "job assignable");
            }
            AccessibilityOutcome::Inaccessible(job) => debug!(job = %job, "job inaccessible"),
            AccessibilityOutcome::Idle | AccessibilityOutcome::Deferred(_) => {}
        }

        let answered = self.requests.update(&self.store);
        TickReport {
            sweep,
            accessibility,
            answered,
        }
    }

    /// Queue an idle worker's request for work
    pub fn request_job(
        &mut self,
        requester: EntityId,
        location: TileCoord,
        professions: &[Profession],
        callback: impl FnOnce(Vec<JobId>) + 'static,
    ) -> RequestId {
        self.requests.request(requester, location, professions, callback)
    }

    pub fn cancel_request(&mut self, id: RequestId) -> bool {
        self.requests.cancel(id)
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.pending()
    }

    /// Add a job built by hand. Its id is replaced by a fresh one.
    pub fn add_job(&mut self, job: Job) -> Result<JobId, JobCreationError> {
        self.messages.add_job(&mut self.store, job)
    }

    pub fn create_job(
        &mut self,
        job_type: &str,
        location: TileCoord,
        map: &dyn TileMap,
    ) -> Result<JobId, JobCreationError> {
        self.messages.create_job(&mut self.store, job_type, location, map)
    }

    pub fn designate(
        &mut self,
        world: &World,
        designation: &Designation,
        target: DesignationTarget,
    ) -> Option<JobId> {
        self.messages.apply_designation(&mut self.store, world, designation, target)
    }

    pub fn remove_designation(
        &mut self,
        world: &mut World,
        workers: &mut dyn WorkerBehaviors,
        designation: &Designation,
        target: DesignationTarget,
    ) -> usize {
        self.messages
            .designation_removed(&mut self.store, world, workers, designation, target)
    }

    pub fn request_hauling(
        &mut self,
        world: &mut World,
        item: EntityId,
        quantity: u32,
        destination: HaulingDestination,
        requester: Option<EntityId>,
    ) -> Result<JobId, JobCreationError> {
        self.messages
            .request_hauling(&mut self.store, world, item, quantity, destination, requester)
    }

    pub fn request_liquid_transfer(
        &mut self,
        world: &mut World,
        container: EntityId,
        quantity: f32,
        destination: HaulingDestination,
        requester: Option<EntityId>,
    ) -> Result<JobId, JobCreationError> {
        self.messages
            .request_liquid_transfer(
                &mut self.store,
                world,
                container,
                quantity,
                destination,
                requester,
            )
    }

    pub fn request_crafting(
        &mut self,
        world: &mut World,
        station: EntityId,
        recipe: Recipe,
    ) -> Result<Vec<JobId>, JobCreationError> {
        self.messages.request_crafting(&mut self.store, world, station, recipe)
    }

    pub fn request_construction_materials(
        &mut self,
        world: &mut World,
        construction: EntityId,
    ) -> Vec<JobId> {
        self.messages
            .request_construction_materials(&mut self.store, world, construction)
    }

    pub fn haul_to_stockpile(&mut self, world: &mut World, item: EntityId) -> Option<JobId> {
        self.messages.haul_to_stockpile(&mut self.store, world, item)
    }

    pub fn claim(&mut self, job: JobId, worker: EntityId) -> Result<(), ClaimError> {
        self.messages.claim(&mut self.store, job, worker)
    }

    pub fn assignment_cancelled(
        &mut self,
        world: &mut World,
        workers: &mut dyn WorkerBehaviors,
        job: JobId,
    ) -> bool {
        self.messages.assignment_cancelled(&mut self.store, world, workers, job)
    }

    pub fn job_completed<R: Rng>(
        &mut self,
        world: &mut World,
        workers: &mut dyn WorkerBehaviors,
        rng: &mut R,
        job: JobId,
        worker: Option<EntityId>,
    ) -> bool {
        self.messages
            .job_completed(&mut self.store, world, workers, rng, job, worker)
    }

    pub fn remove_job(
        &mut self,
        world: &mut World,
        workers: &mut dyn WorkerBehaviors,
        job: JobId,
    ) -> bool {
        self.messages.remove_job(&mut self.store, world, workers, job)
    }

    pub fn entity_destroyed(
        &mut self,
        world: &mut World,
        workers: &mut dyn WorkerBehaviors,
        entity: EntityId,
    ) -> usize {
        self.messages.entity_destroyed(&mut self.store, world, workers, entity)
    }

    pub fn revalidate_stockpile(
        &mut self,
        world: &mut World,
        workers: &mut dyn WorkerBehaviors,
        stockpile: EntityId,
    ) -> usize {
        self.messages.revalidate_stockpile(&mut self.store, world, workers, stockpile)
    }

    /// Move a job between states; used by collaborators that drive the
    /// state machine directly, e.g. tests and tools
    pub fn switch_state(&mut self, job: JobId, state: JobState) -> bool {
        self.store.switch_state(job, state)
    }

    pub fn drain_events(&mut self) -> Vec<JobEvent> {
        self.messages.drain_events()
    }
}

/// Simulated seconds per demo tick
pub const TICK_SECONDS: f32 = 0.1;

/// Logs a felled tree leaves behind
const LOGS_PER_TREE: u32 = 3;

/// Shape of a generated demo colony
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColonyConfig {
    pub width: usize,
    pub height: usize,
    pub workers: usize,
    pub trees: usize,
    pub crops: usize,
}

impl Default for ColonyConfig {
    fn default() -> Self {
        ColonyConfig {
            width: 32,
            height: 24,
            workers: 6,
            trees: 8,
            crops: 6,
        }
    }
}

/// Counters for a demo run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColonyStats {
    pub ticks: u64,
    pub requests_made: u64,
    pub claims_rejected: u64,
    pub jobs_completed: u64,
    pub interruptions: u64,
    /// Assignments given up because the worker could not find a way there
    pub abandoned: u64,
}

/// End-of-run snapshot printed by the demo
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColonySummary {
    pub ticks: u64,
    pub stats: ColonyStats,
    pub jobs_remaining: usize,
    pub jobs_by_state: BTreeMap<String, usize>,
    pub loose_items: usize,
    pub stockpiled: u32,
    pub activity: ActivityStats,
}

type Offers = Rc<RefCell<BTreeMap<EntityId, Vec<JobId>>>>;

/// A world, its colonists and the scheduler serving them
#[derive(Debug)]
pub struct Colony {
    pub world: World,
    pub roster: Roster,
    pub jobs: JobSystem,
    /// Answers to job requests, written by request callbacks
    offers: Offers,
    pub stats: ColonyStats,
}

/// Profession sets handed out to generated colonists in turn
const PROFESSION_MIX: &[&[Profession]] = &[
    &[Profession::Miner, Profession::Hauler],
    &[Profession::Lumberjack, Profession::Hauler],
    &[Profession::Farmer],
    &[Profession::Hauler, Profession::Stonemason],
    &[Profession::Miner],
    &[Profession::Carpenter, Profession::Hauler],
];

impl Colony {
    pub fn new(world: World, roster: Roster, jobs: JobSystem) -> Self {
        Colony {
            world,
            roster,
            jobs,
            offers: Rc::new(RefCell::new(BTreeMap::new())),
            stats: ColonyStats::default(),
        }
    }

    /// Build a seeded colony: a rock face to dig on the east side, trees and
    /// crops to the west, a stockpile, a door site and a handful of workers
    pub fn generate<R: Rng>(
        config: &ColonyConfig,
        params: SchedulerParams,
        dictionary: JobTypeDictionary,
        rng: &mut R,
    ) -> Self {
        let width = config.width.max(12);
        let height = config.height.max(8);
        let rock_x = (width * 2 / 3) as i32;

        let mut stone = Vec::new();
        let mut ore = Vec::new();
        for x in rock_x..width as i32 {
            for y in 0..height as i32 {
                if rng.gen_bool(0.1) {
                    ore.push(TileCoord::new(x, y));
                } else {
                    stone.push(TileCoord::new(x, y));
                }
            }
        }
        let mut map = GridMap::open(width, height);
        map.set_walls(stone, Wall::natural(MaterialType::Stone));
        map.set_walls(ore, Wall::natural(MaterialType::Metal));
        let mut world = World::new(map);

        let stockpile_tiles = vec![
            TileCoord::new(1, 1),
            TileCoord::new(2, 1),
            TileCoord::new(1, 2),
            TileCoord::new(2, 2),
        ];
        world.add_stockpile(
            stockpile_tiles.clone(),
            20,
            &[
                ResourceType::Boulder,
                ResourceType::Ore,
                ResourceType::Logs,
                ResourceType::Vegetable,
            ],
        );

        let mut open: Vec<TileCoord> = (4..rock_x - 1)
            .flat_map(|x| (0..height as i32).map(move |y| TileCoord::new(x, y)))
            .filter(|c| !stockpile_tiles.contains(c))
            .collect();
        open.shuffle(rng);
        let mut open = open.into_iter();
        let trees: Vec<EntityId> = open
            .by_ref()
            .take(config.trees)
            .map(|at| world.add_plant(PlantKind::Tree, at, LOGS_PER_TREE))
            .collect();
        let crops: Vec<EntityId> = open
            .by_ref()
            .take(config.crops)
            .map(|at| {
                let produce = rng.gen_range(1..=3);
                world.add_plant(PlantKind::Crop(ResourceType::Vegetable), at, produce)
            })
            .collect();

        let door_at = TileCoord::new(3, height as i32 / 2);
        world.spawn_item(ResourceType::StoneBlock, 2, TileCoord::new(0, height as i32 - 1));
        let door = world.add_construction(StructureType::Door, door_at, ResourceType::StoneBlock);

        let mut roster = Roster::new();
        let spawn = TileCoord::new(rock_x / 2, height as i32 / 2);
        for i in 0..config.workers {
            let professions = PROFESSION_MIX[i % PROFESSION_MIX.len()];
            let id = world.ids.next_entity();
            roster.add(Colonist::new(id, format!("Colonist {}", i + 1), spawn, professions));
        }

        let mut jobs = JobSystem::with_job_types(params, dictionary);
        let dig = Designation::new("Dig", MINING);
        for x in rock_x..(rock_x + 3).min(width as i32) {
            for y in 0..height as i32 {
                jobs.designate(&world, &dig, DesignationTarget::Tile(TileCoord::new(x, y)));
            }
        }
        let fell = Designation::new("Chop", FELLING);
        for tree in trees {
            jobs.designate(&world, &fell, DesignationTarget::Entity(tree));
        }
        let harvest = Designation::new("Harvest", HARVEST);
        for crop in crops {
            jobs.designate(&world, &harvest, DesignationTarget::Entity(crop));
        }
        jobs.request_construction_materials(&mut world, door);

        info!(
            width,
            height,
            workers = roster.len(),
            jobs = jobs.store().len(),
            "colony generated"
        );
        Colony::new(world, roster, jobs)
    }

    /// One simulation tick: scheduler first, then every colonist, then the
    /// events completed jobs raised
    pub fn step<R: Rng>(&mut self, delta: f32, rng: &mut R) -> TickReport {
        let report = self.jobs.tick(delta, &self.world.map, &self.roster, rng);

        let ids: Vec<EntityId> = self.roster.colonists.keys().copied().collect();
        for id in ids {
            self.advance_worker(id, delta, rng);
        }
        for event in self.jobs.drain_events() {
            self.handle_event(event);
        }
        self.stats.ticks += 1;
        report
    }

    /// Kill a colonist without telling the scheduler; the sweep notices
    pub fn kill_colonist(&mut self, id: EntityId) {
        if let Some(colonist) = self.roster.get_mut(id) {
            colonist.is_alive = false;
            colonist.clear_job();
        }
    }

    pub fn summary(&self) -> ColonySummary {
        let store = self.jobs.store();
        let jobs_by_state = JobState::live()
            .iter()
            .map(|state| (state.name().to_string(), store.count_in_state(*state)))
            .collect();
        ColonySummary {
            ticks: self.stats.ticks,
            stats: self.stats.clone(),
            jobs_remaining: store.len(),
            jobs_by_state,
            loose_items: self.world.items.len(),
            stockpiled: self.world.stockpiles.values().map(|s| s.total_stored()).sum(),
            activity: self.jobs.activity().stats.clone(),
        }
    }

    fn advance_worker<R: Rng>(&mut self, id: EntityId, delta: f32, rng: &mut R) {
        let Some(colonist) = self.roster.get_mut(id) else {
            return;
        };
        if !colonist.is_alive {
            return;
        }
        if colonist.interrupted {
            colonist.interrupted = false;
            self.stats.interruptions += 1;
            return;
        }

        let state = colonist.activity_state;
        match state {
            ColonistActivityState::Idle => {
                colonist.activity_state = ColonistActivityState::AwaitingWork;
                let location = colonist.location;
                let professions = colonist.active_professions.clone();
                let offers = Rc::clone(&self.offers);
                self.jobs.request_job(id, location, &professions, move |jobs| {
                    offers.borrow_mut().insert(id, jobs);
                });
                self.stats.requests_made += 1;
            }
            ColonistActivityState::AwaitingWork => {
                let offered = self.offers.borrow_mut().remove(&id);
                if let Some(offered) = offered {
                    self.take_first_available(id, offered);
                }
            }
            ColonistActivityState::Traveling => self.travel(id),
            ColonistActivityState::Working => self.work(id, delta, rng),
        }
    }

    /// Claim the best offered job still up for grabs
    fn take_first_available(&mut self, id: EntityId, offered: Vec<JobId>) {
        for job in offered {
            match self.jobs.claim(job, id) {
                Ok(()) => {
                    if let Some(colonist) = self.roster.get_mut(id) {
                        colonist.current_job = Some(job);
                        colonist.activity_state = ColonistActivityState::Traveling;
                    }
                    return;
                }
                Err(err) => {
                    debug!(worker = %id, job = %job, error = %err, "claim rejected");
                    self.stats.claims_rejected += 1;
                }
            }
        }
        if let Some(colonist) = self.roster.get_mut(id) {
            colonist.activity_state = ColonistActivityState::Idle;
        }
    }

    fn travel(&mut self, id: EntityId) {
        let Some((job_id, at)) = self
            .roster
            .get(id)
            .and_then(|c| c.current_job.map(|job| (job, c.location)))
        else {
            self.drop_job(id);
            return;
        };
        let Some(job) = self.jobs.store().get(job_id) else {
            self.drop_job(id);
            return;
        };
        let Some(target) = job.location() else {
            self.abandon(id, job_id);
            return;
        };
        let goals = entry_tiles(&self.world.map, job.job_type(), target);
        let work_time = job.work_time;

        if goals.contains(&at) {
            if let Some(colonist) = self.roster.get_mut(id) {
                colonist.activity_state = ColonistActivityState::Working;
                colonist.work_remaining = work_time;
            }
            return;
        }
        match next_step(&self.world.map, at, &goals) {
            Some(step) => {
                if let Some(colonist) = self.roster.get_mut(id) {
                    colonist.location = step;
                }
            }
            None => self.abandon(id, job_id),
        }
    }

    fn work<R: Rng>(&mut self, id: EntityId, delta: f32, rng: &mut R) {
        let Some(colonist) = self.roster.get_mut(id) else {
            return;
        };
        let Some(job) = colonist.current_job else {
            colonist.clear_job();
            return;
        };
        colonist.work_remaining -= delta;
        if colonist.work_remaining > 0.0 {
            return;
        }
        colonist.clear_job();
        if self
            .jobs
            .job_completed(&mut self.world, &mut self.roster, rng, job, Some(id))
        {
            self.stats.jobs_completed += 1;
        }
    }

    /// No way to the job: hand it back to the scheduler
    fn abandon(&mut self, id: EntityId, job: JobId) {
        self.drop_job(id);
        self.stats.abandoned += 1;
        self.jobs
            .assignment_cancelled(&mut self.world, &mut self.roster, job);
    }

    fn drop_job(&mut self, id: EntityId) {
        if let Some(colonist) = self.roster.get_mut(id) {
            colonist.clear_job();
        }
    }

    fn handle_event(&mut self, event: JobEvent) {
        match event {
            // The tree comes down here; its logs go to a stockpile
            JobEvent::TreeFalling { location, .. } => {
                let logs = self.world.spawn_item(ResourceType::Logs, LOGS_PER_TREE, location);
                self.jobs.haul_to_stockpile(&mut self.world, logs);
            }
            JobEvent::FireStarted { location, .. } => info!(location = %location, "fire started"),
            other => debug!(event = ?other, "job event"),
        }
    }
}

/// First tile on a shortest walk from `from` to any of `goals`
fn next_step(map: &GridMap, from: TileCoord, goals: &[TileCoord]) -> Option<TileCoord> {
    let mut previous: HashMap<TileCoord, TileCoord> = HashMap::new();
    let mut frontier = VecDeque::from([from]);
    previous.insert(from, from);

    while let Some(current) = frontier.pop_front() {
        if current != from && goals.contains(&current) {
            let mut step = current;
            while let Some(&before) = previous.get(&step) {
                if before == from {
                    return Some(step);
                }
                step = before;
            }
            return None;
        }
        for neighbour in map.orthogonal_neighbours(current) {
            if map.is_navigable(neighbour) && !previous.contains_key(&neighbour) {
                previous.insert(neighbour, current);
                frontier.push_back(neighbour);
            }
        }
    }
    None
}

/// Run a generated colony for `num_ticks` ticks
pub fn run_simulation<R: Rng>(
    config: &ColonyConfig,
    params: SchedulerParams,
    dictionary: JobTypeDictionary,
    num_ticks: u64,
    rng: &mut R,
) -> Colony {
    let mut colony = Colony::generate(config, params, dictionary, rng);

    for tick in 0..num_ticks {
        colony.step(TICK_SECONDS, rng);

        // Progress reporting every 100 ticks
        if tick > 0 && tick % 100 == 0 {
            let store = colony.jobs.store();
            info!(
                tick,
                jobs = store.len(),
                assignable = store.count_in_state(JobState::Assignable),
                assigned = store.count_in_state(JobState::Assigned),
                busy = colony.roster.busy_count(),
                completed = colony.stats.jobs_completed,
                "progress"
            );
        }
    }

    colony
}
