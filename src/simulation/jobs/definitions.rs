//! Job type descriptors
//!
//! A `JobType` describes what kind of work a job is: who may do it, where it
//! is done from, what happens when it is cancelled, and which completion
//! effect runs when it finishes. The configured set lives in a
//! `JobTypeDictionary`, built in or loaded from JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::simulation::colonists::professions::Profession;
use crate::simulation::error::ConfigError;

pub const MINING: &str = "MINING";
pub const DECONSTRUCT: &str = "DECONSTRUCT";
pub const FELLING: &str = "FELLING";
pub const HARVEST: &str = "HARVEST";
pub const HAULING: &str = "HAULING";
pub const LIQUID_TRANSFER: &str = "LIQUID_TRANSFER";
pub const CONSTRUCT: &str = "CONSTRUCT";
pub const CRAFTING: &str = "CRAFTING";
pub const COOKING: &str = "COOKING";
pub const TEND: &str = "TEND";

fn default_work_time() -> f32 {
    1.0
}

/// Descriptor shared by every job of one kind
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobType {
    pub name: String,
    /// `None` means any worker may do it
    #[serde(default)]
    pub required_profession: Option<Profession>,
    /// Worked from an orthogonal neighbour rather than the job's own tile
    #[serde(default)]
    pub accessed_from_adjacent_tile: bool,
    /// Remove the job instead of requeueing it when the assignment is cancelled
    #[serde(default)]
    pub remove_job_when_assignment_cancelled: bool,
    /// Chance (0..1) that completing the job starts a fire
    #[serde(default)]
    pub may_start_fire: Option<f32>,
    #[serde(default)]
    pub completion_sound: Option<String>,
    #[serde(default)]
    pub work_particle_effect: Option<String>,
    /// Key into the completion effect registry
    #[serde(default)]
    pub completion_effect: Option<String>,
    #[serde(default = "default_work_time")]
    pub work_time: f32,
}

impl JobType {
    pub fn new(name: impl Into<String>) -> Self {
        JobType {
            name: name.into(),
            required_profession: None,
            accessed_from_adjacent_tile: false,
            remove_job_when_assignment_cancelled: false,
            may_start_fire: None,
            completion_sound: None,
            work_particle_effect: None,
            completion_effect: None,
            work_time: default_work_time(),
        }
    }

    pub fn profession(mut self, profession: Profession) -> Self {
        self.required_profession = Some(profession);
        self
    }

    pub fn adjacent(mut self) -> Self {
        self.accessed_from_adjacent_tile = true;
        self
    }

    pub fn remove_on_cancel(mut self) -> Self {
        self.remove_job_when_assignment_cancelled = true;
        self
    }

    pub fn fire_chance(mut self, chance: f32) -> Self {
        self.may_start_fire = Some(chance);
        self
    }

    pub fn sound(mut self, asset: &str) -> Self {
        self.completion_sound = Some(asset.to_string());
        self
    }

    pub fn particles(mut self, effect: &str) -> Self {
        self.work_particle_effect = Some(effect.to_string());
        self
    }

    pub fn effect(mut self, key: &str) -> Self {
        self.completion_effect = Some(key.to_string());
        self
    }

    pub fn work_time(mut self, seconds: f32) -> Self {
        self.work_time = seconds;
        self
    }
}

/// The configured job types, keyed by name
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JobTypeDictionary {
    types: BTreeMap<String, JobType>,
}

impl JobTypeDictionary {
    pub fn new() -> Self {
        JobTypeDictionary {
            types: BTreeMap::new(),
        }
    }

    /// Job types the scheduler ships with
    pub fn builtin() -> Self {
        let mut dictionary = JobTypeDictionary::new();
        let builtin = [
            JobType::new(MINING)
                .profession(Profession::Miner)
                .adjacent()
                .sound("pickaxe_break")
                .particles("stone_dust")
                .effect("mining")
                .work_time(3.0),
            // Profession comes from the wall's material
            JobType::new(DECONSTRUCT)
                .adjacent()
                .sound("rubble")
                .effect("deconstruct")
                .work_time(2.5),
            JobType::new(FELLING)
                .profession(Profession::Lumberjack)
                .adjacent()
                .sound("tree_creak")
                .particles("wood_chips")
                .effect("fell_tree")
                .work_time(4.0),
            JobType::new(HARVEST)
                .profession(Profession::Farmer)
                .effect("harvest")
                .work_time(2.0),
            JobType::new(HAULING)
                .profession(Profession::Hauler)
                .remove_on_cancel()
                .effect("haul")
                .work_time(0.5),
            JobType::new(LIQUID_TRANSFER)
                .profession(Profession::Hauler)
                .adjacent()
                .remove_on_cancel()
                .effect("liquid_transfer")
                .work_time(1.0),
            // Profession comes from the construction material
            JobType::new(CONSTRUCT)
                .adjacent()
                .sound("hammering")
                .particles("sawdust")
                .effect("construct")
                .work_time(5.0),
            JobType::new(CRAFTING)
                .adjacent()
                .sound("craft_done")
                .effect("craft")
                .work_time(3.0),
            JobType::new(COOKING)
                .profession(Profession::Chef)
                .adjacent()
                .fire_chance(0.02)
                .particles("steam")
                .effect("craft")
                .work_time(3.0),
            JobType::new(TEND)
                .adjacent()
                .effect("notify_entity")
                .work_time(1.5),
        ];
        for job_type in builtin {
            dictionary.insert(job_type);
        }
        dictionary
    }

    /// Load a list of job types from JSON.
    ///
    /// Duplicate names and negative work times are rejected.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let list: Vec<JobType> = serde_json::from_str(json)?;
        let mut dictionary = JobTypeDictionary::new();
        for job_type in list {
            if job_type.work_time < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "job type {} has negative work time",
                    job_type.name
                )));
            }
            if let Some(chance) = job_type.may_start_fire {
                if !(0.0..=1.0).contains(&chance) {
                    return Err(ConfigError::Invalid(format!(
                        "job type {} fire chance {} outside 0..1",
                        job_type.name, chance
                    )));
                }
            }
            if dictionary.types.contains_key(&job_type.name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate job type {}",
                    job_type.name
                )));
            }
            dictionary.insert(job_type);
        }
        Ok(dictionary)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Add or replace a job type
    pub fn insert(&mut self, job_type: JobType) {
        self.types.insert(job_type.name.clone(), job_type);
    }

    pub fn get(&self, name: &str) -> Option<&JobType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
