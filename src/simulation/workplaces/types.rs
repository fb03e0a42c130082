//! Workplace types and structures
//!
//! Crafting stations are furniture that accepts hauled inputs and hosts
//! crafting jobs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::simulation::colonists::professions::Profession;
use crate::simulation::resources::allocation::{AllocationTarget, HaulingAllocation};
use crate::simulation::types::{AllocationId, EntityId, ResourceType, TileCoord};

/// Types of crafting furniture
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkplaceType {
    /// Kitchen for food preparation
    Kitchen,
    /// Smithy for metalworking
    Smithy,
    /// Carpentry workshop
    Workshop,
    /// Stone cutting bench
    Masonry,
}

impl WorkplaceType {
    pub fn all() -> &'static [WorkplaceType] {
        &[
            WorkplaceType::Kitchen,
            WorkplaceType::Smithy,
            WorkplaceType::Workshop,
            WorkplaceType::Masonry,
        ]
    }

    /// Profession that works at this station
    pub fn profession(&self) -> Profession {
        match self {
            WorkplaceType::Kitchen => Profession::Chef,
            WorkplaceType::Smithy => Profession::Blacksmith,
            WorkplaceType::Workshop => Profession::Carpenter,
            WorkplaceType::Masonry => Profession::Stonemason,
        }
    }

    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            WorkplaceType::Kitchen => "Kitchen",
            WorkplaceType::Smithy => "Smithy",
            WorkplaceType::Workshop => "Workshop",
            WorkplaceType::Masonry => "Masonry",
        }
    }
}

/// What a crafting job turns inputs into
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub profession: Profession,
    pub inputs: Vec<(ResourceType, u32)>,
    pub output: (ResourceType, u32),
}

impl Recipe {
    pub fn new(
        name: impl Into<String>,
        profession: Profession,
        inputs: &[(ResourceType, u32)],
        output: (ResourceType, u32),
    ) -> Self {
        Recipe {
            name: name.into(),
            profession,
            inputs: inputs.to_vec(),
            output,
        }
    }

    pub fn needs(&self, resource: ResourceType) -> u32 {
        self.inputs
            .iter()
            .filter(|(r, _)| *r == resource)
            .map(|(_, q)| *q)
            .sum()
    }
}

/// A crafting station instance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CraftingStation {
    pub id: EntityId,
    pub workplace_type: WorkplaceType,
    pub location: TileCoord,
    /// Recipe currently being worked
    pub recipe: Option<Recipe>,
    /// Inputs already delivered
    inputs: HashMap<ResourceType, u32>,
    /// In-flight input deliveries by hauling allocation
    pending: BTreeMap<AllocationId, (ResourceType, u32)>,
    /// Number of crafts finished here
    pub completed_crafts: u32,
}

impl CraftingStation {
    pub fn new(id: EntityId, workplace_type: WorkplaceType, location: TileCoord) -> Self {
        CraftingStation {
            id,
            workplace_type,
            location,
            recipe: None,
            inputs: HashMap::new(),
            pending: BTreeMap::new(),
            completed_crafts: 0,
        }
    }

    pub fn input(&self, resource: ResourceType) -> u32 {
        self.inputs.get(&resource).copied().unwrap_or(0)
    }

    pub fn pending_input(&self, resource: ResourceType) -> u32 {
        self.pending
            .values()
            .filter(|(r, _)| *r == resource)
            .map(|(_, q)| *q)
            .sum()
    }

    /// Are all inputs for the recipe on the station?
    pub fn has_inputs_for(&self, recipe: &Recipe) -> bool {
        recipe.inputs.iter().all(|(r, q)| self.input(*r) >= *q)
    }

    /// Use up recipe inputs, returns false (and consumes nothing) if any are missing
    pub fn consume_inputs(&mut self, recipe: &Recipe) -> bool {
        if !self.has_inputs_for(recipe) {
            return false;
        }
        for (resource, quantity) in &recipe.inputs {
            if let Some(held) = self.inputs.get_mut(resource) {
                *held -= quantity;
                if *held == 0 {
                    self.inputs.remove(resource);
                }
            }
        }
        true
    }
}

impl AllocationTarget for CraftingStation {
    fn can_accept(&self, resource: ResourceType) -> bool {
        match &self.recipe {
            Some(recipe) => {
                let needed = recipe.needs(resource);
                needed > 0 && self.input(resource) + self.pending_input(resource) < needed
            }
            None => false,
        }
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
            *self.inputs.entry(resource).or_insert(0) += quantity;
        }
    }

    fn pending_quantity(&self) -> u32 {
        self.pending.values().map(|(_, q)| q).sum()
    }
}
