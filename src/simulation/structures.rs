//! Construction sites - structures waiting on hauled materials and a builder

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::simulation::resources::allocation::{AllocationTarget, HaulingAllocation};
use crate::simulation::types::{AllocationId, EntityId, MaterialType, ResourceType, TileCoord};

/// Types of structures colonists can build
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureType {
    Wall,
    Door,
    Floor,
}

impl StructureType {
    pub fn name(&self) -> &'static str {
        match self {
            StructureType::Wall => "Wall",
            StructureType::Door => "Door",
            StructureType::Floor => "Floor",
        }
    }

    /// Units of building material needed
    pub fn material_cost(&self) -> u32 {
        match self {
            StructureType::Wall => 4,
            StructureType::Door => 2,
            StructureType::Floor => 1,
        }
    }

    /// Does the finished structure block movement?
    pub fn blocks_movement(&self) -> bool {
        matches!(self, StructureType::Wall)
    }
}

/// A structure under construction
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Construction {
    pub id: EntityId,
    pub structure_type: StructureType,
    pub location: TileCoord,
    pub material: MaterialType,
    /// Material resource this construction consumes
    pub resource: ResourceType,
    delivered: HashMap<ResourceType, u32>,
    pending: BTreeMap<AllocationId, (ResourceType, u32)>,
    pub is_complete: bool,
}

impl Construction {
    pub fn new(
        id: EntityId,
        structure_type: StructureType,
        location: TileCoord,
        resource: ResourceType,
    ) -> Self {
        Construction {
            id,
            structure_type,
            location,
            material: resource.material_type(),
            resource,
            delivered: HashMap::new(),
            pending: BTreeMap::new(),
            is_complete: false,
        }
    }

    pub fn required(&self) -> u32 {
        self.structure_type.material_cost()
    }

    pub fn delivered_quantity(&self) -> u32 {
        self.delivered.get(&self.resource).copied().unwrap_or(0)
    }

    /// Materials still to be requested (neither delivered nor on the way)
    pub fn outstanding(&self) -> u32 {
        self.required()
            .saturating_sub(self.delivered_quantity())
            .saturating_sub(self.pending_quantity())
    }

    /// Everything delivered, ready for a builder
    pub fn is_ready_to_build(&self) -> bool {
        !self.is_complete && self.delivered_quantity() >= self.required()
    }

    /// Finish the structure, using up delivered materials
    pub fn complete(&mut self) -> bool {
        if !self.is_ready_to_build() {
            return false;
        }
        self.delivered.clear();
        self.is_complete = true;
        true
    }
}

impl AllocationTarget for Construction {
    fn can_accept(&self, resource: ResourceType) -> bool {
        !self.is_complete && resource == self.resource && self.outstanding() > 0
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
            *self.delivered.entry(resource).or_insert(0) += quantity;
        }
    }

    fn pending_quantity(&self) -> u32 {
        self.pending.values().map(|(_, q)| q).sum()
    }
}
