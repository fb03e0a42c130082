//! Workplace system - crafting furniture that accepts hauled inputs
//! and hosts crafting jobs.

pub mod types;

pub use types::{CraftingStation, Recipe, WorkplaceType};
