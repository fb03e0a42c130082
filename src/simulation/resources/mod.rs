//! Resource system: item stacks, liquid containers, stockpiles and the
//! allocations that reserve them for jobs

pub mod allocation;
pub mod items;
pub mod liquid;
pub mod stockpile;

pub use allocation::{
    AllocationPurpose, AllocationStats, AllocationTarget, HaulingAllocation, HaulingTargetType,
    ItemAllocation, LiquidAllocation,
};
pub use items::{Item, ItemRegistry};
pub use liquid::{LiquidContainer, LiquidRegistry};
pub use stockpile::Stockpile;
