//! Colony job scheduling library
//!
//! Re-exports modules for use by binaries and tools.

pub mod simulation;
pub mod tilemap;
