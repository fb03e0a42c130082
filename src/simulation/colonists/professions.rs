//! Professions - the capabilities a job can require of a worker

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::simulation::types::MaterialType;

/// A capability a worker must actively hold to take a job requiring it.
///
/// Jobs that anyone may do carry no profession (`None`) rather than a
/// catch-all variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Profession {
    Miner,
    Lumberjack,
    Farmer,
    Carpenter,
    Stonemason,
    Blacksmith,
    Chef,
    Hauler,
}

impl Profession {
    /// Get all professions
    pub fn all() -> &'static [Profession] {
        &[
            Profession::Miner,
            Profession::Lumberjack,
            Profession::Farmer,
            Profession::Carpenter,
            Profession::Stonemason,
            Profession::Blacksmith,
            Profession::Chef,
            Profession::Hauler,
        ]
    }

    /// Get the display name for this profession
    pub fn name(&self) -> &'static str {
        match self {
            Profession::Miner => "Miner",
            Profession::Lumberjack => "Lumberjack",
            Profession::Farmer => "Farmer",
            Profession::Carpenter => "Carpenter",
            Profession::Stonemason => "Stonemason",
            Profession::Blacksmith => "Blacksmith",
            Profession::Chef => "Chef",
            Profession::Hauler => "Hauler",
        }
    }

    /// Profession that builds and tears down things made of a material
    pub fn for_material(material: MaterialType) -> Option<Profession> {
        match material {
            MaterialType::Stone => Some(Profession::Stonemason),
            MaterialType::Wood => Some(Profession::Carpenter),
            MaterialType::Metal => Some(Profession::Blacksmith),
            MaterialType::Food => Some(Profession::Chef),
            MaterialType::Liquid => None,
        }
    }
}

impl fmt::Display for Profession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Does a set of active professions satisfy a job's requirement?
pub fn satisfies(active: &[Profession], required: Option<Profession>) -> bool {
    match required {
        None => true,
        Some(profession) => active.contains(&profession),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_professions() {
        assert_eq!(Profession::for_material(MaterialType::Stone), Some(Profession::Stonemason));
        assert_eq!(Profession::for_material(MaterialType::Wood), Some(Profession::Carpenter));
        assert_eq!(Profession::for_material(MaterialType::Liquid), None);
    }

    #[test]
    fn test_no_requirement_is_always_satisfied() {
        assert!(satisfies(&[], None));
        assert!(!satisfies(&[], Some(Profession::Miner)));
        assert!(satisfies(&[Profession::Chef, Profession::Miner], Some(Profession::Miner)));
    }
}
