//! Configuration parameters for the job scheduler

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::simulation::error::ConfigError;
use crate::simulation::jobs::types::JobPriority;

/// Main configuration for the scheduler
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerParams {
    // Job store
    /// Seconds between consistency checks of one ASSIGNED job
    pub assigned_sweep_interval: f32,

    // Accessibility
    /// Seconds between re-queuing one INACCESSIBLE job for evaluation
    pub inaccessible_retry_interval: f32,

    // Requests
    /// Minimum number of job requests answered per tick
    pub min_requests_per_tick: usize,

    // Jobs
    /// Priority given to jobs created without an explicit one
    pub default_priority: JobPriority,

    // Reporting
    /// Number of entries kept in the activity log
    pub activity_log_capacity: usize,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        SchedulerParams {
            assigned_sweep_interval: 0.141,
            inaccessible_retry_interval: 1.1,
            min_requests_per_tick: 2,
            default_priority: JobPriority::Normal,
            activity_log_capacity: 50,
        }
    }
}

impl SchedulerParams {
    /// Params that sweep on every tick, handy for tests and debugging
    pub fn every_tick() -> Self {
        let mut params = Self::default();
        params.assigned_sweep_interval = 0.0;
        params.inaccessible_retry_interval = 0.0;
        params
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let params: SchedulerParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.assigned_sweep_interval < 0.0 || self.inaccessible_retry_interval < 0.0 {
            return Err(ConfigError::Invalid("intervals must not be negative".to_string()));
        }
        if self.min_requests_per_tick == 0 {
            return Err(ConfigError::Invalid(
                "min_requests_per_tick must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = SchedulerParams::default();
        assert_eq!(params.min_requests_per_tick, 2);
        assert!((params.assigned_sweep_interval - 0.141).abs() < f32::EPSILON);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let params = SchedulerParams::from_json_str(r#"{ "min_requests_per_tick": 4 }"#).unwrap();
        assert_eq!(params.min_requests_per_tick, 4);
        assert_eq!(params.default_priority, JobPriority::Normal);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(matches!(
            SchedulerParams::from_json_str(r#"{ "min_requests_per_tick": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SchedulerParams::from_json_str("not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
