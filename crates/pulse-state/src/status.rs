//! The persisted health classification of a target.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Last known health classification, stored per target as a literal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PersistedStatus {
    /// No prior record.
    #[default]
    Unknown,
    Running,
    Stopping,
}

impl PersistedStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
        }
    }

    /// Only `Running` counts as healthy for edge detection.
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

impl fmt::Display for PersistedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersistedStatus {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unknown" => Ok(Self::Unknown),
            "Running" => Ok(Self::Running),
            "Stopping" => Ok(Self::Stopping),
            other => Err(StateError::InvalidStatus(other.to_string())),
        }
    }
}
