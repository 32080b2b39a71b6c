//! Execution engine for workflows.

mod execution;
mod executor;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub use execution::{Execution, ExecutionStatus, NodeExecution};
pub use executor::Executor;

/// Scheduling strategy for a workflow run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plugin {
    /// One node at a time, in dependency order
    Linear,
    /// Up to `n_procs` ready nodes at once
    #[default]
    MultiProc,
}

impl fmt::Display for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::MultiProc => write!(f, "multiproc"),
        }
    }
}

impl FromStr for Plugin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "multiproc" => Ok(Self::MultiProc),
            other => Err(Error::Config(format!(
                "Unknown plugin '{}' (expected linear or multiproc)",
                other
            ))),
        }
    }
}
