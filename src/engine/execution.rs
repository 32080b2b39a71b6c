//! Execution records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Plugin;
use crate::error::Result;

/// Execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub workflow_name: String,
    pub plugin: Plugin,
    pub status: ExecutionStatus,
    /// `<base_dir>/<workflow_name>`
    pub working_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Per-node records in topological order
    pub nodes: Vec<NodeExecution>,
    /// Outputs of every completed node, keyed by node name
    pub outputs: BTreeMap<String, Map<String, Value>>,
    pub error: Option<String>,
}

impl Execution {
    /// Output `field` of node `node`, if that node completed and produced it.
    pub fn output(&self, node: &str, field: &str) -> Option<&Value> {
        self.outputs.get(node).and_then(|o| o.get(field))
    }

    /// Record for a node.
    pub fn node(&self, name: &str) -> Option<&NodeExecution> {
        self.nodes.iter().find(|n| n.node == name)
    }

    /// Path of the persisted record.
    pub fn record_path(&self) -> PathBuf {
        self.working_dir.join("execution.json")
    }

    /// Load a record written by the executor.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Node execution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecution {
    pub node: String,
    pub node_type: String,
    pub status: ExecutionStatus,
    /// Resolved inputs (static inputs overlaid with upstream outputs)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub inputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Map<String, Value>>,
    pub working_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeExecution {
    pub(crate) fn pending(node: &str, node_type: &str, working_dir: PathBuf) -> Self {
        Self {
            node: node.to_string(),
            node_type: node_type.to_string(),
            status: ExecutionStatus::Pending,
            inputs: Map::new(),
            outputs: None,
            working_dir,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }
}
