//! Identity node - exposes named fields as both inputs and outputs.
//!
//! Used for a workflow's designated input and output nodes: callers bind
//! values to its fields, and downstream nodes read them back unchanged.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::types::{Node, NodeContext, NodeResult, PortSpec};
use crate::error::Result;

/// Identity node implementation.
pub struct IdentityNode;

impl IdentityNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IdentityNode {
    fn default() -> Self {
        Self::new()
    }
}

/// Field names from `config.fields`.
fn fields(config: &Value) -> Vec<&str> {
    config
        .get("fields")
        .and_then(|f| f.as_array())
        .map(|items| items.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default()
}

#[async_trait]
impl Node for IdentityNode {
    fn node_type(&self) -> &str {
        "identity"
    }

    fn description(&self) -> &str {
        "Pass named fields through unchanged (workflow inputs and outputs)"
    }

    fn ports(&self, config: &Value) -> PortSpec {
        fields(config)
            .into_iter()
            .fold(PortSpec::new(), |ports, f| ports.optional(f).output(f))
    }

    async fn execute(&self, config: &Value, ctx: &NodeContext) -> Result<NodeResult> {
        let mut outputs = Map::new();
        for field in fields(config) {
            if let Some(value) = ctx.input(field) {
                outputs.insert(field.to_string(), value.clone());
            }
        }
        Ok(NodeResult::new(outputs))
    }
}
