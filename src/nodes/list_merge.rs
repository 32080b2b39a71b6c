//! List merge node - gather `in1..inN` into a single list.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::types::{Node, NodeContext, NodeResult, PortSpec};
use crate::error::{Error, Result};

/// List merge node implementation.
pub struct ListMergeNode;

impl ListMergeNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ListMergeNode {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct ListMergeConfig {
    #[serde(default = "default_numinputs")]
    numinputs: usize,
    /// Keep list-valued inputs as nested lists instead of splicing them in
    #[serde(default)]
    no_flatten: bool,
}

fn default_numinputs() -> usize {
    2
}

impl ListMergeConfig {
    fn from_value(config: &Value) -> Result<Self> {
        if config.is_null() {
            return Ok(Self {
                numinputs: default_numinputs(),
                no_flatten: false,
            });
        }
        serde_json::from_value(config.clone())
            .map_err(|e| Error::Node(format!("Invalid list_merge config: {}", e)))
    }
}

#[async_trait]
impl Node for ListMergeNode {
    fn node_type(&self) -> &str {
        "list_merge"
    }

    fn description(&self) -> &str {
        "Collect inputs in1..inN into one list"
    }

    fn ports(&self, config: &Value) -> PortSpec {
        let n = ListMergeConfig::from_value(config)
            .map(|c| c.numinputs)
            .unwrap_or_else(|_| default_numinputs());
        (1..=n)
            .fold(PortSpec::new(), |ports, i| ports.optional(&format!("in{}", i)))
            .output("out")
    }

    async fn execute(&self, config: &Value, ctx: &NodeContext) -> Result<NodeResult> {
        let config = ListMergeConfig::from_value(config)?;

        let sources: Vec<Value> = (1..=config.numinputs)
            .filter_map(|i| ctx.input(&format!("in{}", i)).cloned())
            .collect();
        let count = sources.len();
        let merged = merge_append(sources, config.no_flatten);

        Ok(NodeResult::with_metadata(
            serde_json::Map::from_iter([("out".to_string(), merged)]),
            json!({ "inputs_count": count }),
        ))
    }
}

fn merge_append(sources: Vec<Value>, no_flatten: bool) -> Value {
    let mut out = Vec::new();
    for source in sources {
        match source {
            Value::Array(items) if !no_flatten => out.extend(items),
            other => out.push(other),
        }
    }
    Value::Array(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn ctx(inputs: Value) -> NodeContext {
        NodeContext::new("run-1", "wf", "list", Path::new("/tmp"))
            .with_inputs(inputs.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn test_merge_in_port_order() {
        let node = ListMergeNode::new();
        let result = node
            .execute(
                &json!({"numinputs": 2}),
                &ctx(json!({"in2": "/w/mean_fmap.nii.gz", "in1": "/w/mean_func.nii.gz"})),
            )
            .await
            .unwrap();

        assert_eq!(
            result.outputs["out"],
            json!(["/w/mean_func.nii.gz", "/w/mean_fmap.nii.gz"])
        );
    }

    #[tokio::test]
    async fn test_merge_flattens_lists() {
        let node = ListMergeNode::new();
        let inputs = json!({"in1": ["a", "b"], "in2": "c", "in3": ["d"]});

        let flat = node
            .execute(&json!({"numinputs": 3}), &ctx(inputs.clone()))
            .await
            .unwrap();
        assert_eq!(flat.outputs["out"], json!(["a", "b", "c", "d"]));

        let nested = node
            .execute(&json!({"numinputs": 3, "no_flatten": true}), &ctx(inputs))
            .await
            .unwrap();
        assert_eq!(nested.outputs["out"], json!([["a", "b"], "c", ["d"]]));
    }

    #[tokio::test]
    async fn test_merge_skips_unset_inputs() {
        let node = ListMergeNode::new();
        let result = node
            .execute(&Value::Null, &ctx(json!({"in2": "only"})))
            .await
            .unwrap();
        assert_eq!(result.outputs["out"], json!(["only"]));
    }

    #[test]
    fn test_ports_follow_numinputs() {
        let ports = ListMergeNode::new().ports(&json!({"numinputs": 3}));
        assert!(ports.has_input("in3"));
        assert!(!ports.has_input("in4"));
        assert!(ports.has_output("out"));
    }
}
