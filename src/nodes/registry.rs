//! Node registry - manages available node types.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::types::{Node, PortSpec};
use super::{
    AcquisitionParametersNode, ApplyTopupNode, FslMergeNode, IdentityNode, ListMergeNode,
    McflirtNode, MeanImageNode, TopupNode,
};
use crate::error::{Error, Result};

/// Registry of available node types.
#[derive(Clone)]
pub struct NodeRegistry {
    nodes: HashMap<String, Arc<dyn Node>>,
}

impl NodeRegistry {
    /// Create a new registry with default nodes.
    pub fn new() -> Self {
        let mut registry = Self {
            nodes: HashMap::new(),
        };

        // Utility nodes
        registry.register(Arc::new(IdentityNode::new()));
        registry.register(Arc::new(ListMergeNode::new()));
        registry.register(Arc::new(AcquisitionParametersNode::new()));

        // FSL tools
        registry.register(Arc::new(McflirtNode::new()));
        registry.register(Arc::new(MeanImageNode::new()));
        registry.register(Arc::new(FslMergeNode::new()));
        registry.register(Arc::new(TopupNode::new()));
        registry.register(Arc::new(ApplyTopupNode::new()));

        registry
    }

    /// Create an empty registry (for testing).
    pub fn empty() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Register a node type.
    pub fn register(&mut self, node: Arc<dyn Node>) {
        self.nodes.insert(node.node_type().to_string(), node);
    }

    /// Get a node by type name.
    pub fn get(&self, node_type: &str) -> Option<Arc<dyn Node>> {
        self.nodes.get(node_type).cloned()
    }

    /// Check if a node type is registered.
    pub fn has(&self, node_type: &str) -> bool {
        self.nodes.contains_key(node_type)
    }

    /// Ports of a node type for the given config.
    pub fn ports(&self, node_type: &str, config: &Value) -> Result<PortSpec> {
        self.get(node_type)
            .map(|node| node.ports(config))
            .ok_or_else(|| Error::Node(format!("Unknown node type: {}", node_type)))
    }

    /// Get descriptions of all registered nodes, sorted by type.
    pub fn descriptions(&self) -> Vec<(&str, &str)> {
        let mut descriptions: Vec<(&str, &str)> = self
            .nodes
            .iter()
            .map(|(name, node)| (name.as_str(), node.description()))
            .collect();
        descriptions.sort();
        descriptions
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
