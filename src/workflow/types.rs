//! Workflow type definitions.
//!
//! A workflow is a set of named nodes plus port-level connections between
//! them. Graphs are usually assembled in code with [`Workflow::add_node`] and
//! [`Workflow::connect`], but the same shape round-trips through YAML.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::engine::Plugin;
use crate::error::{Error, Result};

/// A complete workflow definition.
///
/// # Example YAML
///
/// ```yaml
/// name: mean-of-fmap
/// nodes:
///   - name: input
///     type: identity
///     config:
///       fields: [fmap]
///   - name: mean_fmap
///     type: fsl.mean_image
/// connections:
///   - source: input
///     source_field: fmap
///     dest: mean_fmap
///     dest_field: in_file
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow name, also the name of its working directory
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Nodes (tool invocations) in declaration order
    pub nodes: Vec<NodeSpec>,

    /// Output-port to input-port edges
    #[serde(default)]
    pub connections: Vec<Connection>,

    /// Execution settings
    #[serde(default)]
    pub settings: WorkflowSettings,
}

/// A node (tool invocation) in the workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeSpec {
    /// Unique node name within this workflow
    pub name: String,

    /// Node type (identity, fsl.topup, ...)
    #[serde(rename = "type")]
    pub node_type: String,

    /// Construction arguments for the node type (e.g. identity fields)
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config: Value,

    /// Statically bound input values (tool parameters and caller-bound files)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub inputs: Map<String, Value>,
}

impl NodeSpec {
    /// Create a node with no configuration and no bound inputs.
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type: node_type.into(),
            config: Value::Null,
            inputs: Map::new(),
        }
    }

    /// Set the construction arguments.
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Bind a static input value.
    pub fn with_input(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(field.into(), value.into());
        self
    }
}

/// An edge: `source.source_field` feeds `dest.dest_field`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Connection {
    pub source: String,
    pub source_field: String,
    pub dest: String,
    pub dest_field: String,
}

/// Workflow-level execution settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Preferred scheduler plugin (the command line takes precedence, config is the fallback)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<Plugin>,

    /// Process limit for the MultiProc plugin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_procs: Option<usize>,
}

impl Workflow {
    /// Create an empty workflow.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            nodes: Vec::new(),
            connections: Vec::new(),
            settings: WorkflowSettings::default(),
        }
    }

    /// Add a node. Names are checked for uniqueness by the validator.
    pub fn add_node(&mut self, node: NodeSpec) -> &mut Self {
        self.nodes.push(node);
        self
    }

    /// Connect `source.source_field` to `dest.dest_field`.
    pub fn connect(
        &mut self,
        source: &str,
        source_field: &str,
        dest: &str,
        dest_field: &str,
    ) -> &mut Self {
        self.connections.push(Connection {
            source: source.to_string(),
            source_field: source_field.to_string(),
            dest: dest.to_string(),
            dest_field: dest_field.to_string(),
        });
        self
    }

    /// Bind a value to an input field of an existing node.
    pub fn set_input(&mut self, node: &str, field: &str, value: impl Into<Value>) -> Result<()> {
        let spec = self
            .get_node_mut(node)
            .ok_or_else(|| Error::Workflow(format!("No node named '{}'", node)))?;
        spec.inputs.insert(field.to_string(), value.into());
        Ok(())
    }

    /// Get a node by name.
    pub fn get_node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Get a mutable node by name.
    pub fn get_node_mut(&mut self, name: &str) -> Option<&mut NodeSpec> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }

    /// All node names.
    pub fn node_names(&self) -> BTreeSet<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    /// All edges as `(source, source_field, dest, dest_field)`.
    pub fn edges(&self) -> BTreeSet<(&str, &str, &str, &str)> {
        self.connections
            .iter()
            .map(|c| {
                (
                    c.source.as_str(),
                    c.source_field.as_str(),
                    c.dest.as_str(),
                    c.dest_field.as_str(),
                )
            })
            .collect()
    }

    /// Connections arriving at `node`.
    pub fn incoming<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.dest == node)
    }

    /// Distinct upstream node names of `node`, in connection order.
    pub fn upstream<'a>(&'a self, node: &'a str) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        self.incoming(node)
            .map(|c| c.source.as_str())
            .filter(|s| seen.insert(*s))
            .collect()
    }

    /// Map of node name to the names of the nodes it feeds.
    pub fn downstream_map(&self) -> HashMap<&str, Vec<&str>> {
        let mut map: HashMap<&str, Vec<&str>> = self
            .nodes
            .iter()
            .map(|n| (n.name.as_str(), Vec::new()))
            .collect();
        for conn in &self.connections {
            let targets = map.entry(conn.source.as_str()).or_default();
            if !targets.contains(&conn.dest.as_str()) {
                targets.push(conn.dest.as_str());
            }
        }
        map
    }

    /// Get nodes in topological order (respecting connections).
    ///
    /// Returns node names in an order where every upstream node comes before
    /// the nodes it feeds. Cycles are rejected by the validator, not here.
    pub fn topological_sort(&self) -> Vec<&str> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut temp_visited = HashSet::new();

        for node in &self.nodes {
            if !visited.contains(node.name.as_str()) {
                self.visit_node(&node.name, &mut visited, &mut temp_visited, &mut result);
            }
        }

        result
    }

    fn visit_node<'a>(
        &'a self,
        name: &'a str,
        visited: &mut HashSet<&'a str>,
        temp: &mut HashSet<&'a str>,
        result: &mut Vec<&'a str>,
    ) {
        if temp.contains(name) || visited.contains(name) {
            return;
        }

        temp.insert(name);

        for upstream in self.upstream(name) {
            self.visit_node(upstream, visited, temp, result);
        }

        temp.remove(name);
        visited.insert(name);
        result.push(name);
    }

    /// Get all node types used in this workflow.
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.nodes.iter().map(|n| n.node_type.as_str()).collect();
        types.sort();
        types.dedup();
        types
    }
}
