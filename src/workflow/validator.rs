//! Workflow validation.

use std::collections::{HashMap, HashSet};

use super::types::Workflow;
use crate::error::{Error, Result};
use crate::nodes::NodeRegistry;

/// Validate a workflow definition.
///
/// Checks for:
/// - Required fields (name, nodes)
/// - Unique node names
/// - Connections between existing nodes
/// - At most one connection per destination port
/// - No circular dependencies
pub fn validate_workflow(workflow: &Workflow) -> Result<()> {
    // Check workflow has a name
    if workflow.name.is_empty() {
        return Err(Error::Validation("Workflow name is required".into()));
    }

    // Name doubles as a directory name
    if !workflow
        .name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::Validation(
            "Workflow name must contain only alphanumeric characters, hyphens, and underscores"
                .into(),
        ));
    }

    if workflow.nodes.is_empty() {
        return Err(Error::Validation(
            "Workflow must have at least one node".into(),
        ));
    }

    let mut names = HashSet::new();
    for node in &workflow.nodes {
        if node.name.is_empty() {
            return Err(Error::Validation("Node name cannot be empty".into()));
        }
        if !names.insert(node.name.as_str()) {
            return Err(Error::Validation(format!(
                "Duplicate node name: {}",
                node.name
            )));
        }
        if node.node_type.is_empty() {
            return Err(Error::Validation(format!(
                "Node '{}' has empty type",
                node.name
            )));
        }
    }

    let mut bound = HashSet::new();
    for conn in &workflow.connections {
        for end in [&conn.source, &conn.dest] {
            if !names.contains(end.as_str()) {
                return Err(Error::Validation(format!(
                    "Connection {}.{} -> {}.{} references non-existent node '{}'",
                    conn.source, conn.source_field, conn.dest, conn.dest_field, end
                )));
            }
        }
        if conn.source == conn.dest {
            return Err(Error::Validation(format!(
                "Node '{}' is connected to itself",
                conn.source
            )));
        }
        if !bound.insert((conn.dest.as_str(), conn.dest_field.as_str())) {
            return Err(Error::Validation(format!(
                "Input '{}.{}' has more than one incoming connection",
                conn.dest, conn.dest_field
            )));
        }
    }

    if has_cycle(workflow) {
        return Err(Error::Validation(
            "Workflow has circular dependencies".into(),
        ));
    }

    Ok(())
}

/// Validate node types and port names against a registry.
///
/// Runs [`validate_workflow`] first, then checks that every node type is
/// registered, every connection uses declared ports, every static input is a
/// declared input, and every required input is bound by a connection or a
/// static value.
pub fn validate_ports(workflow: &Workflow, registry: &NodeRegistry) -> Result<()> {
    validate_workflow(workflow)?;

    let mut ports = HashMap::new();
    for node in &workflow.nodes {
        if !registry.has(&node.node_type) {
            return Err(Error::Validation(format!(
                "Node '{}' has unknown type '{}'",
                node.name, node.node_type
            )));
        }
        let spec = registry.ports(&node.node_type, &node.config)?;
        for field in node.inputs.keys() {
            if !spec.has_input(field) {
                return Err(Error::Validation(format!(
                    "Node '{}' ({}) has no input named '{}'",
                    node.name, node.node_type, field
                )));
            }
        }
        ports.insert(node.name.as_str(), spec);
    }

    for conn in &workflow.connections {
        let source = &ports[conn.source.as_str()];
        if !source.has_output(&conn.source_field) {
            return Err(Error::Validation(format!(
                "Node '{}' has no output named '{}'",
                conn.source, conn.source_field
            )));
        }
        let dest = &ports[conn.dest.as_str()];
        if !dest.has_input(&conn.dest_field) {
            return Err(Error::Validation(format!(
                "Node '{}' has no input named '{}'",
                conn.dest, conn.dest_field
            )));
        }
    }

    for node in &workflow.nodes {
        for field in ports[node.name.as_str()].required_inputs() {
            let connected = workflow
                .incoming(&node.name)
                .any(|c| c.dest_field == field);
            if !connected && !node.inputs.contains_key(field) {
                return Err(Error::Validation(format!(
                    "Node '{}' is missing required input '{}'",
                    node.name, field
                )));
            }
        }
    }

    Ok(())
}

fn has_cycle(workflow: &Workflow) -> bool {
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();

    fn dfs<'a>(
        node: &'a str,
        edges: &HashMap<&'a str, Vec<&'a str>>,
        visited: &mut HashSet<&'a str>,
        rec_stack: &mut HashSet<&'a str>,
    ) -> bool {
        visited.insert(node);
        rec_stack.insert(node);

        if let Some(neighbors) = edges.get(node) {
            for &neighbor in neighbors {
                if !visited.contains(neighbor) {
                    if dfs(neighbor, edges, visited, rec_stack) {
                        return true;
                    }
                } else if rec_stack.contains(neighbor) {
                    return true;
                }
            }
        }

        rec_stack.remove(node);
        false
    }

    let edges = workflow.downstream_map();

    for node in &workflow.nodes {
        if !visited.contains(node.name.as_str())
            && dfs(&node.name, &edges, &mut visited, &mut rec_stack)
        {
            return true;
        }
    }

    false
}
