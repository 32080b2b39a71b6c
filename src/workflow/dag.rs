//! Workflow graph rendering.
//!
//! Renders a workflow as Graphviz DOT or as an indented text tree, and groups
//! nodes into execution levels (nodes in one level have no edges between them).

use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::str::FromStr;

use super::types::Workflow;
use crate::error::{Error, Result};

/// DOT rendering style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GraphStyle {
    /// One plain box per node
    #[default]
    Flat,
    /// Nodes filled by tool family
    Colored,
}

impl FromStr for GraphStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "colored" | "coloured" => Ok(Self::Colored),
            other => Err(Error::Parse(format!("Unknown graph style: {}", other))),
        }
    }
}

/// Fill color for a node type, keyed on the family prefix.
fn family_color(node_type: &str) -> &'static str {
    match node_type.split('.').next().unwrap_or_default() {
        "fsl" => "lightblue",
        "identity" => "lightgrey",
        "list_merge" => "lightyellow",
        _ => "palegreen",
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\\\""))
}

/// Render the workflow as a Graphviz digraph.
///
/// Nodes appear in declaration order and edges in connection order, so the
/// output is stable for a given workflow.
pub fn to_dot(workflow: &Workflow, style: GraphStyle) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph {} {{", quote(&workflow.name));
    let _ = writeln!(out, "  rankdir=TB;");
    match style {
        GraphStyle::Flat => {
            let _ = writeln!(out, "  node [shape=box];");
        }
        GraphStyle::Colored => {
            let _ = writeln!(out, "  node [shape=box, style=filled];");
        }
    }

    for node in &workflow.nodes {
        let label = format!("{}\\n({})", node.name, node.node_type);
        match style {
            GraphStyle::Flat => {
                let _ = writeln!(out, "  {} [label={}];", quote(&node.name), quote(&label));
            }
            GraphStyle::Colored => {
                let _ = writeln!(
                    out,
                    "  {} [label={}, fillcolor={}];",
                    quote(&node.name),
                    quote(&label),
                    family_color(&node.node_type)
                );
            }
        }
    }

    for conn in &workflow.connections {
        let label = format!("{} -> {}", conn.source_field, conn.dest_field);
        let _ = writeln!(
            out,
            "  {} -> {} [label={}];",
            quote(&conn.source),
            quote(&conn.dest),
            quote(&label)
        );
    }

    out.push_str("}\n");
    out
}

/// Group nodes into levels: level 0 has no upstream nodes, level k depends
/// only on levels below k. Names within a level keep declaration order.
pub fn execution_levels(workflow: &Workflow) -> Result<Vec<Vec<&str>>> {
    let mut level_of: HashMap<&str, usize> = HashMap::new();
    for name in workflow.topological_sort() {
        let level = workflow
            .upstream(name)
            .iter()
            .map(|up| {
                level_of.get(up).map(|l| l + 1).ok_or_else(|| {
                    Error::Validation(format!("Workflow has circular dependencies at '{}'", name))
                })
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .max()
            .unwrap_or(0);
        level_of.insert(name, level);
    }

    let depth = level_of.values().max().map(|d| d + 1).unwrap_or(0);
    let mut levels = vec![Vec::new(); depth];
    for node in &workflow.nodes {
        if let Some(&level) = level_of.get(node.name.as_str()) {
            levels[level].push(node.name.as_str());
        }
    }
    Ok(levels)
}

/// Simple text tree of the workflow, from `root` up through its inputs.
pub fn to_text(workflow: &Workflow, root: &str) -> String {
    let mut lines = Vec::new();
    let mut visited = HashSet::new();

    format_node(workflow, root, 0, &mut visited, &mut lines);

    lines.join("\n")
}

fn format_node(
    workflow: &Workflow,
    node: &str,
    depth: usize,
    visited: &mut HashSet<String>,
    lines: &mut Vec<String>,
) {
    let indent = "  ".repeat(depth);
    let marker = if depth == 0 { "" } else { "└─ " };
    let node_type = workflow
        .get_node(node)
        .map(|n| n.node_type.as_str())
        .unwrap_or("?");

    if visited.contains(node) {
        lines.push(format!("{}{}{}  (already shown)", indent, marker, node));
        return;
    }

    visited.insert(node.to_string());
    lines.push(format!("{}{}{} [{}]", indent, marker, node, node_type));

    for upstream in workflow.upstream(node) {
        format_node(workflow, upstream, depth + 1, visited, lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::NodeSpec;

    fn diamond() -> Workflow {
        let mut w = Workflow::new("diamond");
        w.add_node(NodeSpec::new("input", "identity"))
            .add_node(NodeSpec::new("left", "fsl.mean_image"))
            .add_node(NodeSpec::new("right", "fsl.mcflirt"))
            .add_node(NodeSpec::new("join", "list_merge"));
        w.connect("input", "func", "left", "in_file")
            .connect("input", "fmap", "right", "in_file")
            .connect("left", "out_file", "join", "in1")
            .connect("right", "out_file", "join", "in2");
        w
    }

    #[test]
    fn test_execution_levels() {
        let w = diamond();
        let levels = execution_levels(&w).unwrap();
        assert_eq!(
            levels,
            vec![vec!["input"], vec!["left", "right"], vec!["join"]]
        );
    }

    #[test]
    fn test_dot_flat() {
        let dot = to_dot(&diamond(), GraphStyle::Flat);
        assert!(dot.starts_with("digraph \"diamond\" {"));
        assert!(dot.contains("\"left\" [label=\"left\\n(fsl.mean_image)\"];"));
        assert!(dot.contains("\"left\" -> \"join\" [label=\"out_file -> in1\"];"));
        assert!(!dot.contains("fillcolor"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_dot_colored_by_family() {
        let dot = to_dot(&diamond(), GraphStyle::Colored);
        assert!(dot.contains("fillcolor=lightblue"));
        assert!(dot.contains("fillcolor=lightgrey"));
        assert!(dot.contains("fillcolor=lightyellow"));
    }

    #[test]
    fn test_graph_style_from_str() {
        assert_eq!("flat".parse::<GraphStyle>().unwrap(), GraphStyle::Flat);
        assert_eq!("Colored".parse::<GraphStyle>().unwrap(), GraphStyle::Colored);
        assert!("hierarchical".parse::<GraphStyle>().is_err());
    }

    #[test]
    fn test_to_text() {
        let text = to_text(&diamond(), "join");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "join [list_merge]");
        assert!(text.contains("└─ left [fsl.mean_image]"));
        assert!(text.contains("input  (already shown)"));
    }
}
