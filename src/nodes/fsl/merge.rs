//! fslmerge - concatenate images along an axis.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{output_path, path_value, run_tool};
use crate::error::{Error, Result};
use crate::nodes::command::ToolCommand;
use crate::nodes::types::{Node, NodeContext, NodeResult, PortSpec};

/// Image concatenation with `fslmerge`.
pub struct FslMergeNode;

impl FslMergeNode {
    pub fn new() -> Self {
        Self
    }

    fn build(ctx: &NodeContext) -> Result<(ToolCommand, Map<String, Value>)> {
        let in_files = ctx.paths("in_files")?;
        let Some(first) = in_files.first() else {
            return Err(Error::Node(format!(
                "Node '{}' needs at least one file to merge",
                ctx.node_name
            )));
        };

        let dimension = ctx
            .text("dimension")
            .ok_or_else(|| {
                Error::Node(format!(
                    "Node '{}' is missing required input 'dimension'",
                    ctx.node_name
                ))
            })?
            .to_lowercase();
        if !matches!(dimension.as_str(), "t" | "x" | "y" | "z" | "a") {
            return Err(Error::Node(format!(
                "Invalid merge dimension '{}', expected t/x/y/z/a",
                dimension
            )));
        }

        let merged_file = match ctx.path("merged_file") {
            Ok(p) => p,
            Err(_) => output_path(ctx, first, "_merged"),
        };

        // -tr <out> <in...> <tr> sets the repetition time while merging in time
        let tr = ctx.text("tr");
        let flag = if tr.is_some() && dimension == "t" {
            "-tr".to_string()
        } else {
            format!("-{}", dimension)
        };

        let mut cmd = ToolCommand::new("fslmerge")
            .arg(flag)
            .arg(merged_file.to_string_lossy())
            .args(in_files.iter().map(|p| p.to_string_lossy().into_owned()));
        if let (Some(tr), "t") = (tr, dimension.as_str()) {
            cmd = cmd.arg(tr);
        }

        let mut outputs = Map::new();
        outputs.insert("merged_file".into(), path_value(&merged_file));
        Ok((cmd, outputs))
    }
}

impl Default for FslMergeNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for FslMergeNode {
    fn node_type(&self) -> &str {
        "fsl.merge"
    }

    fn description(&self) -> &str {
        "Concatenate images along time or a spatial axis with fslmerge"
    }

    fn ports(&self, _config: &Value) -> PortSpec {
        PortSpec::new()
            .required("in_files")
            .required("dimension")
            .optional("tr")
            .optional("merged_file")
            .output("merged_file")
    }

    async fn execute(&self, _config: &Value, ctx: &NodeContext) -> Result<NodeResult> {
        let (cmd, outputs) = Self::build(ctx)?;
        run_tool(cmd, outputs, ctx).await
    }
}
