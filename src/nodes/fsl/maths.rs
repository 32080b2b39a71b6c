//! fslmaths mean-image reduction.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{output_path, path_value, run_tool};
use crate::error::{Error, Result};
use crate::nodes::command::ToolCommand;
use crate::nodes::types::{Node, NodeContext, NodeResult, PortSpec};

/// Mean across one dimension (time by default) with `fslmaths -<dim>mean`.
pub struct MeanImageNode;

impl MeanImageNode {
    pub fn new() -> Self {
        Self
    }

    fn build(ctx: &NodeContext) -> Result<(ToolCommand, Map<String, Value>)> {
        let in_file = ctx.path("in_file")?;
        let dimension = ctx
            .text("dimension")
            .unwrap_or_else(|| "T".to_string())
            .to_uppercase();
        if !matches!(dimension.as_str(), "T" | "X" | "Y" | "Z") {
            return Err(Error::Node(format!(
                "Invalid mean dimension '{}', expected T/X/Y/Z",
                dimension
            )));
        }

        let out_file = match ctx.path("out_file") {
            Ok(p) => p,
            Err(_) => output_path(ctx, &in_file, "_mean"),
        };

        let mut cmd = ToolCommand::new("fslmaths")
            .arg(in_file.to_string_lossy())
            .arg(format!("-{}mean", dimension))
            .arg(out_file.to_string_lossy());
        if let Some(datatype) = ctx.text("output_datatype") {
            cmd = cmd.arg("-odt").arg(datatype);
        }

        let mut outputs = Map::new();
        outputs.insert("out_file".into(), path_value(&out_file));
        Ok((cmd, outputs))
    }
}

impl Default for MeanImageNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for MeanImageNode {
    fn node_type(&self) -> &str {
        "fsl.mean_image"
    }

    fn description(&self) -> &str {
        "Mean image across time (or a spatial axis) with fslmaths"
    }

    fn ports(&self, _config: &Value) -> PortSpec {
        PortSpec::new()
            .required("in_file")
            .optional("dimension")
            .optional("out_file")
            .optional("output_datatype")
            .output("out_file")
    }

    async fn execute(&self, _config: &Value, ctx: &NodeContext) -> Result<NodeResult> {
        let (cmd, outputs) = Self::build(ctx)?;
        run_tool(cmd, outputs, ctx).await
    }
}
