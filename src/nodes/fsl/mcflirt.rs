//! MCFLIRT - intra-modal motion correction.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{file_stem, output_path, path_value, run_tool};
use crate::error::{Error, Result};
use crate::nodes::command::ToolCommand;
use crate::nodes::types::{Node, NodeContext, NodeResult, PortSpec};

/// Motion correction with `mcflirt`.
pub struct McflirtNode;

impl McflirtNode {
    pub fn new() -> Self {
        Self
    }

    fn build(ctx: &NodeContext) -> Result<(ToolCommand, Map<String, Value>)> {
        let in_file = ctx.path("in_file")?;
        let out_file = match ctx.path("out_file") {
            Ok(p) => p,
            Err(_) => output_path(ctx, &in_file, "_mcf"),
        };
        let out_str = out_file.to_string_lossy().into_owned();

        let mut cmd = ToolCommand::new("mcflirt")
            .arg("-in")
            .arg(in_file.to_string_lossy())
            .arg("-out")
            .arg(out_str.clone());

        if let Some(cost) = ctx.text("cost") {
            cmd = cmd.arg("-cost").arg(cost);
        }
        if let Some(ref_vol) = ctx.text("ref_vol") {
            cmd = cmd.arg("-refvol").arg(ref_vol);
        }
        if let Ok(ref_file) = ctx.path("ref_file") {
            cmd = cmd.arg("-reffile").arg(ref_file.to_string_lossy());
        }
        if let Some(interpolation) = ctx.text("interpolation") {
            let flag = match interpolation.as_str() {
                "spline" => "-spline_final",
                "nn" => "-nn_final",
                "sinc" => "-sinc_final",
                other => {
                    return Err(Error::Node(format!(
                        "Invalid mcflirt interpolation '{}', expected spline/nn/sinc",
                        other
                    )))
                }
            };
            cmd = cmd.arg(flag);
        }

        let mut outputs = Map::new();
        outputs.insert("out_file".into(), path_value(&out_file));

        if ctx.flag("mean_vol") {
            cmd = cmd.arg("-meanvol");
            let mean_img = out_file.with_file_name(format!(
                "{}_mean_reg{}",
                file_stem(&out_file),
                ctx.tools.output_extension()
            ));
            outputs.insert("mean_img".into(), path_value(&mean_img));
        }
        if ctx.flag("save_plots") {
            cmd = cmd.arg("-plots");
            outputs.insert("par_file".into(), Value::String(format!("{}.par", out_str)));
        }
        if ctx.flag("save_mats") {
            cmd = cmd.arg("-mats");
            outputs.insert("mat_dir".into(), Value::String(format!("{}.mat", out_str)));
        }

        Ok((cmd, outputs))
    }
}

impl Default for McflirtNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for McflirtNode {
    fn node_type(&self) -> &str {
        "fsl.mcflirt"
    }

    fn description(&self) -> &str {
        "Motion-correct a 4-D series with mcflirt"
    }

    fn ports(&self, _config: &Value) -> PortSpec {
        PortSpec::new()
            .required("in_file")
            .optional("out_file")
            .optional("cost")
            .optional("ref_vol")
            .optional("ref_file")
            .optional("interpolation")
            .optional("mean_vol")
            .optional("save_plots")
            .optional("save_mats")
            .output("out_file")
            .output("mean_img")
            .output("par_file")
            .output("mat_dir")
    }

    async fn execute(&self, _config: &Value, ctx: &NodeContext) -> Result<NodeResult> {
        let (cmd, outputs) = Self::build(ctx)?;
        run_tool(cmd, outputs, ctx).await
    }
}
