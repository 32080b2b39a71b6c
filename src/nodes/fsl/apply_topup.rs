//! applytopup - resample images with a topup field estimate.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{output_path, path_value, run_tool};
use crate::error::{Error, Result};
use crate::nodes::command::ToolCommand;
use crate::nodes::types::{Node, NodeContext, NodeResult, PortSpec};

/// Distortion correction with `applytopup`.
pub struct ApplyTopupNode;

impl ApplyTopupNode {
    pub fn new() -> Self {
        Self
    }

    fn build(ctx: &NodeContext) -> Result<(ToolCommand, Map<String, Value>)> {
        let in_files = ctx.paths("in_files")?;
        let Some(first) = in_files.first() else {
            return Err(Error::Node(format!(
                "Node '{}' needs at least one image to correct",
                ctx.node_name
            )));
        };
        let encoding_file = ctx.path("encoding_file")?;
        let fieldcoef = ctx.path("in_topup_fieldcoef")?;
        let movpar = ctx.path("in_topup_movpar")?;

        let topup_base = topup_base(
            &fieldcoef.to_string_lossy(),
            &movpar.to_string_lossy(),
            ctx.tools.output_extension(),
        )?;

        let in_index = match ctx.input("in_index") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(","),
            Some(other) => other.to_string(),
            None => (1..=in_files.len())
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(","),
        };

        let method = ctx.text("method");
        if let Some(m) = method.as_deref() {
            if !matches!(m, "jac" | "lsr") {
                return Err(Error::Node(format!(
                    "Invalid applytopup method '{}', expected jac/lsr",
                    m
                )));
            }
        }

        let out_corrected = match ctx.path("out_corrected") {
            Ok(p) => p,
            Err(_) => output_path(ctx, first, "_corrected"),
        };

        let imain = in_files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(",");

        let cmd = ToolCommand::new("applytopup")
            .opt_eq("datain", Some(encoding_file.to_string_lossy().into_owned()))
            .opt_eq("imain", Some(imain))
            .opt_eq("inindex", Some(in_index))
            .opt_eq("topup", Some(topup_base))
            .opt_eq("out", Some(out_corrected.to_string_lossy().into_owned()))
            .opt_eq("method", method)
            .opt_eq("interp", ctx.text("interp"))
            .opt_eq("datatype", ctx.text("datatype"));

        let mut outputs = Map::new();
        outputs.insert("out_corrected".into(), path_value(&out_corrected));
        Ok((cmd, outputs))
    }
}

/// The `--topup` argument: the shared prefix of the fieldcoef and movpar files.
fn topup_base(fieldcoef: &str, movpar: &str, ext: &str) -> Result<String> {
    let from_coef = fieldcoef
        .strip_suffix(&format!("_fieldcoef{}", ext))
        .or_else(|| fieldcoef.strip_suffix("_fieldcoef.nii.gz"))
        .or_else(|| fieldcoef.strip_suffix("_fieldcoef.nii"))
        .ok_or_else(|| {
            Error::Node(format!(
                "'{}' is not a topup fieldcoef file",
                fieldcoef
            ))
        })?;
    let from_movpar = movpar.strip_suffix("_movpar.txt").ok_or_else(|| {
        Error::Node(format!("'{}' is not a topup movpar file", movpar))
    })?;

    if from_coef != from_movpar {
        return Err(Error::Node(format!(
            "topup fieldcoef '{}' and movpar '{}' come from different runs",
            fieldcoef, movpar
        )));
    }
    Ok(from_coef.to_string())
}

impl Default for ApplyTopupNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for ApplyTopupNode {
    fn node_type(&self) -> &str {
        "fsl.apply_topup"
    }

    fn description(&self) -> &str {
        "Correct images for susceptibility distortion with applytopup"
    }

    fn ports(&self, _config: &Value) -> PortSpec {
        PortSpec::new()
            .required("in_files")
            .required("encoding_file")
            .required("in_topup_fieldcoef")
            .required("in_topup_movpar")
            .optional("in_index")
            .optional("method")
            .optional("interp")
            .optional("datatype")
            .optional("out_corrected")
            .output("out_corrected")
    }

    async fn execute(&self, _config: &Value, ctx: &NodeContext) -> Result<NodeResult> {
        let (cmd, outputs) = Self::build(ctx)?;
        run_tool(cmd, outputs, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::fsl::test_support::ctx;
    use serde_json::json;

    fn inputs() -> Value {
        json!({
            "in_files": "/data/mouth/func.nii.gz",
            "encoding_file": "/w/acquisition_parameters/acquisition_parameters.txt",
            "in_topup_fieldcoef": "/w/topup/merged_base_fieldcoef.nii.gz",
            "in_topup_movpar": "/w/topup/merged_base_movpar.txt",
            "method": "jac"
        })
    }

    #[test]
    fn test_apply_command() {
        let ctx = ctx(inputs());
        let (cmd, outputs) = ApplyTopupNode::build(&ctx).unwrap();

        assert_eq!(
            cmd.get_args(),
            &[
                "--datain=/w/acquisition_parameters/acquisition_parameters.txt",
                "--imain=/data/mouth/func.nii.gz",
                "--inindex=1",
                "--topup=/w/topup/merged_base",
                "--out=/work/topup/node/func_corrected.nii.gz",
                "--method=jac",
            ]
        );
        assert_eq!(outputs["out_corrected"], "/work/topup/node/func_corrected.nii.gz");
    }

    #[test]
    fn test_in_index_defaults_to_one_per_file() {
        let mut values = inputs();
        values["in_files"] = json!(["/a.nii.gz", "/b.nii.gz"]);
        let (cmd, _) = ApplyTopupNode::build(&ctx(values)).unwrap();
        assert!(cmd.get_args().contains(&"--inindex=1,2".to_string()));
        assert!(cmd.get_args().contains(&"--imain=/a.nii.gz,/b.nii.gz".to_string()));
    }

    #[test]
    fn test_mismatched_topup_outputs() {
        let mut values = inputs();
        values["in_topup_movpar"] = json!("/elsewhere/other_movpar.txt");
        let err = ApplyTopupNode::build(&ctx(values)).unwrap_err();
        assert!(err.to_string().contains("different runs"));
    }

    #[test]
    fn test_invalid_method() {
        let mut values = inputs();
        values["method"] = json!("nearest");
        assert!(ApplyTopupNode::build(&ctx(values)).is_err());
    }
}
