//! topup - susceptibility-induced off-resonance field estimation.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{file_stem, output_path, path_value, run_tool};
use crate::error::Result;
use crate::nodes::command::ToolCommand;
use crate::nodes::types::{Node, NodeContext, NodeResult, PortSpec};

/// Default topup configuration shipped with FSL.
pub const DEFAULT_CONFIG: &str = "b02b0.cnf";

/// Optional scalar parameters: (input name, topup flag).
const SCALAR_OPTIONS: &[(&str, &str)] = &[
    ("warp_res", "warpres"),
    ("subsamp", "subsamp"),
    ("fwhm", "fwhm"),
    ("max_iter", "miter"),
    ("reg_lambda", "lambda"),
    ("ssqlambda", "ssqlambda"),
    ("regmod", "regmod"),
    ("estmov", "estmov"),
    ("minmet", "minmet"),
    ("splineorder", "splineorder"),
    ("numprec", "numprec"),
    ("interp", "interp"),
    ("scale", "scale"),
    ("regrid", "regrid"),
];

/// Field estimation with `topup`.
pub struct TopupNode;

impl TopupNode {
    pub fn new() -> Self {
        Self
    }

    fn build(ctx: &NodeContext) -> Result<(ToolCommand, Map<String, Value>)> {
        let in_file = ctx.path("in_file")?;
        let encoding_file = ctx.path("encoding_file")?;
        let stem = file_stem(&in_file);
        let ext = ctx.tools.output_extension();

        let out_base = match ctx.path("out_base") {
            Ok(p) => p,
            Err(_) => ctx.working_dir.join(format!("{}_base", stem)),
        };
        let out_base_str = out_base.to_string_lossy().into_owned();
        let out_field = output_path(ctx, &in_file, "_field");
        let out_corrected = output_path(ctx, &in_file, "_corrected");
        let out_logfile = ctx.working_dir.join(format!("{}_topup.log", stem));

        let mut cmd = ToolCommand::new("topup")
            .opt_eq(
                "config",
                Some(ctx.text("config").unwrap_or_else(|| DEFAULT_CONFIG.to_string())),
            )
            .opt_eq("datain", Some(encoding_file.to_string_lossy().into_owned()))
            .opt_eq("imain", Some(in_file.to_string_lossy().into_owned()))
            .opt_eq("out", Some(out_base_str.clone()))
            .opt_eq("fout", Some(out_field.to_string_lossy().into_owned()))
            .opt_eq("iout", Some(out_corrected.to_string_lossy().into_owned()))
            .opt_eq("logout", Some(out_logfile.to_string_lossy().into_owned()));
        for (input, flag) in SCALAR_OPTIONS {
            cmd = cmd.opt_eq(flag, ctx.text(input));
        }

        let mut outputs = Map::new();
        outputs.insert(
            "out_fieldcoef".into(),
            Value::String(format!("{}_fieldcoef{}", out_base_str, ext)),
        );
        outputs.insert(
            "out_movpar".into(),
            Value::String(format!("{}_movpar.txt", out_base_str)),
        );
        outputs.insert("out_enc_file".into(), path_value(&encoding_file));
        outputs.insert("out_field".into(), path_value(&out_field));
        outputs.insert("out_corrected".into(), path_value(&out_corrected));
        outputs.insert("out_logfile".into(), path_value(&out_logfile));

        Ok((cmd, outputs))
    }
}

impl Default for TopupNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for TopupNode {
    fn node_type(&self) -> &str {
        "fsl.topup"
    }

    fn description(&self) -> &str {
        "Estimate the susceptibility field from opposite phase-encoding images with topup"
    }

    fn ports(&self, _config: &Value) -> PortSpec {
        let mut ports = PortSpec::new()
            .required("in_file")
            .required("encoding_file")
            .optional("config")
            .optional("out_base");
        for (input, _) in SCALAR_OPTIONS {
            ports = ports.optional(input);
        }
        ports
            .output("out_fieldcoef")
            .output("out_movpar")
            .output("out_enc_file")
            .output("out_field")
            .output("out_corrected")
            .output("out_logfile")
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

    #[test]
    fn test_topup_command() {
        let ctx = ctx(json!({
            "in_file": "/w/merge/func_mean_merged.nii.gz",
            "encoding_file": "/tmp/acqparams.txt",
            "subsamp": 1
        }));
        let (cmd, outputs) = TopupNode::build(&ctx).unwrap();

        assert_eq!(
            cmd.get_args(),
            &[
                "--config=b02b0.cnf",
                "--datain=/tmp/acqparams.txt",
                "--imain=/w/merge/func_mean_merged.nii.gz",
                "--out=/work/topup/node/func_mean_merged_base",
                "--fout=/work/topup/node/func_mean_merged_field.nii.gz",
                "--iout=/work/topup/node/func_mean_merged_corrected.nii.gz",
                "--logout=/work/topup/node/func_mean_merged_topup.log",
                "--subsamp=1",
            ]
        );
        assert_eq!(
            outputs["out_fieldcoef"],
            "/work/topup/node/func_mean_merged_base_fieldcoef.nii.gz"
        );
        assert_eq!(
            outputs["out_movpar"],
            "/work/topup/node/func_mean_merged_base_movpar.txt"
        );
    }

    #[test]
    fn test_custom_config_and_options() {
        let ctx = ctx(json!({
            "in_file": "/w/merged.nii.gz",
            "encoding_file": "/tmp/acq.txt",
            "config": "/opt/my.cnf",
            "max_iter": 5,
            "reg_lambda": 0.005
        }));
        let (cmd, _) = TopupNode::build(&ctx).unwrap();
        let line = cmd.command_line();
        assert!(line.contains("--config=/opt/my.cnf"));
        assert!(line.contains("--miter=5"));
        assert!(line.contains("--lambda=0.005"));
    }

    #[test]
    fn test_requires_encoding_file() {
        let ctx = ctx(json!({"in_file": "/w/merged.nii.gz"}));
        let err = TopupNode::build(&ctx).unwrap_err();
        assert!(err.to_string().contains("encoding_file"));
    }
}
