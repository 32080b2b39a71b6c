//! FSL command-line tools as workflow nodes.
//!
//! Each node builds a [`ToolCommand`] plus the output paths the tool is
//! expected to produce, then runs the tool in its working directory. Output
//! names follow FSL's conventions: `<input stem><suffix><ext>` where the
//! extension depends on `FSLOUTPUTTYPE`.

mod apply_topup;
mod maths;
mod mcflirt;
mod merge;
mod topup;

pub use apply_topup::ApplyTopupNode;
pub use maths::MeanImageNode;
pub use mcflirt::McflirtNode;
pub use merge::FslMergeNode;
pub use topup::TopupNode;

use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

use super::command::ToolCommand;
use super::types::{NodeContext, NodeResult};
use crate::error::Result;
use crate::nifti::split_ext;

/// `<working_dir>/<stem of in_file><suffix><output ext>`.
pub(crate) fn output_path(ctx: &NodeContext, in_file: &Path, suffix: &str) -> PathBuf {
    ctx.working_dir.join(format!(
        "{}{}{}",
        file_stem(in_file),
        suffix,
        ctx.tools.output_extension()
    ))
}

/// File name without directory or NIfTI extension.
pub(crate) fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    split_ext(&name).0.to_string()
}

pub(crate) fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

/// Run a built command and wrap its outputs.
pub(crate) async fn run_tool(
    cmd: ToolCommand,
    outputs: Map<String, Value>,
    ctx: &NodeContext,
) -> Result<NodeResult> {
    let output = cmd.run(ctx).await?;
    Ok(NodeResult::with_metadata(
        outputs,
        json!({ "command_line": output.command_line }),
    ))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::ToolsConfig;
    use std::sync::Arc;

    pub(crate) fn ctx(inputs: Value) -> NodeContext {
        NodeContext::new("run-1", "topup", "node", Path::new("/work/topup/node"))
            .with_inputs(inputs.as_object().cloned().unwrap_or_default())
            .with_tools(Arc::new(ToolsConfig {
                fsl_dir: None,
                output_type: "NIFTI_GZ".to_string(),
            }))
    }
}
