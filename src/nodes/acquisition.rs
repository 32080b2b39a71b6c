//! Acquisition-parameters node - wraps [`write_acquisition_parameters`].

use async_trait::async_trait;
use serde_json::{json, Value};

use super::fsl::path_value;
use super::types::{Node, NodeContext, NodeResult, PortSpec};
use crate::acqparams::write_acquisition_parameters;
use crate::error::{Error, Result};

/// Generates the per-volume encoding file for applytopup.
pub struct AcquisitionParametersNode;

impl AcquisitionParametersNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AcquisitionParametersNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for AcquisitionParametersNode {
    fn node_type(&self) -> &str {
        "acquisition_parameters"
    }

    fn description(&self) -> &str {
        "Write one phase-encoding line per volume of a 4-D image"
    }

    fn ports(&self, _config: &Value) -> PortSpec {
        PortSpec::new()
            .required("in_file")
            .optional("output_dir")
            .output("encoding_file")
    }

    async fn execute(&self, _config: &Value, ctx: &NodeContext) -> Result<NodeResult> {
        let in_file = ctx.path("in_file")?;
        let output_dir = ctx
            .path("output_dir")
            .unwrap_or_else(|_| ctx.working_dir.clone());
        tokio::fs::create_dir_all(&output_dir).await?;

        let path = tokio::task::spawn_blocking(move || {
            write_acquisition_parameters(&in_file, &output_dir)
        })
        .await
        .map_err(|e| Error::Internal(format!("acquisition parameters task failed: {}", e)))??;

        Ok(NodeResult::with_metadata(
            serde_json::Map::from_iter([("encoding_file".to_string(), path_value(&path))]),
            json!({ "function": "write_acquisition_parameters" }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nifti::tests::write_nii_gz;
    use std::path::Path;

    #[tokio::test]
    async fn test_writes_into_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let func = dir.path().join("func.nii.gz");
        write_nii_gz(&func, &[16, 16, 8, 4]);
        let wd = dir.path().join("acquisition_parameters");

        let ctx = NodeContext::new("run-1", "topup", "acquisition_parameters", &wd)
            .with_inputs(
                json!({"in_file": func.to_string_lossy()})
                    .as_object()
                    .cloned()
                    .unwrap(),
            );

        let result = AcquisitionParametersNode::new()
            .execute(&Value::Null, &ctx)
            .await
            .unwrap();

        let path = result.outputs["encoding_file"].as_str().unwrap();
        assert!(Path::new(path).starts_with(&wd));
        assert_eq!(std::fs::read_to_string(path).unwrap().lines().count(), 4);
    }
}
