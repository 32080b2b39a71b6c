//! Workflow YAML parser.

use std::path::Path;

use super::types::Workflow;
use crate::error::{Error, Result};

/// Parse a workflow from a YAML string.
pub fn parse_workflow(yaml: &str) -> Result<Workflow> {
    if yaml.trim().is_empty() {
        return Err(Error::Parse("Empty workflow definition".to_string()));
    }

    let workflow: Workflow = serde_yaml::from_str(yaml).map_err(|e| {
        let msg = e.to_string();
        if let Some(field) = extract_missing_field(&msg) {
            Error::Parse(format!("Missing required field: {}", field))
        } else {
            Error::Parse(format!("Invalid YAML: {}", msg))
        }
    })?;
    Ok(workflow)
}

/// Parse a workflow from a file path.
pub fn parse_workflow_file(path: &Path) -> Result<Workflow> {
    let content = std::fs::read_to_string(path)?;
    parse_workflow(&content)
}

/// Serialize a workflow to YAML.
pub fn workflow_to_yaml(workflow: &Workflow) -> Result<String> {
    Ok(serde_yaml::to_string(workflow)?)
}

fn extract_missing_field(error_message: &str) -> Option<&str> {
    let marker = "missing field `";
    let start = error_message.find(marker)? + marker.len();
    let rest = &error_message[start..];
    let end = rest.find('`')?;
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Plugin;

    #[test]
    fn test_parse_simple_workflow() {
        let yaml = r#"
name: fmap-mean
description: Mean of the motion-corrected field map

nodes:
  - name: input
    type: identity
    config:
      fields: [fmap]
  - name: mc
    type: fsl.mcflirt
  - name: mean
    type: fsl.mean_image

connections:
  - { source: input, source_field: fmap, dest: mc, dest_field: in_file }
  - { source: mc, source_field: out_file, dest: mean, dest_field: in_file }
"#;

        let workflow = parse_workflow(yaml).unwrap();
        assert_eq!(workflow.name, "fmap-mean");
        assert_eq!(workflow.nodes.len(), 3);
        assert_eq!(workflow.connections.len(), 2);
        assert_eq!(workflow.upstream("mean"), vec!["mc"]);
        assert_eq!(
            workflow.node_types(),
            vec!["fsl.mcflirt", "fsl.mean_image", "identity"]
        );
    }

    #[test]
    fn test_parse_settings_and_inputs() {
        let yaml = r#"
name: merge-only
settings:
  plugin: linear
nodes:
  - name: merge
    type: fsl.merge
    inputs:
      dimension: t
      in_files: [/data/a.nii.gz, /data/b.nii.gz]
"#;

        let workflow = parse_workflow(yaml).unwrap();
        assert_eq!(workflow.settings.plugin, Some(Plugin::Linear));
        let merge = workflow.get_node("merge").unwrap();
        assert_eq!(merge.inputs["dimension"], "t");
        assert_eq!(merge.inputs["in_files"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_yaml_export_round_trip_keeps_edges() {
        let yaml = r#"
name: pair
nodes:
  - name: a
    type: identity
    config:
      fields: [x]
  - name: b
    type: identity
    config:
      fields: [x]
connections:
  - { source: a, source_field: x, dest: b, dest_field: x }
"#;
        let workflow = parse_workflow(yaml).unwrap();
        let exported = workflow_to_yaml(&workflow).unwrap();
        let reparsed = parse_workflow(&exported).unwrap();

        assert_eq!(reparsed.node_names(), workflow.node_names());
        assert_eq!(reparsed.edges(), workflow.edges());
    }

    #[test]
    fn test_parse_empty_workflow() {
        let result = parse_workflow("");
        assert!(result
            .unwrap_err()
            .to_string()
            .to_lowercase()
            .contains("empty workflow"));
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let result = parse_workflow("name: [broken");
        assert!(result
            .unwrap_err()
            .to_string()
            .to_lowercase()
            .contains("invalid yaml"));
    }

    #[test]
    fn test_parse_missing_required_field_name() {
        let yaml = r#"
nodes:
  - name: a
    type: identity
"#;
        let result = parse_workflow(yaml);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Missing required field: name"));
    }
}
