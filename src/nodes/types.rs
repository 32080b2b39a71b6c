//! Node trait and context types.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ToolsConfig;
use crate::error::{Error, Result};

/// A declared input port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPort {
    pub name: String,
    /// Whether the node cannot run without a value on this port
    pub required: bool,
}

/// Input and output ports of a node type, given its construction config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSpec {
    pub inputs: Vec<InputPort>,
    pub outputs: Vec<String>,
}

impl PortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &str) -> Self {
        self.inputs.push(InputPort {
            name: name.to_string(),
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: &str) -> Self {
        self.inputs.push(InputPort {
            name: name.to_string(),
            required: false,
        });
        self
    }

    pub fn output(mut self, name: &str) -> Self {
        self.outputs.push(name.to_string());
        self
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|p| p.name == name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|p| p == name)
    }

    /// Names of required input ports.
    pub fn required_inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
    }
}

/// Result of node execution.
#[derive(Debug, Clone, Default)]
pub struct NodeResult {
    /// Output port values
    pub outputs: Map<String, Value>,
    /// Metadata (command line, timing, ...)
    pub metadata: Value,
}

impl NodeResult {
    /// Create a result from output values.
    pub fn new(outputs: Map<String, Value>) -> Self {
        Self {
            outputs,
            metadata: serde_json::json!({}),
        }
    }

    /// Create a result with outputs and metadata.
    pub fn with_metadata(outputs: Map<String, Value>, metadata: Value) -> Self {
        Self { outputs, metadata }
    }

    /// Create an empty result.
    pub fn empty() -> Self {
        Self::new(Map::new())
    }

    /// Add one output value.
    pub fn with_output(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.outputs.insert(name.to_string(), value.into());
        self
    }
}

/// Context passed to a node during execution.
#[derive(Debug, Clone)]
pub struct NodeContext {
    /// Resolved input values (static inputs overlaid with upstream outputs)
    pub inputs: Map<String, Value>,

    /// Run ID
    pub run_id: String,

    /// Workflow name
    pub workflow_name: String,

    /// Node name within the workflow
    pub node_name: String,

    /// Directory the node writes its outputs into
    pub working_dir: PathBuf,

    /// External tool settings
    pub tools: Arc<ToolsConfig>,
}

impl NodeContext {
    /// Create a new context.
    pub fn new(run_id: &str, workflow_name: &str, node_name: &str, working_dir: &Path) -> Self {
        Self {
            inputs: Map::new(),
            run_id: run_id.to_string(),
            workflow_name: workflow_name.to_string(),
            node_name: node_name.to_string(),
            working_dir: working_dir.to_path_buf(),
            tools: Arc::new(ToolsConfig::default()),
        }
    }

    /// Set the input values.
    pub fn with_inputs(mut self, inputs: Map<String, Value>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Set tool configuration.
    pub fn with_tools(mut self, tools: Arc<ToolsConfig>) -> Self {
        self.tools = tools;
        self
    }

    /// Get an input value.
    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name).filter(|v| !v.is_null())
    }

    /// Get a required path-valued input.
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        match self.input(name) {
            Some(Value::String(s)) => Ok(PathBuf::from(s)),
            Some(other) => Err(Error::Node(format!(
                "Node '{}' input '{}' must be a file path, got {}",
                self.node_name, name, other
            ))),
            None => Err(self.missing(name)),
        }
    }

    /// Get a required list-of-paths input. A single path is accepted as a
    /// one-element list.
    pub fn paths(&self, name: &str) -> Result<Vec<PathBuf>> {
        match self.input(name) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str().map(PathBuf::from).ok_or_else(|| {
                        Error::Node(format!(
                            "Node '{}' input '{}' must contain file paths",
                            self.node_name, name
                        ))
                    })
                })
                .collect(),
            Some(Value::String(s)) => Ok(vec![PathBuf::from(s)]),
            Some(other) => Err(Error::Node(format!(
                "Node '{}' input '{}' must be a list of file paths, got {}",
                self.node_name, name, other
            ))),
            None => Err(self.missing(name)),
        }
    }

    /// Get an optional string-like input (numbers are rendered as text).
    pub fn text(&self, name: &str) -> Option<String> {
        match self.input(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Get an optional boolean input.
    pub fn flag(&self, name: &str) -> bool {
        self.input(name).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    fn missing(&self, name: &str) -> Error {
        Error::Node(format!(
            "Node '{}' is missing required input '{}'",
            self.node_name, name
        ))
    }
}

/// Trait that all node types must implement.
#[async_trait]
pub trait Node: Send + Sync {
    /// Get the node type name (e.g., "identity", "fsl.topup").
    fn node_type(&self) -> &str;

    /// Ports exposed by this node type for the given construction config.
    fn ports(&self, config: &Value) -> PortSpec;

    /// Execute the node with the given configuration and context.
    ///
    /// # Arguments
    /// * `config` - Construction config from the workflow definition
    /// * `ctx` - Execution context with resolved inputs and a working directory
    async fn execute(&self, config: &Value, ctx: &NodeContext) -> Result<NodeResult>;

    /// Get a description of this node type.
    fn description(&self) -> &str {
        "A workflow node"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_with(inputs: Value) -> NodeContext {
        NodeContext::new("run-1", "wf", "node", Path::new("/tmp"))
            .with_inputs(inputs.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn test_path_inputs() {
        let ctx = ctx_with(json!({"in_file": "/data/func.nii.gz", "n": 3}));
        assert_eq!(ctx.path("in_file").unwrap(), PathBuf::from("/data/func.nii.gz"));
        assert!(ctx.path("n").is_err());

        let err = ctx.path("missing").unwrap_err();
        assert!(err.to_string().contains("missing required input 'missing'"));
    }

    #[test]
    fn test_paths_accepts_single_string() {
        let ctx = ctx_with(json!({"one": "/a.nii", "many": ["/a.nii", "/b.nii"], "bad": [1]}));
        assert_eq!(ctx.paths("one").unwrap().len(), 1);
        assert_eq!(ctx.paths("many").unwrap().len(), 2);
        assert!(ctx.paths("bad").is_err());
    }

    #[test]
    fn test_text_and_flag() {
        let ctx = ctx_with(json!({"subsamp": 1, "method": "jac", "save_plots": true, "nothing": null}));
        assert_eq!(ctx.text("subsamp").as_deref(), Some("1"));
        assert_eq!(ctx.text("method").as_deref(), Some("jac"));
        assert!(ctx.flag("save_plots"));
        assert!(ctx.input("nothing").is_none());
    }

    #[test]
    fn test_port_spec_builder() {
        let ports = PortSpec::new()
            .required("in_file")
            .optional("cost")
            .output("out_file");
        assert!(ports.has_input("cost"));
        assert!(ports.has_output("out_file"));
        assert_eq!(ports.required_inputs().collect::<Vec<_>>(), vec!["in_file"]);
    }
}
