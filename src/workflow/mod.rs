//! Workflow definition, parsing, and validation.
//!
//! Workflows are graphs of:
//! - Nodes: named tool invocations with statically bound inputs
//! - Connections: output port of one node to input port of another
//! - Settings: preferred scheduler plugin

mod dag;
mod parser;
mod types;
mod validator;

pub use dag::{execution_levels, to_dot, to_text, GraphStyle};
pub use parser::{parse_workflow, parse_workflow_file, workflow_to_yaml};
pub use types::*;
pub use validator::{validate_ports, validate_workflow};
