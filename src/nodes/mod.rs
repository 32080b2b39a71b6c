//! Node implementations.
//!
//! Nodes are the building blocks of workflows. Most wrap one external tool
//! invocation; a few small utilities (identity, list merge, acquisition
//! parameters) run in-process.

mod acquisition;
pub mod command;
pub mod fsl;
mod identity;
mod list_merge;
mod registry;
mod types;

pub use acquisition::AcquisitionParametersNode;
pub use command::{ToolCommand, ToolOutput};
pub use fsl::{ApplyTopupNode, FslMergeNode, McflirtNode, MeanImageNode, TopupNode};
pub use identity::IdentityNode;
pub use list_merge::ListMergeNode;
pub use registry::NodeRegistry;
pub use types::{InputPort, Node, NodeContext, NodeResult, PortSpec};
