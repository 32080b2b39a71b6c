//! Error types for intraop.
//!
//! Errors carry a stable code so callers (and the CLI's JSON output) can
//! tell a failed tool invocation from a malformed workflow or image.

use thiserror::Error;

/// Result type alias for intraop operations.
pub type Result<T> = std::result::Result<T, Error>;

/// intraop error types.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("Node error: {0}")]
    Node(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Tool '{tool}' exited with code {code}: {stderr}")]
    Tool {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("Release error: {0}")]
    Release(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error code for programmatic matching.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Workflow(_) => "WORKFLOW_ERROR",
            Error::Node(_) => "NODE_ERROR",
            Error::Execution(_) => "EXECUTION_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Parse(_) => "PARSE_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Image(_) => "IMAGE_ERROR",
            Error::Tool { .. } => "TOOL_ERROR",
            Error::Release(_) => "RELEASE_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Http(_) => "HTTP_ERROR",
            Error::Zip(_) => "ARCHIVE_ERROR",
            Error::Yaml(_) => "YAML_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }

    /// Convert to a JSON error envelope.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_message() {
        let err = Error::Tool {
            tool: "topup".to_string(),
            code: 1,
            stderr: "Image Exception".to_string(),
        };
        assert_eq!(err.code(), "TOOL_ERROR");
        assert_eq!(
            err.to_string(),
            "Tool 'topup' exited with code 1: Image Exception"
        );
    }

    #[test]
    fn test_to_json_envelope() {
        let err = Error::Validation("Workflow has circular dependencies".into());
        let json = err.to_json();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert_eq!(err.code(), "IO_ERROR");
    }
}
