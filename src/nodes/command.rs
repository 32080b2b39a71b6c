//! External tool invocation.
//!
//! Tools run as child processes inside the node's working directory with
//! `FSLOUTPUTTYPE` set. The exact command line is written to `command.txt`
//! next to the outputs.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, info};

use super::types::NodeContext;
use crate::config::ToolsConfig;
use crate::error::{Error, Result};
use crate::metrics;

/// Longest stderr tail kept in a tool error.
const STDERR_TAIL: usize = 2000;

/// Captured output of a finished tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub command_line: String,
}

/// A command line for one external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    tool: String,
    args: Vec<String>,
}

impl ToolCommand {
    pub fn new(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `--name=value` when `value` is present.
    pub fn opt_eq(self, name: &str, value: Option<String>) -> Self {
        match value {
            Some(v) => self.arg(format!("--{}={}", name, v)),
            None => self,
        }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// The command line as a single shell-readable string.
    pub fn command_line(&self) -> String {
        std::iter::once(self.tool.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Resolve the executable: `<fsl_dir>/bin/<tool>` when FSL's location is
    /// configured and the binary exists there, otherwise a PATH lookup.
    pub fn program(&self, tools: &ToolsConfig) -> PathBuf {
        if let Some(dir) = &tools.fsl_dir {
            let candidate = dir.join("bin").join(&self.tool);
            if candidate.is_file() {
                return candidate;
            }
        }
        PathBuf::from(&self.tool)
    }

    /// Run the tool to completion in `ctx.working_dir`.
    ///
    /// The child is killed if the returned future is dropped.
    pub async fn run(&self, ctx: &NodeContext) -> Result<ToolOutput> {
        let command_line = self.command_line();
        tokio::fs::create_dir_all(&ctx.working_dir).await?;
        tokio::fs::write(
            ctx.working_dir.join("command.txt"),
            format!("{}\n", command_line),
        )
        .await?;

        let program = self.program(&ctx.tools);
        info!(node = %ctx.node_name, "Running: {}", command_line);

        let started = Instant::now();
        let output = Command::new(&program)
            .args(&self.args)
            .current_dir(&ctx.working_dir)
            .env("FSLOUTPUTTYPE", &ctx.tools.output_type)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::Node(format!(
                        "Tool '{}' not found (is FSL installed and FSLDIR set?)",
                        self.tool
                    ))
                } else {
                    Error::Io(e)
                }
            })?;

        metrics::record_tool_duration(started.elapsed(), &self.tool);

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(
            tool = %self.tool,
            status = ?output.status.code(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tool finished"
        );

        if !output.status.success() {
            return Err(Error::Tool {
                tool: self.tool.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr: tail(&stderr, STDERR_TAIL).trim().to_string(),
            });
        }

        Ok(ToolOutput {
            stdout,
            stderr,
            command_line,
        })
    }
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
