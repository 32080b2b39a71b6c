//! Configuration management.
//!
//! intraop configuration can come from:
//! - Config file (~/.config/intraop/config.toml)
//! - Environment variables (INTRAOP_*, plus FSL's own FSLDIR/FSLOUTPUTTYPE)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::Plugin;

/// intraop configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Workflow execution settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// External tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Workflow execution configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding per-run working directories
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    /// Scheduler plugin used when none is given on the command line
    #[serde(default)]
    pub plugin: Plugin,

    /// Process limit for the MultiProc plugin (defaults to available CPUs)
    #[serde(default)]
    pub n_procs: Option<usize>,
}

/// FSL configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// FSL installation directory; binaries are taken from `<fsl_dir>/bin`
    #[serde(default = "default_fsl_dir")]
    pub fsl_dir: Option<PathBuf>,

    /// Value passed to tools as FSLOUTPUTTYPE
    #[serde(default = "default_output_type")]
    pub output_type: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fsl_dir: default_fsl_dir(),
            output_type: default_output_type(),
        }
    }
}

fn default_fsl_dir() -> Option<PathBuf> {
    std::env::var("FSLDIR").ok().map(PathBuf::from)
}

fn default_output_type() -> String {
    std::env::var("FSLOUTPUTTYPE").unwrap_or_else(|_| "NIFTI_GZ".to_string())
}

impl ToolsConfig {
    /// File extension FSL writes for the configured output type.
    pub fn output_extension(&self) -> &'static str {
        match self.output_type.as_str() {
            "NIFTI" => ".nii",
            "NIFTI_PAIR" => ".img",
            "NIFTI_PAIR_GZ" => ".img.gz",
            _ => ".nii.gz",
        }
    }
}

impl Config {
    /// Load configuration from default locations.
    pub fn load() -> Self {
        let mut config = Self::default();

        let path = Self::config_dir().join("config.toml");
        if let Ok(partial) = Self::load_partial_from_path(&path) {
            config.apply_partial(partial);
        }

        config.apply_env_overrides();
        config
    }

    /// Get the data directory.
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("intraop"))
            .unwrap_or_else(|| PathBuf::from(".intraop"))
    }

    /// Get the config directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("intraop"))
            .unwrap_or_else(|| PathBuf::from(".intraop"))
    }

    /// Directory under which workflow working directories are created.
    pub fn base_dir(&self) -> PathBuf {
        self.engine
            .base_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("runs"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("INTRAOP_BASE_DIR") {
            self.engine.base_dir = Some(PathBuf::from(dir));
        }
        if let Ok(plugin) = std::env::var("INTRAOP_PLUGIN") {
            if let Ok(parsed) = plugin.parse::<Plugin>() {
                self.engine.plugin = parsed;
            }
        }
        if let Ok(n) = std::env::var("INTRAOP_N_PROCS") {
            if let Ok(parsed) = n.parse::<usize>() {
                self.engine.n_procs = Some(parsed);
            }
        }
        if let Ok(dir) = std::env::var("INTRAOP_FSL_DIR") {
            self.tools.fsl_dir = Some(PathBuf::from(dir));
        }
        if let Ok(output_type) = std::env::var("INTRAOP_FSL_OUTPUT_TYPE") {
            self.tools.output_type = output_type;
        }
    }

    fn load_partial_from_path(path: &Path) -> std::result::Result<PartialConfig, ()> {
        let content = std::fs::read_to_string(path).map_err(|_| ())?;
        Self::parse_partial(&content)
    }

    fn parse_partial(content: &str) -> std::result::Result<PartialConfig, ()> {
        toml::from_str(content).map_err(|_| ())
    }

    fn apply_partial(&mut self, partial: PartialConfig) {
        if let Some(engine) = partial.engine {
            self.engine = engine;
        }
        if let Some(tools) = partial.tools {
            self.tools = tools;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    engine: Option<EngineConfig>,
    tools: Option<ToolsConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_overrides_engine() {
        let partial = Config::parse_partial(
            r#"
[engine]
base_dir = "/scratch/intraop"
plugin = "linear"
n_procs = 2
"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.apply_partial(partial);

        assert_eq!(config.base_dir(), PathBuf::from("/scratch/intraop"));
        assert_eq!(config.engine.plugin, Plugin::Linear);
        assert_eq!(config.engine.n_procs, Some(2));
    }

    #[test]
    fn test_invalid_partial_is_rejected() {
        assert!(Config::parse_partial("[engine\nbase_dir = 1").is_err());
    }

    #[test]
    fn test_output_extension() {
        let mut tools = ToolsConfig {
            fsl_dir: None,
            output_type: "NIFTI".to_string(),
        };
        assert_eq!(tools.output_extension(), ".nii");

        tools.output_type = "NIFTI_GZ".to_string();
        assert_eq!(tools.output_extension(), ".nii.gz");
    }
}
