//! Repository automation behind `intraop-make`.
//!
//! Each task returns a process-style exit code; [`run`] executes the selected
//! tasks in a fixed order and reports the first nonzero code.

mod checks;
mod clean;
mod fixtures;
mod release;

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tracing::{debug, info, warn};

use crate::error::Result;

pub use checks::{docs, tests};
pub use clean::clean;
pub use fixtures::get_files;
pub use release::{
    insert_changelog, prepare_release, release, Prompt, ReleaseLevel, TerminalPrompt, Version,
};

/// Well-known paths of the repository checkout.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version_file(&self) -> PathBuf {
        self.root.join("VERSION")
    }

    pub fn changes_file(&self) -> PathBuf {
        self.root.join("CHANGES.rst")
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.root.join("docs")
    }

    /// Generated documentation
    pub fn build_dir(&self) -> PathBuf {
        self.docs_dir().join("build")
    }

    pub fn api_dir(&self) -> PathBuf {
        self.docs_dir().join("source").join("api")
    }

    pub fn tests_dir(&self) -> PathBuf {
        self.root.join("tests")
    }

    /// Downloaded fixtures
    pub fn data_dir(&self) -> PathBuf {
        self.tests_dir().join("data")
    }

    /// Workflow output of the end-to-end tests
    pub fn analysis_dir(&self) -> PathBuf {
        self.data_dir().join("analysis")
    }
}

/// Environment variables the tasks branch on, read once.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// `DATA_INTRAOP`: URL of the fixture archive
    pub data_url: Option<String>,
    /// `CI`: running on a CI service
    pub ci: bool,
    /// `DOWNLOADS`: CI cache directory for the fixture archive
    pub downloads: Option<PathBuf>,
}

impl Environment {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            data_url: get("DATA_INTRAOP"),
            ci: get("CI").is_some(),
            downloads: get("DOWNLOADS").map(PathBuf::from),
        }
    }
}

/// Tasks selected on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tasks {
    pub clean: bool,
    pub get_files: bool,
    pub tests: bool,
    pub docs: bool,
    pub release: bool,
    pub major_release: bool,
}

/// Run the selected tasks in the order clean, get-files, tests, docs,
/// release, major release. Every selected task runs; the result is the first
/// nonzero task code, or 0.
pub async fn run(
    tasks: &Tasks,
    layout: &Layout,
    env: &Environment,
    prompt: &dyn Prompt,
) -> Result<i32> {
    let mut code = 0;
    let mut record = |task: &str, c: i32| {
        if c != 0 {
            warn!("{} finished with code {}", task, c);
            if code == 0 {
                code = c;
            }
        }
    };

    if tasks.clean {
        clean(layout)?;
    }
    if tasks.get_files {
        record("get_files", get_files(layout, env).await?);
    }
    if tasks.tests {
        record("tests", self::tests(layout, env).await?);
    }
    if tasks.docs {
        record("docs", docs(layout).await?);
    }
    if tasks.release {
        record("release", release(layout, ReleaseLevel::Minor, prompt).await?);
    }
    if tasks.major_release {
        record(
            "major_release",
            release(layout, ReleaseLevel::Major, prompt).await?,
        );
    }

    Ok(code)
}

/// Run a program to completion with inherited stdio and return its exit code.
/// A process killed by a signal counts as code 1.
pub(crate) async fn run_command(program: &str, args: &[&str], cwd: &Path) -> Result<i32> {
    info!("Running: {} {}", program, args.join(" "));
    let status = tokio::process::Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::inherit())
        .status()
        .await?;
    debug!("{} exited with {}", program, status);
    Ok(status.code().unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct NoPrompt;

    impl Prompt for NoPrompt {
        fn ask(&self, _prompt: &str) -> Result<String> {
            panic!("no prompt expected");
        }
    }

    #[test]
    fn test_environment_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("DATA_INTRAOP", "https://example.org/intraop.zip"),
            ("CI", "true"),
            ("DOWNLOADS", ""),
        ]
        .into_iter()
        .collect();
        let env = Environment::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(
            env.data_url.as_deref(),
            Some("https://example.org/intraop.zip")
        );
        assert!(env.ci);
        assert!(env.downloads.is_none());
    }

    #[test]
    fn test_layout_paths() {
        let layout = Layout::new("/repo");
        assert_eq!(layout.build_dir(), PathBuf::from("/repo/docs/build"));
        assert_eq!(layout.api_dir(), PathBuf::from("/repo/docs/source/api"));
        assert_eq!(
            layout.analysis_dir(),
            PathBuf::from("/repo/tests/data/analysis")
        );
    }

    #[tokio::test]
    async fn test_run_reports_first_failing_code() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        std::fs::create_dir_all(layout.build_dir()).unwrap();

        let tasks = Tasks {
            clean: true,
            get_files: true,
            ..Tasks::default()
        };
        let code = run(&tasks, &layout, &Environment::default(), &NoPrompt)
            .await
            .unwrap();

        assert_eq!(code, 1);
        assert!(!layout.build_dir().exists());
    }

    #[tokio::test]
    async fn test_run_command_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(run_command("sh", &["-c", "exit 0"], dir.path()).await.unwrap(), 0);
        assert_eq!(run_command("sh", &["-c", "exit 3"], dir.path()).await.unwrap(), 3);
    }
}
