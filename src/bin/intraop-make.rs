//! intraop-make - release, fixtures, tests and docs for this repository
//!
//! Tasks run in a fixed order (clean, get_files, tests, docs, release,
//! major_release); the process exits with the first nonzero task code.

use clap::Parser;

use intraop::make::{run, Environment, Layout, Tasks, TerminalPrompt};
use intraop::telemetry::{init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "intraop-make")]
#[command(about = "Run tests, build documentation and cut releases", long_about = None)]
#[command(version)]
struct Cli {
    /// Create a point release
    #[arg(short = 'r', long)]
    release: bool,

    /// Create a major release
    #[arg(short = 'm', long = "major_release")]
    major_release: bool,

    /// Download the test fixtures (needs DATA_INTRAOP)
    #[arg(short = 'g', long = "get_files")]
    get_files: bool,

    /// Run the tests with coverage
    #[arg(short = 't', long)]
    tests: bool,

    /// Build the documentation
    #[arg(short = 'd', long)]
    docs: bool,

    /// Remove generated documentation and downloaded data
    #[arg(short = 'c', long)]
    clean: bool,
}

impl From<&Cli> for Tasks {
    fn from(cli: &Cli) -> Self {
        Self {
            clean: cli.clean,
            get_files: cli.get_files,
            tests: cli.tests,
            docs: cli.docs,
            release: cli.release,
            major_release: cli.major_release,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LogFormat::from_env());

    let cli = Cli::parse();
    let layout = Layout::new(env!("CARGO_MANIFEST_DIR"));

    let code = run(
        &Tasks::from(&cli),
        &layout,
        &Environment::from_env(),
        &TerminalPrompt,
    )
    .await?;

    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_short_flags_select_tasks() {
        let cli = Cli::try_parse_from(["intraop-make", "-c", "-g", "-m"]).unwrap();
        let tasks = Tasks::from(&cli);
        assert!(tasks.clean && tasks.get_files && tasks.major_release);
        assert!(!tasks.tests && !tasks.docs && !tasks.release);
    }

    #[test]
    fn test_long_flags_keep_underscores() {
        let cli = Cli::try_parse_from(["intraop-make", "--get_files", "--major_release"]).unwrap();
        assert!(cli.get_files);
        assert!(cli.major_release);
    }
}
