//! intraop CLI - topup pipeline and workflow tooling

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};

use intraop::config::Config;
use intraop::engine::{Execution, ExecutionStatus, Executor, Plugin};
use intraop::nodes::NodeRegistry;
use intraop::shutdown::ShutdownCoordinator;
use intraop::telemetry::{init_logging, LogFormat};
use intraop::workflow::{GraphStyle, Workflow};

#[derive(Parser)]
#[command(name = "intraop")]
#[command(about = "Topup distortion correction for intraoperative fMRI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Motion and distortion correction pipeline
    Topup {
        #[command(subcommand)]
        action: TopupActions,
    },

    /// YAML-defined workflows
    Workflows {
        #[command(subcommand)]
        action: WorkflowActions,
    },

    /// Write the acquisition parameters of a 4-D image
    Acqparams {
        /// Functional image (.nii or .nii.gz)
        image: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Print the header summary of a NIfTI image
    Header {
        /// Image (.nii or .nii.gz)
        image: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
enum TopupActions {
    /// Run the pipeline and print the corrected image
    Run {
        /// Functional run (4-D)
        #[arg(long)]
        func: PathBuf,

        /// Field map with the opposite phase encoding
        #[arg(long)]
        fmap: PathBuf,

        #[command(flatten)]
        run: RunArgs,

        /// Write a Prometheus metrics snapshot after the run
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },

    /// Write the workflow graph in Graphviz DOT format
    Graph {
        /// Graph style (flat, colored)
        #[arg(long, default_value = "flat")]
        style: GraphStyle,

        /// Print an indented tree from the output node instead of DOT
        #[arg(long, conflicts_with = "style")]
        text: bool,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export the workflow as YAML
    Export {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum WorkflowActions {
    /// Validate a workflow file
    Validate {
        /// Path to workflow YAML file
        file: PathBuf,
    },

    /// Run a workflow file
    Run {
        /// Path to workflow YAML file
        file: PathBuf,

        /// Static input (can be repeated): --set node.field=value
        #[arg(long = "set", value_parser = parse_binding)]
        bindings: Vec<(String, String, String)>,

        #[command(flatten)]
        run: RunArgs,
    },
}

/// Scheduling options shared by the run commands.
#[derive(clap::Args)]
struct RunArgs {
    /// Directory for the per-node working directories
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Scheduler plugin (linear, multiproc)
    #[arg(long)]
    plugin: Option<Plugin>,

    /// Process limit for the multiproc plugin
    #[arg(long)]
    n_procs: Option<usize>,
}

fn parse_binding(s: &str) -> std::result::Result<(String, String, String), String> {
    let (target, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid binding '{}'. Expected node.field=value", s))?;
    let (node, field) = target
        .split_once('.')
        .ok_or_else(|| format!("Invalid binding '{}'. Expected node.field=value", s))?;
    if node.is_empty() || field.is_empty() {
        return Err(format!("Invalid binding '{}'. Expected node.field=value", s));
    }
    Ok((node.to_string(), field.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let format = LogFormat::from_env();
    init_logging(format);

    let cli = Cli::parse();
    let result = dispatch(cli.command).await;

    if let Err(e) = &result {
        if let Some(err) = e.downcast_ref::<intraop::Error>() {
            tracing::error!(code = err.code(), "{}", err);
            if format == LogFormat::Json {
                println!("{}", err.to_json());
            }
        }
    }
    result
}

async fn dispatch(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Topup { action } => match action {
            TopupActions::Run {
                func,
                fmap,
                run,
                metrics_out,
            } => cmd_topup_run(&func, &fmap, &run, metrics_out.as_deref()).await?,
            TopupActions::Graph {
                style,
                text,
                output,
            } => cmd_topup_graph(style, text, output.as_deref())?,
            TopupActions::Export { output } => cmd_topup_export(output.as_deref())?,
        },
        Commands::Workflows { action } => match action {
            WorkflowActions::Validate { file } => cmd_workflows_validate(&file)?,
            WorkflowActions::Run {
                file,
                bindings,
                run,
            } => cmd_workflows_run(&file, &bindings, &run).await?,
        },
        Commands::Acqparams { image, output } => cmd_acqparams(&image, &output)?,
        Commands::Header { image } => cmd_header(&image)?,
        Commands::Nodes => cmd_nodes(),
        Commands::Completions { shell } => {
            cmd_completions(shell)?;
        }
    }

    Ok(())
}

/// Shell completion variants
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum CompletionShell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
            CompletionShell::Fish => Shell::Fish,
            CompletionShell::PowerShell => Shell::PowerShell,
            CompletionShell::Elvish => Shell::Elvish,
        }
    }
}

/// Generate shell completions
fn cmd_completions(shell: CompletionShell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    let shell: Shell = shell.into();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
    Ok(())
}

/// Write `content` to `output`, or to stdout when no file is given.
fn write_output(content: &str, output: Option<&Path>, what: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, content)?;
            println!("✓ Wrote {} to {}", what, path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

/// Build an executor for `workflow`. Command-line flags win over the
/// workflow's own settings, which win over the config file.
fn build_executor(config: &Config, workflow: &Workflow, run: &RunArgs) -> Executor {
    let plugin = run
        .plugin
        .or(workflow.settings.plugin)
        .unwrap_or(config.engine.plugin);
    let n_procs = run
        .n_procs
        .or(workflow.settings.n_procs)
        .or(config.engine.n_procs);
    let base_dir = run.base_dir.clone().unwrap_or_else(|| config.base_dir());

    let shutdown = Arc::new(ShutdownCoordinator::new());
    shutdown.start_signal_listener();

    Executor::new(NodeRegistry::new(), base_dir)
        .with_plugin(plugin)
        .with_n_procs(n_procs)
        .with_tools(config.tools.clone())
        .with_shutdown(shutdown)
}

fn print_execution(execution: &Execution) {
    println!();
    println!("Execution ID: {}", execution.id);
    println!("Status: {}", execution.status);
    println!("Working directory: {}", execution.working_dir.display());

    if let Some(error) = &execution.error {
        println!("Error: {}", error);
    }

    if let Some(finished) = execution.finished_at {
        let duration = finished - execution.started_at;
        println!("Duration: {}ms", duration.num_milliseconds());
    }
}

// ============================================================================
// Topup Commands
// ============================================================================

async fn cmd_topup_run(
    func: &Path,
    fmap: &Path,
    run: &RunArgs,
    metrics_out: Option<&Path>,
) -> anyhow::Result<()> {
    use intraop::pipelines::topup::{bind_topup_inputs, corrected_image, make_w_topup};

    for (label, path) in [("func", func), ("fmap", fmap)] {
        if !path.exists() {
            anyhow::bail!("File not found ({}): {}", label, path.display());
        }
    }
    let func = std::path::absolute(func)?;
    let fmap = std::path::absolute(fmap)?;

    if metrics_out.is_some() {
        intraop::metrics::init_metrics()?;
    }

    let config = Config::load();
    let mut workflow = make_w_topup()?;
    bind_topup_inputs(&mut workflow, &func, &fmap)?;

    let executor = build_executor(&config, &workflow, run);
    println!(
        "Running workflow '{}' ({} nodes, up to {} at once)...",
        workflow.name,
        workflow.nodes.len(),
        executor.concurrency()
    );

    let execution = executor.execute(&workflow).await?;
    print_execution(&execution);

    if let Some(path) = metrics_out {
        std::fs::write(path, intraop::metrics::render_metrics())?;
        println!("Metrics: {}", path.display());
    }

    if execution.status != ExecutionStatus::Completed {
        anyhow::bail!("Workflow '{}' did not complete", workflow.name);
    }

    println!();
    println!("{}", corrected_image(&execution)?.display());
    Ok(())
}

fn cmd_topup_graph(style: GraphStyle, text: bool, output: Option<&Path>) -> anyhow::Result<()> {
    use intraop::pipelines::topup::{topup_layout, OUTPUT_NODE};
    use intraop::workflow::{to_dot, to_text};

    let workflow = topup_layout();
    let graph = if text {
        format!("{}\n", to_text(&workflow, OUTPUT_NODE))
    } else {
        to_dot(&workflow, style)
    };
    write_output(&graph, output, "graph")
}

/// Export the workflow as YAML. With `-o` the encoding file is written next
/// to it (`<name>.acqparams.txt`) so the export runs as is; on stdout it
/// names a placeholder.
fn cmd_topup_export(output: Option<&Path>) -> anyhow::Result<()> {
    use intraop::pipelines::topup::{make_w_topup_with, topup_layout, write_encoding_file};
    use intraop::workflow::workflow_to_yaml;

    let workflow = match output {
        Some(path) => {
            let encoding_file = std::path::absolute(path.with_extension("acqparams.txt"))?;
            if let Some(parent) = encoding_file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            write_encoding_file(&encoding_file)?;
            make_w_topup_with(&encoding_file)
        }
        None => topup_layout(),
    };
    write_output(&workflow_to_yaml(&workflow)?, output, "workflow")
}

// ============================================================================
// Workflow Commands
// ============================================================================

fn load_workflow(file: &Path) -> anyhow::Result<Workflow> {
    use intraop::workflow::{parse_workflow_file, validate_workflow};

    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let workflow = parse_workflow_file(file)?;
    validate_workflow(&workflow)?;
    Ok(workflow)
}

/// Value of a `--set` binding. JSON scalars and arrays are taken as-is;
/// anything else is a string, made absolute when it names an existing path
/// (tools run inside their node directory).
fn binding_value(raw: &str) -> anyhow::Result<serde_json::Value> {
    if let Ok(value) = serde_json::from_str(raw) {
        return Ok(value);
    }
    let path = Path::new(raw);
    if path.is_relative() && path.exists() {
        let absolute = std::path::absolute(path)?;
        return Ok(serde_json::Value::String(
            absolute.to_string_lossy().into_owned(),
        ));
    }
    Ok(serde_json::Value::String(raw.to_string()))
}

fn cmd_workflows_validate(file: &Path) -> anyhow::Result<()> {
    use intraop::workflow::{execution_levels, validate_ports};

    let workflow = load_workflow(file)?;
    validate_ports(&workflow, &NodeRegistry::new())?;

    println!("✓ Workflow '{}' is valid", workflow.name);
    println!();
    println!("  Nodes: {}", workflow.nodes.len());
    println!("  Connections: {}", workflow.connections.len());
    println!();
    println!("Execution order:");
    for (i, level) in execution_levels(&workflow)?.iter().enumerate() {
        println!("  {}. {}", i + 1, level.join(", "));
    }

    Ok(())
}

async fn cmd_workflows_run(
    file: &Path,
    bindings: &[(String, String, String)],
    run: &RunArgs,
) -> anyhow::Result<()> {
    use intraop::workflow::validate_ports;

    let mut workflow = load_workflow(file)?;
    for (node, field, value) in bindings {
        workflow.set_input(node, field, binding_value(value)?)?;
    }
    validate_ports(&workflow, &NodeRegistry::new())?;

    let config = Config::load();
    let executor = build_executor(&config, &workflow, run);

    println!("Running workflow '{}'...", workflow.name);
    let execution = executor.execute(&workflow).await?;
    print_execution(&execution);

    if execution.status != ExecutionStatus::Completed {
        anyhow::bail!("Workflow '{}' did not complete", workflow.name);
    }

    // Only terminal nodes are reported
    let downstream = workflow.downstream_map();
    for (node, outputs) in &execution.outputs {
        if downstream
            .get(node.as_str())
            .is_some_and(|d| !d.is_empty())
        {
            continue;
        }
        println!();
        println!("{}:", node);
        for (field, value) in outputs {
            println!("  {}: {}", field, value);
        }
    }

    Ok(())
}

// ============================================================================
// Image Commands
// ============================================================================

fn cmd_acqparams(image: &Path, output: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(output)?;
    let path = intraop::acqparams::write_acquisition_parameters(image, output)?;
    println!("{}", path.display());
    Ok(())
}

fn cmd_header(image: &Path) -> anyhow::Result<()> {
    let header = intraop::nifti::read_header(image)?;

    println!("{}", image.display());
    println!("  Byte order: {:?}", header.endianness);
    let shape: Vec<String> = header.shape().iter().map(|d| d.to_string()).collect();
    println!("  Shape: {}", shape.join(" x "));
    let [x, y, z] = header.voxel_size;
    println!("  Voxel size: {} x {} x {} mm", x, y, z);
    if let Ok(volumes) = header.volumes() {
        println!("  Volumes: {}", volumes);
    }
    Ok(())
}

fn cmd_nodes() {
    let registry = NodeRegistry::new();
    println!("Available node types:");
    println!();
    for (node_type, description) in registry.descriptions() {
        println!("  {:<24} {}", node_type, description);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_binding() {
        assert_eq!(
            parse_binding("input.func=/data/func.nii.gz").unwrap(),
            (
                "input".to_string(),
                "func".to_string(),
                "/data/func.nii.gz".to_string()
            )
        );
        assert_eq!(parse_binding("topup.subsamp=1").unwrap().2, "1");
        assert!(parse_binding("input=foo").is_err());
        assert!(parse_binding("input.func").is_err());
        assert!(parse_binding(".func=x").is_err());
    }

    #[test]
    fn test_binding_value() {
        assert_eq!(binding_value("1").unwrap(), serde_json::json!(1));
        assert_eq!(binding_value("jac").unwrap(), serde_json::json!("jac"));
        assert_eq!(
            binding_value("/data/func.nii.gz").unwrap(),
            serde_json::json!("/data/func.nii.gz")
        );

        // Cargo runs tests from the package root
        let value = binding_value("Cargo.toml").unwrap();
        let path = Path::new(value.as_str().unwrap());
        assert!(path.is_absolute());
        assert!(path.ends_with("Cargo.toml"));
        assert!(path.exists());
    }

    #[test]
    fn test_export_writes_encoding_file_beside_yaml() {
        use intraop::workflow::parse_workflow_file;

        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("exports").join("topup.yaml");

        cmd_topup_export(Some(&yaml)).unwrap();

        let encoding_file = dir.path().join("exports").join("topup.acqparams.txt");
        assert_eq!(
            std::fs::read_to_string(&encoding_file).unwrap(),
            "0 -1 0 1\n0 1 0 1\n"
        );
        let workflow = parse_workflow_file(&yaml).unwrap();
        assert_eq!(
            workflow.get_node("topup").unwrap().inputs["encoding_file"],
            encoding_file.to_string_lossy().as_ref()
        );
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[tokio::test]
    async fn test_flags_override_workflow_settings() {
        let mut workflow = Workflow::new("wf");
        workflow.settings.plugin = Some(Plugin::MultiProc);
        workflow.settings.n_procs = Some(4);
        let config = Config::default();

        let run = RunArgs {
            base_dir: Some(PathBuf::from("/tmp/intraop-test")),
            plugin: Some(Plugin::Linear),
            n_procs: None,
        };
        assert_eq!(build_executor(&config, &workflow, &run).concurrency(), 1);

        let run = RunArgs {
            base_dir: None,
            plugin: None,
            n_procs: None,
        };
        assert_eq!(build_executor(&config, &workflow, &run).concurrency(), 4);
    }
}
