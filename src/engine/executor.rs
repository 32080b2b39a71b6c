//! Workflow executor.

use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn, Span};

use super::execution::{Execution, ExecutionStatus, NodeExecution};
use super::Plugin;
use crate::config::ToolsConfig;
use crate::error::{Error, Result};
use crate::metrics;
use crate::nodes::{Node, NodeContext, NodeRegistry, NodeResult};
use crate::shutdown::ShutdownCoordinator;
use crate::workflow::{validate_ports, Workflow};

type NodeOutcome = (String, Result<NodeResult>);

/// Workflow executor.
///
/// Nodes become ready once every upstream node has completed; ready nodes are
/// spawned onto a `JoinSet` up to the plugin's concurrency limit. Each node
/// runs in `<base_dir>/<workflow>/<node>/`.
pub struct Executor {
    registry: NodeRegistry,
    base_dir: PathBuf,
    plugin: Plugin,
    n_procs: Option<usize>,
    tools: Arc<ToolsConfig>,
    shutdown: Option<Arc<ShutdownCoordinator>>,
}

impl Executor {
    /// Create a new executor writing working directories under `base_dir`.
    pub fn new(registry: NodeRegistry, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            base_dir: base_dir.into(),
            plugin: Plugin::default(),
            n_procs: None,
            tools: Arc::new(ToolsConfig::default()),
            shutdown: None,
        }
    }

    /// Select the scheduling plugin.
    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.plugin = plugin;
        self
    }

    /// Limit MultiProc concurrency (defaults to available CPUs).
    pub fn with_n_procs(mut self, n_procs: Option<usize>) -> Self {
        self.n_procs = n_procs;
        self
    }

    /// External tool settings passed to every node.
    pub fn with_tools(mut self, tools: ToolsConfig) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    /// Attach a shutdown coordinator; a shutdown request cancels the run.
    pub fn with_shutdown(mut self, shutdown: Arc<ShutdownCoordinator>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }

    /// How many nodes may run at once.
    pub fn concurrency(&self) -> usize {
        match self.plugin {
            Plugin::Linear => 1,
            Plugin::MultiProc => self
                .n_procs
                .unwrap_or_else(|| {
                    std::thread::available_parallelism()
                        .map(|n| n.get())
                        .unwrap_or(1)
                })
                .max(1),
        }
    }

    /// Execute a workflow and fail unless every node completed.
    pub async fn run(&self, workflow: &Workflow) -> Result<Execution> {
        let execution = self.execute(workflow).await?;
        match execution.status {
            ExecutionStatus::Completed => Ok(execution),
            status => Err(Error::Execution(format!(
                "Workflow '{}' {}: {}",
                workflow.name,
                status,
                execution.error.as_deref().unwrap_or("no error recorded")
            ))),
        }
    }

    /// Execute a workflow.
    ///
    /// Invalid workflows are rejected with an error before anything runs.
    /// Otherwise the returned record carries the final status, including
    /// failed and cancelled runs, and is also written to
    /// `<base_dir>/<workflow>/execution.json`.
    #[instrument(
        name = "workflow.execute",
        skip(self, workflow),
        fields(
            workflow_name = %workflow.name,
            plugin = %self.plugin,
            run_id = tracing::field::Empty,
        )
    )]
    pub async fn execute(&self, workflow: &Workflow) -> Result<Execution> {
        validate_ports(workflow, &self.registry)?;

        let run_id = uuid::Uuid::new_v4().to_string();
        Span::current().record("run_id", run_id.as_str());

        // Tools run inside their node directory, so every path handed to
        // them must be absolute
        let working_dir = std::path::absolute(self.base_dir.join(&workflow.name))?;
        tokio::fs::create_dir_all(&working_dir).await?;

        let limit = self.concurrency();
        info!(
            "Starting run {} of workflow '{}' ({} plugin, up to {} node(s) at once)",
            run_id, workflow.name, self.plugin, limit
        );

        metrics::inc_active_runs();
        let start_time = Instant::now();

        let order = workflow.topological_sort();
        debug!("Execution order: {:?}", order);

        let mut execution = Execution {
            id: run_id.clone(),
            workflow_name: workflow.name.clone(),
            plugin: self.plugin,
            status: ExecutionStatus::Running,
            working_dir: working_dir.clone(),
            started_at: Utc::now(),
            finished_at: None,
            nodes: order
                .iter()
                .map(|name| {
                    let node_type = workflow
                        .get_node(name)
                        .map(|n| n.node_type.as_str())
                        .unwrap_or_default();
                    NodeExecution::pending(name, node_type, working_dir.join(name))
                })
                .collect(),
            outputs: BTreeMap::new(),
            error: None,
        };

        let index: HashMap<&str, usize> = order.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let downstream = workflow.downstream_map();
        let mut waiting: HashMap<&str, usize> = order
            .iter()
            .map(|n| (*n, workflow.upstream(n).len()))
            .collect();
        let mut ready: VecDeque<&str> = order
            .iter()
            .copied()
            .filter(|n| waiting.get(n).copied() == Some(0))
            .collect();

        let mut join_set: JoinSet<NodeOutcome> = JoinSet::new();
        let mut failure: Option<String> = None;
        let mut cancelled = false;

        loop {
            if self.is_shutdown_requested() {
                cancelled = true;
            }

            // Spawn ready nodes up to the concurrency limit
            while failure.is_none() && !cancelled && join_set.len() < limit {
                let Some(name) = ready.pop_front() else {
                    break;
                };
                let (Some(spec), Some(&i)) = (workflow.get_node(name), index.get(name)) else {
                    continue;
                };
                let record = &mut execution.nodes[i];

                let prepared = self
                    .registry
                    .get(&spec.node_type)
                    .ok_or_else(|| Error::Node(format!("Unknown node type: {}", spec.node_type)))
                    .and_then(|node| {
                        resolve_inputs(workflow, name, &execution.outputs).map(|i| (node, i))
                    });
                let (node_impl, inputs) = match prepared {
                    Ok(p) => p,
                    Err(e) => {
                        error!("Node '{}' could not start: {}", name, e);
                        record.status = ExecutionStatus::Failed;
                        record.error = Some(e.to_string());
                        record.finished_at = Some(Utc::now());
                        failure = Some(format!("Node '{}' failed: {}", name, e));
                        break;
                    }
                };

                info!("Executing node '{}' [{}]", name, spec.node_type);
                record.status = ExecutionStatus::Running;
                record.inputs = inputs.clone();
                record.started_at = Some(Utc::now());

                let ctx = NodeContext::new(&run_id, &workflow.name, name, &record.working_dir)
                    .with_inputs(inputs)
                    .with_tools(self.tools.clone());
                let config = spec.config.clone();
                let node_type = spec.node_type.clone();
                let node_name = name.to_string();

                join_set.spawn(async move {
                    let result = execute_node(node_impl, &node_type, &config, &ctx).await;
                    (node_name, result)
                });
            }

            if failure.is_some() || cancelled || join_set.is_empty() {
                break;
            }

            let joined = tokio::select! {
                joined = join_set.join_next() => Some(joined),
                _ = wait_for_shutdown(self.shutdown.as_deref()) => None,
            };
            let Some(joined) = joined else {
                warn!(
                    "Shutdown requested, cancelling {} running node(s)",
                    join_set.len()
                );
                cancelled = true;
                break;
            };
            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok((name, Ok(result))) => {
                    if let Some(&i) = index.get(name.as_str()) {
                        let record = &mut execution.nodes[i];
                        record.status = ExecutionStatus::Completed;
                        record.outputs = Some(result.outputs.clone());
                        record.finished_at = Some(Utc::now());
                    }
                    debug!("Node '{}' completed", name);

                    if let Some(targets) = downstream.get(name.as_str()) {
                        for &target in targets {
                            if let Some(count) = waiting.get_mut(target) {
                                *count = count.saturating_sub(1);
                                if *count == 0 {
                                    ready.push_back(target);
                                }
                            }
                        }
                    }
                    execution.outputs.insert(name, result.outputs);
                }
                Ok((name, Err(e))) => {
                    error!(code = e.code(), "Node '{}' failed: {}", name, e);
                    if let Some(&i) = index.get(name.as_str()) {
                        let record = &mut execution.nodes[i];
                        record.status = ExecutionStatus::Failed;
                        record.error = Some(e.to_string());
                        record.finished_at = Some(Utc::now());
                    }
                    failure = Some(format!("Node '{}' failed: {}", name, e));
                    break;
                }
                Err(e) => {
                    error!("Node task join failed: {}", e);
                    failure = Some(format!("Node task join failed: {}", e));
                    break;
                }
            }
        }

        // Abort whatever is still running; kill_on_drop reaps the tools
        join_set.abort_all();
        while join_set.join_next().await.is_some() {}

        let finished_at = Utc::now();
        for record in execution
            .nodes
            .iter_mut()
            .filter(|r| r.status == ExecutionStatus::Running)
        {
            record.status = ExecutionStatus::Cancelled;
            record.finished_at = Some(finished_at);
        }

        execution.status = if failure.is_some() {
            ExecutionStatus::Failed
        } else if cancelled {
            ExecutionStatus::Cancelled
        } else {
            ExecutionStatus::Completed
        };
        execution.error =
            failure.or_else(|| cancelled.then(|| "Run cancelled by shutdown request".to_string()));
        execution.finished_at = Some(finished_at);

        metrics::dec_active_runs();
        metrics::record_workflow_execution(&execution.status.to_string(), &self.plugin.to_string());
        metrics::record_workflow_duration(start_time.elapsed(), &workflow.name);

        tokio::fs::write(
            execution.record_path(),
            serde_json::to_vec_pretty(&execution)?,
        )
        .await?;

        info!(
            status = %execution.status,
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Run {} of workflow '{}' finished",
            run_id,
            workflow.name
        );

        Ok(execution)
    }
}

/// Static inputs of `name` overlaid with the upstream outputs wired to it.
fn resolve_inputs(
    workflow: &Workflow,
    name: &str,
    outputs: &BTreeMap<String, Map<String, Value>>,
) -> Result<Map<String, Value>> {
    let mut inputs = workflow
        .get_node(name)
        .map(|n| n.inputs.clone())
        .unwrap_or_default();

    for conn in workflow.incoming(name) {
        let value = outputs
            .get(&conn.source)
            .and_then(|o| o.get(&conn.source_field))
            .ok_or_else(|| {
                Error::Execution(format!(
                    "Node '{}' did not produce output '{}' needed by '{}.{}'",
                    conn.source, conn.source_field, conn.dest, conn.dest_field
                ))
            })?;
        inputs.insert(conn.dest_field.clone(), value.clone());
    }

    Ok(inputs)
}

async fn wait_for_shutdown(shutdown: Option<&ShutdownCoordinator>) {
    match shutdown {
        Some(s) => s.wait_for_shutdown().await,
        None => std::future::pending().await,
    }
}

#[instrument(
    name = "node.execute",
    skip(node, config, ctx),
    fields(
        node = %ctx.node_name,
        node_type = %node_type,
        run_id = %ctx.run_id,
    )
)]
async fn execute_node(
    node: Arc<dyn Node>,
    node_type: &str,
    config: &Value,
    ctx: &NodeContext,
) -> Result<NodeResult> {
    let node_start = Instant::now();
    tokio::fs::create_dir_all(&ctx.working_dir).await?;

    let result = node.execute(config, ctx).await;

    let status = if result.is_ok() { "completed" } else { "failed" };
    metrics::record_node_execution(node_type, status);
    metrics::record_node_duration(node_start.elapsed(), node_type);
    result
}
