//! WES orchestrator CLI
//!
//! Entry point for the `wes-orch` command-line tool.

use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wes_orchestrator::config::ConfigError;
use wes_orchestrator::dispatch::DispatchOutcome;
use wes_orchestrator::signal::{SignalHandler, EXIT_CODE_CANCELLED};
use wes_orchestrator::state::format_elapsed_secs;
use wes_orchestrator::{
    EndpointConfig, MonitorExit, Orchestrator, OrchestratorConfig, OrchestratorError, ParamDoc,
    Proto, StatusReport, WorkflowConfig,
};

#[derive(Parser)]
#[command(name = "wes-orch")]
#[command(about = "Queue, dispatch and monitor workflow runs on WES endpoints", version)]
struct Cli {
    /// Path to config file (default: ~/.config/wes-orchestrator/config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Queue document path (overrides the config)
    #[arg(long, global = true)]
    queue: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a workflow on an endpoint
    Queue {
        /// Endpoint id
        endpoint: String,

        /// Registered workflow name
        workflow: String,

        /// Parameter document: a URL/path, or an inline JSON object
        params: String,

        /// Sample label
        #[arg(long, short = 's')]
        sample: Option<String>,

        /// Attachments (comma-separated); defaults to the workflow's
        #[arg(long, short = 'a', value_delimiter = ',')]
        attach: Option<Vec<String>>,

        /// Dispatch immediately after queueing
        #[arg(long)]
        run: bool,
    },

    /// Queue every entry of a batch JSON file (endpoint → sample → workflow)
    QueueFile {
        path: PathBuf,
    },

    /// Dispatch the oldest queued submission on an endpoint
    RunNext {
        endpoint: String,
    },

    /// Drain every endpoint's queue, one run in flight per endpoint
    RunAll,

    /// Poll once and print a status snapshot
    Status {
        /// Only this endpoint
        #[arg(long, short = 'e')]
        endpoint: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Poll until every submission is terminal (Ctrl-C to stop)
    Monitor {
        /// Seconds between passes (default: timeouts.poll_interval_seconds)
        #[arg(long, short = 'i')]
        interval: Option<u64>,

        /// Output one JSON document per pass
        #[arg(long)]
        json: bool,
    },

    /// Endpoint configuration
    Endpoints {
        #[command(subcommand)]
        action: EndpointsCommands,
    },

    /// Workflow registry
    Workflows {
        #[command(subcommand)]
        action: WorkflowsCommands,
    },
}

#[derive(Subcommand)]
enum EndpointsCommands {
    /// List configured endpoints
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WorkflowsCommands {
    /// List registered workflows
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Register a workflow in the config file
    Add {
        name: String,

        /// Descriptor URL
        url: String,

        /// Workflow language
        #[arg(long = "type", short = 't', default_value = "CWL")]
        workflow_type: String,

        /// Workflow language version
        #[arg(long, default_value = "v1.0")]
        version: String,

        /// Default attachments (comma-separated)
        #[arg(long, short = 'a', value_delimiter = ',')]
        attach: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wes_orchestrator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let located = match cli.config.clone() {
        Some(path) => Ok(path),
        None => OrchestratorConfig::default_path(),
    };
    let config_path = match located {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error locating config: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Workflows {
            action:
                WorkflowsCommands::Add {
                    name,
                    url,
                    workflow_type,
                    version,
                    attach,
                },
        } => {
            let mut workflow = WorkflowConfig::new(name, url, workflow_type).with_attachments(attach);
            workflow.version = version;
            run_workflows_add(&config_path, workflow)
        }
        Commands::Workflows {
            action: WorkflowsCommands::List { json },
        } => load_config(&config_path).and_then(|config| run_workflows_list(&config, json)),
        Commands::Endpoints {
            action: EndpointsCommands::List { json },
        } => load_config(&config_path).and_then(|config| run_endpoints_list(&config, json)),
        command => match open(&config_path, cli.queue) {
            Ok(orchestrator) => run_command(&orchestrator, command).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_config(path: &Path) -> Result<OrchestratorConfig, OrchestratorError> {
    Ok(OrchestratorConfig::load(path)?)
}

fn open(config_path: &Path, queue: Option<PathBuf>) -> Result<Orchestrator, OrchestratorError> {
    let mut config = load_config(config_path)?;
    if queue.is_some() {
        config.queue_path = queue;
    }
    Orchestrator::from_config(config)
}

async fn run_command(orchestrator: &Orchestrator, command: Commands) -> Result<(), OrchestratorError> {
    match command {
        Commands::Queue {
            endpoint,
            workflow,
            params,
            sample,
            attach,
            run,
        } => {
            let params = ParamDoc::from_arg(&params);
            if run {
                let (id, record) = orchestrator
                    .manager
                    .queue_and_run(&endpoint, &workflow, params, sample, attach)
                    .await?;
                println!("{} {} {}", endpoint, id, record.run_id);
            } else {
                let id = orchestrator
                    .manager
                    .queue(&endpoint, &workflow, params, sample, attach)?;
                println!("{} {}", endpoint, id);
            }
            Ok(())
        }
        Commands::QueueFile { path } => {
            let queued = orchestrator.manager.queue_file(&path)?;
            for entry in &queued {
                println!("{} {} {}", entry.endpoint, entry.sample, entry.id);
            }
            Ok(())
        }
        Commands::RunNext { endpoint } => {
            match orchestrator.dispatcher.run_next_queued(&endpoint).await? {
                DispatchOutcome::Dispatched { id, run } => println!("{} {} {}", endpoint, id, run.run_id),
                DispatchOutcome::NothingQueued => println!("Nothing queued on '{}'", endpoint),
            }
            Ok(())
        }
        Commands::RunAll => run_all(orchestrator).await,
        Commands::Status { endpoint, json } => {
            orchestrator
                .config
                .require_persistent_endpoints(endpoint.as_deref())?;
            let report = match endpoint {
                Some(endpoint) => StatusReport::new(orchestrator.monitor.poll_endpoint(&endpoint).await?),
                None => orchestrator.monitor.poll_all().await?,
            };
            print_report(&report, json);
            Ok(())
        }
        Commands::Monitor { interval, json } => {
            orchestrator.config.require_persistent_endpoints(None)?;
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| orchestrator.config.timeouts.poll_interval());
            run_monitor(orchestrator, interval, json).await
        }
        Commands::Endpoints { .. } | Commands::Workflows { .. } => Ok(()),
    }
}

async fn run_all(orchestrator: &Orchestrator) -> Result<(), OrchestratorError> {
    let signals = SignalHandler::new();
    if let Err(e) = signals.install() {
        tracing::warn!(error = %e, "Could not install signal handler");
    }

    let report = orchestrator.dispatcher.run_all(&signals.token()).await?;
    for entry in &report.endpoints {
        println!("{}: {} dispatched", entry.endpoint, entry.dispatched.len());
        for run in &entry.dispatched {
            println!("  {} {} {}", run.id, run.run_id, run.status);
        }
        if let Some(error) = &entry.error {
            println!("  stopped: {}", error);
        }
        if entry.cancelled {
            println!("  cancelled");
        }
    }

    if signals.state().is_cancel_requested() {
        process::exit(EXIT_CODE_CANCELLED);
    }
    Ok(())
}

async fn run_monitor(orchestrator: &Orchestrator, interval: Duration, json: bool) -> Result<(), OrchestratorError> {
    let signals = SignalHandler::new();
    if let Err(e) = signals.install() {
        tracing::warn!(error = %e, "Could not install signal handler");
    }

    let mut sink = |report: &StatusReport| print_report(report, json);
    let exit = orchestrator
        .monitor
        .monitor_loop(interval, &mut sink, &signals.token())
        .await?;

    if exit == MonitorExit::Cancelled {
        process::exit(EXIT_CODE_CANCELLED);
    }
    Ok(())
}

fn print_report(report: &StatusReport, json: bool) {
    if json {
        match serde_json::to_string(report) {
            Ok(line) => println!("{}", line),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    if report.is_empty() {
        println!("No submissions.");
        return;
    }

    println!(
        "{:<12} {:<22} {:<14} {:<28} {:<12} {:<16} {:<20} {}",
        "ENDPOINT", "ID", "WORKFLOW", "RUN_ID", "SAMPLE", "STATE", "START", "ELAPSED"
    );
    for s in &report.snapshots {
        println!(
            "{:<12} {:<22} {:<14} {:<28} {:<12} {:<16} {:<20} {}",
            s.endpoint,
            s.id,
            s.workflow_name.as_deref().unwrap_or("-"),
            s.run_id.as_deref().unwrap_or("-"),
            s.sample,
            s.state,
            s.start_time
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
            s.elapsed_time.map(format_elapsed_secs).unwrap_or_else(|| "-".to_string()),
        );
    }
    println!();
}

fn run_endpoints_list(config: &OrchestratorConfig, json: bool) -> Result<(), OrchestratorError> {
    if json {
        let output: Vec<serde_json::Value> = config
            .endpoints
            .iter()
            .map(|e| {
                serde_json::json!({
                    "id": e.id,
                    "host": e.host,
                    "proto": e.proto.as_str(),
                    "url": endpoint_url(e),
                    "auth": e.auth.is_some(),
                })
            })
            .collect();
        print_json(&output);
        return Ok(());
    }

    if config.endpoints.is_empty() {
        println!("No endpoints configured.");
        return Ok(());
    }

    println!("Configured endpoints ({} total):\n", config.endpoints.len());
    for endpoint in &config.endpoints {
        println!("  {}", endpoint.id);
        println!("    URL: {}", endpoint_url(endpoint));
        if endpoint.auth.is_some() {
            println!("    Auth: yes");
        }
    }
    Ok(())
}

fn endpoint_url(endpoint: &EndpointConfig) -> String {
    match endpoint.proto {
        Proto::Mock => "mock".to_string(),
        Proto::Http | Proto::Https => endpoint.base_url(),
    }
}

fn run_workflows_list(config: &OrchestratorConfig, json: bool) -> Result<(), OrchestratorError> {
    if json {
        print_json(&config.workflows);
        return Ok(());
    }

    if config.workflows.is_empty() {
        println!("No workflows registered.");
        return Ok(());
    }

    println!("Registered workflows ({} total):\n", config.workflows.len());
    for workflow in &config.workflows {
        println!("  {} ({} {})", workflow.name, workflow.workflow_type, workflow.version);
        println!("    URL: {}", workflow.url);
        if !workflow.attachments.is_empty() {
            println!("    Attachments: {}", workflow.attachments.join(", "));
        }
    }
    Ok(())
}

fn run_workflows_add(config_path: &Path, workflow: WorkflowConfig) -> Result<(), OrchestratorError> {
    let mut config = match OrchestratorConfig::load(config_path) {
        Ok(config) => config,
        Err(ConfigError::NotFound(_)) => OrchestratorConfig::default(),
        Err(e) => return Err(e.into()),
    };

    let name = workflow.name.clone();
    config.add_workflow(workflow)?;
    config.save(config_path)?;
    println!("Registered workflow '{}' in {}", name, config_path.display());
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}
