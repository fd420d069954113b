//! dagflow CLI - validate and run DAG documents

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use dagflow::error::{DagflowError, FixSuggestion};
use dagflow::event::{ChannelEmitter, Event, Level};
use dagflow::{validate_dag, DagLoader, RunConfig, Runner};

#[derive(Parser)]
#[command(name = "dagflow")]
#[command(about = "dagflow - run DAGs of typed nodes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a DAG document for structural errors
    Validate {
        /// Path to a .yaml/.yml/.json DAG document
        file: PathBuf,
    },

    /// Run a DAG document with the built-in behaviors
    Run {
        /// Path to a .yaml/.yml/.json DAG document
        file: PathBuf,

        /// Initial input as JSON
        #[arg(short, long, default_value = "null")]
        input: String,

        /// Deadline for the whole run (ms)
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Retries per failed node attempt
        #[arg(long)]
        max_retries: Option<u32>,

        /// Environment label reported with the run
        #[arg(long)]
        env: Option<String>,

        /// Config file (default: ~/.config/dagflow/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print every event as a JSON line instead of progress
        #[arg(long)]
        events: bool,

        /// Include debug-level progress (skips, branches, iterations)
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file } => validate_file(&file).await,
        Commands::Run {
            file,
            input,
            timeout_ms,
            max_retries,
            env,
            config,
            events,
            verbose,
        } => {
            let options = RunOptions {
                input,
                timeout_ms,
                max_retries,
                env,
                config,
                events,
                verbose,
            };
            run_file(&file, options).await
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn validate_file(file: &PathBuf) -> Result<(), DagflowError> {
    let dag = DagLoader::default().load_path(file).await?;
    let errors = validate_dag(&dag);

    if errors.is_empty() {
        println!(
            "{} DAG '{}' is valid ({} nodes, {} connections)",
            "✓".green(),
            dag.id(),
            dag.len(),
            dag.connections().len()
        );
        return Ok(());
    }

    for err in &errors {
        println!("  {} {}", "✗".red(), err);
    }
    Err(DagflowError::InvalidGraph {
        dag_id: dag.id().to_string(),
        errors,
    })
}

struct RunOptions {
    input: String,
    timeout_ms: Option<u64>,
    max_retries: Option<u32>,
    env: Option<String>,
    config: Option<PathBuf>,
    events: bool,
    verbose: bool,
}

async fn run_file(file: &PathBuf, options: RunOptions) -> Result<(), DagflowError> {
    let input: Value = serde_json::from_str(&options.input).map_err(|e| DagflowError::ParseError {
        details: format!("--input is not valid JSON: {e}"),
    })?;

    let mut config = match &options.config {
        Some(path) => RunConfig::load_from(path)?,
        None => RunConfig::load()?,
    }
    .with_env()?;
    if let Some(ms) = options.timeout_ms {
        config = config.with_timeout_ms(ms);
    }
    if let Some(n) = options.max_retries {
        config = config.with_max_retries(n);
    }
    if let Some(env) = options.env {
        config = config.with_environment(env);
    }

    let dag = DagLoader::default().load_path(file).await?;

    println!(
        "{} Running '{}' with {} nodes [{}]\n",
        "→".cyan(),
        dag.id().bold(),
        dag.len(),
        config.environment.cyan()
    );

    let (emitter, mut rx) = ChannelEmitter::new(1024);
    let (as_json, verbose) = (options.events, options.verbose);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event, as_json, verbose);
        }
    });

    let runner = Runner::new(dag).with_config(config).with_emitter(emitter);
    let cancel = runner.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let outcome = runner.run(input).await;
    interrupt.abort();
    // Dropping the runner closes the channel so the printer drains and stops
    drop(runner);
    let _ = printer.await;

    let output = outcome?;
    let rendered = serde_json::to_string_pretty(&output.into_value()).map_err(|e| {
        DagflowError::ParseError {
            details: format!("output is not serializable: {e}"),
        }
    })?;
    println!("\n{} Output:\n{}", "✓".green().bold(), rendered);
    Ok(())
}

fn print_event(event: &Event, as_json: bool, verbose: bool) {
    if as_json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
        return;
    }

    let progress = event.progress();
    let tag = match progress.level {
        Level::Info => "[⟳]".yellow(),
        Level::Success => "[✓]".green(),
        Level::Error => "[✗]".red(),
        Level::Warning => "[!]".yellow().bold(),
        Level::Debug if verbose => "[·]".dimmed(),
        Level::Debug => return,
    };
    println!(
        "  {} {} {}",
        tag,
        progress.message,
        format!("+{}ms", progress.timestamp_ms).dimmed()
    );
}
