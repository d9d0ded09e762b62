//! docbatch - batch-convert documents to PDF and merge PDFs per directory.

mod cli;

use anyhow::Context;
use clap::Parser;
use std::path::Path;
use std::process;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use docbatch::config::{Config, ConfigResolver, write_default_config};
use docbatch::context::{RunContext, RunEvent};
use docbatch::convert::{CommandRenderer, ConversionKind, ConvertService};
use docbatch::error::DocBatchError;
use docbatch::merge::MergeCoordinator;
use docbatch::output::{OutputFormatter, display_event, display_summary};
use docbatch::summary::Summary;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    let formatter = OutputFormatter::new(cli.quiet, cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            formatter.error(&format!("cannot start runtime: {err}"));
            process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run(cli, &formatter)) {
        formatter.error(&format!("{err:#}"));
        process::exit(exit_code(&err));
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "docbatch=debug"
    } else if quiet {
        "docbatch=warn"
    } else {
        "docbatch=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<DocBatchError>()
        .map_or(1, DocBatchError::exit_code)
}

async fn run(cli: Cli, formatter: &OutputFormatter) -> anyhow::Result<()> {
    if let Command::Init { force } = cli.command {
        let path = write_default_config(Path::new("."), force)
            .await
            .context("cannot write default configuration")?;
        formatter.success(&format!("Wrote {}", path.display()));
        return Ok(());
    }

    let config = ConfigResolver::new()
        .explicit_file(cli.config.clone())
        .load(cli.overrides())
        .await
        .context("cannot resolve configuration")?;

    formatter.section(&format!("{} v{}", docbatch::NAME, docbatch::VERSION));
    formatter.detail("Input", &config.input.path.display().to_string());
    formatter.detail("Output", &config.output.path.display().to_string());
    formatter.detail("Concurrency", &config.options.concurrent.to_string());

    let (context, events) = RunContext::with_events();
    tracing::info!(run_id = context.run_id(), command = ?cli.command, "starting run");
    let printer = tokio::spawn(print_events(events, formatter.clone()));

    let summary = tokio::select! {
        summary = execute(cli.command, config, context) => summary?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, shutting down");
            return Err(DocBatchError::Cancelled.into());
        }
    };

    // The sender side is gone once `execute` returns, so this drains and ends.
    if let Err(err) = printer.await {
        tracing::debug!(error = %err, "event printer ended abnormally");
    }

    display_summary(formatter, &summary);
    Ok(())
}

async fn execute(command: Command, config: Config, context: RunContext) -> docbatch::Result<Summary> {
    match command {
        Command::Convert => convert(config, context, ConversionKind::Markdown).await,
        Command::Html => convert(config, context, ConversionKind::Html).await,
        Command::Merge => {
            let config = Arc::new(config);
            let coordinator = MergeCoordinator::new(Arc::clone(&config), context)?;
            coordinator
                .merge_all(&config.input.path, &config.output.path)
                .await
        }
        Command::Init { .. } => Err(DocBatchError::other("init does not run a batch")),
    }
}

async fn convert(config: Config, context: RunContext, kind: ConversionKind) -> docbatch::Result<Summary> {
    let service = ConvertService::new(config, context, Arc::new(CommandRenderer::default()));
    service.convert_all(kind).await
}

async fn print_events(mut events: UnboundedReceiver<RunEvent>, formatter: OutputFormatter) {
    while let Some(event) = events.recv().await {
        display_event(&formatter, &event);
    }
}
