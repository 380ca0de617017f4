pub mod api; // HTTP API: /api/process, /api/health
pub mod batch; // Directory batch → hcc_results.json
pub mod cli;
pub mod config;
pub mod pipeline;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, CliError, Command};

pub fn run() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

/// Run one parsed command to completion.
pub fn execute(cli: Cli) -> Result<(), CliError> {
    let settings = cli.settings();

    match cli.command {
        Command::Batch { .. } => {
            let report = batch::process_directory(&settings)?;
            tracing::info!(
                run_id = %report.run_id,
                notes = report.results.len(),
                notes_with_errors = report.notes_with_errors(),
                batch_errors = report.errors.len(),
                output = %settings.results_path().display(),
                "Batch complete"
            );
        }
        Command::Serve { bind } => {
            let llm = batch::ollama_client(&settings)?;
            let ctx = api::build_context(&settings, Box::new(llm))?;

            // The blocking HTTP client must be dropped outside the runtime.
            let held = ctx.clone();
            let runtime = tokio::runtime::Runtime::new()?;
            let served = runtime.block_on(api::serve(ctx, bind));
            drop(runtime);
            drop(held);
            served?;
        }
    }
    Ok(())
}
