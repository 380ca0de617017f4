//! Command-line surface: `hcc-pipeline batch` and `hcc-pipeline serve`.
//!
//! Every option falls back to an environment variable, then to the
//! defaults in `config`.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::api::server::ServerError;
use crate::batch::BatchError;
use crate::config::{self, PipelineSettings};

#[derive(Parser, Debug)]
#[command(name = "hcc-pipeline", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct PipelineArgs {
    /// CSV of HCC-relevant codes
    #[arg(long, env = "HCC_CSV_PATH", default_value = config::DEFAULT_CODES_PATH, global = true)]
    pub codes_path: PathBuf,

    /// Header of the code column in the CSV
    #[arg(long, env = "HCC_CODE_COLUMN", default_value = config::DEFAULT_CODE_COLUMN, global = true)]
    pub code_column: String,

    #[arg(long, env = "OLLAMA_URL", default_value = config::DEFAULT_OLLAMA_URL, global = true)]
    pub ollama_url: String,

    #[arg(long = "model", env = "HCC_MODEL", default_value = config::DEFAULT_MODEL, global = true)]
    pub model_name: String,

    #[arg(long, env = "HCC_LLM_TIMEOUT_SECS", default_value_t = config::DEFAULT_LLM_TIMEOUT_SECS, global = true)]
    pub llm_timeout_secs: u64,

    /// Model calls per note when rate limited, including the first
    #[arg(
        long,
        env = "HCC_MAX_ATTEMPTS",
        default_value_t = config::DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..),
        global = true
    )]
    pub max_attempts: u32,

    #[arg(long, env = "HCC_BACKOFF_BASE_SECS", default_value_t = config::DEFAULT_BACKOFF_BASE_SECS, global = true)]
    pub backoff_base_secs: u64,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process every note in a directory and write hcc_results.json
    Batch {
        #[arg(long, env = "INPUT_DIR", default_value = config::DEFAULT_INPUT_DIR)]
        input_dir: PathBuf,

        #[arg(long, env = "OUTPUT_DIR", default_value = config::DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long, env = "HCC_BIND", default_value = config::DEFAULT_BIND_ADDR)]
        bind: SocketAddr,
    },
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl Cli {
    /// Resolved pipeline settings; directories default when not batching.
    pub fn settings(&self) -> PipelineSettings {
        let args = &self.pipeline;
        let mut settings = PipelineSettings {
            codes_path: args.codes_path.clone(),
            code_column: args.code_column.clone(),
            ollama_url: args.ollama_url.clone(),
            model_name: args.model_name.clone(),
            llm_timeout_secs: args.llm_timeout_secs,
            max_attempts: args.max_attempts,
            backoff_base_secs: args.backoff_base_secs,
            ..PipelineSettings::default()
        };
        if let Command::Batch {
            input_dir,
            output_dir,
        } = &self.command
        {
            settings.input_dir = input_dir.clone();
            settings.output_dir = output_dir.clone();
        }
        settings
    }
}
