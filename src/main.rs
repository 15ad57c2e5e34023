// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Pipeline CLI
//!
//! Usage:
//!   textprep ingest
//!   textprep --params params.yaml --data-root ./data run-all

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use textprep::pipeline::{self, PipelineOptions, Stage};
use textprep::PipelineError;

#[derive(Parser, Debug)]
#[command(name = "textprep")]
#[command(about = "Ingest, preprocess, featurize and evaluate labelled text data")]
#[command(version)]
struct Args {
    /// Parameter file
    #[arg(short, long, default_value = textprep::config::DEFAULT_PARAMS_FILE)]
    params: PathBuf,

    /// Data root, overriding pipeline.data_root
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Log directory, overriding pipeline.log_dir
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log filter directive (RUST_LOG takes precedence)
    #[arg(long, default_value = "debug")]
    log_level: String,

    /// Only log to the per-stage file
    #[arg(long)]
    no_console: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Fetch the source table, split it and write raw partitions
    Ingest,
    /// Encode labels, drop duplicates and normalize text
    Preprocess,
    /// Build TF-IDF features from the processed partitions
    Featurize,
    /// Score the test features with the model and write the metrics report
    Evaluate,
    /// Run every stage in order, stopping at the first failure
    RunAll,
}

fn run(args: Args) -> Result<()> {
    let options = PipelineOptions {
        params: args.params,
        data_root: args.data_root,
        log_dir: args.log_dir,
        console: !args.no_console,
        log_level: args.log_level,
    };

    let stage = match args.command {
        Command::Ingest => Stage::Ingest,
        Command::Preprocess => Stage::Preprocess,
        Command::Featurize => Stage::Featurize,
        Command::Evaluate => Stage::Evaluate,
        Command::RunAll => return pipeline::run_all(&options).context("pipeline run failed"),
    };
    pipeline::run_stage(stage, &options).with_context(|| format!("stage {} failed", stage))
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let code = err
                .downcast_ref::<PipelineError>()
                .map(|e| e.kind().exit_code())
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}
