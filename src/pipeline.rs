// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Stage orchestration
//!
//! `run_stage` is the single recovery boundary for a stage: it loads the
//! configuration, installs the stage's logging context, runs the stage and logs
//! any failure with its operation and offending path, key or column before
//! handing the typed error back to the caller.

use crate::config::{Configuration, DataLayout, DEFAULT_PARAMS_FILE};
use crate::error::Result;
use crate::telemetry::{LogContext, LogSinks};
use crate::{evaluation, features, ingestion, preprocessing};
use std::fmt;
use std::path::PathBuf;

/// One batch job of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Ingest,
    Preprocess,
    Featurize,
    Evaluate,
}

impl Stage {
    /// Every stage, in execution order
    pub const ALL: [Stage; 4] = [Stage::Ingest, Stage::Preprocess, Stage::Featurize, Stage::Evaluate];

    /// Name used for the log span and the per-stage log file
    pub fn name(self) -> &'static str {
        match self {
            Stage::Ingest => "data_ingestion",
            Stage::Preprocess => "data_preprocessing",
            Stage::Featurize => "feature_engineering",
            Stage::Evaluate => "model_evaluation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Invocation settings shared by every stage
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub params: PathBuf,
    /// Overrides `pipeline.data_root`
    pub data_root: Option<PathBuf>,
    /// Overrides `pipeline.log_dir`; `None` in both places means `logs`
    pub log_dir: Option<PathBuf>,
    pub console: bool,
    pub log_level: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            params: PathBuf::from(DEFAULT_PARAMS_FILE),
            data_root: None,
            log_dir: None,
            console: true,
            log_level: "debug".to_string(),
        }
    }
}

impl PipelineOptions {
    fn log_dir(&self, config: Option<&Configuration>) -> PathBuf {
        if let Some(dir) = &self.log_dir {
            return dir.clone();
        }
        config
            .and_then(|c| c.str_or("pipeline.log_dir", "logs").ok())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("logs"))
    }

    fn layout(&self, config: &Configuration) -> Result<DataLayout> {
        match &self.data_root {
            Some(root) => Ok(DataLayout::new(root)),
            None => DataLayout::from_config(config),
        }
    }
}

fn execute(stage: Stage, config: &Configuration, options: &PipelineOptions) -> Result<()> {
    let layout = options.layout(config)?;
    tracing::debug!("Data root: {}", layout.root().display());
    match stage {
        Stage::Ingest => ingestion::run(config, &layout).map(drop),
        Stage::Preprocess => preprocessing::run(config, &layout).map(drop),
        Stage::Featurize => features::run(config, &layout).map(drop),
        Stage::Evaluate => evaluation::run(config, &layout).map(drop),
    }
}

/// Run one stage inside its own logging context
pub fn run_stage(stage: Stage, options: &PipelineOptions) -> Result<()> {
    let config = Configuration::load(&options.params);
    let sinks = LogSinks::for_stage(
        &options.log_dir(config.as_ref().ok()),
        stage.name(),
        options.console,
        &options.log_level,
    );
    let _log = LogContext::install(stage.name(), &sinks)?;

    let result = config.and_then(|config| execute(stage, &config, options));
    match &result {
        Ok(()) => tracing::info!("Stage {} finished", stage),
        Err(err) => tracing::error!(kind = ?err.kind(), "Stage {} failed: {}", stage, err),
    }
    result
}

/// Run every stage in order, stopping at the first failure
pub fn run_all(options: &PipelineOptions) -> Result<()> {
    for stage in Stage::ALL {
        run_stage(stage, options)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_stage_names() {
        let names: Vec<&str> = Stage::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["data_ingestion", "data_preprocessing", "feature_engineering", "model_evaluation"]
        );
        assert_eq!(Stage::Evaluate.to_string(), "model_evaluation");
    }

    #[test]
    fn test_missing_params_file_is_logged_and_returned() {
        let dir = tempfile::tempdir().unwrap();
        let options = PipelineOptions {
            params: dir.path().join("params.yaml"),
            data_root: Some(dir.path().join("data")),
            log_dir: Some(dir.path().join("logs")),
            console: false,
            log_level: "debug".to_string(),
        };

        let err = run_stage(Stage::Ingest, &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let log = std::fs::read_to_string(dir.path().join("logs/data_ingestion.log")).unwrap();
        assert!(log.contains("ERROR"));
        assert!(log.contains("params.yaml"));
    }

    #[test]
    fn test_run_all_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let params = dir.path().join("params.yaml");
        std::fs::write(&params, "data_ingestion:\n  test_size: 0.2\n  source: /nonexistent/spam.csv\n").unwrap();
        let options = PipelineOptions {
            params,
            data_root: Some(dir.path().join("data")),
            log_dir: Some(dir.path().join("logs")),
            console: false,
            log_level: "info".to_string(),
        };

        let err = run_all(&options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataSource);
        assert!(dir.path().join("logs/data_ingestion.log").exists());
        assert!(!dir.path().join("logs/data_preprocessing.log").exists());
    }

    #[test]
    fn test_out_of_order_stage_reports_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let params = dir.path().join("params.yaml");
        std::fs::write(&params, "pipeline:\n  data_root: unused\n").unwrap();
        let options = PipelineOptions {
            params,
            data_root: Some(dir.path().join("data")),
            log_dir: Some(dir.path().join("logs")),
            console: false,
            log_level: "off".to_string(),
        };
        let err = run_stage(Stage::Preprocess, &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
