// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Per-stage logging context
//!
//! A `LogContext` installs a subscriber with the requested sinks as the thread
//! default for as long as it lives, and enters a `stage` span so every record
//! carries the stage name. Dropping it restores whatever was installed before.

use crate::error::{PipelineError, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::span::EnteredSpan;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Where a stage's diagnostic records go
#[derive(Debug, Clone)]
pub struct LogSinks {
    /// Mirror records to stderr
    pub console: bool,
    /// Append records to this file
    pub file: Option<PathBuf>,
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
}

impl LogSinks {
    /// Console plus `<log_dir>/<stage>.log`
    pub fn for_stage(log_dir: &Path, stage: &str, console: bool, level: &str) -> Self {
        Self {
            console,
            file: Some(log_dir.join(format!("{}.log", stage))),
            level: level.to_string(),
        }
    }
}

/// Installed logging for one stage run
pub struct LogContext {
    // Field order matters: the span must close before the subscriber goes away.
    _span: EnteredSpan,
    _guard: DefaultGuard,
}

impl LogContext {
    pub fn install(stage: &str, sinks: &LogSinks) -> Result<Self> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&sinks.level));

        let console_layer = sinks
            .console
            .then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

        let file_layer = match &sinks.file {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| PipelineError::io("install_logging", parent, e))?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| PipelineError::io("install_logging", path, e))?;
                Some(
                    fmt::layer()
                        .with_ansi(false)
                        .with_target(false)
                        .with_writer(Mutex::new(file)),
                )
            }
            None => None,
        };

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer);
        let guard = tracing::subscriber::set_default(subscriber);
        let span = tracing::info_span!("stage", name = stage).entered();

        Ok(Self {
            _span: span,
            _guard: guard,
        })
    }
}
