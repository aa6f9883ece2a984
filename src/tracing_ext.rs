//! Tracing subscriber setup
//!
//! The library only emits `tracing` events and spans; binaries and tests call
//! [`init_tracing`] once to see them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info";

/// Output format of the subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(Error::config(format!("unknown log format '{other}'"))),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a global subscriber filtered by `RUST_LOG` (default `info`).
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter());
    let installed = match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    };
    installed.map_err(|e| Error::config(format!("failed to install tracing subscriber: {e}")))
}
