//! itemtrack library
//!
//! A small item-tracking service: create, list/search, toggle and delete
//! short-lived items over HTTP, optionally behind a shared-secret gate.
//!
//! # Layout
//!
//! - [`store`]: the authoritative in-memory [`store::ItemStore`]
//! - [`gateway::auth`]: the [`gateway::AccessGate`] admission check
//! - [`gateway`]: axum router and server wiring the two together
//! - [`config`], [`cli`]: startup configuration

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod store;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let initialized = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };

    initialized.map_err(|e| Error::Internal(format!("tracing already initialized: {e}")))
}
