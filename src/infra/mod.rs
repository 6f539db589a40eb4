//! Infrastructure - configuration, errors, and metrics
//!
//! This module contains infrastructure concerns:
//! - `config` - Application configuration (TOML loading, env credentials)
//! - `error` - Request processing error taxonomy
//! - `metrics` - Lock-free request counters

pub mod config;
pub mod error;
pub mod metrics;

// Re-export commonly used types
pub use config::Config;
pub use error::{ConfigError, NotifyError, ParseError, ReplyError, StoreError};
pub use metrics::Metrics;
