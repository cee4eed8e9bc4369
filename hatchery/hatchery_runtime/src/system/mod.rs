//! System-level concerns: runtime configuration.

pub mod config;

pub use config::RuntimeConfig;
