//! Subcommand implementations

pub mod alerts;
pub mod metrics;
pub mod settings;
