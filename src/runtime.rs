//! Runtime glue that wires configuration, telemetry, and run orchestration.

pub mod config;
pub mod runner;
pub mod telemetry;
