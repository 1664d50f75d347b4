//! Command-line interface for kataforge.
//!
//! Provides commands for running evaluation batches and inspecting
//! parsed test specs.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
