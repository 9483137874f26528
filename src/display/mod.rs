//! Terminal display utilities for CLI output.

pub mod tables;

pub use tables::{TableBuilder, create_results_table, create_stats_table};
