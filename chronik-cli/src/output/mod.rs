//! Output formatting for the chronik CLI.
//!
//! Two formats: table (human-readable, the default) and json
//! (machine-readable).

use clap::ValueEnum;

mod json;
mod table;

pub use json::print_json;
pub use table::{
    event_table, gap_summary, job_summary, overlap_table, path_summary, timeline_tree,
};

/// Output format for CLI results
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format (default)
    #[default]
    Table,
    /// JSON format for machine consumption
    Json,
}
