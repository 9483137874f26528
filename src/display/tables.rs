//! Table formatting utilities for structured output.

use comfy_table::{
    Attribute, Cell, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_FULL,
};

use crate::retrieval::RetrieverStats;
use crate::types::SearchResult;

/// Longest answer excerpt shown in the results table.
const ANSWER_PREVIEW_CHARS: usize = 60;

/// Builder for creating formatted tables.
pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    /// Create a new table builder.
    pub fn new() -> Self {
        Self { table: new_table() }
    }

    /// Set the table headers.
    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        let header_cells: Vec<Cell> = headers
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect();
        self.table.set_header(header_cells);
        self
    }

    /// Add a row to the table.
    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.table.add_row(row);
        self
    }

    /// Build and return the formatted table.
    pub fn build(self) -> String {
        self.table.to_string()
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    // Apply rounded corners
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

/// Create the ranked results table for `wenda search`.
pub fn create_results_table(results: &[SearchResult]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Score").add_attribute(Attribute::Bold),
        Cell::new("Id").add_attribute(Attribute::Bold),
        Cell::new("Question").add_attribute(Attribute::Bold),
        Cell::new("Answer").add_attribute(Attribute::Bold),
        Cell::new("Tags").add_attribute(Attribute::Bold),
    ]);

    for result in results {
        let color = if result.score >= 0.75 {
            Color::Green
        } else if result.score >= 0.4 {
            Color::Yellow
        } else {
            Color::Reset
        };
        table.add_row(vec![
            Cell::new(result.rank),
            Cell::new(format!("{:.4}", result.score)).fg(color),
            Cell::new(&result.id),
            Cell::new(&result.question),
            Cell::new(preview(&result.answer, ANSWER_PREVIEW_CHARS)),
            Cell::new(result.tags.join(", ")),
        ]);
    }

    table.to_string()
}

/// Create the summary table for `wenda stats`.
pub fn create_stats_table(stats: &RetrieverStats) -> String {
    let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());

    TableBuilder::new()
        .set_headers(vec!["Metric", "Value"])
        .add_row(vec!["State".into(), stats.state.to_string()])
        .add_row(vec!["Records".into(), stats.record_count.to_string()])
        .add_row(vec![
            "Strategy".into(),
            or_dash(stats.strategy.map(str::to_string)),
        ])
        .add_row(vec![
            "Dimension".into(),
            or_dash(stats.dimension.map(|d| d.to_string())),
        ])
        .add_row(vec![
            "Metric".into(),
            or_dash(stats.metric.map(|m| m.to_string())),
        ])
        .add_row(vec!["Cached queries".into(), stats.cache_entries.to_string()])
        .build()
}
