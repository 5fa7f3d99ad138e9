use std::fmt::Write;

use serde::Serialize;

use crate::app::SearchKind;
use crate::domain::FileResult;
use crate::normalize::{StyleKey, display_category, display_name};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const NAME_WIDTH: usize = 48;

/// A results-table row with every optional field already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    pub id: i64,
    pub job_id: String,
    pub job_name: String,
    pub type_label: String,
    pub style: StyleKey,
    pub filename: String,
    pub abs_path: String,
}

impl From<&FileResult> for ResultRow {
    fn from(record: &FileResult) -> Self {
        let category = display_category(record);
        Self {
            id: record.id,
            job_id: record.job_id.clone(),
            job_name: record
                .job_name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "-".to_string()),
            type_label: category.label,
            style: category.style,
            filename: display_name(record),
            abs_path: record.abs_path.clone(),
        }
    }
}

pub fn rows(results: &[FileResult]) -> Vec<ResultRow> {
    results.iter().map(ResultRow::from).collect()
}

pub fn style_color(style: StyleKey) -> &'static str {
    match style {
        StyleKey::Red => "\x1b[31m",
        StyleKey::Green => "\x1b[32m",
        StyleKey::Blue => "\x1b[34m",
        StyleKey::Purple => "\x1b[35m",
        StyleKey::Orange => "\x1b[38;5;208m",
        StyleKey::Gray => "\x1b[90m",
        StyleKey::Yellow => "\x1b[33m",
        StyleKey::Teal => "\x1b[36m",
        StyleKey::Neutral => "",
    }
}

/// Renders the results panel as a text table.
pub fn render_table(rows: &[ResultRow], color: bool) -> String {
    if rows.is_empty() {
        return "No files found\nTry adjusting your search criteria to find files.\n".to_string();
    }

    let id_width = column_width(rows, "ID", |row| row.id.to_string().len());
    let job_width = column_width(rows, "Job ID", |row| row.job_id.chars().count());
    let name_width = column_width(rows, "Job Name", |row| row.job_name.chars().count());
    let type_width = column_width(rows, "Type", |row| row.type_label.chars().count());

    let mut out = String::new();
    let (bold, reset) = if color { (BOLD, RESET) } else { ("", "") };
    let _ = writeln!(out, "{bold}Search Results ({} files){reset}", rows.len());
    let _ = writeln!(
        out,
        "{:<id_width$}  {:<job_width$}  {:<name_width$}  {:<type_width$}  Filename",
        "ID", "Job ID", "Job Name", "Type"
    );
    for row in rows {
        let type_cell = format!("{:<type_width$}", row.type_label);
        let type_cell = match (color, style_color(row.style)) {
            (true, code) if !code.is_empty() => format!("{code}{type_cell}{RESET}"),
            _ => type_cell,
        };
        let _ = writeln!(
            out,
            "{:<id_width$}  {:<job_width$}  {:<name_width$}  {type_cell}  {}",
            row.id,
            row.job_id,
            row.job_name,
            truncate(&row.filename, NAME_WIDTH)
        );
    }
    out
}

/// Status line shown while a panel's search is in flight.
pub fn render_loading(kind: SearchKind) -> String {
    match kind {
        SearchKind::Files => "Searching files...\n".to_string(),
        SearchKind::Materials => "Searching material usage...\n".to_string(),
    }
}

/// One `abs_path` per line, ready to pipe into a clipboard tool.
pub fn render_paths(rows: &[ResultRow]) -> String {
    rows.iter().fold(String::new(), |mut out, row| {
        out.push_str(&row.abs_path);
        out.push('\n');
        out
    })
}

fn column_width(rows: &[ResultRow], header: &str, len: impl Fn(&ResultRow) -> usize) -> usize {
    rows.iter().map(len).max().unwrap_or(0).max(header.len())
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let kept = value.chars().take(max.saturating_sub(1)).collect::<String>();
    format!("{kept}…")
}
