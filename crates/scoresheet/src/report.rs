//! Renderer-neutral workbook layout.
//!
//! The report builder turns aggregate tables into a declarative description
//! of sheets, cells and charts. It never touches a spreadsheet library; the
//! caller hands the serialized spec to whatever renderer it ships with.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ReportWarning;
use crate::record::{AggregateRow, AggregateTable};

/// Excel's hard limit, enforced here so any renderer downstream is safe.
const MAX_SHEET_NAME_LEN: usize = 31;

#[derive(Debug, Clone, Serialize)]
pub struct WorkbookSpec {
    pub generated_at: DateTime<Utc>,
    pub sheets: Vec<SheetSpec>,
    /// Every warning accumulated across the request, rendered on a trailing
    /// warnings area by the caller's renderer.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetSpec {
    pub name: String,
    /// Free-text lines above the table (report title, scope, timestamp).
    pub title_lines: Vec<String>,
    pub header: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    /// Class-average strip below the data rows; empty for placeholder sheets.
    pub summary: Vec<CellValue>,
    pub charts: Vec<ChartSpec>,
    /// Warnings scoped to this sheet.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Column,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub categories: RangeRef,
    pub series: Vec<SeriesSpec>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesSpec {
    pub name: String,
    pub values: RangeRef,
}

/// Zero-based inclusive cell range within one sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeRef {
    pub sheet: String,
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

/// Characters Excel rejects in sheet names.
const FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '[', ']'];

pub fn sanitize_sheet_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        return "Sheet".to_string();
    }
    cleaned.chars().take(MAX_SHEET_NAME_LEN).collect()
}

/// Build the workbook spec: one sheet per table, plus the request-wide
/// warning ledger. Tables with no rows become placeholder sheets and add an
/// `EmptySheet` warning.
pub fn build_workbook(
    tables: &[AggregateTable],
    warnings: &[ReportWarning],
    generated_at: DateTime<Utc>,
) -> (WorkbookSpec, Vec<ReportWarning>) {
    let _span = tracing::info_span!("report.build_workbook", tables = tables.len()).entered();

    let mut new_warnings = Vec::new();
    let mut sheets = Vec::new();

    for table in tables {
        let name = sanitize_sheet_name(&table.scope);
        if table.rows.is_empty() {
            new_warnings.push(ReportWarning::EmptySheet {
                sheet: name.clone(),
            });
            sheets.push(placeholder_sheet(name, table, generated_at));
            continue;
        }
        sheets.push(data_sheet(name, table, generated_at));
    }

    let all_warnings: Vec<String> = warnings
        .iter()
        .chain(new_warnings.iter())
        .map(|w| w.to_string())
        .collect();

    (
        WorkbookSpec {
            generated_at,
            sheets,
            warnings: all_warnings,
        },
        new_warnings,
    )
}

fn title_lines(table: &AggregateTable, generated_at: DateTime<Utc>) -> Vec<String> {
    vec![
        format!("{} report", table.mode),
        format!("Scope: {}", table.scope),
        format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M UTC")),
    ]
}

fn percent(ratio: f64) -> f64 {
    (ratio * 10000.0).round() / 100.0
}

fn stat_cells(row: &AggregateRow) -> [CellValue; 4] {
    [
        CellValue::Number(row.attempted as f64),
        CellValue::Number(row.expected as f64),
        CellValue::Number(percent(row.mean_ratio)),
        CellValue::Number(percent(row.pass_rate)),
    ]
}

fn placeholder_sheet(
    name: String,
    table: &AggregateTable,
    generated_at: DateTime<Utc>,
) -> SheetSpec {
    let mut titles = title_lines(table, generated_at);
    titles.push("No data extracted for this sheet".to_string());
    SheetSpec {
        name,
        title_lines: titles,
        header: Vec::new(),
        rows: Vec::new(),
        summary: Vec::new(),
        charts: Vec::new(),
        warnings: table.warnings.clone(),
    }
}

fn data_sheet(name: String, table: &AggregateTable, generated_at: DateTime<Utc>) -> SheetSpec {
    let titles = title_lines(table, generated_at);
    let ragged = table.columns.is_empty();

    // Column layout. Ragged tables (FA) tabulate only the stats; columnar
    // tables show one cell per value column between the labels and the stats.
    let (header, value_offset) = if ragged {
        (
            vec![
                "Group".to_string(),
                "Attempted".to_string(),
                "Expected".to_string(),
                "Mean %".to_string(),
                "Pass %".to_string(),
            ],
            1,
        )
    } else {
        let mut header = match table.grouping_key.as_str() {
            "student" => vec!["Student ID".to_string(), "Name".to_string()],
            other => vec![other.to_string(), "Name".to_string()],
        };
        header.extend(table.columns.iter().cloned());
        header.extend(
            ["Attempted", "Expected", "Mean %", "Pass %"]
                .iter()
                .map(|s| s.to_string()),
        );
        (header, 2)
    };

    let mut rows = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let mut cells = vec![CellValue::Text(row.key.clone())];
        if !ragged {
            cells.push(CellValue::Text(row.label.clone()));
            for value in &row.values {
                cells.push(match value {
                    Some(v) => CellValue::Number(percent(*v)),
                    None => CellValue::Empty,
                });
            }
        }
        cells.extend(stat_cells(row));
        rows.push(cells);
    }

    let summary = summary_row(table, ragged, value_offset);

    // Grid geometry: titles, then header, then data.
    let header_row = titles.len();
    let first_data_row = header_row + 1;
    let last_data_row = first_data_row + table.rows.len() - 1;
    let mean_col = value_offset + table.columns.len() + 2;
    let pass_col = mean_col + 1;

    let range = |col: usize| RangeRef {
        sheet: name.clone(),
        first_row: first_data_row,
        first_col: col,
        last_row: last_data_row,
        last_col: col,
    };

    let charts = vec![
        ChartSpec {
            kind: ChartKind::Column,
            title: format!("Mean % by {}", table.grouping_key),
            categories: range(0),
            series: vec![SeriesSpec {
                name: "Mean %".to_string(),
                values: range(mean_col),
            }],
        },
        ChartSpec {
            kind: ChartKind::Column,
            title: format!("Pass % by {}", table.grouping_key),
            categories: range(0),
            series: vec![SeriesSpec {
                name: "Pass %".to_string(),
                values: range(pass_col),
            }],
        },
    ];

    SheetSpec {
        name,
        title_lines: titles,
        header,
        rows,
        summary,
        charts,
        warnings: table.warnings.clone(),
    }
}

/// Class-average strip: mean of each value column over present cells, then
/// overall mean and pass rates across rows.
fn summary_row(table: &AggregateTable, ragged: bool, value_offset: usize) -> Vec<CellValue> {
    let mut summary = vec![CellValue::Text("Class Average".to_string())];
    if !ragged {
        summary.push(CellValue::Empty);
        for (index, _) in table.columns.iter().enumerate() {
            let present: Vec<f64> = table
                .rows
                .iter()
                .filter_map(|r| r.values.get(index).copied().flatten())
                .collect();
            summary.push(if present.is_empty() {
                CellValue::Empty
            } else {
                CellValue::Number(percent(
                    present.iter().sum::<f64>() / present.len() as f64,
                ))
            });
        }
    }

    let total_attempted: usize = table.rows.iter().map(|r| r.attempted).sum();
    let total_expected: usize = table.rows.iter().map(|r| r.expected).sum();
    let with_data: Vec<&AggregateRow> =
        table.rows.iter().filter(|r| r.attempted > 0).collect();
    let (mean, pass) = if with_data.is_empty() {
        (CellValue::Empty, CellValue::Empty)
    } else {
        let n = with_data.len() as f64;
        (
            CellValue::Number(percent(
                with_data.iter().map(|r| r.mean_ratio).sum::<f64>() / n,
            )),
            CellValue::Number(percent(
                with_data.iter().map(|r| r.pass_rate).sum::<f64>() / n,
            )),
        )
    };
    summary.push(CellValue::Number(total_attempted as f64));
    summary.push(CellValue::Number(total_expected as f64));
    summary.push(mean);
    summary.push(pass);

    debug_assert!(ragged || summary.len() == value_offset + table.columns.len() + 4);
    summary
}
