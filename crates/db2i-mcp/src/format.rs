//! Response formatting.
//!
//! Two modes: pretty JSON in a single text block, or a typed markdown
//! document with a header, SQL echo, parameter listing and a rendered
//! table. Table columns are aligned by SQL type class, nulls render as a
//! substitute string with per-column counts, and rows beyond the display
//! cap are dropped behind a truncation banner.

use serde::Serialize;
use serde_json::{Map, Value};

use db2i_core::config::TableStyle;
use db2i_gateway::types::ColumnMetadata;
use db2i_policy::ParamMode;

use crate::error::ErrorCode;

/// Maximum characters of SQL echoed into responses and errors.
pub const SQL_ECHO_LIMIT: usize = 500;

/// Substitute string for NULL cells.
const NULL_SUBSTITUTE: &str = "-";

/// Structured result of one tool call.
#[derive(Debug, Clone, Serialize)]
pub struct OutputPayload {
    pub success: bool,
    pub data: Vec<Map<String, Value>>,
    pub metadata: OutputMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

/// Execution metadata attached to every payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    pub row_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnMetadata>>,
    pub parameter_mode: ParamMode,
    pub parameter_count: usize,
    pub processed_parameters: Vec<String>,
    pub tool_name: String,
    pub sql_statement: String,
    pub parameters: Value,
}

/// Truncate echoed SQL to the documented cap.
pub fn truncate_sql(sql: &str) -> String {
    if sql.chars().count() <= SQL_ECHO_LIMIT {
        sql.to_string()
    } else {
        let cut: String = sql.chars().take(SQL_ECHO_LIMIT).collect();
        format!("{cut}…")
    }
}

/// JSON mode: the payload, pretty-printed.
pub fn format_json(payload: &OutputPayload) -> String {
    serde_json::to_string_pretty(payload).unwrap_or_else(|_| "{}".to_string())
}

/// Markdown mode.
pub fn format_markdown(
    payload: &OutputPayload,
    style: TableStyle,
    max_display_rows: usize,
) -> String {
    let mut doc = String::new();
    doc.push_str(&format!("## {}\n\n", payload.metadata.tool_name));
    doc.push_str("✅ Query executed successfully\n\n");

    if !payload.metadata.sql_statement.is_empty() {
        doc.push_str("**SQL**\n\n```sql\n");
        doc.push_str(&truncate_sql(&payload.metadata.sql_statement));
        doc.push_str("\n```\n\n");
    }

    if !payload.metadata.processed_parameters.is_empty() {
        doc.push_str(&format!(
            "**Parameters** ({} mode): {}\n\n",
            mode_label(payload.metadata.parameter_mode),
            payload.metadata.processed_parameters.join(", ")
        ));
    }

    if payload.data.is_empty() {
        doc.push_str("*No rows returned.*\n");
        return doc;
    }

    let columns = column_plan(payload);
    let total = payload.data.len();
    let shown = total.min(max_display_rows);

    doc.push_str(&render_table(&columns, &payload.data[..shown], style));

    doc.push_str(&format!(
        "\n*{} row{}*\n",
        total,
        if total == 1 { "" } else { "s" }
    ));
    if shown < total {
        doc.push_str(&format!(
            "*Showing {shown} of {total} rows. {} omitted.*\n",
            total - shown
        ));
    }

    let null_notes: Vec<String> = columns
        .iter()
        .filter(|c| c.null_count > 0)
        .map(|c| format!("{} ({})", c.name, c.null_count))
        .collect();
    if !null_notes.is_empty() {
        doc.push_str(&format!("*Null values: {}*\n", null_notes.join(", ")));
    }

    doc
}

/// Error block shared by both formats.
pub fn format_error_markdown(
    tool_name: &str,
    code: ErrorCode,
    message: &str,
    sql: Option<&str>,
) -> String {
    let mut doc = String::new();
    doc.push_str(&format!("## {tool_name}\n\n"));
    doc.push_str(&format!("❌ **{}**: {message}\n", code.as_str()));
    if let Some(sql) = sql.filter(|s| !s.is_empty()) {
        doc.push_str(&format!("\n```sql\n{}\n```\n", truncate_sql(sql)));
    }
    doc
}

/// Alignment class of one SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Alignment {
    Left,
    Right,
}

/// Classify a SQL type for alignment: numeric families align right,
/// everything else (char, lob, binary, temporal, unknown) aligns left.
/// The precision suffix is stripped and matching is case-insensitive.
fn classify(sql_type: &str) -> Alignment {
    let base = sql_type
        .split('(')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_uppercase();
    match base.as_str() {
        "INTEGER" | "INT" | "SMALLINT" | "BIGINT" | "DECIMAL" | "NUMERIC" | "DECFLOAT"
        | "REAL" | "DOUBLE" | "FLOAT" => Alignment::Right,
        _ => Alignment::Left,
    }
}

struct ColumnPlan {
    name: String,
    header: String,
    alignment: Alignment,
    null_count: usize,
}

/// Decide headers, alignment and null counts for the rendered table.
fn column_plan(payload: &OutputPayload) -> Vec<ColumnPlan> {
    let mut plans: Vec<ColumnPlan> = match &payload.metadata.columns {
        Some(columns) if !columns.is_empty() => columns
            .iter()
            .map(|c| ColumnPlan {
                name: c.name.clone(),
                header: if c.sql_type.is_empty() {
                    c.name.clone()
                } else {
                    format!("{} ({})", c.name, c.sql_type)
                },
                alignment: classify(&c.sql_type),
                null_count: 0,
            })
            .collect(),
        _ => payload
            .data
            .first()
            .map(|row| {
                row.keys()
                    .map(|name| ColumnPlan {
                        name: name.clone(),
                        header: name.clone(),
                        alignment: Alignment::Left,
                        null_count: 0,
                    })
                    .collect()
            })
            .unwrap_or_default(),
    };

    for row in &payload.data {
        for plan in plans.iter_mut() {
            match row.get(&plan.name) {
                Some(Value::Null) | None => plan.null_count += 1,
                _ => {}
            }
        }
    }

    plans
}

fn cell_text(row: &Map<String, Value>, column: &str) -> String {
    match row.get(column) {
        Some(Value::Null) | None => NULL_SUBSTITUTE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn render_table(columns: &[ColumnPlan], rows: &[Map<String, Value>], style: TableStyle) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| cell_text(row, &c.name)).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let data_max = cells.iter().map(|r| r[i].chars().count()).max().unwrap_or(0);
            c.header.chars().count().max(data_max)
        })
        .collect();

    let pad = |text: &str, width: usize, alignment: Alignment| -> String {
        let len = text.chars().count();
        let fill = width.saturating_sub(len);
        match alignment {
            Alignment::Left => format!("{text}{}", " ".repeat(fill)),
            Alignment::Right => format!("{}{text}", " ".repeat(fill)),
        }
    };

    let mut out = String::new();
    match style {
        TableStyle::Markdown => {
            out.push('|');
            for (c, w) in columns.iter().zip(&widths) {
                out.push_str(&format!(" {} |", pad(&c.header, *w, Alignment::Left)));
            }
            out.push_str("\n|");
            for (c, w) in columns.iter().zip(&widths) {
                let dashes = "-".repeat((*w).max(3));
                match c.alignment {
                    Alignment::Left => out.push_str(&format!("{dashes}---|")),
                    Alignment::Right => out.push_str(&format!("{dashes}--:|")),
                }
            }
            out.push('\n');
            for row in &cells {
                out.push('|');
                for ((text, c), w) in row.iter().zip(columns).zip(&widths) {
                    out.push_str(&format!(" {} |", pad(text, *w, c.alignment)));
                }
                out.push('\n');
            }
        }
        TableStyle::Ascii => {
            let rule = {
                let mut r = String::from("+");
                for w in &widths {
                    r.push_str(&"-".repeat(w + 2));
                    r.push('+');
                }
                r.push('\n');
                r
            };
            out.push_str(&rule);
            out.push('|');
            for (c, w) in columns.iter().zip(&widths) {
                out.push_str(&format!(" {} |", pad(&c.header, *w, Alignment::Left)));
            }
            out.push('\n');
            out.push_str(&rule);
            for row in &cells {
                out.push('|');
                for ((text, c), w) in row.iter().zip(columns).zip(&widths) {
                    out.push_str(&format!(" {} |", pad(text, *w, c.alignment)));
                }
                out.push('\n');
            }
            out.push_str(&rule);
        }
        TableStyle::Grid => {
            let rule = |left: &str, mid: &str, right: &str| {
                let mut r = String::from(left);
                for (i, w) in widths.iter().enumerate() {
                    r.push_str(&"─".repeat(w + 2));
                    r.push_str(if i + 1 == widths.len() { right } else { mid });
                }
                r.push('\n');
                r
            };
            out.push_str(&rule("┌", "┬", "┐"));
            out.push('│');
            for (c, w) in columns.iter().zip(&widths) {
                out.push_str(&format!(" {} │", pad(&c.header, *w, Alignment::Left)));
            }
            out.push('\n');
            out.push_str(&rule("├", "┼", "┤"));
            for row in &cells {
                out.push('│');
                for ((text, c), w) in row.iter().zip(columns).zip(&widths) {
                    out.push_str(&format!(" {} │", pad(text, *w, c.alignment)));
                }
                out.push('\n');
            }
            out.push_str(&rule("└", "┴", "┘"));
        }
        TableStyle::Compact => {
            let line: Vec<String> = columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| pad(&c.header, *w, Alignment::Left))
                .collect();
            out.push_str(&line.join("  "));
            out.push('\n');
            let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            out.push_str(&dashes.join("  "));
            out.push('\n');
            for row in &cells {
                let line: Vec<String> = row
                    .iter()
                    .zip(columns)
                    .zip(&widths)
                    .map(|((text, c), w)| pad(text, *w, c.alignment))
                    .collect();
                out.push_str(line.join("  ").trim_end());
                out.push('\n');
            }
        }
    }
    out
}

fn mode_label(mode: ParamMode) -> &'static str {
    match mode {
        ParamMode::Named => "named",
        ParamMode::Positional => "positional",
        ParamMode::Mixed => "mixed",
        ParamMode::None => "none",
    }
}
