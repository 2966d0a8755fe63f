//! Columns that share a label (Layout B exports repeat `Documento`) are
//! merged into one logical column per row.

use logger::DiagnosticSink;
use serde_json::json;

use crate::headers::HeaderRow;
use crate::text::compact;
use crate::workbook::Cell;

pub const STAGE: &str = "duplicate_resolver";

/// Logical columns of a sheet and the physical columns feeding each one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    headers: HeaderRow,
    sources: Vec<Vec<usize>>,
}

impl ColumnPlan {
    /// One logical column per physical column.
    pub fn identity(headers: &HeaderRow) -> Self {
        Self {
            headers: headers.clone(),
            sources: (0..headers.len()).map(|i| vec![i]).collect(),
        }
    }

    /// Logical header labels, each label appearing once.
    pub fn headers(&self) -> &HeaderRow {
        &self.headers
    }

    pub fn has_duplicates(&self) -> bool {
        self.sources.iter().any(|s| s.len() > 1)
    }

    /// Trimmed value per logical column. The first physical value that is not
    /// a placeholder (empty or `-`) wins; otherwise the first value is kept.
    pub fn merge_row(&self, row: &[Cell]) -> Vec<String> {
        self.sources
            .iter()
            .map(|columns| {
                let values: Vec<String> = columns
                    .iter()
                    .map(|&c| row.get(c).map(Cell::text).unwrap_or_default())
                    .collect();
                let first_real = values.iter().position(|v| !is_placeholder(v));
                let chosen = first_real.unwrap_or(0);
                values.into_iter().nth(chosen).unwrap_or_default()
            })
            .collect()
    }
}

pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == "-"
}

/// Groups header labels that are identical after folding. The logical column
/// keeps the label of its first occurrence and its position.
pub fn resolve_duplicates(headers: &HeaderRow, sink: &dyn DiagnosticSink) -> ColumnPlan {
    let mut keys: Vec<String> = Vec::new();
    let mut labels: Vec<String> = Vec::new();
    let mut sources: Vec<Vec<usize>> = Vec::new();

    for (index, label) in headers.labels().iter().enumerate() {
        let key = compact(label);
        match keys.iter().position(|k| *k == key) {
            Some(existing) => sources[existing].push(index),
            None => {
                keys.push(key);
                labels.push(label.clone());
                sources.push(vec![index]);
            }
        }
    }

    let plan = ColumnPlan {
        headers: HeaderRow::new(labels),
        sources,
    };

    if plan.has_duplicates() {
        let merged: Vec<_> = plan
            .headers
            .labels()
            .iter()
            .zip(&plan.sources)
            .filter(|(_, s)| s.len() > 1)
            .map(|(label, s)| json!({"label": label, "columns": s}))
            .collect();
        sink.info(STAGE, "merged duplicate columns", json!({ "merged": merged }));
    }
    plan
}
