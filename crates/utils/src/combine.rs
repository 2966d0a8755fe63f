use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use models::{CombinedResult, SourceBatch};

/// Merges per-file batches into one result, keeping batch order and row order.
/// A record whose `id` was already taken is skipped. With batches named by
/// [`source_names`] that only happens when the same file is uploaded twice.
///
/// # Example
/// ```no_run
/// use models::SourceBatch;
/// use utils::combine_batches;
///
/// let batches = vec![SourceBatch { source: "a.xls".into(), records: vec![] }];
/// let (combined, stats) = combine_batches(batches);
/// println!("Added: {}, Skipped: {}", stats.added, stats.skipped);
/// ```
pub fn combine_batches(batches: Vec<SourceBatch>) -> (CombinedResult, MergeStats) {
    combine_batches_at(batches, Utc::now())
}

pub fn combine_batches_at(
    batches: Vec<SourceBatch>,
    processed_at: DateTime<Utc>,
) -> (CombinedResult, MergeStats) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::new();
    let mut sources = Vec::with_capacity(batches.len());
    let mut stats = MergeStats::default();

    for batch in batches {
        stats.total += batch.records.len();
        sources.push(batch.source);
        for record in batch.records {
            if seen.insert(record.id.clone()) {
                records.push(record);
                stats.added += 1;
            } else {
                stats.skipped += 1;
            }
        }
    }

    let combined = CombinedResult {
        total_records: records.len(),
        records,
        sources,
        processed_at,
    };
    (combined, stats)
}

/// Statistics about a combine operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub skipped: usize,
    pub total: usize,
}

impl MergeStats {
    pub fn has_duplicates(&self) -> bool {
        self.skipped > 0
    }
}

/// Source name for each uploaded path: its file name, or `stem (n).ext` when
/// a different path already took that file name. Record ids are built from
/// these names, so two banks exporting `reporte.xlsx` keep all their rows.
/// A path listed twice gets the same name both times.
pub fn source_names<P: AsRef<Path>>(paths: &[P]) -> Vec<String> {
    let mut assigned: Vec<(PathBuf, String)> = Vec::with_capacity(paths.len());

    for path in paths {
        let path = path.as_ref();
        let repeated = assigned
            .iter()
            .find(|(p, _)| p.as_path() == path)
            .map(|(_, name)| name.clone());
        if let Some(name) = repeated {
            assigned.push((path.to_path_buf(), name));
            continue;
        }

        let base = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let taken = |candidate: &str| assigned.iter().any(|(_, n)| n == candidate);

        let mut name = base.clone();
        let mut n = 2;
        while taken(&name) {
            name = numbered(&base, n);
            n += 1;
        }
        assigned.push((path.to_path_buf(), name));
    }

    assigned.into_iter().map(|(_, name)| name).collect()
}

fn numbered(file_name: &str, n: usize) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{file_name} ({n})"),
    }
}
