use std::env;
use std::fs;

use abonos::headers::{build_field_map, resolve_headers};
use abonos::layout::detect;
use abonos::workbook::{self, Cell};
use anyhow::{Context, Result};
use logger::{init_tracing, TracingSink};
use models::ParserSettings;

fn main() -> Result<()> {
    init_tracing("info");
    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "abonos.xlsx".to_string());

    let bytes = fs::read(&path).with_context(|| format!("Cannot open {}", path))?;
    let sink = TracingSink;
    let sheets = workbook::read(&bytes, &path, &sink)?;
    println!("Sheets ({}):", sheets.len());

    for sheet in &sheets {
        println!("\n== {} ==", sheet.name);
        println!("  size: rows={}, cols={}", sheet.height(), sheet.width());

        // First 15 non-empty rows, up to 12 columns.
        let mut printed = 0usize;
        for (r_idx, row) in sheet.rows.iter().enumerate() {
            if printed >= 15 {
                break;
            }
            let mut cells: Vec<String> = row.iter().take(12).map(Cell::text).collect();
            if cells.iter().all(|s| s.is_empty()) {
                continue;
            }
            while matches!(cells.last(), Some(s) if s.is_empty()) {
                cells.pop();
            }
            println!("  row {:>4}: {}", r_idx + 1, cells.join(" | "));
            printed += 1;
        }
    }

    let settings = ParserSettings::default();
    let detection = detect(&sheets, None, &settings, &sink);
    println!(
        "\nDetected {} on sheet {} ({:?})",
        detection.layout, detection.sheet_index, detection.confidence
    );

    if let Some(sheet) = sheets.get(detection.sheet_index) {
        let resolved = resolve_headers(sheet, detection.layout, &settings, &sink);
        println!(
            "  header row: {} ({:?})",
            resolved.header_row_index + 1,
            resolved.source
        );
        for (field, label) in build_field_map(&resolved.headers, detection.layout).iter() {
            println!("  {:<16} <- {}", field.as_str(), label);
        }
    }

    Ok(())
}
