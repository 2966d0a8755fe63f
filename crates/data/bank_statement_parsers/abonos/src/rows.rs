//! Data region bounds and row inclusion for each layout.

use logger::DiagnosticSink;
use models::{CanonicalField, LayoutTag, ParserSettings};
use serde::Serialize;
use serde_json::json;

use crate::duplicates::ColumnPlan;
use crate::headers::FieldMap;
use crate::text::fold;
use crate::workbook::RawSheet;

pub const STAGE: &str = "row_extractor";

/// Fields whose presence keeps a Layout A row.
const LAYOUT_A_KEY_FIELDS: [CanonicalField; 4] = [
    CanonicalField::CuentaNumero,
    CanonicalField::Beneficiario,
    CanonicalField::Monto,
    CanonicalField::Estado,
];

/// One data row keyed by logical header label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedRow {
    /// 0-based row index in the sheet.
    pub sheet_row: usize,
    pub fields: Vec<(String, String)>,
}

impl ExtractedRow {
    /// Value under `label`, or `""` when the column is absent.
    pub fn get(&self, label: &str) -> &str {
        self.fields
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    }

    /// Value of the column mapped to `field`, or `""` when unmapped.
    pub fn field(&self, map: &FieldMap, field: CanonicalField) -> &str {
        map.get(field).map(|label| self.get(label)).unwrap_or_default()
    }

    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|(_, v)| v.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataRegion {
    /// First data row.
    pub start: usize,
    /// One past the last data row.
    pub end: usize,
    /// Row index of the footer sentinel that closed the region, if any.
    pub sentinel_row: Option<usize>,
}

fn is_sentinel_row(sheet: &RawSheet, index: usize, settings: &ParserSettings) -> bool {
    sheet.row(index).is_some_and(|row| {
        row.iter().any(|cell| {
            let text = fold(&cell.text());
            !text.is_empty()
                && settings
                    .footer_sentinels
                    .iter()
                    .any(|s| !s.is_empty() && text.contains(&fold(s)))
        })
    })
}

/// Rows that may hold data. Layout A stops at the first footer sentinel and
/// never reads more than `layout_a_max_rows` rows past the header; Layout B
/// runs to the end of the sheet.
pub fn data_region(
    sheet: &RawSheet,
    header_row_index: usize,
    layout: LayoutTag,
    settings: &ParserSettings,
) -> DataRegion {
    let start = header_row_index + 1;
    let height = sheet.height();

    match layout {
        LayoutTag::LayoutA => {
            let cap = start.saturating_add(settings.layout_a_max_rows).min(height);
            let sentinel_row = (start..cap).find(|&i| is_sentinel_row(sheet, i, settings));
            DataRegion {
                start: start.min(cap),
                end: sentinel_row.unwrap_or(cap),
                sentinel_row,
            }
        }
        LayoutTag::LayoutB | LayoutTag::Unknown => DataRegion {
            start: start.min(height),
            end: height,
            sentinel_row: None,
        },
    }
}

fn is_sequence_number(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

/// Layout A keeps rows starting with a sequence number or carrying an
/// account, payee, amount or status. Layout B keeps any non-blank row.
pub fn keep_row(
    layout: LayoutTag,
    values: &[String],
    plan: &ColumnPlan,
    field_map: &FieldMap,
) -> bool {
    match layout {
        LayoutTag::LayoutA => {
            if values.first().is_some_and(|v| is_sequence_number(v)) {
                return true;
            }
            LAYOUT_A_KEY_FIELDS.iter().any(|&field| {
                field_map
                    .get(field)
                    .and_then(|label| plan.headers().position(label))
                    .and_then(|i| values.get(i))
                    .is_some_and(|v| !v.is_empty())
            })
        }
        LayoutTag::LayoutB | LayoutTag::Unknown => values.iter().any(|v| !v.is_empty()),
    }
}

pub fn extract_rows(
    sheet: &RawSheet,
    header_row_index: usize,
    layout: LayoutTag,
    plan: &ColumnPlan,
    field_map: &FieldMap,
    settings: &ParserSettings,
    sink: &dyn DiagnosticSink,
) -> Vec<ExtractedRow> {
    let region = data_region(sheet, header_row_index, layout, settings);
    let labels = plan.headers().labels();

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for sheet_row in region.start..region.end {
        let Some(cells) = sheet.row(sheet_row) else {
            continue;
        };
        let values = plan.merge_row(cells);
        if !keep_row(layout, &values, plan, field_map) {
            skipped += 1;
            continue;
        }
        rows.push(ExtractedRow {
            sheet_row,
            fields: labels.iter().cloned().zip(values).collect(),
        });
    }

    sink.info(
        STAGE,
        "rows extracted",
        json!({
            "layout": layout,
            "region": region,
            "kept": rows.len(),
            "skipped": skipped,
        }),
    );
    if region.sentinel_row.is_none() && layout == LayoutTag::LayoutA && region.end < sheet.height() {
        sink.debug(
            STAGE,
            "no footer sentinel before the row cap",
            json!({"cap": settings.layout_a_max_rows, "sheet_rows": sheet.height()}),
        );
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::{build_field_map, HeaderRow};
    use crate::workbook::Cell;
    use logger::MemorySink;

    const A_HEADER: [&str; 9] = [
        "Sel",
        "No.",
        "Cuenta",
        "Banco",
        "Titular(Archivo)",
        "Titular(Banco)",
        "Doc.Identidad",
        "Importe",
        "Situación",
    ];

    fn layout_a_sheet(data_rows: usize, sentinel_at: Option<usize>) -> RawSheet {
        let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); 30];
        rows.push(A_HEADER.iter().map(|h| Cell::from(*h)).collect());
        for i in 0..data_rows {
            let index = rows.len();
            if sentinel_at == Some(index) {
                rows.push(vec![Cell::from("Estimado Cliente: este reporte es informativo")]);
                continue;
            }
            rows.push(vec![
                Cell::Empty,
                Cell::Number((i + 1) as f64),
                Cell::from("0011-0123-45"),
                Cell::from("BBVA"),
                Cell::from("ANA TORRES"),
                Cell::from("ANA TORRES"),
                Cell::from("L - 44556677"),
                Cell::Number(150.0),
                Cell::from("Procesado"),
            ]);
        }
        RawSheet::new("Hoja1", rows)
    }

    fn a_values(first: &str) -> Vec<String> {
        let mut values = vec![String::new(); A_HEADER.len()];
        values[0] = first.to_string();
        values
    }

    #[test]
    fn test_layout_a_keeps_row_led_by_sequence_number() {
        let headers = HeaderRow::new(A_HEADER.iter().map(|h| h.to_string()).collect());
        let plan = ColumnPlan::identity(&headers);
        let map = build_field_map(&headers, LayoutTag::LayoutA);

        assert!(keep_row(LayoutTag::LayoutA, &a_values("7"), &plan, &map));
        assert!(!keep_row(LayoutTag::LayoutA, &a_values("7a"), &plan, &map));
        assert!(!keep_row(LayoutTag::LayoutA, &a_values(""), &plan, &map));
    }

    fn extract(sheet: &RawSheet, header: usize, layout: LayoutTag) -> Vec<ExtractedRow> {
        let headers = HeaderRow::from_cells(sheet.row(header).unwrap());
        let plan = ColumnPlan::identity(&headers);
        let map = build_field_map(&headers, layout);
        extract_rows(
            sheet,
            header,
            layout,
            &plan,
            &map,
            &ParserSettings::default(),
            &MemorySink::new(),
        )
    }

    #[test]
    fn test_layout_a_stops_at_footer_sentinel() {
        // Header at 30, rows 31..=44 hold data, sentinel at 45.
        let sheet = layout_a_sheet(20, Some(45));
        let rows = extract(&sheet, 30, LayoutTag::LayoutA);

        assert_eq!(rows.len(), 14);
        assert_eq!(rows.first().unwrap().sheet_row, 31);
        assert_eq!(rows.last().unwrap().sheet_row, 44);
        assert_eq!(rows[0].get("No."), "1");
    }

    #[test]
    fn test_layout_a_region_capped_without_sentinel() {
        let sheet = layout_a_sheet(150, None);
        let region = data_region(&sheet, 30, LayoutTag::LayoutA, &ParserSettings::default());
        assert_eq!((region.start, region.end), (31, 131));
        assert_eq!(extract(&sheet, 30, LayoutTag::LayoutA).len(), 100);
    }

    #[test]
    fn test_layout_a_keeps_rows_with_key_fields_only() {
        let mut sheet = layout_a_sheet(2, None);
        // Summary row: no sequence number, no key fields.
        sheet.rows.push(vec![Cell::Empty, Cell::from("Total"), Cell::Empty, Cell::from("BBVA")]);
        // Row without a sequence number but with an account.
        sheet.rows.push(vec![Cell::Empty, Cell::Empty, Cell::from("0099")]);

        let rows = extract(&sheet, 30, LayoutTag::LayoutA);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].get("Cuenta"), "0099");
    }

    #[test]
    fn test_layout_b_skips_blank_rows() {
        let sheet = RawSheet::from_strings(
            "Hoja1",
            &[
                vec!["Beneficiario", "Monto"],
                vec!["Ana", "10"],
                vec!["", ""],
                vec!["", "5"],
            ],
        );
        let rows = extract(&sheet, 0, LayoutTag::LayoutB);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].sheet_row, 3);
        assert!(rows.iter().all(|r| !r.is_blank()));
    }

    #[test]
    fn test_field_lookup_through_map() {
        let sheet = RawSheet::from_strings(
            "Hoja1",
            &[vec!["Beneficiario - Nombre", "Monto"], vec!["Ana", "10.50"]],
        );
        let headers = HeaderRow::from_cells(sheet.row(0).unwrap());
        let map = build_field_map(&headers, LayoutTag::LayoutB);
        let rows = extract(&sheet, 0, LayoutTag::LayoutB);

        assert_eq!(rows[0].field(&map, CanonicalField::Beneficiario), "Ana");
        assert_eq!(rows[0].field(&map, CanonicalField::Monto), "10.50");
        assert_eq!(rows[0].field(&map, CanonicalField::Estado), "");
    }
}
