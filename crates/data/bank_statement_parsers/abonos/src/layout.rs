//! Layout detection: which sheet holds the table and which of the two bank
//! report shapes it follows.

use logger::DiagnosticSink;
use models::{LayoutTag, ParserSettings};
use serde::Serialize;
use serde_json::json;

use crate::text::{alnum, compact, fold};
use crate::workbook::{Cell, RawSheet};

pub const STAGE: &str = "layout_detector";

const SEQUENCE_LABELS: [&str; 5] = ["no", "nro", "n", "num", "numero"];

/// Words that suggest a Layout B header when its full signature is absent.
pub const LAYOUT_B_KEYWORDS: [&str; 6] = [
    "beneficiario",
    "titular",
    "cuenta",
    "monto",
    "importe",
    "documento",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// The caller said which layout to use.
    Hinted,
    /// A full header signature was found.
    Signature,
    /// Only loose keywords were found.
    Keywords,
    /// Nothing matched; Layout B on the first sheet was assumed.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub sheet_index: usize,
    pub layout: LayoutTag,
    pub confidence: Confidence,
}

impl Detection {
    pub fn is_fallback(&self) -> bool {
        self.confidence == Confidence::Fallback
    }
}

fn folded(row: &[Cell]) -> Vec<String> {
    row.iter()
        .filter(|c| !c.is_blank())
        .map(|c| fold(&c.text()))
        .collect()
}

fn any_cell(cells: &[String], pred: impl Fn(&str) -> bool) -> bool {
    cells.iter().any(|c| pred(c.as_str()))
}

/// Selection marker, sequence number, account, payee-as-filed and amount
/// columns all present in one row.
pub fn is_layout_a_header(row: &[Cell]) -> bool {
    let cells = folded(row);

    any_cell(&cells, |c| c.starts_with("sel"))
        && any_cell(&cells, |c| SEQUENCE_LABELS.contains(&alnum(c).as_str()))
        && any_cell(&cells, |c| c.contains("cuenta"))
        && any_cell(&cells, |c| compact(c).contains("titular(archivo)"))
        && any_cell(&cells, |c| c.contains("importe"))
}

/// Payee name, document type, amount and account number columns all present
/// in one row.
pub fn is_layout_b_header(row: &[Cell]) -> bool {
    let cells = folded(row);

    any_cell(&cells, |c| c.contains("beneficiario"))
        && any_cell(&cells, |c| c.contains("documento") && c.contains("tipo"))
        && any_cell(&cells, |c| c.contains("monto"))
        && any_cell(&cells, |c| {
            c.contains("cuenta") && (c.contains("numero") || c.contains("nro"))
        })
}

pub fn has_layout_b_keywords(row: &[Cell]) -> bool {
    folded(row)
        .iter()
        .any(|c| LAYOUT_B_KEYWORDS.iter().any(|k| c.contains(k)))
}

fn first_sheet_with(
    sheets: &[RawSheet],
    scan_rows: usize,
    pred: impl Fn(&[Cell]) -> bool,
) -> Option<usize> {
    sheets
        .iter()
        .position(|sheet| sheet.rows.iter().take(scan_rows).any(|row| pred(row.as_slice())))
}

/// Chooses the sheet and layout to parse.
///
/// A hint of `LayoutA` or `LayoutB` skips inference and only picks the sheet.
/// Without one, sheets are scanned in document order: the first row that
/// carries a full Layout A or Layout B signature wins, then the first row
/// with Layout B keywords, then Layout B on sheet 0.
pub fn detect(
    sheets: &[RawSheet],
    hint: Option<LayoutTag>,
    settings: &ParserSettings,
    sink: &dyn DiagnosticSink,
) -> Detection {
    let scan = settings.detection_scan_rows;

    let detection = match hint {
        Some(LayoutTag::LayoutA) => Detection {
            // Layout A headers can sit well below the scan window.
            sheet_index: first_sheet_with(sheets, usize::MAX, is_layout_a_header).unwrap_or(0),
            layout: LayoutTag::LayoutA,
            confidence: Confidence::Hinted,
        },
        Some(LayoutTag::LayoutB) => Detection {
            sheet_index: first_sheet_with(sheets, scan, is_layout_b_header)
                .or_else(|| first_sheet_with(sheets, scan, has_layout_b_keywords))
                .unwrap_or(0),
            layout: LayoutTag::LayoutB,
            confidence: Confidence::Hinted,
        },
        Some(LayoutTag::Unknown) | None => infer(sheets, scan),
    };

    if detection.is_fallback() {
        sink.warn(
            STAGE,
            "no known header layout found, assuming LayoutB on the first sheet",
            json!({"sheets": sheets.len(), "scan_rows": scan}),
        );
    } else {
        sink.info(
            STAGE,
            "layout chosen",
            json!({
                "layout": detection.layout,
                "sheet_index": detection.sheet_index,
                "sheet": sheets.get(detection.sheet_index).map(|s| s.name.as_str()),
                "confidence": detection.confidence,
            }),
        );
    }
    detection
}

fn infer(sheets: &[RawSheet], scan: usize) -> Detection {
    for (sheet_index, sheet) in sheets.iter().enumerate() {
        for row in sheet.rows.iter().take(scan) {
            let layout = if is_layout_a_header(row) {
                LayoutTag::LayoutA
            } else if is_layout_b_header(row) {
                LayoutTag::LayoutB
            } else {
                continue;
            };
            return Detection {
                sheet_index,
                layout,
                confidence: Confidence::Signature,
            };
        }
    }

    match first_sheet_with(sheets, scan, has_layout_b_keywords) {
        Some(sheet_index) => Detection {
            sheet_index,
            layout: LayoutTag::LayoutB,
            confidence: Confidence::Keywords,
        },
        None => Detection {
            sheet_index: 0,
            layout: LayoutTag::LayoutB,
            confidence: Confidence::Fallback,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    const B_HEADER: [&str; 6] = [
        "Beneficiario - Nombre",
        "Documento - Tipo",
        "Documento",
        "Monto",
        "Cuenta - Número",
        "Estado",
    ];

    fn sheet_with_header_at(name: &str, header: &[&str], at: usize) -> RawSheet {
        let mut rows: Vec<Vec<&str>> = vec![vec![""]; at];
        if let Some(first) = rows.first_mut() {
            *first = vec!["Reporte de abonos"];
        }
        rows.push(header.to_vec());
        RawSheet::from_strings(name, &rows)
    }

    #[test]
    fn test_signatures() {
        let a = RawSheet::from_strings("a", &[A_HEADER.to_vec()]);
        let b = RawSheet::from_strings("b", &[B_HEADER.to_vec()]);
        assert!(is_layout_a_header(&a.rows[0]));
        assert!(!is_layout_b_header(&a.rows[0]));
        assert!(is_layout_b_header(&b.rows[0]));
        assert!(!is_layout_a_header(&b.rows[0]));
    }

    #[test]
    fn test_detects_layout_a_header_at_row_30() {
        let sheets = vec![sheet_with_header_at("Hoja1", &A_HEADER, 30)];
        let sink = MemorySink::new();
        let detection = detect(&sheets, None, &ParserSettings::default(), &sink);

        assert_eq!(detection.layout, LayoutTag::LayoutA);
        assert_eq!(detection.sheet_index, 0);
        assert_eq!(detection.confidence, Confidence::Signature);
        assert!(sink.contains(STAGE, "layout chosen"));
    }

    #[test]
    fn test_detects_layout_b_on_second_sheet() {
        let sheets = vec![
            RawSheet::from_strings("Resumen", &[vec!["Total", "15"]]),
            sheet_with_header_at("Detalle", &B_HEADER, 5),
        ];
        let detection = detect(&sheets, None, &ParserSettings::default(), &MemorySink::new());

        assert_eq!(detection.layout, LayoutTag::LayoutB);
        assert_eq!(detection.sheet_index, 1);
    }

    #[test]
    fn test_keywords_only_is_layout_b() {
        let sheets = vec![RawSheet::from_strings(
            "Hoja1",
            &[vec!["Nombre del titular", "Monto"], vec!["Ana", "10"]],
        )];
        let detection = detect(&sheets, None, &ParserSettings::default(), &MemorySink::new());

        assert_eq!(detection.layout, LayoutTag::LayoutB);
        assert_eq!(detection.confidence, Confidence::Keywords);
    }

    #[test]
    fn test_no_keywords_falls_back_with_warning() {
        let sheets = vec![RawSheet::from_strings(
            "Hoja1",
            &[vec!["Fecha", "Hora"], vec!["2024-01-01", "10:00"]],
        )];
        let sink = MemorySink::new();
        let detection = detect(&sheets, None, &ParserSettings::default(), &sink);

        assert!(detection.is_fallback());
        assert_eq!(detection.layout, LayoutTag::LayoutB);
        assert_eq!(detection.sheet_index, 0);
        assert_eq!(sink.count_at(logger::Level::Warn), 1);
    }

    #[test]
    fn test_hint_skips_inference() {
        let sheets = vec![
            RawSheet::from_strings("Portada", &[vec!["Banco"]]),
            sheet_with_header_at("Abonos", &A_HEADER, 2),
        ];
        let detection = detect(
            &sheets,
            Some(LayoutTag::LayoutA),
            &ParserSettings::default(),
            &MemorySink::new(),
        );
        assert_eq!(detection.confidence, Confidence::Hinted);
        assert_eq!(detection.sheet_index, 1);

        let forced_b = detect(
            &sheets,
            Some(LayoutTag::LayoutB),
            &ParserSettings::default(),
            &MemorySink::new(),
        );
        assert_eq!(forced_b.layout, LayoutTag::LayoutB);
    }

    #[test]
    fn test_unknown_hint_is_ignored() {
        let sheets = vec![sheet_with_header_at("Hoja1", &B_HEADER, 0)];
        let detection = detect(
            &sheets,
            Some(LayoutTag::Unknown),
            &ParserSettings::default(),
            &MemorySink::new(),
        );
        assert_eq!(detection.confidence, Confidence::Signature);
    }

    #[test]
    fn test_signature_outside_scan_window_is_not_inferred() {
        let sheets = vec![sheet_with_header_at("Hoja1", &A_HEADER, 60)];
        let detection = detect(&sheets, None, &ParserSettings::default(), &MemorySink::new());
        // "Cuenta" and "Importe" are still Layout B keywords, but beyond the window.
        assert!(detection.is_fallback());
    }
}
