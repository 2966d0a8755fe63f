//! Extracted rows to [`AbonoRecord`]s.

use std::sync::LazyLock;

use logger::DiagnosticSink;
use models::{AbonoRecord, CanonicalField as F, LayoutTag, ParserSettings};
use regex::Regex;
use serde_json::json;

use crate::headers::FieldMap;
use crate::rows::ExtractedRow;

pub const STAGE: &str = "record_normalizer";

/// Identity-type prefix in Layout A document cells, e.g. `"L - 44556677"`.
static IDENTITY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^L\s*-\s*").expect("identity prefix pattern"));

const DASHES: [char; 7] = ['-', '\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}', '\u{2015}'];

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions<'a> {
    /// Name of the uploaded file, used for ids and `origen`.
    pub source_file: &'a str,
    /// Bank tag chosen by the caller for Layout B uploads.
    pub bank_override: Option<&'a str>,
}

/// Strict decimal parse of the trimmed text. `None` for empty or non-numeric input.
pub fn try_parse_amount(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Amount of a cell; anything that does not parse counts as 0.
pub fn parse_amount(text: &str) -> f64 {
    try_parse_amount(text).unwrap_or(0.0)
}

/// Account number with every dash removed.
pub fn strip_account(text: &str) -> String {
    text.trim().chars().filter(|c| !DASHES.contains(c)).collect()
}

pub fn strip_identity_prefix(text: &str) -> String {
    IDENTITY_PREFIX.replace(text.trim(), "").into_owned()
}

/// A lone dash is how both banks print an empty cell.
fn clean(value: &str) -> String {
    match value.trim() {
        "-" => String::new(),
        other => other.to_string(),
    }
}

fn or_dash(value: &str) -> String {
    match clean(value) {
        v if v.is_empty() => "-".to_string(),
        v => v,
    }
}

/// Bank tag for a layout: fixed for Layout A; for Layout B the caller's
/// override, then a file name hint, then the Layout B default.
pub fn resolve_bank(layout: LayoutTag, options: &NormalizeOptions<'_>, settings: &ParserSettings) -> String {
    match layout {
        LayoutTag::LayoutA => settings.layout_a_bank.clone(),
        LayoutTag::LayoutB | LayoutTag::Unknown => options
            .bank_override
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .or_else(|| settings.bank_for_filename(options.source_file))
            .unwrap_or(settings.layout_b_bank.as_str())
            .to_string(),
    }
}

pub fn normalize(
    rows: &[ExtractedRow],
    layout: LayoutTag,
    field_map: &FieldMap,
    options: &NormalizeOptions<'_>,
    settings: &ParserSettings,
    sink: &dyn DiagnosticSink,
) -> Vec<AbonoRecord> {
    let banco = resolve_bank(layout, options, settings);

    let records: Vec<AbonoRecord> = rows
        .iter()
        .enumerate()
        .map(|(position, row)| {
            let raw_amount = row.field(field_map, F::Monto);
            let monto = match try_parse_amount(raw_amount) {
                Some(value) => value,
                None => {
                    if !raw_amount.is_empty() && raw_amount != "-" {
                        sink.debug(
                            STAGE,
                            "amount is not numeric, using 0",
                            json!({"sheet_row": row.sheet_row, "value": raw_amount}),
                        );
                    }
                    0.0
                }
            };

            let (documento_tipo, documento) = match layout {
                LayoutTag::LayoutA if settings.layout_a_documents => (
                    String::new(),
                    strip_identity_prefix(&clean(row.field(field_map, F::Documento))),
                ),
                LayoutTag::LayoutA => (String::new(), String::new()),
                LayoutTag::LayoutB | LayoutTag::Unknown => (
                    or_dash(row.field(field_map, F::DocumentoTipo)),
                    or_dash(row.field(field_map, F::Documento)),
                ),
            };

            AbonoRecord {
                id: format!("{}_{}", options.source_file, position),
                beneficiario: clean(row.field(field_map, F::Beneficiario)),
                documento_tipo,
                documento,
                monto,
                cuenta_numero: strip_account(&clean(row.field(field_map, F::CuentaNumero))),
                estado: clean(row.field(field_map, F::Estado)),
                observaciones: clean(row.field(field_map, F::Observaciones)),
                banco: banco.clone(),
                origen: options.source_file.to_string(),
                ..Default::default()
            }
        })
        .filter(AbonoRecord::is_retained)
        .collect();

    sink.info(
        STAGE,
        "records normalized",
        json!({
            "rows": rows.len(),
            "records": records.len(),
            "dropped": rows.len() - records.len(),
            "bank": banco,
        }),
    );
    records
}
