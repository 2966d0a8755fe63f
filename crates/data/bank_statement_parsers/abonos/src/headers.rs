//! Header row location and header-to-field mapping.

use std::collections::BTreeMap;

use logger::DiagnosticSink;
use models::{CanonicalField, LayoutTag, ParserSettings};
use serde::Serialize;
use serde_json::json;

use crate::layout::is_layout_a_header;
use crate::text::{compact, fold};
use crate::workbook::{filled_cells, Cell, RawSheet};

pub const STAGE: &str = "header_resolver";

/// Words that mark a Layout B header row.
const LAYOUT_B_HEADER_WORDS: [&str; 9] = [
    "beneficiario",
    "titular",
    "cuenta",
    "monto",
    "importe",
    "documento",
    "estado",
    "situacion",
    "observacion",
];

/// Cleaned labels of the header row, one per column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderRow(Vec<String>);

impl HeaderRow {
    /// Trims every label and names blank ones `Column_<n>` (1-based).
    pub fn from_cells(row: &[Cell]) -> Self {
        HeaderRow(
            row.iter()
                .enumerate()
                .map(|(i, cell)| {
                    let label = cell.text();
                    if label.is_empty() {
                        format!("Column_{}", i + 1)
                    } else {
                        label
                    }
                })
                .collect(),
        )
    }

    pub fn new(labels: Vec<String>) -> Self {
        HeaderRow(labels)
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.0.iter().position(|l| l == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderSource {
    Signature,
    Keywords,
    FixedRow,
    FirstFilledRow,
    FirstRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedHeaders {
    pub header_row_index: usize,
    pub headers: HeaderRow,
    pub source: HeaderSource,
}

/// Index of the header row for `layout`, and how it was found.
pub fn locate_header_row(
    sheet: &RawSheet,
    layout: LayoutTag,
    settings: &ParserSettings,
) -> (usize, HeaderSource) {
    match layout {
        LayoutTag::LayoutA => locate_layout_a(sheet, settings),
        LayoutTag::LayoutB | LayoutTag::Unknown => locate_layout_b(sheet, settings),
    }
}

fn locate_layout_a(sheet: &RawSheet, settings: &ParserSettings) -> (usize, HeaderSource) {
    if let Some(index) = sheet.rows.iter().position(|row| is_layout_a_header(row)) {
        return (index, HeaderSource::Signature);
    }

    let fixed = settings.layout_a_fallback_header_row;
    if sheet.row(fixed).is_some_and(|row| filled_cells(row) > 0) {
        return (fixed, HeaderSource::FixedRow);
    }

    match sheet.rows.iter().position(|row| filled_cells(row) >= 2) {
        Some(index) => (index, HeaderSource::FirstFilledRow),
        None => (0, HeaderSource::FirstRow),
    }
}

fn locate_layout_b(sheet: &RawSheet, settings: &ParserSettings) -> (usize, HeaderSource) {
    let found = sheet
        .rows
        .iter()
        .take(settings.layout_b_header_scan_rows)
        .position(|row| {
            filled_cells(row) >= 2
                && row.iter().any(|cell| {
                    let label = fold(&cell.text());
                    LAYOUT_B_HEADER_WORDS.iter().any(|w| label.contains(w))
                })
        });

    match found {
        Some(index) => (index, HeaderSource::Keywords),
        None => (0, HeaderSource::FirstRow),
    }
}

pub fn resolve_headers(
    sheet: &RawSheet,
    layout: LayoutTag,
    settings: &ParserSettings,
    sink: &dyn DiagnosticSink,
) -> ResolvedHeaders {
    let (header_row_index, source) = locate_header_row(sheet, layout, settings);
    let headers = HeaderRow::from_cells(sheet.row(header_row_index).unwrap_or_default());

    let data = json!({
        "layout": layout,
        "row": header_row_index,
        "source": source,
        "headers": headers.labels(),
    });
    match source {
        HeaderSource::Signature | HeaderSource::Keywords => {
            sink.info(STAGE, "header row found", data)
        }
        _ => sink.warn(STAGE, "header row not recognized, using fallback", data),
    }

    ResolvedHeaders {
        header_row_index,
        headers,
        source,
    }
}

/// Matching rule for one field: a header matches a pattern if it contains it
/// (or, for headers of three characters or more, is contained in it), holds
/// every `requires` fragment and none of the `excludes` fragments.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: CanonicalField,
    pub patterns: &'static [&'static str],
    pub requires: &'static [&'static str],
    pub excludes: &'static [&'static str],
}

impl FieldRule {
    const fn new(field: CanonicalField, patterns: &'static [&'static str]) -> Self {
        Self {
            field,
            patterns,
            requires: &[],
            excludes: &[],
        }
    }

    const fn requiring(mut self, requires: &'static [&'static str]) -> Self {
        self.requires = requires;
        self
    }

    const fn excluding(mut self, excludes: &'static [&'static str]) -> Self {
        self.excludes = excludes;
        self
    }

    /// Whether `header` matches `pattern` under this rule's constraints.
    fn matches(&self, header: &str, pattern: &str) -> bool {
        let header = compact(header);
        if header.is_empty() {
            return false;
        }
        if !self.requires.iter().all(|r| header.contains(&compact(r))) {
            return false;
        }
        if self.excludes.iter().any(|e| header.contains(&compact(e))) {
            return false;
        }
        let pattern = compact(pattern);
        header.contains(&pattern) || (header.chars().count() >= 3 && pattern.contains(&header))
    }

    /// First header, in column order, matching the earliest pattern that matches any.
    fn find_in<'h>(&self, headers: &'h HeaderRow) -> Option<&'h String> {
        self.patterns.iter().find_map(|pattern| {
            headers
                .labels()
                .iter()
                .find(|header| self.matches(header, pattern))
        })
    }
}

use CanonicalField as F;

const BENEFICIARIO_EXCLUDES: &[&str] = &["cuenta"];
const DOCUMENTO_TIPO_REQUIRES: &[&str] = &["tipo"];
const DOCUMENTO_EXCLUDES: &[&str] = &["tipo"];
const MONTO_EXCLUDES: &[&str] = &["moneda", "abonado", "m/n"];
const CUENTA_NUMERO_EXCLUDES: &[&str] = &["tipo", "nombre", "moneda", "cuentat"];

const LAYOUT_A_RULES: &[FieldRule] = &[
    FieldRule::new(F::Beneficiario, &["titular(archivo)", "titular", "titular(banco)"]),
    FieldRule::new(F::Documento, &["doc.identidad", "doc identidad", "documento"]),
    FieldRule::new(F::Monto, &["importe"]),
    FieldRule::new(F::CuentaNumero, &["cuenta"]),
    FieldRule::new(F::Estado, &["situacion", "situ", "estado"]),
];

const LAYOUT_B_RULES: &[FieldRule] = &[
    FieldRule::new(
        F::Beneficiario,
        &["beneficiario - nombre", "beneficiario", "cliente", "nombre", "titular"],
    )
    .excluding(BENEFICIARIO_EXCLUDES),
    FieldRule::new(
        F::DocumentoTipo,
        &["documento - tipo", "tipo documento", "documento tipo", "doc tipo"],
    )
    .requiring(DOCUMENTO_TIPO_REQUIRES),
    FieldRule::new(
        F::Documento,
        &["documento", "numero documento", "documento - numero", "doc.identidad"],
    )
    .excluding(DOCUMENTO_EXCLUDES),
    FieldRule::new(F::Monto, &["monto", "importe", "amount"]).excluding(MONTO_EXCLUDES),
    FieldRule::new(
        F::CuentaNumero,
        &["cuenta - numero", "cuenta numero", "numero cuenta", "cuenta - nro", "cuenta"],
    )
    .excluding(CUENTA_NUMERO_EXCLUDES),
    FieldRule::new(F::Estado, &["estado", "status", "situacion"]),
    FieldRule::new(F::Observaciones, &["observacion", "obs"]),
];

/// Tried for every field after the layout's own list.
const GENERIC_RULES: &[FieldRule] = &[
    FieldRule::new(
        F::Beneficiario,
        &[
            "titular(archivo)",
            "titular(banco)",
            "beneficiario - nombre",
            "beneficiario",
            "titular",
            "cliente",
            "nombre",
            "name",
        ],
    )
    .excluding(BENEFICIARIO_EXCLUDES),
    FieldRule::new(F::DocumentoTipo, &["documento - tipo", "tipo documento", "doc tipo"])
        .requiring(DOCUMENTO_TIPO_REQUIRES),
    FieldRule::new(F::Documento, &["documento", "doc.identidad", "numero documento"])
        .excluding(DOCUMENTO_EXCLUDES),
    FieldRule::new(F::Monto, &["monto", "amount", "importe", "valor", "total"])
        .excluding(MONTO_EXCLUDES),
    FieldRule::new(
        F::CuentaNumero,
        &["cuenta - numero", "cuenta numero", "numero cuenta", "cuenta"],
    )
    .excluding(CUENTA_NUMERO_EXCLUDES),
    FieldRule::new(F::Estado, &["estado", "status", "situacion", "condicion"]),
    FieldRule::new(
        F::Observaciones,
        &["observaciones", "observacion", "comentarios", "notas", "obs"],
    ),
];

/// Layout-specific rules, tried before [`GENERIC_RULES`].
pub fn priority_rules(layout: LayoutTag) -> &'static [FieldRule] {
    match layout {
        LayoutTag::LayoutA => LAYOUT_A_RULES,
        LayoutTag::LayoutB | LayoutTag::Unknown => LAYOUT_B_RULES,
    }
}

/// Header matched by the layout's rule for `field`, else by the generic rule.
/// Patterns are tried in priority order, headers in column order.
pub fn find_best_match(headers: &HeaderRow, field: CanonicalField, layout: LayoutTag) -> Option<String> {
    priority_rules(layout)
        .iter()
        .chain(GENERIC_RULES.iter())
        .filter(|rule| rule.field == field)
        .find_map(|rule| rule.find_in(headers))
        .cloned()
}

/// Resolved header label for each field that has one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldMap(BTreeMap<CanonicalField, String>);

impl FieldMap {
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn insert(&mut self, field: CanonicalField, label: impl Into<String>) {
        self.0.insert(field, label.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &str)> {
        self.0.iter().map(|(f, l)| (*f, l.as_str()))
    }
}

pub fn build_field_map(headers: &HeaderRow, layout: LayoutTag) -> FieldMap {
    let mut map = FieldMap::default();
    for field in CanonicalField::ALL {
        if let Some(label) = find_best_match(headers, field, layout) {
            map.insert(field, label);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use logger::MemorySink;

    fn headers(labels: &[&str]) -> HeaderRow {
        HeaderRow::new(labels.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_blank_headers_get_placeholders() {
        let row = vec![Cell::from(" Monto "), Cell::Empty, Cell::from("Estado")];
        let cleaned = HeaderRow::from_cells(&row);
        assert_eq!(cleaned.labels(), &["Monto", "Column_2", "Estado"]);
    }

    #[test]
    fn test_document_type_and_number_resolve_separately() {
        for labels in [
            ["Documento - Tipo", "Documento"],
            ["Documento", "Documento - Tipo"],
        ] {
            let h = headers(&labels);
            assert_eq!(
                find_best_match(&h, F::DocumentoTipo, LayoutTag::LayoutB).as_deref(),
                Some("Documento - Tipo")
            );
            assert_eq!(
                find_best_match(&h, F::Documento, LayoutTag::LayoutB).as_deref(),
                Some("Documento")
            );
        }
    }

    #[test]
    fn test_amount_skips_currency_column() {
        let h = headers(&["Monto - Moneda", "Monto"]);
        assert_eq!(
            find_best_match(&h, F::Monto, LayoutTag::LayoutB).as_deref(),
            Some("Monto")
        );
    }

    #[test]
    fn test_account_number_skips_type_and_name_columns() {
        let h = headers(&["Cuenta - T", "Cuenta - Nombre", "Cuenta - Número"]);
        assert_eq!(
            find_best_match(&h, F::CuentaNumero, LayoutTag::LayoutB).as_deref(),
            Some("Cuenta - Número")
        );
        assert_eq!(find_best_match(&h, F::Beneficiario, LayoutTag::LayoutB), None);
    }

    #[test]
    fn test_layout_a_field_map() {
        let h = headers(&[
            "Sel",
            "No.",
            "Cuenta",
            "Banco",
            "Titular(Archivo)",
            "Titular(Banco)",
            "Doc.Identidad",
            "Importe",
            "Situación",
        ]);
        let map = build_field_map(&h, LayoutTag::LayoutA);
        assert_eq!(map.get(F::Beneficiario), Some("Titular(Archivo)"));
        assert_eq!(map.get(F::CuentaNumero), Some("Cuenta"));
        assert_eq!(map.get(F::Monto), Some("Importe"));
        assert_eq!(map.get(F::Estado), Some("Situación"));
        assert_eq!(map.get(F::Documento), Some("Doc.Identidad"));
        assert_eq!(map.get(F::Observaciones), None);
    }

    #[test]
    fn test_short_headers_do_not_match_in_reverse() {
        let h = headers(&["Mo"]);
        assert_eq!(find_best_match(&h, F::Monto, LayoutTag::LayoutB), None);
        let h = headers(&["Obs"]);
        assert_eq!(
            find_best_match(&h, F::Observaciones, LayoutTag::LayoutB).as_deref(),
            Some("Obs")
        );
    }

    #[test]
    fn test_field_map_leaves_auxiliary_columns_unmapped() {
        let h = headers(&[
            "Beneficiario - Nombre",
            "Monto - Moneda",
            "Monto",
            "Cuenta - T",
            "Cuenta - Número",
        ]);
        let map = build_field_map(&h, LayoutTag::LayoutB);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(F::Monto), Some("Monto"));
        assert_eq!(map.get(F::CuentaNumero), Some("Cuenta - Número"));
        assert!(map.iter().all(|(_, label)| label != "Cuenta - T" && label != "Monto - Moneda"));
    }

    #[test]
    fn test_layout_a_header_found_by_signature() {
        let mut rows: Vec<Vec<&str>> = vec![vec!["BBVA"], vec![""], vec!["Fecha", "01/06/2024"]];
        rows.push(vec!["Sel", "No.", "Cuenta", "Titular(Archivo)", "Importe"]);
        let sheet = RawSheet::from_strings("Hoja1", &rows);

        let resolved = resolve_headers(
            &sheet,
            LayoutTag::LayoutA,
            &ParserSettings::default(),
            &MemorySink::new(),
        );
        assert_eq!(resolved.header_row_index, 3);
        assert_eq!(resolved.source, HeaderSource::Signature);
    }

    #[test]
    fn test_layout_a_fixed_row_fallback() {
        let mut rows: Vec<Vec<&str>> = vec![vec![""]; 30];
        rows[2] = vec!["Empresa", "ACME"];
        rows.push(vec!["Seleccion", "Numero", "Cta"]);
        let sheet = RawSheet::from_strings("Hoja1", &rows);
        let sink = MemorySink::new();

        let resolved = resolve_headers(&sheet, LayoutTag::LayoutA, &ParserSettings::default(), &sink);
        assert_eq!(resolved.header_row_index, 30);
        assert_eq!(resolved.source, HeaderSource::FixedRow);
        assert!(sink.contains(STAGE, "fallback"));
    }

    #[test]
    fn test_layout_b_header_needs_two_cells() {
        let rows = vec![
            vec!["Reporte de cuentas"],
            vec![""],
            vec!["Beneficiario", "Monto", "Estado"],
        ];
        let sheet = RawSheet::from_strings("Hoja1", &rows);
        let (index, source) =
            locate_header_row(&sheet, LayoutTag::LayoutB, &ParserSettings::default());
        assert_eq!(index, 2);
        assert_eq!(source, HeaderSource::Keywords);
    }

    #[test]
    fn test_layout_b_without_keywords_uses_first_row() {
        let rows = vec![vec!["Fecha", "Hora"], vec!["x", "y"]];
        let sheet = RawSheet::from_strings("Hoja1", &rows);
        let (index, source) =
            locate_header_row(&sheet, LayoutTag::LayoutB, &ParserSettings::default());
        assert_eq!((index, source), (0, HeaderSource::FirstRow));
    }
}
