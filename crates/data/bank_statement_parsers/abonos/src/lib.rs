//! # Abonos parser
//!
//! Reads the disbursement ("abono") reports two banks export as Excel files
//! and turns them into [`AbonoRecord`]s.
//!
//! The two report shapes share no template: the header row floats, columns
//! are renamed between exports, labels repeat and footer text sits right
//! under the data. Each upload goes through the same pipeline:
//!
//! 1. [`workbook::read`] decodes the bytes into cell grids
//! 2. [`layout::detect`] picks the sheet and the layout
//! 3. [`headers::resolve_headers`] finds the header row and
//!    [`headers::build_field_map`] maps labels to fields
//! 4. [`duplicates::resolve_duplicates`] merges repeated columns (Layout B)
//! 5. [`rows::extract_rows`] bounds the data region and filters rows
//! 6. [`normalize::normalize`] builds the records
//!
//! Every stage reports to a [`DiagnosticSink`]; nothing is printed.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use logger::{DiagnosticSink, NoopSink};
use models::{AbonoRecord, LayoutTag, ParserSettings, SourceBatch};
use serde::Serialize;
use serde_json::json;

pub mod duplicates;
pub mod error;
pub mod headers;
pub mod layout;
pub mod normalize;
pub mod rows;
pub mod text;
pub mod workbook;

pub use error::{CorruptKind, ParseError, ParseWarning};

use crate::duplicates::ColumnPlan;
use crate::normalize::NormalizeOptions;
use crate::workbook::RawSheet;

/// Per-upload choices made by the caller.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Layout of the upload slot the file came from, if known.
    pub hint: Option<LayoutTag>,
    /// Bank tag for Layout B records; Layout A always uses its own.
    pub bank_override: Option<String>,
}

impl ParseOptions {
    pub fn with_hint(hint: LayoutTag) -> Self {
        Self {
            hint: Some(hint),
            bank_override: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParsedFile {
    pub file_name: String,
    pub sheet_name: String,
    pub sheet_index: usize,
    pub layout: LayoutTag,
    pub header_row_index: usize,
    pub records: Vec<AbonoRecord>,
    pub warnings: Vec<ParseWarning>,
}

impl ParsedFile {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_batch(self) -> SourceBatch {
        SourceBatch {
            source: self.file_name,
            records: self.records,
        }
    }
}

pub struct AbonosParser<S = NoopSink> {
    settings: ParserSettings,
    sink: S,
}

impl AbonosParser<NoopSink> {
    pub fn new(settings: ParserSettings) -> Self {
        Self {
            settings,
            sink: NoopSink,
        }
    }
}

impl Default for AbonosParser<NoopSink> {
    fn default() -> Self {
        Self::new(ParserSettings::default())
    }
}

impl<S: DiagnosticSink> AbonosParser<S> {
    pub fn with_sink(settings: ParserSettings, sink: S) -> Self {
        Self { settings, sink }
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Parses an uploaded file. `file_name` selects the reader by extension
    /// and becomes the records' `origen` and id prefix.
    pub fn parse_bytes(
        &self,
        bytes: &[u8],
        file_name: &str,
        options: &ParseOptions,
    ) -> Result<ParsedFile, ParseError> {
        let sheets = workbook::read(bytes, file_name, &self.sink)?;
        self.parse_sheets(&sheets, file_name, options)
    }

    pub fn parse_file<P: AsRef<Path>>(&self, path: P, options: &ParseOptions) -> Result<ParsedFile> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.parse_file_as(path, &file_name, options)
    }

    /// Like [`Self::parse_file`], with `file_name` standing in for the path's
    /// own name (see `utils::source_names`).
    pub fn parse_file_as<P: AsRef<Path>>(
        &self,
        path: P,
        file_name: &str,
        options: &ParseOptions,
    ) -> Result<ParsedFile> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;

        let parsed = self
            .parse_bytes(&bytes, file_name, options)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(parsed)
    }

    /// Runs detection and extraction over already decoded sheets.
    pub fn parse_sheets(
        &self,
        sheets: &[RawSheet],
        file_name: &str,
        options: &ParseOptions,
    ) -> Result<ParsedFile, ParseError> {
        let settings = &self.settings;
        let sink: &dyn DiagnosticSink = &self.sink;

        let detection = layout::detect(sheets, options.hint, settings, sink);
        let layout = detection.layout;
        let sheet = sheets
            .get(detection.sheet_index)
            .ok_or_else(|| ParseError::empty("the workbook has no sheets"))?;

        let mut warnings = Vec::new();
        if detection.is_fallback() {
            warnings.push(ParseWarning::NoRecognizedLayout { assumed: layout });
        }

        let resolved = headers::resolve_headers(sheet, layout, settings, sink);
        let plan = match layout {
            LayoutTag::LayoutA => ColumnPlan::identity(&resolved.headers),
            LayoutTag::LayoutB | LayoutTag::Unknown => {
                duplicates::resolve_duplicates(&resolved.headers, sink)
            }
        };
        let field_map = headers::build_field_map(plan.headers(), layout);
        sink.debug(
            headers::STAGE,
            "field map built",
            json!({ "fields": field_map }),
        );

        let rows = rows::extract_rows(
            sheet,
            resolved.header_row_index,
            layout,
            &plan,
            &field_map,
            settings,
            sink,
        );
        let records = normalize::normalize(
            &rows,
            layout,
            &field_map,
            &NormalizeOptions {
                source_file: file_name,
                bank_override: options.bank_override.as_deref(),
            },
            settings,
            sink,
        );

        if records.is_empty() {
            sink.warn(
                rows::STAGE,
                "no records extracted, the file needs a manual review",
                json!({"layout": layout, "sheet": sheet.name, "header_row": resolved.header_row_index}),
            );
            warnings.push(ParseWarning::EmptyExtraction {
                layout,
                sheet: sheet.name.clone(),
            });
        }

        Ok(ParsedFile {
            file_name: file_name.to_string(),
            sheet_name: sheet.name.clone(),
            sheet_index: detection.sheet_index,
            layout,
            header_row_index: resolved.header_row_index,
            records,
            warnings,
        })
    }
}
