use std::fmt;

use models::LayoutTag;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CorruptKind {
    /// The container signature is right but the workbook cannot be decoded.
    Damaged,
    /// The bytes do not look like any spreadsheet container.
    NotASpreadsheet,
}

impl fmt::Display for CorruptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorruptKind::Damaged => f.write_str(
                "The spreadsheet is damaged or incomplete; download the report from the bank again",
            ),
            CorruptKind::NotASpreadsheet => f.write_str(
                "The file is not an Excel spreadsheet; check that the bank report was selected",
            ),
        }
    }
}

/// Hard failures. The caller gets no records for the file.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unsupported file type '{declared}'; select a .xlsx or .xls file")]
    UnsupportedFormat { declared: String },

    #[error("{kind} ({detail})")]
    CorruptFile { kind: CorruptKind, detail: String },

    #[error("The file contains no data: {reason}")]
    EmptyFile { reason: String },
}

impl ParseError {
    pub fn corrupt(kind: CorruptKind, detail: impl Into<String>) -> Self {
        ParseError::CorruptFile {
            kind,
            detail: detail.into(),
        }
    }

    pub fn empty(reason: impl Into<String>) -> Self {
        ParseError::EmptyFile {
            reason: reason.into(),
        }
    }
}

/// Soft conditions reported next to a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseWarning {
    NoRecognizedLayout { assumed: LayoutTag },
    EmptyExtraction { layout: LayoutTag, sheet: String },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::NoRecognizedLayout { assumed } => write!(
                f,
                "No known header layout was found; the file was read as {assumed}"
            ),
            ParseWarning::EmptyExtraction { layout, sheet } => write!(
                f,
                "Sheet '{sheet}' was read as {layout} but no rows were extracted; review the file"
            ),
        }
    }
}
