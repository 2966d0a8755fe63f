//! Workbook reader: turns the bytes of a `.xlsx` / `.xls` upload into plain
//! cell grids, one per sheet, with absolute row and column indices.

use std::io::{Cursor, Read, Seek};

use calamine::{Data, Range, Reader, Xls, Xlsx};
use logger::DiagnosticSink;
use serde_json::json;

use crate::error::{CorruptKind, ParseError};

pub const STAGE: &str = "workbook_reader";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Text(b.to_string()),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            other => Cell::Text(other.to_string()),
        }
    }

    /// Trimmed text of the cell. Whole numbers render without a decimal part.
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => format_number(*n),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

pub type RawGrid = Vec<Vec<Cell>>;

#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub rows: RawGrid,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, rows: RawGrid) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Builds a sheet from string rows; `""` becomes an empty cell.
    pub fn from_strings(name: impl Into<String>, rows: &[Vec<&str>]) -> Self {
        let grid = rows
            .iter()
            .map(|row| row.iter().map(|s| Cell::from(*s)).collect())
            .collect();
        Self::new(name, grid)
    }

    fn from_range(name: String, range: &Range<Data>) -> Self {
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut rows: RawGrid = vec![Vec::new(); row_offset];
        for row in range.rows() {
            let mut cells = vec![Cell::Empty; col_offset];
            cells.extend(row.iter().map(Cell::from_data));
            rows.push(cells);
        }
        Self { name, rows }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn is_blank(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(Cell::is_blank))
    }
}

/// Number of non-blank cells in a row.
pub fn filled_cells(row: &[Cell]) -> usize {
    row.iter().filter(|c| !c.is_blank()).count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Xlsx,
    Xls,
}

impl SourceFormat {
    /// Accepts a file name, a bare extension or a MIME type.
    pub fn from_declared(declared: &str) -> Result<Self, ParseError> {
        let lowered = declared.trim().to_lowercase();
        let unsupported = || ParseError::UnsupportedFormat {
            declared: declared.trim().to_string(),
        };

        if lowered.contains('/') {
            return match lowered.as_str() {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                | "application/vnd.ms-excel.sheet.macroenabled.12" => Ok(SourceFormat::Xlsx),
                "application/vnd.ms-excel" => Ok(SourceFormat::Xls),
                _ => Err(unsupported()),
            };
        }

        let extension = lowered.rsplit('.').next().unwrap_or_default();
        match extension {
            "xlsx" | "xlsm" => Ok(SourceFormat::Xlsx),
            "xls" => Ok(SourceFormat::Xls),
            _ => Err(unsupported()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Xlsx => "xlsx",
            SourceFormat::Xls => "xls",
        }
    }

    fn other(self) -> Self {
        match self {
            SourceFormat::Xlsx => SourceFormat::Xls,
            SourceFormat::Xls => SourceFormat::Xlsx,
        }
    }

    fn signature_matches(self, bytes: &[u8]) -> bool {
        match self {
            SourceFormat::Xlsx => bytes.starts_with(ZIP_MAGIC),
            SourceFormat::Xls => bytes.starts_with(OLE_MAGIC),
        }
    }
}

/// Reads every sheet of the workbook in `bytes`.
///
/// Dispatch follows the declared extension or MIME type. If that container
/// cannot be opened but the bytes carry the other container's signature, the
/// other reader is tried once.
pub fn read(
    bytes: &[u8],
    declared: &str,
    sink: &dyn DiagnosticSink,
) -> Result<Vec<RawSheet>, ParseError> {
    let format = SourceFormat::from_declared(declared)?;
    if bytes.is_empty() {
        return Err(ParseError::empty("the upload has zero bytes"));
    }

    let sheets = match open_sheets(format, bytes) {
        Ok(sheets) => sheets,
        Err(detail) => {
            let other = format.other();
            if !format.signature_matches(bytes) && other.signature_matches(bytes) {
                sink.warn(
                    STAGE,
                    "declared format does not match the file contents, retrying",
                    json!({"declared": format.as_str(), "detected": other.as_str(), "error": detail}),
                );
                open_sheets(other, bytes).map_err(|d| classify(other, bytes, d))?
            } else {
                return Err(classify(format, bytes, detail));
            }
        }
    };

    if sheets.is_empty() {
        return Err(ParseError::empty("the workbook has no sheets"));
    }
    if sheets.iter().all(RawSheet::is_blank) {
        return Err(ParseError::empty("every sheet is blank"));
    }

    sink.info(
        STAGE,
        "workbook opened",
        json!({
            "sheets": sheets
                .iter()
                .map(|s| json!({"name": s.name, "rows": s.height(), "cols": s.width()}))
                .collect::<Vec<_>>(),
        }),
    );
    Ok(sheets)
}

fn classify(format: SourceFormat, bytes: &[u8], detail: String) -> ParseError {
    let kind = if format.signature_matches(bytes) {
        CorruptKind::Damaged
    } else {
        CorruptKind::NotASpreadsheet
    };
    ParseError::corrupt(kind, detail)
}

fn open_sheets(format: SourceFormat, bytes: &[u8]) -> Result<Vec<RawSheet>, String> {
    let cursor = Cursor::new(bytes);
    match format {
        SourceFormat::Xlsx => {
            let mut workbook: Xlsx<_> = Xlsx::new(cursor).map_err(|e| e.to_string())?;
            collect_sheets(&mut workbook)
        }
        SourceFormat::Xls => {
            let mut workbook: Xls<_> = Xls::new(cursor).map_err(|e| e.to_string())?;
            collect_sheets(&mut workbook)
        }
    }
}

fn collect_sheets<RS, R>(workbook: &mut R) -> Result<Vec<RawSheet>, String>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    let names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| format!("sheet '{name}': {e}"))?;
        sheets.push(RawSheet::from_range(name, &range));
    }
    Ok(sheets)
}
