//! CSV and XLSX serializations of combined records. Both return bytes; the
//! caller decides where they go.

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use models::AbonoRecord;
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook};

pub const CSV_HEADERS: [&str; 17] = [
    "Beneficiario",
    "Documento Tipo",
    "Documento",
    "Documento 2",
    "Documento 3",
    "Monto M/N",
    "Monto",
    "T/C",
    "Monto Abonado",
    "Monto Abonado 2",
    "Cuenta Tipo",
    "Cuenta Número",
    "Cuenta Nombre",
    "Estado",
    "Observaciones",
    "Banco",
    "Origen",
];

pub const XLSX_FILE_NAME: &str = "Carga_de_Abonos.xlsx";
pub const XLSX_SHEET_NAME: &str = "Carga de Abonos";

/// Title and width of each spreadsheet column.
const XLSX_COLUMNS: [(&str, f64); 7] = [
    ("ITEM", 8.0),
    ("BENEFICIARIO", 30.0),
    ("DOCUMENTO", 15.0),
    ("CUENTA", 20.0),
    ("MONTO", 15.0),
    ("ESTADO", 20.0),
    ("BANCO", 10.0),
];

const HEADER_FILL: u32 = 0x366092;
const HIGHLIGHT_BANK_FONT: u32 = 0x2563EB;
const OTHER_BANK_FONT: u32 = 0x7C3AED;

/// `abonos_<YYYY-MM-DD>.csv`
pub fn csv_file_name(date: NaiveDate) -> String {
    format!("abonos_{}.csv", date.format("%Y-%m-%d"))
}

/// Every value is double-quoted; quotes inside values are doubled.
pub fn to_csv_bytes(records: &[AbonoRecord]) -> Result<Vec<u8>> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    wtr.write_record(CSV_HEADERS)
        .context("Failed to write CSV header")?;
    for r in records {
        wtr.write_record([
            r.beneficiario.clone(),
            r.documento_tipo.clone(),
            r.documento.clone(),
            r.documento_2.clone(),
            r.documento_3.clone(),
            r.monto_mn.to_string(),
            r.monto.to_string(),
            r.tc.clone(),
            r.monto_abonado.to_string(),
            r.monto_abonado_2.to_string(),
            r.cuenta_tipo.clone(),
            r.cuenta_numero.clone(),
            r.cuenta_nombre.clone(),
            r.estado.clone(),
            r.observaciones.clone(),
            r.banco.clone(),
            r.origen.clone(),
        ])
        .with_context(|| format!("Failed to write CSV row for {}", r.id))?;
    }

    wtr.into_inner()
        .map_err(|e| anyhow!("Failed to finish CSV output: {}", e.error()))
}

/// First non-placeholder document of a record, for the single DOCUMENTO column.
fn display_document(r: &AbonoRecord) -> &str {
    [
        &r.documento,
        &r.documento_2,
        &r.documento_3,
        &r.documento_tipo,
    ]
    .into_iter()
    .map(|d| d.trim())
    .find(|d| !d.is_empty() && *d != "-")
    .unwrap_or("-")
}

/// Styled spreadsheet for bulk upload. Records of `highlight_bank` get a blue
/// bank cell, every other bank a purple one.
pub fn to_xlsx_bytes(records: &[AbonoRecord], highlight_bank: &str) -> Result<Vec<u8>> {
    if records.is_empty() {
        bail!("No records to export");
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(XLSX_SHEET_NAME)?;

    let cell = Format::new().set_border(FormatBorder::Thin);
    let header = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_border(FormatBorder::Thin);
    let amount = cell.clone().set_num_format("S/ #,##0.00");
    let highlight = cell.clone().set_font_color(Color::RGB(HIGHLIGHT_BANK_FONT));
    let other_bank = cell.clone().set_font_color(Color::RGB(OTHER_BANK_FONT));

    for (col, (title, width)) in XLSX_COLUMNS.iter().enumerate() {
        let col = col as u16;
        worksheet.set_column_width(col, *width)?;
        worksheet.write_string_with_format(0, col, *title, &header)?;
    }

    for (i, r) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        let bank_format = if r.banco == highlight_bank {
            &highlight
        } else {
            &other_bank
        };

        worksheet.write_number_with_format(row, 0, (i + 1) as f64, &cell)?;
        worksheet.write_string_with_format(row, 1, &r.beneficiario, &cell)?;
        worksheet.write_string_with_format(row, 2, display_document(r), &cell)?;
        worksheet.write_string_with_format(row, 3, &r.cuenta_numero, &cell)?;
        worksheet.write_number_with_format(row, 4, r.monto, &amount)?;
        worksheet.write_string_with_format(row, 5, &r.estado, &cell)?;
        worksheet.write_string_with_format(row, 6, &r.banco, bank_format)?;
    }

    let buffer = workbook
        .save_to_buffer()
        .context("Failed to build XLSX workbook")?;
    Ok(buffer)
}
