use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// Layout and field vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutTag {
	LayoutA,
	LayoutB,
	Unknown,
}

impl LayoutTag {
	pub fn as_str(&self) -> &'static str {
		match self {
			LayoutTag::LayoutA => "LayoutA",
			LayoutTag::LayoutB => "LayoutB",
			LayoutTag::Unknown => "Unknown",
		}
	}
}

impl fmt::Display for LayoutTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Logical attributes of [`AbonoRecord`] that a header can be mapped to.
/// The remaining record columns have no source column in either layout and
/// keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
	Beneficiario,
	DocumentoTipo,
	Documento,
	Monto,
	CuentaNumero,
	Estado,
	Observaciones,
}

impl CanonicalField {
	pub const ALL: [CanonicalField; 7] = [
		CanonicalField::Beneficiario,
		CanonicalField::DocumentoTipo,
		CanonicalField::Documento,
		CanonicalField::Monto,
		CanonicalField::CuentaNumero,
		CanonicalField::Estado,
		CanonicalField::Observaciones,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			CanonicalField::Beneficiario => "beneficiario",
			CanonicalField::DocumentoTipo => "documento_tipo",
			CanonicalField::Documento => "documento",
			CanonicalField::Monto => "monto",
			CanonicalField::CuentaNumero => "cuenta_numero",
			CanonicalField::Estado => "estado",
			CanonicalField::Observaciones => "observaciones",
		}
	}
}

// Output records
/// One normalized disbursement ("abono") entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbonoRecord {
	pub id: String,
	pub beneficiario: String,
	pub documento_tipo: String,
	pub documento: String,
	pub documento_2: String,
	pub documento_3: String,
	pub monto_mn: f64,
	pub monto: f64,
	pub tc: String,
	pub monto_abonado: f64,
	pub monto_abonado_2: f64,
	pub cuenta_tipo: String,
	pub cuenta_numero: String,
	pub cuenta_nombre: String,
	/// Bank-specific free text; success/failure classification belongs to the presentation layer.
	pub estado: String,
	pub observaciones: String,
	pub banco: String,
	pub origen: String,
}

impl AbonoRecord {
	/// A record is kept only if it carries a payee, a positive amount, a status or an account.
	pub fn is_retained(&self) -> bool {
		!self.beneficiario.is_empty()
			|| self.monto > 0.0
			|| !self.estado.is_empty()
			|| !self.cuenta_numero.is_empty()
	}
}

/// Records produced from a single source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBatch {
	pub source: String,
	pub records: Vec<AbonoRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedResult {
	pub records: Vec<AbonoRecord>,
	pub total_records: usize,
	pub sources: Vec<String>,
	pub processed_at: DateTime<Utc>,
}

// Settings models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankHint {
	/// Lowercase substring searched in the source file name.
	pub needle: String,
	pub bank: String,
}

/// Tunables of the header-discovery engine. Every field has a default, so a
/// settings file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
	/// Rows scanned per sheet when inferring the layout.
	pub detection_scan_rows: usize,
	/// Rows scanned for a Layout B header row.
	pub layout_b_header_scan_rows: usize,
	/// Header row used for Layout A when no signature row exists. Fallback only.
	pub layout_a_fallback_header_row: usize,
	/// Maximum data rows after the Layout A header when no footer sentinel is found.
	pub layout_a_max_rows: usize,
	/// Lowercase, accent-free phrases that close the Layout A table.
	pub footer_sentinels: Vec<String>,
	pub layout_a_bank: String,
	pub layout_b_bank: String,
	pub bank_filename_hints: Vec<BankHint>,
	/// Map `documento` for Layout A from the identity column instead of leaving it blank.
	pub layout_a_documents: bool,
}

impl Default for ParserSettings {
	fn default() -> Self {
		Self {
			detection_scan_rows: 50,
			layout_b_header_scan_rows: 20,
			layout_a_fallback_header_row: 30,
			layout_a_max_rows: 100,
			footer_sentinels: vec!["estimado cliente".to_string()],
			layout_a_bank: "BBVA".to_string(),
			layout_b_bank: "BCP".to_string(),
			bank_filename_hints: vec![
				BankHint {
					needle: "bbva".to_string(),
					bank: "BBVA".to_string(),
				},
				BankHint {
					needle: "bcp".to_string(),
					bank: "BCP".to_string(),
				},
			],
			layout_a_documents: false,
		}
	}
}

impl ParserSettings {
	/// Bank tag inferred from a file name, if any hint matches.
	pub fn bank_for_filename(&self, file_name: &str) -> Option<&str> {
		let lower = file_name.to_lowercase();
		self.bank_filename_hints
			.iter()
			.find(|h| !h.needle.is_empty() && lower.contains(&h.needle))
			.map(|h| h.bank.as_str())
	}
}
