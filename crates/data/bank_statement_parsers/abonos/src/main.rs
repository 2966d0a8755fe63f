use std::fs;
use std::path::{Path, PathBuf};

use abonos::{AbonosParser, ParseOptions};
use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use logger::{init_tracing, TracingSink};
use models::LayoutTag;

/// Reads bank disbursement reports and writes a combined export.
#[derive(Debug, Parser)]
#[command(name = "abonos", author, version, about = "Combine bank disbursement reports", long_about = None)]
struct Args {
    /// Report uploaded in the Layout A slot
    #[arg(long = "layout-a", value_name = "FILE")]
    layout_a: Option<PathBuf>,

    /// Report uploaded in the Layout B slot
    #[arg(long = "layout-b", value_name = "FILE")]
    layout_b: Option<PathBuf>,

    /// Reports whose layout is inferred (repeatable)
    #[arg(long = "auto", value_name = "FILE")]
    auto: Vec<PathBuf>,

    /// Bank tag for Layout B records
    #[arg(long = "bank")]
    bank: Option<String>,

    /// Settings JSON (optional). Defaults are used when omitted
    #[arg(short = 's', long = "settings")]
    settings: Option<PathBuf>,

    /// Write the combined CSV here (a directory gets abonos_<date>.csv)
    #[arg(long = "csv")]
    csv: Option<PathBuf>,

    /// Write the combined XLSX here (a directory gets Carga_de_Abonos.xlsx)
    #[arg(long = "xlsx")]
    xlsx: Option<PathBuf>,

    /// Print the combined result as JSON
    #[arg(long = "json")]
    json: bool,
}

fn main() -> Result<()> {
    init_tracing("warn");
    let args = Args::parse();

    let settings = settings_loader::load_optional_settings(args.settings.as_ref())?;
    let highlight_bank = settings.layout_a_bank.clone();
    let parser = AbonosParser::with_sink(settings, TracingSink);

    let mut uploads: Vec<(PathBuf, Option<LayoutTag>)> = Vec::new();
    if let Some(path) = &args.layout_a {
        uploads.push((path.clone(), Some(LayoutTag::LayoutA)));
    }
    if let Some(path) = &args.layout_b {
        uploads.push((path.clone(), Some(LayoutTag::LayoutB)));
    }
    uploads.extend(args.auto.iter().map(|p| (p.clone(), None)));

    if uploads.is_empty() {
        bail!("No input files. Use --layout-a, --layout-b or --auto");
    }

    // Two slots may hold different files with the same name.
    let paths: Vec<&PathBuf> = uploads.iter().map(|(p, _)| p).collect();
    let names = utils::source_names(&paths);

    let mut batches = Vec::new();
    for ((path, hint), name) in uploads.iter().zip(&names) {
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        println!("📄 {} ({})", path.display(), utils::format_file_size(size));
        if path.file_name().is_some_and(|n| n.to_string_lossy() != name.as_str()) {
            println!("   Named {name} to keep its records apart");
        }

        let options = ParseOptions {
            hint: *hint,
            bank_override: args.bank.clone(),
        };
        match parser.parse_file_as(path, name, &options) {
            Ok(parsed) => {
                println!(
                    "   {} on sheet '{}', header row {}: {} records",
                    parsed.layout,
                    parsed.sheet_name,
                    parsed.header_row_index + 1,
                    parsed.records.len()
                );
                for warning in &parsed.warnings {
                    println!("   ⚠️  {warning}");
                }
                batches.push(parsed.into_batch());
            }
            // One bad file does not stop the others.
            Err(e) => println!("   ❌ {e:#}"),
        }
    }

    let (combined, stats) = utils::combine_batches(batches);
    println!("\n✅ Combined {} records from {} file(s)", combined.total_records, combined.sources.len());
    if stats.has_duplicates() {
        println!("   ⚠️  Skipped {} record(s) from a file uploaded twice", stats.skipped);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&combined)?);
    }

    if let Some(target) = &args.csv {
        let path = output_path(target, &utils::csv_file_name(Local::now().date_naive()));
        let bytes = utils::to_csv_bytes(&combined.records)?;
        fs::write(&path, bytes).with_context(|| format!("Cannot write {}", path.display()))?;
        println!("💾 CSV written to {}", path.display());
    }

    if let Some(target) = &args.xlsx {
        if combined.records.is_empty() {
            println!("   No records, XLSX not written");
        } else {
            let path = output_path(target, utils::XLSX_FILE_NAME);
            let bytes = utils::to_xlsx_bytes(&combined.records, &highlight_bank)?;
            fs::write(&path, bytes).with_context(|| format!("Cannot write {}", path.display()))?;
            println!("💾 XLSX written to {}", path.display());
        }
    }

    Ok(())
}

fn output_path(target: &Path, default_name: &str) -> PathBuf {
    if target.is_dir() {
        target.join(default_name)
    } else {
        target.to_path_buf()
    }
}
