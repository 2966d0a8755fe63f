pub mod combine;
pub mod export;

// Re-export commonly used items
pub use crate::combine::{combine_batches, combine_batches_at, source_names, MergeStats};
pub use crate::export::{
    csv_file_name, to_csv_bytes, to_xlsx_bytes, CSV_HEADERS, XLSX_FILE_NAME, XLSX_SHEET_NAME,
};

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human-readable size with up to two decimals, e.g. `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut exponent = 0;
    let mut whole = bytes;
    while whole >= 1024 && exponent < SIZE_UNITS.len() - 1 {
        whole /= 1024;
        exponent += 1;
    }
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZE_UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(500), "500 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024 * 1024), "3072 GB");
    }
}
