use anyhow::{Context, Result};
use rust_xlsxwriter::Workbook;
use std::path::Path;
use tracing::info;

use crate::processor::TagRecord;

/// Column order of the exported sheet.
const COLUMNS: [&str; 4] = ["name", "path", "code", "tags"];

/// Write one worksheet with a header row and one row per record, in input
/// order, overwriting any existing file at `path`. IO failures propagate:
/// losing the export loses the whole run's output.
pub fn export_records(records: &[TagRecord], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, header) in COLUMNS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }

    for (row, record) in records.iter().enumerate() {
        let row = row as u32 + 1;
        worksheet.write_string(row, 0, record.name.as_str())?;
        worksheet.write_string(row, 1, record.path.as_str())?;
        worksheet.write_string(row, 2, record.code.as_str())?;
        worksheet.write_string(row, 3, record.tags.as_str())?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed to write spreadsheet to {}", path.display()))?;

    info!("Exported {} records to {}", records.len(), path.display());
    Ok(())
}
