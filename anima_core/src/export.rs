//! CSV export of the activity journal.

use crate::{ActivityRecord, Result};
use std::fs::File;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    kind: String,
    recorded_on: String,
    recorded_at: String,
    xp_gained: u64,
    streak: u32,
}

impl From<&ActivityRecord> for CsvRow {
    fn from(record: &ActivityRecord) -> Self {
        CsvRow {
            id: record.id.to_string(),
            kind: record.kind.to_string(),
            recorded_on: record.recorded_on.format("%Y-%m-%d").to_string(),
            recorded_at: record.recorded_at.to_rfc3339(),
            xp_gained: record.xp_gained,
            streak: record.streak,
        }
    }
}

/// Write `records` to `csv_path`, replacing any previous export
///
/// The file is fsynced before returning. Returns the number of rows.
pub fn write_csv(records: &[ActivityRecord], csv_path: &Path) -> Result<usize> {
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(csv_path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(file);

    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} activities to {:?}", records.len(), csv_path);
    Ok(records.len())
}

/// Export every readable journal record to CSV
pub fn export_journal(journal_path: &Path, csv_path: &Path) -> Result<usize> {
    let records = crate::journal::read_records(journal_path)?;
    write_csv(&records, csv_path)
}
