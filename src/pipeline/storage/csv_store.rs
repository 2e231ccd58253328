use std::path::Path;

use super::StorageError;
use crate::pipeline::structuring::types::Record;

/// Persists parsed records under a fixed header.
pub trait RecordSink: Send + Sync {
    /// Write `header` then one line per record, cells in header order.
    /// A record lacking a header column gets an empty cell; columns outside
    /// the header are not written.
    fn write(&self, records: &[Record], header: &[&str], destination: &Path)
        -> Result<(), StorageError>;
}

/// Writes RFC 4180 CSV files, creating parent directories as needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvRecordSink;

impl RecordSink for CsvRecordSink {
    fn write(
        &self,
        records: &[Record],
        header: &[&str],
        destination: &Path,
    ) -> Result<(), StorageError> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let csv_err = |source: csv::Error| StorageError::Csv {
            path: destination.to_path_buf(),
            source,
        };

        let mut writer = csv::Writer::from_path(destination).map_err(csv_err)?;
        writer.write_record(header).map_err(csv_err)?;

        for record in records {
            let extra = record
                .keys()
                .filter(|k| !header.contains(&k.as_str()))
                .count();
            if extra > 0 {
                tracing::debug!(
                    path = %destination.display(),
                    extra,
                    "Record carries columns outside the header; not written"
                );
            }

            let row = header
                .iter()
                .map(|col| record.get(*col).map(String::as_str).unwrap_or(""));
            writer.write_record(row).map_err(csv_err)?;
        }

        writer.flush()?;

        tracing::debug!(
            path = %destination.display(),
            rows = records.len(),
            "CSV artifact written"
        );
        Ok(())
    }
}
