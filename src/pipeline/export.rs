use std::io::Write;
use std::path::Path;

use csv::{Terminator, WriterBuilder};
use log::{debug, info, warn};
use tempfile::NamedTempFile;

use crate::error::{RelayError, Result};
use crate::warehouse::{ResultSet, Warehouse};

/// Write `result` as CSV: one header line, then one line per row.
///
/// Fields containing the delimiter, quotes or line breaks are quoted.
/// NULLs become empty fields. Returns the number of data rows written.
pub fn write_csv<W: Write>(writer: W, result: &ResultSet) -> Result<u64> {
    let mut csv_writer = WriterBuilder::new().terminator(Terminator::Any(b'\n')).from_writer(writer);

    csv_writer.write_record(&result.columns).map_err(csv_error)?;

    let mut row_count = 0u64;
    for row in &result.rows {
        csv_writer
            .write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))
            .map_err(csv_error)?;
        row_count += 1;
    }

    csv_writer
        .flush()
        .map_err(|e| RelayError::io("Failed to flush CSV output", e))?;
    Ok(row_count)
}

fn csv_error(err: csv::Error) -> RelayError {
    if err.is_io_error() {
        match err.into_kind() {
            csv::ErrorKind::Io(e) => RelayError::io("Failed to write CSV output", e),
            other => RelayError::Query(format!("Failed to write CSV output: {:?}", other)),
        }
    } else {
        RelayError::Query(format!("Result row does not match schema: {}", err))
    }
}

/// A populated export on local disk.
///
/// Owns the temporary file: dropping or closing it deletes the file.
#[derive(Debug)]
pub struct ExportFile {
    file: NamedTempFile,
    row_count: u64,
}

impl ExportFile {
    /// Write `result` to a fresh `export-*.csv` file in the system temp directory.
    pub fn create(result: &ResultSet) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("export-")
            .suffix(".csv")
            .tempfile()
            .map_err(|e| RelayError::io("Failed to create temporary export file", e))?;

        let row_count = write_csv(file.as_file_mut(), result)?;
        debug!("Wrote {} rows to {}", row_count, file.path().display());

        Ok(Self { file, row_count })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Base name of the temporary file, used as the upload filename.
    pub fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "export.csv".to_string())
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Delete the file now, logging rather than failing if that goes wrong.
    pub fn close(self) {
        let path = self.path().to_path_buf();
        match self.file.close() {
            Ok(()) => debug!("Removed export file {}", path.display()),
            Err(e) => warn!("Failed to remove export file {}: {}", path.display(), e),
        }
    }
}

/// Runs the fixed query and materialises the result as a CSV file.
pub struct Exporter<W: Warehouse> {
    warehouse: W,
    query: String,
}

impl<W: Warehouse> Exporter<W> {
    pub fn new(warehouse: W, query: impl Into<String>) -> Self {
        Self {
            warehouse,
            query: query.into(),
        }
    }

    pub fn export(&self) -> Result<ExportFile> {
        let result = self.warehouse.query(&self.query)?;
        info!(
            "Query returned {} rows across {} columns",
            result.len(),
            result.columns.len()
        );

        ExportFile::create(&result)
    }
}
