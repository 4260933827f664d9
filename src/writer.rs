// writer.rs
// Writes finalized tables as CSV files consumed by the data portal.

use std::fs;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use tracing::info;

use crate::errors::PipelineError;
use crate::table::Table;

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Writes `table` to `path` with a header row and no index column.
///
/// The file is first written next to the destination and renamed over it
/// once complete, so a failed run never leaves a truncated output behind.
pub fn write_table(path: impl AsRef<Path>, table: &Table) -> Result<(), PipelineError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    let staging = staging_path(path);

    let result = write_csv(&staging, table);
    if let Err(e) = result {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }
    fs::rename(&staging, path).map_err(|e| PipelineError::io(path, e))?;

    info!(path = %path.display(), rows = table.len(), "wrote statistics");
    Ok(())
}

fn write_csv(path: &Path, table: &Table) -> Result<(), PipelineError> {
    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .map_err(|e| PipelineError::csv(path, e))?;
    wtr.write_record(table.columns())
        .map_err(|e| PipelineError::csv(path, e))?;

    for row in table.rows() {
        wtr.write_record(row.iter().map(|v| v.to_field()))
            .map_err(|e| PipelineError::csv(path, e))?;
    }

    wtr.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}
