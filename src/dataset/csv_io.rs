use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use tracing::debug;

use super::Dataset;
use crate::error::PipelineError;

/// Read a CSV artifact. The first row is the header; every other row must
/// have the same width.
pub fn read_artifact(path: &Path) -> Result<Dataset, PipelineError> {
    let file = File::open(path).map_err(|e| PipelineError::artifact(path, e))?;
    let ds = read_from(file, path)?;
    debug!(path = %path.display(), rows = ds.len(), cols = ds.columns.len(), "read artifact");
    Ok(ds)
}

pub fn read_from<R: Read>(reader: R, path: &Path) -> Result<Dataset, PipelineError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| PipelineError::malformed(path, e))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(PipelineError::malformed(path, "missing header row"));
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| PipelineError::malformed(path, e))?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    Ok(Dataset::from_raw(headers, rows))
}

/// Write `ds` to `path`, replacing any previous file only once the new one is
/// complete.
pub fn write_artifact(path: &Path, ds: &Dataset) -> Result<(), PipelineError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| PipelineError::artifact(dir, e))?;
    }

    let tmp = tmp_path(path);
    let written = write_csv(&tmp, ds);
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).map_err(|e| PipelineError::artifact(path, e))?;

    debug!(path = %path.display(), rows = ds.len(), "wrote artifact");
    Ok(())
}

fn write_csv(path: &Path, ds: &Dataset) -> Result<(), PipelineError> {
    let io_err = |e: csv::Error| PipelineError::artifact(path, e.into());

    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .map_err(io_err)?;
    wtr.write_record(&ds.columns).map_err(io_err)?;
    for row in &ds.rows {
        wtr.write_record(row.iter().map(|v| v.to_field()))
            .map_err(io_err)?;
    }
    wtr.flush().map_err(|e| PipelineError::artifact(path, e))?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
