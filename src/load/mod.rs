//! Loading stage: one index call per cleaned record, in record order.

pub mod elastic;

use std::collections::HashSet;

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Number, Value as Json};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::dataset::{csv_io, Dataset, Value};
use crate::error::PipelineError;
use crate::pipeline::{CleanArtifact, RunContext};
use crate::settings::{IdStrategy, IndexSettings, OnRecordError};

pub use elastic::ElasticClient;

/// Why a single document submission failed.
#[derive(Debug)]
pub enum SinkError {
    /// The endpoint could not be reached or is not serving.
    Unavailable(String),
    /// The endpoint answered but refused this document.
    Rejected { status: u16, reason: String },
}

/// Something that accepts index documents one at a time.
pub trait DocumentSink {
    fn endpoint(&self) -> String;

    /// Create or overwrite one document. `id: None` lets the index pick one.
    fn index_document(
        &mut self,
        index: &str,
        id: Option<&str>,
        body: &Json,
    ) -> Result<(), SinkError>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub submitted: usize,
    pub skipped: usize,
    /// Submissions whose id was already used earlier in this run; each one
    /// replaced the earlier document.
    pub repeated_ids: usize,
}

pub fn run(
    ctx: &RunContext,
    clean: &CleanArtifact,
    sink: &mut dyn DocumentSink,
    opts: &IndexSettings,
) -> Result<LoadReport, PipelineError> {
    let data = csv_io::read_artifact(clean.path())?;
    let mut report = LoadReport::default();
    if data.is_empty() {
        info!(
            run_id = %ctx.run_id,
            path = %clean.path().display(),
            "clean artifact has no rows; nothing to index"
        );
        return Ok(report);
    }

    let pb = ProgressBar::new(data.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} docs ({per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut used_ids: HashSet<String> = HashSet::new();
    for row in 0..data.len() {
        let body = to_document(&data, row);
        let id = document_id(&data, row, opts);
        if let Some(id) = &id {
            if !used_ids.insert(id.clone()) {
                warn!(
                    run_id = %ctx.run_id,
                    record = row,
                    id = %id,
                    "id already used in this run; the earlier document will be replaced"
                );
                report.repeated_ids += 1;
            }
        }

        match sink.index_document(&opts.name, id.as_deref(), &body) {
            Ok(()) => report.submitted += 1,
            Err(SinkError::Unavailable(reason)) => {
                pb.abandon();
                return Err(PipelineError::IndexUnavailable {
                    endpoint: sink.endpoint(),
                    reason,
                });
            }
            Err(SinkError::Rejected { status, reason }) => match opts.on_record_error {
                OnRecordError::Abort => {
                    pb.abandon();
                    return Err(PipelineError::DocumentRejected {
                        record: row,
                        status,
                        reason,
                    });
                }
                OnRecordError::Skip => {
                    warn!(
                        run_id = %ctx.run_id,
                        record = row,
                        status,
                        %reason,
                        "document rejected, skipping"
                    );
                    report.skipped += 1;
                }
            },
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        run_id = %ctx.run_id,
        index = %opts.name,
        endpoint = %sink.endpoint(),
        submitted = report.submitted,
        skipped = report.skipped,
        repeated_ids = report.repeated_ids,
        "loaded documents"
    );
    Ok(report)
}

/// Flat JSON object for one record. Non-finite floats become null.
pub fn to_document(data: &Dataset, row: usize) -> Json {
    let mut doc = Map::with_capacity(data.columns.len());
    for (name, value) in data.record(row) {
        let json = match value {
            Value::Null => Json::Null,
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
            Value::Text(s) => Json::String(s.clone()),
        };
        doc.insert(name.to_string(), json);
    }
    Json::Object(doc)
}

pub fn document_id(data: &Dataset, row: usize, opts: &IndexSettings) -> Option<String> {
    match opts.id_strategy {
        IdStrategy::Auto => None,
        IdStrategy::ContentHash => Some(content_hash(data, row)),
        // repeats in `id_column` overwrite earlier documents; `run` counts them
        IdStrategy::Column => {
            let from_column = data
                .column_index(&opts.id_column)
                .map(|idx| &data.rows[row][idx])
                .filter(|v| !v.is_null())
                .map(Value::to_field);
            Some(from_column.unwrap_or_else(|| content_hash(data, row)))
        }
    }
}

/// Hex SHA-256 of the record as a JSON array of `[name, cell]` pairs, cells
/// in artifact text form. JSON escaping keeps cell boundaries and null apart
/// from any text a cell can hold.
pub fn content_hash(data: &Dataset, row: usize) -> String {
    let pairs: Vec<Json> = data
        .record(row)
        .map(|(name, value)| {
            let cell = match value {
                Value::Null => Json::Null,
                other => Json::String(other.to_field()),
            };
            Json::Array(vec![Json::String(name.to_string()), cell])
        })
        .collect();
    let mut hasher = Sha256::new();
    hasher.update(Json::Array(pairs).to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}
