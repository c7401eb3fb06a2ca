//! Runs extract → clean → load in order, handing each stage the artifact the
//! previous one produced.

use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::load::{self, DocumentSink, LoadReport};
use crate::settings::{RunSettings, Settings};
use crate::{extract, normalize};

/// Identity of one run, passed to every stage.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub owner: String,
}

impl RunContext {
    pub fn new(owner: &str) -> Self {
        let started_at = Utc::now();
        RunContext {
            run_id: format!("run-{}", started_at.format("%Y%m%dT%H%M%SZ")),
            started_at,
            owner: owner.to_string(),
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        RunContext::new("test")
    }
}

/// Extractor output: the raw dataset on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArtifact(PathBuf);

impl RawArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RawArtifact(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// Normalizer output: the cleaned dataset on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanArtifact(PathBuf);

impl CleanArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CleanArtifact(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct StageOutput<A> {
    pub artifact: A,
    pub rows: usize,
}

#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub raw: RawArtifact,
    pub clean: CleanArtifact,
    pub rows_extracted: usize,
    pub rows_cleaned: usize,
    pub load: LoadReport,
}

/// Call `f` up to `1 + retries` times, sleeping `retry_delay` between tries.
pub fn with_retries<T>(
    ctx: &RunContext,
    stage: &str,
    policy: &RunSettings,
    mut f: impl FnMut() -> Result<T, PipelineError>,
) -> Result<T, PipelineError> {
    let attempts = policy.retries + 1;
    let mut attempt = 1;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < attempts => {
                warn!(
                    run_id = %ctx.run_id,
                    stage,
                    attempt,
                    error_kind = e.kind(),
                    error = %e,
                    "stage failed, retrying in {}s",
                    policy.retry_delay_secs
                );
                thread::sleep(policy.retry_delay());
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Full chain. Artifacts from finished stages stay on disk if a later stage fails.
pub fn run_all(
    ctx: &RunContext,
    settings: &Settings,
    sink: &mut dyn DocumentSink,
) -> Result<RunSummary> {
    let policy = &settings.run;
    info!(
        run_id = %ctx.run_id,
        owner = %ctx.owner,
        schedule = %policy.schedule,
        timezone = %policy.timezone,
        start_date = %policy.start_date,
        "starting run"
    );

    let extracted = with_retries(ctx, "extract", policy, || {
        extract::run(ctx, &settings.source, &settings.artifacts.raw)
    })
    .context("extract stage failed")?;

    let cleaned = with_retries(ctx, "clean", policy, || {
        normalize::run(ctx, &extracted.artifact, &settings.artifacts.clean, &settings.cleaning)
    })
    .context("clean stage failed")?;

    let report = with_retries(ctx, "load", policy, || {
        load::run(ctx, &cleaned.artifact, &mut *sink, &settings.index)
    })
    .context("load stage failed")?;

    info!(
        run_id = %ctx.run_id,
        extracted = extracted.rows,
        cleaned = cleaned.rows,
        submitted = report.submitted,
        skipped = report.skipped,
        elapsed_ms = (Utc::now() - ctx.started_at).num_milliseconds(),
        "run finished"
    );

    Ok(RunSummary {
        run_id: ctx.run_id.clone(),
        raw: extracted.artifact,
        clean: cleaned.artifact,
        rows_extracted: extracted.rows,
        rows_cleaned: cleaned.rows,
        load: report,
    })
}
