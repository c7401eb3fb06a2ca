use std::path::Path;

use tracing::info;

use crate::dataset::csv_io;
use crate::db;
use crate::error::PipelineError;
use crate::pipeline::{RawArtifact, RunContext, StageOutput};
use crate::settings::SourceSettings;

/// Copy the whole source table into the raw artifact at `dest`.
///
/// The table is read completely before anything is written, so a failing
/// query leaves any previous artifact untouched.
pub fn run(
    ctx: &RunContext,
    source: &SourceSettings,
    dest: &Path,
) -> Result<StageOutput<RawArtifact>, PipelineError> {
    let conn = db::connect(&source.database)?;
    let data = db::fetch_table(&conn, &source.table)?;
    csv_io::write_artifact(dest, &data)?;

    info!(
        run_id = %ctx.run_id,
        table = %source.table,
        rows = data.len(),
        cols = data.columns.len(),
        path = %dest.display(),
        "extracted source table"
    );
    Ok(StageOutput {
        artifact: RawArtifact::new(dest),
        rows: data.len(),
    })
}
