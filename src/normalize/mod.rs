//! Cleaning stage: raw artifact in, cleaned artifact out.
//!
//! Steps, each on the previous step's output:
//!   1. lowercase headers
//!   2. rename `rank` to `unique_id`
//!   3. drop fully identical records (first occurrence wins)
//!   4. impute nulls: numeric columns get the median, text gets `Unknown`
//!   5. coerce `year` to a nullable integer
//!
//! `year` is left out of step 4 even when it parses as a float column: its
//! missing and unparseable cells end up null after step 5, never a median.
//!
//! Filling and coercion can make two surviving records identical, so the
//! duplicate filter runs once more before the result is written.

pub mod coerce;
pub mod impute;

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};

use crate::dataset::{csv_io, Dataset, Value};
use crate::error::PipelineError;
use crate::pipeline::{CleanArtifact, RawArtifact, RunContext, StageOutput};
use crate::settings::CleaningSettings;

use impute::Imputed;

const RENAMES: &[(&str, &str)] = &[("rank", "unique_id")];

#[derive(Debug, Default)]
pub struct CleanReport {
    pub rows_in: usize,
    pub duplicates_removed: usize,
    pub imputed: Vec<Imputed>,
    pub years_nulled: usize,
}

pub fn run(
    ctx: &RunContext,
    raw: &RawArtifact,
    dest: &Path,
    opts: &CleaningSettings,
) -> Result<StageOutput<CleanArtifact>, PipelineError> {
    let data = csv_io::read_artifact(raw.path())?;
    let (cleaned, report) = clean(data, opts)?;
    csv_io::write_artifact(dest, &cleaned)?;

    for imp in &report.imputed {
        debug!(column = %imp.column, filled = imp.filled, with = %imp.with, "imputed nulls");
    }
    info!(
        run_id = %ctx.run_id,
        rows_in = report.rows_in,
        rows_out = cleaned.len(),
        duplicates = report.duplicates_removed,
        imputed_columns = report.imputed.len(),
        years_nulled = report.years_nulled,
        path = %dest.display(),
        "cleaned dataset"
    );
    Ok(StageOutput {
        artifact: CleanArtifact::new(dest),
        rows: cleaned.len(),
    })
}

/// Apply every cleaning step to `data`.
pub fn clean(
    mut data: Dataset,
    opts: &CleaningSettings,
) -> Result<(Dataset, CleanReport), PipelineError> {
    let mut report = CleanReport {
        rows_in: data.len(),
        ..CleanReport::default()
    };

    data.columns = normalize_headers(&data.columns);
    report.duplicates_removed = drop_duplicates(&mut data);

    let year = data.column_index(coerce::YEAR_COLUMN);
    report.imputed = impute::fill_missing(&mut data, year, opts)?;
    if let Some(idx) = year {
        report.years_nulled = coerce::to_nullable_int(&mut data, idx);
    }

    report.duplicates_removed += drop_duplicates(&mut data);
    Ok((data, report))
}

/// Lowercase, apply renames, then suffix repeats (`a`, `a.1`, `a.2`).
pub fn normalize_headers(columns: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(columns.len());

    for col in columns {
        let lower = col.to_lowercase();
        let name = RENAMES
            .iter()
            .find(|(from, _)| *from == lower)
            .map(|(_, to)| to.to_string())
            .unwrap_or(lower);

        let mut candidate = name.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}.{}", name, n);
            n += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

/// Remove records identical to an earlier one. Returns how many were removed.
pub fn drop_duplicates(data: &mut Dataset) -> usize {
    let before = data.rows.len();
    let mut seen: HashSet<Vec<Option<String>>> = HashSet::with_capacity(before);
    data.rows.retain(|row| seen.insert(row.iter().map(row_key).collect()));
    before - data.rows.len()
}

fn row_key(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        other => Some(other.to_field()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnKind;
    use crate::settings::AllNullPolicy;
    use std::path::PathBuf;

    fn from_csv(text: &str) -> Dataset {
        csv_io::read_from(text.as_bytes(), Path::new("inline.csv")).unwrap()
    }

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    fn col(ds: &Dataset, name: &str) -> Vec<Value> {
        let idx = ds.column_index(name).unwrap();
        ds.column_values(idx).cloned().collect()
    }

    #[test]
    fn headers_lowercased_renamed_and_unique() {
        let cols: Vec<String> = ["Rank", "Title", "YEAR", "year", "Unique_ID"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            normalize_headers(&cols),
            vec!["unique_id", "title", "year", "year.1", "unique_id.1"]
        );
    }

    #[test]
    fn scenario_from_three_records() {
        let raw = from_csv("Rank,Year,Score\n1,2001,\n1,2001,\n2,bad,5.0\n");
        let (ds, report) = clean(raw, &CleaningSettings::default()).unwrap();

        assert_eq!(ds.columns, vec!["unique_id", "year", "score"]);
        assert_eq!(ds.len(), 2);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(col(&ds, "unique_id"), vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(col(&ds, "score"), vec![Value::Float(5.0), Value::Float(5.0)]);
        assert_eq!(col(&ds, "year"), vec![Value::Int(2001), Value::Null]);
        assert_eq!(report.years_nulled, 1);
    }

    #[test]
    fn median_taken_after_deduplication() {
        // with the duplicate 1.0 the median would be 1.0; without it, 5.5
        let raw = from_csv("id,v\na,1.0\na,1.0\nb,10.0\nc,\n");
        let (ds, _) = clean(raw, &CleaningSettings::default()).unwrap();
        assert_eq!(
            col(&ds, "v"),
            vec![Value::Float(1.0), Value::Float(10.0), Value::Float(5.5)]
        );
    }

    #[test]
    fn order_kept_and_first_occurrence_wins() {
        let raw = from_csv("k,v\nb,1\na,2\nb,1\nc,3\na,2\n");
        let (ds, _) = clean(raw, &CleaningSettings::default()).unwrap();
        let keys: Vec<Value> = col(&ds, "k");
        assert_eq!(
            keys,
            vec![
                Value::Text("b".into()),
                Value::Text("a".into()),
                Value::Text("c".into())
            ]
        );
    }

    #[test]
    fn rows_made_identical_by_filling_collapse() {
        let raw = from_csv("k,v\nx,5\nx,\n");
        let (ds, report) = clean(raw, &CleaningSettings::default()).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(report.duplicates_removed, 1);
    }

    #[test]
    fn numeric_year_is_not_imputed() {
        let raw = from_csv("title,year\na,2001.0\nb,\nc,1999.5\n");
        let (ds, _) = clean(raw, &CleaningSettings::default()).unwrap();
        assert_eq!(ds.kinds[1], ColumnKind::Integer);
        assert_eq!(
            col(&ds, "year"),
            vec![Value::Int(2001), Value::Null, Value::Int(1999)]
        );
    }

    #[test]
    fn fixture_satisfies_cleaned_invariants() {
        let raw = csv_io::read_artifact(&fixture("raw_rankings.csv")).unwrap();
        let (ds, _) = clean(raw, &CleaningSettings::default()).unwrap();

        assert!(ds.columns.iter().all(|c| c == &c.to_lowercase()));
        assert!(!ds.columns.iter().any(|c| c == "rank"));
        assert!(ds.columns.iter().any(|c| c == "unique_id"));
        let names: HashSet<&String> = ds.columns.iter().collect();
        assert_eq!(names.len(), ds.columns.len());

        let rows: HashSet<Vec<Option<String>>> = ds
            .rows
            .iter()
            .map(|r| r.iter().map(row_key).collect())
            .collect();
        assert_eq!(rows.len(), ds.len());

        let year = ds.column_index("year");
        for (idx, kind) in ds.kinds.iter().enumerate() {
            if Some(idx) == year {
                assert!(ds
                    .column_values(idx)
                    .all(|v| matches!(v, Value::Int(_) | Value::Null)));
            } else if kind.is_numeric() {
                assert_eq!(ds.null_count(idx), 0, "{}", ds.columns[idx]);
            } else {
                assert!(ds.column_values(idx).all(|v| matches!(v, Value::Text(_))));
            }
        }
    }

    #[test]
    fn imputed_text_cells_read_unknown() {
        let raw = csv_io::read_artifact(&fixture("raw_rankings.csv")).unwrap();
        let title = raw.column_index("Title").unwrap();
        let null_titles = raw.null_count(title);
        assert!(null_titles > 0);

        let (ds, report) = clean(raw, &CleaningSettings::default()).unwrap();
        let filled = report.imputed.iter().find(|i| i.column == "title").unwrap();
        assert_eq!(filled.with, Value::Text("Unknown".into()));
        assert!(col(&ds, "title")
            .iter()
            .any(|v| *v == Value::Text("Unknown".into())));
    }

    #[test]
    fn cleaning_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::for_tests();
        let opts = CleaningSettings::default();

        let first = dir.path().join("clean_1.csv");
        let second = dir.path().join("clean_2.csv");
        run(&ctx, &RawArtifact::new(fixture("raw_rankings.csv")), &first, &opts).unwrap();
        run(&ctx, &RawArtifact::new(&first), &second, &opts).unwrap();

        assert_eq!(
            std::fs::read_to_string(&first).unwrap(),
            std::fs::read_to_string(&second).unwrap()
        );
    }

    #[test]
    fn malformed_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.csv");
        let dest = dir.path().join("clean.csv");
        std::fs::write(&raw, "a,b\n1,2,3\n").unwrap();

        let err = run(
            &RunContext::for_tests(),
            &RawArtifact::new(&raw),
            &dest,
            &CleaningSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput { .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn null_and_nul_text_are_different_cells() {
        let mut ds = from_csv("k,t\na,\na,\0\n");
        assert_eq!(drop_duplicates(&mut ds), 0);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows[0][1], Value::Null);
        assert_eq!(ds.rows[1][1], Value::Text("\0".into()));
    }

    #[test]
    fn failed_clean_keeps_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.csv");
        let dest = dir.path().join("clean.csv");
        let previous = "unique_id,title\n1,Alpha\n";
        std::fs::write(&dest, previous).unwrap();
        std::fs::write(&raw, "a,b\n1,2,3\n").unwrap();

        let err = run(
            &RunContext::for_tests(),
            &RawArtifact::new(&raw),
            &dest,
            &CleaningSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput { .. }));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), previous);
    }

    #[test]
    fn all_null_column_under_fail_policy_aborts_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.csv");
        let dest = dir.path().join("clean.csv");
        let previous = "unique_id,title\n1,Alpha\n";
        std::fs::write(&dest, previous).unwrap();
        std::fs::write(&raw, "Rank,Votes,Title\n1,,a\n2,,b\n").unwrap();
        let strict = CleaningSettings {
            all_null_numeric: AllNullPolicy::Fail,
            ..CleaningSettings::default()
        };

        let err = run(&RunContext::for_tests(), &RawArtifact::new(&raw), &dest, &strict)
            .unwrap_err();
        assert!(matches!(err, PipelineError::ImputationError { ref column } if column == "votes"));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), previous);
    }
}
