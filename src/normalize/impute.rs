use tracing::warn;

use crate::dataset::{ColumnKind, Dataset, Value};
use crate::error::PipelineError;
use crate::settings::{AllNullPolicy, CleaningSettings};

/// One column's imputation.
#[derive(Debug, Clone, PartialEq)]
pub struct Imputed {
    pub column: String,
    pub filled: usize,
    pub with: Value,
}

/// Median of `values`, or `None` when empty.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Fill nulls column by column: numeric columns with their median, text
/// columns with the configured label. `skip` names a column left as is.
pub fn fill_missing(
    ds: &mut Dataset,
    skip: Option<usize>,
    opts: &CleaningSettings,
) -> Result<Vec<Imputed>, PipelineError> {
    let mut out = Vec::new();

    for idx in 0..ds.columns.len() {
        if Some(idx) == skip {
            continue;
        }
        let nulls = ds.null_count(idx);
        if nulls == 0 {
            continue;
        }

        let fill = if ds.kinds[idx].is_numeric() {
            let mut values: Vec<f64> = ds.column_values(idx).filter_map(Value::as_f64).collect();
            let Some(m) = median(&mut values) else {
                match opts.all_null_numeric {
                    AllNullPolicy::Fail => {
                        return Err(PipelineError::ImputationError {
                            column: ds.columns[idx].clone(),
                        })
                    }
                    AllNullPolicy::Leave => {
                        warn!(
                            column = %ds.columns[idx],
                            nulls,
                            "numeric column has no values; nulls left in place"
                        );
                        continue;
                    }
                }
            };
            numeric_fill(ds, idx, m)
        } else {
            Value::Text(opts.unknown_label.clone())
        };

        for row in ds.rows.iter_mut() {
            if row[idx].is_null() {
                row[idx] = fill.clone();
            }
        }
        out.push(Imputed {
            column: ds.columns[idx].clone(),
            filled: nulls,
            with: fill,
        });
    }

    Ok(out)
}

/// Value to fill column `idx` with. An integer column whose median is
/// fractional is promoted to float first.
fn numeric_fill(ds: &mut Dataset, idx: usize, median: f64) -> Value {
    match ds.kinds[idx] {
        ColumnKind::Integer if median.fract() == 0.0 => Value::Int(median as i64),
        ColumnKind::Integer => {
            ds.kinds[idx] = ColumnKind::Float;
            for row in ds.rows.iter_mut() {
                if let Value::Int(i) = row[idx] {
                    row[idx] = Value::Float(i as f64);
                }
            }
            Value::Float(median)
        }
        _ => Value::Float(median),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ds(cols: &[&str], rows: &[&[&str]]) -> Dataset {
        Dataset::from_raw(
            cols.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn numeric_gets_median_text_gets_unknown() {
        let mut d = ds(
            &["score", "title"],
            &[&["1.0", "a"], &["", ""], &["3.0", "c"], &["10.0", ""]],
        );
        let report = fill_missing(&mut d, None, &CleaningSettings::default()).unwrap();

        assert_eq!(d.rows[1][0], Value::Float(3.0));
        assert_eq!(d.rows[1][1], Value::Text("Unknown".into()));
        assert_eq!(d.rows[3][1], Value::Text("Unknown".into()));
        assert_eq!(report.len(), 2);
        assert_eq!(report[1].filled, 2);
    }

    #[test]
    fn integer_column_with_whole_median_stays_integer() {
        let mut d = ds(&["n"], &[&["1"], &[""], &["3"]]);
        fill_missing(&mut d, None, &CleaningSettings::default()).unwrap();
        assert_eq!(d.kinds[0], ColumnKind::Integer);
        assert_eq!(d.rows[1][0], Value::Int(2));
    }

    #[test]
    fn integer_column_with_fractional_median_becomes_float() {
        let mut d = ds(&["n"], &[&["1"], &[""], &["2"]]);
        fill_missing(&mut d, None, &CleaningSettings::default()).unwrap();
        assert_eq!(d.kinds[0], ColumnKind::Float);
        assert_eq!(d.rows[0][0], Value::Float(1.0));
        assert_eq!(d.rows[1][0], Value::Float(1.5));
    }

    #[test]
    fn all_null_numeric_column_follows_policy() {
        let mut d = ds(&["empty", "t"], &[&["", "x"], &["", "y"]]);
        fill_missing(&mut d, None, &CleaningSettings::default()).unwrap();
        assert!(d.rows.iter().all(|r| r[0].is_null()));

        let strict = CleaningSettings {
            all_null_numeric: AllNullPolicy::Fail,
            ..CleaningSettings::default()
        };
        let err = fill_missing(&mut d, None, &strict).unwrap_err();
        assert!(matches!(err, PipelineError::ImputationError { ref column } if column == "empty"));
    }

    #[test]
    fn skipped_column_is_untouched() {
        let mut d = ds(&["year", "n"], &[&["", "1"], &["2001", ""]]);
        fill_missing(&mut d, Some(0), &CleaningSettings::default()).unwrap();
        assert!(d.rows[0][0].is_null());
        assert_eq!(d.rows[1][1], Value::Int(1));
    }
}
