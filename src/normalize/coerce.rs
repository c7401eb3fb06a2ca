use crate::dataset::{ColumnKind, Dataset, Value};

pub const YEAR_COLUMN: &str = "year";

/// Turn column `idx` into a nullable integer column. Fractions are
/// truncated toward zero; anything unparseable, non-finite or out of `i64`
/// range becomes null. Returns how many non-null cells were nulled.
pub fn to_nullable_int(ds: &mut Dataset, idx: usize) -> usize {
    let mut nulled = 0;
    for row in ds.rows.iter_mut() {
        let cell = &mut row[idx];
        if cell.is_null() {
            continue;
        }
        *cell = match as_whole(cell) {
            Some(i) => Value::Int(i),
            None => {
                nulled += 1;
                Value::Null
            }
        };
    }
    ds.kinds[idx] = ColumnKind::Integer;
    nulled
}

fn as_whole(v: &Value) -> Option<i64> {
    match v {
        Value::Null => None,
        Value::Int(i) => Some(*i),
        Value::Float(f) => truncate(*f),
        Value::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate))
        }
    }
}

fn truncate(f: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
    let t = f.trunc();
    if t.is_finite() && t >= -LIMIT && t < LIMIT {
        Some(t as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_truncates() {
        assert_eq!(as_whole(&Value::Text(" 2001 ".into())), Some(2001));
        assert_eq!(as_whole(&Value::Text("2001.9".into())), Some(2001));
        assert_eq!(as_whole(&Value::Float(-3.7)), Some(-3));
        assert_eq!(as_whole(&Value::Text("bad".into())), None);
        assert_eq!(as_whole(&Value::Text("inf".into())), None);
        assert_eq!(as_whole(&Value::Float(1e300)), None);
    }

    #[test]
    fn text_year_column_becomes_nullable_int() {
        let mut ds = Dataset::from_raw(
            vec!["year".into()],
            vec![vec!["2001".into()], vec!["bad".into()], vec!["".into()]],
        );
        assert_eq!(ds.kinds[0], ColumnKind::Text);

        let nulled = to_nullable_int(&mut ds, 0);
        assert_eq!(nulled, 1);
        assert_eq!(ds.kinds[0], ColumnKind::Integer);
        assert_eq!(
            ds.rows.iter().map(|r| r[0].clone()).collect::<Vec<_>>(),
            vec![Value::Int(2001), Value::Null, Value::Null]
        );
    }
}
