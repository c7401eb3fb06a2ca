use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use crate::dataset::{Dataset, Value};
use crate::error::PipelineError;

/// Open the source database read-only. A missing file is not created.
pub fn connect(path: &Path) -> Result<Connection, PipelineError> {
    let unavailable = |reason: String| PipelineError::SourceUnavailable {
        path: path.to_path_buf(),
        reason,
    };
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| unavailable(e.to_string()))?;
    // open is lazy about the file header; touch the schema to fail early on garbage
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |r| r.get::<_, i64>(0))
        .map_err(|e| unavailable(e.to_string()))?;
    Ok(conn)
}

fn valid_identifier(name: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
        .is_match(name)
}

/// Every row and column of `table`, in whatever order the engine returns them.
pub fn fetch_table(conn: &Connection, table: &str) -> Result<Dataset, PipelineError> {
    let query_err = |reason: String| PipelineError::QueryError {
        table: table.to_string(),
        reason,
    };
    if !valid_identifier(table) {
        return Err(query_err("not a plain table identifier".into()));
    }

    let sql = format!("SELECT * FROM \"{}\"", table);
    let mut stmt = conn.prepare(&sql).map_err(|e| query_err(e.to_string()))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get_ref(i).map(|v| from_sql(v).to_field()))
                .collect::<Result<Vec<_>, _>>()
        })
        .map_err(|e| query_err(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| query_err(e.to_string()))?;

    Ok(Dataset::from_raw(columns, rows))
}

fn from_sql(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Text(b.iter().map(|x| format!("{:02x}", x)).collect()),
    }
}
