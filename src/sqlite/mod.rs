//! Connection provider backed by rusqlite.
//!
//! This lets the feature cursor run against any SQLite database that stores
//! SQL Server spatial blobs, which is how the crate's tools and tests drive it.

mod connection;
mod statement;

pub use connection::{DEFAULT_PAGE_SIZE, SqliteConnection};
pub use statement::{SqliteRow, SqliteStatement};

use crate::odbc::{DiagnosticRecord, Diagnostics};

// Wrap a caller query so that each execution yields `?1` rows starting at `?2`.
pub(crate) fn sql_select_page(sql: &str) -> String {
    let sql = sql.trim().trim_end_matches(';').trim_end();
    format!("SELECT * FROM ({sql}) LIMIT ?1 OFFSET ?2")
}

pub(crate) fn diagnostics_from_sqlite(err: rusqlite::Error) -> Diagnostics {
    let native_error = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => failure.extended_code,
        _ => 0,
    };
    vec![DiagnosticRecord::new("HY000", native_error, err.to_string())]
}
