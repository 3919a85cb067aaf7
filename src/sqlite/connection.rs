use crate::error::{MssqlError, Result};
use crate::odbc::{ConnectionHandle, Diagnostics};
use rusqlite::OpenFlags;
use std::path::Path;

use super::SqliteStatement;

/// SQLite connection handing out ODBC-style statements.
#[derive(Debug)]
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    page_size: usize,
}

/// Rows buffered per query by the statements of a [`SqliteConnection`].
pub const DEFAULT_PAGE_SIZE: usize = 256;

impl SqliteConnection {
    /// Open a database in read-only mode.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = rusqlite::Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an existing database in read-write mode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MssqlError::Message(format!(
                "database file does not exist: {}",
                path.display()
            )));
        }

        let conn = rusqlite::Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    /// Open a transient in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already opened connection.
    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        Self {
            conn,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set how many rows a statement reads per query. Zero is treated as one.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Access the underlying connection, e.g. to load data.
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.conn
    }
}

impl ConnectionHandle for SqliteConnection {
    type Statement<'c>
        = SqliteStatement<'c>
    where
        Self: 'c;

    fn alloc_statement(&self) -> std::result::Result<SqliteStatement<'_>, Diagnostics> {
        Ok(SqliteStatement::new(&self.conn, self.page_size))
    }
}
