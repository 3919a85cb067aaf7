//! ODBC-class handle operations consumed by the feature cursor.
//!
//! A connection provider implements [`ConnectionHandle`] and hands out
//! statements implementing [`StatementHandle`]. The shapes of these calls follow
//! `SQLAllocHandle`, `SQLExecDirect`, `SQLFetch`, `SQLGetData` and `SQLFreeStmt`:
//! every call is blocking and failures carry the diagnostic records of the
//! handle they were raised on. A fetched row is borrowed from its statement,
//! the way `odbc_api::Cursor::next_row` hands out a `CursorRow`.
//!
//! With the `odbc` feature, `odbc_api::Connection` implements
//! [`ConnectionHandle`] and reaches SQL Server through the system driver
//! manager.

#[cfg(feature = "odbc")]
mod driver;

#[cfg(feature = "odbc")]
pub use driver::{OdbcRow, OdbcStatement};

use std::fmt;

/// Handle kind a diagnostic was collected from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleType {
    /// Connection handle (`SQL_HANDLE_DBC`).
    Dbc,
    /// Statement handle (`SQL_HANDLE_STMT`).
    Stmt,
}

impl fmt::Display for HandleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dbc => write!(f, "SQL_HANDLE_DBC"),
            Self::Stmt => write!(f, "SQL_HANDLE_STMT"),
        }
    }
}

/// One diagnostic record (`SQLGetDiagRec`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticRecord {
    pub state: String,
    pub native_error: i32,
    pub message: String,
}

impl DiagnosticRecord {
    pub fn new(state: &str, native_error: i32, message: impl Into<String>) -> Self {
        Self {
            state: state.to_string(),
            native_error,
            message: message.into(),
        }
    }
}

impl fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] ({}) {}",
            self.state, self.native_error, self.message
        )
    }
}

/// Diagnostics returned by a failed handle operation.
pub type Diagnostics = Vec<DiagnosticRecord>;

/// Target C type of a `get_data` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CDataType {
    /// NUL-terminated narrow character data (`SQL_C_CHAR`).
    Char,
    /// 8-byte native-endian signed integer (`SQL_C_SBIGINT`).
    SBigInt,
    /// 8-byte native-endian float (`SQL_C_DOUBLE`).
    Double,
    /// Raw bytes (`SQL_C_BINARY`).
    Binary,
}

/// Length/indicator value reported by `get_data`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataIndicator {
    /// `SQL_NULL_DATA`
    Null,
    /// `SQL_NO_TOTAL`: the driver cannot tell how many bytes remain.
    NoTotal,
    /// Total length of the value in bytes, excluding any NUL terminator.
    Length(usize),
}

/// Successful outcome of `get_data`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GetData {
    pub indicator: DataIndicator,
    /// The value did not fit the target buffer (`SQL_SUCCESS_WITH_INFO`, `01004`).
    pub truncated: bool,
}

impl GetData {
    pub fn null() -> Self {
        Self {
            indicator: DataIndicator::Null,
            truncated: false,
        }
    }

    pub fn length(len: usize, truncated: bool) -> Self {
        Self {
            indicator: DataIndicator::Length(len),
            truncated,
        }
    }
}

/// An open connection able to allocate statements.
pub trait ConnectionHandle {
    type Statement<'c>: StatementHandle
    where
        Self: 'c;

    fn alloc_statement(&self) -> Result<Self::Statement<'_>, Diagnostics>;
}

/// A statement handle positioned on a forward-only result set.
pub trait StatementHandle {
    /// The current row, borrowed from the statement until the next fetch.
    type Row<'r>: RowHandle
    where
        Self: 'r;

    /// Execute `sql` directly, opening its result set.
    fn exec_direct(&mut self, sql: &str) -> Result<(), Diagnostics>;

    /// Advance to the next row; `None` is `SQL_NO_DATA`.
    fn fetch(&mut self) -> Result<Option<Self::Row<'_>>, Diagnostics>;

    /// Close the cursor and release the statement. Called once per handle.
    fn free(&mut self);
}

/// Column access on the row a statement is positioned on.
pub trait RowHandle {
    /// Read column `column` (1-based) into `buf`.
    ///
    /// An empty `buf` transfers nothing; a non-empty value then reports its
    /// length with `truncated` set, which lets callers size a buffer before allocating
    /// and read the whole value with the next call. `Char` reads reserve the
    /// last byte of `buf` for the NUL terminator.
    fn get_data(
        &mut self,
        column: u16,
        target: CDataType,
        buf: &mut [u8],
    ) -> Result<GetData, Diagnostics>;
}

pub(crate) fn diagnostic(state: &str, message: impl Into<String>) -> Diagnostics {
    vec![DiagnosticRecord::new(state, 0, message)]
}

/// Copy a fixed-size value, failing with `HY090` if `buf` cannot hold it.
pub(crate) fn write_fixed(buf: &mut [u8], bytes: &[u8; 8]) -> Result<GetData, Diagnostics> {
    if buf.len() < bytes.len() {
        return Err(diagnostic("HY090", "Invalid string or buffer length"));
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(GetData::length(bytes.len(), false))
}
