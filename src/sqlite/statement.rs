use crate::odbc::{
    CDataType, DataIndicator, Diagnostics, GetData, RowHandle, StatementHandle, diagnostic,
    write_fixed,
};
use rusqlite::types::Value;
use std::borrow::Cow;
use std::collections::VecDeque;

use super::{diagnostics_from_sqlite, sql_select_page};

/// Forward-only statement over a SQLite connection.
///
/// The query is executed once per page of `page_size` rows and the page is
/// buffered, so a result set costs one query per page. Each page reflects the
/// database at the time it was read; the row order across pages is only
/// stable for queries with a deterministic order (e.g. an `ORDER BY`).
pub struct SqliteStatement<'c> {
    conn: &'c rusqlite::Connection,
    stmt: Option<rusqlite::Statement<'c>>,
    page_size: usize,
    offset: i64,
    page: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
    end_of_data: bool,
}

/// Current row of a [`SqliteStatement`].
pub struct SqliteRow<'r> {
    values: &'r [Value],
}

impl<'c> SqliteStatement<'c> {
    pub(super) fn new(conn: &'c rusqlite::Connection, page_size: usize) -> Self {
        Self {
            conn,
            stmt: None,
            page_size: page_size.max(1),
            offset: 0,
            page: VecDeque::new(),
            current: None,
            end_of_data: false,
        }
    }

    fn read_page(&mut self) -> Result<(), Diagnostics> {
        let stmt = self
            .stmt
            .as_mut()
            .ok_or_else(|| diagnostic("HY010", "Function sequence error"))?;
        let column_count = stmt.column_count();
        let mut rows = stmt
            .query((self.page_size as i64, self.offset))
            .map_err(diagnostics_from_sqlite)?;
        while let Some(row) = rows.next().map_err(diagnostics_from_sqlite)? {
            let values = (0..column_count)
                .map(|idx| row.get::<_, Value>(idx))
                .collect::<rusqlite::Result<Vec<Value>>>()
                .map_err(diagnostics_from_sqlite)?;
            self.page.push_back(values);
        }

        // A short page is the last one.
        if self.page.len() < self.page_size {
            self.end_of_data = true;
        }
        self.offset += self.page.len() as i64;
        Ok(())
    }
}

impl StatementHandle for SqliteStatement<'_> {
    type Row<'r>
        = SqliteRow<'r>
    where
        Self: 'r;

    fn exec_direct(&mut self, sql: &str) -> Result<(), Diagnostics> {
        let stmt = self
            .conn
            .prepare(&sql_select_page(sql))
            .map_err(diagnostics_from_sqlite)?;
        self.stmt = Some(stmt);
        self.offset = 0;
        self.page.clear();
        self.current = None;
        self.end_of_data = false;
        Ok(())
    }

    fn fetch(&mut self) -> Result<Option<SqliteRow<'_>>, Diagnostics> {
        self.current = None;
        if self.page.is_empty() && !self.end_of_data {
            self.read_page()?;
        }
        self.current = self.page.pop_front();
        Ok(self
            .current
            .as_deref()
            .map(|values| SqliteRow { values }))
    }

    fn free(&mut self) {
        self.stmt = None;
        self.page.clear();
        self.current = None;
        self.end_of_data = true;
    }
}

impl RowHandle for SqliteRow<'_> {
    fn get_data(
        &mut self,
        column: u16,
        target: CDataType,
        buf: &mut [u8],
    ) -> Result<GetData, Diagnostics> {
        let value = usize::from(column)
            .checked_sub(1)
            .and_then(|idx| self.values.get(idx))
            .ok_or_else(|| diagnostic("07009", format!("Invalid descriptor index {column}")))?;

        match (target, value) {
            (_, Value::Null) => Ok(GetData::null()),
            (CDataType::Char, value) => {
                let bytes: Cow<'_, [u8]> = match value {
                    Value::Text(text) => Cow::Borrowed(text.as_bytes()),
                    Value::Integer(v) => Cow::Owned(v.to_string().into_bytes()),
                    Value::Real(v) => Cow::Owned(v.to_string().into_bytes()),
                    Value::Blob(blob) => Cow::Owned(hex_upper(blob).into_bytes()),
                    Value::Null => Cow::Borrowed(&[]),
                };
                Ok(copy_char(&bytes, buf))
            }
            (CDataType::SBigInt, value) => {
                let v = match value {
                    Value::Integer(v) => *v,
                    Value::Real(v) => {
                        let truncated = v.trunc();
                        if !(i64::MIN as f64..=i64::MAX as f64).contains(&truncated) {
                            return Err(diagnostic("22003", "Numeric value out of range"));
                        }
                        truncated as i64
                    }
                    Value::Text(text) => text.trim().parse::<i64>().map_err(|_| {
                        diagnostic("22018", "Invalid character value for cast specification")
                    })?,
                    _ => return Err(restricted_type()),
                };
                write_fixed(buf, &v.to_ne_bytes())
            }
            (CDataType::Double, value) => {
                let v = match value {
                    Value::Integer(v) => *v as f64,
                    Value::Real(v) => *v,
                    Value::Text(text) => text.trim().parse::<f64>().map_err(|_| {
                        diagnostic("22018", "Invalid character value for cast specification")
                    })?,
                    _ => return Err(restricted_type()),
                };
                write_fixed(buf, &v.to_ne_bytes())
            }
            (CDataType::Binary, value) => {
                let bytes = match value {
                    Value::Blob(blob) => blob.as_slice(),
                    Value::Text(text) => text.as_bytes(),
                    _ => return Err(restricted_type()),
                };
                Ok(copy_binary(bytes, buf))
            }
        }
    }
}

fn restricted_type() -> Diagnostics {
    diagnostic("07006", "Restricted data type attribute violation")
}

fn copy_char(bytes: &[u8], buf: &mut [u8]) -> GetData {
    let len = bytes.len();
    if buf.is_empty() {
        return GetData::length(len, len > 0);
    }
    let n = len.min(buf.len() - 1);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf[n] = 0;
    GetData::length(len, n < len)
}

fn copy_binary(bytes: &[u8], buf: &mut [u8]) -> GetData {
    let n = bytes.len().min(buf.len());
    buf[..n].copy_from_slice(&bytes[..n]);
    GetData::length(bytes.len(), n < bytes.len())
}

fn hex_upper(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02X}");
    }
    out
}
