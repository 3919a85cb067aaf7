use odbc_api::buffers::Indicator;
use odbc_api::handles::StatementImpl;
use odbc_api::parameter::{VarBinarySliceMut, VarCharSliceMut};
use odbc_api::{Connection, Cursor, CursorImpl, CursorRow, Nullable};

use super::{
    CDataType, ConnectionHandle, DataIndicator, DiagnosticRecord, Diagnostics, GetData, RowHandle,
    StatementHandle, write_fixed,
};

/// Statement executed directly on an `odbc_api::Connection`.
///
/// The statement handle is allocated by `exec_direct` and released when the
/// cursor is dropped.
pub struct OdbcStatement<'c, 'env> {
    conn: &'c Connection<'env>,
    cursor: Option<CursorImpl<StatementImpl<'c>>>,
}

/// Current row of an [`OdbcStatement`].
pub struct OdbcRow<'r> {
    row: CursorRow<'r>,
}

impl<'env> ConnectionHandle for Connection<'env> {
    type Statement<'c>
        = OdbcStatement<'c, 'env>
    where
        Self: 'c;

    fn alloc_statement(&self) -> Result<OdbcStatement<'_, 'env>, Diagnostics> {
        Ok(OdbcStatement {
            conn: self,
            cursor: None,
        })
    }
}

impl<'c> StatementHandle for OdbcStatement<'c, '_> {
    type Row<'r>
        = OdbcRow<'r>
    where
        Self: 'r;

    fn exec_direct(&mut self, sql: &str) -> Result<(), Diagnostics> {
        self.cursor = None;
        let conn: &'c Connection<'_> = self.conn;
        // A statement without a result set simply fetches no rows.
        self.cursor = conn
            .execute(sql, (), None)
            .map_err(diagnostics_from_odbc)?;
        Ok(())
    }

    fn fetch(&mut self) -> Result<Option<OdbcRow<'_>>, Diagnostics> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        let row = cursor.next_row().map_err(diagnostics_from_odbc)?;
        Ok(row.map(|row| OdbcRow { row }))
    }

    fn free(&mut self) {
        self.cursor = None;
    }
}

impl RowHandle for OdbcRow<'_> {
    fn get_data(
        &mut self,
        column: u16,
        target: CDataType,
        buf: &mut [u8],
    ) -> Result<GetData, Diagnostics> {
        match target {
            CDataType::Char => {
                let capacity = buf.len().saturating_sub(1);
                let mut cell = VarCharSliceMut::from_buffer(&mut *buf, Indicator::NoTotal);
                self.row
                    .get_data(column, &mut cell)
                    .map_err(diagnostics_from_odbc)?;
                Ok(from_indicator(cell.indicator(), capacity))
            }
            CDataType::Binary => {
                let capacity = buf.len();
                let mut cell = VarBinarySliceMut::from_buffer(&mut *buf, Indicator::NoTotal);
                self.row
                    .get_data(column, &mut cell)
                    .map_err(diagnostics_from_odbc)?;
                Ok(from_indicator(cell.indicator(), capacity))
            }
            CDataType::SBigInt => {
                let mut value = Nullable::<i64>::null();
                self.row
                    .get_data(column, &mut value)
                    .map_err(diagnostics_from_odbc)?;
                match value.into_opt() {
                    Some(v) => write_fixed(buf, &v.to_ne_bytes()),
                    None => Ok(GetData::null()),
                }
            }
            CDataType::Double => {
                let mut value = Nullable::<f64>::null();
                self.row
                    .get_data(column, &mut value)
                    .map_err(diagnostics_from_odbc)?;
                match value.into_opt() {
                    Some(v) => write_fixed(buf, &v.to_ne_bytes()),
                    None => Ok(GetData::null()),
                }
            }
        }
    }
}

fn from_indicator(indicator: Indicator, capacity: usize) -> GetData {
    match indicator {
        Indicator::Null => GetData::null(),
        Indicator::NoTotal => GetData {
            indicator: DataIndicator::NoTotal,
            truncated: true,
        },
        Indicator::Length(len) => GetData::length(len, len > capacity),
    }
}

fn diagnostics_from_odbc(err: odbc_api::Error) -> Diagnostics {
    let (state, native_error) = match &err {
        odbc_api::Error::Diagnostics { record, .. } => {
            (record.state.as_str().to_string(), record.native_error)
        }
        _ => ("HY000".to_string(), 0),
    };
    vec![DiagnosticRecord::new(&state, native_error, err.to_string())]
}

#[cfg(test)]
mod tests {
    use super::from_indicator;
    use crate::odbc::{DataIndicator, GetData};
    use odbc_api::buffers::Indicator;

    #[test]
    fn maps_driver_indicators() {
        assert_eq!(from_indicator(Indicator::Null, 16), GetData::null());
        assert_eq!(from_indicator(Indicator::Length(5), 0), GetData::length(5, true));
        assert_eq!(from_indicator(Indicator::Length(5), 5), GetData::length(5, false));
        assert_eq!(
            from_indicator(Indicator::NoTotal, 16).indicator,
            DataIndicator::NoTotal
        );
    }
}
