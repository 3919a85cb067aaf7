#![allow(dead_code)]

use mssql_featureset::odbc::{
    CDataType, ConnectionHandle, DiagnosticRecord, Diagnostics, GetData, RowHandle,
    StatementHandle,
};
use std::cell::Cell;

/// One column value of a scripted row.
#[derive(Clone, Debug)]
pub enum Field {
    Null,
    Text(String),
    Int(i64),
    Double(f64),
    Binary(Vec<u8>),
    /// Reports the length on the sizing read, fails on transfer.
    BinaryTransferFails(usize),
    /// Every read fails with this SQLSTATE.
    Fail(&'static str),
}

/// Connection whose statements replay fixed rows and count handle lifetimes.
#[derive(Default)]
pub struct ScriptedConnection {
    pub rows: Vec<Vec<Field>>,
    pub fail_alloc: bool,
    pub fail_exec: bool,
    pub fail_fetch_at: Option<usize>,
    pub allocated: Cell<usize>,
    pub freed: Cell<usize>,
}

impl ScriptedConnection {
    pub fn new(rows: Vec<Vec<Field>>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }
}

pub struct ScriptedStatement<'c> {
    conn: &'c ScriptedConnection,
    next_row: usize,
}

pub struct ScriptedRow<'r> {
    fields: &'r [Field],
}

impl ConnectionHandle for ScriptedConnection {
    type Statement<'c>
        = ScriptedStatement<'c>
    where
        Self: 'c;

    fn alloc_statement(&self) -> Result<ScriptedStatement<'_>, Diagnostics> {
        if self.fail_alloc {
            return Err(diagnostic("HY001", "Memory allocation error"));
        }
        self.allocated.set(self.allocated.get() + 1);
        Ok(ScriptedStatement {
            conn: self,
            next_row: 0,
        })
    }
}

impl StatementHandle for ScriptedStatement<'_> {
    type Row<'r>
        = ScriptedRow<'r>
    where
        Self: 'r;

    fn exec_direct(&mut self, _sql: &str) -> Result<(), Diagnostics> {
        if self.conn.fail_exec {
            return Err(diagnostic("42000", "Syntax error or access violation"));
        }
        Ok(())
    }

    fn fetch(&mut self) -> Result<Option<ScriptedRow<'_>>, Diagnostics> {
        if self.conn.fail_fetch_at == Some(self.next_row) {
            return Err(diagnostic("08S01", "Communication link failure"));
        }
        let Some(fields) = self.conn.rows.get(self.next_row) else {
            return Ok(None);
        };
        self.next_row += 1;
        Ok(Some(ScriptedRow { fields }))
    }

    fn free(&mut self) {
        self.conn.freed.set(self.conn.freed.get() + 1);
    }
}

impl RowHandle for ScriptedRow<'_> {
    fn get_data(
        &mut self,
        column: u16,
        target: CDataType,
        buf: &mut [u8],
    ) -> Result<GetData, Diagnostics> {
        let field = self
            .fields
            .get(usize::from(column) - 1)
            .ok_or_else(|| diagnostic("07009", "Invalid descriptor index"))?;

        match (field, target) {
            (Field::Null, _) => Ok(GetData::null()),
            (Field::Text(text), CDataType::Char) => {
                let bytes = text.as_bytes();
                if buf.is_empty() {
                    return Ok(GetData::length(bytes.len(), true));
                }
                let n = bytes.len().min(buf.len() - 1);
                buf[..n].copy_from_slice(&bytes[..n]);
                buf[n] = 0;
                Ok(GetData::length(bytes.len(), n < bytes.len()))
            }
            (Field::Int(v), CDataType::SBigInt) => {
                buf[..8].copy_from_slice(&v.to_ne_bytes());
                Ok(GetData::length(8, false))
            }
            (Field::Double(v), CDataType::Double) => {
                buf[..8].copy_from_slice(&v.to_ne_bytes());
                Ok(GetData::length(8, false))
            }
            (Field::Binary(bytes), CDataType::Binary) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(GetData::length(bytes.len(), n < bytes.len()))
            }
            (Field::BinaryTransferFails(len), CDataType::Binary) => {
                if buf.is_empty() {
                    Ok(GetData::length(*len, true))
                } else {
                    Err(diagnostic("HY000", "transfer interrupted"))
                }
            }
            (Field::Fail(state), _) => Err(diagnostic(state, "scripted failure")),
            _ => Err(diagnostic(
                "07006",
                "Restricted data type attribute violation",
            )),
        }
    }
}

fn diagnostic(state: &str, message: &str) -> Diagnostics {
    vec![DiagnosticRecord::new(state, 0, message)]
}

/// SQL Server serialization of `POINT (x y)` using the single-point shortcut,
/// zero-padded to `len` bytes.
pub fn padded_point_blob(x: f64, y: f64, len: usize) -> Vec<u8> {
    let mut blob = vec![0xE6, 0x10, 0x00, 0x00, 0x01, 0x0C];
    blob.extend_from_slice(&x.to_le_bytes());
    blob.extend_from_slice(&y.to_le_bytes());
    assert!(len >= blob.len());
    blob.resize(len, 0);
    blob
}

/// Serialization of a polygon with one exterior and one interior ring,
/// four closed points each.
pub fn polygon_with_hole_blob() -> Vec<u8> {
    let points = [
        (0.0_f64, 0.0_f64),
        (10.0, 0.0),
        (10.0, 10.0),
        (0.0, 0.0),
        (2.0, 1.0),
        (8.0, 1.0),
        (8.0, 7.0),
        (2.0, 1.0),
    ];
    let mut blob = vec![0xE6, 0x10, 0x00, 0x00, 0x01, 0x04];
    blob.extend_from_slice(&(points.len() as u32).to_le_bytes());
    for (x, y) in points {
        blob.extend_from_slice(&x.to_le_bytes());
        blob.extend_from_slice(&y.to_le_bytes());
    }
    // Figures: exterior ring at point 0, interior ring at point 4.
    blob.extend_from_slice(&2u32.to_le_bytes());
    blob.push(2);
    blob.extend_from_slice(&0u32.to_le_bytes());
    blob.push(0);
    blob.extend_from_slice(&4u32.to_le_bytes());
    // One polygon shape.
    blob.extend_from_slice(&1u32.to_le_bytes());
    blob.extend_from_slice(&(-1i32).to_le_bytes());
    blob.extend_from_slice(&0i32.to_le_bytes());
    blob.push(3);
    blob
}
