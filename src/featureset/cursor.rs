use crate::error::{MssqlError, Result};
use crate::geometry::{MssqlGeometryParser, SpatialKind};
use crate::odbc::{
    CDataType, ConnectionHandle, DataIndicator, Diagnostics, GetData, HandleType, RowHandle,
    StatementHandle,
};
use crate::transcoder::Transcoder;
use crate::types::{AttributeDescriptor, AttributeType, LayerDescriptor, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{AttributeContext, MssqlFeature};

/// Size of the buffer string columns are read into, terminator included.
///
/// String columns are read in a single call, so longer values are truncated
/// to `STRING_BUFFER_CAPACITY - 1` bytes. Geometry columns query their length
/// first and are never truncated; string columns keep the single-shot read
/// and log a warning when a value is cut.
pub const STRING_BUFFER_CAPACITY: usize = 2048;

/// Owns a statement handle and frees it exactly once.
struct StatementGuard<S: StatementHandle> {
    stmt: Option<S>,
}

impl<S: StatementHandle> StatementGuard<S> {
    fn new(stmt: S) -> Self {
        Self { stmt: Some(stmt) }
    }

    fn get_mut(&mut self) -> Result<&mut S> {
        self.stmt.as_mut().ok_or(MssqlError::StatementClosed)
    }

    fn is_released(&self) -> bool {
        self.stmt.is_none()
    }

    fn release(&mut self) -> bool {
        match self.stmt.take() {
            Some(mut stmt) => {
                stmt.free();
                true
            }
            None => false,
        }
    }
}

impl<S: StatementHandle> Drop for StatementGuard<S> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Forward-only cursor turning result rows into [`MssqlFeature`]s.
///
/// Example:
/// ```
/// use mssql_featureset::{AttributeType, LayerDescriptor, MssqlFeatureset, SqliteConnection};
///
/// let conn = SqliteConnection::open_in_memory()?;
/// conn.connection()
///     .execute_batch("CREATE TABLE t (name TEXT); INSERT INTO t VALUES ('alpha');")?;
///
/// let descriptor = LayerDescriptor::new("utf-8").with_attribute("name", AttributeType::String);
/// let mut features = MssqlFeatureset::new(&conn, "SELECT name FROM t", &descriptor)?;
/// while let Some(feature) = features.next_feature()? {
///     assert_eq!(feature.id(), 1);
///     let name: Option<String> = feature.property("name")?;
///     assert_eq!(name.as_deref(), Some("alpha"));
/// }
/// # Ok::<(), mssql_featureset::MssqlError>(())
/// ```
pub struct MssqlFeatureset<S: StatementHandle> {
    stmt: StatementGuard<S>,
    descriptors: Vec<AttributeDescriptor>,
    context: Arc<AttributeContext>,
    transcoder: Transcoder,
    feature_id: i64,
    end_or_invalid_state: bool,
}

impl<S: StatementHandle> MssqlFeatureset<S> {
    /// Allocate a statement on `conn` and execute `sql`.
    ///
    /// On failure no statement is left allocated.
    pub fn new<'c, C>(conn: &'c C, sql: &str, descriptor: &LayerDescriptor) -> Result<Self>
    where
        C: ConnectionHandle<Statement<'c> = S>,
    {
        let transcoder = Transcoder::from_label(&descriptor.encoding)?;
        if descriptor.descriptors.len() > usize::from(u16::MAX) {
            return Err(MssqlError::Message(format!(
                "too many columns: {}",
                descriptor.descriptors.len()
            )));
        }

        let stmt = conn
            .alloc_statement()
            .map_err(|diagnostics| MssqlError::Odbc {
                operation: "could not allocate statement",
                handle: HandleType::Dbc,
                diagnostics,
            })?;
        let mut stmt = StatementGuard::new(stmt);
        stmt.get_mut()?
            .exec_direct(sql)
            .map_err(|d| stmt_error("could not execute statement", d))?;

        let context = Arc::new(AttributeContext::from_descriptor(descriptor));
        debug!(
            columns = context.len(),
            encoding = %descriptor.encoding,
            "opened feature cursor"
        );

        Ok(Self {
            stmt,
            descriptors: descriptor.descriptors.clone(),
            context,
            transcoder,
            feature_id: 1,
            end_or_invalid_state: false,
        })
    }

    pub fn context(&self) -> &Arc<AttributeContext> {
        &self.context
    }

    /// Fetch the next row as a feature, or `None` at the end of the result set.
    ///
    /// A failed column read or geometry decode aborts the row: no feature is
    /// returned, the identity is not consumed, and the next call moves on to
    /// the following row. A failed fetch ends the iteration.
    pub fn next_feature(&mut self) -> Result<Option<MssqlFeature>> {
        if self.stmt.is_released() {
            return Err(MssqlError::StatementClosed);
        }
        if self.end_or_invalid_state {
            return Ok(None);
        }

        let stmt = self.stmt.get_mut()?;
        let mut row = match stmt.fetch() {
            Ok(Some(row)) => row,
            Ok(None) => {
                self.end_or_invalid_state = true;
                return Ok(None);
            }
            Err(diagnostics) => {
                // The statement state is unknown after a failed fetch.
                self.end_or_invalid_state = true;
                return Err(stmt_error("could not fetch result", diagnostics));
            }
        };

        let mut feature = MssqlFeature::new(Arc::clone(&self.context), self.feature_id);
        for (idx, descriptor) in self.descriptors.iter().enumerate() {
            // Column count is bounded by u16::MAX in `new`.
            let column = (idx + 1) as u16;
            read_column(&mut row, column, idx, descriptor, self.transcoder, &mut feature)?;
        }

        self.feature_id += 1;
        Ok(Some(feature))
    }

    /// True once the result set is exhausted, a fetch failed, or the cursor
    /// was closed. Row-level errors leave it false.
    pub fn is_finished(&self) -> bool {
        self.end_or_invalid_state
    }

    /// Release the statement. Safe to call more than once.
    pub fn close(&mut self) {
        if self.stmt.release() {
            debug!(fetched = self.feature_id - 1, "closed feature cursor");
        }
        self.end_or_invalid_state = true;
    }
}

impl<S: StatementHandle> Iterator for MssqlFeatureset<S> {
    type Item = Result<MssqlFeature>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stmt.is_released() {
            return None;
        }
        self.next_feature().transpose()
    }
}

fn stmt_error(operation: &'static str, diagnostics: Diagnostics) -> MssqlError {
    MssqlError::Odbc {
        operation,
        handle: HandleType::Stmt,
        diagnostics,
    }
}

fn read_column<R: RowHandle>(
    row: &mut R,
    column: u16,
    slot: usize,
    descriptor: &AttributeDescriptor,
    transcoder: Transcoder,
    feature: &mut MssqlFeature,
) -> Result<()> {
    match &descriptor.attribute_type {
        AttributeType::String => {
            let mut buf = [0u8; STRING_BUFFER_CAPACITY];
            let read = row
                .get_data(column, CDataType::Char, &mut buf)
                .map_err(|d| stmt_error("could not get string data", d))?;
            let kept = match read.indicator {
                DataIndicator::Null => return Ok(()),
                DataIndicator::Length(len) => len.min(STRING_BUFFER_CAPACITY - 1),
                DataIndicator::NoTotal => STRING_BUFFER_CAPACITY - 1,
            };
            if read.truncated {
                warn!(
                    column = %descriptor.name,
                    indicator = ?read.indicator,
                    kept,
                    "string value exceeds the read buffer and was truncated"
                );
            }
            feature.put_at(slot, Value::String(transcoder.transcode(&buf[..kept])));
        }
        AttributeType::Integer => {
            let mut buf = [0u8; 8];
            let read = row
                .get_data(column, CDataType::SBigInt, &mut buf)
                .map_err(|d| stmt_error("could not get int data", d))?;
            if read.indicator != DataIndicator::Null {
                feature.put_at(slot, Value::Integer(i64::from_ne_bytes(buf)));
            }
        }
        AttributeType::Double => {
            let mut buf = [0u8; 8];
            let read = row
                .get_data(column, CDataType::Double, &mut buf)
                .map_err(|d| stmt_error("could not get double data", d))?;
            if read.indicator != DataIndicator::Null {
                feature.put_at(slot, Value::Double(f64::from_ne_bytes(buf)));
            }
        }
        AttributeType::Geometry => {
            read_geometry(row, column, descriptor, SpatialKind::Geometry, feature)?;
        }
        AttributeType::Geography => {
            read_geometry(row, column, descriptor, SpatialKind::Geography, feature)?;
        }
        AttributeType::Unknown(declared) => {
            warn!(
                column = %descriptor.name,
                declared_type = %declared,
                "unknown/unsupported datatype in column, leaving it unset"
            );
        }
    }
    Ok(())
}

fn read_geometry<R: RowHandle>(
    row: &mut R,
    column: u16,
    descriptor: &AttributeDescriptor,
    kind: SpatialKind,
    feature: &mut MssqlFeature,
) -> Result<()> {
    const LENGTH_FAILED: &str = "could not get geometry data - failed to get buffer length";

    // Only a truncated zero-length read with a known, non-zero length is usable. NULL
    // and empty values are unreadable.
    let sized = row
        .get_data(column, CDataType::Binary, &mut [])
        .map_err(|d| stmt_error(LENGTH_FAILED, d))?;
    let len = match sized {
        GetData {
            indicator: DataIndicator::Length(len),
            truncated: true,
        } if len > 0 => len,
        other => {
            debug!(column = %descriptor.name, reported = ?other, "unusable geometry length");
            return Err(stmt_error(LENGTH_FAILED, Vec::new()));
        }
    };

    // Lives for this call only, so every return path below releases it.
    let mut buf = vec![0u8; len];
    debug!(column = %descriptor.name, bytes = len, "allocated geometry buffer");

    let read = row
        .get_data(column, CDataType::Binary, &mut buf)
        .map_err(|d| stmt_error("could not get geometry data into buffer", d))?;
    let declared = match read.indicator {
        DataIndicator::Length(n) => n.min(len),
        DataIndicator::Null | DataIndicator::NoTotal => {
            return Err(stmt_error(
                "could not get geometry data into buffer",
                Vec::new(),
            ));
        }
    };

    let parsed = MssqlGeometryParser::new(kind)
        .parse(&buf[..declared])
        .map_err(|source| MssqlError::Geometry {
            column: descriptor.name.clone(),
            source,
        })?;
    for shape in parsed.shapes {
        feature.add_geometry(shape);
    }
    Ok(())
}
