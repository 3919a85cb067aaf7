use crate::odbc::{DiagnosticRecord, HandleType};
use std::error::Error;
use std::fmt;

/// Crate error type for cursor and decoder operations.
#[derive(Debug)]
pub enum MssqlError {
    /// An ODBC-class operation failed. `operation` names the call that failed,
    /// `handle` the handle the diagnostics were collected from.
    Odbc {
        operation: &'static str,
        handle: HandleType,
        diagnostics: Vec<DiagnosticRecord>,
    },
    /// A geometry column could not be decoded.
    Geometry {
        column: String,
        source: GeometryError,
    },
    /// Wraps errors returned by `rusqlite` while opening a connection.
    Sql(rusqlite::Error),
    /// Wraps errors returned by the `wkb` crate.
    Wkb(wkb::error::WkbError),
    /// The layer descriptor names a text encoding the transcoder cannot handle.
    UnsupportedEncoding(String),
    /// Dynamic `Value` type did not match the expected conversion target.
    ValueTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    /// Requested attribute does not exist in the attribute context.
    MissingAttribute {
        attribute: String,
    },
    /// Requested geometry part does not exist in the feature.
    MissingGeometry {
        index: usize,
    },
    /// The statement has already been released.
    StatementClosed,
    Message(String),
}

impl fmt::Display for MssqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Odbc {
                operation,
                handle,
                diagnostics,
            } => {
                write!(f, "{operation} ({handle})")?;
                for record in diagnostics {
                    write!(f, ": {record}")?;
                }
                Ok(())
            }
            Self::Geometry { column, source } => {
                write!(f, "could not decode geometry in column '{column}': {source}")
            }
            Self::Sql(err) => write!(f, "{err}"),
            Self::Wkb(err) => write!(f, "{err}"),
            Self::UnsupportedEncoding(label) => write!(f, "unsupported text encoding: {label}"),
            Self::ValueTypeMismatch { expected, actual } => {
                write!(f, "expected {expected}, got {actual}")
            }
            Self::MissingAttribute { attribute } => write!(f, "missing attribute: {attribute}"),
            Self::MissingGeometry { index } => write!(f, "missing geometry part: {index}"),
            Self::StatementClosed => write!(f, "statement has already been released"),
            Self::Message(message) => write!(f, "{message}"),
        }
    }
}

impl Error for MssqlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Geometry { source, .. } => Some(source),
            Self::Sql(err) => Some(err),
            Self::Wkb(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for MssqlError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sql(err)
    }
}

impl From<wkb::error::WkbError> for MssqlError {
    fn from(err: wkb::error::WkbError) -> Self {
        Self::Wkb(err)
    }
}

impl From<&str> for MssqlError {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MssqlError>;

/// Classified failure of the binary geometry decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// The buffer ends before a field the header or a count requires.
    Truncated { needed: usize, available: usize },
    /// Serialization version other than 1 or 2.
    UnsupportedVersion(u8),
    /// Contradicting serialization property flags.
    InvalidFlags(u8),
    /// Shape type byte outside the OpenGIS range.
    InvalidShapeType(u8),
    /// A valid shape type this decoder does not materialize (curves, full globe).
    UnsupportedShapeType(&'static str),
    /// Figure attribute byte that is not valid for the serialization version.
    InvalidFigureAttribute(u8),
    /// A point, figure, or shape offset points outside its table.
    InvalidOffset {
        table: &'static str,
        offset: i64,
        len: usize,
    },
    /// The shape tree is inconsistent.
    InvalidStructure(&'static str),
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { needed, available } => write!(
                f,
                "truncated buffer: need {needed} bytes, only {available} available"
            ),
            Self::UnsupportedVersion(version) => {
                write!(f, "unsupported format version: {version}")
            }
            Self::InvalidFlags(flags) => write!(f, "invalid serialization flags: {flags:#04x}"),
            Self::InvalidShapeType(ty) => write!(f, "invalid shape type: {ty}"),
            Self::UnsupportedShapeType(name) => write!(f, "unsupported shape type: {name}"),
            Self::InvalidFigureAttribute(attr) => {
                write!(f, "invalid figure attribute: {attr:#04x}")
            }
            Self::InvalidOffset { table, offset, len } => {
                write!(f, "invalid {table} offset {offset} (table length {len})")
            }
            Self::InvalidStructure(reason) => write!(f, "invalid shape structure: {reason}"),
        }
    }
}

impl Error for GeometryError {}
