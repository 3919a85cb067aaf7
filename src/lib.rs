//! Forward-only feature cursor over SQL Server spatial query results.
//!
//! ## Overview
//!
//! - `MssqlFeatureset` drives one executed statement and yields one
//!   `MssqlFeature` per result row.
//! - `MssqlFeature` holds the row's identity, attribute values, and decoded
//!   geometry parts.
//! - `MssqlGeometryParser` decodes the native `geometry`/`geography` binary
//!   serialization into `geo_types` geometries.
//! - `LayerDescriptor` describes the columns the query returns, in order.
//!
//! The cursor talks to the database through the ODBC-shaped
//! [`ConnectionHandle`], [`StatementHandle`] and [`RowHandle`] traits. Two
//! providers ship with the crate:
//!
//! - `SqliteConnection`, backed by rusqlite, for databases that store SQL
//!   Server spatial blobs. Results are buffered one page at a time.
//! - `odbc_api::Connection`, behind the `odbc` feature, for a live SQL Server
//!   through the platform driver manager.
//!
//! ## Short usage
//!
//! ```no_run
//! use mssql_featureset::{AttributeType, LayerDescriptor, MssqlFeatureset, SqliteConnection};
//!
//! let conn = SqliteConnection::open_read_only("data/places.sqlite")?;
//! let descriptor = LayerDescriptor::new("utf-8")
//!     .with_attribute("name", AttributeType::String)
//!     .with_attribute("shape", AttributeType::Geometry);
//!
//! let mut features = MssqlFeatureset::new(&conn, "SELECT name, shape FROM places", &descriptor)?;
//! while let Some(feature) = features.next_feature()? {
//!     let _id = feature.id();
//!     let _name: Option<String> = feature.property("name")?;
//!     for _part in feature.geometries() {}
//! }
//! # Ok::<(), mssql_featureset::MssqlError>(())
//! ```
//!
//! `MssqlFeatureset` also implements `Iterator<Item = Result<MssqlFeature>>`.
//! A row whose columns cannot be read or decoded is yielded as an `Err` and
//! iteration carries on with the next row; only a failed fetch ends it.
//! Collecting into a `Result` stops at the first error:
//!
//! ```no_run
//! # use mssql_featureset::{AttributeType, LayerDescriptor, MssqlFeatureset, SqliteConnection};
//! # let conn = SqliteConnection::open_read_only("data/places.sqlite")?;
//! # let descriptor = LayerDescriptor::new("utf-8").with_attribute("shape", AttributeType::Geometry);
//! let features = MssqlFeatureset::new(&conn, "SELECT shape FROM places", &descriptor)?
//!     .collect::<Result<Vec<_>, _>>()?;
//! # Ok::<(), mssql_featureset::MssqlError>(())
//! ```
//!
//! ## Decoding values directly
//!
//! ```
//! use mssql_featureset::{MssqlGeometryParser, SpatialKind};
//!
//! // SRID 4326, version 1, flags: valid + single point, POINT (1 2)
//! let mut blob = vec![0xE6, 0x10, 0x00, 0x00, 0x01, 0x0C];
//! blob.extend_from_slice(&1.0_f64.to_le_bytes());
//! blob.extend_from_slice(&2.0_f64.to_le_bytes());
//!
//! let parsed = MssqlGeometryParser::new(SpatialKind::Geometry).parse(&blob)?;
//! assert_eq!(parsed.srid, 4326);
//! assert_eq!(parsed.shapes.len(), 1);
//! # Ok::<(), mssql_featureset::GeometryError>(())
//! ```
mod conversions;
mod error;
mod featureset;
mod geometry;
mod sqlite;
mod transcoder;
mod types;

pub mod odbc;

pub use error::{GeometryError, MssqlError, Result};
pub use featureset::{AttributeContext, MssqlFeature, MssqlFeatureset, STRING_BUFFER_CAPACITY};
pub use geometry::{MssqlGeometryParser, ParsedGeometry, SpatialKind};
pub use odbc::{ConnectionHandle, RowHandle, StatementHandle};
pub use sqlite::{DEFAULT_PAGE_SIZE, SqliteConnection, SqliteRow, SqliteStatement};
pub use transcoder::Transcoder;
pub use types::{AttributeDescriptor, AttributeType, LayerDescriptor, Value};
