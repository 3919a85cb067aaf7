//! Decoding of SQL Server spatial values into `geo_types` geometries.

mod bounds;
mod parser;

pub use parser::{MssqlGeometryParser, ParsedGeometry, SpatialKind};

pub(crate) use bounds::envelope;

#[cfg(test)]
pub(crate) use parser::tests::{Serialized, point_blob, polygon_with_hole_blob};

use crate::error::Result;
use geo_traits::GeometryTrait;

/// Encode a decoded part as ISO WKB for downstream consumers.
pub(crate) fn geometry_to_wkb<G: GeometryTrait<T = f64>>(geometry: &G) -> Result<Vec<u8>> {
    let mut wkb = Vec::new();
    wkb::writer::write_geometry(&mut wkb, geometry, &Default::default())?;
    Ok(wkb)
}
