use crate::error::GeometryError;
use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};

type Result<T> = std::result::Result<T, GeometryError>;

// cf. [MS-SSCLRT] Microsoft SQL Server CLR Types Serialization Formats, 2.1
const HEADER_LEN: usize = 6;
const POINT_XY_LEN: usize = 16;
const ORDINATE_LEN: usize = 8;
const FIGURE_LEN: usize = 5;
const SHAPE_LEN: usize = 9;

const FLAG_HAS_Z: u8 = 0x01;
const FLAG_HAS_M: u8 = 0x02;
const FLAG_SINGLE_POINT: u8 = 0x08;
const FLAG_SINGLE_LINE_SEGMENT: u8 = 0x10;
// 0x04 (valid) and, for version 2, 0x20 (larger than a hemisphere) are accepted and ignored.
const KNOWN_FLAGS_V1: u8 = 0x1F;
const KNOWN_FLAGS_V2: u8 = 0x3F;

/// Coordinate interpretation of a spatial column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpatialKind {
    /// Planar `geometry`: points are stored as (x, y).
    Geometry,
    /// Ellipsoidal `geography`: points are stored as (latitude, longitude).
    Geography,
}

/// Result of decoding one serialized value.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedGeometry {
    pub srid: i32,
    /// Decoded parts in serialization order. A top-level geometry collection
    /// contributes its members; any other top-level shape is a single part.
    /// Empty shapes contribute nothing.
    pub shapes: Vec<Geometry<f64>>,
}

/// Decoder for the SQL Server `geometry`/`geography` binary serialization.
#[derive(Clone, Copy, Debug)]
pub struct MssqlGeometryParser {
    kind: SpatialKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ShapeType {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl TryFrom<u8> for ShapeType {
    type Error = GeometryError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Point),
            2 => Ok(Self::LineString),
            3 => Ok(Self::Polygon),
            4 => Ok(Self::MultiPoint),
            5 => Ok(Self::MultiLineString),
            6 => Ok(Self::MultiPolygon),
            7 => Ok(Self::GeometryCollection),
            8 => Err(GeometryError::UnsupportedShapeType("CircularString")),
            9 => Err(GeometryError::UnsupportedShapeType("CompoundCurve")),
            10 => Err(GeometryError::UnsupportedShapeType("CurvePolygon")),
            11 => Err(GeometryError::UnsupportedShapeType("FullGlobe")),
            other => Err(GeometryError::InvalidShapeType(other)),
        }
    }
}

impl ShapeType {
    fn is_container(self) -> bool {
        matches!(
            self,
            Self::MultiPoint | Self::MultiLineString | Self::MultiPolygon | Self::GeometryCollection
        )
    }
}

struct Figure {
    point_offset: usize,
}

struct Shape {
    parent: Option<usize>,
    figure: Option<usize>,
    shape_type: ShapeType,
}

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Fail unless `n` more bytes are available.
    fn ensure(&self, n: usize) -> Result<()> {
        match self.pos.checked_add(n) {
            Some(end) if end <= self.buf.len() => Ok(()),
            end => Err(GeometryError::Truncated {
                needed: end.unwrap_or(usize::MAX),
                available: self.buf.len(),
            }),
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take()?))
    }

    /// Read a `u32` element count and check that `count * element_len` bytes follow.
    fn read_count(&mut self, element_len: usize) -> Result<usize> {
        let count = self.read_u32()? as usize;
        self.ensure(table_len(count, element_len, self.buf.len())?)?;
        Ok(count)
    }
}

fn table_len(count: usize, element_len: usize, available: usize) -> Result<usize> {
    count
        .checked_mul(element_len)
        .ok_or(GeometryError::Truncated {
            needed: usize::MAX,
            available,
        })
}

impl MssqlGeometryParser {
    pub fn new(kind: SpatialKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> SpatialKind {
        self.kind
    }

    /// Decode one serialized value. The slice length is the declared length of
    /// the value; nothing past it is read.
    pub fn parse(&self, bytes: &[u8]) -> Result<ParsedGeometry> {
        let mut reader = ByteReader::new(bytes);
        reader.ensure(HEADER_LEN)?;

        let srid = reader.read_i32()?;
        let version = reader.read_u8()?;
        let known_flags = match version {
            1 => KNOWN_FLAGS_V1,
            2 => KNOWN_FLAGS_V2,
            other => return Err(GeometryError::UnsupportedVersion(other)),
        };
        let flags = reader.read_u8()?;
        if flags & !known_flags != 0
            || (flags & FLAG_SINGLE_POINT != 0 && flags & FLAG_SINGLE_LINE_SEGMENT != 0)
        {
            return Err(GeometryError::InvalidFlags(flags));
        }
        let has_z = flags & FLAG_HAS_Z != 0;
        let has_m = flags & FLAG_HAS_M != 0;

        let shapes = if flags & FLAG_SINGLE_POINT != 0 {
            let coords = self.read_points(&mut reader, 1, has_z, has_m)?;
            vec![Geometry::Point(Point(coords[0]))]
        } else if flags & FLAG_SINGLE_LINE_SEGMENT != 0 {
            let coords = self.read_points(&mut reader, 2, has_z, has_m)?;
            vec![Geometry::LineString(LineString::new(coords))]
        } else {
            let num_points = reader.read_count(POINT_XY_LEN)?;
            let coords = self.read_points(&mut reader, num_points, has_z, has_m)?;
            let figures = read_figures(&mut reader, version, coords.len())?;
            let shapes = read_shapes(&mut reader, figures.len())?;
            assemble(&coords, &figures, &shapes)?
        };

        Ok(ParsedGeometry { srid, shapes })
    }

    fn read_points(
        &self,
        reader: &mut ByteReader<'_>,
        count: usize,
        has_z: bool,
        has_m: bool,
    ) -> Result<Vec<Coord<f64>>> {
        let available = reader.buf.len();
        let xy_len = table_len(count, POINT_XY_LEN, available)?;
        let ordinate_len = table_len(count, ORDINATE_LEN, available)?;
        let mut total = xy_len;
        for present in [has_z, has_m] {
            if present {
                total = total
                    .checked_add(ordinate_len)
                    .ok_or(GeometryError::Truncated {
                        needed: usize::MAX,
                        available,
                    })?;
            }
        }
        reader.ensure(total)?;

        let mut coords = Vec::with_capacity(count);
        for _ in 0..count {
            let first = reader.read_f64()?;
            let second = reader.read_f64()?;
            let coord = match self.kind {
                SpatialKind::Geometry => Coord {
                    x: first,
                    y: second,
                },
                SpatialKind::Geography => Coord {
                    x: second,
                    y: first,
                },
            };
            coords.push(coord);
        }

        // Z and M arrays follow the XY pairs; the geometry model is 2D.
        if has_z {
            reader.skip(ordinate_len)?;
        }
        if has_m {
            reader.skip(ordinate_len)?;
        }
        Ok(coords)
    }
}

fn read_figures(reader: &mut ByteReader<'_>, version: u8, num_points: usize) -> Result<Vec<Figure>> {
    let count = reader.read_count(FIGURE_LEN)?;
    let mut figures = Vec::with_capacity(count);
    let mut previous = 0;
    for _ in 0..count {
        let attribute = reader.read_u8()?;
        match (version, attribute) {
            (1, 0..=2) | (2, 0..=1) => {}
            (2, 2) => return Err(GeometryError::UnsupportedShapeType("circular arc figure")),
            (2, 3) => return Err(GeometryError::UnsupportedShapeType("composite curve figure")),
            (_, other) => return Err(GeometryError::InvalidFigureAttribute(other)),
        }

        let point_offset = reader.read_u32()? as usize;
        if point_offset > num_points || point_offset < previous {
            return Err(GeometryError::InvalidOffset {
                table: "point",
                offset: point_offset as i64,
                len: num_points,
            });
        }
        previous = point_offset;
        figures.push(Figure { point_offset });
    }
    Ok(figures)
}

fn read_shapes(reader: &mut ByteReader<'_>, num_figures: usize) -> Result<Vec<Shape>> {
    let count = reader.read_count(SHAPE_LEN)?;
    let mut shapes: Vec<Shape> = Vec::with_capacity(count);
    let mut previous_figure = 0;
    for idx in 0..count {
        let parent_offset = reader.read_i32()?;
        let figure_offset = reader.read_i32()?;
        let shape_type = ShapeType::try_from(reader.read_u8()?)?;

        let parent = match (idx, parent_offset) {
            (0, -1) => None,
            (0, _) => return Err(GeometryError::InvalidStructure("root shape has a parent")),
            (_, p) if p >= 0 && (p as usize) < idx => Some(p as usize),
            (_, p) => {
                return Err(GeometryError::InvalidOffset {
                    table: "shape",
                    offset: i64::from(p),
                    len: idx,
                });
            }
        };
        if parent.is_some_and(|parent| !shapes[parent].shape_type.is_container()) {
            return Err(GeometryError::InvalidStructure(
                "shape parent is not a collection",
            ));
        }

        let figure = match figure_offset {
            -1 => None,
            f if f >= 0 && (f as usize) < num_figures && (f as usize) >= previous_figure => {
                previous_figure = f as usize;
                Some(f as usize)
            }
            f => {
                return Err(GeometryError::InvalidOffset {
                    table: "figure",
                    offset: i64::from(f),
                    len: num_figures,
                });
            }
        };

        shapes.push(Shape {
            parent,
            figure,
            shape_type,
        });
    }
    Ok(shapes)
}

/// Build the decoded parts bottom-up. Children always follow their parent in
/// the shape table, so walking it backwards sees every child before its parent.
///
/// Empty shapes build to `None` at every level: a simple shape without
/// figures or points, and a container left without members. Containers skip
/// such members, and an empty root yields no parts.
fn assemble(coords: &[Coord<f64>], figures: &[Figure], shapes: &[Shape]) -> Result<Vec<Geometry<f64>>> {
    if shapes.is_empty() {
        return Err(GeometryError::InvalidStructure("missing root shape"));
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); shapes.len()];
    for (idx, shape) in shapes.iter().enumerate() {
        if let Some(parent) = shape.parent {
            children[parent].push(idx);
        }
    }

    let mut built: Vec<Option<Geometry<f64>>> = vec![None; shapes.len()];
    for idx in (0..shapes.len()).rev() {
        let shape = &shapes[idx];
        let figure_range = figure_range(shapes, idx, figures.len());
        let geometry = match shape.shape_type {
            ShapeType::Point => match figure_range.len() {
                0 => None,
                1 => {
                    let points = figure_points(coords, figures, figure_range.start);
                    match points.len() {
                        0 => None,
                        1 => Some(Geometry::Point(Point(points[0]))),
                        _ => {
                            return Err(GeometryError::InvalidStructure(
                                "point figure with several points",
                            ));
                        }
                    }
                }
                _ => return Err(GeometryError::InvalidStructure("point with several figures")),
            },
            ShapeType::LineString => match figure_range.len() {
                0 => None,
                1 => {
                    let points = figure_points(coords, figures, figure_range.start);
                    (!points.is_empty())
                        .then(|| Geometry::LineString(LineString::new(points.to_vec())))
                }
                _ => {
                    return Err(GeometryError::InvalidStructure(
                        "line string with several figures",
                    ));
                }
            },
            ShapeType::Polygon => {
                let mut rings = figure_range
                    .map(|figure| LineString::new(figure_points(coords, figures, figure).to_vec()));
                rings
                    .next()
                    .map(|exterior| Geometry::Polygon(Polygon::new(exterior, rings.collect())))
            }
            ShapeType::MultiPoint => {
                let mut points = Vec::with_capacity(children[idx].len());
                for child in take_children(&mut built, &children[idx]) {
                    match child {
                        Some(Geometry::Point(point)) => points.push(point),
                        None => {}
                        Some(_) => {
                            return Err(GeometryError::InvalidStructure(
                                "multipoint member is not a point",
                            ));
                        }
                    }
                }
                (!points.is_empty()).then(|| Geometry::MultiPoint(MultiPoint::new(points)))
            }
            ShapeType::MultiLineString => {
                let mut lines = Vec::with_capacity(children[idx].len());
                for child in take_children(&mut built, &children[idx]) {
                    match child {
                        Some(Geometry::LineString(line)) => lines.push(line),
                        None => {}
                        Some(_) => {
                            return Err(GeometryError::InvalidStructure(
                                "multilinestring member is not a line string",
                            ));
                        }
                    }
                }
                (!lines.is_empty()).then(|| Geometry::MultiLineString(MultiLineString::new(lines)))
            }
            ShapeType::MultiPolygon => {
                let mut polygons = Vec::with_capacity(children[idx].len());
                for child in take_children(&mut built, &children[idx]) {
                    match child {
                        Some(Geometry::Polygon(polygon)) => polygons.push(polygon),
                        None => {}
                        Some(_) => {
                            return Err(GeometryError::InvalidStructure(
                                "multipolygon member is not a polygon",
                            ));
                        }
                    }
                }
                (!polygons.is_empty())
                    .then(|| Geometry::MultiPolygon(MultiPolygon::new(polygons)))
            }
            ShapeType::GeometryCollection => {
                let members: Vec<Geometry<f64>> = take_children(&mut built, &children[idx])
                    .into_iter()
                    .flatten()
                    .collect();
                (!members.is_empty())
                    .then(|| Geometry::GeometryCollection(GeometryCollection::from(members)))
            }
        };
        built[idx] = geometry;
    }

    Ok(match built.swap_remove(0) {
        Some(Geometry::GeometryCollection(collection)) => collection.0,
        Some(geometry) => vec![geometry],
        None => Vec::new(),
    })
}

/// Figures owned by a simple shape: from its own figure offset up to the
/// figure offset of the next non-empty shape.
fn figure_range(shapes: &[Shape], idx: usize, num_figures: usize) -> std::ops::Range<usize> {
    let Some(start) = shapes[idx].figure else {
        return 0..0;
    };
    let end = shapes[idx + 1..]
        .iter()
        .find_map(|shape| shape.figure)
        .unwrap_or(num_figures);
    start..end
}

fn figure_points<'a>(coords: &'a [Coord<f64>], figures: &[Figure], figure: usize) -> &'a [Coord<f64>] {
    let start = figures[figure].point_offset;
    let end = figures
        .get(figure + 1)
        .map_or(coords.len(), |next| next.point_offset);
    &coords[start..end]
}

fn take_children(
    built: &mut [Option<Geometry<f64>>],
    children: &[usize],
) -> Vec<Option<Geometry<f64>>> {
    children.iter().map(|&child| built[child].take()).collect()
}
