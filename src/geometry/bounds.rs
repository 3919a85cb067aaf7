use geo_traits::{
    CoordTrait, GeometryCollectionTrait, GeometryTrait, GeometryType, LineStringTrait,
    MultiLineStringTrait, MultiPointTrait, MultiPolygonTrait, PointTrait, PolygonTrait,
};
use geo_types::{Coord, Rect};

/// Bounding box over all coordinates of `geometries`, or `None` if every one
/// of them is empty.
pub(crate) fn envelope<'a, G, I>(geometries: I) -> Option<Rect<f64>>
where
    G: GeometryTrait<T = f64> + 'a,
    I: IntoIterator<Item = &'a G>,
{
    let mut bounds = None;
    for geometry in geometries {
        add_geometry(&mut bounds, geometry);
    }
    bounds
}

fn add_geometry<G: GeometryTrait<T = f64>>(bounds: &mut Option<Rect<f64>>, geom: &G) {
    match geom.as_type() {
        GeometryType::Point(point) => add_point(bounds, point),
        GeometryType::LineString(line) => add_line_string(bounds, line),
        GeometryType::Polygon(poly) => add_polygon(bounds, poly),
        GeometryType::MultiPoint(multi) => {
            for point in multi.points() {
                add_point(bounds, &point);
            }
        }
        GeometryType::MultiLineString(multi) => {
            for line in multi.line_strings() {
                add_line_string(bounds, &line);
            }
        }
        GeometryType::MultiPolygon(multi) => {
            for poly in multi.polygons() {
                add_polygon(bounds, &poly);
            }
        }
        GeometryType::GeometryCollection(collection) => {
            for sub_geom in collection.geometries() {
                add_geometry(bounds, &sub_geom);
            }
        }
        // The parser never produces these.
        GeometryType::Rect(_) | GeometryType::Triangle(_) | GeometryType::Line(_) => {}
    }
}

fn add_point<P: PointTrait<T = f64>>(bounds: &mut Option<Rect<f64>>, point: &P) {
    if let Some(coord) = point.coord() {
        add_coord(bounds, &coord);
    }
}

fn add_polygon<P: PolygonTrait<T = f64>>(bounds: &mut Option<Rect<f64>>, poly: &P) {
    if let Some(ring) = poly.exterior() {
        add_line_string(bounds, &ring);
    }
    for ring in poly.interiors() {
        add_line_string(bounds, &ring);
    }
}

fn add_line_string<L: LineStringTrait<T = f64>>(bounds: &mut Option<Rect<f64>>, line: &L) {
    for coord in line.coords() {
        add_coord(bounds, &coord);
    }
}

fn add_coord<C: CoordTrait<T = f64>>(bounds: &mut Option<Rect<f64>>, coord: &C) {
    let (x, y) = coord.x_y();
    *bounds = Some(match bounds {
        Some(rect) => Rect::new(
            Coord {
                x: rect.min().x.min(x),
                y: rect.min().y.min(y),
            },
            Coord {
                x: rect.max().x.max(x),
                y: rect.max().y.max(y),
            },
        ),
        None => Rect::new(Coord { x, y }, Coord { x, y }),
    });
}

#[cfg(test)]
mod tests {
    use super::envelope;
    use geo_types::{Coord, Geometry, GeometryCollection, LineString, MultiPoint, Point, Polygon};

    #[test]
    fn envelope_spans_all_parts() {
        let parts: Vec<Geometry<f64>> = vec![
            Geometry::Point(Point::new(1.5, -2.0)),
            Geometry::LineString(LineString::from(vec![(-4.0, 0.0), (0.0, 6.25)])),
        ];
        let rect = envelope(&parts).expect("non-empty");
        assert_eq!(rect.min(), Coord { x: -4.0, y: -2.0 });
        assert_eq!(rect.max(), Coord { x: 1.5, y: 6.25 });
    }

    #[test]
    fn envelope_descends_into_collections() {
        let polygon = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (3.0, 0.0), (3.0, 3.0), (0.0, 0.0)]),
            vec![],
        );
        let parts: Vec<Geometry<f64>> = vec![Geometry::GeometryCollection(
            GeometryCollection::from(vec![
                Geometry::Polygon(polygon),
                Geometry::MultiPoint(MultiPoint::from(vec![Point::new(10.0, -1.0)])),
            ]),
        )];
        let rect = envelope(&parts).expect("non-empty");
        assert_eq!(rect.min(), Coord { x: 0.0, y: -1.0 });
        assert_eq!(rect.max(), Coord { x: 10.0, y: 3.0 });
    }

    #[test]
    fn envelope_of_empty_parts_is_none() {
        let parts: Vec<Geometry<f64>> = vec![Geometry::LineString(LineString::new(vec![]))];
        assert!(envelope(&parts).is_none());
        assert!(envelope::<Geometry<f64>, _>(&[]).is_none());
    }
}
