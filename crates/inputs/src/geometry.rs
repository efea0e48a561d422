use geo::Centroid;
use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo_types::{Coord, Geometry, Line, LineString, Point, Polygon};

/// A single-part geometry the distance algorithms can work with
#[derive(Debug, Clone, PartialEq)]
pub enum SimpleGeometry {
    Point(Point<f64>),
    Polygon(Polygon<f64>),
}

impl SimpleGeometry {
    pub fn centroid(&self) -> Option<Coord<f64>> {
        match self {
            SimpleGeometry::Point(point) => Some(point.0),
            SimpleGeometry::Polygon(polygon) => polygon.centroid().map(|c| c.0),
        }
    }

    /// Vertices of the outer boundary; a point yields itself
    pub fn outer_ring(&self) -> Vec<Coord<f64>> {
        match self {
            SimpleGeometry::Point(point) => vec![point.0],
            SimpleGeometry::Polygon(polygon) => polygon.exterior().0.clone(),
        }
    }
}

/// Check that `geometry` is a single, non self-intersecting part.
///
/// The error is a human readable reason.
pub fn validate_simple(geometry: Option<&Geometry<f64>>) -> Result<SimpleGeometry, String> {
    let geometry = geometry.ok_or_else(|| "feature has no geometry".to_string())?;

    let simple = match geometry {
        Geometry::Point(point) => SimpleGeometry::Point(*point),
        Geometry::MultiPoint(points) => match points.0.as_slice() {
            [point] => SimpleGeometry::Point(*point),
            [] => return Err("empty geometry".to_string()),
            _ => return Err(format!("multi-part geometry ({} points)", points.0.len())),
        },
        Geometry::Polygon(polygon) => SimpleGeometry::Polygon(polygon.clone()),
        Geometry::MultiPolygon(polygons) => match polygons.0.as_slice() {
            [polygon] => SimpleGeometry::Polygon(polygon.clone()),
            [] => return Err("empty geometry".to_string()),
            _ => return Err(format!("multi-part geometry ({} polygons)", polygons.0.len())),
        },
        other => return Err(format!("unsupported geometry type {}", geometry_name(other))),
    };

    match &simple {
        SimpleGeometry::Point(point) => {
            if !point.x().is_finite() || !point.y().is_finite() {
                return Err("non-finite coordinates".to_string());
            }
        }
        SimpleGeometry::Polygon(polygon) => {
            validate_ring(polygon.exterior(), "outer ring")?;
            for (i, ring) in polygon.interiors().iter().enumerate() {
                validate_ring(ring, &format!("hole {}", i + 1))?;
            }
        }
    }

    Ok(simple)
}

fn validate_ring(ring: &LineString<f64>, label: &str) -> Result<(), String> {
    let mut coords = ring.0.clone();
    coords.dedup();

    // Closed rings repeat the first vertex
    if coords.len() < 4 {
        return Err(format!("{} has fewer than three vertices", label));
    }
    if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(format!("{} has non-finite coordinates", label));
    }
    if let Some((i, j)) = first_self_intersection(&coords) {
        return Err(format!("{} self-intersects (segments {} and {})", label, i, j));
    }
    Ok(())
}

/// Indices of the first pair of ring segments that cross or overlap.
/// `coords` must not repeat consecutive vertices.
fn first_self_intersection(coords: &[Coord<f64>]) -> Option<(usize, usize)> {
    let segments: Vec<Line<f64>> = coords
        .windows(2)
        .map(|pair| Line::new(pair[0], pair[1]))
        .collect();
    let n = segments.len();

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(segments[i], segments[j]) {
                None => {}
                Some(LineIntersection::Collinear { intersection }) => {
                    if !adjacent || intersection.start != intersection.end {
                        return Some((i, j));
                    }
                }
                Some(LineIntersection::SinglePoint { .. }) => {
                    if !adjacent {
                        return Some((i, j));
                    }
                }
            }
        }
    }
    None
}

fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
