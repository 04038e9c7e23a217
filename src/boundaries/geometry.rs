//! Multipolygon construction from GeoJSON-like feature geometry.
//!
//! Source data is not trusted: rings may be open, holes may be broken and
//! some outer rings carry only two positions. Construction works polygon
//! by polygon so one bad component does not discard the whole feature.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::Value;

/// Descriptive properties of one source feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeProperties {
    pub shape_id: Option<String>,
    pub name: Option<String>,
    pub shape_iso: Option<String>,
    pub shape_group: Option<String>,
    pub shape_type: Option<String>,
}

impl ShapeProperties {
    pub fn from_feature(feature: &Value) -> Self {
        let props = feature.get("properties");
        let field = |name: &str| {
            props
                .and_then(|p| p.get(name))
                .and_then(|v| match v {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
        };
        Self {
            shape_id: field("shapeID"),
            name: field("shapeName"),
            shape_iso: field("shapeISO"),
            shape_group: field("shapeGroup"),
            shape_type: field("shapeType"),
        }
    }
}

/// Features of a feature collection payload.
pub fn parse_collection(bytes: &[u8]) -> Result<Vec<Value>, String> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    match value.get("features") {
        Some(Value::Array(features)) => Ok(features.clone()),
        _ => Err("payload has no 'features' array".to_string()),
    }
}

/// A built multipolygon plus the components that had to be skipped.
#[derive(Debug, Clone)]
pub struct BuiltGeometry {
    pub geometry: MultiPolygon<f64>,
    pub skipped: Vec<String>,
}

/// Build one multipolygon from a `Polygon` or `MultiPolygon` geometry.
pub fn build_multipolygon(geometry: Option<&Value>) -> Result<BuiltGeometry, String> {
    let geometry = geometry
        .filter(|g| !g.is_null())
        .ok_or_else(|| "feature has no geometry".to_string())?;
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| "geometry has no type".to_string())?;
    let coordinates = geometry
        .get("coordinates")
        .and_then(Value::as_array)
        .ok_or_else(|| "geometry has no coordinate array".to_string())?;

    let components: Vec<&Value> = match kind {
        "Polygon" => vec![geometry
            .get("coordinates")
            .ok_or_else(|| "geometry has no coordinate array".to_string())?],
        "MultiPolygon" => coordinates.iter().collect(),
        other => return Err(format!("unsupported geometry type {}", other)),
    };

    let mut polygons = Vec::new();
    let mut skipped = Vec::new();
    for (i, rings) in components.into_iter().enumerate() {
        let mut dropped = Vec::new();
        match build_polygon(rings, &mut dropped) {
            Ok(polygon) => polygons.push(polygon),
            Err(e) => skipped.push(format!("polygon {}: {}", i, e)),
        }
        skipped.extend(dropped.into_iter().map(|d| format!("polygon {}: {}", i, d)));
    }

    if polygons.is_empty() {
        return Err(if skipped.is_empty() {
            "geometry has no polygons".to_string()
        } else {
            format!("no valid polygons ({})", skipped.join("; "))
        });
    }

    Ok(BuiltGeometry {
        geometry: MultiPolygon::new(polygons),
        skipped,
    })
}

/// Outer ring plus holes. A two-position outer ring becomes its bounding
/// rectangle. A hole too short to enclose anything is dropped and noted in
/// `dropped`; unparsable positions fail the whole polygon.
fn build_polygon(rings: &Value, dropped: &mut Vec<String>) -> Result<Polygon<f64>, String> {
    let rings = rings
        .as_array()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| "polygon has no rings".to_string())?;

    let mut outer = parse_positions(&rings[0]).map_err(|e| format!("outer ring: {}", e))?;
    outer.dedup();
    // Distinct positions, not counting a closing repeat of the first.
    let distinct = if outer.len() > 1 && outer.first() == outer.last() {
        outer.len() - 1
    } else {
        outer.len()
    };
    let exterior = if distinct == 2 {
        rectangle(outer[0], outer[1]).map_err(|e| format!("outer ring: {}", e))?
    } else {
        close_ring(outer).map_err(|e| format!("outer ring: {}", e))?
    };

    let mut interiors = Vec::with_capacity(rings.len() - 1);
    for (i, hole) in rings.iter().enumerate().skip(1) {
        let coords = parse_positions(hole).map_err(|e| format!("hole {}: {}", i, e))?;
        match close_ring(coords) {
            Ok(ring) => interiors.push(ring),
            Err(e) => dropped.push(format!("hole {} dropped: {}", i, e)),
        }
    }

    Ok(Polygon::new(exterior, interiors))
}

/// Positions are `[lng, lat, ...]`, stored as `x = lng`, `y = lat`.
fn parse_positions(ring: &Value) -> Result<Vec<Coord<f64>>, String> {
    let positions = ring
        .as_array()
        .ok_or_else(|| "ring is not an array".to_string())?;

    positions
        .iter()
        .enumerate()
        .map(|(i, pos)| {
            let pair = pos.as_array().filter(|p| p.len() >= 2);
            let lng = pair.and_then(|p| p[0].as_f64());
            let lat = pair.and_then(|p| p[1].as_f64());
            match (lng, lat) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok(Coord { x, y }),
                _ => Err(format!("unparsable position {} ({})", i, pos)),
            }
        })
        .collect()
}

fn close_ring(mut coords: Vec<Coord<f64>>) -> Result<LineString<f64>, String> {
    coords.dedup();
    if coords.len() < 3 {
        return Err(format!("{} distinct positions, need at least 3", coords.len()));
    }

    // Close the ring if needed
    if coords.first() != coords.last() {
        coords.push(coords[0]);
    }

    if coords.len() < 4 {
        return Err("ring collapses to a line".to_string());
    }

    Ok(LineString::new(coords))
}

/// Axis-aligned rectangle spanned by two corners. Lossy by nature.
fn rectangle(a: Coord<f64>, b: Coord<f64>) -> Result<LineString<f64>, String> {
    let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
    let (min_y, max_y) = (a.y.min(b.y), a.y.max(b.y));
    if min_x == max_x || min_y == max_y {
        return Err("two-position ring has no area".to_string());
    }
    Ok(LineString::new(vec![
        Coord { x: min_x, y: min_y },
        Coord { x: max_x, y: min_y },
        Coord { x: max_x, y: max_y },
        Coord { x: min_x, y: max_y },
        Coord { x: min_x, y: min_y },
    ]))
}

/// Short description of a geometry for error reports, e.g.
/// `MultiPolygon[2 polygons; ring sizes 5,2|7]`.
pub fn shape_summary(geometry: Option<&Value>) -> String {
    let Some(geometry) = geometry.filter(|g| !g.is_null()) else {
        return "no geometry".to_string();
    };
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("untyped");

    let ring_sizes = |rings: &Value| -> String {
        rings
            .as_array()
            .map(|rs| {
                rs.iter()
                    .map(|r| r.as_array().map_or("?".to_string(), |a| a.len().to_string()))
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_else(|| "?".to_string())
    };

    match (kind, geometry.get("coordinates")) {
        ("Polygon", Some(rings)) => format!("Polygon[ring sizes {}]", ring_sizes(rings)),
        ("MultiPolygon", Some(Value::Array(polys))) => format!(
            "MultiPolygon[{} polygons; ring sizes {}]",
            polys.len(),
            polys.iter().map(ring_sizes).collect::<Vec<_>>().join("|")
        ),
        (kind, None) => format!("{}[no coordinates]", kind),
        (kind, Some(_)) => kind.to_string(),
    }
}
