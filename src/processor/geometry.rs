//! Map geometry: every object without a tile becomes an absolute point path
//! the engine can test against or walk along.

use std::f64::consts::PI;

use tracing::debug;

use super::binary::{DATA_ENDIAN, RecordWriter};
use super::project::{ContentKind, Project};
use super::properties::{PropertyBag, get_f64, merge_properties};
use crate::error::{EncodeError, Result};
use crate::model::TiledObject;

/// Ellipses are approximated with this many points unless the object has a
/// `points` property.
pub const DEFAULT_ELLIPSE_POINTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point = 0,
    Polyline = 1,
    Polygon = 2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryPath {
    pub kind: GeometryKind,
    pub points: Vec<(f64, f64)>,
}

impl GeometryPath {
    /// Polylines are open, polygons close back on their first point.
    pub fn segment_count(&self) -> usize {
        match self.kind {
            GeometryKind::Point => 0,
            GeometryKind::Polyline => self.points.len().saturating_sub(1),
            GeometryKind::Polygon => self.points.len(),
        }
    }

    pub fn segment_lengths(&self) -> Vec<f64> {
        let n = self.points.len();
        if n < 2 {
            return Vec::new();
        }
        (0..self.segment_count())
            .map(|i| {
                let (ax, ay) = self.points[i];
                let (bx, by) = self.points[(i + 1) % n];
                (bx - ax).hypot(by - ay)
            })
            .collect()
    }
}

/// Turn a Tiled object into its point path. Rectangles, text boxes and
/// ellipses all become polygons.
pub fn object_path(object: &TiledObject, properties: &PropertyBag) -> GeometryPath {
    let (x, y) = (object.x, object.y);
    if object.point {
        return GeometryPath {
            kind: GeometryKind::Point,
            points: vec![(x, y)],
        };
    }
    if let Some(points) = &object.polyline {
        return GeometryPath {
            kind: GeometryKind::Polyline,
            points: points.iter().map(|p| (p.x + x, p.y + y)).collect(),
        };
    }
    if let Some(points) = &object.polygon {
        return GeometryPath {
            kind: GeometryKind::Polygon,
            points: points.iter().map(|p| (p.x + x, p.y + y)).collect(),
        };
    }
    let (w, h) = (object.width, object.height);
    if object.ellipse {
        let count = get_f64(properties, "points")
            .filter(|n| *n >= 1.0)
            .map_or(DEFAULT_ELLIPSE_POINTS, |n| n as usize);
        let step = (PI * 2.0) / count as f64;
        let (cx, cy) = (x + w / 2.0, y + h / 2.0);
        return GeometryPath {
            kind: GeometryKind::Polygon,
            points: (0..count)
                .map(|i| {
                    let angle = step * i as f64;
                    (cx + angle.cos() * w / 2.0, cy + angle.sin() * h / 2.0)
                })
                .collect(),
        };
    }
    GeometryPath {
        kind: GeometryKind::Polygon,
        points: vec![(x, y), (x + w, y), (x + w, y + h), (x, y + h)],
    }
}

/// Round a coordinate into an unsigned 16 bit field.
pub fn coordinate(value: f64, context: impl FnOnce() -> String) -> Result<u16> {
    let rounded = value.round();
    if !(0.0..=u16::MAX as f64).contains(&rounded) {
        return Err(EncodeError::FieldOverflow {
            context: context(),
            value: rounded as i64,
            width: 2,
        });
    }
    Ok(rounded as u16)
}

pub fn encode_geometry(name: &str, path: &GeometryPath) -> Result<Vec<u8>> {
    let point_count = u8::try_from(path.points.len()).map_err(|_| EncodeError::TooManyPoints {
        geometry: name.to_string(),
        count: path.points.len(),
    })?;
    let lengths = path.segment_lengths();
    let total: f64 = lengths.iter().sum();

    let mut w = RecordWriter::new(32 + 4 + 4 + path.points.len() * 4 + lengths.len() * 4);
    w.chars(name, 32)
        .u8(path.kind as u8)
        .u8(point_count)
        .u8(lengths.len() as u8)
        .skip(1)
        .f32(total as f32, DATA_ENDIAN);
    for (x, y) in &path.points {
        let x = coordinate(*x, || format!("geometry \"{name}\" x"))?;
        let y = coordinate(*y, || format!("geometry \"{name}\" y"))?;
        w.u16(x, DATA_ENDIAN).u16(y, DATA_ENDIAN);
    }
    for length in &lengths {
        w.f32(*length as f32, DATA_ENDIAN);
    }
    Ok(w.finish())
}

/// Encode one geometry object and append it to the geometry table.
pub fn encode_object(object: &TiledObject, project: &mut Project) -> Result<u16> {
    let mut properties = PropertyBag::new();
    merge_properties(&mut properties, &object.properties, &format!("object {}", object.label()))?;
    let path = object_path(object, &properties);
    let bytes = encode_geometry(&object.name, &path)?;
    let index = project.tables.push(ContentKind::Geometry, object.name.clone(), bytes)?;
    debug!(name = %object.name, index, points = path.points.len(), "geometry encoded");
    Ok(index)
}
