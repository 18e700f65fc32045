// src/scene/geometry.rs

//! Opaque geometry payload and the geometry-engine seam.
//!
//! The pipeline only ever looks at a geometry's type (for the reserved
//! `geom:type` selector key) and its serialized form (for fingerprints).
//! Everything else goes through a [`GeometryEngine`], which bodies reach via
//! the external context.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeomType {
    Point,
    LineString,
    Polygon,
    MultiPolygon,
    GeometryCollection,
}

impl GeomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeomType::Point => "Point",
            GeomType::LineString => "LineString",
            GeomType::Polygon => "Polygon",
            GeomType::MultiPolygon => "MultiPolygon",
            GeomType::GeometryCollection => "GeometryCollection",
        }
    }
}

impl fmt::Display for GeomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeomType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Point" => Ok(GeomType::Point),
            "LineString" => Ok(GeomType::LineString),
            "Polygon" => Ok(GeomType::Polygon),
            "MultiPolygon" => Ok(GeomType::MultiPolygon),
            "GeometryCollection" => Ok(GeomType::GeometryCollection),
            other => Err(format!("unknown geometry type: {other}")),
        }
    }
}

/// Geometry payload carried by a node.
///
/// `parts` holds coordinate sequences: one coordinate for a point, one line
/// for a line string, rings (outer first) for a polygon, outer rings for a
/// multipolygon, and arbitrary parts for a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: GeomType,
    #[serde(default)]
    pub parts: Vec<Vec<[f64; 2]>>,
}

impl Geometry {
    pub fn new(kind: GeomType, parts: Vec<Vec<[f64; 2]>>) -> Self {
        Self { kind, parts }
    }

    pub fn point(x: f64, y: f64) -> Self {
        Self::new(GeomType::Point, vec![vec![[x, y]]])
    }

    pub fn line(coords: Vec<[f64; 2]>) -> Self {
        Self::new(GeomType::LineString, vec![coords])
    }

    pub fn polygon(ring: Vec<[f64; 2]>) -> Self {
        Self::new(GeomType::Polygon, vec![ring])
    }

    pub fn geom_type(&self) -> GeomType {
        self.kind
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("degenerate {kind} geometry: {reason}")]
    Degenerate { kind: GeomType, reason: String },

    #[error("invalid {kind} geometry: {reason}")]
    Invalid { kind: GeomType, reason: String },

    #[error("operation '{op}' is not supported for {kind}")]
    Unsupported { op: &'static str, kind: GeomType },
}

/// Geometry operations the pipeline consumes from an external engine.
///
/// Implementations must be shareable across the event loop and the worker
/// thread.
pub trait GeometryEngine: Send + Sync + fmt::Debug {
    fn classify(&self, geom: &Geometry) -> GeomType {
        geom.kind
    }

    fn validate(&self, geom: &Geometry) -> Result<(), GeometryError>;

    fn area(&self, geom: &Geometry) -> Result<f64, GeometryError>;

    /// `[min_x, min_y, max_x, max_y]`
    fn bounds(&self, geom: &Geometry) -> Result<[f64; 4], GeometryError>;
}

/// Reference planar engine: shoelace areas, axis-aligned bounds, and
/// structural validity checks. Good enough for tests and demos.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanarEngine;

impl GeometryEngine for PlanarEngine {
    fn validate(&self, geom: &Geometry) -> Result<(), GeometryError> {
        let invalid = |reason: String| GeometryError::Invalid {
            kind: geom.kind,
            reason,
        };

        match geom.kind {
            GeomType::Point => {
                if geom.parts.len() != 1 || geom.parts[0].len() != 1 {
                    return Err(invalid("a point needs exactly one coordinate".into()));
                }
            }
            GeomType::LineString => {
                if geom.parts.len() != 1 || geom.parts[0].len() < 2 {
                    return Err(invalid("a line needs at least two coordinates".into()));
                }
            }
            GeomType::Polygon | GeomType::MultiPolygon => {
                if geom.parts.is_empty() {
                    return Err(invalid("no rings".into()));
                }
                for (i, ring) in geom.parts.iter().enumerate() {
                    if ring.len() < 4 {
                        return Err(invalid(format!("ring {i} has fewer than 4 coordinates")));
                    }
                    if ring.first() != ring.last() {
                        return Err(invalid(format!("ring {i} is not closed")));
                    }
                }
            }
            GeomType::GeometryCollection => {
                if geom.parts.iter().all(|p| p.is_empty()) {
                    return Err(invalid("empty collection".into()));
                }
            }
        }

        Ok(())
    }

    fn area(&self, geom: &Geometry) -> Result<f64, GeometryError> {
        match geom.kind {
            GeomType::Point | GeomType::LineString => Ok(0.0),
            GeomType::Polygon => {
                let mut rings = geom.parts.iter();
                let outer = rings.next().ok_or_else(|| GeometryError::Degenerate {
                    kind: geom.kind,
                    reason: "no outer ring".into(),
                })?;
                let holes: f64 = rings.map(|r| ring_area(r)).sum();
                let area = ring_area(outer) - holes;
                if area <= 0.0 {
                    return Err(GeometryError::Degenerate {
                        kind: geom.kind,
                        reason: "zero area".into(),
                    });
                }
                Ok(area)
            }
            GeomType::MultiPolygon => Ok(geom.parts.iter().map(|r| ring_area(r)).sum()),
            GeomType::GeometryCollection => Err(GeometryError::Unsupported {
                op: "area",
                kind: geom.kind,
            }),
        }
    }

    fn bounds(&self, geom: &Geometry) -> Result<[f64; 4], GeometryError> {
        let mut coords = geom.parts.iter().flatten();
        let first = coords.next().ok_or_else(|| GeometryError::Degenerate {
            kind: geom.kind,
            reason: "no coordinates".into(),
        })?;

        let init = [first[0], first[1], first[0], first[1]];
        Ok(coords.fold(init, |[min_x, min_y, max_x, max_y], c| {
            [min_x.min(c[0]), min_y.min(c[1]), max_x.max(c[0]), max_y.max(c[1])]
        }))
    }
}

fn ring_area(ring: &[[f64; 2]]) -> f64 {
    let twice: f64 = ring
        .windows(2)
        .map(|w| w[0][0] * w[1][1] - w[1][0] * w[0][1])
        .sum();
    (twice / 2.0).abs()
}
