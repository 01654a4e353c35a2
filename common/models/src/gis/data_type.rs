use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq, Copy, Clone, Eq, Hash, Ord, PartialOrd)]
pub enum GeometryType {
    Geometry,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryType {
    /// Point geometries are indexed with the z-order curves, everything
    /// else needs the extended (xz) curves.
    pub fn is_point(&self) -> bool {
        matches!(self, Self::Point)
    }
}

impl Display for GeometryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Geometry => write!(f, "Geometry"),
            Self::Point => write!(f, "Point"),
            Self::LineString => write!(f, "LineString"),
            Self::Polygon => write!(f, "Polygon"),
            Self::MultiPoint => write!(f, "MultiPoint"),
            Self::MultiLineString => write!(f, "MultiLineString"),
            Self::MultiPolygon => write!(f, "MultiPolygon"),
            Self::GeometryCollection => write!(f, "GeometryCollection"),
        }
    }
}

impl FromStr for GeometryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GEOMETRY" => Ok(Self::Geometry),
            "POINT" => Ok(Self::Point),
            "LINESTRING" => Ok(Self::LineString),
            "POLYGON" => Ok(Self::Polygon),
            "MULTIPOINT" => Ok(Self::MultiPoint),
            "MULTILINESTRING" => Ok(Self::MultiLineString),
            "MULTIPOLYGON" => Ok(Self::MultiPolygon),
            "GEOMETRYCOLLECTION" => Ok(Self::GeometryCollection),
            other => {
                Err(format!("Invalid geometry type: {}, excepted: Geometry | Point | LineString | Polygon | MultiPoint | MultiLineString | MultiPolygon | GeometryCollection", other))
            }
        }
    }
}
