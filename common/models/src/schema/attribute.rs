use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, ModelResult};
use crate::gis::data_type::GeometryType;
use crate::schema::{OPT_DEFAULT, OPT_INDEX, OPT_SRID};

#[derive(Serialize, Deserialize, Debug, PartialEq, Copy, Clone, Eq, Hash)]
pub enum AttributeType {
    String,
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    Date,
    Uuid,
    Bytes,
    Geometry(GeometryType),
}

impl AttributeType {
    pub fn is_geometry(&self) -> bool {
        matches!(self, Self::Geometry(_))
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Self::Date)
    }
}

impl Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "String"),
            Self::Integer => write!(f, "Integer"),
            Self::Long => write!(f, "Long"),
            Self::Float => write!(f, "Float"),
            Self::Double => write!(f, "Double"),
            Self::Boolean => write!(f, "Boolean"),
            Self::Date => write!(f, "Date"),
            Self::Uuid => write!(f, "UUID"),
            Self::Bytes => write!(f, "Bytes"),
            Self::Geometry(geo) => write!(f, "{}", geo),
        }
    }
}

impl FromStr for AttributeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.to_ascii_lowercase().as_str() {
            "string" | "java.lang.string" => Self::String,
            "int" | "integer" | "java.lang.integer" => Self::Integer,
            "long" | "java.lang.long" => Self::Long,
            "float" | "java.lang.float" => Self::Float,
            "double" | "java.lang.double" => Self::Double,
            "bool" | "boolean" | "java.lang.boolean" => Self::Boolean,
            "date" | "java.util.date" | "timestamp" => Self::Date,
            "uuid" => Self::Uuid,
            "bytes" => Self::Bytes,
            other => Self::Geometry(GeometryType::from_str(other)?),
        };
        Ok(ty)
    }
}

/// A single column of a feature type.
///
/// Options are kept sorted so the encoded form is stable across reads.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Eq)]
pub struct AttributeDescriptor {
    name: String,
    binding: AttributeType,
    options: BTreeMap<String, String>,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, binding: AttributeType) -> Self {
        Self {
            name: name.into(),
            binding,
            options: BTreeMap::new(),
        }
    }

    pub fn new_geometry(name: impl Into<String>, geo: GeometryType, srid: i32) -> Self {
        let mut desc = Self::new(name, AttributeType::Geometry(geo));
        desc.options.insert(OPT_SRID.to_string(), srid.to_string());
        desc
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_index(self) -> Self {
        self.with_option(OPT_INDEX, "true")
    }

    pub fn as_default(self) -> Self {
        self.with_option(OPT_DEFAULT, "true")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn binding(&self) -> AttributeType {
        self.binding
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(|v| v.as_str())
    }

    pub fn is_indexed(&self) -> bool {
        self.option(OPT_INDEX)
            .map(|v| v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("full"))
            .unwrap_or(false)
    }

    pub fn is_default(&self) -> bool {
        self.option(OPT_DEFAULT)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn geometry_type(&self) -> Option<GeometryType> {
        match self.binding {
            AttributeType::Geometry(geo) => Some(geo),
            _ => None,
        }
    }

    pub fn srid(&self) -> ModelResult<Option<i32>> {
        match self.option(OPT_SRID) {
            None => Ok(None),
            Some(v) => v
                .parse::<i32>()
                .map(Some)
                .map_err(|e| ModelError::InvalidAttribute {
                    name: self.name.clone(),
                    reason: format!("srid '{}' is not a number: {}", v, e),
                }),
        }
    }
}
