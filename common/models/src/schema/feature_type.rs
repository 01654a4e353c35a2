use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, ModelResult};
use crate::gis::data_type::GeometryType;
use crate::schema::attribute::AttributeDescriptor;
use crate::schema::{
    DEFAULT_DATE_KEY, ENABLED_INDICES_KEY, KEYWORDS_DELIMITER, KEYWORDS_KEY,
    RESERVED_ATTRIBUTE_NAMES, SCHEMA_VERSION_KEY, SHARING_PREFIX_KEY, ST_INDEX_SCHEMA_KEY,
    TABLE_SHARING_KEY, TABLE_SHARING_SEPARATOR, Z_SPLITS_KEY,
};

pub type FeatureTypeRef = Arc<FeatureType>;

const DEFAULT_Z_SPLITS: u8 = 4;

// Delimiters of the encoded spec string, written unescaped everywhere but in
// user data values.
const ATTRIBUTE_NAME_SYNTAX: &[char] = &[',', ':', ';', '*', '=', '\''];
const OPTION_KEY_SYNTAX: &[char] = &[',', ':', ';', '='];
const OPTION_VALUE_SYNTAX: &[char] = &[',', ':', ';'];
const USER_DATA_KEY_SYNTAX: &[char] = &[',', ';', '=', '\''];

fn is_encodable(token: &str, syntax: &[char]) -> bool {
    !token.is_empty() && token.trim() == token && !token.contains(syntax)
}

/// A named feature type: ordered attributes plus open user data.
///
/// Derived catalog properties (schema version, table sharing, default date,
/// enabled indices) live in the user data so they travel with the encoded
/// spec string.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Eq)]
pub struct FeatureType {
    name: String,
    attributes: Vec<AttributeDescriptor>,
    user_data: BTreeMap<String, String>,
}

impl FeatureType {
    pub fn new(name: impl Into<String>, attributes: Vec<AttributeDescriptor>) -> Self {
        Self {
            name: name.into(),
            attributes,
            user_data: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    pub fn user_data(&self) -> &BTreeMap<String, String> {
        &self.user_data
    }

    pub fn user_data_value(&self, key: &str) -> Option<&str> {
        self.user_data.get(key).map(|v| v.as_str())
    }

    pub fn set_user_data(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.user_data.insert(key.into(), value.into());
    }

    pub fn remove_user_data(&mut self, key: &str) -> Option<String> {
        self.user_data.remove(key)
    }

    pub fn with_user_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_user_data(key, value);
        self
    }

    /// The default geometry is the attribute flagged `*`, falling back to
    /// the first geometry attribute.
    pub fn geometry_descriptor(&self) -> Option<&AttributeDescriptor> {
        self.attributes
            .iter()
            .find(|a| a.is_default() && a.binding().is_geometry())
            .or_else(|| self.attributes.iter().find(|a| a.binding().is_geometry()))
    }

    pub fn geometry_type(&self) -> Option<GeometryType> {
        self.geometry_descriptor().and_then(|a| a.geometry_type())
    }

    pub fn is_points(&self) -> bool {
        self.geometry_type()
            .map(|geo| geo.is_point())
            .unwrap_or(false)
    }

    pub fn indexed_attributes(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.iter().filter(|a| a.is_indexed())
    }

    /// The date attribute used for spatio-temporal indexing. Without an
    /// explicit setting the first date attribute is used.
    pub fn dtg_field(&self) -> Option<&str> {
        match self.user_data_value(DEFAULT_DATE_KEY) {
            Some(dtg) => Some(dtg),
            None => self
                .attributes
                .iter()
                .find(|a| a.binding().is_date())
                .map(|a| a.name()),
        }
    }

    pub fn set_dtg_field(&mut self, dtg: impl Into<String>) {
        self.set_user_data(DEFAULT_DATE_KEY, dtg);
    }

    pub fn schema_version(&self) -> Option<u32> {
        self.user_data_value(SCHEMA_VERSION_KEY)
            .and_then(|v| v.parse::<u32>().ok())
    }

    pub fn set_schema_version(&mut self, version: u32) {
        self.set_user_data(SCHEMA_VERSION_KEY, version.to_string());
    }

    pub fn is_table_sharing(&self) -> bool {
        self.user_data_value(TABLE_SHARING_KEY)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn set_table_sharing(&mut self, sharing: bool) {
        self.set_user_data(TABLE_SHARING_KEY, sharing.to_string());
    }

    pub fn table_sharing_prefix(&self) -> Option<&str> {
        self.user_data_value(SHARING_PREFIX_KEY)
    }

    pub fn set_table_sharing_prefix(&mut self, prefix: impl Into<String>) {
        self.set_user_data(SHARING_PREFIX_KEY, prefix);
    }

    /// Explicitly enabled index names, empty when every applicable index is
    /// enabled.
    pub fn enabled_indices(&self) -> Vec<String> {
        self.user_data_value(ENABLED_INDICES_KEY)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_enabled_indices(&mut self, indices: &[String]) {
        self.set_user_data(ENABLED_INDICES_KEY, indices.join(","));
    }

    pub fn st_index_schema(&self) -> Option<&str> {
        self.user_data_value(ST_INDEX_SCHEMA_KEY)
    }

    pub fn set_st_index_schema(&mut self, schema: impl Into<String>) {
        self.set_user_data(ST_INDEX_SCHEMA_KEY, schema);
    }

    pub fn z_shards(&self) -> u8 {
        self.user_data_value(Z_SPLITS_KEY)
            .and_then(|v| v.parse::<u8>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_Z_SPLITS)
    }

    pub fn keywords(&self) -> Vec<String> {
        self.user_data_value(KEYWORDS_KEY)
            .map(|v| {
                v.split(KEYWORDS_DELIMITER)
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn add_keywords(&mut self, keywords: &[&str]) {
        let mut existing = self.keywords();
        for k in keywords {
            if !existing.iter().any(|e| e == k) {
                existing.push(k.to_string());
            }
        }
        self.set_user_data(KEYWORDS_KEY, existing.join(KEYWORDS_DELIMITER));
    }

    pub fn remove_keywords(&mut self, keywords: &[&str]) {
        let remaining: Vec<String> = self
            .keywords()
            .into_iter()
            .filter(|e| !keywords.contains(&e.as_str()))
            .collect();
        if remaining.is_empty() {
            self.user_data.remove(KEYWORDS_KEY);
        } else {
            self.set_user_data(KEYWORDS_KEY, remaining.join(KEYWORDS_DELIMITER));
        }
    }

    /// Structural checks applied before a schema is persisted.
    pub fn validate(&self) -> ModelResult<()> {
        if self.name.trim().is_empty() {
            return Err(ModelError::InvalidTypeName {
                name: self.name.clone(),
                reason: "name is empty".to_string(),
            });
        }
        if self.name.contains(TABLE_SHARING_SEPARATOR) {
            return Err(ModelError::InvalidTypeName {
                name: self.name.clone(),
                reason: format!(
                    "'{}' is reserved as the table sharing separator",
                    TABLE_SHARING_SEPARATOR
                ),
            });
        }
        if self.attributes.is_empty() {
            return Err(ModelError::InvalidTypeName {
                name: self.name.clone(),
                reason: "no attributes defined".to_string(),
            });
        }

        let mut seen = HashSet::new();
        let mut defaults = 0;
        for attr in &self.attributes {
            if attr.name().trim().is_empty() {
                return Err(ModelError::InvalidAttribute {
                    name: attr.name().to_string(),
                    reason: "attribute name is empty".to_string(),
                });
            }
            if !is_encodable(attr.name(), ATTRIBUTE_NAME_SYNTAX) {
                return Err(ModelError::InvalidAttribute {
                    name: attr.name().to_string(),
                    reason: format!(
                        "attribute name may not contain {:?} or surrounding whitespace",
                        ATTRIBUTE_NAME_SYNTAX
                    ),
                });
            }
            for (key, value) in attr.options() {
                if !is_encodable(key, OPTION_KEY_SYNTAX)
                    || (value.trim() != value || value.contains(OPTION_VALUE_SYNTAX))
                {
                    return Err(ModelError::InvalidAttribute {
                        name: attr.name().to_string(),
                        reason: format!("option {}={} can not be encoded", key, value),
                    });
                }
            }
            if RESERVED_ATTRIBUTE_NAMES.contains(&attr.name()) {
                return Err(ModelError::InvalidAttribute {
                    name: attr.name().to_string(),
                    reason: "attribute name is reserved".to_string(),
                });
            }
            if !seen.insert(attr.name()) {
                return Err(ModelError::InvalidAttribute {
                    name: attr.name().to_string(),
                    reason: "duplicate attribute name".to_string(),
                });
            }
            if attr.is_default() {
                if !attr.binding().is_geometry() {
                    return Err(ModelError::InvalidAttribute {
                        name: attr.name().to_string(),
                        reason: "only geometries may be the default attribute".to_string(),
                    });
                }
                defaults += 1;
            }
            attr.srid()?;
        }
        if defaults > 1 {
            return Err(ModelError::InvalidTypeName {
                name: self.name.clone(),
                reason: "more than one default geometry".to_string(),
            });
        }

        if let Some(key) = self
            .user_data
            .keys()
            .find(|k| !is_encodable(k, USER_DATA_KEY_SYNTAX))
        {
            return Err(ModelError::InvalidUserData {
                key: key.clone(),
                reason: format!(
                    "user data key may not be empty or contain {:?}",
                    USER_DATA_KEY_SYNTAX
                ),
            });
        }

        if let Some(dtg) = self.user_data_value(DEFAULT_DATE_KEY) {
            match self.attribute(dtg) {
                Some(attr) if attr.binding().is_date() => {}
                _ => {
                    return Err(ModelError::InvalidUserData {
                        key: DEFAULT_DATE_KEY.to_string(),
                        reason: format!("'{}' is not a date attribute", dtg),
                    })
                }
            }
        }

        Ok(())
    }
}
