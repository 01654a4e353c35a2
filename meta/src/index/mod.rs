//! Physical index tables a schema may own.
//!
//! Each kind knows whether it applies to a schema, how its table is named,
//! how a fresh table is configured and how one schema's rows are removed
//! from a table shared with other schemas.

use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::str::FromStr;

use models::schema::FeatureType;
use models::schema::CURRENT_SCHEMA_VERSION;
use models::utils::hex_encode_non_alphanumeric;
use models::SchemaId;
use serde::{Deserialize, Serialize};
use trace::debug;

use crate::error::MetaError;
use crate::store::{BatchDeleter, KeyRange, KeyValueStore, StoreResult};

pub const BLOOM_FILTER_PROPERTY: &str = "table.bloom.enabled";
pub const LOCALITY_GROUPS_PROPERTY: &str = "table.groups.enabled";
pub const LOCALITY_GROUP_PREFIX: &str = "table.group.";

const DEFAULT_ST_SHARDS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndexTableKind {
    Records,
    Z2,
    Z3,
    Xz2,
    Xz3,
    Attribute,
    LegacySpatioTemporal,
    LegacyAttribute,
}

impl IndexTableKind {
    pub const ALL: [IndexTableKind; 8] = [
        Self::Records,
        Self::Z2,
        Self::Z3,
        Self::Xz2,
        Self::Xz3,
        Self::Attribute,
        Self::LegacySpatioTemporal,
        Self::LegacyAttribute,
    ];

    pub fn all() -> &'static [IndexTableKind] {
        &Self::ALL
    }

    /// Table name suffix, also the name accepted by the enabled index list.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Records => "records",
            Self::Z2 => "z2",
            Self::Z3 => "z3",
            Self::Xz2 => "xz2",
            Self::Xz3 => "xz3",
            Self::Attribute => "attr",
            Self::LegacySpatioTemporal => "st_idx",
            Self::LegacyAttribute => "attr_idx",
        }
    }

    /// Metadata key holding the table name of this kind.
    pub fn metadata_key(&self) -> String {
        format!("tables.{}.name", self.suffix())
    }

    /// Whether rows of several schemas may live in one table of this kind.
    pub fn is_shareable(&self) -> bool {
        !matches!(self, Self::Z3 | Self::Xz3)
    }

    pub fn supports(&self, ft: &FeatureType) -> bool {
        if *self != Self::Records {
            let enabled = ft.enabled_indices();
            if !enabled.is_empty() && !enabled.iter().any(|e| e == self.suffix()) {
                return false;
            }
        }

        let version = ft.schema_version().unwrap_or(CURRENT_SCHEMA_VERSION);
        let has_geometry = ft.geometry_descriptor().is_some();
        let has_dtg = ft.dtg_field().is_some();
        let has_indexed = ft.indexed_attributes().next().is_some();
        match self {
            Self::Records => true,
            Self::Z2 => version >= 8 && ft.is_points(),
            Self::Z3 => version >= 5 && ft.is_points() && has_dtg,
            Self::Xz2 => version >= 10 && has_geometry && !ft.is_points(),
            Self::Xz3 => version >= 10 && has_geometry && !ft.is_points() && has_dtg,
            Self::Attribute => version >= 8 && has_indexed,
            Self::LegacySpatioTemporal => version < 8 && has_geometry,
            Self::LegacyAttribute => version < 8 && has_indexed,
        }
    }

    /// Kinds applicable to `ft`, records first.
    pub fn applicable(ft: &FeatureType) -> Vec<IndexTableKind> {
        Self::ALL.into_iter().filter(|k| k.supports(ft)).collect()
    }

    /// `<catalog>_<suffix>` when shared, otherwise
    /// `<catalog>_<hex encoded schema name>_<suffix>`.
    pub fn format_table_name(&self, catalog: &str, ft: &FeatureType) -> String {
        if ft.is_table_sharing() && self.is_shareable() {
            format!("{}_{}", catalog, self.suffix())
        } else {
            format!(
                "{}_{}_{}",
                catalog,
                hex_encode_non_alphanumeric(ft.name()),
                self.suffix()
            )
        }
    }

    /// Bytes every row of `ft` starts with in a shared table of this kind.
    /// Empty when the table is not shared.
    pub fn row_prefix(&self, ft: &FeatureType) -> Vec<u8> {
        if !(ft.is_table_sharing() && self.is_shareable()) {
            return vec![];
        }
        sharing_prefix_bytes(ft)
    }

    pub async fn configure_table(
        &self,
        ft: &FeatureType,
        table: &str,
        store: &dyn KeyValueStore,
    ) -> StoreResult<()> {
        let prefix = self.row_prefix(ft);
        match self {
            Self::Records => {
                store
                    .set_table_property(table, BLOOM_FILTER_PROPERTY, "true")
                    .await?;
                if !prefix.is_empty() {
                    store.add_splits(table, BTreeSet::from([prefix])).await?;
                }
            }
            Self::Z2 | Self::Z3 | Self::Xz2 | Self::Xz3 => {
                let splits = (1..ft.z_shards())
                    .map(|shard| {
                        let mut split = prefix.clone();
                        split.push(shard);
                        split
                    })
                    .collect::<BTreeSet<_>>();
                if !splits.is_empty() {
                    store.add_splits(table, splits).await?;
                }
            }
            Self::Attribute => {
                store
                    .set_table_property(table, LOCALITY_GROUPS_PROPERTY, "attr")
                    .await?;
                store
                    .set_table_property(table, &format!("{}attr", LOCALITY_GROUP_PREFIX), "a")
                    .await?;
            }
            Self::LegacySpatioTemporal => {
                let shards = ft
                    .st_index_schema()
                    .and_then(st_index_shards)
                    .unwrap_or(DEFAULT_ST_SHARDS);
                let splits = (1..shards)
                    .map(|shard| format!("{:02}~", shard).into_bytes())
                    .collect::<BTreeSet<_>>();
                if !splits.is_empty() {
                    store.add_splits(table, splits).await?;
                }
            }
            Self::LegacyAttribute => {
                store
                    .set_table_property(table, BLOOM_FILTER_PROPERTY, "true")
                    .await?;
            }
        }
        debug!("configured {} table {} for {}", self, table, ft.name());
        Ok(())
    }

    /// Removes every row of `ft` from a shared table of this kind.
    pub async fn delete_features_for_type(
        &self,
        ft: &FeatureType,
        mut deleter: BatchDeleter,
    ) -> StoreResult<u64> {
        let prefix = sharing_prefix_bytes(ft);
        match self {
            // legacy rows lead with a shard, `<shard:02>~<prefix>...`
            Self::LegacySpatioTemporal => {
                deleter.set_ranges(vec![KeyRange::all()]);
                deleter.set_row_filter(move |row| row.len() > 3 && row[3..].starts_with(&prefix));
            }
            _ => deleter.set_ranges(vec![KeyRange::prefix(prefix)]),
        }
        deleter.delete().await
    }
}

/// Shared table prefix of `ft`: the single schema id byte for schemas
/// created with an id, the raw `<name>~` string for older schemas.
pub fn sharing_prefix_bytes(ft: &FeatureType) -> Vec<u8> {
    match ft.table_sharing_prefix() {
        Some(prefix) => match prefix.parse::<SchemaId>() {
            Ok(id) => vec![id],
            Err(_) => prefix.as_bytes().to_vec(),
        },
        None => format!("{}~", ft.name()).into_bytes(),
    }
}

/// Shard count of a legacy spatio-temporal index schema, the `%<n>#r` part
/// of e.g. `%~#s%99#r%trips#cstr%0,3#gh%yyyyMMddHH#d::%~#s%3,2#gh::%~#s%#id`.
fn st_index_shards(schema: &str) -> Option<u32> {
    schema
        .split("::")
        .next()?
        .split('%')
        .find_map(|token| token.strip_suffix("#r")?.parse::<u32>().ok())
        .filter(|n| *n > 0)
}

impl Display for IndexTableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

impl FromStr for IndexTableKind {
    type Err = MetaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.suffix() == kind)
            .ok_or(MetaError::UnknownIndexKind {
                kind: s.to_string(),
            })
    }
}
