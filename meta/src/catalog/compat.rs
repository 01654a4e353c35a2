//! Decoding of stored schemas across format versions.
//!
//! | version | written by                | decoded as                              |
//! |---------|---------------------------|-----------------------------------------|
//! | none    | clients before versioning | properties backfilled from metadata keys |
//! | 1..=7   | spatio-temporal era       | sharing prefix defaults to `<name>~`     |
//! | 8..=10  | current clients           | as stored                               |
//! | > 10    | newer clients             | rejected                                |

use models::schema::spec::decode_type;
use models::schema::{FeatureType, CURRENT_SCHEMA_VERSION, DEFAULT_DATE_KEY};
use trace::debug;

use crate::error::{MetaError, MetaResult};
use crate::metadata::{
    CatalogMetadata, DTG_FIELD_KEY, SCHEMA_ID_KEY, SHARED_TABLES_KEY, ST_IDX_SCHEMA_KEY,
    TABLES_ENABLED_KEY, VERSION_KEY,
};

/// Versions written before schemas carried a numeric id.
const LAST_PREFIX_STRING_VERSION: u32 = 7;

pub async fn resolve_schema(
    name: &str,
    encoded: &str,
    metadata: &CatalogMetadata,
) -> MetaResult<FeatureType> {
    let mut ft = decode_type(name, encoded).map_err(|source| MetaError::Model {
        name: name.to_string(),
        source,
    })?;

    if ft.schema_version().is_none() {
        backfill_unversioned(&mut ft, metadata).await?;
    }

    let version = ft.schema_version().unwrap_or_default();
    if version > CURRENT_SCHEMA_VERSION {
        return Err(MetaError::IncompatibleSchemaVersion {
            name: name.to_string(),
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if version <= LAST_PREFIX_STRING_VERSION
        && ft.is_table_sharing()
        && ft.table_sharing_prefix().is_none()
    {
        ft.set_table_sharing_prefix(legacy_sharing_prefix(name));
    }
    Ok(ft)
}

fn legacy_sharing_prefix(name: &str) -> String {
    format!("{}~", name)
}

/// Schemas written before the format was versioned keep their derived
/// properties in separate metadata keys.
async fn backfill_unversioned(ft: &mut FeatureType, metadata: &CatalogMetadata) -> MetaResult<()> {
    let name = ft.name().to_string();
    debug!("backfilling properties of unversioned schema {}", name);

    if ft.user_data_value(DEFAULT_DATE_KEY).is_none() {
        if let Some(dtg) = metadata.read(&name, DTG_FIELD_KEY, true).await? {
            ft.set_dtg_field(dtg);
        }
    }

    let version = metadata.read_required(&name, VERSION_KEY).await?;
    let version = version
        .trim()
        .parse::<u32>()
        .map_err(|_| MetaError::MissingMetadata {
            name: name.clone(),
            key: VERSION_KEY.to_string(),
        })?;
    ft.set_schema_version(version);

    let sharing = metadata
        .read(&name, SHARED_TABLES_KEY, true)
        .await?
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        // unversioned catalogs always shared their tables
        .unwrap_or(true);
    ft.set_table_sharing(sharing);

    let prefix = match metadata.read(&name, SCHEMA_ID_KEY, true).await? {
        Some(id) => id,
        None => legacy_sharing_prefix(&name),
    };
    ft.set_table_sharing_prefix(prefix);

    if let Some(enabled) = metadata.read(&name, TABLES_ENABLED_KEY, true).await? {
        let enabled: Vec<String> = enabled
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        ft.set_enabled_indices(&enabled);
    }

    if let Some(schema) = metadata.read(&name, ST_IDX_SCHEMA_KEY, true).await? {
        ft.set_st_index_schema(schema);
    }
    Ok(())
}
