use models::schema::TABLE_SHARING_SEPARATOR;

// **    <schema>~<key>                 -> value          current metadata layout, one row per key
// **    ~METADATA_<schema>             -> {key: value}   legacy layout, one json row per schema
// **    <catalog>_stats                -> stats table, same layouts as the catalog
// **    <lock prefix>/<catalog>        -> lease row of the schema lock
pub struct KeyPath {}

impl KeyPath {
    pub const LEGACY_ROW_PREFIX: &'static str = "~METADATA_";

    pub fn metadata_row(schema: &str, key: &str) -> Vec<u8> {
        format!("{}{}{}", schema, TABLE_SHARING_SEPARATOR, key).into_bytes()
    }

    pub fn metadata_prefix(schema: &str) -> Vec<u8> {
        format!("{}{}", schema, TABLE_SHARING_SEPARATOR).into_bytes()
    }

    /// Splits a current layout row into schema name and key. Legacy rows
    /// start with the separator and are not current rows.
    pub fn split_metadata_row(row: &[u8]) -> Option<(String, String)> {
        let row = std::str::from_utf8(row).ok()?;
        if row.starts_with(TABLE_SHARING_SEPARATOR) {
            return None;
        }
        let (schema, key) = row.split_once(TABLE_SHARING_SEPARATOR)?;
        Some((schema.to_string(), key.to_string()))
    }

    pub fn legacy_row(schema: &str) -> Vec<u8> {
        format!("{}{}", Self::LEGACY_ROW_PREFIX, schema).into_bytes()
    }

    pub fn legacy_schema_name(row: &[u8]) -> Option<String> {
        let row = std::str::from_utf8(row).ok()?;
        row.strip_prefix(Self::LEGACY_ROW_PREFIX).map(|s| s.to_string())
    }

    pub fn stats_table(catalog: &str) -> String {
        format!("{}_stats", catalog)
    }

    pub fn lock_table(catalog: &str, table: &str) -> String {
        format!("{}_{}", catalog, table)
    }

    pub fn lock_path(path_prefix: &str, catalog: &str) -> String {
        format!("{}/{}", path_prefix.trim_end_matches('/'), catalog)
    }
}
