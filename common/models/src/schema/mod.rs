//! Feature type model stored by the catalog.
//!
//! - FeatureType                   ---> schema, one per type name
//!     - AttributeDescriptor #1    ---> column
//!     - AttributeDescriptor #2
//!     - user data                 ---> open key/value metadata

pub mod attribute;
pub mod feature_type;
pub mod spec;

pub use attribute::{AttributeDescriptor, AttributeType};
pub use feature_type::{FeatureType, FeatureTypeRef};

/// Highest on-disk schema format understood by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 10;

/// Separator reserved for table sharing row prefixes and metadata row keys.
pub const TABLE_SHARING_SEPARATOR: char = '~';

pub const SCHEMA_VERSION_KEY: &str = "geomesa.version";
pub const TABLE_SHARING_KEY: &str = "geomesa.table.sharing";
pub const SHARING_PREFIX_KEY: &str = "geomesa.table.sharing.prefix";
pub const DEFAULT_DATE_KEY: &str = "geomesa.index.dtg";
pub const ENABLED_INDICES_KEY: &str = "geomesa.indices.enabled";
pub const ST_INDEX_SCHEMA_KEY: &str = "geomesa.index.st.schema";
pub const Z_SPLITS_KEY: &str = "geomesa.z.splits";
pub const KEYWORDS_KEY: &str = "geomesa.keywords";

pub const KEYWORDS_DELIMITER: &str = "\u{0000}";

/// Attribute options understood by the spec codec.
pub const OPT_DEFAULT: &str = "default";
pub const OPT_INDEX: &str = "index";
pub const OPT_SRID: &str = "srid";

/// User data the catalog derives and guards itself. Every other user data
/// entry is free-form and may be changed after creation.
pub const MANAGED_USER_DATA: [&str; 6] = [
    SCHEMA_VERSION_KEY,
    TABLE_SHARING_KEY,
    SHARING_PREFIX_KEY,
    DEFAULT_DATE_KEY,
    ENABLED_INDICES_KEY,
    ST_INDEX_SCHEMA_KEY,
];

/// Attribute names that collide with the encoded row layout.
pub const RESERVED_ATTRIBUTE_NAMES: [&str; 3] = ["__fid__", "__version__", "__stats__"];
