pub mod errors;
pub mod gis;
pub mod schema;
pub mod utils;

pub use errors::{ModelError, ModelResult};

/// Compact per-catalog identifier of a schema, used as the shared table row
/// prefix.
pub type SchemaId = u8;

/// Largest schema id that may be handed out within one catalog.
pub const MAX_SCHEMA_ID: SchemaId = 127;
