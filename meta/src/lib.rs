pub mod catalog;
pub mod error;
pub mod index;
pub mod lock;
pub mod metadata;
pub mod query;
pub mod stats;
pub mod store;
pub mod version_check;

pub use catalog::{CatalogBuilder, SchemaCatalog, SchemaDescription};
pub use error::{MetaError, MetaResult};
pub use index::IndexTableKind;
