use std::time::Duration;

use models::ModelError;
use snafu::Snafu;

use crate::store::StoreError;

pub type MetaResult<T> = Result<T, MetaError>;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum MetaError {
    #[snafu(display("Invalid schema '{}': {}", name, source))]
    Validation { name: String, source: ModelError },

    #[snafu(display("Failed to acquire lock '{}' within {:?}", path, timeout))]
    LockTimeout { path: String, timeout: Duration },

    #[snafu(display("Schema '{}' does not exist in catalog '{}'", name, catalog))]
    NotInitialized { name: String, catalog: String },

    #[snafu(display("Updating the {} of schema '{}' is not allowed", field, name))]
    ImmutableField { name: String, field: String },

    #[snafu(display(
        "Schema '{}' was written with format version {}, this client only understands versions up to {}. \
         Upgrade the client to the release that wrote the schema",
        name,
        found,
        supported
    ))]
    IncompatibleSchemaVersion {
        name: String,
        found: u32,
        supported: u32,
    },

    #[snafu(display("Unknown index kind: {}", kind))]
    UnknownIndexKind { kind: String },

    #[snafu(display(
        "Unable to find required metadata property '{}' of schema '{}'",
        key,
        name
    ))]
    MissingMetadata { name: String, key: String },

    #[snafu(display(
        "No schema id left in catalog '{}', at most {} schemas may be stored",
        catalog,
        max
    ))]
    SchemaIdExhausted { catalog: String, max: usize },

    #[snafu(display("Store error: {}", source))]
    Store { source: StoreError },

    #[snafu(display("Stored schema '{}' can not be decoded: {}", name, source))]
    Model { name: String, source: ModelError },

    #[snafu(display("Encode message error reason: {}", err))]
    SerdeMsgEncode { err: String },

    #[snafu(display("Decode message error reason: {}", err))]
    SerdeMsgDecode { err: String },
}

impl MetaError {
    /// Failures that may succeed when the same call is issued again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. } | Self::Store { .. })
    }
}

impl From<StoreError> for MetaError {
    fn from(source: StoreError) -> Self {
        MetaError::Store { source }
    }
}
