use std::fmt::Debug;

use snafu::Snafu;

pub type ModelResult<T, E = ModelError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ModelError {
    #[snafu(display("Invalid feature type name '{}': {}", name, reason))]
    InvalidTypeName { name: String, reason: String },

    #[snafu(display("Invalid attribute '{}': {}", name, reason))]
    InvalidAttribute { name: String, reason: String },

    #[snafu(display("Unknown attribute type '{}' for attribute '{}'", binding, name))]
    UnknownAttributeType { name: String, binding: String },

    #[snafu(display("Invalid geometry type: {}", err))]
    InvalidGeometryType { err: String },

    #[snafu(display("Invalid spec string '{}': {}", spec, reason))]
    InvalidSpec { spec: String, reason: String },

    #[snafu(display("Invalid user data '{}': {}", key, reason))]
    InvalidUserData { key: String, reason: String },
}
