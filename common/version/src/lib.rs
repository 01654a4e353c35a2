pub const GIT_HASH: Option<&str> = option_env!("GIT_HASH");
pub const BUILD_TIME: Option<&str> = option_env!("BUILD_TIME");

/// Get the version of crate calling this macro.
#[macro_export]
macro_rules! crate_version {
    () => {
        format!(
            "{}, revision: {}, build_time: {}",
            env!("CARGO_PKG_VERSION"),
            $crate::GIT_HASH.unwrap_or("UNKNOWN"),
            $crate::BUILD_TIME.unwrap_or("UNKNOWN")
        )
    };
}

/// The release version shared by every workspace member. Client and store
/// side code built from the same release report the same value.
pub fn project_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Get the workspace version with revision and build time, for display.
pub fn workspace_version() -> &'static str {
    use std::sync::LazyLock;

    static VERSION: LazyLock<&'static str> =
        LazyLock::new(|| Box::leak(crate_version!().into_boxed_str()));

    *VERSION
}

#[cfg(test)]
mod test {
    use super::{project_version, workspace_version};

    #[test]
    fn test_versions() {
        assert!(!project_version().is_empty());
        assert!(workspace_version().starts_with(project_version()));
    }
}
