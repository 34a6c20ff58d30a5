//! Error types for Marrow

use thiserror::Error;

/// The main error type for Marrow operations.
///
/// Every variant is raised synchronously at the offending call. Nothing in
/// playback or pose evaluation produces one; numeric edge cases there resolve
/// through fallback policies instead.
#[derive(Debug, Error)]
pub enum MarrowError {
    /// Structurally invalid animation or skeleton data.
    #[error("Malformed data: {0}")]
    MalformedData(String),

    /// A direct named lookup found nothing.
    #[error("No {kind} named '{name}' in {container}")]
    ReferenceNotFound {
        kind: &'static str,
        name: String,
        container: String,
    },

    /// Missing parent or cycle in a bone hierarchy.
    #[error("Hierarchy error: {0}")]
    HierarchyError(String),

    /// A time function modifier with nothing to wrap, or bad modifier parameters.
    #[error("Invalid time function composition: {0}")]
    InvalidComposition(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),
}

/// Result type alias for Marrow operations
pub type Result<T> = std::result::Result<T, MarrowError>;

impl MarrowError {
    pub fn bone_not_found(name: &str, skeleton: &str) -> Self {
        MarrowError::ReferenceNotFound {
            kind: "bone",
            name: name.to_string(),
            container: format!("skeleton '{}'", skeleton),
        }
    }

    pub fn track_not_found(bone: &str, clip: &str) -> Self {
        MarrowError::ReferenceNotFound {
            kind: "track",
            name: bone.to_string(),
            container: format!("clip '{}'", clip),
        }
    }
}

impl From<toml::de::Error> for MarrowError {
    fn from(err: toml::de::Error) -> Self {
        MarrowError::TomlParseError(err.to_string())
    }
}
