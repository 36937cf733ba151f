//! Error types for discovery, device construction, and configuration.

use std::path::PathBuf;

use crate::device::DeviceKind;

/// Errors that can occur while talking to the native runtime or loading files.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The native runtime could not be initialized or queried.
    #[error("discovery failed: {detail}")]
    Discovery {
        /// Why discovery failed.
        detail: String,
    },

    /// A single (sub-)device could not be built.
    #[error("cannot create {kind} #{index} on platform '{platform}': {detail}")]
    DeviceCreation {
        /// Name of the owning platform.
        platform: String,
        /// Requested device kind.
        kind: DeviceKind,
        /// Requested index within the kind.
        index: usize,
        /// Runtime-reported reason.
        detail: String,
    },

    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// I/O error reading configuration or inventory files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration or inventory file not found.
    #[error("file not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Validation error in a configuration or inventory definition.
    #[error("validation error: {detail}")]
    Validation {
        /// Description of the validation failure.
        detail: String,
    },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// A validation issue found in a configuration or inventory definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Severity: "error" or "warning".
    pub severity: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    pub(crate) fn error(message: impl Into<String>) -> Self {
        Self {
            severity: "error",
            message: message.into(),
        }
    }

    pub(crate) fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: "warning",
            message: message.into(),
        }
    }

    /// Whether this issue blocks use of the definition.
    pub fn is_error(&self) -> bool {
        self.severity == "error"
    }
}
