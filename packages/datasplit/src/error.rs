//! Error types for the split planner.
//!
//! Configuration and discovery failures carry the offending group and split
//! kind so a message is actionable without a debugger.

use thiserror::Error;

use crate::types::SplitKind;

/// Main error type for the datasplit library.
#[derive(Debug, Error)]
pub enum SplitError {
    /// The configuration is invalid or inconsistent with the discovered data.
    #[error("Configuration error{}: {message}", location(.group, .split))]
    Configuration {
        group: Option<String>,
        split: Option<SplitKind>,
        message: String,
    },

    /// Files for a group could not be discovered.
    #[error("Discovery error in group '{group}': {message}")]
    Discovery { group: String, message: String },

    /// The configuration file is not valid TOML.
    #[error("TOML parsing failed: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Report serialization failed.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SplitError {
    /// Configuration error not tied to a group or split kind.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            group: None,
            split: None,
            message: message.into(),
        }
    }

    /// Configuration error about a single group.
    pub fn group_config(group: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            group: Some(group.into()),
            split: None,
            message: message.into(),
        }
    }

    /// Configuration error about a split kind, optionally within a group.
    pub fn split_config(
        group: Option<&str>,
        split: SplitKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            group: group.map(String::from),
            split: Some(split),
            message: message.into(),
        }
    }

    /// Discovery error for a group.
    pub fn discovery(group: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Discovery {
            group: group.into(),
            message: message.into(),
        }
    }
}

fn location(group: &Option<String>, split: &Option<SplitKind>) -> String {
    match (group, split) {
        (Some(g), Some(s)) => format!(" in group '{g}' ({s})"),
        (Some(g), None) => format!(" in group '{g}'"),
        (None, Some(s)) => format!(" ({s})"),
        (None, None) => String::new(),
    }
}

/// Result type alias for datasplit operations.
pub type Result<T> = std::result::Result<T, SplitError>;
