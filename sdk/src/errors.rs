//! Error types and handling
//!
//! This module provides the error taxonomy shared by every EDBP component.
//! All errors implement the `PluginErrorExt` trait which provides
//! user-friendly hints and indicates whether errors are recoverable.
//!
//! # Propagation
//!
//! Install-time errors (missing manifest, parse, validation) are returned to
//! the caller as a structured failure so remediation text can be displayed.
//! Loader errors are returned as well and never leave a plugin half-loaded.

use std::fmt;
use thiserror::Error;

/// Trait for plugin error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information.
pub trait PluginErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and never contains
    /// file contents or raw parser output.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or fixed by the plugin author.
    /// Non-recoverable errors need the archive itself to be replaced.
    fn is_recoverable(&self) -> bool;
}

/// Why `plugin.json` could not be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailure {
    /// A raw control character (usually a newline) inside a string
    ControlCharacter,
    /// Stray or missing comma, unmatched brace, wrong root type
    Syntax,
    /// A string literal that never closes
    UnterminatedString,
}

impl ParseFailure {
    /// Remediation text shown next to the parser diagnosis
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::ControlCharacter => {
                "Cause: a JSON string contains a raw control character (such as a line break).\n\
                 Fix: escape line breaks inside strings as \\n.\n\
                 Example: \"description\": \"first line\\nsecond line\""
            }
            Self::Syntax => {
                "Cause: JSON syntax error (comma or quote mismatch).\n\
                 Fix: check the JSON syntax.\n\
                 - wrap every string in double quotes\n\
                 - do not put a comma after the last property\n\
                 - make sure every bracket is closed"
            }
            Self::UnterminatedString => {
                "Cause: a string is not closed (quote mismatch).\n\
                 Fix: make sure every string has an opening and a closing quote."
            }
        }
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ControlCharacter => "control character",
            Self::Syntax => "syntax error",
            Self::UnterminatedString => "unterminated string",
        };
        f.write_str(label)
    }
}

/// A manifest that parsed but is not acceptable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// First required field (in schema order) that is absent or empty
    MissingField(&'static str),
    /// The id does not match `^[a-z0-9_-]+$`
    InvalidId(String),
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing required field: {}", field),
            Self::InvalidId(id) => write!(
                f,
                "invalid plugin id '{}': only lowercase letters, digits, '-' and '_' are allowed",
                id
            ),
        }
    }
}

/// Main plugin error type
///
/// # Error Categories
///
/// - **Install**: archive, manifest, and validation failures
/// - **Loader**: entry resolution, double loads, script failures
/// - **Discovery**: rate limits and other HTTP failures
/// - **Ambient**: storage, configuration, I/O
///
/// # Examples
///
/// ```
/// use sdk::errors::{PluginError, PluginErrorExt};
///
/// let error = PluginError::AlreadyLoaded("dark-theme".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// assert!(!PluginError::ManifestMissing.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum PluginError {
    // Install errors
    #[error("plugin.json not found: the archive needs a plugin.json at its root or in any folder")]
    ManifestMissing,

    #[error("failed to parse plugin.json ({reason}): {detail}\n\n{}", .reason.remediation())]
    ManifestParse { reason: ParseFailure, detail: String },

    #[error("Validation failed: {0}")]
    Validation(ValidationFailure),

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    // Loader errors
    #[error("Entry file not found: {0}")]
    EntryNotFound(String),

    #[error("Plugin already loaded: {0}")]
    AlreadyLoaded(String),

    #[error("Plugin not installed: {0}")]
    NotInstalled(String),

    #[error("Plugin execution failed: {0}")]
    Execution(String),

    // Discovery errors
    #[error("Repository search rate limit reached. Wait a while and try again")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    // Ambient errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PluginErrorExt for PluginError {
    fn user_hint(&self) -> &str {
        match self {
            // Install errors
            Self::ManifestMissing => "Add a plugin.json to the archive and try again",
            Self::ManifestParse { .. } => "Fix plugin.json using the remediation text above",
            Self::Validation(ValidationFailure::MissingField(_)) => {
                "plugin.json must declare id, name, version, author and main"
            }
            Self::Validation(ValidationFailure::InvalidId(_)) => {
                "Plugin ids may only use lowercase letters, digits, hyphens and underscores"
            }
            Self::InvalidArchive(_) => "The file is not a valid zip archive",

            // Loader errors
            Self::EntryNotFound(_) => "The entry script named by 'main' is missing from the archive",
            Self::AlreadyLoaded(_) => "The plugin is already running",
            Self::NotInstalled(_) => "Install the plugin first",
            Self::Execution(_) => "The plugin script failed. Contact the plugin author",

            // Discovery errors
            Self::RateLimited => "Too many requests. Wait a few minutes before retrying",
            Self::Network(_) => {
                "Network operation failed. Download the zip and install it from a file instead"
            }

            // Ambient errors
            Self::Storage(_) => "Local plugin storage failed. Try restarting the editor",
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Non-recoverable errors: the archive itself must change
            Self::ManifestMissing | Self::InvalidArchive(_) | Self::EntryNotFound(_) => false,

            // All other errors are potentially recoverable
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = PluginError::Validation(ValidationFailure::MissingField("author"));
        assert!(err.to_string().contains("author"));
    }

    #[test]
    fn test_parse_error_carries_remediation() {
        let err = PluginError::ManifestParse {
            reason: ParseFailure::ControlCharacter,
            detail: "control character found".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("control character"));
        assert!(text.contains("\\n"));
    }

    #[test]
    fn test_each_parse_failure_has_distinct_hint() {
        let hints = [
            ParseFailure::ControlCharacter.remediation(),
            ParseFailure::Syntax.remediation(),
            ParseFailure::UnterminatedString.remediation(),
        ];
        assert_ne!(hints[0], hints[1]);
        assert_ne!(hints[1], hints[2]);
        assert_ne!(hints[0], hints[2]);
    }

    #[test]
    fn test_recoverability() {
        assert!(PluginError::RateLimited.is_recoverable());
        assert!(PluginError::Execution("boom".into()).is_recoverable());
        assert!(!PluginError::ManifestMissing.is_recoverable());
        assert!(!PluginError::EntryNotFound("main.js".into()).is_recoverable());
    }
}
