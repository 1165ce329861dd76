//! Error types for bwcache
//!
//! All modules use `BwcacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bwcache operations
pub type BwcacheResult<T> = Result<T, BwcacheError>;

/// All errors that can occur in bwcache
#[derive(Error, Debug)]
pub enum BwcacheError {
    // Environment errors
    #[error("Unsupported platform: \"{platform}\". Supported: {supported}")]
    UnsupportedPlatform { platform: String, supported: String },

    #[error("\"{}\" is not a directory! {remedy}", path.display())]
    SharedDirectoryMissing { path: PathBuf, remedy: String },

    #[error("Bitwarden CLI not found: {0}")]
    BwNotFound(String),

    #[error("Bitwarden vault is locked or not logged in")]
    VaultLocked,

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Cache errors
    #[error("Cache key must not be empty")]
    InvalidCacheKey,

    // Lookup errors
    #[error("\nno results found!\nmake sure that your item is in the expected bitwarden collection, or specify a different collection ID.\nalso make sure you run `bw sync` to get recent changes from upstream.\nfeel free to double check my work by using the bitwarden CLI yourself:\n{command}")]
    NoResults { query: String, command: String },

    #[error("\nexpected single result but {count} results found for \"{query}\"!\nnarrow the search with a collection ID or a different search field.\nfeel free to double check my work by using the bitwarden CLI yourself:\n{command}")]
    MultipleResults {
        query: String,
        count: usize,
        command: String,
    },

    #[error("Field \"{field}\" does not exist in \"{item}\"")]
    FieldNotFound { field: String, item: String },

    #[error("Unexpected output from `{command}`: {reason}")]
    InvalidBwOutput { command: String, reason: String },

    // File writer errors
    #[error("Mode is not valid: \"{0}\" (example: \"0755\")")]
    InvalidMode(String),

    #[error("Content is not valid base64: {0}")]
    InvalidContent(String),

    #[error("Destination already exists but is not a file: {0}")]
    DestinationNotFile(PathBuf),

    #[error("No such user: \"{0}\"")]
    UnknownUser(String),

    #[error("No such group: \"{0}\"")]
    UnknownGroup(String),

    // IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl BwcacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::VaultLocked => Some("Run: bw unlock, then export BW_SESSION"),
            Self::BwNotFound(_) => {
                Some("Install the Bitwarden CLI: https://bitwarden.com/help/cli/")
            }
            Self::NoResults { .. } => Some("Run: bwcache sync"),
            Self::SharedDirectoryMissing { .. } | Self::UnsupportedPlatform { .. } => {
                Some("Point the cache elsewhere with --cache-dir or cache.directory")
            }
            _ => None,
        }
    }
}
