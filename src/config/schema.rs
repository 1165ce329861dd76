//! Configuration schema for bwcache
//!
//! Configuration is stored at `~/.config/bwcache/config.toml`, with optional
//! project-local overrides in `.bwcache.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Secret cache settings
    pub cache: CacheConfig,

    /// Bitwarden CLI settings
    pub bitwarden: BitwardenConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Secret cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache lookups at all (default: true)
    pub enabled: bool,

    /// Seconds since the last cache write before the whole cache is discarded
    pub ttl_secs: u64,

    /// File name of the cache inside the shared directory
    pub basename: String,

    /// Override the memory-backed directory (default: per-platform ramdisk)
    pub directory: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
            basename: "bwcache.json".to_string(),
            directory: None,
        }
    }
}

/// Bitwarden CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BitwardenConfig {
    /// Path or name of the `bw` executable
    pub program: String,

    /// Item attribute compared against the search term
    pub search: String,

    /// Collection used when a lookup does not name one
    pub default_collection_id: Option<String>,
}

impl Default for BitwardenConfig {
    fn default() -> Self {
        Self {
            program: "bw".to_string(),
            search: "name".to_string(),
            default_collection_id: None,
        }
    }
}
