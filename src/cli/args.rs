//! CLI argument definitions using clap derive

use clap::{ArgAction, Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// bwcache - Bitwarden lookups with a shared in-memory cache
///
/// Looks up items and attachments through the `bw` CLI and memoizes results
/// in a file-locked cache on a memory-backed filesystem, so repeated lookups
/// from short-lived processes only hit the vault once.
#[derive(Parser, Debug)]
#[command(name = "bwcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "BWCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .bwcache.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Directory holding the cache file (default: platform ramdisk)
    #[arg(long, global = true, env = "BWCACHE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Bitwarden CLI executable
    #[arg(long = "bw", global = true, env = "BWCACHE_BW")]
    pub bw: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Look up exactly one item, or one field of it
    Lookup(LookupArgs),

    /// Print an item's attachment as base64
    Attachment(AttachmentArgs),

    /// Write an item's attachment to a file with owner, group and mode
    WriteAttachment(WriteAttachmentArgs),

    /// Run `bw sync` and discard cached results
    Sync,

    /// Inspect or clear the secret cache
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Cache controls shared by lookup commands
#[derive(Args, Debug, Clone, Default)]
pub struct CacheOpts {
    /// Cache lifetime in seconds (default: cache.ttl_secs)
    #[arg(long)]
    pub ttl: Option<u64>,

    /// Bypass the cache for this call
    #[arg(long)]
    pub no_cache: bool,
}

/// Arguments for the lookup command
#[derive(Parser, Debug)]
pub struct LookupArgs {
    /// Value the search attribute must equal (usually the item name)
    pub term: String,

    /// Return only this field (login, item attribute or custom field)
    #[arg(short, long)]
    pub field: Option<String>,

    /// Restrict the search to one collection
    #[arg(long)]
    pub collection_id: Option<String>,

    /// Item attribute compared against the term (default: bitwarden.search)
    #[arg(long)]
    pub search: Option<String>,

    /// Print string results JSON-encoded
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub cache: CacheOpts,
}

/// Arguments for the attachment command
#[derive(Parser, Debug)]
pub struct AttachmentArgs {
    /// Item name
    pub item: String,

    /// Attachment file name on the item
    #[arg(long)]
    pub filename: String,

    /// Restrict the item search to one collection
    #[arg(long)]
    pub collection_id: Option<String>,

    #[command(flatten)]
    pub cache: CacheOpts,
}

/// Arguments for the write-attachment command
#[derive(Parser, Debug)]
pub struct WriteAttachmentArgs {
    /// Item name
    pub item: String,

    /// Attachment file name on the item
    #[arg(long)]
    pub filename: String,

    /// Destination file
    #[arg(long)]
    pub dest: PathBuf,

    /// Octal file mode, e.g. 0600
    #[arg(long)]
    pub mode: String,

    /// Owner user name or uid (default: current user)
    #[arg(long)]
    pub owner: Option<String>,

    /// Group name or gid (default: current group)
    #[arg(long)]
    pub group: Option<String>,

    /// Restrict the item search to one collection
    #[arg(long)]
    pub collection_id: Option<String>,

    /// Report what would change without writing
    #[arg(long)]
    pub check: bool,

    #[command(flatten)]
    pub cache: CacheOpts,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print the cache file path
    Path,

    /// Show cache file status
    Info {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List cached keys (values are never printed)
    List,

    /// Drop one cached entry
    Remove {
        /// Cache key as shown by `cache list`
        key: String,
    },

    /// Drop every cached entry
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., cache.ttl_secs)
        key: String,
        /// Value to set
        value: String,
        /// Write to project-local .bwcache.toml instead of global config
        #[arg(long)]
        local: bool,
    },
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}
