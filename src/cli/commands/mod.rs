//! CLI command implementations

pub mod attachment;
pub mod cache;
pub mod completions;
pub mod config;
pub mod lookup;
pub mod sync;
pub mod write;

pub use attachment::execute as attachment;
pub use cache::execute as cache;
pub use completions::execute as completions;
pub use config::execute as config;
pub use lookup::execute as lookup;
pub use sync::execute as sync;
pub use write::execute as write_attachment;

use crate::bitwarden::BwCli;
use crate::cache::TtlCache;
use crate::cli::args::CacheOpts;
use crate::config::Config;
use crate::error::BwcacheResult;
use tracing::debug;

/// The configured cache, or `None` when caching is off for this call
fn open_cache(config: &Config, opts: &CacheOpts) -> BwcacheResult<Option<TtlCache>> {
    if opts.no_cache || !config.cache.enabled {
        debug!("Cache bypassed");
        return Ok(None);
    }
    TtlCache::from_config(&config.cache, opts.ttl).map(Some)
}

/// `bw` backend; attachment downloads share the cache directory when one is configured
fn bw_backend(config: &Config) -> BwCli {
    let backend = BwCli::new(config.bitwarden.program.clone());
    match &config.cache.directory {
        Some(dir) => backend.with_scratch_dir(dir.clone()),
        None => backend,
    }
}
