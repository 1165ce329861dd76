//! Sync command - refresh the vault and drop stale cache entries

use crate::bitwarden::SecretBackend;
use crate::cache::TtlCache;
use crate::config::Config;
use crate::error::BwcacheResult;
use crate::ui::{TaskSpinner, UiContext};
use tracing::info;

/// Execute the sync command
pub async fn execute(config: &Config) -> BwcacheResult<()> {
    let ctx = UiContext::detect();
    let backend = super::bw_backend(config);

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Syncing vault...");
    if let Err(e) = backend.sync().await {
        spinner.stop_error("bw sync failed");
        return Err(e);
    }

    // Cached results may predate the sync
    if config.cache.enabled {
        let cache = TtlCache::from_config(&config.cache, None)?;
        cache.clear().await?;
        info!("Cleared cache at {}", cache.path().display());
        spinner.stop("Vault synced, cache cleared");
    } else {
        spinner.stop("Vault synced");
    }

    Ok(())
}
