//! Cache command - inspect or clear the secret cache

use crate::cache::{CacheInfo, TtlCache};
use crate::cli::args::{CacheAction, CacheArgs};
use crate::config::Config;
use crate::error::BwcacheResult;
use crate::ui::{self, UiContext};

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> BwcacheResult<()> {
    let cache = TtlCache::from_config(&config.cache, None)?;

    match args.action {
        CacheAction::Path => println!("{}", cache.path().display()),
        CacheAction::Info { json } => show_info(&cache.info().await?, json)?,
        CacheAction::List => list_keys(&cache).await?,
        CacheAction::Remove { key } => remove_key(&cache, &key).await?,
        CacheAction::Clear { yes } => clear_cache(&cache, yes).await?,
    }

    Ok(())
}

fn show_info(info: &CacheInfo, json: bool) -> BwcacheResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(info)?);
        return Ok(());
    }

    let ctx = UiContext::detect();
    ui::intro(&ctx, "Secret cache");
    ui::key_value(&ctx, "Path", &info.path.display().to_string());

    if !info.exists {
        ui::remark(&ctx, "Not created yet");
        return Ok(());
    }

    ui::key_value(&ctx, "Entries", &info.entries.to_string());
    if let Some(modified) = info.modified {
        ui::key_value(
            &ctx,
            "Last write",
            &modified.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
    }
    match info.expires_in_secs {
        Some(secs) => ui::key_value(&ctx, "Expires in", &format!("{}s", secs)),
        None => ui::key_value(&ctx, "Expires in", "expired (cleared on next use)"),
    }

    Ok(())
}

async fn list_keys(cache: &TtlCache) -> BwcacheResult<()> {
    let keys = cache.keys().await?;
    if keys.is_empty() {
        ui::step_info(&UiContext::detect(), "Cache is empty");
        return Ok(());
    }

    for key in keys {
        println!("{}", key);
    }
    Ok(())
}

async fn remove_key(cache: &TtlCache, key: &str) -> BwcacheResult<()> {
    let ctx = UiContext::detect();
    if cache.remove(key).await? {
        ui::step_ok(&ctx, &format!("Removed {}", key));
    } else {
        ui::step_warn_hint(&ctx, "Key not cached", "List keys with: bwcache cache list");
    }
    Ok(())
}

async fn clear_cache(cache: &TtlCache, yes: bool) -> BwcacheResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);

    if !ui::confirm(&ctx, "Clear all cached secrets?", false).await? {
        ui::remark(&ctx, "Nothing cleared (pass --yes to skip confirmation)");
        return Ok(());
    }

    cache.clear().await?;
    ui::step_ok(&ctx, &format!("Cleared {}", cache.path().display()));
    Ok(())
}
