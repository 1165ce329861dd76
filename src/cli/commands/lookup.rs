//! Lookup command - resolve one item or field

use crate::bitwarden::{lookup, lookup_cached, LookupQuery};
use crate::cli::args::LookupArgs;
use crate::config::Config;
use crate::error::BwcacheResult;
use serde_json::Value;

/// Execute the lookup command
pub async fn execute(args: LookupArgs, config: &Config) -> BwcacheResult<()> {
    let mut query = LookupQuery::new(args.term)
        .with_search(args.search.unwrap_or_else(|| config.bitwarden.search.clone()));
    if let Some(field) = args.field {
        query = query.with_field(field);
    }
    if let Some(collection_id) = args.collection_id {
        query = query.with_collection(collection_id);
    }
    let query = query.with_defaults(&config.bitwarden);

    let backend = super::bw_backend(config);
    let value = match super::open_cache(config, &args.cache)? {
        Some(cache) => lookup_cached(&cache, &backend, &query).await?,
        None => lookup(&backend, &query).await?,
    };

    println!("{}", render(&value, args.json)?);
    Ok(())
}

/// Strings print raw unless JSON is requested; everything else prints as JSON
fn render(value: &Value, json: bool) -> BwcacheResult<String> {
    match value {
        Value::String(text) if !json => Ok(text.clone()),
        other => Ok(serde_json::to_string_pretty(other)?),
    }
}
