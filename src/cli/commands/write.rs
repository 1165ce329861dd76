//! Write-attachment command - place an attachment on disk

use crate::bitwarden::{fetch_attachment, fetch_attachment_cached, AttachmentQuery};
use crate::cli::args::WriteAttachmentArgs;
use crate::config::Config;
use crate::error::{BwcacheError, BwcacheResult};

/// Execute the write-attachment command
#[cfg(unix)]
pub async fn execute(args: WriteAttachmentArgs, config: &Config) -> BwcacheResult<()> {
    use crate::writer::{parse_mode, write_file, WriteRequest};

    // Fail on a bad mode before touching the vault
    parse_mode(&args.mode)?;

    let query = AttachmentQuery::new(args.item, args.filename).with_collection(
        args.collection_id
            .or_else(|| config.bitwarden.default_collection_id.clone()),
    );

    let backend = super::bw_backend(config);
    let content_b64 = match super::open_cache(config, &args.cache)? {
        Some(cache) => fetch_attachment_cached(&cache, &backend, &query).await?,
        None => fetch_attachment(&backend, &query).await?,
    };

    let request = WriteRequest {
        content_b64,
        dest: args.dest,
        mode: args.mode,
        owner: args.owner,
        group: args.group,
        check: args.check,
    };
    let outcome = tokio::task::spawn_blocking(move || write_file(&request))
        .await
        .map_err(|e| BwcacheError::Internal(format!("write task failed: {}", e)))??;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Execute the write-attachment command
#[cfg(not(unix))]
pub async fn execute(_args: WriteAttachmentArgs, _config: &Config) -> BwcacheResult<()> {
    Err(BwcacheError::User(
        "write-attachment needs unix ownership and permissions".to_string(),
    ))
}
