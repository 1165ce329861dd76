//! Attachment command - print an attachment as base64

use crate::bitwarden::{fetch_attachment, fetch_attachment_cached, AttachmentQuery};
use crate::cli::args::AttachmentArgs;
use crate::config::Config;
use crate::error::BwcacheResult;

/// Execute the attachment command
pub async fn execute(args: AttachmentArgs, config: &Config) -> BwcacheResult<()> {
    let query = AttachmentQuery::new(args.item, args.filename).with_collection(
        args.collection_id
            .or_else(|| config.bitwarden.default_collection_id.clone()),
    );

    let backend = super::bw_backend(config);
    let encoded = match super::open_cache(config, &args.cache)? {
        Some(cache) => fetch_attachment_cached(&cache, &backend, &query).await?,
        None => fetch_attachment(&backend, &query).await?,
    };

    println!("{}", encoded);
    Ok(())
}
