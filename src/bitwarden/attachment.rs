//! Attachment retrieval by item name

use crate::bitwarden::backend::SecretBackend;
use crate::bitwarden::lookup::{lookup, LookupQuery};
use crate::cache::TtlCache;
use crate::error::{BwcacheError, BwcacheResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// An attachment on a uniquely named item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentQuery {
    pub item: String,
    pub filename: String,
    pub collection_id: Option<String>,
}

impl AttachmentQuery {
    pub fn new(item: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            filename: filename.into(),
            collection_id: None,
        }
    }

    pub fn with_collection(mut self, collection_id: Option<String>) -> Self {
        self.collection_id = collection_id;
        self
    }

    pub fn cache_key(&self) -> BwcacheResult<String> {
        Ok(format!("attachment:{}", serde_json::to_string(self)?))
    }

    fn id_query(&self) -> LookupQuery {
        let query = LookupQuery::new(&self.item).with_field("id");
        match &self.collection_id {
            Some(collection_id) => query.with_collection(collection_id),
            None => query,
        }
    }
}

/// Download the attachment and return it base64-encoded
pub async fn fetch_attachment(
    backend: &dyn SecretBackend,
    query: &AttachmentQuery,
) -> BwcacheResult<String> {
    let item_id = match lookup(backend, &query.id_query()).await? {
        Value::String(id) => id,
        other => {
            return Err(BwcacheError::InvalidBwOutput {
                command: "bw list items".to_string(),
                reason: format!("item id is not a string: {}", other),
            })
        }
    };

    debug!("Downloading attachment {} from item {}", query.filename, item_id);
    let bytes = backend.download_attachment(&query.filename, &item_id).await?;
    Ok(STANDARD.encode(bytes))
}

/// [`fetch_attachment`] memoized in the shared cache
pub async fn fetch_attachment_cached(
    cache: &TtlCache,
    backend: &dyn SecretBackend,
    query: &AttachmentQuery,
) -> BwcacheResult<String> {
    let key = query.cache_key()?;
    let value = cache
        .get_or_compute(&key, || async {
            fetch_attachment(backend, query).await.map(Value::String)
        })
        .await?;

    match value {
        Value::String(encoded) => Ok(encoded),
        other => Err(BwcacheError::Internal(format!(
            "cached attachment for {} is not a string: {}",
            query.item,
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        _ => "scalar",
    }
}
