//! Single-result item lookup
//!
//! `bw list items --search` is a fuzzy search, so results are narrowed to
//! items whose search attribute (default `name`) equals the term exactly.
//! Exactly one item must remain.

use crate::bitwarden::backend::SecretBackend;
use crate::cache::TtlCache;
use crate::config::schema::BitwardenConfig;
use crate::error::{BwcacheError, BwcacheResult};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// What to look up and which part of the item to return
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupQuery {
    pub term: String,
    pub field: Option<String>,
    pub collection_id: Option<String>,
    pub search: String,
}

impl LookupQuery {
    /// Look up the whole item whose name equals `term`
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            field: None,
            collection_id: None,
            search: "name".to_string(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_collection(mut self, collection_id: impl Into<String>) -> Self {
        self.collection_id = Some(collection_id.into());
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// Fill unset options from configuration
    pub fn with_defaults(mut self, config: &BitwardenConfig) -> Self {
        if self.collection_id.is_none() {
            self.collection_id = config.default_collection_id.clone();
        }
        self
    }

    /// Stable cache key for this query
    pub fn cache_key(&self) -> BwcacheResult<String> {
        Ok(format!("lookup:{}", serde_json::to_string(self)?))
    }

    /// Equivalent shell pipeline, for users double-checking a failed lookup
    pub fn shell_command(&self) -> String {
        let mut lookup = format!("bw list items --search={}", shell_quote(&self.term));
        if let Some(collection_id) = &self.collection_id {
            lookup.push_str(&format!(" --collectionid={}", shell_quote(collection_id)));
        }

        let select = format!(
            ".[] | select(.[{}] == {})",
            json_string(&self.search),
            json_string(&self.term)
        );
        lookup.push_str(&format!(" | jq {}", shell_quote(&select)));

        if let Some(field) = &self.field {
            let field = json_string(field);
            let project = format!(
                "{{\"login\": .login[{field}]?, \"item\": .[{field}], \"custom_fields\": [.fields[]? | select(.name == {field}) | .value]}}"
            );
            lookup.push_str(&format!(" | jq {}", shell_quote(&project)));
        }

        format!("bw sync; {}", lookup)
    }

    fn matches(&self, item: &Value) -> bool {
        match item.get(&self.search) {
            Some(Value::String(value)) => value == &self.term,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.term,
        }
    }
}

/// Resolve `query` to exactly one value
pub async fn lookup(backend: &dyn SecretBackend, query: &LookupQuery) -> BwcacheResult<Value> {
    let items = backend
        .list_items(&query.term, query.collection_id.as_deref())
        .await?;
    debug!("bw returned {} candidate(s) for {:?}", items.len(), query.term);

    let mut matches: Vec<&Value> = items.iter().filter(|item| query.matches(item)).collect();
    let item = match matches.len() {
        0 => {
            return Err(BwcacheError::NoResults {
                query: query.term.clone(),
                command: query.shell_command(),
            })
        }
        1 => matches.remove(0),
        count => {
            return Err(BwcacheError::MultipleResults {
                query: query.term.clone(),
                count,
                command: query.shell_command(),
            })
        }
    };

    match &query.field {
        None => Ok(item.clone()),
        Some(field) => extract_field(item, field).ok_or_else(|| BwcacheError::FieldNotFound {
            field: field.clone(),
            item: query.term.clone(),
        }),
    }
}

/// [`lookup`] memoized in the shared cache
pub async fn lookup_cached(
    cache: &TtlCache,
    backend: &dyn SecretBackend,
    query: &LookupQuery,
) -> BwcacheResult<Value> {
    let key = query.cache_key()?;
    cache.get_or_compute(&key, || lookup(backend, query)).await
}

/// Login fields first, then top-level attributes, then custom fields
fn extract_field(item: &Value, field: &str) -> Option<Value> {
    if let Some(value) = item.get("login").and_then(|login| login.get(field)) {
        return Some(value.clone());
    }
    if let Some(value) = item.get(field) {
        return Some(value.clone());
    }
    item.get("fields")
        .and_then(Value::as_array)?
        .iter()
        .find(|custom| custom.get("name").and_then(Value::as_str) == Some(field))
        .and_then(|custom| custom.get("value").cloned())
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn json_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}
