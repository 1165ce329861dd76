//! Bitwarden access through the `bw` CLI

pub mod attachment;
pub mod backend;
pub mod lookup;

pub use attachment::{fetch_attachment, fetch_attachment_cached, AttachmentQuery};
pub use backend::{BwCli, SecretBackend};
pub use lookup::{lookup, lookup_cached, LookupQuery};
