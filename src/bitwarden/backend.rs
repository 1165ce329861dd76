//! Secret backend abstraction and the `bw` CLI implementation

use crate::cache::resolve_shared_directory;
use crate::error::{BwcacheError, BwcacheResult};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

/// Source of Bitwarden items and attachments
///
/// `BwCli` talks to the real `bw` binary; tests substitute an in-memory vault.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Pull recent changes from the server
    async fn sync(&self) -> BwcacheResult<()>;

    /// Items matching a free-text search, optionally within one collection
    async fn list_items(&self, search: &str, collection_id: Option<&str>)
        -> BwcacheResult<Vec<Value>>;

    /// Raw bytes of an attachment on an item
    async fn download_attachment(&self, filename: &str, item_id: &str) -> BwcacheResult<Vec<u8>>;
}

/// Backend that shells out to the Bitwarden CLI
#[derive(Debug, Clone)]
pub struct BwCli {
    program: String,
    scratch_dir: Option<PathBuf>,
}

impl BwCli {
    /// Use `program` as the `bw` executable
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            scratch_dir: None,
        }
    }

    /// Directory for downloaded attachments before they are read back
    ///
    /// Without one, downloads go to the platform's memory-backed directory,
    /// resolved only when an attachment is actually fetched.
    pub fn with_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.scratch_dir = Some(dir);
        self
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }

    async fn run(&self, args: &[&str]) -> BwcacheResult<Output> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!("Running {}", command);

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BwcacheError::BwNotFound(self.program.clone())
                } else {
                    BwcacheError::command_failed(command.clone(), e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not logged in") || stderr.contains("Vault is locked") {
                return Err(BwcacheError::VaultLocked);
            }
            return Err(BwcacheError::command_exec(command, stderr.trim()));
        }

        Ok(output)
    }
}

#[async_trait]
impl SecretBackend for BwCli {
    async fn sync(&self) -> BwcacheResult<()> {
        self.run(&["sync"]).await?;
        Ok(())
    }

    async fn list_items(
        &self,
        search: &str,
        collection_id: Option<&str>,
    ) -> BwcacheResult<Vec<Value>> {
        let mut args = vec!["list", "items", "--search", search];
        if let Some(collection_id) = collection_id {
            args.extend(["--collectionid", collection_id]);
        }

        let output = self.run(&args).await?;
        serde_json::from_slice(&output.stdout).map_err(|e| BwcacheError::InvalidBwOutput {
            command: format!("{} list items", self.program),
            reason: e.to_string(),
        })
    }

    async fn download_attachment(&self, filename: &str, item_id: &str) -> BwcacheResult<Vec<u8>> {
        let scratch_dir = match &self.scratch_dir {
            Some(dir) => dir.clone(),
            None => resolve_shared_directory()?,
        };

        // NamedTempFile is created 0600 and removed on drop
        let scratch = tempfile::Builder::new()
            .prefix("bwcache.")
            .tempfile_in(&scratch_dir)
            .map_err(|e| {
                BwcacheError::io(
                    format!("creating scratch file in {}", scratch_dir.display()),
                    e,
                )
            })?;
        let scratch_path = scratch.path().to_string_lossy().into_owned();

        self.run(&[
            "get",
            "attachment",
            filename,
            "--itemid",
            item_id,
            "--output",
            &scratch_path,
        ])
        .await?;

        tokio::fs::read(scratch.path())
            .await
            .map_err(|e| BwcacheError::io(format!("reading downloaded attachment {}", scratch_path), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_bw_not_found() {
        let cli = BwCli::new("bwcache-test-no-such-binary");
        let err = cli.sync().await.unwrap_err();
        assert!(matches!(err, BwcacheError::BwNotFound(ref name) if name == "bwcache-test-no-such-binary"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_reports_stderr() {
        let cli = BwCli::new("false");
        let err = cli.list_items("anything", None).await.unwrap_err();
        assert!(matches!(err, BwcacheError::CommandExecution { .. }));
    }
}
