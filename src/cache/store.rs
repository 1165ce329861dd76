//! Cross-process TTL cache backed by a single JSON file
//!
//! Every read-modify-write cycle runs under an exclusive `flock` on the cache
//! file itself, so independent bwcache processes never interleave. Expiry is
//! whole-file: once the file's mtime is older than the TTL, the next caller
//! truncates it before taking the lock.

use crate::cache::observer::{CacheEvent, CacheObserver, TracingObserver};
use crate::error::{BwcacheError, BwcacheResult};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::warn;

type CacheMap = Map<String, Value>;

/// Label used for observer events that are not tied to one key
const MAINTENANCE_KEY: &str = "*";

/// File-backed cache with whole-file TTL expiry
#[derive(Clone)]
pub struct TtlCache {
    path: PathBuf,
    ttl: Duration,
    observer: Arc<dyn CacheObserver>,
}

/// Snapshot of the cache file for display
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    pub path: PathBuf,
    pub exists: bool,
    pub entries: usize,
    pub modified: Option<DateTime<Utc>>,
    /// Seconds until the whole cache expires, `None` once it has
    pub expires_in_secs: Option<u64>,
}

impl TtlCache {
    /// Create a cache at `path` whose contents live for `ttl`
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the diagnostic observer
    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `key`, or compute, store and return it.
    ///
    /// `compute` runs while the exclusive lock is held and only on a miss.
    /// Its error is returned unchanged and nothing is written.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> BwcacheResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BwcacheResult<Value>>,
    {
        if key.is_empty() {
            return Err(BwcacheError::InvalidCacheKey);
        }

        let (locked, mut map) = self.open_and_read(key).await?;

        if let Some(value) = map.get(key) {
            self.observer.event(key, CacheEvent::Hit);
            return Ok(value.clone());
        }

        self.observer.event(key, CacheEvent::Miss);
        let value = compute().await?;

        map.insert(key.to_string(), value.clone());
        blocking(move || {
            let mut locked = locked;
            locked.write_map(&map)
        })
        .await?;

        Ok(value)
    }

    /// List cached keys in sorted order
    pub async fn keys(&self) -> BwcacheResult<Vec<String>> {
        let (_locked, map) = self.open_and_read(MAINTENANCE_KEY).await?;
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// Remove one entry, returning whether it was present
    pub async fn remove(&self, key: &str) -> BwcacheResult<bool> {
        if key.is_empty() {
            return Err(BwcacheError::InvalidCacheKey);
        }

        let (locked, mut map) = self.open_and_read(key).await?;
        if map.remove(key).is_none() {
            return Ok(false);
        }

        blocking(move || {
            let mut locked = locked;
            locked.write_map(&map)
        })
        .await?;
        Ok(true)
    }

    /// Discard every entry
    pub async fn clear(&self) -> BwcacheResult<()> {
        let path = self.path.clone();
        let ttl = self.ttl;
        let observer = self.observer.clone();

        blocking(move || {
            let mut locked = LockedCache::open(path, ttl, MAINTENANCE_KEY.to_string(), observer)?;
            locked.truncate()
        })
        .await
    }

    /// Describe the cache file without creating or expiring it
    pub async fn info(&self) -> BwcacheResult<CacheInfo> {
        let path = self.path.clone();
        let ttl = self.ttl;

        blocking(move || {
            if !path.exists() {
                return Ok(CacheInfo {
                    path,
                    exists: false,
                    entries: 0,
                    modified: None,
                    expires_in_secs: None,
                });
            }

            let mut file = File::open(&path)
                .map_err(|e| BwcacheError::io(format!("opening cache file {}", path.display()), e))?;
            let modified = modified_time(&file, &path)?;
            FileExt::lock_exclusive(&file)
                .map_err(|e| BwcacheError::io(format!("locking cache file {}", path.display()), e))?;

            let mut bytes = Vec::new();
            let read = file.read_to_end(&mut bytes);
            if let Err(e) = FileExt::unlock(&file) {
                warn!("Failed to unlock {}, released on close: {}", path.display(), e);
            }
            read.map_err(|e| BwcacheError::io(format!("reading cache file {}", path.display()), e))?;

            let entries = match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => map.len(),
                _ => 0,
            };
            let age = age_of(modified);

            Ok(CacheInfo {
                path,
                exists: true,
                entries,
                modified: Some(DateTime::<Utc>::from(modified)),
                expires_in_secs: ttl.checked_sub(age).map(|left| left.as_secs()),
            })
        })
        .await
    }

    async fn open_and_read(&self, key: &str) -> BwcacheResult<(LockedCache, CacheMap)> {
        let path = self.path.clone();
        let ttl = self.ttl;
        let key = key.to_string();
        let observer = self.observer.clone();

        blocking(move || {
            let mut locked = LockedCache::open(path, ttl, key, observer)?;
            let map = locked.read_map()?;
            Ok((locked, map))
        })
        .await
    }
}

/// One-shot lookup against `cache_path` with the default observer
pub async fn get_or_compute<F, Fut>(
    key: &str,
    cache_path: impl Into<PathBuf>,
    compute: F,
    ttl_seconds: u64,
) -> BwcacheResult<Value>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = BwcacheResult<Value>>,
{
    TtlCache::new(cache_path, Duration::from_secs(ttl_seconds))
        .get_or_compute(key, compute)
        .await
}

/// Open cache file holding the exclusive lock; unlocks on drop
struct LockedCache {
    file: File,
    path: PathBuf,
    key: String,
    observer: Arc<dyn CacheObserver>,
}

impl LockedCache {
    fn open(
        path: PathBuf,
        ttl: Duration,
        key: String,
        observer: Arc<dyn CacheObserver>,
    ) -> BwcacheResult<Self> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(false);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options
            .open(&path)
            .map_err(|e| BwcacheError::io(format!("opening cache file {}", path.display()), e))?;

        // Files created by older versions or other tools keep their mode until here
        restrict_permissions(&file, &path)?;

        let age = age_of(modified_time(&file, &path)?);
        if age > ttl {
            observer.event(&key, CacheEvent::Expired { age });
            file.set_len(0).map_err(|e| {
                BwcacheError::io(format!("truncating expired cache file {}", path.display()), e)
            })?;
        }

        observer.event(&key, CacheEvent::LockWaiting);
        FileExt::lock_exclusive(&file)
            .map_err(|e| BwcacheError::io(format!("locking cache file {}", path.display()), e))?;
        observer.event(&key, CacheEvent::LockAcquired);

        Ok(Self {
            file,
            path,
            key,
            observer,
        })
    }

    /// Parse the file as a JSON object; anything unparseable is an empty map
    fn read_map(&mut self) -> BwcacheResult<CacheMap> {
        let mut bytes = Vec::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_end(&mut bytes))
            .map_err(|e| BwcacheError::io(format!("reading cache file {}", self.path.display()), e))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(CacheMap::new());
        }

        let reason = match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => return Ok(map),
            Ok(other) => format!("expected a JSON object, found {}", json_kind(&other)),
            Err(e) => e.to_string(),
        };
        self.observer.event(&self.key, CacheEvent::Corrupt { reason });
        Ok(CacheMap::new())
    }

    /// Replace the whole file with `map` and flush it to storage
    fn write_map(&mut self, map: &CacheMap) -> BwcacheResult<()> {
        let bytes = serde_json::to_vec(map)?;
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.set_len(0))
            .and_then(|_| self.file.write_all(&bytes))
            .and_then(|_| self.file.sync_all())
            .map_err(|e| BwcacheError::io(format!("writing cache file {}", self.path.display()), e))?;

        self.observer.event(&self.key, CacheEvent::Stored);
        Ok(())
    }

    fn truncate(&mut self) -> BwcacheResult<()> {
        self.file
            .set_len(0)
            .and_then(|_| self.file.sync_all())
            .map_err(|e| BwcacheError::io(format!("clearing cache file {}", self.path.display()), e))
    }
}

impl Drop for LockedCache {
    fn drop(&mut self) {
        if FileExt::unlock(&self.file).is_ok() {
            self.observer.event(&self.key, CacheEvent::LockReleased);
        }
    }
}

async fn blocking<T, F>(op: F) -> BwcacheResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> BwcacheResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| BwcacheError::Internal(format!("cache task failed: {}", e)))?
}

fn restrict_permissions(file: &File, path: &Path) -> BwcacheResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                BwcacheError::io(format!("setting permissions on {}", path.display()), e)
            })?;
    }
    #[cfg(not(unix))]
    let _ = (file, path);
    Ok(())
}

fn modified_time(file: &File, path: &Path) -> BwcacheResult<SystemTime> {
    file.metadata()
        .and_then(|meta| meta.modified())
        .map_err(|e| BwcacheError::io(format!("reading mtime of {}", path.display()), e))
}

/// Clock skew into the future counts as fresh
fn age_of(modified: SystemTime) -> Duration {
    SystemTime::now()
        .duration_since(modified)
        .unwrap_or_default()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::observer::RecordingObserver;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn read_json(path: &Path) -> Value {
        let content = std::fs::read_to_string(path).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    fn age_file(path: &Path, by: Duration) {
        let file = OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[tokio::test]
    async fn creates_file_and_serves_second_call_from_cache() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        let calls = AtomicUsize::new(0);

        let first = get_or_compute(
            "itemA.attachment",
            &path,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!("secret123"))
            },
            3600,
        )
        .await
        .unwrap();

        let second = get_or_compute(
            "itemA.attachment",
            &path,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!("recomputed"))
            },
            3600,
        )
        .await
        .unwrap();

        assert_eq!(first, json!("secret123"));
        assert_eq!(second, json!("secret123"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(read_json(&path), json!({"itemA.attachment": "secret123"}));
    }

    #[tokio::test]
    async fn expired_file_drops_every_key() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        let cache = TtlCache::new(&path, HOUR);

        cache.get_or_compute("a", || async { Ok(json!(1)) }).await.unwrap();
        cache.get_or_compute("b", || async { Ok(json!(2)) }).await.unwrap();
        age_file(&path, Duration::from_secs(2 * 3600));

        let value = cache
            .get_or_compute("c", || async { Ok(json!(3)) })
            .await
            .unwrap();

        assert_eq!(value, json!(3));
        assert_eq!(read_json(&path), json!({"c": 3}));
    }

    #[tokio::test]
    async fn expired_key_is_recomputed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        let observer = Arc::new(RecordingObserver::new());
        let cache = TtlCache::new(&path, HOUR).with_observer(observer.clone());

        cache.get_or_compute("a", || async { Ok(json!("old")) }).await.unwrap();
        age_file(&path, Duration::from_secs(3601));

        let value = cache
            .get_or_compute("a", || async { Ok(json!("new")) })
            .await
            .unwrap();

        assert_eq!(value, json!("new"));
        assert!(observer
            .kinds()
            .iter()
            .any(|event| matches!(event, CacheEvent::Expired { .. })));
    }

    #[tokio::test]
    async fn fresh_file_within_ttl_is_kept() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        let cache = TtlCache::new(&path, HOUR);

        cache.get_or_compute("a", || async { Ok(json!(1)) }).await.unwrap();
        age_file(&path, Duration::from_secs(1800));

        let value = cache
            .get_or_compute("a", || async { Ok(json!("unused")) })
            .await
            .unwrap();
        assert_eq!(value, json!(1));
    }

    #[tokio::test]
    async fn garbage_content_is_treated_as_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        std::fs::write(&path, "{\"half\": \"writ").unwrap();

        let observer = Arc::new(RecordingObserver::new());
        let cache = TtlCache::new(&path, HOUR).with_observer(observer.clone());

        let value = cache
            .get_or_compute("k", || async { Ok(json!({"user": "admin"})) })
            .await
            .unwrap();

        assert_eq!(value, json!({"user": "admin"}));
        assert_eq!(read_json(&path), json!({"k": {"user": "admin"}}));
        assert!(observer
            .kinds()
            .iter()
            .any(|event| matches!(event, CacheEvent::Corrupt { .. })));
    }

    #[tokio::test]
    async fn non_object_json_is_treated_as_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let observer = Arc::new(RecordingObserver::new());
        let cache = TtlCache::new(&path, HOUR).with_observer(observer.clone());
        cache.get_or_compute("k", || async { Ok(json!(true)) }).await.unwrap();

        assert_eq!(read_json(&path), json!({"k": true}));
        assert!(observer.kinds().contains(&CacheEvent::Corrupt {
            reason: "expected a JSON object, found an array".to_string()
        }));
    }

    #[tokio::test]
    async fn failed_compute_is_not_cached() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        let cache = TtlCache::new(&path, HOUR);

        cache.get_or_compute("a", || async { Ok(json!("kept")) }).await.unwrap();

        let err = cache
            .get_or_compute("b", || async { Err(BwcacheError::User("bw exploded".to_string())) })
            .await
            .unwrap_err();

        assert!(matches!(err, BwcacheError::User(ref msg) if msg == "bw exploded"));
        assert_eq!(read_json(&path), json!({"a": "kept"}));

        // The lock was released on the error path
        let value = cache
            .get_or_compute("b", || async { Ok(json!("second try")) })
            .await
            .unwrap();
        assert_eq!(value, json!("second try"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_do_not_lose_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");

        let mut handles = Vec::new();
        for i in 0..8 {
            let cache = TtlCache::new(&path, HOUR);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(&format!("key-{i}"), || async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(json!(i))
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let map = read_json(&path);
        let map = map.as_object().unwrap();
        assert_eq!(map.len(), 8);
        for i in 0..8 {
            assert_eq!(map[&format!("key-{i}")], json!(i));
        }
    }

    #[tokio::test]
    async fn threads_with_separate_runtimes_both_land() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");

        let workers: Vec<_> = ["left", "right"]
            .into_iter()
            .map(|key| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .unwrap();
                    runtime.block_on(async {
                        get_or_compute(
                            key,
                            &path,
                            || async move {
                                tokio::time::sleep(Duration::from_millis(50)).await;
                                Ok(json!(key))
                            },
                            3600,
                        )
                        .await
                        .unwrap();
                    });
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(read_json(&path), json!({"left": "left", "right": "right"}));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cache_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        std::fs::write(&path, "").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        get_or_compute("k", &path, || async { Ok(json!(1)) }, 3600)
            .await
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn new_cache_file_is_created_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        let cache = TtlCache::new(&path, HOUR);

        cache.clear().await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn info_releases_lock() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        let cache = TtlCache::new(&path, HOUR);
        cache.get_or_compute("a", || async { Ok(json!(1)) }).await.unwrap();

        cache.info().await.unwrap();

        // A second handle would block forever if info kept the lock
        let file = File::open(&path).unwrap();
        FileExt::try_lock_exclusive(&file).unwrap();
        FileExt::unlock(&file).unwrap();
    }

    #[tokio::test]
    async fn empty_key_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");

        let err = get_or_compute("", &path, || async { Ok(json!(1)) }, 3600)
            .await
            .unwrap_err();
        assert!(matches!(err, BwcacheError::InvalidCacheKey));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_parent_directory_is_io_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("no-such-dir").join("cache.json");

        let err = get_or_compute("k", &path, || async { Ok(json!(1)) }, 3600)
            .await
            .unwrap_err();
        assert!(matches!(err, BwcacheError::Io { .. }));
        assert!(err.to_string().contains("no-such-dir"));
    }

    #[tokio::test]
    async fn events_for_miss_then_hit() {
        let temp = TempDir::new().unwrap();
        let observer = Arc::new(RecordingObserver::new());
        let cache =
            TtlCache::new(temp.path().join("cache.json"), HOUR).with_observer(observer.clone());

        cache.get_or_compute("k", || async { Ok(json!(1)) }).await.unwrap();
        cache.get_or_compute("k", || async { Ok(json!(2)) }).await.unwrap();

        assert_eq!(
            observer.kinds(),
            vec![
                CacheEvent::LockWaiting,
                CacheEvent::LockAcquired,
                CacheEvent::Miss,
                CacheEvent::Stored,
                CacheEvent::LockReleased,
                CacheEvent::LockWaiting,
                CacheEvent::LockAcquired,
                CacheEvent::Hit,
                CacheEvent::LockReleased,
            ]
        );
    }

    #[tokio::test]
    async fn keys_remove_and_clear() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        let cache = TtlCache::new(&path, HOUR);

        cache.get_or_compute("b", || async { Ok(json!(2)) }).await.unwrap();
        cache.get_or_compute("a", || async { Ok(json!(1)) }).await.unwrap();
        assert_eq!(cache.keys().await.unwrap(), vec!["a", "b"]);

        assert!(cache.remove("a").await.unwrap());
        assert!(!cache.remove("a").await.unwrap());
        assert_eq!(read_json(&path), json!({"b": 2}));

        cache.clear().await.unwrap();
        assert!(cache.keys().await.unwrap().is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn info_does_not_create_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        let cache = TtlCache::new(&path, HOUR);

        let info = cache.info().await.unwrap();
        assert!(!info.exists);
        assert!(!path.exists());

        cache.get_or_compute("a", || async { Ok(json!(1)) }).await.unwrap();
        let info = cache.info().await.unwrap();
        assert!(info.exists);
        assert_eq!(info.entries, 1);
        assert!(info.modified.is_some());
        assert!(info.expires_in_secs.unwrap() > 3500);

        age_file(&path, Duration::from_secs(7200));
        let info = cache.info().await.unwrap();
        assert_eq!(info.expires_in_secs, None);
        assert_eq!(info.entries, 1);
    }
}
