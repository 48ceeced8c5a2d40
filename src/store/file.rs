//! JSON document store.
//!
//! The whole mapping lives in one file, `{ "<identity>": "<secret>", ... }`,
//! in insertion order. Every operation reloads the file; the write path
//! holds the exclusive lock across load, mutate and persist. Persisting
//! writes a temp file next to the target, syncs it and renames it into
//! place, so the file on disk is always either the old or the new store.

use super::CredentialStore;
use crate::error::{AppError, AppResult};
use crate::model::{CredentialRecord, Identity, InsertOutcome, Secret};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// What was found on disk
#[derive(Debug)]
enum Loaded {
    Missing,
    Parsed {
        records: Vec<CredentialRecord>,
        /// Entries dropped because their value was not a string
        skipped: usize,
    },
    Corrupt(String),
}

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> std::io::Result<Loaded> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Loaded::Missing),
            Err(e) => return Err(e),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Loaded::Missing);
        }

        Ok(match parse_records(&bytes) {
            Ok((records, skipped)) => Loaded::Parsed { records, skipped },
            Err(e) => Loaded::Corrupt(e.to_string()),
        })
    }

    /// Load for readers. Anything unreadable counts as an empty store.
    async fn load_lenient(&self) -> Vec<CredentialRecord> {
        match self.read_file().await {
            Ok(Loaded::Parsed { records, .. }) => records,
            Ok(Loaded::Missing) => Vec::new(),
            Ok(Loaded::Corrupt(reason)) => {
                warn!(
                    "Credential store {} is corrupt, treating as empty: {}",
                    self.path.display(),
                    reason
                );
                Vec::new()
            }
            Err(e) => {
                warn!(
                    "Failed to read credential store {}, treating as empty: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Load for the write path. A file that will lose content on the next
    /// persist (corrupt, or with unusable entries) is copied aside first; an
    /// unreadable one aborts the write.
    async fn load_for_update(&self) -> AppResult<Vec<CredentialRecord>> {
        match self.read_file().await {
            Ok(Loaded::Parsed { records, skipped: 0 }) => Ok(records),
            Ok(Loaded::Parsed { records, skipped }) => {
                let backup = self.back_up_original().await?;
                warn!(
                    "Credential store {} has {} unusable entries; original kept at {}",
                    self.path.display(),
                    skipped,
                    backup.display()
                );
                Ok(records)
            }
            Ok(Loaded::Missing) => Ok(Vec::new()),
            Ok(Loaded::Corrupt(reason)) => {
                let backup = self.back_up_original().await?;
                warn!(
                    "Credential store {} is corrupt ({}), kept it at {} and starting empty",
                    self.path.display(),
                    reason,
                    backup.display()
                );
                Ok(Vec::new())
            }
            Err(e) => Err(AppError::store_unavailable(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn back_up_original(&self) -> AppResult<PathBuf> {
        let backup = self.sibling(&format!("corrupt-{}", Uuid::new_v4()));
        fs::copy(&self.path, &backup).await.map_err(|e| {
            AppError::store_unavailable(format!("failed to back up {}: {}", self.path.display(), e))
        })?;
        Ok(backup)
    }

    async fn persist(&self, records: &[CredentialRecord]) -> AppResult<()> {
        let data = encode_records(records)?;
        atomic_write(&self.path, &data).await.map_err(|e| {
            error!("Failed to persist credential store {}: {}", self.path.display(), e);
            AppError::store_unavailable(format!("failed to write {}: {}", self.path.display(), e))
        })
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let name = self
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("store.json");
        self.path.with_file_name(format!("{}.{}", name, suffix))
    }
}

#[async_trait]
impl CredentialStore for JsonFileStore {
    async fn get(&self, identity: &Identity) -> AppResult<Option<Secret>> {
        let _guard = self.lock.read().await;
        Ok(self
            .load_lenient()
            .await
            .into_iter()
            .find(|r| &r.identity == identity)
            .map(|r| r.secret))
    }

    async fn put_if_absent(&self, identity: &Identity, secret: Secret) -> AppResult<InsertOutcome> {
        let _guard = self.lock.write().await;

        let mut records = self.load_for_update().await?;
        if let Some(existing) = records.iter().find(|r| &r.identity == identity) {
            debug!("Identity {} already holds a secret, not overwriting", identity);
            return Ok(InsertOutcome::AlreadyPresent(existing.secret.clone()));
        }

        records.push(CredentialRecord::new(identity.clone(), secret));
        self.persist(&records).await?;
        Ok(InsertOutcome::Inserted)
    }

    async fn snapshot(&self) -> AppResult<Vec<CredentialRecord>> {
        let _guard = self.lock.read().await;
        Ok(self.load_lenient().await)
    }
}

/// Records plus the number of entries skipped
fn parse_records(bytes: &[u8]) -> Result<(Vec<CredentialRecord>, usize), serde_json::Error> {
    let map: Map<String, Value> = serde_json::from_slice(bytes)?;
    let mut records = Vec::with_capacity(map.len());
    let mut skipped = 0;
    for (identity, value) in map {
        match value {
            Value::String(secret) => {
                records.push(CredentialRecord::new(Identity::new(identity), Secret::new(secret)));
            }
            other => {
                warn!(
                    "Skipping credential for {}: expected a string, found {}",
                    identity, other
                );
                skipped += 1;
            }
        }
    }
    Ok((records, skipped))
}

fn encode_records(records: &[CredentialRecord]) -> AppResult<Vec<u8>> {
    let map: Map<String, Value> = records
        .iter()
        .map(|r| {
            (
                r.identity.as_str().to_string(),
                Value::String(r.secret.expose().to_string()),
            )
        })
        .collect();
    Ok(serde_json::to_vec_pretty(&map)?)
}

/// Write `data` to a temp file beside `path`, sync it and rename it over
/// `path`. On failure the temp file is removed and `path` is untouched.
async fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).await?;

    let file_name = path.file_name().and_then(|s| s.to_str()).unwrap_or("store");
    let temp = parent.join(format!(".{}.tmp.{}", file_name, Uuid::new_v4()));

    let result = async {
        let mut file = fs::File::create(&temp).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = fs::remove_file(&temp).await;
        return Err(e);
    }

    fsync_dir(&parent).await;
    Ok(())
}

#[cfg(unix)]
async fn fsync_dir(dir: &Path) {
    // Makes the rename durable; failure only weakens crash safety.
    if let Ok(handle) = fs::File::open(dir).await {
        if let Err(e) = handle.sync_all().await {
            debug!("Directory fsync failed for {}: {}", dir.display(), e);
        }
    }
}

#[cfg(not(unix))]
async fn fsync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn secret(s: &str) -> Secret {
        Secret::new(s)
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("users.json"));

        assert_eq!(store.get(&"42".into()).await.unwrap(), None);
        assert!(store.snapshot().await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_put_creates_file_and_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("users.json");
        let store = JsonFileStore::new(&path);

        let outcome = store.put_if_absent(&"42".into(), secret("aa")).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);

        let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["42"], "aa");
    }

    #[tokio::test]
    async fn test_write_once_per_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("users.json"));
        let id = Identity::from("42");

        store.put_if_absent(&id, secret("first")).await.unwrap();
        let outcome = store.put_if_absent(&id, secret("second")).await.unwrap();

        assert_eq!(outcome, InsertOutcome::AlreadyPresent(secret("first")));
        assert_eq!(store.get(&id).await.unwrap(), Some(secret("first")));
    }

    #[tokio::test]
    async fn test_reload_preserves_records_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let ids = ["300", "1", "20", "4000", "5"];

        {
            let store = JsonFileStore::new(&path);
            for (i, id) in ids.iter().enumerate() {
                store
                    .put_if_absent(&(*id).into(), secret(&format!("s{}", i)))
                    .await
                    .unwrap();
            }
        }

        let reopened = JsonFileStore::new(&path);
        let snapshot = reopened.snapshot().await.unwrap();
        let got: Vec<&str> = snapshot.iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(got, ids);
        assert_eq!(snapshot[3].secret, secret("s3"));
    }

    #[tokio::test]
    async fn test_reads_legacy_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allowed_users.json");
        std::fs::write(
            &path,
            r#"{
    "900": "677680e2f761ae873b5598cf939b9ddf",
    "12": "0123456789abcdef0123456789abcdef",
    "bad": 17
}"#,
        )
        .unwrap();

        let store = JsonFileStore::new(&path);
        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].identity.as_str(), "900");
        assert_eq!(snapshot[1].identity.as_str(), "12");
        assert_eq!(
            store.get(&"12".into()).await.unwrap(),
            Some(secret("0123456789abcdef0123456789abcdef"))
        );
    }

    #[tokio::test]
    async fn test_corrupt_file_is_empty_and_backed_up_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let store = JsonFileStore::new(&path);

        assert_eq!(store.get(&"42".into()).await.unwrap(), None);
        assert!(store.snapshot().await.unwrap().is_empty());

        let outcome = store.put_if_absent(&"42".into(), secret("aa")).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
        assert_eq!(store.get(&"42".into()).await.unwrap(), Some(secret("aa")));

        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(std::fs::read(backups[0].path()).unwrap(), b"{ not json");
    }

    #[tokio::test]
    async fn test_unwritable_location_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();
        let store = JsonFileStore::new(blocker.join("users.json"));

        let result = store.put_if_absent(&"42".into(), secret("aa")).await;
        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));

        // Readers stay available
        assert_eq!(store.get(&"42".into()).await.unwrap(), None);
        assert_eq!(std::fs::read(&blocker).unwrap(), b"file, not a directory");
    }

    fn backups_in(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
            .map(|e| e.path())
            .collect()
    }

    fn temp_files_in(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .map(|e| e.path())
            .collect()
    }

    #[tokio::test]
    async fn test_unusable_entries_are_backed_up_before_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let original = br#"{"900": "aa", "bad": 17, "12": "bb"}"#;
        std::fs::write(&path, original).unwrap();
        let store = JsonFileStore::new(&path);

        store.put_if_absent(&"5".into(), secret("cc")).await.unwrap();

        let backups = backups_in(dir.path());
        assert_eq!(backups.len(), 1);
        assert_eq!(std::fs::read(&backups[0]).unwrap(), original);

        let ids: Vec<String> = store
            .snapshot()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.identity.to_string())
            .collect();
        assert_eq!(ids, ["900", "12", "5"]);

        // Clean file now, later writes make no further copies
        store.put_if_absent(&"6".into(), secret("dd")).await.unwrap();
        assert_eq!(backups_in(dir.path()).len(), 1);
    }

    #[tokio::test]
    async fn test_clean_store_makes_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("users.json"));
        store.put_if_absent(&"1".into(), secret("aa")).await.unwrap();
        store.put_if_absent(&"2".into(), secret("bb")).await.unwrap();
        assert!(backups_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_store_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be: open works, read fails
        let path = dir.path().join("users.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), b"untouched").unwrap();
        let store = JsonFileStore::new(&path);

        let result = store.put_if_absent(&"42".into(), secret("aa")).await;
        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));

        assert!(path.is_dir());
        assert_eq!(std::fs::read(path.join("keep")).unwrap(), b"untouched");
        assert!(backups_in(dir.path()).is_empty());
        assert!(temp_files_in(dir.path()).is_empty());
        // Readers degrade to empty
        assert_eq!(store.get(&"42".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_rename_leaves_target_and_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("users.json");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), b"untouched").unwrap();

        assert!(atomic_write(&target, b"{}").await.is_err());

        assert!(target.is_dir());
        assert_eq!(std::fs::read(target.join("keep")).unwrap(), b"untouched");
        assert!(temp_files_in(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_persist_keeps_previous_store() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        let path = locked.join("users.json");
        let store = JsonFileStore::new(&path);
        store.put_if_absent(&"1".into(), secret("aa")).await.unwrap();
        let before = std::fs::read(&path).unwrap();

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();
        if std::fs::write(locked.join("write-check"), b"").is_ok() {
            // Privileged user, directory permissions are not enforced
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = store.put_if_absent(&"2".into(), secret("bb")).await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
        assert_eq!(std::fs::read(&path).unwrap(), before);
        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].secret, secret("aa"));
        assert_eq!(store.get(&"2".into()).await.unwrap(), None);
        assert!(temp_files_in(&locked).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_agree_on_one_secret() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("users.json")));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .put_if_absent(&"42".into(), Secret::new(format!("candidate-{}", i)))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut inserted = 0;
        let mut observed = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                InsertOutcome::Inserted => inserted += 1,
                InsertOutcome::AlreadyPresent(s) => observed.push(s),
            }
        }

        assert_eq!(inserted, 1);
        let winner = store.get(&"42".into()).await.unwrap().unwrap();
        assert!(observed.iter().all(|s| *s == winner));
        assert_eq!(store.snapshot().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_for_different_identities_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("users.json")));

        let handles: Vec<_> = (0..20u64)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .put_if_absent(&Identity::from(i), Secret::new(format!("s{}", i)))
                        .await
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), InsertOutcome::Inserted);
        }

        assert_eq!(store.snapshot().await.unwrap().len(), 20);
    }
}
