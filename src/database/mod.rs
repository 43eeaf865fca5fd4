use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use teloxide::types::UserId;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::models::{Counter, Profile, ProfilePatch};

/// Whole persisted document: decimal user id -> profile.
pub type ProfileMap = BTreeMap<String, Profile>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RETRIES: u32 = 2;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("profile store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("profile store unavailable: {0}")]
    Unavailable(#[from] std::io::Error),
    #[error("profile store did not answer within {0:?}")]
    Timeout(Duration),
    #[error("profile store task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Only plain I/O failures are retried. A timed-out operation may still
    /// complete in the background, so repeating it could apply it twice.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// JSON-file backed profile store. Every operation loads the full document,
/// changes it and writes it back while holding one lock.
#[derive(Clone, Debug)]
pub struct ProfileStore {
    inner: Arc<Inner>,
    timeout: Duration,
    retries: u32,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                lock: Mutex::new(()),
            }),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Creates the parent directory and checks that the document parses.
    /// Returns the number of stored profiles.
    pub async fn init(&self) -> Result<usize, StoreError> {
        if let Some(parent) = self.inner.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.transact("init", |doc| (doc.len(), false)).await
    }

    /// Returns the stored profile, or a default one that is not persisted.
    pub async fn load(&self, user_id: UserId) -> Result<Profile, StoreError> {
        let key = key(user_id);
        self.transact("load", move |doc| {
            (doc.get(&key).cloned().unwrap_or_default(), false)
        })
        .await
    }

    pub async fn update(&self, user_id: UserId, patch: ProfilePatch) -> Result<Profile, StoreError> {
        self.modify("update", user_id, move |profile| profile.apply(&patch)).await
    }

    /// Removes the profile. Returns whether one existed.
    pub async fn delete(&self, user_id: UserId) -> Result<bool, StoreError> {
        let key = key(user_id);
        self.transact("delete", move |doc| {
            let existed = doc.remove(&key).is_some();
            (existed, existed)
        })
        .await
    }

    pub async fn increment(
        &self,
        user_id: UserId,
        counter: Counter,
        amount: u32,
    ) -> Result<Profile, StoreError> {
        self.increment_with(user_id, counter, amount, ProfilePatch::default()).await
    }

    /// Increments `counter` and applies `patch` in one critical section.
    pub async fn increment_with(
        &self,
        user_id: UserId,
        counter: Counter,
        amount: u32,
        patch: ProfilePatch,
    ) -> Result<Profile, StoreError> {
        self.modify("increment", user_id, move |profile| {
            counter.add(profile, amount);
            profile.apply(&patch);
        })
        .await
    }

    /// Get-or-create the user's profile, change it and persist the document.
    async fn modify<F>(&self, op: &'static str, user_id: UserId, f: F) -> Result<Profile, StoreError>
    where
        F: Fn(&mut Profile) + Send + Sync + 'static,
    {
        let key = key(user_id);
        self.transact(op, move |doc| {
            let profile = doc.entry(key.clone()).or_default();
            f(profile);
            (profile.clone(), true)
        })
        .await
    }

    async fn transact<R, F>(&self, op: &'static str, f: F) -> Result<R, StoreError>
    where
        R: Send + 'static,
        F: Fn(&mut ProfileMap) -> (R, bool) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let start_time = Instant::now();
            let inner = Arc::clone(&self.inner);
            let f = Arc::clone(&f);

            // The spawned task keeps the lock until the write is done, even if
            // the caller stops waiting.
            let task = tokio::spawn(async move { inner.run(f.as_ref()).await });

            let result = match tokio::time::timeout(self.timeout, task).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(StoreError::Task(e.to_string())),
                Err(_) => Err(StoreError::Timeout(self.timeout)),
            };

            match result {
                Ok(value) => {
                    log::debug!("💾 Store {} finished in {:?}", op, start_time.elapsed());
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt <= self.retries => {
                    log::warn!("Store {} failed (attempt {}): {}", op, attempt, e);
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(e) => {
                    log::error!("Store {} failed: {}", op, e);
                    return Err(e);
                }
            }
        }
    }
}

impl Inner {
    async fn run<R, F>(&self, f: &F) -> Result<R, StoreError>
    where
        F: Fn(&mut ProfileMap) -> (R, bool),
    {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_document().await?;
        let (value, dirty) = f(&mut doc);
        if dirty {
            self.write_document(&doc).await?;
        }
        Ok(value)
    }

    async fn read_document(&self) -> Result<ProfileMap, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let mut doc: ProfileMap =
                    serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                        path: self.path.clone(),
                        source,
                    })?;
                doc.values_mut().for_each(Profile::derive_awards);
                Ok(doc)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ProfileMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, doc: &ProfileMap) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(doc).map_err(std::io::Error::other)?;
        let tmp = self.tmp_path();

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

fn key(user_id: UserId) -> String {
    user_id.0.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LastSession;
    use chrono::Utc;
    use tempfile::TempDir;

    fn store() -> (TempDir, ProfileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("database.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn missing_file_loads_default_without_creating_it() {
        let (_dir, store) = store();
        let profile = store.load(UserId(1)).await.unwrap();
        assert_eq!(profile, Profile::default());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn load_after_delete_is_default() {
        let (_dir, store) = store();
        store.update(UserId(1), ProfilePatch::goal(9)).await.unwrap();
        store.increment(UserId(1), Counter::Done, 1).await.unwrap();

        assert!(store.delete(UserId(1)).await.unwrap());
        let profile = store.load(UserId(1)).await.unwrap();
        assert_eq!(profile.goal, 0);
        assert_eq!(profile.done, 0);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_dir, store) = store();
        store.update(UserId(7), ProfilePatch::sport("rowing")).await.unwrap();

        assert!(store.delete(UserId(7)).await.unwrap());
        assert!(!store.delete(UserId(7)).await.unwrap());

        let raw = tokio::fs::read(store.path()).await.unwrap();
        let doc: ProfileMap = serde_json::from_slice(&raw).unwrap();
        assert!(!doc.contains_key("7"));
    }

    #[tokio::test]
    async fn increments_derive_awards() {
        let (_dir, store) = store();
        for count in 1..=6 {
            let profile = store.increment(UserId(3), Counter::Done, 1).await.unwrap();
            assert_eq!(profile.done, count);
            assert_eq!(profile.awards, count / 5);
        }
        let profile = store.load(UserId(3)).await.unwrap();
        assert_eq!(profile.done, 6);
        assert_eq!(profile.awards, 1);
    }

    #[tokio::test]
    async fn update_keeps_other_fields() {
        let (_dir, store) = store();
        store.update(UserId(5), ProfilePatch::goal(12)).await.unwrap();
        store.update(UserId(5), ProfilePatch::comment("easy run")).await.unwrap();
        let before = store.load(UserId(5)).await.unwrap();

        store.update(UserId(5), ProfilePatch::sport("running")).await.unwrap();
        let after = store.load(UserId(5)).await.unwrap();

        assert_eq!(after.sport, "running");
        assert_eq!(after.goal, before.goal);
        assert_eq!(after.comment, before.comment);
        assert_eq!(after.next, before.next);
        assert_eq!(after.done, before.done);
    }

    #[tokio::test]
    async fn session_increment_stamps_last() {
        let (_dir, store) = store();
        let at = Utc::now();
        let profile = store
            .increment_with(UserId(8), Counter::Done, 1, ProfilePatch::last(at))
            .await
            .unwrap();
        assert_eq!(profile.done, 1);
        assert_eq!(profile.last, Some(LastSession::At(at)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_do_not_clobber() {
        let (_dir, store) = store();
        let (a, b) = tokio::join!(
            store.update(UserId(10), ProfilePatch::goal(5)),
            store.update(UserId(11), ProfilePatch::goal(7)),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(store.load(UserId(10)).await.unwrap().goal, 5);
        assert_eq!(store.load(UserId(11)).await.unwrap().goal, 7);
        assert_eq!(store.load(UserId(10)).await.unwrap().sport, "unset");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let (_dir, store) = store();
        let mut tasks = Vec::new();
        for i in 0..20u64 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.increment(UserId(1 + i % 2), Counter::Done, 1).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.load(UserId(1)).await.unwrap().done, 10);
        let other = store.load(UserId(2)).await.unwrap();
        assert_eq!(other.done, 10);
        assert_eq!(other.awards, 2);
    }

    #[tokio::test]
    async fn corrupt_document_is_reported_and_left_alone() {
        let (_dir, store) = store();
        tokio::fs::write(store.path(), b"{ not json").await.unwrap();

        assert!(matches!(store.load(UserId(1)).await, Err(StoreError::Corrupt { .. })));
        assert!(matches!(
            store.update(UserId(1), ProfilePatch::goal(3)).await,
            Err(StoreError::Corrupt { .. })
        ));
        assert!(matches!(store.init().await, Err(StoreError::Corrupt { .. })));

        let raw = tokio::fs::read(store.path()).await.unwrap();
        assert_eq!(raw, b"{ not json");
    }

    #[tokio::test]
    async fn init_counts_profiles_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("nested").join("profiles.json"));
        assert_eq!(store.init().await.unwrap(), 0);

        store.update(UserId(1), ProfilePatch::goal(1)).await.unwrap();
        store.update(UserId(2), ProfilePatch::goal(2)).await.unwrap();
        assert_eq!(store.init().await.unwrap(), 2);
        assert!(!dir.path().join("nested").join("profiles.json.tmp").exists());
    }

    #[tokio::test]
    async fn reads_documents_written_by_older_versions() {
        let (_dir, store) = store();
        tokio::fs::write(
            store.path(),
            r#"{"42": {"goal": 10, "done": 7, "next": "20.06", "last": "19.06 18:30", "comment": "", "sport": "—"},
                "43": {"goal": 10, "trainings": 7}}"#,
        )
        .await
        .unwrap();

        let profile = store.load(UserId(42)).await.unwrap();
        assert_eq!(profile.done, 7);
        assert_eq!(profile.awards, 1);
        assert_eq!(profile.last, Some(LastSession::Text("19.06 18:30".to_string())));

        let profile = store.update(UserId(43), ProfilePatch::sport("running")).await.unwrap();
        assert_eq!(profile.done, 7);
        assert_eq!(profile.awards, 1);

        let raw = tokio::fs::read(store.path()).await.unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(doc["43"]["awards"], 1);
        assert_eq!(doc["42"]["last"], "19.06 18:30");
    }

    #[tokio::test]
    async fn slow_store_times_out_without_retrying() {
        let (_dir, store) = store();
        let store = store.with_timeout(Duration::from_millis(50)).with_retries(3);

        let guard = store.inner.lock.lock().await;
        let started = Instant::now();
        let err = store.increment(UserId(4), Counter::Done, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
        assert!(!err.is_retryable());
        assert!(started.elapsed() < Duration::from_millis(500));
        drop(guard);

        // The lock is fair, so the detached write runs before this read.
        let profile = store.load(UserId(4)).await.unwrap();
        assert_eq!(profile.done, 1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.load(UserId(4)).await.unwrap().done, 1);
    }

    #[tokio::test]
    async fn increment_with_patches_in_the_same_write() {
        let (_dir, store) = store();
        let profile = store
            .increment_with(UserId(6), Counter::Done, 5, ProfilePatch::comment("tempo"))
            .await
            .unwrap();
        assert_eq!(profile.done, 5);
        assert_eq!(profile.awards, 1);
        assert_eq!(profile.comment, "tempo");
    }

    #[tokio::test]
    async fn unreadable_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the document should be cannot be read as a file.
        let store = ProfileStore::new(dir.path()).with_retries(1);
        let err = store.load(UserId(1)).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
