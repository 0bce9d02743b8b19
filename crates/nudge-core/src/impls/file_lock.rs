//! FileRunLock - ファイルベースの lease（同一ホスト上の複数プロセス間の排他）
//!
//! # 実装詳細
//! - key ごとに `<dir>/<key>.lock`（JSON: holder, acquired_at, expires_at）
//! - lease の読み書きはすべて `<key>.lock.guard`（`create_new`）を握った状態で行う
//! - lease 本体は holder ごとの tmp へ書いて rename するので、途中状態は見えない
//! - 読めない lease は「保持中」扱い。mtime が TTL より古い場合だけ奪う
//! - guard が古い（プロセスが落ちた）場合は mtime を見て掃除する
//! - 同期 I/O は spawn_blocking に逃がす

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::LockError;
use crate::ports::ExecutionLock;

/// How long a contender waits for the write guard before giving up.
const GUARD_WAIT: std::time::Duration = std::time::Duration::from_millis(500);

/// A guard older than this belongs to a crashed process.
const STALE_GUARD: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LeaseRecord {
    holder: String,
    acquired_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FileRunLock {
    dir: PathBuf,
}

impl FileRunLock {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", sanitize(key)))
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn backend(context: &str, e: impl std::fmt::Display) -> LockError {
    LockError::Backend(format!("{context}: {e}"))
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

fn age_of(path: &Path) -> Option<std::time::Duration> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

/// Exclusive right to read-modify-write one lease file. Removed on drop.
struct WriteGuard {
    path: PathBuf,
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// `Ok(None)` when another contender kept the guard for the whole wait.
fn acquire_write_guard(lease_path: &Path) -> Result<Option<WriteGuard>, LockError> {
    let path = sibling(lease_path, ".guard");
    let started = std::time::Instant::now();
    loop {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = file.write_all(std::process::id().to_string().as_bytes());
                return Ok(Some(WriteGuard { path }));
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                evict_stale_guard(&path);
                if started.elapsed() > GUARD_WAIT {
                    return Ok(None);
                }
                std::thread::sleep(std::time::Duration::from_millis(2));
            }
            Err(e) => return Err(backend("create lease guard", e)),
        }
    }
}

fn evict_stale_guard(path: &Path) {
    if age_of(path).is_some_and(|age| age > STALE_GUARD) {
        tracing::warn!(path = %path.display(), "removing stale lease guard");
        let _ = std::fs::remove_file(path);
    }
}

enum LeaseState {
    Free,
    Held(LeaseRecord),
    /// Present but unreadable; treated as held until its mtime is older than the TTL.
    Unreadable { stale: bool },
}

fn read_lease(path: &Path, ttl: Duration) -> Result<LeaseState, LockError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LeaseState::Free),
        Err(e) => return Err(backend("read lease", e)),
    };
    match serde_json::from_slice(&bytes) {
        Ok(record) => Ok(LeaseState::Held(record)),
        Err(e) => {
            let stale = match (age_of(path), ttl.to_std()) {
                (Some(age), Ok(ttl)) => age > ttl,
                _ => false,
            };
            tracing::warn!(path = %path.display(), stale, "unreadable lease file: {e}");
            Ok(LeaseState::Unreadable { stale })
        }
    }
}

fn write_lease(path: &Path, record: &LeaseRecord) -> Result<(), LockError> {
    let tmp = sibling(
        path,
        &format!(".{}.{}.tmp", sanitize(&record.holder), std::process::id()),
    );
    let json = serde_json::to_vec(record).map_err(|e| backend("encode lease", e))?;
    std::fs::write(&tmp, json).map_err(|e| backend("write lease temp file", e))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        backend("finalize lease", e)
    })
}

fn acquire_blocking(
    dir: &Path,
    path: &Path,
    holder: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<bool, LockError> {
    std::fs::create_dir_all(dir).map_err(|e| backend("create lock directory", e))?;
    let Some(_guard) = acquire_write_guard(path)? else {
        tracing::debug!(path = %path.display(), holder, "lease guard contended");
        return Ok(false);
    };

    let acquired_at = match read_lease(path, ttl)? {
        LeaseState::Held(existing) if existing.holder == holder => existing.acquired_at,
        LeaseState::Held(existing) if existing.expires_at > now => return Ok(false),
        LeaseState::Unreadable { stale: false } => return Ok(false),
        LeaseState::Held(_) | LeaseState::Unreadable { stale: true } | LeaseState::Free => now,
    };
    write_lease(
        path,
        &LeaseRecord {
            holder: holder.to_string(),
            acquired_at,
            expires_at: now + ttl,
        },
    )?;
    Ok(true)
}

fn release_blocking(path: &Path, holder: &str) -> Result<(), LockError> {
    let Some(_guard) = acquire_write_guard(path)? else {
        return Err(LockError::Backend(format!(
            "lease guard for {} stayed busy",
            path.display()
        )));
    };
    match read_lease(path, Duration::zero())? {
        LeaseState::Held(existing) if existing.holder == holder => {
            match std::fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(backend("remove lease", e)),
            }
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl ExecutionLock for FileRunLock {
    async fn try_acquire(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, LockError> {
        let dir = self.dir.clone();
        let path = self.path_for(key);
        let holder = holder.to_string();
        tokio::task::spawn_blocking(move || acquire_blocking(&dir, &path, &holder, ttl, now))
            .await
            .map_err(|e| backend("lock task", e))?
    }

    async fn release(&self, key: &str, holder: &str) -> Result<(), LockError> {
        let path = self.path_for(key);
        let holder = holder.to_string();
        tokio::task::spawn_blocking(move || release_blocking(&path, &holder))
            .await
            .map_err(|e| backend("lock task", e))?
    }
}
