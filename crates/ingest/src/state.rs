//! 상태 스냅샷 저장소
//!
//! 모든 논리 로그의 커서를 JSON 파일 하나에 저장합니다.
//! 쓰기는 임시 파일 작성 → fsync → rename → 디렉토리 fsync 순서로 진행되어
//! 어느 시점에 중단되더라도 이전 스냅샷 또는 새 스냅샷 중 하나만 관측됩니다.
//!
//! 손상되었거나 버전을 알 수 없는 스냅샷은 치명적 에러입니다.
//! 파일이 없는 경우만 첫 실행으로 간주합니다.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use logloader_core::error::StateError;
use logloader_core::types::{Cursor, FileIdentity};

/// 현재 스냅샷 형식 버전
pub const SNAPSHOT_VERSION: u32 = 1;

/// 모든 논리 로그의 커서 모음
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// 형식 버전
    pub version: u32,
    /// 마지막 저장 시각
    pub updated_at: DateTime<Utc>,
    /// 논리 로그 이름 → 커서
    pub cursors: BTreeMap<String, Cursor>,
}

impl StateSnapshot {
    /// 빈 스냅샷 (첫 실행)
    pub fn empty() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            updated_at: Utc::now(),
            cursors: BTreeMap::new(),
        }
    }

    /// 논리 로그의 커서를 조회합니다.
    pub fn cursor(&self, name: &str) -> Option<&Cursor> {
        self.cursors.get(name)
    }

    /// 해당 파일 식별자를 커서로 가진 논리 로그 이름을 찾습니다.
    ///
    /// 파일이 이름을 바꿔도 이미 읽은 바이트의 소유자는 이 로그입니다.
    /// 구분할 수 없는 식별자(Unix가 아닌 플랫폼)는 소유자가 없습니다.
    pub fn owner_of(&self, identity: FileIdentity) -> Option<&str> {
        if !identity.is_known() {
            return None;
        }
        self.cursors
            .iter()
            .find(|(_, c)| c.identity == identity)
            .map(|(name, _)| name.as_str())
    }
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// 스냅샷 파일 저장소
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// 새 저장소를 생성합니다. 파일은 아직 읽지 않습니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 스냅샷 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 스냅샷을 읽습니다.
    ///
    /// 파일이 없으면 빈 스냅샷을 반환합니다.
    pub async fn load(&self) -> Result<StateSnapshot, StateError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no state snapshot, starting fresh");
                return Ok(StateSnapshot::empty());
            }
            Err(source) => return Err(self.io_error(source)),
        };

        let snapshot = decode(&content, &self.path)?;
        tracing::debug!(
            path = %self.path.display(),
            cursors = snapshot.cursors.len(),
            "state snapshot loaded"
        );
        Ok(snapshot)
    }

    /// 스냅샷을 원자적으로 저장합니다.
    ///
    /// 부모 디렉토리가 없으면 생성합니다. 동기 함수이므로 실행 중단
    /// (시그널로 future가 drop되는 경우)이 저장 도중에 끼어들 수 없습니다.
    pub fn persist(&self, snapshot: &StateSnapshot) -> Result<(), StateError> {
        let json = serde_json::to_vec_pretty(snapshot).map_err(|e| StateError::Corrupt {
            path: self.path.display().to_string(),
            reason: format!("failed to encode snapshot: {e}"),
        })?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state.json".to_owned());
        let tmp_path = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        let result = write_and_rename(&tmp_path, &self.path, &json);
        if result.is_err() {
            let _ = std::fs::remove_file(&tmp_path);
        }
        result.map_err(|e| self.io_error(e))?;

        sync_dir(&dir).map_err(|e| self.io_error(e))?;

        tracing::debug!(
            path = %self.path.display(),
            cursors = snapshot.cursors.len(),
            "state snapshot persisted"
        );
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[derive(Deserialize)]
struct VersionHeader {
    version: Option<u32>,
}

fn decode(content: &[u8], path: &Path) -> Result<StateSnapshot, StateError> {
    let corrupt = |reason: String| StateError::Corrupt {
        path: path.display().to_string(),
        reason,
    };

    let header: VersionHeader =
        serde_json::from_slice(content).map_err(|e| corrupt(e.to_string()))?;
    match header.version {
        Some(SNAPSHOT_VERSION) => {}
        Some(found) => {
            return Err(StateError::UnsupportedVersion {
                path: path.display().to_string(),
                found,
                supported: SNAPSHOT_VERSION,
            });
        }
        None => return Err(corrupt("missing version field".to_owned())),
    }

    serde_json::from_slice(content).map_err(|e| corrupt(e.to_string()))
}

fn write_and_rename(tmp_path: &Path, final_path: &Path, data: &[u8]) -> std::io::Result<()> {
    {
        let mut file = std::fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(tmp_path)?;
        file.write_all(data)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }
    std::fs::rename(tmp_path, final_path)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StateSnapshot {
        let mut snapshot = StateSnapshot::empty();
        snapshot.cursors.insert(
            "/var/log/nginx/access.log".to_owned(),
            Cursor {
                identity: FileIdentity::new(2049, 77),
                offset: 4096,
                generation: 2,
            },
        );
        snapshot
    }

    #[tokio::test]
    async fn missing_file_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let snapshot = store.load().await.unwrap();
        assert!(snapshot.cursors.is_empty());
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    }

    #[tokio::test]
    async fn persist_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested/state.json"));
        let snapshot = sample();

        store.persist(&snapshot).unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, snapshot);

        // 임시 파일이 남지 않아야 함
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn persist_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        store.persist(&sample()).unwrap();

        let mut next = sample();
        next.cursors
            .get_mut("/var/log/nginx/access.log")
            .unwrap()
            .offset = 8192;
        store.persist(&next).unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.cursors["/var/log/nginx/access.log"].offset, 8192);
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let err = StateStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StateError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn legacy_map_without_version_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, br#"{"/var/log/nginx/access.log": 1024}"#).unwrap();

        let err = StateStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StateError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn unknown_version_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            br#"{"version": 7, "updated_at": "2024-01-01T00:00:00Z", "cursors": {}}"#,
        )
        .unwrap();

        let err = StateStore::new(&path).load().await.unwrap_err();
        assert!(matches!(
            err,
            StateError::UnsupportedVersion { found: 7, supported: 1, .. }
        ));
    }

    #[test]
    fn owner_of_finds_cursor_by_identity() {
        let snapshot = sample();
        assert_eq!(
            snapshot.owner_of(FileIdentity::new(2049, 77)),
            Some("/var/log/nginx/access.log")
        );
        assert_eq!(snapshot.owner_of(FileIdentity::new(2049, 78)), None);
    }

    #[test]
    fn unknown_identity_has_no_owner() {
        let mut snapshot = StateSnapshot::empty();
        snapshot.cursors.insert(
            "C:/logs/app.log".to_owned(),
            Cursor {
                identity: FileIdentity::new(0, 0),
                offset: 10,
                generation: 0,
            },
        );
        assert_eq!(snapshot.owner_of(FileIdentity::new(0, 0)), None);
    }
}
