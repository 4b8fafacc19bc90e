//! 파일 식별자 조회
//!
//! Unix에서는 `(st_dev, st_ino)`를 사용합니다.
//! 그 외 플랫폼에서는 식별자가 항상 `(0, 0)`이며 로테이션은 감지되지 않고
//! 크기 축소(truncate)만 감지됩니다.

use std::fs::Metadata;
use std::path::Path;

use logloader_core::types::FileIdentity;

/// 관측 시점의 식별자와 크기
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// 파일 식별자
    pub identity: FileIdentity,
    /// 파일 크기 (바이트)
    pub size: u64,
}

impl FileStat {
    /// 메타데이터에서 생성합니다.
    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            identity: identity_of(meta),
            size: meta.len(),
        }
    }
}

/// 메타데이터에서 식별자를 추출합니다.
#[cfg(unix)]
pub fn identity_of(meta: &Metadata) -> FileIdentity {
    use std::os::unix::fs::MetadataExt;
    FileIdentity::new(meta.dev(), meta.ino())
}

/// 메타데이터에서 식별자를 추출합니다.
#[cfg(not(unix))]
pub fn identity_of(_meta: &Metadata) -> FileIdentity {
    FileIdentity::new(0, 0)
}

/// 경로의 현재 식별자와 크기를 조회합니다.
///
/// 파일이 없으면 `Ok(None)`을 반환합니다. 심볼릭 링크는 따라갑니다.
pub async fn resolve(path: &Path) -> std::io::Result<Option<FileStat>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(FileStat::from_metadata(&meta))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// 열린 파일 핸들의 식별자와 크기를 조회합니다 (fstat).
///
/// stat과 open 사이에 파일이 교체되었는지 확인할 때 사용합니다.
pub async fn stat_open(file: &tokio::fs::File) -> std::io::Result<FileStat> {
    let meta = file.metadata().await?;
    Ok(FileStat::from_metadata(&meta))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, b"hello\n").unwrap();

        let stat = resolve(&path).await.unwrap().unwrap();
        assert_eq!(stat.size, 6);
    }

    #[tokio::test]
    async fn resolve_missing_file_is_none() {
        let stat = resolve(Path::new("/nonexistent/logloader/a.log"))
            .await
            .unwrap();
        assert!(stat.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn recreated_file_gets_new_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        let rotated = dir.path().join("a.log.1");
        std::fs::write(&path, b"one\n").unwrap();
        let before = resolve(&path).await.unwrap().unwrap();

        std::fs::rename(&path, &rotated).unwrap();
        std::fs::write(&path, b"two\n").unwrap();

        let after = resolve(&path).await.unwrap().unwrap();
        let moved = resolve(&rotated).await.unwrap().unwrap();
        assert_ne!(before.identity, after.identity);
        assert_eq!(before.identity, moved.identity);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn append_keeps_identity() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, b"one\n").unwrap();
        let before = resolve(&path).await.unwrap().unwrap();

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"two\n").unwrap();

        let after = resolve(&path).await.unwrap().unwrap();
        assert_eq!(before.identity, after.identity);
        assert_eq!(after.size, 8);
    }

    #[tokio::test]
    async fn open_file_matches_path_stat() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, b"abc").unwrap();

        let file = tokio::fs::File::open(&path).await.unwrap();
        let from_handle = stat_open(&file).await.unwrap();
        let from_path = resolve(&path).await.unwrap().unwrap();
        assert_eq!(from_handle, from_path);
    }
}
