//! 대상 파일 탐색
//!
//! 패턴은 리터럴 디렉토리 + 파일 이름 glob(`*`, `?`)으로 구성됩니다.
//! 매 실행마다 디렉토리를 한 번 나열하며, 결과는 이름순으로 정렬되어
//! 같은 파일 집합에 대해 항상 같은 순서를 보장합니다.

use std::path::{Path, PathBuf};

use logloader_core::config::split_pattern;
use logloader_core::types::{FileIdentity, LogTarget};

use crate::error::IngestError;
use crate::identity::FileStat;

/// 패턴에 매칭되는 일반 파일을 탐색합니다.
///
/// 디렉토리가 없거나 매칭되는 파일이 없으면 빈 목록을 반환합니다.
/// 심볼릭 링크는 대상이 일반 파일일 때만 포함합니다.
pub async fn discover(pattern: &str) -> Result<Vec<LogTarget>, IngestError> {
    let (dir, file_pattern) = split_pattern(pattern);

    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(dir = %dir.display(), "pattern directory does not exist");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(IngestError::Discovery {
                dir: dir.display().to_string(),
                source,
            });
        }
    };

    let mut targets = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(source) => {
                return Err(IngestError::Discovery {
                    dir: dir.display().to_string(),
                    source,
                });
            }
        };

        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if !glob_match(&file_pattern, &file_name) {
            continue;
        }

        let path = entry.path();
        // 나열과 stat 사이에 삭제된 파일은 조용히 건너뜀
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }

        let stat = FileStat::from_metadata(&meta);
        targets.push(LogTarget {
            name: path.display().to_string(),
            identity: stat.identity,
            size: stat.size,
            path,
        });
    }

    targets.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::debug!(pattern, count = targets.len(), "discovered log files");
    Ok(targets)
}

/// 로테이션으로 이름이 바뀐 이전 파일
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedFile {
    /// 현재 경로
    pub path: PathBuf,
    /// 현재 식별자와 크기
    pub stat: FileStat,
}

/// 로테이션된 이전 파일을 식별자로 찾습니다.
///
/// 후보는 활성 파일과 같은 디렉토리에서 이름이 활성 파일 이름으로 시작하는
/// 형제 파일(`access.log.1`, `access.log-20240101` 등)과 이번 실행에서 패턴에
/// 매칭된 다른 파일들입니다. 형제 파일을 이름순으로 먼저 검사합니다.
pub async fn find_rotated(
    active: &Path,
    wanted: FileIdentity,
    matched: &[LogTarget],
) -> std::io::Result<Option<RotatedFile>> {
    let Some(active_name) = active.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Ok(None);
    };
    let dir = match active.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut candidates = Vec::new();
    match tokio::fs::read_dir(&dir).await {
        Ok(mut entries) => {
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name != active_name && name.starts_with(&active_name) {
                    candidates.push(entry.path());
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    candidates.sort();

    for candidate in candidates {
        let Ok(meta) = tokio::fs::metadata(&candidate).await else {
            continue;
        };
        let stat = FileStat::from_metadata(&meta);
        if meta.is_file() && stat.identity == wanted {
            return Ok(Some(RotatedFile {
                path: candidate,
                stat,
            }));
        }
    }

    // 패턴에 매칭된 파일은 이미 관측한 식별자를 사용
    Ok(matched
        .iter()
        .find(|t| t.path != active && t.identity == wanted)
        .map(|t| RotatedFile {
            path: t.path.clone(),
            stat: FileStat {
                identity: t.identity,
                size: t.size,
            },
        }))
}

/// 간단한 glob 패턴 매칭 (*, ? 지원)
///
/// - `*`: 0개 이상의 임의 문자
/// - `?`: 정확히 1개의 임의 문자
pub fn glob_match(pattern: &str, text: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut p = 0;
    let mut t = 0;
    let mut star: Option<usize> = None;
    let mut star_t = 0;

    // 백트래킹 지점을 하나만 유지하는 반복 매칭
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(sp) = star {
            p = sp + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }

    p == pattern.len()
}
