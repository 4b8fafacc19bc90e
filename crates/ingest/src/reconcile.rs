//! 로테이션 조정기
//!
//! 저장된 커서와 현재 관측한 파일(식별자, 크기)을 비교하여
//! 이번 실행에서 읽을 바이트 범위([`ReadPlan`])를 결정합니다.
//!
//! | 저장된 식별자 | 크기 관계 | 결정 |
//! |---|---|---|
//! | 없음 | - | [`Decision::FirstSeen`] |
//! | 현재와 같음 | size >= offset | [`Decision::Continue`] |
//! | 현재와 같음 | size < offset | [`Decision::Truncated`] |
//! | 현재와 다름 | - | [`Decision::Rotated`] |

use std::fmt;
use std::path::PathBuf;

use logloader_core::types::{Cursor, FileIdentity, LogTarget};

use crate::discovery;
use crate::error::IngestError;

/// 조정 결정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// 처음 보는 로그
    FirstSeen,
    /// 이어서 읽기
    Continue,
    /// 같은 파일이 잘림 (copytruncate 등)
    Truncated,
    /// 다른 파일로 교체됨
    Rotated {
        /// 이전 파일을 찾아 남은 부분을 읽는지 여부
        draining: bool,
    },
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstSeen => write!(f, "first_seen"),
            Self::Continue => write!(f, "continue"),
            Self::Truncated => write!(f, "truncated"),
            Self::Rotated { draining: true } => write!(f, "rotated"),
            Self::Rotated { draining: false } => write!(f, "rotated_lost_tail"),
        }
    }
}

/// 읽을 바이트 범위 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSegment {
    /// 읽을 파일 경로
    pub path: PathBuf,
    /// 계획 시점의 파일 식별자 (열 때 다시 확인)
    pub identity: FileIdentity,
    /// 라인에 부여할 세대
    pub generation: u64,
    /// 시작 오프셋 (포함)
    pub start: u64,
    /// 끝 오프셋 (제외)
    pub end: u64,
    /// 계획 시점의 파일 크기
    pub file_size: u64,
    /// 로테이션된 파일의 마지막 읽기인지 여부.
    /// 더 이상 append되지 않으므로 끝의 불완전한 라인도 내보냅니다.
    pub is_final: bool,
}

impl ReadSegment {
    /// 읽을 바이트 수
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// 읽을 바이트가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// `max_read_bytes` 제한으로 파일 끝까지 읽지 못하는지 여부
    pub fn is_bounded(&self) -> bool {
        self.end < self.file_size
    }
}

/// 대상 파일 하나에 대한 읽기 계획
///
/// `segments`는 순서대로 읽어야 하며, 마지막 세그먼트는 항상
/// 커밋될 커서(`identity`, `generation`)의 파일을 가리킵니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPlan {
    /// 논리 로그 이름
    pub log_name: String,
    /// 조정 결정
    pub decision: Decision,
    /// 읽을 범위 목록 (최소 1개, 빈 범위일 수 있음)
    pub segments: Vec<ReadSegment>,
    /// 커밋될 커서의 식별자
    pub identity: FileIdentity,
    /// 커밋될 커서의 세대
    pub generation: u64,
}

impl ReadPlan {
    /// 마지막 세그먼트를 `consumed_end`까지 소비했을 때의 다음 커서
    pub fn next_cursor(&self, consumed_end: u64) -> Cursor {
        Cursor {
            identity: self.identity,
            offset: consumed_end,
            generation: self.generation,
        }
    }

    /// 계획된 전체 바이트 수
    pub fn planned_bytes(&self) -> u64 {
        self.segments.iter().map(ReadSegment::len).sum()
    }

    /// 로테이션된 이전 파일 `identity`의 남은 부분을 이 계획이 읽는지 확인합니다.
    pub fn drains(&self, identity: FileIdentity) -> bool {
        self.decision == (Decision::Rotated { draining: true })
            && self.segments.first().is_some_and(|s| s.identity == identity)
    }

    /// 이전 파일을 끝까지 읽고 새 파일로 넘어가는지 여부.
    /// 이 경우 첫 세그먼트가 이전 파일, 마지막 세그먼트가 새 파일입니다.
    pub fn hands_off(&self) -> bool {
        self.segments.len() > 1
    }
}

/// 식별자와 크기만으로 결정을 내립니다.
///
/// 로테이션 시 이전 파일 탐색은 [`reconcile`]이 수행합니다.
pub fn decide(target: &LogTarget, cursor: Option<&Cursor>) -> Decision {
    match cursor.map(|c| compare(target, c)) {
        None => Decision::FirstSeen,
        Some(Change::Appended) => Decision::Continue,
        Some(Change::Shrunk) => Decision::Truncated,
        Some(Change::Replaced) => Decision::Rotated { draining: false },
    }
}

/// 커서가 있는 로그의 파일 상태 변화
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Appended,
    Shrunk,
    Replaced,
}

fn compare(target: &LogTarget, cursor: &Cursor) -> Change {
    if cursor.identity != target.identity {
        Change::Replaced
    } else if target.size >= cursor.offset {
        Change::Appended
    } else {
        Change::Shrunk
    }
}

/// 대상 파일의 읽기 계획을 수립합니다.
///
/// `matched`는 이번 실행에서 패턴에 매칭된 전체 파일 목록으로,
/// 로테이션된 이전 파일 후보로 사용됩니다.
/// 모든 세그먼트의 합은 `max_read_bytes`를 넘지 않습니다.
pub async fn reconcile(
    target: &LogTarget,
    cursor: Option<&Cursor>,
    matched: &[LogTarget],
    max_read_bytes: u64,
) -> Result<ReadPlan, IngestError> {
    let plan = match cursor {
        None => {
            tracing::info!(log = %target.name, size = target.size, "new log file");
            single_segment(target, Decision::FirstSeen, 0, 0, max_read_bytes)
        }
        Some(c) => match compare(target, c) {
            Change::Appended => {
                single_segment(target, Decision::Continue, c.offset, c.generation, max_read_bytes)
            }
            Change::Shrunk => {
                tracing::warn!(
                    log = %target.name,
                    offset = c.offset,
                    size = target.size,
                    generation = c.generation + 1,
                    "log file truncated, restarting from offset 0"
                );
                single_segment(target, Decision::Truncated, 0, c.generation + 1, max_read_bytes)
            }
            Change::Replaced => rotated_plan(target, c, matched, max_read_bytes).await?,
        },
    };

    tracing::debug!(
        log = %plan.log_name,
        decision = %plan.decision,
        segments = plan.segments.len(),
        bytes = plan.planned_bytes(),
        "read plan"
    );
    Ok(plan)
}

async fn rotated_plan(
    target: &LogTarget,
    cursor: &Cursor,
    matched: &[LogTarget],
    max_read_bytes: u64,
) -> Result<ReadPlan, IngestError> {
    let next_generation = cursor.generation + 1;

    let rotated = discovery::find_rotated(&target.path, cursor.identity, matched)
        .await
        .map_err(|source| IngestError::Read {
            path: target.path.display().to_string(),
            source,
        })?;

    let old = match rotated {
        Some(old) if old.stat.size >= cursor.offset => old,
        Some(old) => {
            tracing::warn!(
                log = %target.name,
                rotated_path = %old.path.display(),
                offset = cursor.offset,
                size = old.stat.size,
                "rotated file is smaller than the committed offset, its tail is lost"
            );
            return Ok(single_segment(
                target,
                Decision::Rotated { draining: false },
                0,
                next_generation,
                max_read_bytes,
            ));
        }
        None => {
            tracing::warn!(
                log = %target.name,
                old_identity = %cursor.identity,
                offset = cursor.offset,
                "log rotated and previous file not found, unread tail is lost"
            );
            return Ok(single_segment(
                target,
                Decision::Rotated { draining: false },
                0,
                next_generation,
                max_read_bytes,
            ));
        }
    };

    tracing::info!(
        log = %target.name,
        rotated_path = %old.path.display(),
        offset = cursor.offset,
        size = old.stat.size,
        "log rotated, draining previous file"
    );

    let drain_end = bounded_end(cursor.offset, old.stat.size, max_read_bytes);
    let drain = ReadSegment {
        path: old.path,
        identity: cursor.identity,
        generation: cursor.generation,
        start: cursor.offset,
        end: drain_end,
        file_size: old.stat.size,
        is_final: drain_end == old.stat.size,
    };

    // 이전 파일을 다 읽지 못하면 이번에는 이전 식별자를 유지
    if drain.is_bounded() {
        return Ok(ReadPlan {
            log_name: target.name.clone(),
            decision: Decision::Rotated { draining: true },
            identity: cursor.identity,
            generation: cursor.generation,
            segments: vec![drain],
        });
    }

    let remaining = max_read_bytes - drain.len();
    let current = ReadSegment {
        path: target.path.clone(),
        identity: target.identity,
        generation: next_generation,
        start: 0,
        end: bounded_end(0, target.size, remaining),
        file_size: target.size,
        is_final: false,
    };

    Ok(ReadPlan {
        log_name: target.name.clone(),
        decision: Decision::Rotated { draining: true },
        identity: target.identity,
        generation: next_generation,
        segments: vec![drain, current],
    })
}

fn single_segment(
    target: &LogTarget,
    decision: Decision,
    start: u64,
    generation: u64,
    max_read_bytes: u64,
) -> ReadPlan {
    ReadPlan {
        log_name: target.name.clone(),
        decision,
        identity: target.identity,
        generation,
        segments: vec![ReadSegment {
            path: target.path.clone(),
            identity: target.identity,
            generation,
            start,
            end: bounded_end(start, target.size, max_read_bytes),
            file_size: target.size,
            is_final: false,
        }],
    }
}

fn bounded_end(start: u64, size: u64, budget: u64) -> u64 {
    start + size.saturating_sub(start).min(budget)
}
