//! 수집 엔진 에러 타입
//!
//! [`IngestError`]는 수집 엔진 내부에서 발생하는 모든 에러를 표현합니다.
//! 대상 파일 단위 에러([`IngestError::is_target_local`])는 해당 파일만 이번 실행에서
//! 건너뛰게 하고, 나머지는 실행 전체를 중단시킵니다.
//! `From<IngestError> for LoaderError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logloader_core::error::{ConfigError, LoaderError, LockError, SinkError, StateError};
use logloader_core::types::FileIdentity;

/// 수집 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 패턴 디렉토리를 읽을 수 없음
    #[error("discovery error: {dir}: {source}")]
    Discovery {
        /// 탐색 디렉토리
        dir: String,
        #[source]
        source: std::io::Error,
    },

    /// 파일 식별자 조회 실패
    #[error("cannot resolve identity of {path}: {source}")]
    Identity {
        /// 대상 파일 경로
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 관측 이후 파일이 교체됨
    #[error("{path} changed identity between stat and open (expected {expected}, found {found})")]
    IdentityChanged {
        /// 대상 파일 경로
        path: String,
        /// 계획 시점의 식별자
        expected: FileIdentity,
        /// 열었을 때의 식별자
        found: FileIdentity,
    },

    /// 세그먼트 읽기 실패
    #[error("read error: {path}: {source}")]
    Read {
        /// 대상 파일 경로
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 세그먼트 읽기 제한 시간 초과
    #[error("read of {path} timed out after {secs}s")]
    ReadTimeout {
        /// 대상 파일 경로
        path: String,
        /// 제한 시간 (초)
        secs: u64,
    },

    /// 싱크 에러 (실행 전체 중단)
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// 상태 스냅샷 에러
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// 실행 잠금 에러
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    /// 설정 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl IngestError {
    /// 대상 파일 하나에만 국한된 에러인지 확인합니다.
    ///
    /// 이 경우 해당 파일의 커서를 유지한 채 다음 파일로 진행합니다.
    pub fn is_target_local(&self) -> bool {
        matches!(
            self,
            Self::Identity { .. }
                | Self::IdentityChanged { .. }
                | Self::Read { .. }
                | Self::ReadTimeout { .. }
        )
    }
}

impl From<IngestError> for LoaderError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Sink(e) => LoaderError::Sink(e),
            IngestError::State(e) => LoaderError::State(e),
            IngestError::Lock(e) => LoaderError::Lock(e),
            IngestError::Config(e) => LoaderError::Config(e),
            other => LoaderError::Io(std::io::Error::other(other.to_string())),
        }
    }
}
