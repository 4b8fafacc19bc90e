//! 에러 타입 — 도메인별 에러 정의
//!
//! 실행 단위(run) 경계에서 [`LoaderError`] 하나로 모이며,
//! CLI는 이 분류에 따라 종료 코드를 결정합니다.

/// logloader 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 상태 스냅샷 에러
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// 실행 잠금 에러
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    /// 싱크 쓰기 에러
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// 레코드 매핑 에러
    #[error("map error: {0}")]
    Map(#[from] MapError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 필수 설정 누락
    #[error("missing required config value '{field}' (env: {env_key})")]
    Missing { field: String, env_key: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 상태 스냅샷 에러
///
/// 손상된 스냅샷은 절대 빈 상태로 대체하지 않습니다.
/// 모든 커서를 0으로 되돌리면 대량 재전송이 발생하기 때문입니다.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// 스냅샷 파일 내용을 해석할 수 없음
    #[error("state snapshot {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },

    /// 알 수 없는 스냅샷 버전
    #[error("state snapshot {path} has unsupported version {found} (supported: {supported})")]
    UnsupportedVersion {
        path: String,
        found: u32,
        supported: u32,
    },

    /// 스냅샷 읽기/쓰기 실패
    #[error("state snapshot {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 실행 잠금 에러
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// 다른 프로세스가 잠금을 보유 중
    #[error("another run holds the lock {path} (holder pid: {holder})")]
    Held { path: String, holder: String },

    /// 잠금 파일 접근 실패
    #[error("lock file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 싱크 에러
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 배치 쓰기 실패
    #[error("write failed: {0}")]
    Write(String),

    /// 제한 시간 초과
    #[error("sink operation timed out after {secs}s")]
    Timeout { secs: u64 },

    /// 스키마 준비 실패
    #[error("schema error: {0}")]
    Schema(String),
}

/// 레코드 매핑 에러 (라인 단위)
///
/// 개별 라인의 매핑 실패는 실행을 중단시키지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// 형식과 일치하지 않는 라인
    #[error("line does not match {format} format")]
    NoMatch { format: String },

    /// 필드 값 변환 실패
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// 텍스트 인코딩 문제
    #[error("encoding error: {0}")]
    Encoding(String),
}
