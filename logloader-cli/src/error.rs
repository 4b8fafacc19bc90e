//! CLI 에러 타입과 종료 코드 매핑

use logloader_core::error::LoaderError;
use logloader_ingest::IngestError;

/// CLI 에러
///
/// 각 변형은 사용자에게 보여줄 메시지를 담고 있으며
/// `exit_code()`로 프로세스 종료 코드를 결정합니다.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// 설정 로드/검증 실패
    #[error("configuration error: {0}")]
    Config(String),

    /// 다른 실행이 잠금을 보유 중
    #[error("another run is in progress: {0}")]
    LockHeld(String),

    /// 상태 스냅샷 로드/저장 실패
    #[error("state error: {0}")]
    State(String),

    /// 싱크 연결/쓰기 실패
    #[error("sink error: {0}")]
    Sink(String),

    /// 시그널로 중단됨
    #[error("interrupted by {0}")]
    Interrupted(&'static str),

    /// 그 밖의 실패
    #[error("{0}")]
    Command(String),

    /// 출력 직렬화 실패
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// 프로세스 종료 코드
    ///
    /// | 코드 | 의미                          |
    /// |------|-------------------------------|
    /// | 0    | 성공 (새 데이터가 없는 경우 포함) |
    /// | 1    | 일반 에러                      |
    /// | 2    | 설정 에러                      |
    /// | 3    | 잠금 경합                      |
    /// | 4    | 상태 스냅샷 에러               |
    /// | 5    | 싱크 에러                      |
    /// | 10   | I/O 에러                       |
    /// | 130  | 시그널로 중단                  |
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::LockHeld(_) => 3,
            Self::State(_) => 4,
            Self::Sink(_) => 5,
            Self::Io(_) => 10,
            Self::Interrupted(_) => 130,
            Self::Command(_) | Self::JsonSerialize(_) => 1,
        }
    }
}

impl From<LoaderError> for CliError {
    fn from(e: LoaderError) -> Self {
        match e {
            LoaderError::Config(e) => Self::Config(e.to_string()),
            LoaderError::Lock(logloader_core::error::LockError::Held { path, holder }) => {
                Self::LockHeld(format!("{path} (pid {holder})"))
            }
            LoaderError::Lock(e) => Self::Io(std::io::Error::other(e.to_string())),
            LoaderError::State(e) => Self::State(e.to_string()),
            LoaderError::Sink(e) => Self::Sink(e.to_string()),
            LoaderError::Map(e) => Self::Command(e.to_string()),
            LoaderError::Io(e) => Self::Io(e),
        }
    }
}

impl From<IngestError> for CliError {
    fn from(e: IngestError) -> Self {
        LoaderError::from(e).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logloader_core::error::{ConfigError, LockError, SinkError, StateError};

    #[test]
    fn config_error_exits_2() {
        let err: CliError = LoaderError::Config(ConfigError::Missing {
            field: "source.pattern".to_owned(),
            env_key: "LOGLOADER_SOURCE_PATTERN".to_owned(),
        })
        .into();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("source.pattern"));
    }

    #[test]
    fn lock_held_exits_3_and_names_holder() {
        let err: CliError = IngestError::Lock(LockError::Held {
            path: "/var/lib/logloader/state.json.lock".to_owned(),
            holder: "4242".to_owned(),
        })
        .into();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("4242"));
    }

    #[test]
    fn lock_io_is_not_contention() {
        let err: CliError = LoaderError::Lock(LockError::Io {
            path: "/x.lock".to_owned(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        })
        .into();
        assert_eq!(err.exit_code(), 10);
    }

    #[test]
    fn state_error_exits_4() {
        let err: CliError = IngestError::State(StateError::Corrupt {
            path: "state.json".to_owned(),
            reason: "expected value".to_owned(),
        })
        .into();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn sink_error_exits_5() {
        let err: CliError = IngestError::Sink(SinkError::Timeout { secs: 60 }).into();
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn interrupted_exits_130() {
        assert_eq!(CliError::Interrupted("SIGTERM").exit_code(), 130);
        assert_eq!(CliError::Interrupted("SIGINT").to_string(), "interrupted by SIGINT");
    }

    #[test]
    fn io_error_exits_10() {
        let err = CliError::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(err.exit_code(), 10);
    }

    #[test]
    fn command_error_exits_1() {
        assert_eq!(CliError::Command("boom".to_owned()).exit_code(), 1);
    }
}
