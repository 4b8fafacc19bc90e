//! 설정 관리 — logloader.toml 파싱 및 런타임 설정
//!
//! [`LoaderConfig`]는 한 번의 실행에 필요한 모든 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGLOADER_SOURCE_PATTERN=/var/log/nginx/*.log` 형식)
//! 3. 설정 파일 (`logloader.toml`, 선택)
//! 4. 기본값 (`Default` 구현, 튜닝 값에만 존재)
//!
//! 소스 패턴, 로그 형식, 싱크 연결 정보, 상태 파일 위치, 실행 로그 레벨/출력 위치는
//! 기본값이 없는 필수 값입니다. 누락은 실행 시작 전 설정 에러입니다.
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logloader_core::error::LoaderError> {
//! use std::path::Path;
//! use logloader_core::config::LoaderConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드 + 검증
//! let config = LoaderConfig::load(Some(Path::new("logloader.toml"))).await?;
//!
//! // 환경변수만으로 로드
//! let config = LoaderConfig::load(None).await?;
//! # Ok(())
//! # }
//! ```

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LoaderError};

/// 지원하는 로그 라인 형식
pub const SUPPORTED_FORMATS: &[&str] = &["nginx_detailed", "nginx_combined", "json"];

/// 허용되는 실행 로그 레벨
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// `logging.destination`의 표준 에러 출력 값
pub const STDERR_DESTINATION: &str = "stderr";

/// logloader 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// 로그 소스 설정
    #[serde(default)]
    pub source: SourceConfig,
    /// 상태 스냅샷 설정
    #[serde(default)]
    pub state: StateConfig,
    /// 싱크(PostgreSQL) 설정
    #[serde(default)]
    pub sink: SinkConfig,
    /// 실행 로그 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 메트릭 내보내기 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LoaderConfig {
    /// 설정을 로드하고 환경변수 오버라이드 후 검증합니다.
    ///
    /// `path`가 `None`이면 환경변수만으로 설정을 구성합니다.
    pub async fn load(path: Option<&Path>) -> Result<Self, LoaderError> {
        let mut config = match path {
            Some(path) => Self::from_file(path).await?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 읽습니다 (오버라이드/검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LoaderError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoaderError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LoaderError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LoaderError> {
        toml::from_str(toml_str).map_err(|e| {
            LoaderError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGLOADER_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // Source
        override_opt_string(&mut self.source.pattern, "LOGLOADER_SOURCE_PATTERN");
        override_opt_string(&mut self.source.format, "LOGLOADER_SOURCE_FORMAT");
        override_u64(
            &mut self.source.max_read_bytes,
            "LOGLOADER_SOURCE_MAX_READ_BYTES",
        );
        override_u64(
            &mut self.source.read_timeout_secs,
            "LOGLOADER_SOURCE_READ_TIMEOUT_SECS",
        );

        // State
        override_opt_string(&mut self.state.path, "LOGLOADER_STATE_PATH");
        override_opt_string(&mut self.state.lock_path, "LOGLOADER_STATE_LOCK_PATH");

        // Sink
        override_opt_string(&mut self.sink.database_url, "LOGLOADER_SINK_DATABASE_URL");
        override_opt_string(&mut self.sink.host, "LOGLOADER_SINK_HOST");
        override_u16(&mut self.sink.port, "LOGLOADER_SINK_PORT");
        override_opt_string(&mut self.sink.dbname, "LOGLOADER_SINK_DBNAME");
        override_opt_string(&mut self.sink.user, "LOGLOADER_SINK_USER");
        override_opt_string(&mut self.sink.password, "LOGLOADER_SINK_PASSWORD");
        override_string(&mut self.sink.table, "LOGLOADER_SINK_TABLE");
        override_usize(&mut self.sink.chunk_size, "LOGLOADER_SINK_CHUNK_SIZE");
        override_u64(
            &mut self.sink.connect_timeout_secs,
            "LOGLOADER_SINK_CONNECT_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.sink.write_timeout_secs,
            "LOGLOADER_SINK_WRITE_TIMEOUT_SECS",
        );

        // Logging
        override_opt_string(&mut self.logging.level, "LOGLOADER_LOGGING_LEVEL");
        override_opt_string(
            &mut self.logging.destination,
            "LOGLOADER_LOGGING_DESTINATION",
        );
        override_string(&mut self.logging.format, "LOGLOADER_LOGGING_FORMAT");

        // Metrics
        override_opt_string(
            &mut self.metrics.textfile_path,
            "LOGLOADER_METRICS_TEXTFILE_PATH",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LoaderError> {
        let pattern = self.source.pattern()?;
        validate_pattern(pattern)?;

        let format = self.source.format()?;
        if !SUPPORTED_FORMATS.contains(&format) {
            return Err(invalid(
                "source.format",
                format!("must be one of: {}", SUPPORTED_FORMATS.join(", ")),
            ));
        }

        const MAX_READ_BYTES: u64 = 1024 * 1024 * 1024; // 1GB
        if self.source.max_read_bytes == 0 || self.source.max_read_bytes > MAX_READ_BYTES {
            return Err(invalid(
                "source.max_read_bytes",
                format!("must be 1-{}", MAX_READ_BYTES),
            ));
        }
        validate_timeout("source.read_timeout_secs", self.source.read_timeout_secs)?;

        self.state.path()?;

        self.sink.validate()?;

        let level = self.logging.level()?;
        if !LOG_LEVELS.contains(&level) {
            return Err(invalid(
                "logging.level",
                format!("must be one of: {}", LOG_LEVELS.join(", ")),
            ));
        }
        self.logging.destination()?;

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(invalid(
                "logging.format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if let Some(path) = &self.metrics.textfile_path {
            if path.trim().is_empty() {
                return Err(invalid("metrics.textfile_path", "must not be empty"));
            }
        }

        Ok(())
    }
}

/// 로그 소스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// 로그 파일 패턴 (파일 이름 부분에만 `*`, `?` 허용)
    pub pattern: Option<String>,
    /// 로그 라인 형식
    pub format: Option<String>,
    /// 대상 파일당 한 번의 실행에서 읽을 최대 바이트
    pub max_read_bytes: u64,
    /// 파일 읽기 제한 시간 (초)
    pub read_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            pattern: None,
            format: None,
            max_read_bytes: 64 * 1024 * 1024, // 64MB
            read_timeout_secs: 30,
        }
    }
}

impl SourceConfig {
    /// 로그 파일 패턴을 반환합니다.
    pub fn pattern(&self) -> Result<&str, ConfigError> {
        required(&self.pattern, "source.pattern", "LOGLOADER_SOURCE_PATTERN")
    }

    /// 로그 라인 형식 이름을 반환합니다.
    pub fn format(&self) -> Result<&str, ConfigError> {
        required(&self.format, "source.format", "LOGLOADER_SOURCE_FORMAT")
    }
}

/// 상태 스냅샷 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// 상태 스냅샷 파일 경로
    pub path: Option<String>,
    /// 실행 잠금 파일 경로 (기본: `<path>.lock`)
    pub lock_path: Option<String>,
}

impl StateConfig {
    /// 상태 스냅샷 파일 경로를 반환합니다.
    pub fn path(&self) -> Result<PathBuf, ConfigError> {
        required(&self.path, "state.path", "LOGLOADER_STATE_PATH").map(PathBuf::from)
    }

    /// 잠금 파일 경로를 반환합니다.
    pub fn lock_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.lock_path {
            Some(path) if !path.trim().is_empty() => Ok(PathBuf::from(path)),
            _ => {
                let mut path = self.path()?.into_os_string();
                path.push(".lock");
                Ok(PathBuf::from(path))
            }
        }
    }
}

/// 싱크(PostgreSQL) 설정
///
/// `database_url` 또는 `host`/`dbname`/`user` 조합 중 하나가 필요합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// PostgreSQL 연결 문자열
    pub database_url: Option<String>,
    /// 호스트 (database_url 미사용 시)
    pub host: Option<String>,
    /// 포트
    pub port: u16,
    /// 데이터베이스 이름
    pub dbname: Option<String>,
    /// 사용자
    pub user: Option<String>,
    /// 비밀번호
    pub password: Option<String>,
    /// 대상 테이블 이름
    pub table: String,
    /// INSERT 문 하나에 담을 최대 레코드 수
    pub chunk_size: usize,
    /// 연결 제한 시간 (초)
    pub connect_timeout_secs: u64,
    /// 배치 쓰기 제한 시간 (초)
    pub write_timeout_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            host: None,
            port: 5432,
            dbname: None,
            user: None,
            password: None,
            table: "nginx_logs".to_owned(),
            chunk_size: 500,
            connect_timeout_secs: 10,
            write_timeout_secs: 60,
        }
    }
}

impl SinkConfig {
    /// 연결 정보가 URL 형식으로 주어졌는지 확인합니다.
    pub fn uses_url(&self) -> bool {
        self.database_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    fn validate(&self) -> Result<(), LoaderError> {
        if !self.uses_url() {
            required(&self.host, "sink.host", "LOGLOADER_SINK_HOST")?;
            required(&self.dbname, "sink.dbname", "LOGLOADER_SINK_DBNAME")?;
            required(&self.user, "sink.user", "LOGLOADER_SINK_USER")?;
        }

        if !is_sql_identifier(&self.table) {
            return Err(invalid(
                "sink.table",
                format!(
                    "'{}' is not a plain SQL identifier ([A-Za-z_][A-Za-z0-9_]*, optionally schema-qualified)",
                    self.table
                ),
            ));
        }

        const MAX_CHUNK_SIZE: usize = 2000;
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(invalid(
                "sink.chunk_size",
                format!("must be 1-{}", MAX_CHUNK_SIZE),
            ));
        }

        validate_timeout("sink.connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout("sink.write_timeout_secs", self.write_timeout_secs)?;
        Ok(())
    }
}

/// 실행 로그 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub level: Option<String>,
    /// 출력 위치 (`stderr` 또는 파일 경로)
    pub destination: Option<String>,
    /// 로그 형식 (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            destination: None,
            format: "json".to_owned(),
        }
    }
}

impl LoggingConfig {
    /// 로그 레벨을 반환합니다.
    pub fn level(&self) -> Result<&str, ConfigError> {
        required(&self.level, "logging.level", "LOGLOADER_LOGGING_LEVEL")
    }

    /// 로그 출력 위치를 반환합니다.
    pub fn destination(&self) -> Result<&str, ConfigError> {
        required(
            &self.destination,
            "logging.destination",
            "LOGLOADER_LOGGING_DESTINATION",
        )
    }
}

/// 메트릭 내보내기 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus textfile 출력 경로 (없으면 내보내지 않음)
    pub textfile_path: Option<String>,
}

/// 패턴을 디렉토리와 파일 이름 glob으로 분리합니다.
///
/// 디렉토리 부분이 없으면 현재 디렉토리(`.`)를 사용합니다.
pub fn split_pattern(pattern: &str) -> (PathBuf, String) {
    let path = Path::new(pattern);
    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    (dir, file)
}

fn validate_pattern(pattern: &str) -> Result<(), LoaderError> {
    let path = Path::new(pattern);

    if path.components().any(|c| c == Component::ParentDir) {
        return Err(invalid(
            "source.pattern",
            format!("pattern '{}' contains path traversal pattern '..'", pattern),
        ));
    }

    let (dir, file) = split_pattern(pattern);
    if file.is_empty() {
        return Err(invalid(
            "source.pattern",
            format!("pattern '{}' has no file name component", pattern),
        ));
    }

    if dir.to_string_lossy().contains(['*', '?', '[']) {
        return Err(invalid(
            "source.pattern",
            format!(
                "pattern '{}' uses wildcards in the directory part; only the file name may contain '*' or '?'",
                pattern
            ),
        ));
    }

    Ok(())
}

fn validate_timeout(field: &str, secs: u64) -> Result<(), LoaderError> {
    const MAX_TIMEOUT_SECS: u64 = 3600; // 1 hour
    if secs == 0 || secs > MAX_TIMEOUT_SECS {
        return Err(invalid(field, format!("must be 1-{}", MAX_TIMEOUT_SECS)));
    }
    Ok(())
}

fn is_sql_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return false;
    }
    parts.iter().all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                part.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    })
}

fn required<'a>(
    value: &'a Option<String>,
    field: &str,
    env_key: &str,
) -> Result<&'a str, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing {
            field: field.to_owned(),
            env_key: env_key.to_owned(),
        }),
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> LoaderError {
    LoaderError::Config(ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    })
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_opt_string(target: &mut Option<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = Some(val);
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
