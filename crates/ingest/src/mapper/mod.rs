//! 레코드 매퍼 -- 로그 형식별 라인 → 구조화 레코드 변환
//!
//! 각 매퍼는 core의 [`RecordMapper`] trait을 구현합니다.
//! [`build_mapper`]가 설정의 `source.format` 이름으로 매퍼를 선택합니다.
//!
//! # 지원 형식
//! - `nginx_detailed` ([`NginxDetailedMapper`]): 파이프 구분 상세 access log
//! - `nginx_combined` ([`NginxCombinedMapper`]): nginx/Apache combined 형식
//! - `json` ([`JsonMapper`]): JSON lines
//!
//! # 사용 예시
//! ```ignore
//! use logloader_ingest::mapper::build_mapper;
//!
//! let mapper = build_mapper("nginx_detailed")?;
//! let record = mapper.map(&line)?;
//! ```

pub mod json;
pub mod nginx;

pub use json::JsonMapper;
pub use nginx::{NginxCombinedMapper, NginxDetailedMapper};

use std::borrow::Cow;

use chrono::{DateTime, Utc};

use logloader_core::error::ConfigError;
use logloader_core::pipeline::RecordMapper;
use logloader_core::types::RawLine;

/// nginx `$time_local` 형식
pub const NGINX_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// 형식 이름으로 매퍼를 생성합니다.
pub fn build_mapper(format: &str) -> Result<Box<dyn RecordMapper>, ConfigError> {
    let mapper: Box<dyn RecordMapper> = match format {
        "nginx_detailed" => Box::new(NginxDetailedMapper::new().map_err(regex_error)?),
        "nginx_combined" => Box::new(NginxCombinedMapper::new().map_err(regex_error)?),
        "json" => Box::new(JsonMapper::new()),
        other => {
            return Err(ConfigError::InvalidValue {
                field: "source.format".to_owned(),
                reason: format!("unknown log format '{other}'"),
            });
        }
    };
    Ok(mapper)
}

fn regex_error(err: regex::Error) -> ConfigError {
    ConfigError::InvalidValue {
        field: "source.format".to_owned(),
        reason: format!("failed to compile line pattern: {err}"),
    }
}

/// 라인을 텍스트로 변환하고 앞뒤 공백을 제거합니다.
///
/// 잘못된 UTF-8 바이트는 대체 문자로 바뀝니다.
pub(crate) fn line_text(line: &RawLine) -> Cow<'_, str> {
    match String::from_utf8_lossy(&line.data) {
        Cow::Borrowed(s) => Cow::Borrowed(s.trim()),
        Cow::Owned(s) => Cow::Owned(s.trim().to_owned()),
    }
}

/// nginx `$time_local` 값을 UTC로 변환합니다. 해석할 수 없으면 `None`.
pub(crate) fn parse_nginx_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value.trim(), NGINX_TIME_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// nginx의 빈 값 표기(`-`)를 NULL로 바꿉니다.
pub(crate) fn dash_to_null(value: &str) -> Option<String> {
    let value = value.trim();
    if value == "-" {
        None
    } else {
        Some(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::TimeZone;
    use logloader_core::types::FileIdentity;

    #[test]
    fn build_known_mappers() {
        for format in logloader_core::config::SUPPORTED_FORMATS {
            let mapper = build_mapper(format).unwrap();
            assert_eq!(mapper.format_name(), *format);
            assert!(!mapper.columns().is_empty());
        }
    }

    #[test]
    fn build_unknown_mapper_fails() {
        let err = build_mapper("apache_xml").err().unwrap();
        assert!(err.to_string().contains("apache_xml"));
    }

    #[test]
    fn nginx_time_is_converted_to_utc() {
        let ts = parse_nginx_time("10/Oct/2024:13:55:36 +0200").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 10, 10, 11, 55, 36).unwrap());
        assert!(parse_nginx_time("yesterday").is_none());
    }

    #[test]
    fn dash_means_null() {
        assert_eq!(dash_to_null("-"), None);
        assert_eq!(dash_to_null(" alice "), Some("alice".to_owned()));
    }

    #[test]
    fn line_text_trims_and_replaces_invalid_utf8() {
        let line = RawLine {
            log_name: "a".to_owned(),
            identity: FileIdentity::new(0, 0),
            generation: 0,
            offset: 0,
            span: 6,
            data: Bytes::from_static(b"  ab\xff "),
        };
        assert_eq!(line_text(&line), "ab\u{fffd}");
    }
}
