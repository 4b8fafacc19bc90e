//! nginx access log 매퍼
//!
//! # 상세 형식 (`nginx_detailed`)
//! ```text
//! [10/Oct/2024:13:55:36 +0200] | example.com | 203.0.113.7 | - | "GET / HTTP/1.1" Status="200" BodyBytesSent="612" Referer="-" UserAgent="curl/8.0" RequestTime="0.004" UpstreamResponseTime="0.003" GzipRatio="-"
//! ```
//!
//! # combined 형식 (`nginx_combined`)
//! ```text
//! 203.0.113.7 - alice [10/Oct/2024:13:55:36 +0200] "GET / HTTP/1.1" 200 612 "-" "curl/8.0"
//! ```

use regex::{Captures, Regex};

use logloader_core::error::MapError;
use logloader_core::pipeline::RecordMapper;
use logloader_core::types::{Column, ColumnType, FieldValue, RawLine, StructuredRecord};

use super::{dash_to_null, line_text, parse_nginx_time};

const DETAILED_PATTERN: &str = concat!(
    r#"^\[(?P<time_local>[^\]]+)\]\s*\|\s*(?P<host>[^|]+)\s*\|\s*"#,
    r#"(?P<remote_addr>[^|]+)\s*\|\s*(?P<remote_user>[^|]+)\s*\|\s*"#,
    r#""(?P<request>.*?)"\s*Status="(?P<status>\d+)"\s*"#,
    r#"BodyBytesSent="(?P<body_bytes_sent>[\d-]+)"\s*"#,
    r#"Referer="(?P<http_referer>[^"]*)"\s*"#,
    r#"UserAgent="(?P<http_user_agent>[^"]*)"\s*"#,
    r#"RequestTime="(?P<request_time>[\d.\-]+)"\s*"#,
    r#"UpstreamResponseTime="(?P<upstream_response_time>[\d.\-]+)"\s*"#,
    r#"GzipRatio="(?P<gzip_ratio>[\d.\-]+)""#,
);

const COMBINED_PATTERN: &str = concat!(
    r#"^(?P<remote_addr>\S+) \S+ (?P<remote_user>\S+) \[(?P<time_local>[^\]]+)\] "#,
    r#""(?P<request>(?:[^"\\]|\\.)*)" (?P<status>\d{3}|-) (?P<body_bytes_sent>\d+|-)"#,
    r#"(?: "(?P<http_referer>(?:[^"\\]|\\.)*)" "(?P<http_user_agent>(?:[^"\\]|\\.)*)")?"#,
);

const DETAILED_COLUMNS: &[Column] = &[
    Column::new("time_local", ColumnType::Timestamp),
    Column::new("host", ColumnType::Text),
    Column::new("remote_addr", ColumnType::Text),
    Column::new("remote_user", ColumnType::Text),
    Column::new("request", ColumnType::Text),
    Column::new("status", ColumnType::Int),
    Column::new("body_bytes_sent", ColumnType::BigInt),
    Column::new("http_referer", ColumnType::Text),
    Column::new("http_user_agent", ColumnType::Text),
    Column::new("request_time", ColumnType::Float),
    Column::new("upstream_response_time", ColumnType::Float),
    Column::new("gzip_ratio", ColumnType::Float),
];

const COMBINED_COLUMNS: &[Column] = &[
    Column::new("time_local", ColumnType::Timestamp),
    Column::new("remote_addr", ColumnType::Text),
    Column::new("remote_user", ColumnType::Text),
    Column::new("request", ColumnType::Text),
    Column::new("status", ColumnType::Int),
    Column::new("body_bytes_sent", ColumnType::BigInt),
    Column::new("http_referer", ColumnType::Text),
    Column::new("http_user_agent", ColumnType::Text),
];

/// 파이프 구분 상세 access log 매퍼
///
/// 변환 규칙:
/// - `time_local`: 해석 불가 시 NULL
/// - `body_bytes_sent`: `-` 또는 비어 있으면 0
/// - `request_time`, `upstream_response_time`, `gzip_ratio`: `-`이면 0.0
/// - `remote_user`, `request`, `http_referer`, `http_user_agent`: `-`이면 NULL
pub struct NginxDetailedMapper {
    pattern: Regex,
}

impl NginxDetailedMapper {
    /// 새 매퍼를 생성합니다.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(DETAILED_PATTERN)?,
        })
    }
}

impl RecordMapper for NginxDetailedMapper {
    fn format_name(&self) -> &str {
        "nginx_detailed"
    }

    fn columns(&self) -> &[Column] {
        DETAILED_COLUMNS
    }

    fn map(&self, line: &RawLine) -> Result<StructuredRecord, MapError> {
        let text = line_text(line);
        let caps = self.pattern.captures(&text).ok_or_else(|| MapError::NoMatch {
            format: self.format_name().to_owned(),
        })?;

        let values = vec![
            FieldValue::Timestamp(parse_nginx_time(group(&caps, "time_local"))),
            FieldValue::Text(Some(group(&caps, "host").trim().to_owned())),
            FieldValue::Text(Some(group(&caps, "remote_addr").trim().to_owned())),
            FieldValue::Text(dash_to_null(group(&caps, "remote_user"))),
            FieldValue::Text(dash_to_null(group(&caps, "request"))),
            FieldValue::Int(parse_status(group(&caps, "status"))?),
            FieldValue::Int(Some(
                parse_nullable_int("body_bytes_sent", group(&caps, "body_bytes_sent"))?
                    .unwrap_or(0),
            )),
            FieldValue::Text(dash_to_null(group(&caps, "http_referer"))),
            FieldValue::Text(dash_to_null(group(&caps, "http_user_agent"))),
            FieldValue::Float(Some(zero_if_null("request_time", &caps)?)),
            FieldValue::Float(Some(zero_if_null("upstream_response_time", &caps)?)),
            FieldValue::Float(Some(zero_if_null("gzip_ratio", &caps)?)),
        ];

        Ok(StructuredRecord {
            key: line.key(),
            values,
        })
    }
}

/// nginx combined 형식 매퍼
///
/// referer와 user agent가 없는 common 형식 라인도 허용하며 이때 두 값은 NULL입니다.
pub struct NginxCombinedMapper {
    pattern: Regex,
}

impl NginxCombinedMapper {
    /// 새 매퍼를 생성합니다.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(COMBINED_PATTERN)?,
        })
    }
}

impl RecordMapper for NginxCombinedMapper {
    fn format_name(&self) -> &str {
        "nginx_combined"
    }

    fn columns(&self) -> &[Column] {
        COMBINED_COLUMNS
    }

    fn map(&self, line: &RawLine) -> Result<StructuredRecord, MapError> {
        let text = line_text(line);
        let caps = self.pattern.captures(&text).ok_or_else(|| MapError::NoMatch {
            format: self.format_name().to_owned(),
        })?;

        let optional = |name: &str| caps.name(name).and_then(|m| dash_to_null(m.as_str()));

        let values = vec![
            FieldValue::Timestamp(parse_nginx_time(group(&caps, "time_local"))),
            FieldValue::Text(Some(group(&caps, "remote_addr").to_owned())),
            FieldValue::Text(dash_to_null(group(&caps, "remote_user"))),
            FieldValue::Text(dash_to_null(group(&caps, "request"))),
            FieldValue::Int(parse_status(group(&caps, "status"))?),
            FieldValue::Int(Some(
                parse_nullable_int("body_bytes_sent", group(&caps, "body_bytes_sent"))?
                    .unwrap_or(0),
            )),
            FieldValue::Text(optional("http_referer")),
            FieldValue::Text(optional("http_user_agent")),
        ];

        Ok(StructuredRecord {
            key: line.key(),
            values,
        })
    }
}

fn group<'t>(caps: &Captures<'t>, name: &str) -> &'t str {
    caps.name(name).map_or("", |m| m.as_str())
}

fn parse_status(value: &str) -> Result<Option<i64>, MapError> {
    if value.is_empty() || value == "-" {
        return Ok(None);
    }
    value
        .parse::<i32>()
        .map(|v| Some(i64::from(v)))
        .map_err(|e| invalid("status", value, e))
}

fn parse_nullable_int(field: &str, value: &str) -> Result<Option<i64>, MapError> {
    if value.is_empty() || value == "-" {
        return Ok(None);
    }
    value
        .parse::<i64>()
        .map(Some)
        .map_err(|e| invalid(field, value, e))
}

fn zero_if_null(field: &str, caps: &Captures<'_>) -> Result<f64, MapError> {
    let value = group(caps, field);
    if value.is_empty() || value == "-" {
        return Ok(0.0);
    }
    value.parse::<f64>().map_err(|e| invalid(field, value, e))
}

fn invalid(field: &str, value: &str, err: impl std::fmt::Display) -> MapError {
    MapError::InvalidField {
        field: field.to_owned(),
        reason: format!("'{value}': {err}"),
    }
}
