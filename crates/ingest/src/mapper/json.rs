//! JSON lines 매퍼
//!
//! 한 라인에 JSON 객체 하나가 있는 로그를 처리합니다.
//! 객체 전체는 `payload` 컬럼에 그대로 저장하고, 타임스탬프 필드는
//! 찾을 수 있으면 `time` 컬럼으로 추출합니다.
//!
//! # 타임스탬프 필드 (순서대로 시도)
//! `time`, `timestamp`, `@timestamp`, `time_iso8601`, `time_local`
//!
//! RFC 3339 문자열, nginx `$time_local` 문자열, unix 초(숫자)를 지원합니다.

use chrono::{DateTime, Utc};
use serde_json::Value;

use logloader_core::error::MapError;
use logloader_core::pipeline::RecordMapper;
use logloader_core::types::{Column, ColumnType, FieldValue, RawLine, StructuredRecord};

use super::{line_text, parse_nginx_time};

const COLUMNS: &[Column] = &[
    Column::new("time", ColumnType::Timestamp),
    Column::new("payload", ColumnType::Json),
];

const DEFAULT_TIME_FIELDS: &[&str] = &["time", "timestamp", "@timestamp", "time_iso8601", "time_local"];

/// JSON lines 매퍼
pub struct JsonMapper {
    time_fields: Vec<String>,
}

impl JsonMapper {
    /// 기본 타임스탬프 필드 목록으로 매퍼를 생성합니다.
    pub fn new() -> Self {
        Self {
            time_fields: DEFAULT_TIME_FIELDS.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    /// 타임스탬프 필드 목록을 지정합니다.
    pub fn with_time_fields(mut self, fields: Vec<String>) -> Self {
        self.time_fields = fields;
        self
    }

    fn extract_time(&self, object: &serde_json::Map<String, Value>) -> Option<DateTime<Utc>> {
        self.time_fields
            .iter()
            .filter_map(|field| object.get(field))
            .find_map(parse_time_value)
    }
}

impl Default for JsonMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordMapper for JsonMapper {
    fn format_name(&self) -> &str {
        "json"
    }

    fn columns(&self) -> &[Column] {
        COLUMNS
    }

    fn map(&self, line: &RawLine) -> Result<StructuredRecord, MapError> {
        let text = line_text(line);
        let value: Value = serde_json::from_str(&text).map_err(|e| MapError::InvalidField {
            field: "payload".to_owned(),
            reason: e.to_string(),
        })?;

        let Value::Object(object) = value else {
            return Err(MapError::NoMatch {
                format: self.format_name().to_owned(),
            });
        };

        let time = self.extract_time(&object);
        Ok(StructuredRecord {
            key: line.key(),
            values: vec![FieldValue::Timestamp(time), FieldValue::Json(Value::Object(object))],
        })
    }
}

fn parse_time_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| parse_nginx_time(s)),
        Value::Number(n) => {
            let secs = n.as_f64()?;
            if !secs.is_finite() {
                return None;
            }
            let whole = secs.trunc() as i64;
            let nanos = ((secs - secs.trunc()) * 1e9) as u32;
            DateTime::from_timestamp(whole, nanos)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::TimeZone;
    use logloader_core::types::FileIdentity;

    fn raw(text: &str) -> RawLine {
        RawLine {
            log_name: "app.log".to_owned(),
            identity: FileIdentity::new(1, 2),
            generation: 1,
            offset: 0,
            span: text.len() as u64 + 1,
            data: Bytes::copy_from_slice(text.as_bytes()),
        }
    }

    #[test]
    fn maps_object_with_rfc3339_time() {
        let mapper = JsonMapper::new();
        let record = mapper
            .map(&raw(r#"{"time":"2024-01-15T12:00:00Z","status":200}"#))
            .unwrap();

        assert_eq!(
            record.values[0],
            FieldValue::Timestamp(Some(Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()))
        );
        match &record.values[1] {
            FieldValue::Json(v) => assert_eq!(v["status"], 200),
            other => panic!("expected json payload, got {other:?}"),
        }
    }

    #[test]
    fn nginx_time_local_field_is_understood() {
        let mapper = JsonMapper::new();
        let record = mapper
            .map(&raw(r#"{"time_local":"10/Oct/2024:13:55:36 +0000"}"#))
            .unwrap();
        assert_eq!(
            record.values[0],
            FieldValue::Timestamp(Some(Utc.with_ymd_and_hms(2024, 10, 10, 13, 55, 36).unwrap()))
        );
    }

    #[test]
    fn epoch_seconds_are_understood() {
        let mapper = JsonMapper::new();
        let record = mapper.map(&raw(r#"{"timestamp":1700000000}"#)).unwrap();
        assert_eq!(
            record.values[0],
            FieldValue::Timestamp(DateTime::from_timestamp(1_700_000_000, 0))
        );
    }

    #[test]
    fn missing_time_is_null() {
        let mapper = JsonMapper::new();
        let record = mapper.map(&raw(r#"{"msg":"hi"}"#)).unwrap();
        assert_eq!(record.values[0], FieldValue::Timestamp(None));
    }

    #[test]
    fn custom_time_field() {
        let mapper = JsonMapper::new().with_time_fields(vec!["ts".to_owned()]);
        let record = mapper
            .map(&raw(r#"{"ts":"2024-01-15T12:00:00+09:00","time":"ignored"}"#))
            .unwrap();
        assert_eq!(
            record.values[0],
            FieldValue::Timestamp(Some(Utc.with_ymd_and_hms(2024, 1, 15, 3, 0, 0).unwrap()))
        );
    }

    #[test]
    fn rejects_invalid_json_and_non_objects() {
        let mapper = JsonMapper::new();
        assert!(matches!(
            mapper.map(&raw("{broken")).unwrap_err(),
            MapError::InvalidField { .. }
        ));
        assert!(matches!(
            mapper.map(&raw("[1,2,3]")).unwrap_err(),
            MapError::NoMatch { .. }
        ));
    }
}
