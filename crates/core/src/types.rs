//! 도메인 타입 — 파일 식별자, 커서, 원시 라인, 구조화 레코드

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 물리 파일 식별자 (device + inode)
///
/// append만 일어나는 동안에는 변하지 않고,
/// 같은 경로의 파일이 교체되면(rename 후 재생성) 반드시 달라집니다.
/// Unix가 아닌 플랫폼에서는 항상 0이므로 크기 기반 truncate 감지만 동작합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileIdentity {
    /// 장치 ID
    pub device: u64,
    /// inode 번호
    pub inode: u64,
}

impl FileIdentity {
    /// 새 식별자를 생성합니다.
    pub fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }

    /// 실제 파일을 구분할 수 있는 식별자인지 확인합니다 (Unix가 아니면 항상 false).
    pub fn is_known(&self) -> bool {
        self.device != 0 || self.inode != 0
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.inode)
    }
}

/// 패턴에 매칭된 로그 파일
///
/// 매 실행마다 다시 계산되는 일회성 값입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    /// 논리 로그 이름 (커서 키)
    pub name: String,
    /// 현재 경로
    pub path: PathBuf,
    /// 관측 시점의 식별자
    pub identity: FileIdentity,
    /// 관측 시점의 크기 (바이트)
    pub size: u64,
}

/// 논리 로그 하나의 수집 진행 상태
///
/// 물리 경로가 아니라 논리 로그 이름에 귀속됩니다.
/// 불변식: `offset`은 마지막 관측 시점의 해당 식별자 파일 크기 이하입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// 마지막으로 본 파일 식별자
    pub identity: FileIdentity,
    /// 커밋된 읽기 위치 (바이트 오프셋)
    pub offset: u64,
    /// 로테이션/truncate 감지 시마다 증가하는 세대 번호
    pub generation: u64,
}

impl Cursor {
    /// 처음 만난 로그의 커서를 생성합니다.
    pub fn first(identity: FileIdentity) -> Self {
        Self {
            identity,
            offset: 0,
            generation: 0,
        }
    }
}

/// 세그먼트 리더가 생성하는 원시 라인
///
/// `data`에는 줄바꿈 문자(`\n`, 선행 `\r` 포함)가 포함되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 논리 로그 이름
    pub log_name: String,
    /// 라인이 속한 파일 식별자
    pub identity: FileIdentity,
    /// 라인이 속한 세대
    pub generation: u64,
    /// 라인 시작 오프셋
    pub offset: u64,
    /// 라인이 차지한 바이트 수 (구분자 포함)
    pub span: u64,
    /// 라인 내용
    pub data: Bytes,
}

impl RawLine {
    /// 라인 다음 바이트의 오프셋을 반환합니다.
    pub fn end_offset(&self) -> u64 {
        self.offset + self.span
    }

    /// 이 라인의 중복 제거 키를 반환합니다.
    pub fn key(&self) -> RecordKey {
        RecordKey {
            log_name: self.log_name.clone(),
            identity: self.identity,
            generation: self.generation,
            offset: self.offset,
        }
    }

    /// 공백 문자만 있는 라인인지 확인합니다.
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|b| b.is_ascii_whitespace())
    }
}

/// 싱크 중복 제거 키
///
/// 같은 바이트를 다시 읽으면 항상 같은 키가 나오므로
/// 싱크는 이 키로 upsert하여 재전송을 흡수합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// 논리 로그 이름
    pub log_name: String,
    /// 파일 식별자
    pub identity: FileIdentity,
    /// 세대 번호
    pub generation: u64,
    /// 라인 시작 오프셋
    pub offset: u64,
}

impl RecordKey {
    /// 키의 SHA-256 지문(소문자 hex)을 반환합니다.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.log_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.identity.device.to_be_bytes());
        hasher.update(self.identity.inode.to_be_bytes());
        hasher.update(self.generation.to_be_bytes());
        hasher.update(self.offset.to_be_bytes());
        hex::encode(hasher.finalize())
    }
}

/// 컬럼 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// 문자열
    Text,
    /// 32비트 정수
    Int,
    /// 64비트 정수
    BigInt,
    /// 부동소수점
    Float,
    /// 타임존 포함 타임스탬프
    Timestamp,
    /// JSON 문서
    Json,
}

/// 매퍼가 선언하는 출력 컬럼
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// 컬럼 이름
    pub name: &'static str,
    /// 컬럼 타입
    pub kind: ColumnType,
}

impl Column {
    /// 새 컬럼 정의를 생성합니다.
    pub const fn new(name: &'static str, kind: ColumnType) -> Self {
        Self { name, kind }
    }
}

/// 구조화 레코드의 필드 값
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldValue {
    Text(Option<String>),
    Int(Option<i64>),
    Float(Option<f64>),
    Timestamp(Option<DateTime<Utc>>),
    Json(serde_json::Value),
}

impl FieldValue {
    /// 값이 NULL인지 확인합니다.
    pub fn is_null(&self) -> bool {
        match self {
            Self::Text(v) => v.is_none(),
            Self::Int(v) => v.is_none(),
            Self::Float(v) => v.is_none(),
            Self::Timestamp(v) => v.is_none(),
            Self::Json(v) => v.is_null(),
        }
    }
}

/// 레코드 매퍼의 출력
///
/// `values`는 매퍼의 `columns()` 순서와 1:1로 대응합니다.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRecord {
    /// 중복 제거 키
    pub key: RecordKey,
    /// 컬럼 순서대로 정렬된 값
    pub values: Vec<FieldValue>,
}
