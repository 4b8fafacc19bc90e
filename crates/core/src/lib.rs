//! logloader 공통 크레이트
//!
//! 수집 엔진(`logloader-ingest`)과 CLI가 공유하는 타입, 에러, 설정, 확장 trait을 정의합니다.
//!
//! # 모듈 구성
//!
//! - [`config`]: `logloader.toml` + 환경변수 설정
//! - [`error`]: 도메인 에러 타입
//! - [`metrics`]: 메트릭 이름 상수
//! - [`pipeline`]: 레코드 매퍼/싱크 trait
//! - [`types`]: 파일 식별자, 커서, 원시 라인, 구조화 레코드

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, LoaderError, LockError, MapError, SinkError, StateError};

// 설정
pub use config::LoaderConfig;

// 파이프라인 trait
pub use pipeline::{RecordMapper, SinkWriter, WriteOutcome};

// 도메인 타입
pub use types::{
    Column, ColumnType, Cursor, FieldValue, FileIdentity, LogTarget, RawLine, RecordKey,
    StructuredRecord,
};
