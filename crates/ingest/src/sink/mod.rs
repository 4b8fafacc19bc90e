//! 싱크 -- 구조화 레코드 저장소
//!
//! 각 싱크는 core의 [`SinkWriter`](logloader_core::pipeline::SinkWriter) trait을 구현합니다.
//! 모든 싱크는 [`RecordKey::fingerprint`](logloader_core::types::RecordKey::fingerprint)로
//! 중복을 제거하므로 같은 배치를 여러 번 보내도 안전합니다.

pub mod memory;
pub mod postgres;

pub use memory::MemorySink;
pub use postgres::PostgresSink;
