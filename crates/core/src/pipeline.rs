//! 파이프라인 trait — 외부 협력자 확장 포인트 정의
//!
//! 수집 엔진은 라인 형식과 저장소를 알지 못합니다.
//! 새 로그 형식은 [`RecordMapper`]를, 새 저장소는 [`SinkWriter`]를 구현합니다.

use std::future::Future;

use crate::error::{MapError, SinkError};
use crate::types::{Column, RawLine, StructuredRecord};

/// 원시 라인을 구조화 레코드로 변환하는 trait
///
/// 구현은 순수 함수여야 합니다. 같은 바이트는 항상 같은 레코드를 만들어야
/// 재전송 시 싱크의 중복 제거가 동작합니다.
pub trait RecordMapper: Send + Sync {
    /// 지원하는 로그 형식 이름
    fn format_name(&self) -> &str;

    /// 출력 컬럼 정의 (레코드 값 순서와 동일)
    fn columns(&self) -> &[Column];

    /// 원시 라인을 레코드로 변환
    fn map(&self, line: &RawLine) -> Result<StructuredRecord, MapError>;
}

/// 배치 쓰기 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    /// 새로 저장된 레코드 수
    pub inserted: u64,
    /// 이미 존재하여 무시된 레코드 수
    pub duplicates: u64,
}

/// 구조화 레코드 배치를 저장하는 trait
///
/// 겹치는 배치로 여러 번 호출되어도 논리적 중복 행이 생기지 않아야 합니다
/// ([`RecordKey::fingerprint`](crate::types::RecordKey::fingerprint) 기준 upsert).
pub trait SinkWriter: Send + Sync {
    /// 싱크 이름
    fn name(&self) -> &str;

    /// 배치 전체를 하나의 논리 연산으로 저장
    fn write(
        &self,
        batch: &[StructuredRecord],
    ) -> impl Future<Output = Result<WriteOutcome, SinkError>> + Send;
}
