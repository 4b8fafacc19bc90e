//! 인메모리 싱크
//!
//! 레코드 키 지문으로 중복을 제거하며 메모리에 저장합니다.
//! 통합 테스트와 다른 프로그램에 임베드한 dry run 용도로 사용합니다.
//! [`MemorySink::fail_next_writes`]로 쓰기 실패를 주입할 수 있습니다.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;

use logloader_core::error::SinkError;
use logloader_core::pipeline::{SinkWriter, WriteOutcome};
use logloader_core::types::{RecordKey, StructuredRecord};

/// 인메모리 싱크
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<BTreeMap<String, StructuredRecord>>,
    // 중복 포함, 도착 순서
    arrivals: Mutex<Vec<RecordKey>>,
    writes: AtomicUsize,
    failures_pending: AtomicUsize,
}

impl MemorySink {
    /// 빈 싱크를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 다음 `count`번의 쓰기를 실패시킵니다.
    pub fn fail_next_writes(&self, count: usize) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    /// 저장된 레코드 수
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// 저장된 레코드가 없는지 확인합니다.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// 저장된 레코드 (오프셋 순서)
    pub async fn records(&self) -> Vec<StructuredRecord> {
        let mut records: Vec<_> = self.records.lock().await.values().cloned().collect();
        records.sort_by(|a, b| {
            (&a.key.log_name, a.key.generation, a.key.offset).cmp(&(
                &b.key.log_name,
                b.key.generation,
                b.key.offset,
            ))
        });
        records
    }

    /// 성공한 쓰기로 도착한 모든 키 (중복 포함, 도착 순서)
    pub async fn arrivals(&self) -> Vec<RecordKey> {
        self.arrivals.lock().await.clone()
    }

    /// 성공/실패를 포함한 `write` 호출 횟수
    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl SinkWriter for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write(&self, batch: &[StructuredRecord]) -> Result<WriteOutcome, SinkError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(SinkError::Write("injected failure".to_owned()));
        }

        let mut records = self.records.lock().await;
        let mut arrivals = self.arrivals.lock().await;
        let mut outcome = WriteOutcome::default();
        for record in batch {
            arrivals.push(record.key.clone());
            let id = record.key.fingerprint();
            if records.contains_key(&id) {
                outcome.duplicates += 1;
            } else {
                records.insert(id, record.clone());
                outcome.inserted += 1;
            }
        }
        Ok(outcome)
    }
}
