//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 수집 엔진은 이 상수로 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logloader_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)

use metrics::{describe_counter, describe_gauge, describe_histogram};

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 로그 형식 레이블 키
pub const LABEL_FORMAT: &str = "format";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── 수집 메트릭 ────────────────────────────────────────────────────

/// 스캔한 대상 파일 수 (counter)
pub const FILES_SCANNED_TOTAL: &str = "logloader_files_scanned_total";

/// 읽은 라인 수 (counter)
pub const LINES_READ_TOTAL: &str = "logloader_lines_read_total";

/// 싱크로 전달한 라인 수 (counter)
pub const LINES_WRITTEN_TOTAL: &str = "logloader_lines_written_total";

/// 파싱 실패로 버린 라인 수 (counter, label: format)
pub const LINES_DROPPED_TOTAL: &str = "logloader_lines_dropped_total";

/// 읽은 바이트 수 (counter)
pub const BYTES_READ_TOTAL: &str = "logloader_bytes_read_total";

/// 감지한 로테이션 수 (counter)
pub const ROTATIONS_TOTAL: &str = "logloader_rotations_total";

/// 감지한 truncate 수 (counter)
pub const TRUNCATIONS_TOTAL: &str = "logloader_truncations_total";

/// 이번 실행에서 건너뛴 대상 파일 수 (counter)
pub const TARGETS_FAILED_TOTAL: &str = "logloader_targets_failed_total";

/// 실행 소요 시간 (histogram, label: result)
pub const RUN_DURATION_SECONDS: &str = "logloader_run_duration_seconds";

/// 마지막 성공 실행 시각 (gauge, unix 초)
pub const LAST_SUCCESS_TIMESTAMP_SECONDS: &str = "logloader_last_success_timestamp_seconds";

/// 모든 메트릭 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    describe_counter!(FILES_SCANNED_TOTAL, "Log files matched by the source pattern");
    describe_counter!(LINES_READ_TOTAL, "Complete lines read from log files");
    describe_counter!(LINES_WRITTEN_TOTAL, "Records handed to the sink");
    describe_counter!(LINES_DROPPED_TOTAL, "Lines dropped because they failed to parse");
    describe_counter!(BYTES_READ_TOTAL, "Bytes consumed from log files");
    describe_counter!(ROTATIONS_TOTAL, "Detected log rotations");
    describe_counter!(TRUNCATIONS_TOTAL, "Detected truncate-in-place events");
    describe_counter!(TARGETS_FAILED_TOTAL, "Log files skipped because of I/O errors");
    describe_histogram!(RUN_DURATION_SECONDS, "Duration of one ingestion run");
    describe_gauge!(
        LAST_SUCCESS_TIMESTAMP_SECONDS,
        "Unix time of the last successful run"
    );
}
