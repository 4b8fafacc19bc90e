//! 실행 컨트롤러 -- 한 번의 수집 실행과 트랜잭션 경계를 관리합니다.
//!
//! # 실행 단계
//! ```text
//! Discovering -> Reconciling -> Reading -> Mapping -> Writing -> Committing -> Done
//!                                    (어느 단계에서든) -> Failed
//! ```
//!
//! 커서는 싱크 쓰기가 성공한 뒤에만 전진합니다. 싱크가 실패하면
//! 어떤 커서도 커밋되지 않으며 다음 실행이 같은 바이트를 다시 읽습니다.
//! 싱크는 레코드 키로 중복을 제거하므로 결과적으로 at-least-once +
//! 멱등 쓰기가 됩니다.
//!
//! 커서는 이름으로 저장되지만 파일의 바이트는 식별자 기준으로 한 로그에만 속합니다.
//! 로테이션된 파일이 패턴에 매칭되는 새 이름을 가지면 이전 로그가 그 파일을
//! 비운 뒤 커서를 새 이름으로 넘기고, 새 이름으로 다시 처음부터 읽지 않습니다.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;

use logloader_core::config::LoaderConfig;
use logloader_core::error::{ConfigError, SinkError};
use logloader_core::metrics as m;
use logloader_core::pipeline::{RecordMapper, SinkWriter};
use logloader_core::types::{Cursor, LogTarget, StructuredRecord};

use crate::discovery;
use crate::error::IngestError;
use crate::lock::RunLock;
use crate::reader::{self, PartialTail, Segment};
use crate::reconcile::{self, Decision, ReadPlan};
use crate::state::{StateSnapshot, StateStore};

/// 실행 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// 대기 (실행 전)
    Idle,
    /// 대상 파일 탐색
    Discovering,
    /// 커서와 파일 상태 비교
    Reconciling,
    /// 세그먼트 읽기
    Reading,
    /// 라인 → 레코드 변환
    Mapping,
    /// 싱크 쓰기
    Writing,
    /// 커서 커밋
    Committing,
    /// 완료
    Done,
    /// 실패
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Discovering => "discovering",
            Self::Reconciling => "reconciling",
            Self::Reading => "reading",
            Self::Mapping => "mapping",
            Self::Writing => "writing",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 컨트롤러 실행 옵션
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// 대상 파일 패턴
    pub pattern: String,
    /// 대상 파일당 최대 읽기 바이트
    pub max_read_bytes: u64,
    /// 세그먼트 읽기 제한 시간
    pub read_timeout: Duration,
    /// 싱크 쓰기 제한 시간
    pub write_timeout: Duration,
    /// 상태 스냅샷 경로
    pub state_path: PathBuf,
    /// 실행 잠금 파일 경로
    pub lock_path: PathBuf,
}

impl ControllerOptions {
    /// 검증된 설정에서 옵션을 구성합니다.
    pub fn from_config(config: &LoaderConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            pattern: config.source.pattern()?.to_owned(),
            max_read_bytes: config.source.max_read_bytes,
            read_timeout: Duration::from_secs(config.source.read_timeout_secs),
            write_timeout: Duration::from_secs(config.sink.write_timeout_secs),
            state_path: config.state.path()?,
            lock_path: config.state.lock_path()?,
        })
    }
}

/// 대상 파일 하나의 처리 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    /// 논리 로그 이름
    pub log_name: String,
    /// 조정 결정
    pub decision: String,
    /// 커밋된 세대
    pub generation: u64,
    /// 커밋된 오프셋
    pub offset: u64,
    /// 읽은 라인 수
    pub lines_read: u64,
    /// 버린 라인 수
    pub lines_dropped: u64,
    /// 다음 실행으로 넘긴 불완전한 라인
    pub tail: Option<PartialTail>,
}

/// 이번 실행에서 건너뛴 대상 파일
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTarget {
    /// 논리 로그 이름
    pub log_name: String,
    /// 사유
    pub reason: String,
}

/// 실행 요약
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// 패턴에 매칭된 파일 수
    pub files_scanned: u64,
    /// 읽은 완전한 라인 수 (빈 라인 포함)
    pub lines_read: u64,
    /// 싱크로 전달한 레코드 수
    pub lines_written: u64,
    /// 파싱 실패로 버린 라인 수
    pub lines_dropped: u64,
    /// 건너뛴 빈 라인 수
    pub lines_blank: u64,
    /// 소비한 바이트 수
    pub bytes_read: u64,
    /// 감지한 로테이션 수
    pub rotations: u64,
    /// 감지한 truncate 수
    pub truncations: u64,
    /// 싱크에 새로 저장된 레코드 수
    pub inserted: u64,
    /// 싱크에 이미 있던 레코드 수
    pub duplicates: u64,
    /// 커밋된 대상 파일별 결과
    pub targets: Vec<TargetReport>,
    /// 건너뛴 대상 파일
    pub skipped: Vec<SkippedTarget>,
}

/// 한 번의 수집 실행을 조율하는 컨트롤러
///
/// # 사용 예시
/// ```ignore
/// use logloader_ingest::{ControllerOptions, RunController, mapper::build_mapper, sink::MemorySink};
///
/// let options = ControllerOptions::from_config(&config)?;
/// let mut controller = RunController::new(options, build_mapper("json")?, MemorySink::new());
/// let report = controller.execute().await?;
/// ```
pub struct RunController<S> {
    options: ControllerOptions,
    mapper: Box<dyn RecordMapper>,
    sink: S,
    phase: RunPhase,
}

impl<S: SinkWriter> RunController<S> {
    /// 새 컨트롤러를 생성합니다.
    pub fn new(options: ControllerOptions, mapper: Box<dyn RecordMapper>, sink: S) -> Self {
        Self {
            options,
            mapper,
            sink,
            phase: RunPhase::Idle,
        }
    }

    /// 현재 실행 단계
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// 싱크 참조
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// 잠금 → 스냅샷 로드 → 실행 → 스냅샷 저장 → 잠금 해제
    ///
    /// 스냅샷 저장은 중단 지점이 없는 마지막 동작입니다.
    pub async fn execute(&mut self) -> Result<RunReport, IngestError> {
        let lock = RunLock::acquire(&self.options.lock_path)?;
        let store = StateStore::new(&self.options.state_path);

        let snapshot = store.load().await?;
        let (next, report) = self.run(snapshot).await?;

        store.persist(&next)?;
        drop(lock);

        metrics::gauge!(m::LAST_SUCCESS_TIMESTAMP_SECONDS).set(Utc::now().timestamp() as f64);
        Ok(report)
    }

    /// 잠금 → 스냅샷 로드 → 실행. 스냅샷은 저장하지 않습니다.
    ///
    /// 인메모리 싱크와 함께 dry run 용도로 사용합니다.
    pub async fn preview(&mut self) -> Result<RunReport, IngestError> {
        let _lock = RunLock::acquire(&self.options.lock_path)?;
        let snapshot = StateStore::new(&self.options.state_path).load().await?;
        let (_, report) = self.run(snapshot).await?;
        Ok(report)
    }

    /// 스냅샷을 받아 한 번의 실행을 수행하고 다음 스냅샷을 반환합니다.
    ///
    /// 영속화는 하지 않습니다. 에러가 반환되면 입력 스냅샷은 버려지며
    /// 호출자가 가진 디스크 스냅샷은 그대로 유효합니다.
    pub async fn run(
        &mut self,
        snapshot: StateSnapshot,
    ) -> Result<(StateSnapshot, RunReport), IngestError> {
        let started = Instant::now();
        let result = self.run_phases(snapshot).await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        metrics::histogram!(m::RUN_DURATION_SECONDS, m::LABEL_RESULT => outcome)
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok((_, report)) => {
                self.record_metrics(report);
                tracing::info!(
                    files = report.files_scanned,
                    lines_read = report.lines_read,
                    lines_written = report.lines_written,
                    lines_dropped = report.lines_dropped,
                    skipped = report.skipped.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "run completed"
                );
            }
            Err(e) => {
                self.transition(RunPhase::Failed);
                tracing::error!(error = %e, "run failed, no cursor committed");
            }
        }
        result
    }

    async fn run_phases(
        &mut self,
        mut snapshot: StateSnapshot,
    ) -> Result<(StateSnapshot, RunReport), IngestError> {
        let mut report = RunReport::default();

        self.transition(RunPhase::Discovering);
        let targets = discovery::discover(&self.options.pattern).await?;
        report.files_scanned = targets.len() as u64;
        if targets.is_empty() {
            tracing::info!(pattern = %self.options.pattern, "no log files matched");
            self.transition(RunPhase::Done);
            return Ok((snapshot, report));
        }

        self.transition(RunPhase::Reconciling);
        let mut plans = Vec::with_capacity(targets.len());
        let mut renamed = Vec::new();
        for target in &targets {
            // 다른 이름의 커서가 소유한 파일은 그 로그의 처리가 끝난 뒤 결정
            if let Some(owner) = snapshot.owner_of(target.identity) {
                if owner != target.name {
                    renamed.push((target, owner.to_owned()));
                    continue;
                }
            }
            let cursor = snapshot.cursor(&target.name);
            match reconcile::reconcile(target, cursor, &targets, self.options.max_read_bytes).await
            {
                Ok(plan) => plans.push(plan),
                Err(e) => skip_or_fail(&mut report, target, e)?,
            }
        }

        // 이전 로그 이름 → 로테이션으로 바뀐 이름 (이전 로그가 이번에 비움)
        let mut handoffs = HashMap::new();
        // 새 이름 → 커서를 넘겨준 이전 로그 이름
        let mut takeovers = HashMap::new();
        for (target, owner) in renamed {
            if plans
                .iter()
                .any(|p: &ReadPlan| p.log_name == owner && p.drains(target.identity))
            {
                tracing::debug!(
                    log = %target.name,
                    owner = %owner,
                    "rotated file is drained by its previous log"
                );
                handoffs.insert(owner, target.name.clone());
                continue;
            }

            tracing::info!(
                log = %target.name,
                previous = %owner,
                "log file renamed, continuing from its committed offset"
            );
            let cursor = snapshot.cursor(&owner);
            match reconcile::reconcile(target, cursor, &targets, self.options.max_read_bytes).await
            {
                Ok(plan) => {
                    takeovers.insert(target.name.clone(), owner);
                    plans.push(plan);
                }
                Err(e) => skip_or_fail(&mut report, target, e)?,
            }
        }

        self.transition(RunPhase::Reading);
        let mut read = Vec::with_capacity(plans.len());
        for plan in plans {
            match self.read_plan(&plan).await {
                Ok(segments) => read.push((plan, segments)),
                Err(e) => {
                    let target = targets.iter().find(|t| t.name == plan.log_name);
                    match target {
                        Some(target) => skip_or_fail(&mut report, target, e)?,
                        None => return Err(e),
                    }
                }
            }
        }

        self.transition(RunPhase::Mapping);
        let mut batch = Vec::new();
        let mut commits = Vec::with_capacity(read.len());
        let mut released = Vec::new();
        for (plan, segments) in &read {
            let (target_report, cursor) = self.map_segments(plan, segments, &mut batch, &mut report);
            report.targets.push(target_report);
            if let Some(previous) = takeovers.get(&plan.log_name) {
                released.push(previous.clone());
            }
            if let Some(renamed) = handoffs.get(&plan.log_name) {
                if let Some(retired) = drained_cursor(plan, segments) {
                    commits.push((renamed.clone(), retired));
                }
            }
            commits.push((plan.log_name.clone(), cursor));
        }
        // 세그먼트 버퍼는 쓰기 전에 해제
        drop(read);

        self.transition(RunPhase::Writing);
        report.lines_written = batch.len() as u64;
        if batch.is_empty() {
            tracing::debug!("no new records, skipping sink write");
        } else {
            let outcome = self.write_batch(&batch).await?;
            report.inserted = outcome.inserted;
            report.duplicates = outcome.duplicates;
        }

        self.transition(RunPhase::Committing);
        // 이름이 바뀐 파일의 커서는 새 이름으로만 남김
        for name in released {
            snapshot.cursors.remove(&name);
        }
        for (name, cursor) in commits {
            tracing::debug!(
                log = %name,
                offset = cursor.offset,
                generation = cursor.generation,
                identity = %cursor.identity,
                "cursor committed"
            );
            snapshot.cursors.insert(name, cursor);
        }
        snapshot.updated_at = Utc::now();

        self.transition(RunPhase::Done);
        Ok((snapshot, report))
    }

    async fn read_plan(&self, plan: &ReadPlan) -> Result<Vec<Segment>, IngestError> {
        let mut segments = Vec::with_capacity(plan.segments.len());
        for segment in &plan.segments {
            segments.push(
                reader::read_segment(&plan.log_name, segment, self.options.read_timeout).await?,
            );
        }
        Ok(segments)
    }

    fn map_segments(
        &self,
        plan: &ReadPlan,
        segments: &[Segment],
        batch: &mut Vec<StructuredRecord>,
        report: &mut RunReport,
    ) -> (TargetReport, Cursor) {
        let mut lines_read = 0u64;
        let mut lines_dropped = 0u64;
        let mut consumed_end = plan.segments.last().map_or(0, |s| s.start);
        let mut tail = None;

        for segment in segments {
            for line in segment.lines() {
                lines_read += 1;
                if line.is_blank() {
                    report.lines_blank += 1;
                    continue;
                }
                match self.mapper.map(&line) {
                    Ok(record) => batch.push(record),
                    Err(e) => {
                        lines_dropped += 1;
                        tracing::debug!(
                            log = %plan.log_name,
                            offset = line.offset,
                            error = %e,
                            "dropping unparseable line"
                        );
                    }
                }
            }

            if segment.is_oversized() {
                lines_dropped += 1;
                tracing::warn!(
                    log = %plan.log_name,
                    offset = segment.start(),
                    bytes = segment.bytes_read(),
                    "line exceeds max_read_bytes, dropping it"
                );
            }

            report.bytes_read += segment.consumed_end() - segment.start();
            consumed_end = segment.consumed_end();
            tail = segment.tail();
        }

        match plan.decision {
            Decision::Rotated { .. } => report.rotations += 1,
            Decision::Truncated => report.truncations += 1,
            Decision::FirstSeen | Decision::Continue => {}
        }
        report.lines_read += lines_read;
        report.lines_dropped += lines_dropped;

        let cursor = plan.next_cursor(consumed_end);
        let target_report = TargetReport {
            log_name: plan.log_name.clone(),
            decision: plan.decision.to_string(),
            generation: cursor.generation,
            offset: cursor.offset,
            lines_read,
            lines_dropped,
            tail,
        };
        (target_report, cursor)
    }

    async fn write_batch(
        &self,
        batch: &[StructuredRecord],
    ) -> Result<logloader_core::pipeline::WriteOutcome, IngestError> {
        let secs = self.options.write_timeout.as_secs();
        let outcome = tokio::time::timeout(self.options.write_timeout, self.sink.write(batch))
            .await
            .map_err(|_| SinkError::Timeout { secs })??;

        tracing::info!(
            sink = self.sink.name(),
            records = batch.len(),
            inserted = outcome.inserted,
            duplicates = outcome.duplicates,
            "batch delivered"
        );
        Ok(outcome)
    }

    fn transition(&mut self, next: RunPhase) {
        tracing::debug!(from = %self.phase, to = %next, "run phase");
        self.phase = next;
    }

    fn record_metrics(&self, report: &RunReport) {
        let format = self.mapper.format_name().to_owned();
        metrics::counter!(m::FILES_SCANNED_TOTAL).increment(report.files_scanned);
        metrics::counter!(m::LINES_READ_TOTAL).increment(report.lines_read);
        metrics::counter!(m::LINES_WRITTEN_TOTAL).increment(report.lines_written);
        metrics::counter!(m::LINES_DROPPED_TOTAL, m::LABEL_FORMAT => format)
            .increment(report.lines_dropped);
        metrics::counter!(m::BYTES_READ_TOTAL).increment(report.bytes_read);
        metrics::counter!(m::ROTATIONS_TOTAL).increment(report.rotations);
        metrics::counter!(m::TRUNCATIONS_TOTAL).increment(report.truncations);
        metrics::counter!(m::TARGETS_FAILED_TOTAL).increment(report.skipped.len() as u64);
    }
}

/// 이전 파일을 끝까지 비운 계획에서, 그 파일의 새 이름에 남길 커서
///
/// 이후 실행에서 같은 파일을 처음 보는 로그로 다시 읽지 않게 합니다.
fn drained_cursor(plan: &ReadPlan, segments: &[Segment]) -> Option<Cursor> {
    if !plan.hands_off() {
        return None;
    }
    let (drain, segment) = (plan.segments.first()?, segments.first()?);
    Some(Cursor {
        identity: drain.identity,
        offset: segment.consumed_end(),
        generation: drain.generation,
    })
}

fn skip_or_fail(
    report: &mut RunReport,
    target: &LogTarget,
    err: IngestError,
) -> Result<(), IngestError> {
    if !err.is_target_local() {
        return Err(err);
    }
    tracing::warn!(log = %target.name, error = %err, "skipping log file for this run");
    report.skipped.push(SkippedTarget {
        log_name: target.name.clone(),
        reason: err.to_string(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use logloader_core::pipeline::WriteOutcome;
    use logloader_core::types::FileIdentity;

    use crate::mapper::build_mapper;
    use crate::sink::MemorySink;

    /// 응답하지 않는 싱크
    struct StalledSink;

    impl SinkWriter for StalledSink {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn write(&self, _batch: &[StructuredRecord]) -> Result<WriteOutcome, SinkError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(WriteOutcome::default())
        }
    }

    fn options(dir: &std::path::Path) -> ControllerOptions {
        ControllerOptions {
            pattern: format!("{}/*.log", dir.display()),
            max_read_bytes: 1024 * 1024,
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            state_path: dir.join("state/state.json"),
            lock_path: dir.join("state/state.json.lock"),
        }
    }

    fn controller(dir: &std::path::Path) -> RunController<MemorySink> {
        RunController::new(
            options(dir),
            build_mapper("json").unwrap(),
            MemorySink::new(),
        )
    }

    #[tokio::test]
    async fn empty_directory_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller(dir.path());

        let (snapshot, report) = controller.run(StateSnapshot::empty()).await.unwrap();
        assert_eq!(report.files_scanned, 0);
        assert!(snapshot.cursors.is_empty());
        assert_eq!(controller.phase(), RunPhase::Done);
        assert_eq!(controller.sink().write_calls(), 0);
    }

    #[tokio::test]
    async fn first_run_commits_cursor_after_last_newline() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app.log");
        std::fs::write(&log, b"{\"a\":1}\n{\"a\":2}\n{\"a\":").unwrap();
        let mut controller = controller(dir.path());

        let (snapshot, report) = controller.run(StateSnapshot::empty()).await.unwrap();
        let cursor = snapshot.cursors[&log.display().to_string()];
        assert_eq!(cursor.offset, 16);
        assert_eq!(cursor.generation, 0);
        assert_eq!(report.lines_read, 2);
        assert_eq!(report.lines_written, 2);
        assert_eq!(report.targets[0].tail, Some(PartialTail { offset: 16, len: 5 }));
        assert_eq!(controller.sink().len().await, 2);
    }

    #[tokio::test]
    async fn blank_and_malformed_lines_advance_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app.log");
        std::fs::write(&log, b"\n   \nnot json\n{\"ok\":true}\n").unwrap();
        let mut controller = controller(dir.path());

        let (snapshot, report) = controller.run(StateSnapshot::empty()).await.unwrap();
        assert_eq!(report.lines_blank, 2);
        assert_eq!(report.lines_dropped, 1);
        assert_eq!(report.lines_written, 1);
        assert_eq!(
            snapshot.cursors[&log.display().to_string()].offset,
            std::fs::metadata(&log).unwrap().len()
        );
    }

    #[tokio::test]
    async fn sink_failure_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.log"), b"{\"a\":1}\n").unwrap();
        let mut controller = controller(dir.path());
        controller.sink().fail_next_writes(1);

        let err = controller.run(StateSnapshot::empty()).await.unwrap_err();
        assert!(matches!(err, IngestError::Sink(_)));
        assert_eq!(controller.phase(), RunPhase::Failed);
    }

    #[tokio::test]
    async fn undiscovered_cursors_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.log"), b"{\"a\":1}\n").unwrap();
        let mut snapshot = StateSnapshot::empty();
        let gone = Cursor {
            identity: logloader_core::types::FileIdentity::new(9, 9),
            offset: 77,
            generation: 4,
        };
        snapshot.cursors.insert("/old/rotated-away.log".to_owned(), gone);

        let mut controller = controller(dir.path());
        let (next, _) = controller.run(snapshot).await.unwrap();
        assert_eq!(next.cursors["/old/rotated-away.log"], gone);
        assert_eq!(next.cursors.len(), 2);
    }

    #[tokio::test]
    async fn execute_persists_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.log"), b"{\"a\":1}\n").unwrap();
        let mut controller = controller(dir.path());

        let report = controller.execute().await.unwrap();
        assert_eq!(report.lines_written, 1);

        let stored = StateStore::new(dir.path().join("state/state.json"))
            .load()
            .await
            .unwrap();
        assert_eq!(stored.cursors.len(), 1);
    }

    #[tokio::test]
    async fn preview_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.log"), b"{\"a\":1}\n{\"a\":2}\n").unwrap();
        let mut controller = controller(dir.path());

        let report = controller.preview().await.unwrap();
        assert_eq!(report.lines_written, 2);
        assert!(!dir.path().join("state/state.json").exists());

        // 상태가 저장되지 않았으므로 같은 라인을 다시 읽음
        let report = controller.preview().await.unwrap();
        assert_eq!(report.lines_read, 2);
        assert_eq!(report.duplicates, 2);
    }

    #[test]
    fn phase_display() {
        assert_eq!(RunPhase::Committing.to_string(), "committing");
        assert_eq!(RunPhase::Failed.to_string(), "failed");
    }

    #[tokio::test]
    async fn sink_timeout_fails_run_and_keeps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app.log");
        std::fs::write(&log, b"{\"a\":1}\n").unwrap();
        controller(dir.path()).execute().await.unwrap();

        let store = StateStore::new(dir.path().join("state/state.json"));
        let before = store.load().await.unwrap();

        let mut file = std::fs::OpenOptions::new().append(true).open(&log).unwrap();
        file.write_all(b"{\"a\":2}\n").unwrap();

        let mut options = options(dir.path());
        options.write_timeout = Duration::from_millis(100);
        let mut stalled = RunController::new(options, build_mapper("json").unwrap(), StalledSink);

        let err = stalled.execute().await.unwrap_err();
        assert!(matches!(err, IngestError::Sink(SinkError::Timeout { .. })));
        assert_eq!(stalled.phase(), RunPhase::Failed);
        assert_eq!(store.load().await.unwrap(), before);
    }

    #[test]
    fn read_timeout_skips_only_that_target() {
        let mut report = RunReport::default();
        let target = LogTarget {
            name: "/var/log/slow.log".to_owned(),
            path: PathBuf::from("/var/log/slow.log"),
            identity: FileIdentity::new(8, 1),
            size: 10,
        };

        let err = IngestError::ReadTimeout {
            path: "/var/log/slow.log".to_owned(),
            secs: 30,
        };
        skip_or_fail(&mut report, &target, err).unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].log_name, "/var/log/slow.log");
        assert!(report.skipped[0].reason.contains("timed out"));

        let err = IngestError::from(SinkError::Timeout { secs: 30 });
        assert!(skip_or_fail(&mut report, &target, err).is_err());
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn drained_cursor_only_for_hand_off() {
        let old = FileIdentity::new(1, 1);
        let new = FileIdentity::new(1, 2);
        let segment = |identity, generation, start, end| reconcile::ReadSegment {
            path: PathBuf::from("/tmp/a.log"),
            identity,
            generation,
            start,
            end,
            file_size: end,
            is_final: identity == old,
        };
        let mut plan = ReadPlan {
            log_name: "/tmp/a.log".to_owned(),
            decision: Decision::Rotated { draining: true },
            segments: vec![segment(old, 0, 40, 60), segment(new, 1, 0, 20)],
            identity: new,
            generation: 1,
        };
        let read: Vec<Segment> = plan
            .segments
            .iter()
            .map(|s| {
                let data = bytes::Bytes::from(vec![b'x'; s.len() as usize]);
                Segment::from_parts("/tmp/a.log", s, data)
            })
            .collect();

        let retired = drained_cursor(&plan, &read).unwrap();
        assert_eq!(
            retired,
            Cursor {
                identity: old,
                offset: 60,
                generation: 0,
            }
        );

        plan.segments.truncate(1);
        plan.identity = old;
        plan.generation = 0;
        assert!(drained_cursor(&plan, &read[..1]).is_none());
    }
}
