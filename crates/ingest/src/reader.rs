//! 세그먼트 리더
//!
//! 조정기가 계획한 `[start, end)` 범위만 읽고 완전한 라인으로 분할합니다.
//!
//! - 마지막 `\n` 이후의 바이트(불완전한 라인)는 소비하지 않으며
//!   다음 실행에서 다시 읽습니다.
//! - 로테이션된 파일의 마지막 읽기(`is_final`)에서는 불완전한 라인도 내보냅니다.
//! - 읽기 한도에 걸린 구간에 `\n`이 하나도 없으면 과대 라인으로 보고
//!   구간 전체를 소비합니다. 그렇지 않으면 진행이 영원히 막힙니다.

use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use logloader_core::types::{FileIdentity, RawLine};

use crate::error::IngestError;
use crate::identity;
use crate::reconcile::ReadSegment;

/// 소비하지 않고 남긴 불완전한 라인
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartialTail {
    /// 시작 오프셋
    pub offset: u64,
    /// 길이 (바이트)
    pub len: u64,
}

/// 읽어 들인 바이트 구간
#[derive(Debug, Clone)]
pub struct Segment {
    log_name: String,
    identity: FileIdentity,
    generation: u64,
    start: u64,
    data: Bytes,
    is_final: bool,
    bounded: bool,
}

impl Segment {
    /// 계획과 읽은 바이트로 세그먼트를 구성합니다.
    pub fn from_parts(log_name: &str, plan: &ReadSegment, data: Bytes) -> Self {
        let bounded = plan.start + (data.len() as u64) < plan.file_size;
        Self {
            log_name: log_name.to_owned(),
            identity: plan.identity,
            generation: plan.generation,
            start: plan.start,
            data,
            is_final: plan.is_final,
            bounded,
        }
    }

    /// 시작 오프셋
    pub fn start(&self) -> u64 {
        self.start
    }

    /// 읽은 바이트 수
    pub fn bytes_read(&self) -> u64 {
        self.data.len() as u64
    }

    /// 완전한 라인을 순서대로 내보내는 반복자
    pub fn lines(&self) -> Lines<'_> {
        Lines {
            segment: self,
            pos: 0,
            limit: if self.is_oversized() {
                0
            } else {
                self.line_bytes()
            },
        }
    }

    /// 읽기 한도 구간 전체가 하나의 라인 일부인지 여부
    ///
    /// 이 경우 구간 전체를 소비하고 라인 하나를 버린 것으로 집계합니다.
    pub fn is_oversized(&self) -> bool {
        self.bounded && !self.data.is_empty() && !self.data.contains(&b'\n')
    }

    /// 커밋 가능한 다음 오프셋
    pub fn consumed_end(&self) -> u64 {
        if self.is_oversized() {
            return self.start + self.bytes_read();
        }
        self.start + self.line_bytes() as u64
    }

    /// 소비하지 않은 불완전한 라인
    pub fn tail(&self) -> Option<PartialTail> {
        let end = self.start + self.bytes_read();
        let consumed = self.consumed_end();
        (consumed < end).then(|| PartialTail {
            offset: consumed,
            len: end - consumed,
        })
    }

    // 라인으로 소비할 바이트 수
    fn line_bytes(&self) -> usize {
        if self.is_final {
            return self.data.len();
        }
        self.data
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |idx| idx + 1)
    }
}

/// [`Segment::lines`] 반복자
pub struct Lines<'a> {
    segment: &'a Segment,
    pos: usize,
    limit: usize,
}

impl Iterator for Lines<'_> {
    type Item = RawLine;

    fn next(&mut self) -> Option<RawLine> {
        if self.pos >= self.limit {
            return None;
        }

        let rest = &self.segment.data[self.pos..self.limit];
        let (content_len, span) = match rest.iter().position(|&b| b == b'\n') {
            Some(idx) => (idx, idx + 1),
            // is_final 세그먼트의 마지막 조각
            None => (rest.len(), rest.len()),
        };

        let mut content_end = self.pos + content_len;
        if content_end > self.pos && self.segment.data[content_end - 1] == b'\r' {
            content_end -= 1;
        }

        let line = RawLine {
            log_name: self.segment.log_name.clone(),
            identity: self.segment.identity,
            generation: self.segment.generation,
            offset: self.segment.start + self.pos as u64,
            span: span as u64,
            data: self.segment.data.slice(self.pos..content_end),
        };
        self.pos += span;
        Some(line)
    }
}

/// 계획된 범위를 읽습니다.
///
/// 파일을 연 뒤 식별자를 다시 확인하여 계획 이후 교체된 파일은 읽지 않습니다.
/// 전체 읽기는 `timeout` 안에 끝나야 합니다.
pub async fn read_segment(
    log_name: &str,
    plan: &ReadSegment,
    timeout: Duration,
) -> Result<Segment, IngestError> {
    if plan.is_empty() {
        return Ok(Segment::from_parts(log_name, plan, Bytes::new()));
    }

    let data = tokio::time::timeout(timeout, read_range(plan))
        .await
        .map_err(|_| IngestError::ReadTimeout {
            path: plan.path.display().to_string(),
            secs: timeout.as_secs(),
        })??;

    tracing::trace!(
        log = log_name,
        path = %plan.path.display(),
        start = plan.start,
        bytes = data.len(),
        "segment read"
    );
    Ok(Segment::from_parts(log_name, plan, data))
}

async fn read_range(plan: &ReadSegment) -> Result<Bytes, IngestError> {
    let path = plan.path.display().to_string();
    let read_error = |source: std::io::Error| IngestError::Read {
        path: path.clone(),
        source,
    };

    let mut file = tokio::fs::File::open(&plan.path).await.map_err(read_error)?;

    let stat = identity::stat_open(&file)
        .await
        .map_err(|source| IngestError::Identity {
            path: path.clone(),
            source,
        })?;
    if stat.identity != plan.identity {
        return Err(IngestError::IdentityChanged {
            path: path.clone(),
            expected: plan.identity,
            found: stat.identity,
        });
    }

    file.seek(std::io::SeekFrom::Start(plan.start))
        .await
        .map_err(read_error)?;

    // 계획 이후 파일이 줄어든 경우 짧게 읽힘
    let len = plan.len();
    let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
    file.take(len).read_to_end(&mut buf).await.map_err(read_error)?;
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn plan(start: u64, end: u64, file_size: u64, is_final: bool) -> ReadSegment {
        ReadSegment {
            path: PathBuf::from("/tmp/a.log"),
            identity: FileIdentity::new(1, 2),
            generation: 0,
            start,
            end,
            file_size,
            is_final,
        }
    }

    fn segment(data: &'static [u8], start: u64, file_size: u64, is_final: bool) -> Segment {
        let end = start + data.len() as u64;
        Segment::from_parts(
            "a",
            &plan(start, end, file_size, is_final),
            Bytes::from_static(data),
        )
    }

    fn texts(seg: &Segment) -> Vec<String> {
        seg.lines()
            .map(|l| String::from_utf8(l.data.to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn splits_complete_lines_and_keeps_tail() {
        let seg = segment(b"one\ntwo\nthr", 0, 11, false);
        assert_eq!(texts(&seg), vec!["one", "two"]);
        assert_eq!(seg.consumed_end(), 8);
        assert_eq!(seg.tail(), Some(PartialTail { offset: 8, len: 3 }));
    }

    #[test]
    fn offsets_are_absolute() {
        let seg = segment(b"ab\ncd\n", 100, 106, false);
        let lines: Vec<_> = seg.lines().collect();
        assert_eq!(lines[0].offset, 100);
        assert_eq!(lines[0].end_offset(), 103);
        assert_eq!(lines[1].offset, 103);
        assert_eq!(seg.consumed_end(), 106);
        assert!(seg.tail().is_none());
    }

    #[test]
    fn strips_carriage_return() {
        let seg = segment(b"one\r\ntwo\n", 0, 9, false);
        assert_eq!(texts(&seg), vec!["one", "two"]);
        assert_eq!(seg.lines().next().unwrap().span, 5);
    }

    #[test]
    fn no_newline_yields_nothing() {
        let seg = segment(b"partial", 0, 7, false);
        assert_eq!(seg.lines().count(), 0);
        assert_eq!(seg.consumed_end(), 0);
        assert_eq!(seg.tail(), Some(PartialTail { offset: 0, len: 7 }));
    }

    #[test]
    fn final_segment_flushes_tail() {
        let seg = segment(b"one\nlast", 10, 18, true);
        assert_eq!(texts(&seg), vec!["one", "last"]);
        assert_eq!(seg.consumed_end(), 18);
        assert!(seg.tail().is_none());
    }

    #[test]
    fn oversized_bounded_window_is_consumed() {
        let seg = segment(b"aaaaaaaa", 0, 1000, false);
        assert!(seg.is_oversized());
        assert_eq!(seg.lines().count(), 0);
        assert_eq!(seg.consumed_end(), 8);
    }

    #[test]
    fn bounded_window_with_newline_is_not_oversized() {
        let seg = segment(b"aa\nbbbb", 0, 1000, false);
        assert!(!seg.is_oversized());
        assert_eq!(seg.consumed_end(), 3);
    }

    #[test]
    fn empty_lines_are_yielded() {
        let seg = segment(b"\n\nx\n", 0, 4, false);
        let lines: Vec<_> = seg.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].is_blank());
        assert_eq!(lines[2].offset, 2);
    }

    #[tokio::test]
    async fn read_segment_reads_exact_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, b"skip\nkeep\nmore\n").unwrap();
        let stat = identity::resolve(&path).await.unwrap().unwrap();

        let plan = ReadSegment {
            path: path.clone(),
            identity: stat.identity,
            generation: 1,
            start: 5,
            end: 10,
            file_size: stat.size,
            is_final: false,
        };
        let seg = read_segment("a", &plan, Duration::from_secs(5))
            .await
            .unwrap();
        let lines: Vec<_> = seg.lines().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(&lines[0].data[..], b"keep");
        assert_eq!(lines[0].offset, 5);
        assert_eq!(lines[0].generation, 1);
        assert_eq!(seg.consumed_end(), 10);
    }

    #[tokio::test]
    async fn read_segment_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, b"x\ny\n").unwrap();
        let stat = identity::resolve(&path).await.unwrap().unwrap();
        let plan = ReadSegment {
            path,
            identity: stat.identity,
            generation: 0,
            start: 0,
            end: stat.size,
            file_size: stat.size,
            is_final: false,
        };

        let a = read_segment("a", &plan, Duration::from_secs(5)).await.unwrap();
        let b = read_segment("a", &plan, Duration::from_secs(5)).await.unwrap();
        assert_eq!(a.lines().collect::<Vec<_>>(), b.lines().collect::<Vec<_>>());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn read_segment_detects_replaced_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, b"old\n").unwrap();
        let stat = identity::resolve(&path).await.unwrap().unwrap();

        std::fs::rename(&path, dir.path().join("a.log.1")).unwrap();
        std::fs::write(&path, b"new\n").unwrap();

        let plan = ReadSegment {
            path,
            identity: stat.identity,
            generation: 0,
            start: 0,
            end: 4,
            file_size: 4,
            is_final: false,
        };
        let err = read_segment("a", &plan, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::IdentityChanged { .. }));
        assert!(err.is_target_local());
    }

    #[tokio::test]
    async fn empty_plan_does_not_touch_file() {
        let plan = plan(10, 10, 10, false);
        let seg = read_segment("a", &plan, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(seg.bytes_read(), 0);
        assert_eq!(seg.consumed_end(), 10);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stalled_read_times_out() {
        use std::os::unix::ffi::OsStrExt;
        use std::os::unix::fs::OpenOptionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("stalled.log");
        let c_path = std::ffi::CString::new(fifo.as_os_str().as_bytes()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);

        // 쓰는 쪽이 없는 FIFO는 open에서 멈춤
        let mut stalled = plan(0, 10, 10, false);
        stalled.path = fifo.clone();
        let err = read_segment("stalled", &stalled, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::ReadTimeout { .. }));
        assert!(err.is_target_local());

        // 멈춘 open을 풀어 런타임이 종료될 수 있게 함
        let _ = std::fs::OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&fifo);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn appends_in_any_split_yield_each_line_once(
                lines in prop::collection::vec("[a-z ]{0,20}", 1..30),
                cuts in prop::collection::vec(0usize..600, 0..8),
            ) {
                let mut file = Vec::new();
                let mut expected = Vec::new();
                for line in &lines {
                    expected.push((file.len() as u64, line.clone()));
                    file.extend_from_slice(line.as_bytes());
                    file.push(b'\n');
                }

                // 파일이 여러 번에 걸쳐 자라는 상황
                let mut sizes: Vec<usize> = cuts.iter().map(|c| c % (file.len() + 1)).collect();
                sizes.push(file.len());
                sizes.sort_unstable();

                let mut cursor = 0u64;
                let mut seen = Vec::new();
                for size in sizes {
                    let size = size as u64;
                    if size <= cursor {
                        continue;
                    }
                    let data = Bytes::copy_from_slice(&file[cursor as usize..size as usize]);
                    let seg = Segment::from_parts("a", &plan(cursor, size, size, false), data);
                    for line in seg.lines() {
                        seen.push((line.offset, String::from_utf8(line.data.to_vec()).unwrap()));
                    }
                    cursor = seg.consumed_end();
                }

                prop_assert_eq!(cursor, file.len() as u64);
                prop_assert_eq!(seen, expected);
            }

            #[test]
            fn arbitrary_bytes_never_consume_past_read(
                data in prop::collection::vec(any::<u8>(), 0..512),
                extra in 0u64..64,
                is_final in any::<bool>(),
            ) {
                let end = data.len() as u64;
                let seg = Segment::from_parts(
                    "a",
                    &plan(0, end, end + extra, is_final),
                    Bytes::from(data),
                );
                let spans: u64 = seg.lines().map(|l| l.span).sum();
                prop_assert!(seg.consumed_end() <= end);
                if !seg.is_oversized() {
                    prop_assert_eq!(spans, seg.consumed_end());
                }
            }
        }
    }
}
