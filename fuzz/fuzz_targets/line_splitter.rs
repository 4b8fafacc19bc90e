#![no_main]

use std::path::PathBuf;

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use logloader_core::types::FileIdentity;
use logloader_ingest::{ReadSegment, Segment};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    data: Vec<u8>,
    start: u32,
    /// 읽은 범위 뒤에 남은 파일 크기
    remaining: u16,
    is_final: bool,
}

fuzz_target!(|input: FuzzInput| {
    let start = u64::from(input.start);
    let end = start + input.data.len() as u64;
    let plan = ReadSegment {
        path: PathBuf::from("fuzz.log"),
        identity: FileIdentity::new(1, 1),
        generation: 0,
        start,
        end,
        file_size: end + u64::from(input.remaining),
        is_final: input.is_final,
    };
    let segment = Segment::from_parts("fuzz.log", &plan, Bytes::from(input.data));

    let mut expected = start;
    for line in segment.lines() {
        assert_eq!(line.offset, expected);
        assert!(line.data.len() as u64 <= line.span);
        expected += line.span;
    }

    let consumed = segment.consumed_end();
    assert!(consumed >= start && consumed <= end);
    if !segment.is_oversized() {
        assert_eq!(expected, consumed);
    }
    if let Some(tail) = segment.tail() {
        assert_eq!(tail.offset + tail.len, end);
    }
});
