#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use logloader_core::types::{FileIdentity, RawLine};
use logloader_ingest::build_mapper;

fuzz_target!(|data: &[u8]| {
    let Ok(mapper) = build_mapper("json") else {
        return;
    };
    let line = RawLine {
        log_name: "fuzz.log".to_owned(),
        identity: FileIdentity::new(1, 1),
        generation: 0,
        offset: 0,
        span: data.len() as u64,
        data: Bytes::copy_from_slice(data),
    };
    let _ = mapper.map(&line);
});
