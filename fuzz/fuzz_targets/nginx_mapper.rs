#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use logloader_core::types::{FileIdentity, RawLine};
use logloader_ingest::build_mapper;

fuzz_target!(|data: &[u8]| {
    let line = RawLine {
        log_name: "fuzz.log".to_owned(),
        identity: FileIdentity::new(1, 1),
        generation: 0,
        offset: 0,
        span: data.len() as u64,
        data: Bytes::copy_from_slice(data),
    };

    for format in ["nginx_detailed", "nginx_combined"] {
        if let Ok(mapper) = build_mapper(format) {
            if let Ok(record) = mapper.map(&line) {
                assert_eq!(record.values.len(), mapper.columns().len());
            }
        }
    }
});
