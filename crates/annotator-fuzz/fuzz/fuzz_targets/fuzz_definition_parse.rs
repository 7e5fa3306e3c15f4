#![no_main]

use arxiv_annotator::annotate::literal::parse_string_map;
use arxiv_annotator::annotate::recover_definitions;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = recover_definitions(data);
    let _ = parse_string_map(data);
});
