#![no_main]

use arxiv_annotator::annotate::extract_keywords;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Any model output either yields keywords or an error, never a panic
    if let Ok(keywords) = extract_keywords(data) {
        assert!(keywords.iter().all(|k| !k.is_empty()));
    }
});
