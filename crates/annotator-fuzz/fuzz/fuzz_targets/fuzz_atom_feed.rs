#![no_main]

use arxiv_annotator::sources::arxiv::normalize_entry;
use arxiv_annotator::sources::atom::parse_feed;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(feed) = parse_feed(data) {
        for entry in feed.entries {
            let _ = normalize_entry(entry);
        }
    }
});
