#![no_main]

use arxiv_annotator::models::BatchCollection;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // A stored batch that loads must have contiguous indices
    if let Ok(batch) = serde_json::from_slice::<BatchCollection>(data) {
        assert!(batch.iter().enumerate().all(|(pos, (index, _))| pos == index));
    }
});
