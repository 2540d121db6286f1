// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for instrument export parsing

#![no_main]

use libfuzzer_sys::fuzz_target;
use rtsdata_ingest::{parse_reading_token, parse_readings};

fuzz_target!(|data: &[u8]| {
    // Malformed exports must come back as errors, never panics
    if let Ok(parsed) = parse_readings(std::io::Cursor::new(data)) {
        let summary = parsed.summary();
        let labelled: u64 = summary.labels.values().sum();
        assert_eq!(summary.numeric + labelled, parsed.readings.len() as u64);
    }

    if let Ok(s) = std::str::from_utf8(data) {
        let _ = parse_reading_token(s);
    }
});
