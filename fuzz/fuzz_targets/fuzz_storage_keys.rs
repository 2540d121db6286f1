// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for storage key decoding

#![no_main]

use libfuzzer_sys::fuzz_target;
use rtsdata_storage::keys;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes decode to a key or a corruption error
    let _ = keys::decode_numeric_key(data);
    let _ = keys::decode_interval_key(data);
    let _ = keys::decode_label_index_key(data);
});
