#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;

use apmul_exec::{CancellationToken, ParallelRunner};
use apmul_math::MODULUS;
use apmul_ntt::{transform_length, Ntt, NttSettings};
use apmul_storage::DataStore;

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let modulus_index = (data[0] % 3) as usize;
    let words: Vec<u64> = data[1..]
        .chunks(8)
        .take(512)
        .map(|c| {
            let mut raw = [0u8; 8];
            raw[..c.len()].copy_from_slice(c);
            u64::from_le_bytes(raw) % MODULUS[modulus_index]
        })
        .collect();

    let n = transform_length(words.len()).unwrap();
    let mut padded = words;
    padded.resize(n, 0);

    // Tiny thresholds so the fuzzer exercises six-step and two-pass on
    // small inputs.
    let ntt = Ntt::new(
        NttSettings {
            cache_l1: 1 << 10,
            cache_l2: 8 * 16,
            memory_threshold: 8 * 64,
            min_batch: 4,
        },
        Arc::new(ParallelRunner::new(2).unwrap()),
    );
    let token = CancellationToken::new();

    let store = DataStore::from_words(&padded);
    ntt.transform(&store, modulus_index, &token).unwrap();
    ntt.inverse_transform(&store, modulus_index, n, &token)
        .unwrap();
    assert_eq!(store.to_vec().unwrap(), padded);
});
