#![no_main]

use libfuzzer_sys::fuzz_target;

use apmul_core::{BuilderRegistry, Context, ConvolutionStrategy};
use apmul_exec::CancellationToken;
use apmul_math::RadixInfo;
use apmul_storage::DataStore;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    // First byte selects the radix, the rest becomes two digit
    // sequences.
    let radix = 2 + u32::from(data[0]) % 35;
    let base = RadixInfo::for_radix(radix).unwrap().base;
    let words: Vec<u64> = data[1..]
        .chunks(4)
        .take(128)
        .map(|c| {
            let mut raw = [0u8; 4];
            raw[..c.len()].copy_from_slice(c);
            u64::from(u32::from_le_bytes(raw)) % base
        })
        .collect();
    if words.len() < 2 {
        return;
    }
    let split = words.len() / 2;
    let x = DataStore::from_words(&words[..split]);
    let y = DataStore::from_words(&words[split..]);
    let result_size = words.len();

    let registry = BuilderRegistry::new(Context::default()).unwrap();
    let builders = registry.for_radix(radix).unwrap();
    let token = CancellationToken::new();

    // All three strategies must agree exactly.
    let schoolbook = builders
        .schoolbook
        .convolute(&x, &y, result_size, &token)
        .unwrap();
    let karatsuba = builders
        .karatsuba
        .convolute(&x, &y, result_size, &token)
        .unwrap();
    let ntt = builders
        .ntt_convolution
        .convolute(&x, &y, result_size, &token)
        .unwrap();

    let expected = schoolbook.to_vec().unwrap();
    assert_eq!(karatsuba.to_vec().unwrap(), expected);
    assert_eq!(ntt.to_vec().unwrap(), expected);
});
