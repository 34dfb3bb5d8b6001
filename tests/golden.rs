//! Golden file integration tests.
//!
//! Reads tests/testdata/multiplication_golden.json and verifies that
//! every convolution strategy reproduces the known decimal products.

use num_bigint::BigUint;
use serde::Deserialize;

use apmul_core::{ApmulEngine, Context, ConvolutionStrategy};
use apmul_exec::CancellationToken;
use apmul_math::RadixInfo;
use apmul_storage::DataStore;

// ---------------------------------------------------------------------------
// Golden data structures
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct GoldenData {
    #[allow(dead_code)]
    description: String,
    values: Vec<GoldenEntry>,
}

#[derive(Deserialize)]
struct GoldenEntry {
    x: String,
    y: String,
    product: String,
}

fn load_golden_data() -> GoldenData {
    let path = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/testdata/multiplication_golden.json"
    );
    let data = std::fs::read_to_string(path).expect("failed to read golden file");
    serde_json::from_str(&data).expect("failed to parse golden JSON")
}

// ---------------------------------------------------------------------------
// Helpers — decimal strings <-> base-10^17 digit words
// ---------------------------------------------------------------------------

fn digits_from_decimal(s: &str) -> Vec<u64> {
    let info = RadixInfo::for_radix(10).unwrap();
    let chunk = info.digits_per_word as usize;
    let bytes = s.as_bytes();
    let mut words = Vec::with_capacity(s.len().div_ceil(chunk));
    let mut end = bytes.len();
    while end > 0 {
        let start = end.saturating_sub(chunk);
        let word: u64 = s[start..end].parse().unwrap();
        words.push(word);
        end = start;
    }
    words
}

fn decimal_from_digits(words: &[u64]) -> String {
    let info = RadixInfo::for_radix(10).unwrap();
    let mut s = String::new();
    for (i, word) in words.iter().rev().enumerate() {
        if i == 0 {
            s.push_str(&word.to_string());
        } else {
            s.push_str(&format!("{word:0width$}", width = info.digits_per_word as usize));
        }
    }
    // Strip leading zero words.
    let trimmed = s.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn adaptive_engine_reproduces_golden_products() {
    let engine = ApmulEngine::new(Context::default()).unwrap();
    for entry in load_golden_data().values {
        let x = digits_from_decimal(&entry.x);
        let y = digits_from_decimal(&entry.y);
        let product = engine.multiply(&x, &y, 10).unwrap();
        assert_eq!(
            decimal_from_digits(&product),
            entry.product,
            "{} * {}",
            entry.x,
            entry.y
        );
    }
}

#[test]
fn every_forced_strategy_reproduces_golden_products() {
    let engine = ApmulEngine::new(Context::default()).unwrap();
    let builders = engine.registry().for_radix(10).unwrap();
    let token = CancellationToken::new();

    let strategies: [&dyn ConvolutionStrategy; 3] = [
        builders.schoolbook.as_ref(),
        builders.karatsuba.as_ref(),
        builders.ntt_convolution.as_ref(),
    ];

    for entry in load_golden_data().values {
        let x = DataStore::from_words(&digits_from_decimal(&entry.x));
        let y = DataStore::from_words(&digits_from_decimal(&entry.y));
        let result_size = x.len() + y.len();
        for strategy in strategies {
            let product = strategy.convolute(&x, &y, result_size, &token).unwrap();
            assert_eq!(
                decimal_from_digits(&product.to_vec().unwrap()),
                entry.product,
                "strategy {}: {} * {}",
                strategy.name(),
                entry.x,
                entry.y
            );
        }
    }
}

#[test]
fn golden_products_agree_with_bignum() {
    // The golden file itself is cross-checked against num-bigint.
    for entry in load_golden_data().values {
        let x: BigUint = entry.x.parse().unwrap();
        let y: BigUint = entry.y.parse().unwrap();
        assert_eq!((x * y).to_string(), entry.product);
    }
}
