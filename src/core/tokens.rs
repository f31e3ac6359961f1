//! Measures files in the unit the threshold is expressed in.

use super::ThresholdUnit;
use std::sync::OnceLock;
use tiktoken_rs::CoreBPE;

const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn encoder() -> Option<&'static CoreBPE> {
    ENCODER
        .get_or_init(|| match tiktoken_rs::o200k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                tracing::error!("Failed to load o200k_base encoding: {}", e);
                None
            }
        })
        .as_ref()
}

/// Counts tokens with the `o200k_base` encoding.
///
/// Falls back to a four-bytes-per-token estimate if the encoding cannot be
/// loaded.
pub fn count_tokens(content: &str) -> u64 {
    match encoder() {
        Some(bpe) => bpe.encode_with_special_tokens(content).len() as u64,
        None => (content.len() as u64).div_ceil(4),
    }
}

/// Size in whole megabytes, rounded up, so any non-empty file is at least 1.
pub fn megabytes(bytes: u64) -> u64 {
    bytes.div_ceil(BYTES_PER_MEGABYTE)
}

/// Returns the value compared against the size threshold.
pub fn measure(unit: ThresholdUnit, bytes: u64, tokens: u64) -> u64 {
    match unit {
        ThresholdUnit::Megabytes => megabytes(bytes),
        ThresholdUnit::Tokens => tokens,
    }
}

/// Kilobytes rounded to two decimals, the precision summaries report.
pub fn kilobytes(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 * 100.0).round() / 100.0
}
