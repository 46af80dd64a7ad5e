use regex::Regex;
use std::sync::LazyLock;
use xxhash_rust::xxh3::xxh3_64;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("normalization pattern is valid"));

/// Lowercases and strips everything but ASCII letters and digits.
pub fn normalize(text: &str) -> String {
    NON_WORD.replace_all(&text.to_lowercase(), "").into_owned()
}

/// Hashes every `window`-character shingle of the normalized text.
///
/// Returns sorted, deduplicated hashes. Text shorter than one window hashes as
/// a single shingle; empty text has none.
pub fn shingle_hashes(text: &str, window: usize) -> Vec<u64> {
    let normalized = normalize(text);
    let bytes = normalized.as_bytes();
    let window = window.max(1);

    if bytes.is_empty() {
        return Vec::new();
    }
    if bytes.len() <= window {
        return vec![xxh3_64(bytes)];
    }

    let mut hashes: Vec<u64> = bytes.windows(window).map(xxh3_64).collect();
    hashes.sort_unstable();
    hashes.dedup();
    hashes
}
