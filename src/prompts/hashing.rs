//! Content normalization and stable prompt identifiers.
//!
//! Identifiers must survive process restarts and platform changes, so they are
//! derived from a SHA-256 digest rather than `std::hash`.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Identifiers are reduced into this range to fit comfortably in Anki fields.
const ID_MODULUS: u128 = 10_000_000_000;

/// ASCII punctuation removed during normalization.
const PUNCTUATION: &str = r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##;

/// Markup tags: `<` must be followed by a letter (or `/` and a letter),
/// so comparisons like `<2` are left alone.
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").unwrap());

/// Normalize text before hashing.
///
/// Strips markup tags, removes ASCII punctuation and all whitespace, then
/// lowercases. Idempotent: once tags are stripped, `<` and `>` are removed
/// with the rest of the punctuation, so no tag can survive a second pass.
pub fn normalize(text: &str) -> String {
    let without_tags = TAG_RE.replace_all(text, "");

    without_tags
        .chars()
        .filter(|c| !c.is_whitespace() && !PUNCTUATION.contains(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Hash a string to a stable integer.
///
/// The SHA-256 digest is read as a big-endian integer and reduced modulo 10^10.
pub fn hash_str(text: &str) -> u64 {
    let digest = Sha256::digest(text.as_bytes());

    let reduced = digest
        .iter()
        .fold(0u128, |acc, byte| (acc * 256 + u128::from(*byte)) % ID_MODULUS);

    reduced as u64
}

/// Normalize then hash.
pub fn hash_normalized(text: &str) -> u64 {
    hash_str(&normalize(text))
}
