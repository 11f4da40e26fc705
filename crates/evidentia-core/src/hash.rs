//! Content hashing and fingerprinting primitives.
//!
//! Three distinct hashes are used across the pipeline and are kept in one
//! module because they share the "stable hash over a canonical byte
//! representation" shape: content hashing for ingestion idempotence (spec
//! §4.1), gap fingerprinting for collapsing repeated sightings (spec §3),
//! and perceptual-hash Hamming distance for duplicate detection (spec
//! §4.5).

use sha2::{Digest, Sha256};

/// SHA-256 content hash of raw document bytes, hex-encoded.
///
/// Two ingestions of identical bytes produce identical hashes; this is the
/// idempotence key for the Ingestion Gateway (spec §4.1, §8).
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Lowercase, whitespace-collapsed normalization used for entity names and
/// for fingerprint inputs.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Stable fingerprint over `(gap_type, normalized partial value, normalized
/// context clues)` so repeated sightings of the same unknown collapse onto
/// one [`crate::model::KnowledgeGap`] (spec §3).
///
/// The clues are sorted before hashing so that fingerprinting is invariant
/// to the order in which the extractor emitted them.
pub fn gap_fingerprint(gap_type: &str, partial_value: &str, context_clues: &[String]) -> String {
    let mut clues: Vec<String> = context_clues.iter().map(|c| normalize_text(c)).collect();
    clues.sort();

    let mut hasher = Sha256::new();
    hasher.update(gap_type.as_bytes());
    hasher.update(b"\0");
    hasher.update(normalize_text(partial_value).as_bytes());
    hasher.update(b"\0");
    hasher.update(clues.join("\0").as_bytes());
    hex::encode(hasher.finalize())
}

/// 64-bit DCT-style perceptual hash Hamming distance, normalized to
/// `[0, 1]` similarity (SPEC_FULL §9 open-question resolution: 64-bit
/// pHash over average-hash, since average-hash is too sensitive to the
/// large uniform backgrounds common in scanned legal letterhead).
///
/// This module does not compute the pHash itself (that requires image
/// decoding, owned by the vision backend collaborator) — it only compares
/// two already-computed hashes, which is the part the Duplicate Hunter
/// owns.
pub fn phash_similarity(a: u64, b: u64) -> f64 {
    let distance = (a ^ b).count_ones();
    1.0 - (f64::from(distance) / 64.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identical_bytes_hash_identically() {
        assert_eq!(content_hash(b"hello"), content_hash(b"hello"));
        assert_ne!(content_hash(b"hello"), content_hash(b"world"));
    }

    #[test]
    fn fingerprint_is_stable_across_clue_order() {
        let a = gap_fingerprint(
            "entity_name",
            "S___ LLC",
            &["page 2".to_string(), "grantor line".to_string()],
        );
        let b = gap_fingerprint(
            "entity_name",
            "S___ LLC",
            &["grantor line".to_string(), "page 2".to_string()],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_is_stable_across_casing_and_whitespace() {
        let a = gap_fingerprint("entity_name", "S___  LLC", &["Grantor Line".to_string()]);
        let b = gap_fingerprint("entity_name", "s___ llc", &["grantor   line".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn phash_identical_is_similarity_one() {
        assert_eq!(phash_similarity(0xABCD, 0xABCD), 1.0);
    }

    #[test]
    fn phash_one_bit_flip_reduces_similarity() {
        let sim = phash_similarity(0, 1);
        assert!((sim - (63.0 / 64.0)).abs() < 1e-9);
    }

    proptest! {
        /// Gap fingerprint stability (spec §8): for a fixed logical gap,
        /// shuffling the clue order or perturbing case/whitespace in the
        /// partial value and clues must never change the fingerprint.
        #[test]
        fn fingerprint_is_invariant_to_clue_order_and_casing(
            partial in "[A-Za-z ]{1,12}",
            clues in proptest::collection::vec("[A-Za-z ]{1,12}", 0..5),
            shuffle_seed in 0u64..64,
        ) {
            let baseline = gap_fingerprint("entity_name", &partial, &clues);

            let mut shuffled = clues.clone();
            let len = shuffled.len();
            for i in 0..len {
                let j = ((shuffle_seed as usize).wrapping_add(i)) % len.max(1);
                shuffled.swap(i, j.min(len.saturating_sub(1)));
            }
            let reordered = gap_fingerprint("entity_name", &partial, &shuffled);
            prop_assert_eq!(&baseline, &reordered);

            let loud_partial = partial.to_uppercase();
            let loud_clues: Vec<String> = clues.iter().map(|c| format!("  {} ", c.to_uppercase())).collect();
            let recased = gap_fingerprint("entity_name", &loud_partial, &loud_clues);
            prop_assert_eq!(baseline, recased);
        }

        /// `normalize_text` is idempotent: normalizing an already-normalized
        /// string is a no-op, so fingerprinting never drifts across repeated
        /// re-ingestion of the same clue text.
        #[test]
        fn normalize_text_is_idempotent(s in ".{0,40}") {
            let once = normalize_text(&s);
            let twice = normalize_text(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
