//! Perceptual hashing backing the Duplicate Hunter's `phash` method (spec
//! §4.5, resolved in SPEC_FULL §9 as "64-bit DCT-based pHash, average-hash
//! rejected as too sensitive to uniform letterhead backgrounds").
//!
//! Raster images get the real DCT-II hash over a downsampled grayscale
//! image. Nothing in this corpus rasterizes PDF pages, so PDF bytes fall
//! back to a 64-bit SimHash over shingled OCR text — a text-domain
//! approximation that catches re-scanned/re-OCR'd duplicates but not a
//! duplicate whose layout alone changed. Callers should not treat the two
//! as equivalent signals; [`evidentia_core::hash::phash_similarity`]
//! compares them bit-for-bit regardless of which path produced them.

use image::{imageops::FilterType, DynamicImage, GenericImageView};

const SAMPLE_SIZE: u32 = 32;
const RETAINED_FREQUENCIES: u32 = 8;

/// DCT-II based 64-bit perceptual hash of a decoded raster image.
pub fn dct_phash(image: &DynamicImage) -> u64 {
    let gray = image
        .grayscale()
        .resize_exact(SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Lanczos3);

    let mut samples = vec![0.0f64; (SAMPLE_SIZE * SAMPLE_SIZE) as usize];
    for (x, y, pixel) in gray.pixels() {
        samples[(y * SAMPLE_SIZE + x) as usize] = f64::from(pixel.0[0]);
    }
    let spectrum = dct2d(&samples, SAMPLE_SIZE as usize);

    // The DC term (0,0) carries average brightness, not structure; everything
    // this hash cares about lives in the remaining low-frequency corner.
    let mut coefficients = Vec::with_capacity((RETAINED_FREQUENCIES * RETAINED_FREQUENCIES) as usize - 1);
    for row in 0..RETAINED_FREQUENCIES as usize {
        for col in 0..RETAINED_FREQUENCIES as usize {
            if row == 0 && col == 0 {
                continue;
            }
            coefficients.push(spectrum[row * SAMPLE_SIZE as usize + col]);
        }
    }
    let threshold = median(&coefficients);

    let mut hash = 0u64;
    let mut bit = 0u32;
    for row in 0..RETAINED_FREQUENCIES as usize {
        for col in 0..RETAINED_FREQUENCIES as usize {
            if row == 0 && col == 0 {
                continue;
            }
            if spectrum[row * SAMPLE_SIZE as usize + col] > threshold {
                hash |= 1 << bit;
            }
            bit += 1;
        }
    }
    hash
}

fn dct2d(samples: &[f64], size: usize) -> Vec<f64> {
    let mut by_row = vec![0.0; size * size];
    for y in 0..size {
        let row = &samples[y * size..(y + 1) * size];
        by_row[y * size..(y + 1) * size].copy_from_slice(&dct1d(row));
    }
    let mut out = vec![0.0; size * size];
    for x in 0..size {
        let column: Vec<f64> = (0..size).map(|y| by_row[y * size + x]).collect();
        let transformed = dct1d(&column);
        for (y, value) in transformed.into_iter().enumerate() {
            out[y * size + x] = value;
        }
    }
    out
}

fn dct1d(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    (0..n)
        .map(|k| {
            values
                .iter()
                .enumerate()
                .map(|(i, v)| v * ((std::f64::consts::PI / n as f64) * (i as f64 + 0.5) * k as f64).cos())
                .sum()
        })
        .collect()
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// 64-bit SimHash over 3-word shingles of `text`, used as a perceptual-hash
/// stand-in for mime types this backend has no rasterizer for.
pub fn text_simhash(text: &str) -> u64 {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0;
    }
    let shingle_len = 3.min(words.len());
    let mut weights = [0i64; 64];
    for shingle in words.windows(shingle_len) {
        let digest = evidentia_core::hash::content_hash(shingle.join(" ").as_bytes());
        let bits = hex_prefix_to_u64(&digest);
        for (bit, weight) in weights.iter_mut().enumerate() {
            if (bits >> bit) & 1 == 1 {
                *weight += 1;
            } else {
                *weight -= 1;
            }
        }
    }
    let mut hash = 0u64;
    for (bit, weight) in weights.iter().enumerate() {
        if *weight > 0 {
            hash |= 1 << bit;
        }
    }
    hash
}

fn hex_prefix_to_u64(hex: &str) -> u64 {
    u64::from_str_radix(&hex[..16.min(hex.len())], 16).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_images_hash_identically() {
        let image = DynamicImage::new_rgb8(64, 64);
        assert_eq!(dct_phash(&image), dct_phash(&image));
    }

    #[test]
    fn simhash_is_deterministic() {
        let text = "this power of attorney grants authority to act on behalf of the grantor";
        assert_eq!(text_simhash(text), text_simhash(text));
    }

    #[test]
    fn simhash_differs_for_unrelated_text() {
        let a = text_simhash("power of attorney grants authority over financial accounts");
        let b = text_simhash("quarterly earnings report for the fiscal year ending march");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_text_simhash_is_zero() {
        assert_eq!(text_simhash(""), 0);
    }
}
