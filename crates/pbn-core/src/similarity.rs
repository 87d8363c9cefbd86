//! Content similarity via MinHash + LSH banding.
//!
//! Pairwise Jaccard similarity over 4-gram shingles is expensive at O(n^2)
//! for large batches, so small batches (n<11) get the exact all-pairs
//! average directly, while larger batches go through a fixed 128-permutation
//! MinHash signature with LSH-style banding to approximate the same ratio
//! without comparing every pair.

use std::collections::HashSet;

use crate::model::BacklinkSignal;

const PERMUTATIONS: usize = 128;
const BANDS: usize = 16;
const ROWS_PER_BAND: usize = PERMUTATIONS / BANDS;
const SHINGLE_SIZE: usize = 4;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;
const EXACT_THRESHOLD_N: usize = 11;

/// Fixed, deterministic permutation coefficients so results are stable
/// across runs and across process restarts - no RNG, no seed file.
fn permutation_coefficients() -> &'static [(u64, u64); PERMUTATIONS] {
    static COEFFS: std::sync::OnceLock<[(u64, u64); PERMUTATIONS]> = std::sync::OnceLock::new();
    COEFFS.get_or_init(|| {
        let mut out = [(0u64, 0u64); PERMUTATIONS];
        let mut a: u64 = 0x9E3779B97F4A7C15;
        let mut b: u64 = 0xBF58476D1CE4E5B9;
        for slot in out.iter_mut() {
            a = a.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            b = b.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            *slot = (a | 1, b);
        }
        out
    })
}

fn shingles(text: &str) -> HashSet<String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < SHINGLE_SIZE {
        if tokens.is_empty() {
            return HashSet::new();
        }
        return HashSet::from([tokens.join(" ")]);
    }
    tokens
        .windows(SHINGLE_SIZE)
        .map(|w| w.join(" "))
        .collect()
}

fn hash_shingle(s: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = ahash::AHasher::default();
    s.hash(&mut hasher);
    hasher.finish()
}

fn minhash_signature(shingle_set: &HashSet<String>) -> [u64; PERMUTATIONS] {
    let coeffs = permutation_coefficients();
    let mut sig = [u64::MAX; PERMUTATIONS];
    let hashes: Vec<u64> = shingle_set.iter().map(|s| hash_shingle(s)).collect();
    for (i, (a, b)) in coeffs.iter().enumerate() {
        let mut min = u64::MAX;
        for h in &hashes {
            let v = a.wrapping_mul(*h).wrapping_add(*b);
            if v < min {
                min = v;
            }
        }
        sig[i] = min;
    }
    sig
}

fn signature_similarity(a: &[u64; PERMUTATIONS], b: &[u64; PERMUTATIONS]) -> f64 {
    let matches = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    matches as f64 / PERMUTATIONS as f64
}

fn exact_jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

fn snippet(backlink: &BacklinkSignal) -> String {
    backlink.content_snippet()
}

/// Returns the content-similarity ratio for this batch: the fraction of
/// compared pairs whose Jaccard similarity meets `threshold`. `0.0` when
/// fewer than two backlinks carry any snippet text.
pub fn content_similarity_ratio(peers: &[BacklinkSignal], threshold: f64) -> f64 {
    let snippets: Vec<String> = peers.iter().map(snippet).collect();
    let non_empty = snippets.iter().filter(|s| !s.is_empty()).count();
    if non_empty < 2 {
        return 0.0;
    }

    let shingle_sets: Vec<HashSet<String>> = snippets.iter().map(|s| shingles(s)).collect();

    if peers.len() < EXACT_THRESHOLD_N {
        exact_all_pairs(&shingle_sets, threshold)
    } else {
        lsh_banded(&shingle_sets, threshold)
    }
}

fn exact_all_pairs(shingle_sets: &[HashSet<String>], threshold: f64) -> f64 {
    let mut hits = 0usize;
    let mut total = 0usize;
    for i in 0..shingle_sets.len() {
        for j in (i + 1)..shingle_sets.len() {
            if shingle_sets[i].is_empty() && shingle_sets[j].is_empty() {
                continue;
            }
            total += 1;
            if exact_jaccard(&shingle_sets[i], &shingle_sets[j]) >= threshold {
                hits += 1;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

fn lsh_banded(shingle_sets: &[HashSet<String>], threshold: f64) -> f64 {
    let signatures: Vec<[u64; PERMUTATIONS]> = shingle_sets.iter().map(minhash_signature).collect();

    let mut buckets: ahash::AHashMap<(usize, u64), Vec<usize>> = ahash::AHashMap::new();
    for (idx, sig) in signatures.iter().enumerate() {
        for band in 0..BANDS {
            let start = band * ROWS_PER_BAND;
            let end = start + ROWS_PER_BAND;
            let band_hash = hash_band(&sig[start..end]);
            buckets.entry((band, band_hash)).or_default().push(idx);
        }
    }

    let mut candidates: HashSet<(usize, usize)> = HashSet::new();
    for members in buckets.values() {
        if members.len() < 2 {
            continue;
        }
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                let pair = (members[i].min(members[j]), members[i].max(members[j]));
                candidates.insert(pair);
            }
        }
    }

    if candidates.is_empty() {
        return 0.0;
    }

    let mut hits = 0usize;
    let total = candidates.len();
    for (i, j) in &candidates {
        if signature_similarity(&signatures[*i], &signatures[*j]) >= threshold {
            hits += 1;
        }
    }
    hits as f64 / total as f64
}

fn hash_band(rows: &[u64]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = ahash::AHasher::default();
    rows.hash(&mut hasher);
    hasher.finish()
}
