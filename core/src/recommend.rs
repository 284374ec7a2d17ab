use crate::matrix::Matrix;
use crate::DocId;

/// Cosine similarity: dot / (|a|·|b|). NaN when either norm is zero; callers
/// rank through `k_nearest_to_centroid`, which drops undefined scores.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Jaccard similarity over the sets of dimensions with positive weight.
/// NaN when both vectors are empty sets, the same undefined case as a
/// zero-norm cosine.
pub fn jaccard_similarity(a: &[f64], b: &[f64]) -> f64 {
    let mut intersection = 0usize;
    let mut union = 0usize;
    for (x, y) in a.iter().zip(b) {
        let in_a = *x > 0.0;
        let in_b = *y > 0.0;
        if in_a && in_b {
            intersection += 1;
        }
        if in_a || in_b {
            union += 1;
        }
    }
    intersection as f64 / union as f64
}

/// Elementwise mean of a non-empty set of equal-length vectors.
pub fn centroid(vectors: &[Vec<f64>]) -> Vec<f64> {
    let dims = vectors.first().map_or(0, |v| v.len());
    let mut mean = vec![0.0; dims];
    for vector in vectors {
        for (slot, value) in mean.iter_mut().zip(vector) {
            *slot += value;
        }
    }
    let n = vectors.len() as f64;
    for slot in mean.iter_mut() {
        *slot /= n;
    }
    mean
}

/// Rank every matrix row by similarity to the centroid of `given`. Rows that
/// exactly equal one of the given vectors count as already seen and are
/// skipped, as are rows whose score is undefined (zero-norm). The sort is
/// stable and descending, so ties keep ascending row order; the result is
/// truncated to k.
pub fn k_nearest_to_centroid<F>(
    given: &[Vec<f64>],
    matrix: &Matrix,
    k: usize,
    similarity: F,
) -> Vec<(DocId, f64)>
where
    F: Fn(&[f64], &[f64]) -> f64,
{
    if given.is_empty() || matrix.rows() == 0 {
        return Vec::new();
    }
    let center = centroid(given);

    let mut scored: Vec<(DocId, f64)> = Vec::new();
    for row_id in 0..matrix.rows() {
        let row = matrix.row(row_id);
        if given.iter().any(|vector| vector.as_slice() == row) {
            continue;
        }
        let score = similarity(&center, row);
        if !score.is_finite() {
            continue;
        }
        scored.push((row_id as DocId, score));
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}
