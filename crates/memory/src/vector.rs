//! Vector similarity utilities.
//!
//! Pure-Rust cosine similarity and top-k ranking over embedded items.

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Both operands are divided by their magnitudes, so inputs need not be
/// pre-normalized. Returns 0.0 if the lengths differ or either vector is
/// empty or zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0) as f32
}

/// Rank `candidates` by cosine similarity to `query`.
///
/// Returns `(index, similarity)` pairs sorted by descending similarity,
/// truncated to `limit`. Equal scores keep candidate order, so repeated
/// queries against the same candidates return the same ranking.
pub fn rank_by_similarity<'a, I>(candidates: I, query: &[f32], limit: usize) -> Vec<(usize, f32)>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    if limit == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f32)> = candidates
        .into_iter()
        .enumerate()
        .map(|(i, emb)| (i, cosine_similarity(emb, query)))
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}
