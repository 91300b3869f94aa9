//! Vector similarity for feature vectors.

/// Compute cosine similarity between two vectors.
///
/// A zero vector scores 0.0 against everything, so it has no nearest neighbor.
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
    if denom == 0.0 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// A candidate's position and its similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub similarity: f32,
}

/// Rank candidates by similarity to `query` and keep the best `top_k`.
///
/// Equal similarities keep candidate order.
pub fn nearest<'a, I>(query: &[f32], candidates: I, top_k: usize) -> Vec<Neighbor>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut ranked: Vec<Neighbor> = candidates
        .into_iter()
        .enumerate()
        .map(|(index, c)| Neighbor {
            index,
            similarity: cosine_similarity(query, c),
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(top_k);
    ranked
}
