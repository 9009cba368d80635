use super::errors::DomainError;

/// Euclidean length of a vector.
pub fn vector_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// Cosine similarity `dot(a, b) / (|a| * |b|)`, clamped to `[-1, 1]`.
pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> Result<f32, DomainError> {
    if query.len() != candidate.len() {
        return Err(DomainError::embedding(format!(
            "embedding dimension mismatch: query {} vs candidate {}",
            query.len(),
            candidate.len()
        )));
    }

    let mut dot = 0.0f32;
    let mut q_norm = 0.0f32;
    let mut c_norm = 0.0f32;

    for (q, c) in query.iter().zip(candidate.iter()) {
        dot += q * c;
        q_norm += q * q;
        c_norm += c * c;
    }

    let denom = q_norm.sqrt() * c_norm.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return Err(DomainError::degenerate(
            "cannot compute cosine similarity with zero vector",
        ));
    }

    Ok((dot / denom).clamp(-1.0, 1.0))
}

/// Same as [`cosine_similarity`] with both norms already known and non-zero.
pub(crate) fn cosine_with_norms(
    query: &[f32],
    query_norm: f32,
    candidate: &[f32],
    candidate_norm: f32,
) -> f32 {
    let dot: f32 = query.iter().zip(candidate.iter()).map(|(q, c)| q * c).sum();
    (dot / (query_norm * candidate_norm)).clamp(-1.0, 1.0)
}
