//! Similarity computation for embeddings.

use crate::Embedding;
use crate::error::{Result, StoreError};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where 1.0 means identical
/// direction, 0.0 orthogonal, and -1.0 opposite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(StoreError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (magnitude_a * magnitude_b))
}

/// Normalize an embedding to unit length in place.
pub fn normalize(embedding: &mut Embedding) {
    let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x /= magnitude;
        }
    }
}
