//! services/api/src/adapters/vector.rs
//!
//! Similarity scoring shared by the content stores.

use nexus_chat_core::domain::ScoredPassage;
use nexus_chat_core::retrieval::rank_passages;

/// Cosine similarity of two vectors; 0.0 for empty or mismatched inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

/// Keeps the `limit` best passages, using the same total order as the coordinator
/// so that ties at the cut-off are resolved identically on every query.
pub fn top_k(mut passages: Vec<ScoredPassage>, limit: usize) -> Vec<ScoredPassage> {
    rank_passages(&mut passages);
    passages.truncate(limit);
    passages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_known_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
