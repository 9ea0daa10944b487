//! Vector BLOB conversion and cosine similarity computation.

use crate::backend::{BackendError, Result};

/// Convert f32 values to a BLOB (little-endian bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|&x| x.to_le_bytes()).collect()
}

/// Convert a BLOB (little-endian bytes) back to f32 values.
///
/// # Errors
///
/// Returns `BackendError::Storage` if the blob length is not a multiple of 4.
pub fn blob_to_vec(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(BackendError::Storage(format!(
            "corrupt vector BLOB: {} bytes is not a whole number of f32 values",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Reject vectors containing NaN or infinite values.
pub fn ensure_finite(vec: &[f32]) -> Result<()> {
    if vec.iter().any(|x| !x.is_finite()) {
        return Err(BackendError::InvalidRequest(
            "vector contains NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Compute cosine similarity between two vectors of equal length.
///
/// Zero-norm vectors have similarity 0.
///
/// # Errors
///
/// - Returns `BackendError::InvalidRequest` if either vector is empty or contains NaN/infinity.
/// - Returns `BackendError::Storage` if the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.is_empty() || b.is_empty() {
        return Err(BackendError::InvalidRequest(
            "cannot compute similarity with empty vector".to_string(),
        ));
    }

    if a.len() != b.len() {
        return Err(BackendError::Storage(format!(
            "stored vector has {} dimensions, query has {}",
            b.len(),
            a.len()
        )));
    }

    ensure_finite(a)?;
    ensure_finite(b)?;

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a * norm_b))
}
