use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::DomainError;

/// Fixed-length vector representation of a text payload.
pub type EmbeddingVector = Vec<f32>;

/// A single point in a vector-store collection.
///
/// The id is content-addressed: it is derived from the canonicalized JSON
/// payload with a non-cryptographic 64-bit hash, which makes upserts
/// idempotent. Hash collisions are theoretically possible and accepted as a
/// tradeoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: u64,
    pub embedding: EmbeddingVector,
    pub payload: Map<String, Value>,
}

impl VectorPoint {
    /// Build a point from a payload, deriving the content-addressed id.
    pub fn from_payload(payload: Map<String, Value>, embedding: EmbeddingVector) -> Self {
        let id = content_id(&payload);
        Self {
            id,
            embedding,
            payload,
        }
    }
}

/// One similarity-search hit. Scores are in [0, 1], higher means more
/// similar; result ordering comes from the store and is preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub payload: Map<String, Value>,
    pub score: f32,
}

/// Canonical JSON rendering of a payload.
///
/// serde_json maps are ordered by key, so serializing the object (including
/// nested objects) yields a stable canonical form.
pub fn canonical_json(payload: &Map<String, Value>) -> Result<String, DomainError> {
    serde_json::to_string(&Value::Object(payload.clone()))
        .map_err(|e| DomainError::data(format!("failed to canonicalize payload: {e}")))
}

/// Content-addressed id for a payload: FNV-1a 64 over its canonical JSON.
pub fn content_id(payload: &Map<String, Value>) -> u64 {
    // canonical_json only fails on non-serializable values, which a
    // Map<String, Value> cannot contain.
    let canonical = canonical_json(payload).unwrap_or_default();
    fnv1a64(canonical.as_bytes())
}

/// FNV-1a, 64-bit.
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
