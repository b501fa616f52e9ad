//! Chunked transfer of the holdings JSON (e.g. through a series of QR codes).
//!
//! The JSON array is cut into pieces of at most [`CHUNK_CHARS`] characters;
//! each piece travels as `{"data": "...", "chunk": n, "total": t}` with
//! 1-based `chunk`. [`ChunkAssembler`] accepts the pieces in any order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Characters per chunk.
pub const CHUNK_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferChunk {
    pub data: String,
    /// 1-based position.
    pub chunk: usize,
    pub total: usize,
}

/// Cut `payload` into chunks. An empty payload still yields one (empty) chunk.
pub fn split_payload(payload: &str) -> Vec<TransferChunk> {
    let chars: Vec<char> = payload.chars().collect();
    if chars.is_empty() {
        return vec![TransferChunk {
            data: String::new(),
            chunk: 1,
            total: 1,
        }];
    }
    let total = chars.len().div_ceil(CHUNK_CHARS);
    chars
        .chunks(CHUNK_CHARS)
        .enumerate()
        .map(|(idx, piece)| TransferChunk {
            data: piece.iter().collect(),
            chunk: idx + 1,
            total,
        })
        .collect()
}

/// Chunks serialized as the JSON strings that get encoded for transport.
pub fn encode_chunks(payload: &str) -> Result<Vec<String>, CoreError> {
    split_payload(payload)
        .iter()
        .map(|chunk| {
            serde_json::to_string(chunk)
                .map_err(|e| CoreError::Serialization(format!("Failed to encode chunk: {e}")))
        })
        .collect()
}

/// Collects chunks until the payload is complete.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    total: Option<usize>,
    parts: BTreeMap<usize, String>,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one decoded chunk. Duplicates of a chunk already held are ignored.
    pub fn push(&mut self, chunk: TransferChunk) -> Result<(), CoreError> {
        if chunk.total == 0 || chunk.chunk == 0 || chunk.chunk > chunk.total {
            return Err(CoreError::Transfer(format!(
                "chunk {}/{} is out of range",
                chunk.chunk, chunk.total
            )));
        }
        match self.total {
            Some(total) if total != chunk.total => {
                return Err(CoreError::Transfer(format!(
                    "chunk claims {} parts but this transfer has {total}",
                    chunk.total
                )));
            }
            _ => self.total = Some(chunk.total),
        }
        self.parts.entry(chunk.chunk).or_insert(chunk.data);
        Ok(())
    }

    /// Add one chunk in its JSON string form.
    pub fn push_encoded(&mut self, encoded: &str) -> Result<(), CoreError> {
        let chunk: TransferChunk = serde_json::from_str(encoded)
            .map_err(|e| CoreError::Transfer(format!("not a transfer chunk: {e}")))?;
        self.push(chunk)
    }

    pub fn received(&self) -> usize {
        self.parts.len()
    }

    pub fn total(&self) -> Option<usize> {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.total.is_some_and(|total| self.parts.len() == total)
    }

    /// The reassembled payload once every chunk has arrived.
    pub fn finish(&self) -> Result<String, CoreError> {
        let total = self
            .total
            .ok_or_else(|| CoreError::Transfer("no chunks received".into()))?;
        if self.parts.len() != total {
            let missing: Vec<String> = (1..=total)
                .filter(|n| !self.parts.contains_key(n))
                .map(|n| n.to_string())
                .collect();
            return Err(CoreError::Transfer(format!(
                "missing chunks: {}",
                missing.join(", ")
            )));
        }
        Ok(self.parts.values().map(String::as_str).collect())
    }
}
