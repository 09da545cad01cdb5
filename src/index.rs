//! Exact nearest-neighbour index over passage embeddings.
//!
//! The index is a flat row-major matrix searched by squared Euclidean
//! distance. It is built offline with [`FlatIndex::add`] / [`FlatIndex::save`]
//! and loaded read-only at startup.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// One search hit: ordinal position of the stored vector and its distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    /// Position of the vector in insertion order.
    pub ordinal: usize,
    /// Squared L2 distance to the query.
    pub distance: f32,
}

/// Flat (brute force) vector index with a fixed dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Creates an empty index for vectors of `dimension` components.
    pub fn new(dimension: usize) -> Result<Self, RagError> {
        if dimension == 0 {
            return Err(RagError::InvalidInput(
                "index dimension must be positive".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    /// Vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Appends a vector; its ordinal is the previous [`len`](Self::len).
    pub fn add(&mut self, vector: &[f32]) -> Result<usize, RagError> {
        self.check_dimension(vector)?;
        let ordinal = self.len();
        self.data.extend_from_slice(vector);
        Ok(ordinal)
    }

    /// Returns up to `k` nearest stored vectors, best match first.
    ///
    /// Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbour>, RagError> {
        self.check_dimension(query)
            .map_err(|err| RagError::RetrievalUnavailable(err.to_string()))?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut hits: Vec<Neighbour> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(ordinal, row)| Neighbour {
                ordinal,
                distance: squared_l2(row, query),
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.ordinal.cmp(&b.ordinal))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Reads a persisted index.
    pub fn load(path: &Path) -> Result<Self, RagError> {
        let bytes = fs::read(path)
            .map_err(|err| RagError::index_unavailable(path, format!("read failed: {err}")))?;
        Self::decode(&bytes).map_err(|reason| RagError::index_unavailable(path, reason))
    }

    /// Persists the index.
    pub fn save(&self, path: &Path) -> Result<(), RagError> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|err| RagError::index_unavailable(path, err))?;
        fs::write(path, bytes).map_err(|err| RagError::index_unavailable(path, err))
    }

    fn decode(bytes: &[u8]) -> Result<Self, String> {
        let (index, read): (Self, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|err| format!("unrecognised index format: {err}"))?;
        if read != bytes.len() {
            return Err(format!("{} trailing bytes after index", bytes.len() - read));
        }
        if index.dimension == 0 {
            return Err("index dimension is zero".to_string());
        }
        if index.data.len() % index.dimension != 0 {
            return Err(format!(
                "{} values do not form rows of dimension {}",
                index.data.len(),
                index.dimension
            ));
        }
        Ok(index)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), RagError> {
        if vector.len() != self.dimension {
            return Err(RagError::InvalidInput(format!(
                "vector has {} components, index expects {}",
                vector.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
