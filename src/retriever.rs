//! Query → top-k passages over the loaded index and metadata.

use tracing::{debug, warn};

use crate::embedder::Embedder;
use crate::error::RagError;
use crate::index::FlatIndex;
use crate::passage::{MetadataStore, PassageRecord};

/// A retrieved passage together with its search position and distance.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedPassage {
    /// The metadata record, unaltered.
    pub record: PassageRecord,
    /// Ordinal returned by the index.
    pub ordinal: usize,
    /// Squared L2 distance from the query embedding.
    pub distance: f32,
}

/// Composes an encoder, a vector index, and the aligned metadata store.
///
/// All three are read-only after construction.
pub struct Retriever<E> {
    embedder: E,
    index: FlatIndex,
    metadata: MetadataStore,
}

impl<E: Embedder> Retriever<E> {
    /// Wires the retrieval stage together.
    pub fn new(embedder: E, index: FlatIndex, metadata: MetadataStore) -> Self {
        if index.is_empty() {
            warn!("vector index holds no passages; every search will come back empty");
        } else if index.len() != metadata.len() {
            warn!(
                index_vectors = index.len(),
                metadata_records = metadata.len(),
                "index and metadata sizes differ; out-of-range hits will be dropped"
            );
        }
        Self {
            embedder,
            index,
            metadata,
        }
    }

    /// Returns at most `k` passages, best match first.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<PassageRecord>, RagError> {
        Ok(self
            .retrieve_scored(query, k)?
            .into_iter()
            .map(|hit| hit.record)
            .collect())
    }

    /// Like [`retrieve`](Self::retrieve) but keeps ordinals and distances.
    ///
    /// Index hits past the end of the metadata store are skipped with a
    /// warning, so the result can be shorter than `k` or empty.
    pub fn retrieve_scored(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedPassage>, RagError> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidInput("query must not be empty".to_string()));
        }
        if k == 0 {
            return Err(RagError::InvalidInput("top-k must be at least 1".to_string()));
        }
        let vector = self.embedder.embed(query)?;
        let neighbours = self.index.search(&vector, k)?;
        let mut hits = Vec::with_capacity(neighbours.len());
        for neighbour in neighbours {
            match self.metadata.get(neighbour.ordinal) {
                Some(record) => hits.push(RetrievedPassage {
                    record: record.clone(),
                    ordinal: neighbour.ordinal,
                    distance: neighbour.distance,
                }),
                None => warn!(
                    ordinal = neighbour.ordinal,
                    metadata_records = self.metadata.len(),
                    "index returned an ordinal outside the metadata store; dropping it"
                ),
            }
        }
        debug!(requested = k, returned = hits.len(), "retrieval complete");
        Ok(hits)
    }

    /// Metadata store backing this retriever.
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Vector index backing this retriever.
    pub fn index(&self) -> &FlatIndex {
        &self.index
    }
}
