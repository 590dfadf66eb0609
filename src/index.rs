//! Per-document vector index.
//!
//! A [`DocumentIndex`] owns the segments of exactly one [`Document`] together
//! with their embedding vectors. It is built once and is read-only afterwards,
//! so it can be shared between concurrent questions without locking.
//!
//! # Retrieval
//!
//! 1. Embed the query with the same [`Embedder`] used at build time.
//! 2. Score every stored vector by [`cosine_similarity`] (brute force).
//! 3. Sort by score (desc), then by segment ordinal (asc).
//! 4. Truncate to `k`.

use std::sync::Arc;

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::EmbeddingError;
use crate::models::{Document, Segment};

struct IndexedSegment {
    segment: Segment,
    vector: Vec<f32>,
}

/// A retrieved segment with its similarity to the query.
#[derive(Debug, Clone, Copy)]
pub struct ScoredSegment<'a> {
    pub segment: &'a Segment,
    pub score: f32,
}

/// Immutable similarity index over one document's segments.
pub struct DocumentIndex {
    document: Document,
    entries: Vec<IndexedSegment>,
    dims: Option<usize>,
    dropped: usize,
    embedder: Arc<dyn Embedder>,
}

impl DocumentIndex {
    /// Embed every segment and build the index.
    ///
    /// A segment whose embedding fails is dropped with a warning; it is never
    /// replaced by a placeholder vector. An index where every segment was
    /// dropped is still valid and always retrieves nothing.
    pub async fn build(
        document: Document,
        segments: Vec<Segment>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let mut entries: Vec<IndexedSegment> = Vec::with_capacity(segments.len());
        let mut dims = embedder.dims();
        let mut dropped = 0usize;

        for segment in segments {
            let vector = match embedder.embed(&segment.text).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(
                        document = %document.path.display(),
                        ordinal = segment.ordinal,
                        error = %e,
                        "dropping segment: embedding failed"
                    );
                    dropped += 1;
                    continue;
                }
            };

            match dims {
                Some(expected) if expected != vector.len() => {
                    let error = EmbeddingError::Dimension {
                        expected,
                        got: vector.len(),
                    };
                    tracing::warn!(
                        document = %document.path.display(),
                        ordinal = segment.ordinal,
                        %error,
                        "dropping segment: inconsistent vector size"
                    );
                    dropped += 1;
                    continue;
                }
                Some(_) => {}
                None => dims = Some(vector.len()),
            }

            entries.push(IndexedSegment { segment, vector });
        }

        tracing::debug!(
            document = %document.path.display(),
            segments = entries.len(),
            dropped,
            "document index built"
        );

        Self {
            document,
            entries,
            dims,
            dropped,
            embedder,
        }
    }

    /// The document every segment in this index belongs to.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Number of successfully embedded segments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of segments dropped at build time because embedding failed.
    pub fn dropped_segments(&self) -> usize {
        self.dropped
    }

    /// Indexed segments in ordinal order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.entries.iter().map(|e| &e.segment)
    }

    /// Retrieve up to `k` segments most similar to `query`.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<&Segment>, EmbeddingError> {
        Ok(self
            .retrieve_scored(query, k)
            .await?
            .into_iter()
            .map(|s| s.segment)
            .collect())
    }

    /// Like [`retrieve`](Self::retrieve), keeping the similarity scores.
    ///
    /// An empty index or `k == 0` returns an empty result without calling
    /// the embedding model.
    pub async fn retrieve_scored(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredSegment<'_>>, EmbeddingError> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed(query).await?;
        if let Some(expected) = self.dims {
            if query_vec.len() != expected {
                return Err(EmbeddingError::Dimension {
                    expected,
                    got: query_vec.len(),
                });
            }
        }
        Ok(self.nearest(&query_vec, k))
    }

    /// Rank stored segments against a pre-computed query vector.
    pub fn nearest(&self, query_vec: &[f32], k: usize) -> Vec<ScoredSegment<'_>> {
        let mut scored: Vec<ScoredSegment<'_>> = self
            .entries
            .iter()
            .map(|e| ScoredSegment {
                segment: &e.segment,
                score: cosine_similarity(query_vec, &e.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.segment.ordinal.cmp(&b.segment.ordinal))
        });
        scored.truncate(k);
        scored
    }
}

impl std::fmt::Debug for DocumentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex")
            .field("document", &self.document.path)
            .field("segments", &self.entries.len())
            .field("dims", &self.dims)
            .field("dropped", &self.dropped)
            .field("model", &self.embedder.model_name())
            .finish()
    }
}
