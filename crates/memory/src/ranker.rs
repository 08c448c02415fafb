//! Relevance ranking: embed the query once, score the corpus by cosine
//! similarity, keep the best `top_n`.
//!
//! This is a full linear scan. The corpus is small and fixed, so there is
//! no index.

use std::sync::Arc;

use helperbot_core::error::RetrievalError;
use helperbot_core::provider::{EmbeddingRequest, Provider};
use serde::Serialize;
use tracing::{debug, warn};

use crate::corpus::Corpus;
use crate::vector::cosine_similarity;

/// A corpus passage together with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPassage {
    pub text: String,
    pub score: f32,
}

/// Ranks corpus entries against a query using an external embedding model.
pub struct RelevanceRanker {
    provider: Arc<dyn Provider>,
    embedding_model: String,
}

impl RelevanceRanker {
    pub fn new(provider: Arc<dyn Provider>, embedding_model: impl Into<String>) -> Self {
        Self {
            provider,
            embedding_model: embedding_model.into(),
        }
    }

    /// Embed `query` and return at most `top_n` passages, best first.
    ///
    /// Embedding failures are not retried.
    pub async fn rank(
        &self,
        query: &str,
        corpus: &Corpus,
        top_n: usize,
    ) -> Result<Vec<RankedPassage>, RetrievalError> {
        if corpus.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.embedding_model.clone(),
                inputs: vec![query.to_string()],
            })
            .await
            .map_err(|e| {
                warn!(model = %self.embedding_model, error = %e, "Query embedding failed");
                RetrievalError::EmbeddingService(e)
            })?;

        let query_embedding = response
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or(RetrievalError::EmptyEmbedding)?;

        rank_by_embedding(&query_embedding, corpus, top_n)
    }
}

/// Score every corpus entry against a known query embedding.
///
/// Sorting is stable, so equal scores keep corpus order.
pub fn rank_by_embedding(
    query_embedding: &[f32],
    corpus: &Corpus,
    top_n: usize,
) -> Result<Vec<RankedPassage>, RetrievalError> {
    if let Some(dimension) = corpus.dimension()
        && dimension != query_embedding.len()
    {
        return Err(RetrievalError::DimensionMismatch {
            query: query_embedding.len(),
            corpus: dimension,
        });
    }

    let mut ranked: Vec<RankedPassage> = corpus
        .entries()
        .iter()
        .map(|entry| RankedPassage {
            text: entry.text.clone(),
            score: cosine_similarity(query_embedding, &entry.embedding),
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(top_n);

    debug!(
        candidates = corpus.len(),
        returned = ranked.len(),
        best = ranked.first().map(|r| r.score).unwrap_or(0.0),
        "Ranked corpus"
    );
    Ok(ranked)
}
