//! Context assembly: pick the passages for the current query.
//!
//! The ranker supplies the best [`TOP_N`] corpus passages. Each is wrapped in
//! the section label and accepted in rank order while the running total stays
//! within budget. The first passage that would overflow stops assembly; a
//! smaller passage further down is never pulled forward.

use std::sync::Arc;

use helperbot_core::error::RetrievalError;
use helperbot_core::message::ContextPassage;
use helperbot_memory::{Corpus, RankedPassage, RelevanceRanker};
use tracing::debug;

use super::token::TokenCounter;

/// How many ranked passages are considered per query.
pub const TOP_N: usize = 2;

/// Builds the labeled context passages for a query.
pub struct ContextAssembler {
    ranker: RelevanceRanker,
    corpus: Arc<Corpus>,
    counter: TokenCounter,
    section_label: String,
}

impl ContextAssembler {
    pub fn new(
        ranker: RelevanceRanker,
        corpus: Arc<Corpus>,
        counter: TokenCounter,
        section_label: impl Into<String>,
    ) -> Self {
        Self {
            ranker,
            corpus,
            counter,
            section_label: section_label.into(),
        }
    }

    /// Rank the corpus against `query` and keep what fits in `budget` tokens.
    ///
    /// May return an empty list. Embedding failures propagate.
    pub async fn build(
        &self,
        query: &str,
        budget: usize,
    ) -> Result<Vec<ContextPassage>, RetrievalError> {
        let ranked = self.ranker.rank(query, &self.corpus, TOP_N).await?;
        Ok(select_within_budget(
            ranked,
            budget,
            &self.counter,
            &self.section_label,
        ))
    }
}

/// First-fit-in-order selection over already ranked passages.
pub fn select_within_budget(
    ranked: Vec<RankedPassage>,
    budget: usize,
    counter: &TokenCounter,
    section_label: &str,
) -> Vec<ContextPassage> {
    let mut selected = Vec::with_capacity(ranked.len());
    let mut used = 0usize;

    for candidate in ranked {
        let passage = ContextPassage::new(candidate.text, section_label);
        let cost = counter.passage_cost(&passage);
        if used + cost > budget {
            debug!(cost, used, budget, "Context passage does not fit, stopping");
            break;
        }
        used += cost;
        selected.push(passage);
    }

    selected
}

/// Join labeled passages the way they appear in the prompt.
pub fn join_passages(passages: &[ContextPassage]) -> String {
    passages
        .iter()
        .map(|p| p.labeled.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
