//! Retrieval and conversation memory for helperbot.
//!
//! - **Corpus**: the fixed set of passages with precomputed embeddings,
//!   loaded once from CSV at startup
//! - **Ranker**: embeds a query and orders the corpus by cosine similarity
//! - **Cache**: per-conversation turn and context lists, bounded by
//!   entry count (LRU) and lifetime (TTL)

pub mod cache;
pub mod corpus;
pub mod ranker;
pub mod vector;

pub use cache::{ConversationCache, SWEEP_INTERVAL, Shared, TtlLruCache};
pub use corpus::{Corpus, CorpusEntry};
pub use ranker::{RankedPassage, RelevanceRanker};
pub use vector::cosine_similarity;
