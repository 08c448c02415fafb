//! The reference corpus: passages with precomputed embeddings.
//!
//! The corpus is a CSV export with (at least) a `text` column and an
//! `embedding` column holding a list literal such as `[0.0123, -0.0456]`.
//! Other columns (a leading index column, titles, token counts) are ignored.
//! It is loaded once at startup and never mutated afterwards.

use std::io::Read;
use std::path::Path;

use helperbot_core::error::CorpusError;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One passage and its embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub text: String,
    pub embedding: Vec<f32>,
}

impl CorpusEntry {
    pub fn new(text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            embedding,
        }
    }
}

/// An immutable, dimension-checked collection of corpus entries.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    entries: Vec<CorpusEntry>,
}

impl Corpus {
    /// Build a corpus, checking that every embedding has the same dimension.
    pub fn from_entries(entries: Vec<CorpusEntry>) -> Result<Self, CorpusError> {
        if let Some(first) = entries.first() {
            let expected = first.embedding.len();
            for (i, entry) in entries.iter().enumerate() {
                if entry.embedding.len() != expected {
                    return Err(CorpusError::InconsistentDimension {
                        row: i + 1,
                        expected,
                        found: entry.embedding.len(),
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    /// Load a corpus from a CSV file.
    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        let file = std::fs::File::open(path).map_err(|e| CorpusError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let corpus = Self::from_reader(file, &path.display().to_string())?;
        info!(
            path = %path.display(),
            entries = corpus.len(),
            dimension = corpus.dimension().unwrap_or(0),
            "Corpus loaded"
        );
        Ok(corpus)
    }

    /// Load a corpus from any CSV source. `origin` only labels errors.
    pub fn from_reader<R: Read>(reader: R, origin: &str) -> Result<Self, CorpusError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let read_error = |e: csv::Error| CorpusError::Read {
            path: origin.to_string(),
            reason: e.to_string(),
        };

        let headers = csv_reader.headers().map_err(read_error)?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| CorpusError::MissingColumn(name.to_string()))
        };
        let text_col = column("text")?;
        let embedding_col = column("embedding")?;

        let mut entries = Vec::new();
        for (i, record) in csv_reader.records().enumerate() {
            let row = i + 1;
            let record = record.map_err(read_error)?;
            let text = record.get(text_col).unwrap_or_default().to_string();
            let raw = record.get(embedding_col).unwrap_or_default();
            let embedding = parse_embedding(raw)
                .map_err(|reason| CorpusError::InvalidEmbedding { row, reason })?;
            entries.push(CorpusEntry { text, embedding });
        }

        Self::from_entries(entries)
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimension, or `None` for an empty corpus.
    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|e| e.embedding.len())
    }
}

/// Parse the textual form of an embedding (`[0.1, -0.2, 3e-4]`).
pub fn parse_embedding(raw: &str) -> Result<Vec<f32>, String> {
    let vector: Vec<f32> = serde_json::from_str(raw.trim()).map_err(|e| e.to_string())?;
    if vector.is_empty() {
        return Err("embedding is empty".into());
    }
    Ok(vector)
}
