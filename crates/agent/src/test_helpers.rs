//! Shared test helpers for agent tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use helperbot_core::error::ProviderError;
use helperbot_core::message::Turn;
use helperbot_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};
use helperbot_memory::{Corpus, CorpusEntry};

/// A provider with a fixed query embedding and a queue of scripted completions.
///
/// Each call to `complete` pops the next scripted reply.
/// Panics if more completions are requested than were scripted.
pub struct ScriptedProvider {
    embedding: Vec<f32>,
    embed_fails: bool,
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    embed_calls: Mutex<usize>,
}

impl ScriptedProvider {
    pub fn new(embedding: Vec<f32>) -> Self {
        Self {
            embedding,
            embed_fails: false,
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            embed_calls: Mutex::new(0),
        }
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, err: ProviderError) -> Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn failing_embeddings(mut self) -> Self {
        self.embed_fails = true;
        self
    }

    pub fn complete_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn embed_calls(&self) -> usize {
        *self.embed_calls.lock().unwrap()
    }

    /// The most recent completion request.
    pub fn last_request(&self) -> ProviderRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no completion request recorded")
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedProvider: no more scripted replies");
        let text = next?;
        Ok(ProviderResponse {
            message: Turn::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model,
        })
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        *self.embed_calls.lock().unwrap() += 1;
        if self.embed_fails {
            return Err(ProviderError::Network("embedding endpoint unreachable".into()));
        }
        Ok(EmbeddingResponse {
            embeddings: vec![self.embedding.clone()],
            model: request.model,
            usage: None,
        })
    }
}

/// The two-passage corpus used across retrieval tests.
pub fn hackathon_corpus() -> Corpus {
    Corpus::from_entries(vec![
        CorpusEntry::new("A2SV is a talent accelerator", vec![1.0, 0.0]),
        CorpusEntry::new("Hackathon starts in May", vec![0.0, 1.0]),
    ])
    .expect("uniform dimensions")
}
