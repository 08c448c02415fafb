//! # Helperbot Core
//!
//! Domain types, traits, and error definitions for the helperbot
//! retrieval-augmented assistant. It defines the domain model that all
//! other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping the hosted LLM endpoint or chat transport via configuration
//! - Easy testing with scripted/recording doubles
//! - Clean dependency graph (all crates depend inward on core)

pub mod assistant;
pub mod channel;
pub mod error;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use assistant::Assistant;
pub use channel::{Channel, ChannelId, ChannelMessage, SentMessage};
pub use error::{Error, Result};
pub use message::{ContextPassage, ConversationId, Role, Turn};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
