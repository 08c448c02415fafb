//! The answering side of helperbot.
//!
//! 1. **Count** tokens with the model's own encoding
//! 2. **Trim** cached history and contexts to their budgets
//! 3. **Assemble** the current query's contexts from the ranked corpus
//! 4. **Ask** the completion endpoint and record the exchange

pub mod context;
pub mod orchestrator;

#[cfg(test)]
mod test_helpers;

pub use context::{ContextAssembler, TOP_N, TokenCounter, trim_to_budget};
pub use orchestrator::{AnswerOrchestrator, OrchestratorSettings, render_prompt};
