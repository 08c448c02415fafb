//! Token accounting and prompt context.
//!
//! | Piece | Budget | Trim strategy |
//! |-------|--------|---------------|
//! | Conversation history | `budgets.history` | Last turn dropped first |
//! | Stored contexts | `budgets.context` minus current contexts | Last passage dropped first |
//! | Current contexts | `budgets.request` | First-fit in rank order |

pub mod assembler;
pub mod token;
pub mod trim;

pub use assembler::{ContextAssembler, TOP_N, join_passages, select_within_budget};
pub use token::TokenCounter;
pub use trim::{trim_passages, trim_to_budget, trim_turns};
