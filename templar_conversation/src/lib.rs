#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Persona-anchored conversation state for the Templar knight.
//!
//! # Key Features
//! - Bounded dialogue history pinned to an immutable persona turn
//! - Sliding-window truncation by turn count
//! - A responder that turns one utterance into one reply and never fails
//! - Shared or per-sender history scoping, with bounded per-sender state

mod error;
mod history;
mod registry;
mod responder;

pub use error::{ConversationError, Result};
pub use history::{ConversationHistory, DEFAULT_MAX_HISTORY, HistoryStats};
pub use registry::{ConversationRegistry, HistoryScope, SenderLimits};
pub use responder::{
    CompletionOutcome, ERROR_INDICATOR, FAILURE_APOLOGY, KnightResponder, PROMPT_FOR_INPUT,
    ReplyOutcome, ResponderConfig,
};
