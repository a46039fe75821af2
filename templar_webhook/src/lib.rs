#![deny(
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

//! Instagram and X adapters for the Templar knight.

mod error;
mod graph;
mod handler;
pub mod instagram;
mod rate_limit;
mod server;
pub mod x;

pub use error::{Error, Result};
pub use graph::{GraphClient, ReplySink};
pub use handler::{
    ChatPayload, ChatReply, CrcResponse, MentionCursor, MentionsProcessed, WebhookState, XState,
    webhook_router,
};
pub use rate_limit::RateLimiter;
pub use server::{serve, socket_addr};
pub use x::{MentionSource, XClient, XCredentials};
