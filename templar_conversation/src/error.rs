use templar_core::Role;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConversationError>;

/// Errors raised by the conversation store.
///
/// Remote completion failures are not listed here: the responder turns them
/// into a `CompletionOutcome::Failed` instead of an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversationError {
    #[error("Persona text must not be empty")]
    InvalidPersona,

    #[error("History limit must keep at least one dialogue turn")]
    InvalidHistoryLimit,

    #[error("Refusing to append empty {0} turn")]
    EmptyContent(Role),

    #[error("Only user and assistant turns can be appended, got {0}")]
    InvalidRole(Role),
}
