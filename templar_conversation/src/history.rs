//! Conversation history management.
//!
//! The history is an ordered list of turns whose first entry is always the
//! persona. Everything after it is a sliding window over the most recent
//! dialogue turns.

use templar_core::{ChatMessage, Role};
use tracing::debug;

use crate::error::{ConversationError, Result};

/// Default number of dialogue turns kept behind the persona.
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// Bounded dialogue history anchored by a system persona turn.
///
/// Invariants:
/// - `turns[0]` is the persona and is never removed or changed.
/// - At most `max_history` turns follow it; the oldest go first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: Vec<ChatMessage>,
    max_history: usize,
}

impl ConversationHistory {
    /// Create a history seeded with the persona and the default window.
    pub fn new(persona: &str) -> Result<Self> {
        Self::with_max_history(persona, DEFAULT_MAX_HISTORY)
    }

    /// Create a history seeded with the persona and a custom window size.
    ///
    /// The window must hold at least one turn, otherwise the user turn would
    /// be gone before the model ever saw it.
    pub fn with_max_history(persona: &str, max_history: usize) -> Result<Self> {
        if persona.trim().is_empty() {
            return Err(ConversationError::InvalidPersona);
        }
        if max_history == 0 {
            return Err(ConversationError::InvalidHistoryLimit);
        }

        Ok(Self {
            turns: vec![ChatMessage::system(persona)],
            max_history,
        })
    }

    /// Append a user or assistant turn, then apply the window.
    ///
    /// The stored content is trimmed.
    pub fn append(&mut self, role: Role, text: &str) -> Result<()> {
        if !role.is_dialogue() {
            return Err(ConversationError::InvalidRole(role));
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(ConversationError::EmptyContent(role));
        }

        self.turns.push(ChatMessage::new(role, text));

        let dropped = self.truncate();
        if dropped > 0 {
            debug!(
                dropped,
                kept = self.dialogue_len(),
                "Truncated conversation history"
            );
        }

        Ok(())
    }

    pub fn append_user(&mut self, text: &str) -> Result<()> {
        self.append(Role::User, text)
    }

    pub fn append_assistant(&mut self, text: &str) -> Result<()> {
        self.append(Role::Assistant, text)
    }

    /// Drop the oldest dialogue turns beyond the window. Returns how many went.
    fn truncate(&mut self) -> usize {
        let excess = self.dialogue_len().saturating_sub(self.max_history);
        if excess > 0 {
            self.turns.drain(1..=excess);
        }
        excess
    }

    /// Owned copy of every turn, persona first, for a completion request.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.turns.clone()
    }

    #[must_use]
    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    #[must_use]
    pub fn persona(&self) -> &str {
        &self.turns[0].content
    }

    /// Number of turns after the persona.
    #[must_use]
    pub fn dialogue_len(&self) -> usize {
        self.turns.len() - 1
    }

    #[must_use]
    pub const fn max_history(&self) -> usize {
        self.max_history
    }

    /// Forget the dialogue, keeping the persona.
    pub fn reset(&mut self) {
        self.turns.truncate(1);
    }

    #[must_use]
    pub fn stats(&self) -> HistoryStats {
        let dialogue = &self.turns[1..];
        let total_chars: usize = self.turns.iter().map(|m| m.content.chars().count()).sum();

        HistoryStats {
            dialogue_turns: dialogue.len(),
            user_turns: dialogue.iter().filter(|m| m.role == Role::User).count(),
            assistant_turns: dialogue
                .iter()
                .filter(|m| m.role == Role::Assistant)
                .count(),
            total_characters: total_chars,
            estimated_tokens: total_chars / 4, // Rough estimate: 4 chars per token
        }
    }
}

/// Statistics about conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryStats {
    pub dialogue_turns: usize,
    pub user_turns: usize,
    pub assistant_turns: usize,
    pub total_characters: usize,
    pub estimated_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(history: &ConversationHistory) -> Vec<(Role, &str)> {
        history
            .turns()
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect()
    }

    #[test]
    fn test_new_seeds_persona() {
        let history = ConversationHistory::new("P").unwrap();
        assert_eq!(history.turns().len(), 1);
        assert_eq!(history.turns()[0].role, Role::System);
        assert_eq!(history.persona(), "P");
        assert_eq!(history.max_history(), DEFAULT_MAX_HISTORY);
    }

    #[test]
    fn test_blank_persona_rejected() {
        assert_eq!(
            ConversationHistory::new(""),
            Err(ConversationError::InvalidPersona)
        );
        assert_eq!(
            ConversationHistory::new(" \n\t"),
            Err(ConversationError::InvalidPersona)
        );
    }

    #[test]
    fn test_append_rejects_blank_and_system() {
        let mut history = ConversationHistory::new("P").unwrap();

        assert_eq!(
            history.append(Role::User, "   "),
            Err(ConversationError::EmptyContent(Role::User))
        );
        assert_eq!(
            history.append(Role::System, "new persona"),
            Err(ConversationError::InvalidRole(Role::System))
        );
        assert_eq!(history.dialogue_len(), 0);
    }

    #[test]
    fn test_append_trims_content() {
        let mut history = ConversationHistory::new("P").unwrap();
        history.append_user("  Hello  ").unwrap();
        assert_eq!(history.turns()[1].content, "Hello");
    }

    #[test]
    fn test_count_is_capped_after_every_append() {
        let mut history = ConversationHistory::with_max_history("P", 4).unwrap();

        for i in 0..12 {
            let prior = history.dialogue_len();
            let role = if i % 2 == 0 {
                Role::User
            } else {
                Role::Assistant
            };
            history.append(role, &format!("turn {i}")).unwrap();

            assert_eq!(history.dialogue_len(), (prior + 1).min(4));
            assert_eq!(history.turns()[0].role, Role::System);
            assert_eq!(history.persona(), "P");
        }
    }

    #[test]
    fn test_truncation_evicts_oldest_first() {
        let mut history = ConversationHistory::with_max_history("P", 3).unwrap();
        for i in 0..7 {
            history.append_user(&format!("m{i}")).unwrap();
        }

        assert_eq!(
            contents(&history),
            vec![
                (Role::System, "P"),
                (Role::User, "m4"),
                (Role::User, "m5"),
                (Role::User, "m6"),
            ]
        );
    }

    #[test]
    fn test_window_counts_turns_not_pairs() {
        let mut history = ConversationHistory::with_max_history("P", 2).unwrap();
        for (user, assistant) in [("A", "a1"), ("B", "b1"), ("C", "c1")] {
            history.append_user(user).unwrap();
            history.append_assistant(assistant).unwrap();
        }

        assert_eq!(
            contents(&history),
            vec![
                (Role::System, "P"),
                (Role::User, "C"),
                (Role::Assistant, "c1"),
            ]
        );
    }

    #[test]
    fn test_odd_window_splits_pairs() {
        let mut history = ConversationHistory::with_max_history("P", 3).unwrap();
        for (user, assistant) in [("A", "a1"), ("B", "b1")] {
            history.append_user(user).unwrap();
            history.append_assistant(assistant).unwrap();
        }

        assert_eq!(
            contents(&history),
            vec![
                (Role::System, "P"),
                (Role::Assistant, "a1"),
                (Role::User, "B"),
                (Role::Assistant, "b1"),
            ]
        );
    }

    #[test]
    fn test_zero_window_is_rejected() {
        assert_eq!(
            ConversationHistory::with_max_history("P", 0),
            Err(ConversationError::InvalidHistoryLimit)
        );
    }

    #[test]
    fn test_single_turn_window_keeps_latest_user_turn() {
        let mut history = ConversationHistory::with_max_history("P", 1).unwrap();
        history.append_user("Hello").unwrap();
        history.append_assistant("Hail").unwrap();
        history.append_user("What is the Grail?").unwrap();
        assert_eq!(
            contents(&history),
            vec![(Role::System, "P"), (Role::User, "What is the Grail?")]
        );
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let mut history = ConversationHistory::new("P").unwrap();
        history.append_user("Hello").unwrap();

        let first = history.snapshot();
        let second = history.snapshot();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_reset_keeps_persona() {
        let mut history = ConversationHistory::new("P").unwrap();
        history.append_user("Hello").unwrap();
        history.append_assistant("Greetings").unwrap();

        history.reset();
        assert_eq!(contents(&history), vec![(Role::System, "P")]);
    }

    #[test]
    fn test_history_stats() {
        let mut history = ConversationHistory::new("PPPP").unwrap();
        history.append_user("abcd").unwrap();
        history.append_assistant("efgh").unwrap();
        history.append_user("ijkl").unwrap();

        let stats = history.stats();
        assert_eq!(stats.dialogue_turns, 3);
        assert_eq!(stats.user_turns, 2);
        assert_eq!(stats.assistant_turns, 1);
        assert_eq!(stats.total_characters, 16);
        assert_eq!(stats.estimated_tokens, 4);
    }
}
