//! In-memory prompt/response history.

use crate::core::types::ConversationTurn;

/// Ordered record of conversation turns.
///
/// Unbounded and without deduplication; callers that need a cap must wrap it.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    turns: Vec<ConversationTurn>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// Snapshot of every turn in insertion order.
    pub fn all(&self) -> Vec<ConversationTurn> {
        self.turns.clone()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
