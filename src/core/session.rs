use crate::core::evidence::EvidenceRegistry;
use crate::core::history::{ConversationStore, SnapshotStore, StorageError};
use crate::core::message::ChatTurn;

/// Everything a chat session remembers: the conversation log, the sources of
/// the latest answer, and the chunks used so far.
pub struct SessionState {
    conversation: ConversationStore,
    evidence: EvidenceRegistry,
}

impl SessionState {
    pub fn new(storage: Box<dyn SnapshotStore>, history_key: impl Into<String>) -> Self {
        Self {
            conversation: ConversationStore::new(storage, history_key),
            evidence: EvidenceRegistry::new(),
        }
    }

    /// Loads the persisted conversation. Evidence is not persisted and starts
    /// empty.
    pub fn restore(&mut self) -> &[ChatTurn] {
        self.conversation.restore()
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut ConversationStore {
        &mut self.conversation
    }

    pub fn evidence(&self) -> &EvidenceRegistry {
        &self.evidence
    }

    pub fn evidence_mut(&mut self) -> &mut EvidenceRegistry {
        &mut self.evidence
    }

    /// Empties the conversation and its snapshot; sources stay as they are.
    pub fn clear_history(&mut self) -> Result<(), StorageError> {
        self.conversation.clear()
    }

    pub fn clear_sources(&mut self) {
        self.evidence.clear();
    }

    /// Full reset: conversation, snapshot, current sources and used set.
    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.evidence.clear();
        self.conversation.clear()
    }
}
