use crate::conversation::ConversationId;

/// The one "active conversation" pointer.
///
/// Conversation-scoped events read it at the moment they are applied, so a
/// reply always lands wherever the user is now, not where they were when the
/// request went out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CorrelationRegister {
    active: Option<ConversationId>,
}

impl CorrelationRegister {
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub(crate) fn select(&mut self, id: ConversationId) {
        self.active = Some(id);
    }

    pub(crate) fn clear(&mut self) {
        self.active = None;
    }

    /// Clears the pointer if it points at `id`. Returns whether it did.
    pub(crate) fn release(&mut self, id: &str) -> bool {
        if self.active.as_deref() == Some(id) {
            self.active = None;
            true
        } else {
            false
        }
    }
}
