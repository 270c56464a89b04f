use crate::command::OutboundCommand;
use crate::conversation::Conversation;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Hand a command to the outbound sender.
    Transmit(OutboundCommand),
    /// Write the full conversation list to storage.
    PersistConversations(Vec<Conversation>),
}
