/// Conversation state snapshots handed to the presentation layer.

use crate::core::characters::CharacterInfo;
use crate::schema::entry::EntryRef;

/// The line being presented: who says it, to whom, and the text.
#[derive(Debug, Clone, PartialEq)]
pub struct Subtitle {
    pub entry: EntryRef,
    pub speaker: CharacterInfo,
    pub listener: CharacterInfo,
    pub text: String,
}

/// A candidate next entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Never a group entry.
    pub destination: EntryRef,
    pub formatted_text: String,
    /// False means shown but currently blocked.
    pub is_valid: bool,
}

/// An immutable snapshot of one step of a conversation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversationState {
    /// The entry this state was built for, if any.
    pub entry: Option<EntryRef>,
    /// Absent for group entries and for the terminal state.
    pub current_line: Option<Subtitle>,
    /// Lines the engine will auto-advance to; the first is the best.
    pub npc_responses: Vec<Response>,
    /// Choices offered to the player.
    pub pc_responses: Vec<Response>,
    pub is_group: bool,
}

impl ConversationState {
    /// The state that ends a conversation.
    pub fn terminal() -> Self {
        Self::default()
    }

    pub fn is_terminal(&self) -> bool {
        self.current_line.is_none() && !self.has_any_responses()
    }

    pub fn has_any_responses(&self) -> bool {
        self.has_npc_response() || self.has_pc_responses()
    }

    pub fn has_npc_response(&self) -> bool {
        !self.npc_responses.is_empty()
    }

    pub fn has_pc_responses(&self) -> bool {
        !self.pc_responses.is_empty()
    }

    pub fn first_npc_response(&self) -> Option<&Response> {
        self.npc_responses.first()
    }

    /// A single valid player response can be taken without showing a menu.
    pub fn has_pc_auto_response(&self) -> bool {
        self.pc_responses.len() == 1 && self.pc_responses[0].is_valid
    }
}
