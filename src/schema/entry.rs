use serde::{Deserialize, Serialize};
use std::fmt;

use super::actor::ActorId;

/// Newtype wrapper for conversation IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub u32);

/// Newtype wrapper for entry IDs, unique within one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u32);

impl EntryId {
    /// The conventional id of a conversation's root entry.
    pub const START: EntryId = EntryId(0);
}

/// Globally unique identity of a dialogue entry: `(conversation, entry)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryRef {
    pub conversation: ConversationId,
    pub entry: EntryId,
}

impl EntryRef {
    pub fn new(conversation: u32, entry: u32) -> Self {
        Self {
            conversation: ConversationId(conversation),
            entry: EntryId(entry),
        }
    }
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.conversation.0, self.entry.0)
    }
}

/// Priority tier of a link. Tiers are evaluated from `High` down to `Low`
/// and a lower tier is only consulted when every higher tier came up empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConditionPriority {
    Low,
    BelowNormal,
    Normal,
    AboveNormal,
    High,
}

impl Default for ConditionPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl ConditionPriority {
    /// All tiers, highest first.
    pub const DESCENDING: [ConditionPriority; 5] = [
        Self::High,
        Self::AboveNormal,
        Self::Normal,
        Self::BelowNormal,
        Self::Low,
    ];
}

/// What happens when an entry is a link destination and its condition is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FalseConditionAction {
    /// Stop exploring the link.
    Block,
    /// Treat the entry as transparent and evaluate its own links.
    Passthrough,
}

impl Default for FalseConditionAction {
    fn default() -> Self {
        Self::Block
    }
}

/// A directed, prioritized edge to another entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub destination: EntryRef,
    pub priority: ConditionPriority,
}

/// A single line or decision point in a dialogue graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueEntry {
    pub id: EntryRef,
    pub title: String,
    pub actor: ActorId,
    pub conversant: ActorId,
    /// Group entries carry no presentable text and only fan out to their links.
    pub is_group: bool,
    /// Empty means always true.
    pub condition: String,
    /// Side effect run when the entry becomes current or a group is passed through.
    pub script: String,
    pub false_condition_action: FalseConditionAction,
    /// Text spoken when this entry is the current line.
    pub line_text: String,
    /// Text shown on a response button when this entry is offered to the player.
    pub response_text: String,
    pub outgoing_links: Vec<Link>,
}

impl DialogueEntry {
    /// Create an entry with empty text, no condition and no links.
    pub fn new(id: EntryRef, actor: ActorId, conversant: ActorId) -> Self {
        Self {
            id,
            title: String::new(),
            actor,
            conversant,
            is_group: false,
            condition: String::new(),
            script: String::new(),
            false_condition_action: FalseConditionAction::Block,
            line_text: String::new(),
            response_text: String::new(),
            outgoing_links: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_line(mut self, text: impl Into<String>) -> Self {
        self.line_text = text.into();
        self
    }

    pub fn with_response(mut self, text: impl Into<String>) -> Self {
        self.response_text = text.into();
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = condition.into();
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }

    pub fn group(mut self) -> Self {
        self.is_group = true;
        self
    }

    pub fn passthrough(mut self) -> Self {
        self.false_condition_action = FalseConditionAction::Passthrough;
        self
    }

    /// Append a link to `destination` at the given priority.
    pub fn link_to(mut self, destination: EntryRef, priority: ConditionPriority) -> Self {
        self.outgoing_links.push(Link {
            destination,
            priority,
        });
        self
    }

    /// False when the condition is blank, which always passes.
    pub fn has_condition(&self) -> bool {
        !self.condition.trim().is_empty()
    }

    pub fn is_passthrough_on_false(&self) -> bool {
        self.false_condition_action == FalseConditionAction::Passthrough
    }

    /// Links declared at exactly the given tier, in declared order.
    pub fn links_at(&self, priority: ConditionPriority) -> impl Iterator<Item = &Link> {
        self.outgoing_links
            .iter()
            .filter(move |link| link.priority == priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry() -> DialogueEntry {
        DialogueEntry::new(EntryRef::new(1, 5), ActorId(2), ActorId(1))
            .with_title("Greeting")
            .with_line("Welcome, traveler.")
            .link_to(EntryRef::new(1, 6), ConditionPriority::High)
            .link_to(EntryRef::new(1, 7), ConditionPriority::Normal)
            .link_to(EntryRef::new(1, 8), ConditionPriority::High)
    }

    #[test]
    fn entry_defaults() {
        let entry = DialogueEntry::new(EntryRef::new(1, 0), ActorId(1), ActorId(2));
        assert!(!entry.is_group);
        assert!(!entry.has_condition());
        assert_eq!(entry.false_condition_action, FalseConditionAction::Block);
        assert!(entry.outgoing_links.is_empty());
    }

    #[test]
    fn blank_condition_is_not_a_condition() {
        let entry = make_entry().with_condition("   ");
        assert!(!entry.has_condition());
        let entry = make_entry().with_condition("gold > 5");
        assert!(entry.has_condition());
    }

    #[test]
    fn links_at_filters_by_tier_in_declared_order() {
        let entry = make_entry();
        let high: Vec<_> = entry
            .links_at(ConditionPriority::High)
            .map(|l| l.destination)
            .collect();
        assert_eq!(high, vec![EntryRef::new(1, 6), EntryRef::new(1, 8)]);
        assert_eq!(entry.links_at(ConditionPriority::Low).count(), 0);
    }

    #[test]
    fn priority_order() {
        assert!(ConditionPriority::High > ConditionPriority::AboveNormal);
        assert!(ConditionPriority::Normal > ConditionPriority::BelowNormal);
        assert_eq!(ConditionPriority::DESCENDING[0], ConditionPriority::High);
        assert_eq!(ConditionPriority::DESCENDING[4], ConditionPriority::Low);
        assert_eq!(ConditionPriority::default(), ConditionPriority::Normal);
    }

    #[test]
    fn entry_ref_display() {
        assert_eq!(EntryRef::new(3, 14).to_string(), "3:14");
    }

    #[test]
    fn passthrough_builder() {
        let entry = make_entry().passthrough().group();
        assert!(entry.is_passthrough_on_false());
        assert!(entry.is_group);
    }
}
