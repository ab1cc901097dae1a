use rustc_hash::FxHashMap;

use super::actor::ActorId;
use super::entry::{ConversationId, DialogueEntry, EntryId};
use super::settings::ResponseDisplaySettings;

/// Title that marks a conversation's root entry.
pub const START_TITLE: &str = "START";

/// A named dialogue graph: a set of entries addressed by entry id.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    /// Primary participant, usually the player.
    pub actor: ActorId,
    /// The other participant, usually the NPC being talked to.
    pub conversant: ActorId,
    /// Replaces the global display settings while this conversation is started.
    pub override_settings: Option<ResponseDisplaySettings>,
    entries: Vec<DialogueEntry>,
    index: FxHashMap<EntryId, usize>,
}

impl Conversation {
    pub fn new(id: ConversationId, title: impl Into<String>, actor: ActorId, conversant: ActorId) -> Self {
        Self {
            id,
            title: title.into(),
            actor,
            conversant,
            override_settings: None,
            entries: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Add an entry, returning it back if its id is already taken or it
    /// belongs to another conversation.
    pub fn insert(&mut self, entry: DialogueEntry) -> Result<(), DialogueEntry> {
        if entry.id.conversation != self.id || self.index.contains_key(&entry.id.entry) {
            return Err(entry);
        }
        self.index.insert(entry.id.entry, self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    pub fn entry(&self, id: EntryId) -> Option<&DialogueEntry> {
        self.index.get(&id).map(|&i| &self.entries[i])
    }

    /// The root entry: the one titled `START`, falling back to entry id 0.
    pub fn first_entry(&self) -> Option<&DialogueEntry> {
        self.entries
            .iter()
            .find(|e| e.title == START_TITLE)
            .or_else(|| self.entry(EntryId::START))
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[DialogueEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::entry::EntryRef;

    fn make_conversation() -> Conversation {
        let mut conv = Conversation::new(ConversationId(1), "Tavern", ActorId(1), ActorId(2));
        conv.insert(DialogueEntry::new(EntryRef::new(1, 0), ActorId(1), ActorId(2)))
            .unwrap();
        conv.insert(DialogueEntry::new(EntryRef::new(1, 1), ActorId(2), ActorId(1)).with_line("Hi"))
            .unwrap();
        conv
    }

    #[test]
    fn lookup_by_id() {
        let conv = make_conversation();
        assert_eq!(conv.entry(EntryId(1)).unwrap().line_text, "Hi");
        assert!(conv.entry(EntryId(9)).is_none());
    }

    #[test]
    fn duplicate_entry_rejected() {
        let mut conv = make_conversation();
        let dup = DialogueEntry::new(EntryRef::new(1, 1), ActorId(2), ActorId(1));
        assert!(conv.insert(dup).is_err());
        assert_eq!(conv.entries().len(), 2);
    }

    #[test]
    fn foreign_entry_rejected() {
        let mut conv = make_conversation();
        let stray = DialogueEntry::new(EntryRef::new(2, 5), ActorId(2), ActorId(1));
        let rejected = conv.insert(stray).unwrap_err();
        assert_eq!(rejected.id, EntryRef::new(2, 5));
        assert!(conv.entry(EntryId(5)).is_none());
        assert_eq!(conv.entries().len(), 2);
    }

    #[test]
    fn first_entry_falls_back_to_zero() {
        let conv = make_conversation();
        assert_eq!(conv.first_entry().unwrap().id.entry, EntryId(0));
    }

    #[test]
    fn first_entry_prefers_start_title() {
        let mut conv = make_conversation();
        conv.insert(
            DialogueEntry::new(EntryRef::new(1, 7), ActorId(1), ActorId(2)).with_title(START_TITLE),
        )
        .unwrap();
        assert_eq!(conv.first_entry().unwrap().id.entry, EntryId(7));
    }
}
