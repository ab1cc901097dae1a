/// Entry store — read-only indexed storage of actors, conversations and entries.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::Path;
use thiserror::Error;

use crate::schema::actor::{Actor, ActorId, CharacterType};
use crate::schema::conversation::Conversation;
use crate::schema::entry::{
    ConditionPriority, ConversationId, DialogueEntry, EntryId, EntryRef, FalseConditionAction,
    Link,
};
use crate::schema::settings::ResponseDisplaySettings;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("duplicate actor id {0:?}")]
    DuplicateActor(ActorId),
    #[error("duplicate conversation id {0:?}")]
    DuplicateConversation(ConversationId),
    #[error("duplicate dialogue entry {0}")]
    DuplicateEntry(EntryRef),
}

/// All dialogue data for a game. Immutable while conversations run.
#[derive(Debug, Clone, Default)]
pub struct DialogueDatabase {
    actors: FxHashMap<ActorId, Actor>,
    conversations: FxHashMap<ConversationId, Conversation>,
}

/// Findings from [`DialogueDatabase::lint`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LintReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

// RON deserialization helpers — links in RON are relative to their
// conversation and ids are bare integers, so we need intermediate structs.

#[derive(Debug, Deserialize)]
struct RonDatabase {
    #[serde(default)]
    actors: Vec<RonActor>,
    #[serde(default)]
    conversations: Vec<RonConversation>,
}

#[derive(Debug, Deserialize)]
struct RonActor {
    id: u32,
    name: String,
    #[serde(default)]
    is_player: bool,
    #[serde(default)]
    portrait: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RonConversation {
    id: u32,
    title: String,
    actor: u32,
    conversant: u32,
    #[serde(default)]
    override_settings: Option<ResponseDisplaySettings>,
    #[serde(default)]
    entries: Vec<RonEntry>,
}

#[derive(Debug, Deserialize)]
struct RonEntry {
    id: u32,
    #[serde(default)]
    title: String,
    actor: u32,
    conversant: u32,
    #[serde(default)]
    is_group: bool,
    #[serde(default)]
    condition: String,
    #[serde(default)]
    script: String,
    #[serde(default)]
    false_condition_action: FalseConditionAction,
    #[serde(default)]
    line: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    links: Vec<RonLink>,
}

#[derive(Debug, Deserialize)]
struct RonLink {
    /// Defaults to the conversation that declares the link.
    #[serde(default)]
    conversation: Option<u32>,
    entry: u32,
    #[serde(default)]
    priority: ConditionPriority,
}

impl RonConversation {
    fn into_conversation(self) -> Result<Conversation, DatabaseError> {
        let conversation_id = ConversationId(self.id);
        let mut conversation = Conversation::new(
            conversation_id,
            self.title,
            ActorId(self.actor),
            ActorId(self.conversant),
        );
        conversation.override_settings = self.override_settings;

        for raw in self.entries {
            let entry = DialogueEntry {
                id: EntryRef {
                    conversation: conversation_id,
                    entry: EntryId(raw.id),
                },
                title: raw.title,
                actor: ActorId(raw.actor),
                conversant: ActorId(raw.conversant),
                is_group: raw.is_group,
                condition: raw.condition,
                script: raw.script,
                false_condition_action: raw.false_condition_action,
                line_text: raw.line,
                response_text: raw.response,
                outgoing_links: raw
                    .links
                    .into_iter()
                    .map(|link| Link {
                        destination: EntryRef {
                            conversation: link
                                .conversation
                                .map(ConversationId)
                                .unwrap_or(conversation_id),
                            entry: EntryId(link.entry),
                        },
                        priority: link.priority,
                    })
                    .collect(),
            };
            conversation
                .insert(entry)
                .map_err(|dup| DatabaseError::DuplicateEntry(dup.id))?;
        }

        Ok(conversation)
    }
}

impl DialogueDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a database from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<DialogueDatabase, DatabaseError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a database from a RON string.
    pub fn parse_ron(input: &str) -> Result<DialogueDatabase, DatabaseError> {
        let raw: RonDatabase = ron::from_str(input)?;
        let mut database = DialogueDatabase::new();

        for actor in raw.actors {
            let id = ActorId(actor.id);
            if database.actors.contains_key(&id) {
                return Err(DatabaseError::DuplicateActor(id));
            }
            database.add_actor(Actor {
                id,
                name: actor.name,
                is_player: actor.is_player,
                portrait: actor.portrait,
            });
        }

        for conversation in raw.conversations {
            database.add_conversation(conversation.into_conversation()?)?;
        }

        tracing::debug!(
            actors = database.actors.len(),
            conversations = database.conversations.len(),
            "Parsed dialogue database"
        );
        Ok(database)
    }

    /// Register an actor, replacing any actor with the same id.
    pub fn add_actor(&mut self, actor: Actor) {
        self.actors.insert(actor.id, actor);
    }

    pub fn add_conversation(&mut self, conversation: Conversation) -> Result<(), DatabaseError> {
        if self.conversations.contains_key(&conversation.id) {
            return Err(DatabaseError::DuplicateConversation(conversation.id));
        }
        self.conversations.insert(conversation.id, conversation);
        Ok(())
    }

    /// Merge another database into this one. Actors and conversations from
    /// `other` override those in `self` with the same id.
    pub fn merge(&mut self, other: DialogueDatabase) {
        for (id, actor) in other.actors {
            self.actors.insert(id, actor);
        }
        for (id, conversation) in other.conversations {
            self.conversations.insert(id, conversation);
        }
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    pub fn actor_by_name(&self, name: &str) -> Option<&Actor> {
        self.actors().into_iter().find(|a| a.name == name)
    }

    /// Actors sorted by id.
    pub fn actors(&self) -> Vec<&Actor> {
        let mut actors: Vec<&Actor> = self.actors.values().collect();
        actors.sort_by_key(|a| a.id);
        actors
    }

    pub fn is_player(&self, id: ActorId) -> bool {
        self.actors.get(&id).map(|a| a.is_player).unwrap_or(false)
    }

    /// Unknown actors are treated as NPCs.
    pub fn character_type(&self, id: ActorId) -> CharacterType {
        if self.is_player(id) {
            CharacterType::Pc
        } else {
            CharacterType::Npc
        }
    }

    pub fn conversation(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.get(&id)
    }

    pub fn conversation_by_title(&self, title: &str) -> Option<&Conversation> {
        self.conversations().into_iter().find(|c| c.title == title)
    }

    /// Conversations sorted by id.
    pub fn conversations(&self) -> Vec<&Conversation> {
        let mut conversations: Vec<&Conversation> = self.conversations.values().collect();
        conversations.sort_by_key(|c| c.id);
        conversations
    }

    /// Look up an entry. Missing ids yield `None`, never an error.
    pub fn entry(&self, id: EntryRef) -> Option<&DialogueEntry> {
        self.conversations.get(&id.conversation)?.entry(id.entry)
    }

    /// The root entry of a conversation.
    pub fn first_entry(&self, conversation: ConversationId) -> Option<&DialogueEntry> {
        self.conversations.get(&conversation)?.first_entry()
    }

    pub fn entry_for_link(&self, link: &Link) -> Option<&DialogueEntry> {
        self.entry(link.destination)
    }

    /// Check the graph for data-integrity problems.
    ///
    /// Errors: dangling links, conversations without a root entry.
    /// Warnings: undefined actors, empty groups, entries unreachable from
    /// any conversation root.
    pub fn lint(&self) -> LintReport {
        let mut report = LintReport::default();

        for conversation in self.conversations() {
            if conversation.first_entry().is_none() {
                report.errors.push(format!(
                    "Conversation {} '{}' has no START entry",
                    conversation.id.0, conversation.title
                ));
            }

            for entry in conversation.entries() {
                for link in &entry.outgoing_links {
                    if self.entry(link.destination).is_none() {
                        report.errors.push(format!(
                            "Entry {} links to missing entry {}",
                            entry.id, link.destination
                        ));
                    }
                }

                if entry.is_group && entry.outgoing_links.is_empty() {
                    report
                        .warnings
                        .push(format!("Group entry {} has no links", entry.id));
                }

                if !self.actors.is_empty() {
                    for actor in [entry.actor, entry.conversant] {
                        if !self.actors.contains_key(&actor) {
                            report.warnings.push(format!(
                                "Entry {} references undefined actor {}",
                                entry.id, actor.0
                            ));
                        }
                    }
                }
            }
        }

        let reachable = self.reachable_entries();
        for conversation in self.conversations() {
            for entry in conversation.entries() {
                if !reachable.contains(&entry.id) {
                    report
                        .warnings
                        .push(format!("Entry {} is unreachable", entry.id));
                }
            }
        }

        report
    }

    fn reachable_entries(&self) -> FxHashSet<EntryRef> {
        let mut seen = FxHashSet::default();
        let mut queue: VecDeque<EntryRef> = self
            .conversations
            .values()
            .filter_map(|c| c.first_entry())
            .map(|e| e.id)
            .collect();

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(entry) = self.entry(id) {
                queue.extend(entry.outgoing_links.iter().map(|l| l.destination));
            }
        }
        seen
    }
}
