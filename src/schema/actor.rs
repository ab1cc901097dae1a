use serde::{Deserialize, Serialize};

/// Newtype wrapper for actor IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u32);

/// Whether an actor's lines are spoken automatically or chosen by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterType {
    Npc,
    Pc,
}

/// A character that can speak or listen in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    #[serde(default)]
    pub is_player: bool,
    /// Opaque portrait handle, resolved by the presentation layer.
    #[serde(default)]
    pub portrait: Option<String>,
}

impl Actor {
    pub fn character_type(&self) -> CharacterType {
        if self.is_player {
            CharacterType::Pc
        } else {
            CharacterType::Npc
        }
    }
}
