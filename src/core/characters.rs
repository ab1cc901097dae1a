/// Character resolution — maps actor ids to presentable character info.

use crate::core::database::DialogueDatabase;
use crate::schema::actor::{ActorId, CharacterType};

/// Presentable info about a speaker or listener.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterInfo {
    pub id: ActorId,
    pub name: String,
    pub portrait: Option<String>,
    pub is_player: bool,
}

impl CharacterInfo {
    pub fn character_type(&self) -> CharacterType {
        if self.is_player {
            CharacterType::Pc
        } else {
            CharacterType::Npc
        }
    }
}

/// Resolves actor ids to character info.
///
/// `participant` names a scene-side stand-in for the actor (e.g. a
/// specific spawned character); resolvers may use it to override the
/// database defaults.
pub trait CharacterResolver {
    fn resolve(&self, actor: ActorId, participant: Option<&str>) -> CharacterInfo;

    fn character_type(&self, actor: ActorId) -> CharacterType {
        self.resolve(actor, None).character_type()
    }
}

impl<T: CharacterResolver + ?Sized> CharacterResolver for &T {
    fn resolve(&self, actor: ActorId, participant: Option<&str>) -> CharacterInfo {
        (**self).resolve(actor, participant)
    }

    fn character_type(&self, actor: ActorId) -> CharacterType {
        (**self).character_type(actor)
    }
}

/// Resolves characters straight from the database's actor table.
///
/// A participant name that matches another actor takes precedence over
/// the actor id, so one conversation can be replayed with different casts.
#[derive(Debug, Clone, Copy)]
pub struct DatabaseCharacters<'db> {
    database: &'db DialogueDatabase,
}

impl<'db> DatabaseCharacters<'db> {
    pub fn new(database: &'db DialogueDatabase) -> Self {
        Self { database }
    }
}

impl CharacterResolver for DatabaseCharacters<'_> {
    fn resolve(&self, actor: ActorId, participant: Option<&str>) -> CharacterInfo {
        let found = participant
            .and_then(|name| self.database.actor_by_name(name))
            .or_else(|| self.database.actor(actor));

        match found {
            Some(a) => CharacterInfo {
                id: a.id,
                name: participant.unwrap_or(&a.name).to_string(),
                portrait: a.portrait.clone(),
                is_player: a.is_player,
            },
            None => CharacterInfo {
                id: actor,
                name: participant.unwrap_or_default().to_string(),
                portrait: None,
                is_player: false,
            },
        }
    }

    fn character_type(&self, actor: ActorId) -> CharacterType {
        self.database.character_type(actor)
    }
}
