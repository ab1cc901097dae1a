/// Conversation state machine — tracks where an active conversation is and
/// builds the state for each step.
///
/// Following an entry marks it displayed, switches the evaluator's dialog
/// table when the conversation id changes, runs the entry's script and then
/// evaluates its links. Engine-owned bookkeeping is only committed once a
/// step has fully succeeded, so a failed step in strict mode leaves the
/// previous state current.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::core::characters::{CharacterInfo, CharacterResolver};
use crate::core::database::{DatabaseError, DialogueDatabase};
use crate::core::evaluator::{DialogueEvaluator, EffectError, EvaluationError};
use crate::core::links::{response_text, run_entry_script, EntryValidityHook, LinkEvaluator, LinkResults};
use crate::core::responses::ResponseClassifier;
use crate::core::state::{ConversationState, Response, Subtitle};
use crate::schema::actor::{ActorId, CharacterType};
use crate::schema::entry::{ConversationId, DialogueEntry, EntryId, EntryRef};
use crate::schema::settings::ResponseDisplaySettings;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("condition error: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error("script error: {0}")]
    Effect(#[from] EffectError),
    #[error("conversation not found: {0:?}")]
    ConversationNotFound(ConversationId),
    #[error("no conversation titled '{0}'")]
    ConversationTitleNotFound(String),
    #[error("dialogue entry not found: {0}")]
    EntryNotFound(EntryRef),
    #[error("cannot force a link to group entry {0}")]
    ForcedLinkToGroup(EntryRef),
    #[error("no conversation has been started")]
    NotStarted,
}

/// Bookkeeping for the conversation in progress.
#[derive(Debug, Clone)]
struct Session {
    conversation: ConversationId,
    current: EntryRef,
    dialog_table: Option<ConversationId>,
    settings: ResponseDisplaySettings,
    actor: CharacterInfo,
    conversant: CharacterInfo,
    characters: FxHashMap<ActorId, CharacterInfo>,
    first_state: ConversationState,
    state: ConversationState,
}

impl Session {
    fn character_info<R>(&mut self, resolver: &R, actor: ActorId) -> CharacterInfo
    where
        R: CharacterResolver + ?Sized,
    {
        self.characters
            .entry(actor)
            .or_insert_with(|| resolver.resolve(actor, None))
            .clone()
    }
}

/// Runs one conversation at a time over a dialogue database.
/// Built via `ConversationModel::builder()`.
pub struct ConversationModel<'db, E, R> {
    database: &'db DialogueDatabase,
    evaluator: E,
    characters: R,
    settings: ResponseDisplaySettings,
    is_entry_valid: Option<Box<EntryValidityHook<'db>>>,
    allow_evaluation_errors: bool,
    initial_entry: Option<EntryId>,
    stop_at_first_valid: bool,
    skip_execution: bool,
    actor_participant: Option<String>,
    conversant_participant: Option<String>,
    forced_link: Option<EntryRef>,
    session: Option<Session>,
}

/// Builder for constructing a `ConversationModel`.
pub struct ConversationModelBuilder<'db, E, R> {
    database: &'db DialogueDatabase,
    evaluator: E,
    characters: R,
    settings: ResponseDisplaySettings,
    is_entry_valid: Option<Box<EntryValidityHook<'db>>>,
    allow_evaluation_errors: bool,
    initial_entry: Option<EntryId>,
    stop_at_first_valid: bool,
    skip_execution: bool,
    actor_participant: Option<String>,
    conversant_participant: Option<String>,
}

impl<'db, E, R> ConversationModel<'db, E, R>
where
    E: DialogueEvaluator,
    R: CharacterResolver,
{
    pub fn builder(
        database: &'db DialogueDatabase,
        evaluator: E,
        characters: R,
    ) -> ConversationModelBuilder<'db, E, R> {
        ConversationModelBuilder {
            database,
            evaluator,
            characters,
            settings: ResponseDisplaySettings::default(),
            is_entry_valid: None,
            allow_evaluation_errors: false,
            initial_entry: None,
            stop_at_first_valid: false,
            skip_execution: false,
            actor_participant: None,
            conversant_participant: None,
        }
    }

    /// Start a conversation at its START entry, or at the configured
    /// initial entry, replacing any conversation in progress.
    pub fn start(&mut self, conversation_id: ConversationId) -> Result<ConversationState, ConversationError> {
        let database = self.database;
        let conversation = database
            .conversation(conversation_id)
            .ok_or(ConversationError::ConversationNotFound(conversation_id))?;
        let entry = match self.initial_entry {
            Some(id) => conversation.entry(id),
            None => conversation.first_entry(),
        }
        .ok_or(ConversationError::EntryNotFound(EntryRef {
            conversation: conversation_id,
            entry: self.initial_entry.unwrap_or(EntryId::START),
        }))?;

        let actor = self
            .characters
            .resolve(conversation.actor, self.actor_participant.as_deref());
        let conversant = self
            .characters
            .resolve(conversation.conversant, self.conversant_participant.as_deref());
        // Lines name the declared actor ids, so the cast is cached under those too.
        let mut characters = FxHashMap::default();
        characters.insert(actor.id, actor.clone());
        characters.insert(conversant.id, conversant.clone());
        characters.insert(conversation.actor, actor.clone());
        characters.insert(conversation.conversant, conversant.clone());

        let mut session = Session {
            conversation: conversation_id,
            current: entry.id,
            dialog_table: self.session.as_ref().and_then(|s| s.dialog_table),
            settings: conversation.override_settings.unwrap_or(self.settings),
            actor,
            conversant,
            characters,
            first_state: ConversationState::terminal(),
            state: ConversationState::terminal(),
        };

        tracing::debug!(
            conversation_id = conversation_id.0,
            title = %conversation.title,
            entry = %entry.id,
            "Start conversation"
        );
        let state = self.follow(&mut session, entry, self.stop_at_first_valid, self.skip_execution)?;
        session.first_state = state.clone();
        self.commit(session, &state);
        Ok(state)
    }

    pub fn start_by_title(&mut self, title: &str) -> Result<ConversationState, ConversationError> {
        let conversation = self
            .database
            .conversation_by_title(title)
            .ok_or_else(|| ConversationError::ConversationTitleNotFound(title.to_string()))?;
        self.start(conversation.id)
    }

    /// Move to the chosen response's destination.
    pub fn advance(&mut self, response: &Response) -> Result<ConversationState, ConversationError> {
        self.advance_to(response.destination)
    }

    /// Move to an entry, running its script and evaluating its links.
    ///
    /// A destination missing from the database ends the conversation.
    pub fn advance_to(&mut self, destination: EntryRef) -> Result<ConversationState, ConversationError> {
        let database = self.database;
        let mut session = self.session.clone().ok_or(ConversationError::NotStarted)?;
        let Some(entry) = database.entry(destination) else {
            tracing::warn!(%destination, "Response points to a missing dialogue entry; ending conversation");
            return Ok(ConversationState::terminal());
        };

        if entry.id.conversation != session.current.conversation {
            self.update_participants_on_linked_conversation(&mut session, entry.id.conversation);
        }
        session.current = entry.id;
        let state = self.follow(&mut session, entry, false, false)?;
        self.commit(session, &state);
        Ok(state)
    }

    /// Re-evaluate the responses of an already current entry without
    /// running its script again.
    pub fn refresh_responses(&mut self, state: &ConversationState) -> Result<ConversationState, ConversationError> {
        let Some(entry_ref) = state.entry else {
            return Ok(state.clone());
        };
        let database = self.database;
        let entry = database
            .entry(entry_ref)
            .ok_or(ConversationError::EntryNotFound(entry_ref))?;
        let settings = match &self.session {
            Some(session) => session.settings,
            None => self.settings_for(entry_ref.conversation),
        };

        let responses = self.evaluate_responses(settings, entry, false)?;
        let refreshed = ConversationState {
            npc_responses: responses.npc_responses,
            pc_responses: responses.pc_responses,
            ..state.clone()
        };
        if let Some(session) = self.session.as_mut() {
            if session.current == entry_ref {
                session.state = refreshed.clone();
            }
        }
        Ok(refreshed)
    }

    /// Make the next followed entry offer `destination` as its only
    /// response instead of evaluating its links.
    ///
    /// Group entries are never responses, so they can't be forced.
    pub fn force_next_link_to(&mut self, destination: EntryRef) -> Result<(), ConversationError> {
        let entry = self
            .database
            .entry(destination)
            .ok_or(ConversationError::EntryNotFound(destination))?;
        if entry.is_group {
            return Err(ConversationError::ForcedLinkToGroup(destination));
        }
        self.forced_link = Some(destination);
        Ok(())
    }

    /// Abandon the conversation in progress.
    pub fn end(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::debug!(conversation_id = session.conversation.0, "End conversation");
        }
        self.forced_link = None;
    }

    /// Whether the started conversation has anything to show.
    pub fn has_valid_entry(&self) -> bool {
        self.session.as_ref().map_or(false, |session| {
            session.first_state.has_any_responses()
                || session
                    .first_state
                    .entry
                    .map_or(false, |entry| entry.entry != EntryId::START)
        })
    }

    /// The player's name in this conversation, if it has a player.
    pub fn pc_name(&self) -> Option<&str> {
        let session = self.session.as_ref()?;
        if self.database.is_player(session.actor.id) {
            return Some(&session.actor.name);
        }
        if self.database.is_player(session.conversant.id) {
            return Some(&session.conversant.name);
        }
        let conversation = self.database.conversation(session.current.conversation)?;
        conversation
            .entries()
            .iter()
            .filter_map(|entry| self.database.actor(entry.actor))
            .find(|actor| actor.is_player)
            .map(|actor| actor.name.as_str())
    }

    /// Replace the cached info for an actor, e.g. when a different
    /// character takes over the role mid-conversation.
    pub fn override_character_info(
        &mut self,
        actor: ActorId,
        participant: Option<&str>,
    ) -> Result<CharacterInfo, ConversationError> {
        let session = self.session.as_mut().ok_or(ConversationError::NotStarted)?;
        let info = self.characters.resolve(actor, participant);
        session.characters.insert(actor, info.clone());
        let declared = self.database.conversation(session.conversation);
        if session.actor.id == actor || declared.map_or(false, |c| c.actor == actor) {
            session.actor = info.clone();
        }
        if session.conversant.id == actor || declared.map_or(false, |c| c.conversant == actor) {
            session.conversant = info.clone();
        }
        Ok(info)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn current_entry(&self) -> Option<EntryRef> {
        self.session.as_ref().map(|s| s.current)
    }

    pub fn current_state(&self) -> Option<&ConversationState> {
        self.session.as_ref().map(|s| &s.state)
    }

    pub fn first_state(&self) -> Option<&ConversationState> {
        self.session.as_ref().map(|s| &s.first_state)
    }

    pub fn actor_info(&self) -> Option<&CharacterInfo> {
        self.session.as_ref().map(|s| &s.actor)
    }

    pub fn conversant_info(&self) -> Option<&CharacterInfo> {
        self.session.as_ref().map(|s| &s.conversant)
    }

    /// Display settings in effect: the started conversation's override or
    /// the global settings.
    pub fn settings(&self) -> ResponseDisplaySettings {
        self.session.as_ref().map_or(self.settings, |s| s.settings)
    }

    pub fn database(&self) -> &'db DialogueDatabase {
        self.database
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut E {
        &mut self.evaluator
    }

    fn settings_for(&self, conversation: ConversationId) -> ResponseDisplaySettings {
        self.database
            .conversation(conversation)
            .and_then(|c| c.override_settings)
            .unwrap_or(self.settings)
    }

    fn commit(&mut self, mut session: Session, state: &ConversationState) {
        session.state = state.clone();
        self.session = Some(session);
        self.forced_link = None;
    }

    fn follow(
        &mut self,
        session: &mut Session,
        entry: &DialogueEntry,
        stop_at_first_valid: bool,
        skip_execution: bool,
    ) -> Result<ConversationState, ConversationError> {
        let previous_table = session.dialog_table;
        let result = self.build_state(session, entry, stop_at_first_valid, skip_execution);
        if result.is_err() && session.dialog_table != previous_table {
            match previous_table {
                Some(table) => self.evaluator.set_dialog_table(table),
                None => self.evaluator.clear_dialog_table(),
            }
        }
        result
    }

    fn build_state(
        &mut self,
        session: &mut Session,
        entry: &DialogueEntry,
        stop_at_first_valid: bool,
        skip_execution: bool,
    ) -> Result<ConversationState, ConversationError> {
        self.evaluator.mark_displayed(entry.id);
        let conversation = entry.id.conversation;
        if session.dialog_table != Some(conversation) {
            tracing::debug!(conversation_id = conversation.0, "Switch dialog table");
            self.evaluator.set_dialog_table(conversation);
            session.dialog_table = Some(conversation);
        }
        if !skip_execution {
            run_entry_script(&mut self.evaluator, entry, self.allow_evaluation_errors)?;
        }

        let speaker = session.character_info(&self.characters, entry.actor);
        let listener = session.character_info(&self.characters, entry.conversant);
        let current_line = (!entry.is_group).then(|| Subtitle {
            entry: entry.id,
            speaker,
            listener,
            text: entry.line_text.clone(),
        });

        let responses = match self.forced_link {
            Some(forced) => self.forced_responses(forced),
            None => self.evaluate_responses(session.settings, entry, stop_at_first_valid)?,
        };

        Ok(ConversationState {
            entry: Some(entry.id),
            current_line,
            npc_responses: responses.npc_responses,
            pc_responses: responses.pc_responses,
            is_group: entry.is_group,
        })
    }

    fn evaluate_responses(
        &mut self,
        settings: ResponseDisplaySettings,
        entry: &DialogueEntry,
        stop_at_first_valid: bool,
    ) -> Result<LinkResults, ConversationError> {
        let mut results = LinkEvaluator::new(self.database, &mut self.evaluator, &self.characters)
            .validity_hook(self.is_entry_valid.as_deref())
            .include_invalid_entries(settings.include_invalid_entries)
            .allow_evaluation_errors(self.allow_evaluation_errors)
            .evaluate(entry, stop_at_first_valid)?;
        results.pc_responses =
            ResponseClassifier::new(&settings).format_pc_responses(results.pc_responses, &self.evaluator);
        Ok(results)
    }

    fn forced_responses(&self, forced: EntryRef) -> LinkResults {
        let mut results = LinkResults::default();
        let Some(entry) = self.database.entry(forced) else {
            tracing::warn!(destination = %forced, "Forced link points to a missing dialogue entry");
            return results;
        };
        tracing::debug!(entry = %entry.id, "Follow forced link");
        match self.characters.character_type(entry.actor) {
            CharacterType::Npc => results.npc_responses.push(Response {
                destination: entry.id,
                formatted_text: entry.line_text.clone(),
                is_valid: true,
            }),
            CharacterType::Pc => results.pc_responses.push(Response {
                destination: entry.id,
                formatted_text: response_text(entry).to_string(),
                is_valid: true,
            }),
        }
        results
    }

    /// Swap in the linked conversation's player if it differs from ours.
    fn update_participants_on_linked_conversation(&self, session: &mut Session, conversation_id: ConversationId) {
        let Some(conversation) = self.database.conversation(conversation_id) else {
            return;
        };
        if conversation.actor != session.actor.id && self.database.is_player(conversation.actor) {
            session.actor = session.character_info(&self.characters, conversation.actor);
            tracing::debug!(actor = %session.actor.name, "Linked conversation changes player actor");
            return;
        }
        if conversation.conversant != session.conversant.id && self.database.is_player(conversation.conversant) {
            session.conversant = session.character_info(&self.characters, conversation.conversant);
            tracing::debug!(conversant = %session.conversant.name, "Linked conversation changes player conversant");
        }
    }
}

impl<'db, E, R> ConversationModelBuilder<'db, E, R>
where
    E: DialogueEvaluator,
    R: CharacterResolver,
{
    pub fn settings(mut self, settings: ResponseDisplaySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Extra rule ANDed with every destination's condition.
    pub fn validity_hook(mut self, hook: impl Fn(&DialogueEntry) -> bool + 'db) -> Self {
        self.is_entry_valid = Some(Box::new(hook));
        self
    }

    /// Propagate evaluator failures to the caller instead of treating
    /// them as false conditions and skipped scripts.
    pub fn allow_evaluation_errors(mut self, allow: bool) -> Self {
        self.allow_evaluation_errors = allow;
        self
    }

    pub fn initial_entry(mut self, entry: EntryId) -> Self {
        self.initial_entry = Some(entry);
        self
    }

    /// Only offer the first valid response of the starting entry.
    pub fn stop_at_first_valid(mut self, stop: bool) -> Self {
        self.stop_at_first_valid = stop;
        self
    }

    /// Don't run the starting entry's script.
    pub fn skip_execution(mut self, skip: bool) -> Self {
        self.skip_execution = skip;
        self
    }

    /// Cast a named character as the conversation's actor.
    pub fn actor(mut self, participant: impl Into<String>) -> Self {
        self.actor_participant = Some(participant.into());
        self
    }

    pub fn conversant(mut self, participant: impl Into<String>) -> Self {
        self.conversant_participant = Some(participant.into());
        self
    }

    pub fn build(self) -> ConversationModel<'db, E, R> {
        ConversationModel {
            database: self.database,
            evaluator: self.evaluator,
            characters: self.characters,
            settings: self.settings,
            is_entry_valid: self.is_entry_valid,
            allow_evaluation_errors: self.allow_evaluation_errors,
            initial_entry: self.initial_entry,
            stop_at_first_valid: self.stop_at_first_valid,
            skip_execution: self.skip_execution,
            actor_participant: self.actor_participant,
            conversant_participant: self.conversant_participant,
            forced_link: None,
            session: None,
        }
    }
}
