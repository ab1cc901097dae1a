/// Link evaluator — walks an entry's outgoing links and collects the
/// responses that are currently reachable.
///
/// Evaluation rules:
/// - Links are evaluated from the highest priority tier down. Once a tier
///   yields any response, lower tiers are never evaluated.
/// - A destination whose condition is false is blocked, or, if it is
///   marked passthrough, its own links are evaluated in its place.
/// - Group destinations run their script and fan out to their own links;
///   they never appear as responses themselves.
/// - A visited set scoped to one top-level call absorbs cycles. It is
///   shared by passthrough and group recursion, so an entry reachable via
///   two paths in the same evaluation contributes its responses once.

use rustc_hash::FxHashSet;

use crate::core::characters::CharacterResolver;
use crate::core::conversation::ConversationError;
use crate::core::database::DialogueDatabase;
use crate::core::evaluator::{DialogueEvaluator, EvalContext};
use crate::core::state::Response;
use crate::schema::actor::CharacterType;
use crate::schema::entry::{ConditionPriority, DialogueEntry, EntryRef};

/// Caller-supplied rule that can veto an entry whose condition passed.
pub type EntryValidityHook<'a> = dyn Fn(&DialogueEntry) -> bool + 'a;

/// Responses collected from one evaluation, in tier and declared order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkResults {
    pub npc_responses: Vec<Response>,
    pub pc_responses: Vec<Response>,
}

impl LinkResults {
    pub fn is_empty(&self) -> bool {
        self.npc_responses.is_empty() && self.pc_responses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.npc_responses.len() + self.pc_responses.len()
    }

    fn valid_count(&self) -> usize {
        self.npc_responses
            .iter()
            .chain(&self.pc_responses)
            .filter(|r| r.is_valid)
            .count()
    }

    fn append(&mut self, mut other: LinkResults) {
        self.npc_responses.append(&mut other.npc_responses);
        self.pc_responses.append(&mut other.pc_responses);
    }
}

pub struct LinkEvaluator<'a, E: ?Sized, R: ?Sized> {
    database: &'a DialogueDatabase,
    evaluator: &'a mut E,
    characters: &'a R,
    is_entry_valid: Option<&'a EntryValidityHook<'a>>,
    include_invalid_entries: bool,
    allow_evaluation_errors: bool,
}

impl<'a, E, R> LinkEvaluator<'a, E, R>
where
    E: DialogueEvaluator + ?Sized,
    R: CharacterResolver + ?Sized,
{
    pub fn new(database: &'a DialogueDatabase, evaluator: &'a mut E, characters: &'a R) -> Self {
        Self {
            database,
            evaluator,
            characters,
            is_entry_valid: None,
            include_invalid_entries: false,
            allow_evaluation_errors: false,
        }
    }

    pub fn validity_hook(mut self, hook: Option<&'a EntryValidityHook<'a>>) -> Self {
        self.is_entry_valid = hook;
        self
    }

    /// Keep player responses with false conditions, flagged invalid.
    pub fn include_invalid_entries(mut self, include: bool) -> Self {
        self.include_invalid_entries = include;
        self
    }

    /// Propagate evaluator failures instead of treating them as false.
    pub fn allow_evaluation_errors(mut self, allow: bool) -> Self {
        self.allow_evaluation_errors = allow;
        self
    }

    /// Collect every response reachable from `entry`.
    pub fn evaluate(
        &mut self,
        entry: &DialogueEntry,
        stop_at_first_valid: bool,
    ) -> Result<LinkResults, ConversationError> {
        let mut results = LinkResults::default();
        let mut visited = FxHashSet::default();
        self.evaluate_links(entry, &mut results, &mut visited, stop_at_first_valid)?;
        Ok(results)
    }

    fn evaluate_links(
        &mut self,
        entry: &DialogueEntry,
        results: &mut LinkResults,
        visited: &mut FxHashSet<EntryRef>,
        stop_at_first_valid: bool,
    ) -> Result<(), ConversationError> {
        if !visited.insert(entry.id) {
            tracing::debug!(entry = %entry.id, "Cycle absorbed");
            return Ok(());
        }
        for priority in ConditionPriority::DESCENDING {
            self.evaluate_links_at_priority(priority, entry, results, visited, stop_at_first_valid)?;
            if !results.is_empty() {
                return Ok(());
            }
        }
        Ok(())
    }

    fn evaluate_links_at_priority(
        &mut self,
        priority: ConditionPriority,
        entry: &DialogueEntry,
        results: &mut LinkResults,
        visited: &mut FxHashSet<EntryRef>,
        stop_at_first_valid: bool,
    ) -> Result<(), ConversationError> {
        let database = self.database;
        for link in entry.links_at(priority) {
            let Some(destination) = database.entry_for_link(link) else {
                tracing::warn!(
                    source = %entry.id,
                    destination = %link.destination,
                    "Link points to a missing dialogue entry; skipping"
                );
                continue;
            };

            let valid_before = results.valid_count();
            let character_type = self.characters.character_type(destination.actor);
            let is_valid = self.is_valid(destination)?;

            if destination.is_group && is_valid {
                tracing::debug!(entry = %destination.id, title = %destination.title, "Evaluate group");
                self.run_script(destination)?;
                let produced = self.evaluate_group(destination, results, visited, stop_at_first_valid)?;
                if !produced {
                    tracing::debug!(entry = %destination.id, "Group produced no responses");
                }
            } else if !destination.is_group
                && (is_valid || (self.include_invalid_entries && character_type == CharacterType::Pc))
            {
                self.add_response(destination, character_type, is_valid, results);
            } else if destination.is_passthrough_on_false() {
                tracing::debug!(
                    entry = %destination.id,
                    condition = %destination.condition,
                    "Passthrough on false link"
                );
                let mut passed = LinkResults::default();
                self.evaluate_links(destination, &mut passed, visited, stop_at_first_valid)?;
                results.append(passed);
            } else {
                tracing::debug!(
                    entry = %destination.id,
                    condition = %destination.condition,
                    "Block on false link"
                );
            }

            if stop_at_first_valid && results.valid_count() > valid_before {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Fan out from a valid group. Returns whether any response was found.
    fn evaluate_group(
        &mut self,
        group: &DialogueEntry,
        results: &mut LinkResults,
        visited: &mut FxHashSet<EntryRef>,
        stop_at_first_valid: bool,
    ) -> Result<bool, ConversationError> {
        if !visited.insert(group.id) {
            tracing::debug!(entry = %group.id, "Cycle absorbed");
            return Ok(false);
        }
        let mut found = LinkResults::default();
        for priority in ConditionPriority::DESCENDING {
            self.evaluate_links_at_priority(priority, group, &mut found, visited, stop_at_first_valid)?;
            if !found.is_empty() {
                break;
            }
        }
        let produced = !found.is_empty();
        results.append(found);
        Ok(produced)
    }

    fn add_response(
        &mut self,
        destination: &DialogueEntry,
        character_type: CharacterType,
        is_valid: bool,
        results: &mut LinkResults,
    ) {
        tracing::debug!(
            entry = %destination.id,
            actor = destination.actor.0,
            valid = is_valid,
            "Add link"
        );
        match character_type {
            CharacterType::Npc => results.npc_responses.push(Response {
                destination: destination.id,
                formatted_text: destination.line_text.clone(),
                is_valid,
            }),
            CharacterType::Pc => {
                results.pc_responses.push(Response {
                    destination: destination.id,
                    formatted_text: response_text(destination).to_string(),
                    is_valid,
                });
                self.evaluator.mark_offered(destination.id);
            }
        }
    }

    fn is_valid(&mut self, entry: &DialogueEntry) -> Result<bool, ConversationError> {
        if entry.has_condition() {
            let context = EvalContext {
                this_entry: entry.id,
            };
            match self.evaluator.evaluate_condition(&entry.condition, &context) {
                Ok(true) => {}
                Ok(false) => return Ok(false),
                Err(e) if self.allow_evaluation_errors => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(entry = %entry.id, error = %e, "Condition failed; treating as false");
                    return Ok(false);
                }
            }
        }
        Ok(self.is_entry_valid.map_or(true, |hook| hook(entry)))
    }

    fn run_script(&mut self, entry: &DialogueEntry) -> Result<(), ConversationError> {
        run_entry_script(&mut *self.evaluator, entry, self.allow_evaluation_errors)
    }
}

/// Text shown on a player's response button, falling back to the line text.
pub fn response_text(entry: &DialogueEntry) -> &str {
    if entry.response_text.is_empty() {
        &entry.line_text
    } else {
        &entry.response_text
    }
}

/// Run an entry's script. Failures are logged and skipped unless
/// `allow_errors` is set.
pub fn run_entry_script<E>(
    evaluator: &mut E,
    entry: &DialogueEntry,
    allow_errors: bool,
) -> Result<(), ConversationError>
where
    E: DialogueEvaluator + ?Sized,
{
    if entry.script.trim().is_empty() {
        return Ok(());
    }
    let context = EvalContext {
        this_entry: entry.id,
    };
    match evaluator.run_effect(&entry.script, &context) {
        Ok(()) => Ok(()),
        Err(e) if allow_errors => Err(e.into()),
        Err(e) => {
            tracing::warn!(entry = %entry.id, error = %e, "Script failed; continuing");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::characters::DatabaseCharacters;
    use crate::core::evaluator::{EffectError, EvaluationError, MockDialogueEvaluator, SimStatus};
    use crate::core::variables::{Value, VariableTable};
    use crate::schema::actor::{Actor, ActorId};
    use crate::schema::conversation::Conversation;
    use crate::schema::entry::{ConditionPriority::*, ConversationId};

    const PLAYER: ActorId = ActorId(1);
    const NPC: ActorId = ActorId(2);

    fn at(entry: u32) -> EntryRef {
        EntryRef::new(1, entry)
    }

    fn npc(entry: u32) -> DialogueEntry {
        DialogueEntry::new(at(entry), NPC, PLAYER).with_line(format!("npc line {}", entry))
    }

    fn pc(entry: u32) -> DialogueEntry {
        DialogueEntry::new(at(entry), PLAYER, NPC).with_response(format!("choice {}", entry))
    }

    fn group(entry: u32) -> DialogueEntry {
        DialogueEntry::new(at(entry), NPC, PLAYER).group()
    }

    fn make_db(entries: Vec<DialogueEntry>) -> DialogueDatabase {
        let mut db = DialogueDatabase::new();
        db.add_actor(Actor {
            id: PLAYER,
            name: "Player".to_string(),
            is_player: true,
            portrait: None,
        });
        db.add_actor(Actor {
            id: NPC,
            name: "Innkeeper".to_string(),
            is_player: false,
            portrait: None,
        });
        let mut conversation = Conversation::new(ConversationId(1), "Test", PLAYER, NPC);
        for entry in entries {
            conversation.insert(entry).unwrap();
        }
        db.add_conversation(conversation).unwrap();
        db
    }

    fn run(db: &DialogueDatabase, vars: &mut VariableTable, root: u32, stop: bool) -> LinkResults {
        let characters = DatabaseCharacters::new(db);
        let root = db.entry(at(root)).unwrap();
        LinkEvaluator::new(db, vars, &characters)
            .evaluate(root, stop)
            .unwrap()
    }

    fn ids(responses: &[Response]) -> Vec<u32> {
        responses.iter().map(|r| r.destination.entry.0).collect()
    }

    #[test]
    fn higher_tier_shadows_lower_tiers() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal).link_to(at(2), High).link_to(at(3), Normal),
            pc(1),
            pc(2),
            pc(3),
        ]);
        let results = run(&db, &mut VariableTable::new(), 0, false);
        assert_eq!(ids(&results.pc_responses), vec![2]);
        assert!(results.npc_responses.is_empty());
    }

    #[test]
    fn falls_back_when_higher_tier_blocked() {
        let db = make_db(vec![
            pc(0).link_to(at(1), High).link_to(at(2), Normal),
            npc(1).with_condition("false"),
            pc(2),
        ]);
        let results = run(&db, &mut VariableTable::new(), 0, false);
        assert!(results.npc_responses.is_empty());
        assert_eq!(ids(&results.pc_responses), vec![2]);
    }

    #[test]
    fn every_tier_is_consulted_in_order() {
        let db = make_db(vec![
            npc(0)
                .link_to(at(5), Low)
                .link_to(at(4), BelowNormal)
                .link_to(at(1), High)
                .link_to(at(2), AboveNormal),
            pc(1).with_condition("false"),
            pc(2).with_condition("false"),
            pc(4),
            pc(5),
        ]);
        let results = run(&db, &mut VariableTable::new(), 0, false);
        assert_eq!(ids(&results.pc_responses), vec![4]);
    }

    #[test]
    fn npc_and_pc_destinations_are_classified() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal).link_to(at(2), Normal).link_to(at(3), Normal),
            npc(1),
            pc(2),
            npc(3),
        ]);
        let results = run(&db, &mut VariableTable::new(), 0, false);
        assert_eq!(ids(&results.npc_responses), vec![1, 3]);
        assert_eq!(ids(&results.pc_responses), vec![2]);
        assert_eq!(results.npc_responses[0].formatted_text, "npc line 1");
        assert_eq!(results.pc_responses[0].formatted_text, "choice 2");
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn pc_text_falls_back_to_line() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal),
            DialogueEntry::new(at(1), PLAYER, NPC).with_line("I'll take a room."),
        ]);
        let results = run(&db, &mut VariableTable::new(), 0, false);
        assert_eq!(results.pc_responses[0].formatted_text, "I'll take a room.");
    }

    #[test]
    fn back_edge_cycle_terminates() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal),
            npc(1).with_condition("false").passthrough().link_to(at(0), Normal),
        ]);
        let results = run(&db, &mut VariableTable::new(), 0, false);
        // Entry 0 is still a valid destination; only recursion is cut.
        assert_eq!(ids(&results.npc_responses), vec![0]);
    }

    #[test]
    fn passthrough_cycle_terminates_empty() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal),
            npc(1).with_condition("false").passthrough().link_to(at(2), Normal),
            npc(2).with_condition("false").passthrough().link_to(at(1), Normal),
        ]);
        let results = run(&db, &mut VariableTable::new(), 0, false);
        assert!(results.is_empty());
    }

    #[test]
    fn group_cycle_terminates_empty() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal),
            group(1).link_to(at(2), Normal),
            group(2).link_to(at(1), Normal),
        ]);
        let results = run(&db, &mut VariableTable::new(), 0, false);
        assert!(results.is_empty());
    }

    #[test]
    fn self_link_group_terminates() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal),
            group(1).link_to(at(1), Normal).link_to(at(2), Normal),
            pc(2),
        ]);
        let results = run(&db, &mut VariableTable::new(), 0, false);
        assert_eq!(ids(&results.pc_responses), vec![2]);
    }

    #[test]
    fn block_hides_subtree() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal),
            npc(1).with_condition("false").link_to(at(2), Normal).link_to(at(3), Normal),
            pc(2),
            pc(3),
        ]);
        assert!(run(&db, &mut VariableTable::new(), 0, false).is_empty());
    }

    #[test]
    fn passthrough_matches_reattached_links() {
        let through = make_db(vec![
            npc(0).link_to(at(1), Normal),
            npc(1)
                .with_condition("false")
                .passthrough()
                .link_to(at(2), Normal)
                .link_to(at(3), Normal)
                .link_to(at(4), Low),
            pc(2),
            pc(3),
            pc(4),
        ]);
        let reattached = make_db(vec![
            npc(0).link_to(at(2), Normal).link_to(at(3), Normal).link_to(at(4), Low),
            pc(2),
            pc(3),
            pc(4),
        ]);
        let a = run(&through, &mut VariableTable::new(), 0, false);
        let b = run(&reattached, &mut VariableTable::new(), 0, false);
        assert_eq!(ids(&a.pc_responses), vec![2, 3]);
        assert_eq!(a, b);
    }

    #[test]
    fn passthrough_shares_visited_set() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal).link_to(at(2), Normal),
            npc(1).with_condition("false").passthrough().link_to(at(3), Normal),
            npc(2).with_condition("false").passthrough().link_to(at(1), Normal),
            pc(3),
        ]);
        let results = run(&db, &mut VariableTable::new(), 0, false);
        assert_eq!(ids(&results.pc_responses), vec![3]);
    }

    #[test]
    fn valid_group_is_transparent() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal),
            group(1).with_script("fanned += 1").link_to(at(2), Normal).link_to(at(3), Normal),
            pc(2),
            pc(3),
        ]);
        let mut vars = VariableTable::new();
        let results = run(&db, &mut vars, 0, false);
        assert_eq!(ids(&results.pc_responses), vec![2, 3]);
        assert!(results.npc_responses.is_empty());
        assert_eq!(vars.get("fanned"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn group_uses_its_own_tiers() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal),
            group(1).link_to(at(2), Low).link_to(at(3), High),
            pc(2),
            pc(3),
        ]);
        let results = run(&db, &mut VariableTable::new(), 0, false);
        assert_eq!(ids(&results.pc_responses), vec![3]);
    }

    #[test]
    fn empty_group_does_not_stop_lower_tiers() {
        let db = make_db(vec![
            npc(0).link_to(at(1), High).link_to(at(4), Normal),
            group(1).link_to(at(2), Normal).link_to(at(3), Normal),
            pc(2).with_condition("false"),
            pc(3).with_condition("false"),
            pc(4),
        ]);
        let results = run(&db, &mut VariableTable::new(), 0, false);
        assert_eq!(ids(&results.pc_responses), vec![4]);
    }

    #[test]
    fn false_group_blocks_or_passes_through_without_script() {
        let blocked = make_db(vec![
            npc(0).link_to(at(1), Normal),
            group(1).with_condition("false").with_script("ran = true").link_to(at(2), Normal),
            pc(2),
        ]);
        let mut vars = VariableTable::new();
        assert!(run(&blocked, &mut vars, 0, false).is_empty());

        let passing = make_db(vec![
            npc(0).link_to(at(1), Normal),
            group(1)
                .with_condition("false")
                .with_script("ran = true")
                .passthrough()
                .link_to(at(2), Normal),
            pc(2),
        ]);
        let results = run(&passing, &mut vars, 0, false);
        assert_eq!(ids(&results.pc_responses), vec![2]);
        assert_eq!(vars.get("ran"), None);
    }

    #[test]
    fn stop_at_first_valid_returns_one() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal).link_to(at(2), Normal).link_to(at(3), Normal),
            pc(1),
            pc(2),
            pc(3),
        ]);
        let results = run(&db, &mut VariableTable::new(), 0, true);
        assert_eq!(ids(&results.pc_responses), vec![1]);
    }

    #[test]
    fn stop_at_first_valid_skips_invalid_and_reaches_into_groups() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal).link_to(at(2), Normal).link_to(at(5), Normal),
            pc(1).with_condition("false"),
            group(2).link_to(at(3), Normal).link_to(at(4), Normal),
            pc(3),
            pc(4),
            pc(5),
        ]);
        let results = run(&db, &mut VariableTable::new(), 0, true);
        assert_eq!(ids(&results.pc_responses), vec![3]);
    }

    #[test]
    fn include_invalid_entries_keeps_pc_only() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal).link_to(at(2), Normal).link_to(at(3), Normal),
            pc(1).with_condition("false"),
            npc(2).with_condition("false"),
            pc(3),
        ]);
        let mut vars = VariableTable::new();
        let characters = DatabaseCharacters::new(&db);
        let root = db.entry(at(0)).unwrap();
        let results = LinkEvaluator::new(&db, &mut vars, &characters)
            .include_invalid_entries(true)
            .evaluate(root, false)
            .unwrap();
        assert!(results.npc_responses.is_empty());
        assert_eq!(ids(&results.pc_responses), vec![1, 3]);
        assert!(!results.pc_responses[0].is_valid);
        assert!(results.pc_responses[1].is_valid);
    }

    #[test]
    fn offered_responses_are_marked() {
        let db = make_db(vec![npc(0).link_to(at(1), Normal).link_to(at(2), Normal), pc(1), npc(2)]);
        let mut vars = VariableTable::new();
        run(&db, &mut vars, 0, false);
        assert_eq!(vars.sim_status(at(1)), SimStatus::WasOffered);
        assert_eq!(vars.sim_status(at(2)), SimStatus::Untouched);
    }

    #[test]
    fn dangling_link_is_skipped() {
        let db = make_db(vec![npc(0).link_to(at(9), Normal).link_to(at(1), Normal), pc(1)]);
        let results = run(&db, &mut VariableTable::new(), 0, false);
        assert_eq!(ids(&results.pc_responses), vec![1]);
    }

    #[test]
    fn validity_hook_is_anded() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal).link_to(at(2), Normal),
            pc(1).with_title("forbidden"),
            pc(2),
        ]);
        let mut vars = VariableTable::new();
        let characters = DatabaseCharacters::new(&db);
        let hook = |entry: &DialogueEntry| entry.title != "forbidden";
        let root = db.entry(at(0)).unwrap();
        let results = LinkEvaluator::new(&db, &mut vars, &characters)
            .validity_hook(Some(&hook))
            .evaluate(root, false)
            .unwrap();
        assert_eq!(ids(&results.pc_responses), vec![2]);
    }

    #[test]
    fn conditions_see_variables() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal).link_to(at(2), Normal),
            pc(1).with_condition("gold >= 5"),
            pc(2).with_condition("gold < 5"),
        ]);
        let mut vars = VariableTable::new();
        vars.set("gold", 7);
        assert_eq!(ids(&run(&db, &mut vars, 0, false).pc_responses), vec![1]);
        vars.set("gold", 2);
        assert_eq!(ids(&run(&db, &mut vars, 0, false).pc_responses), vec![2]);
    }

    #[test]
    fn condition_failure_is_false_unless_strict() {
        let db = make_db(vec![npc(0).link_to(at(1), Normal), npc(1).with_condition("boom")]);
        let characters = DatabaseCharacters::new(&db);
        let root = db.entry(at(0)).unwrap();

        let mut lenient = MockDialogueEvaluator::new();
        lenient
            .expect_evaluate_condition()
            .times(1)
            .returning(|expr, _| Err(EvaluationError::new(expr, "bad token")));
        let results = LinkEvaluator::new(&db, &mut lenient, &characters)
            .evaluate(root, false)
            .unwrap();
        assert!(results.is_empty());

        let mut strict = MockDialogueEvaluator::new();
        strict
            .expect_evaluate_condition()
            .times(1)
            .returning(|expr, _| Err(EvaluationError::new(expr, "bad token")));
        let err = LinkEvaluator::new(&db, &mut strict, &characters)
            .allow_evaluation_errors(true)
            .evaluate(root, false)
            .unwrap_err();
        assert!(matches!(err, ConversationError::Evaluation(e) if e.expression == "boom"));
    }

    #[test]
    fn group_script_failure_is_skipped_unless_strict() {
        let db = make_db(vec![
            npc(0).link_to(at(1), Normal),
            group(1).with_script("explode()").link_to(at(2), Normal),
            npc(2),
        ]);
        let characters = DatabaseCharacters::new(&db);
        let root = db.entry(at(0)).unwrap();

        let mut lenient = MockDialogueEvaluator::new();
        lenient
            .expect_run_effect()
            .times(1)
            .returning(|script, _| Err(EffectError::new(script, "no such function")));
        let results = LinkEvaluator::new(&db, &mut lenient, &characters)
            .evaluate(root, false)
            .unwrap();
        assert_eq!(ids(&results.npc_responses), vec![2]);

        let mut strict = MockDialogueEvaluator::new();
        strict
            .expect_run_effect()
            .times(1)
            .returning(|script, _| Err(EffectError::new(script, "no such function")));
        let err = LinkEvaluator::new(&db, &mut strict, &characters)
            .allow_evaluation_errors(true)
            .evaluate(root, false)
            .unwrap_err();
        assert!(matches!(err, ConversationError::Effect(_)));
    }

    #[test]
    fn condition_context_names_destination() {
        let db = make_db(vec![npc(0).link_to(at(1), Normal), npc(1).with_condition("thisID == 1")]);
        let results = run(&db, &mut VariableTable::new(), 0, false);
        assert_eq!(ids(&results.npc_responses), vec![1]);
    }
}
