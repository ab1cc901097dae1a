/// Predicate & effect evaluator — the contract the engine needs from a
/// condition/script runtime.

use thiserror::Error;

use crate::schema::entry::{ConversationId, EntryRef};

/// A condition expression could not be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("condition '{expression}' failed: {message}")]
pub struct EvaluationError {
    pub expression: String,
    pub message: String,
}

impl EvaluationError {
    pub fn new(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            message: message.into(),
        }
    }
}

/// A script side effect could not be run.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("script '{script}' failed: {message}")]
pub struct EffectError {
    pub script: String,
    pub message: String,
}

impl EffectError {
    pub fn new(script: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            message: message.into(),
        }
    }
}

/// Whether an entry has been shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SimStatus {
    #[default]
    Untouched,
    /// Offered as a player response.
    WasOffered,
    /// Spoken as a line, or chosen by the player.
    WasDisplayed,
}

/// Context passed alongside every condition and script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalContext {
    /// The entry whose condition or script is being evaluated.
    pub this_entry: EntryRef,
}

/// Evaluates conditions and runs scripts against a persistent variable
/// environment.
///
/// Blank conditions and scripts never reach the evaluator.
#[cfg_attr(test, mockall::automock)]
pub trait DialogueEvaluator {
    fn evaluate_condition(
        &mut self,
        expression: &str,
        context: &EvalContext,
    ) -> Result<bool, EvaluationError>;

    fn run_effect(&mut self, script: &str, context: &EvalContext) -> Result<(), EffectError>;

    /// Scope subsequent conditions and scripts to a conversation's table.
    fn set_dialog_table(&mut self, conversation: ConversationId);

    /// Drop the dialog table scope. Used to roll back a failed first step.
    fn clear_dialog_table(&mut self);

    fn mark_displayed(&mut self, entry: EntryRef);

    /// Must not downgrade an entry that was already displayed.
    fn mark_offered(&mut self, entry: EntryRef);

    fn sim_status(&self, entry: EntryRef) -> SimStatus;

    /// For callers and scripts that gate on whether a choice was ever shown.
    /// The engine's own old-response tagging keys on `WasDisplayed` instead.
    fn has_been_offered(&self, entry: EntryRef) -> bool {
        self.sim_status(entry) != SimStatus::Untouched
    }
}

impl<T: DialogueEvaluator + ?Sized> DialogueEvaluator for &mut T {
    fn evaluate_condition(
        &mut self,
        expression: &str,
        context: &EvalContext,
    ) -> Result<bool, EvaluationError> {
        (**self).evaluate_condition(expression, context)
    }

    fn run_effect(&mut self, script: &str, context: &EvalContext) -> Result<(), EffectError> {
        (**self).run_effect(script, context)
    }

    fn set_dialog_table(&mut self, conversation: ConversationId) {
        (**self).set_dialog_table(conversation)
    }

    fn clear_dialog_table(&mut self) {
        (**self).clear_dialog_table()
    }

    fn mark_displayed(&mut self, entry: EntryRef) {
        (**self).mark_displayed(entry)
    }

    fn mark_offered(&mut self, entry: EntryRef) {
        (**self).mark_offered(entry)
    }

    fn sim_status(&self, entry: EntryRef) -> SimStatus {
        (**self).sim_status(entry)
    }

    fn has_been_offered(&self, entry: EntryRef) -> bool {
        (**self).has_been_offered(entry)
    }
}

impl<T: DialogueEvaluator + ?Sized> DialogueEvaluator for Box<T> {
    fn evaluate_condition(
        &mut self,
        expression: &str,
        context: &EvalContext,
    ) -> Result<bool, EvaluationError> {
        (**self).evaluate_condition(expression, context)
    }

    fn run_effect(&mut self, script: &str, context: &EvalContext) -> Result<(), EffectError> {
        (**self).run_effect(script, context)
    }

    fn set_dialog_table(&mut self, conversation: ConversationId) {
        (**self).set_dialog_table(conversation)
    }

    fn clear_dialog_table(&mut self) {
        (**self).clear_dialog_table()
    }

    fn mark_displayed(&mut self, entry: EntryRef) {
        (**self).mark_displayed(entry)
    }

    fn mark_offered(&mut self, entry: EntryRef) {
        (**self).mark_offered(entry)
    }

    fn sim_status(&self, entry: EntryRef) -> SimStatus {
        (**self).sim_status(entry)
    }

    fn has_been_offered(&self, entry: EntryRef) -> bool {
        (**self).has_been_offered(entry)
    }
}
