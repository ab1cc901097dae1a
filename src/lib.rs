//! Dialogue Engine — branching conversation evaluation for games.
//!
//! Given a directed graph of dialogue entries and a current position in it,
//! decides which line to present and which responses are currently valid,
//! honoring link priorities, pass-through conditions and group entries.
//! Conditions and scripts are delegated to a pluggable evaluator.

pub mod core;
pub mod schema;
