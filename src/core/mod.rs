pub mod characters;
pub mod conversation;
pub mod database;
pub mod evaluator;
pub mod links;
pub mod responses;
pub mod state;
pub mod variables;
