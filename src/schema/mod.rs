pub mod actor;
pub mod conversation;
pub mod entry;
pub mod settings;
