//! Storage Layer
//!
//! rusqlite-backed persistence. `database` owns the pool and schema;
//! sibling modules add the per-table operations onto [`Database`].

pub mod conversations;
pub mod database;
pub mod events;
pub mod projects;

pub use conversations::{ConversationFilter, ConversationRecord, MatchRecord};
pub use database::Database;
pub use events::EventFilter;
