//! Session stores for tether.
//!
//! - `FileSessionStore`: one JSON file per session key, atomic saves
//! - `InMemorySessionStore`: ephemeral, for tests and one-shot runs

pub mod file;
pub mod in_memory;

pub use file::FileSessionStore;
pub use in_memory::{InMemorySessionStore, SessionRecord};
