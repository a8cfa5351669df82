//! Scoreboard state and its durable storage.

pub mod board_store;
pub mod memory;
pub mod persistence;

pub use board_store::ScoreboardStore;
pub use memory::MemoryPersistence;
pub use persistence::{BoardMap, BoardPersistence, JsonFilePersistence};
