pub mod manager;
pub mod migration;
pub mod store;

pub use manager::HoldingRepository;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
