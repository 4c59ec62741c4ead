//! Reference adapters for the orchestrator's ports

pub mod memory_cache;
pub mod memory_store;

pub use memory_cache::MokaResultCache;
pub use memory_store::MemoryScanStore;
