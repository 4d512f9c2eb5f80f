//! Persistent, time-decaying patch memory with compaction

pub mod codec;
mod compactor;
mod config;
mod error;
mod policy;
mod store;

pub use compactor::{compact_patches, CompactionOutcome, CompactionResult, CompactionSettings};
pub use config::VectorStoreConfig;
pub use error::StoreError;
pub use policy::{DualSinglePolicy, MatchKind, MatchPolicy, PatchMatch, ScoredPatch};
pub use store::{PatchStore, StoreStats};
