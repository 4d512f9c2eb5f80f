//! Shared vector primitives for tier routing: patches, similarity and time decay

mod decay;
mod io;
mod similarity;
mod types;

pub use decay::TimeDecay;
pub use io::{atomic_write, atomic_write_via, temp_path_for};
pub use similarity::{cosine_similarity, dot, l2_norm, normalize};
pub use types::{truncate_to_millis, Patch, Tier};
