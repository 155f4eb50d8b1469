//! Authenticated append-only binary hash trees

mod cursor;
mod history;
mod merkle;
mod pruned;
mod store;

pub use cursor::NodeCursor;
pub use history::HistoryTree;
pub use merkle::MerkleTree;
pub use pruned::PrunedTree;
pub use store::{AppendStore, MapStore, NodeStore, VecStore};

pub(crate) use history::walk_historical_agg;
