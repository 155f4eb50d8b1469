//! Error types for batchsig

use thiserror::Error;

/// Result type alias for batchsig operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in batchsig operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Tree is empty")]
    EmptyTree,

    #[error("Leaf {leaf} does not exist at version {version}")]
    MissingLeaf { leaf: u64, version: u64 },

    #[error("No aggregate stored for node (layer {layer}, index {index})")]
    MissingAggregate { layer: u8, index: u64 },

    #[error("No value stored for leaf {0}")]
    MissingValue(u64),

    #[error("Version {requested} is newer than tree version {current}")]
    FutureVersion { requested: u64, current: u64 },

    #[error("Malformed proof: {0}")]
    MalformedProof(String),

    #[error("Tree is frozen and cannot be modified")]
    Frozen,

    #[error("Root aggregate requested before freeze")]
    NotFrozen,

    #[error("Invalid key material: {0}")]
    InvalidKey(String),
}
