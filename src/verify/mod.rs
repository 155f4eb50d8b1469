//! Receiving-side verification, eager and lazy

mod cache;
mod eager;
mod lazy;

pub(crate) use cache::VerifyCache;

pub use eager::EagerVerifier;
pub use lazy::{
    LazyVerifier, VerifiedCallback, DEFAULT_MAX_ENTRIES_PER_GROUP, DEFAULT_MAX_GROUPS,
};
