//! Explicit metrics context
//!
//! Queues and verifiers accept a shared `Arc<Metrics>` instead of reporting
//! into process-wide state; callers that don't care pass a fresh one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters shared between batch queues and verifiers
#[derive(Debug, Default)]
pub struct Metrics {
    batches: AtomicU64,
    signatures: AtomicU64,
    messages_signed: AtomicU64,
    pk_verifications: AtomicU64,
    splice_confirms: AtomicU64,
    cache_hits: AtomicU64,
    expirations: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Metrics> {
        Arc::new(Metrics::default())
    }

    /// Batches processed by signing queues
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Public-key signatures produced
    pub fn signatures(&self) -> u64 {
        self.signatures.load(Ordering::Relaxed)
    }

    /// Messages handed a signed blob
    pub fn messages_signed(&self) -> u64 {
        self.messages_signed.load(Ordering::Relaxed)
    }

    /// Public-key verification operations performed
    pub fn pk_verifications(&self) -> u64 {
        self.pk_verifications.load(Ordering::Relaxed)
    }

    /// Splice edges confirmed by hash comparison
    pub fn splice_confirms(&self) -> u64 {
        self.splice_confirms.load(Ordering::Relaxed)
    }

    /// Verification-cache hits
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Entries or groups forced out by the expiration policy
    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    pub(crate) fn incr_batches(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_signatures(&self) {
        self.signatures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_messages_signed(&self, n: u64) {
        self.messages_signed.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn incr_pk_verifications(&self) {
        self.pk_verifications.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_splice_confirms(&self) {
        self.splice_confirms.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_expirations(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }
}
