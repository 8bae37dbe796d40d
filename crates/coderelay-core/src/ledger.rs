//! Delivery ledger: the set of identifiers already dispatched.
//!
//! A ledger only grows within a session. An identifier is recorded once a
//! send attempt has been handed off, whether or not it later succeeds, which
//! gives at-most-once delivery.

use std::collections::HashSet;
use std::hash::Hash;

use sha2::{Digest, Sha256};

use crate::types::CaptureId;

/// Set of identifiers already sent on one capture stream.
#[derive(Debug, Clone)]
pub struct DeliveryLedger<K = CaptureId> {
    sent: HashSet<K>,
}

impl<K: Eq + Hash> Default for DeliveryLedger<K> {
    fn default() -> Self {
        Self {
            sent: HashSet::new(),
        }
    }
}

impl<K: Eq + Hash> DeliveryLedger<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` has already been dispatched.
    pub fn contains(&self, key: &K) -> bool {
        self.sent.contains(key)
    }

    /// Record `key` as dispatched. Returns false if it was already present.
    pub fn mark(&mut self, key: K) -> bool {
        self.sent.insert(key)
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

/// Ledger key for a file pushed by the relay endpoint: path plus content hash,
/// so an unchanged file is mirrored once and an edited one again.
pub fn file_fingerprint(file_path: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{}#{}", file_path, hex::encode(&hasher.finalize()[..16]))
}
