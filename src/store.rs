//! Server-authoritative replicated key/value stores
//!
//! A `ReplicatedMap` has exactly one writer (the server). Every mutation bumps
//! a per-store sequence number and is published as a `Delta` carrying the key
//! and the resulting value, so observers never re-derive state from diffs.
//! A `Replica` is the read-only observer side: it applies deltas by sequence
//! and ignores anything it has already seen.
//!
//! Keys iterate in `Ord` order. Player ids are ULIDs, which sort by creation
//! time, so iteration order is join order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use tokio::sync::{broadcast, watch};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Set,
    Removed,
}

/// A single mutation as seen by observers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Delta<K, V> {
    pub seq: u64,
    pub key: K,
    /// Resulting value (None when removed)
    pub value: Option<V>,
    pub kind: ChangeKind,
}

/// Full contents of a store at a given sequence number
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreSnapshot<K, V> {
    pub seq: u64,
    pub entries: Vec<(K, V)>,
}

pub struct ReplicatedMap<K, V> {
    name: &'static str,
    entries: BTreeMap<K, V>,
    seq: u64,
    deltas: broadcast::Sender<Delta<K, V>>,
    seq_tx: watch::Sender<u64>,
}

impl<K, V> ReplicatedMap<K, V>
where
    K: Ord + Clone + Debug,
    V: Clone + Debug,
{
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (deltas, _rx) = broadcast::channel(capacity);
        let (seq_tx, _seq_rx) = watch::channel(0);
        Self {
            name,
            entries: BTreeMap::new(),
            seq: 0,
            deltas,
            seq_tx,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Write a value, publishing the change to every observer
    pub fn set(&mut self, key: K, value: V) -> Delta<K, V> {
        let kind = if self.entries.contains_key(&key) {
            ChangeKind::Set
        } else {
            ChangeKind::Added
        };
        self.entries.insert(key.clone(), value.clone());
        self.publish(key, Some(value), kind)
    }

    /// Write a value only if the key is absent
    pub fn insert_once(&mut self, key: K, value: V) -> Option<Delta<K, V>> {
        if self.entries.contains_key(&key) {
            return None;
        }
        Some(self.set(key, value))
    }

    pub fn remove(&mut self, key: &K) -> Option<Delta<K, V>> {
        self.entries.remove(key)?;
        Some(self.publish(key.clone(), None, ChangeKind::Removed))
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn snapshot(&self) -> StoreSnapshot<K, V> {
        StoreSnapshot {
            seq: self.seq,
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Ordered stream of every future mutation
    pub fn subscribe(&self) -> broadcast::Receiver<Delta<K, V>> {
        self.deltas.subscribe()
    }

    /// Latest sequence number, for waiting on "any mutation after N"
    pub fn watch_seq(&self) -> watch::Receiver<u64> {
        self.seq_tx.subscribe()
    }

    fn publish(&mut self, key: K, value: Option<V>, kind: ChangeKind) -> Delta<K, V> {
        self.seq += 1;
        let delta = Delta {
            seq: self.seq,
            key,
            value,
            kind,
        };
        tracing::debug!(store = self.name, seq = self.seq, ?delta.key, ?delta.kind, "store mutation");

        // No subscribers is fine
        let _ = self.deltas.send(delta.clone());
        self.seq_tx.send_replace(self.seq);
        delta
    }
}

impl<K> ReplicatedMap<K, u32>
where
    K: Ord + Clone + Debug,
{
    /// Add to a counter (missing keys start at zero)
    pub fn increment(&mut self, key: &K, by: u32) -> Delta<K, u32> {
        let value = self.entries.get(key).copied().unwrap_or(0).saturating_add(by);
        self.set(key.clone(), value)
    }
}

/// Observer-side copy of a `ReplicatedMap`
#[derive(Debug, Clone)]
pub struct Replica<K, V> {
    entries: BTreeMap<K, V>,
    seq: u64,
}

impl<K, V> Default for Replica<K, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            seq: 0,
        }
    }
}

impl<K, V> Replica<K, V>
where
    K: Ord + Clone + Debug,
    V: Clone,
{
    /// Apply a delta; returns false if it was already seen
    pub fn apply(&mut self, delta: &Delta<K, V>) -> bool {
        if delta.seq <= self.seq {
            return false;
        }
        if delta.seq > self.seq + 1 {
            tracing::debug!(
                "Replica skipped from seq {} to {} (key {:?})",
                self.seq,
                delta.seq,
                delta.key
            );
        }
        match &delta.value {
            Some(value) => {
                self.entries.insert(delta.key.clone(), value.clone());
            }
            None => {
                self.entries.remove(&delta.key);
            }
        }
        self.seq = delta.seq;
        true
    }

    /// Replace contents with a snapshot unless we already hold newer state
    pub fn load_snapshot(&mut self, snapshot: &StoreSnapshot<K, V>) -> bool {
        if snapshot.seq < self.seq {
            return false;
        }
        self.entries = snapshot.entries.iter().cloned().collect();
        self.seq = snapshot.seq;
        true
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}
