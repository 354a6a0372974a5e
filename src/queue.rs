//! Single-flight console command queue.
//!
//! Matched rules are queued per server and drained one at a time, so a burst
//! of chat triggers never interleaves console commands. Entries preserve
//! arrival order within a server; at most one drain runs per server at a time.

use crate::console::ServerKey;
use crate::rules::BindRule;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// One queued rule execution.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub rule: BindRule,
    /// Normalized name of the triggering player
    pub player_name: String,
    /// When the entry was queued, ms since epoch
    pub enqueued_at: u64,
    /// Discord id of the triggering player when the rule was role-gated
    pub discord_id: Option<String>,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: HashMap<ServerKey, VecDeque<QueueEntry>>,
    draining: HashSet<ServerKey>,
}

/// Per-server FIFO with single-flight drain claims.
#[derive(Debug, Default)]
pub struct CommandQueue {
    state: Mutex<QueueState>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        // The lock is only held for map operations; a poisoned guard still
        // holds consistent state.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, server: &ServerKey, entry: QueueEntry) {
        self.lock()
            .pending
            .entry(server.clone())
            .or_default()
            .push_back(entry);
    }

    /// Pop the oldest pending entry for a server.
    pub fn pop(&self, server: &ServerKey) -> Option<QueueEntry> {
        let mut state = self.lock();
        let queue = state.pending.get_mut(server)?;
        let entry = queue.pop_front();
        if queue.is_empty() {
            state.pending.remove(server);
        }
        entry
    }

    /// Claim the drain for a server. Returns false when a drain is already
    /// running or nothing is pending.
    pub fn try_begin_drain(&self, server: &ServerKey) -> bool {
        let mut state = self.lock();
        if state.draining.contains(server) {
            return false;
        }
        if !state.pending.contains_key(server) {
            return false;
        }
        state.draining.insert(server.clone());
        true
    }

    pub fn finish_drain(&self, server: &ServerKey) {
        self.lock().draining.remove(server);
    }

    pub fn pending_count(&self, server: &ServerKey) -> usize {
        self.lock()
            .pending
            .get(server)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// Servers that currently have queued entries.
    pub fn servers_with_pending(&self) -> Vec<ServerKey> {
        self.lock().pending.keys().cloned().collect()
    }
}
