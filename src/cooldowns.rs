//! Per-rule cooldown tracking.
//!
//! Each successful bind fire records a timestamp under a structured key of
//! (guild, server, normalized player, trigger). Internally the key is a proper
//! struct; on disk it stays the legacy composite string
//! `guildId_serverId_playerName_triggerMessage` so existing `cooldowns.json`
//! documents keep loading. Parsing the composite form back is done against the
//! rule registry, matching the trigger as a suffix, so player names or triggers
//! that themselves contain underscores still resolve correctly.

use crate::rules::RuleRegistry;
use crate::storage;
use crate::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Format a remaining cooldown as `D:HH:MM`.
pub fn format_cooldown(milliseconds: u64) -> String {
    let days = milliseconds / (24 * 60 * 60 * 1000);
    let hours = (milliseconds % (24 * 60 * 60 * 1000)) / (60 * 60 * 1000);
    let minutes = (milliseconds % (60 * 60 * 1000)) / (60 * 1000);
    format!("{}:{:02}:{:02}", days, hours, minutes)
}

/// Structured cooldown key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CooldownKey {
    pub guild_id: String,
    pub server_id: String,
    /// Normalized player name
    pub player: String,
    /// The owning rule's trigger message
    pub trigger: String,
}

impl CooldownKey {
    pub fn new(
        guild_id: impl Into<String>,
        server_id: impl Into<String>,
        player: impl Into<String>,
        trigger: impl Into<String>,
    ) -> Self {
        Self {
            guild_id: guild_id.into(),
            server_id: server_id.into(),
            player: player.into(),
            trigger: trigger.into(),
        }
    }

    /// Legacy composite form used in the persisted document.
    pub fn to_wire(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.guild_id, self.server_id, self.player, self.trigger
        )
    }

    /// Parse a legacy composite key by consulting the rule registry.
    ///
    /// Guild and server ids never contain underscores, so the first two
    /// components split unambiguously. The remainder is `player_trigger`;
    /// among the server's rules, the longest trigger that matches as an
    /// `_`-separated suffix wins. Returns the key and the owning rule's
    /// cooldown duration.
    pub fn from_wire(wire: &str, registry: &RuleRegistry) -> Option<(Self, u64)> {
        let (guild_id, rest) = wire.split_once('_')?;
        let (server_id, remainder) = rest.split_once('_')?;

        let mut best: Option<(Self, u64)> = None;
        for rule in registry.list(guild_id, server_id) {
            let suffix = format!("_{}", rule.message);
            if let Some(player) = remainder.strip_suffix(&suffix) {
                if player.is_empty() {
                    continue;
                }
                let better = best
                    .as_ref()
                    .map(|(key, _)| rule.message.len() > key.trigger.len())
                    .unwrap_or(true);
                if better {
                    best = Some((
                        Self::new(guild_id, server_id, player, rule.message.clone()),
                        rule.cooldown,
                    ));
                }
            }
        }
        best
    }
}

/// Tracks last-fired timestamps per cooldown key; persisted to `cooldowns.json`.
#[derive(Debug)]
pub struct CooldownStore {
    path: PathBuf,
    entries: HashMap<CooldownKey, u64>,
}

impl CooldownStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remaining cooldown in milliseconds; 0 when the rule may fire.
    pub fn check(&self, key: &CooldownKey, cooldown_ms: u64, now_ms: u64) -> u64 {
        let last = match self.entries.get(key) {
            Some(ts) => *ts,
            None => return 0,
        };
        let elapsed = now_ms.saturating_sub(last);
        cooldown_ms.saturating_sub(elapsed)
    }

    /// Record a successful fire at `now_ms`.
    pub fn record(&mut self, key: CooldownKey, now_ms: u64) {
        self.entries.insert(key, now_ms);
    }

    /// Remove an entry. Logs and returns false when no entry existed.
    pub fn reset(&mut self, key: &CooldownKey) -> bool {
        if self.entries.remove(key).is_some() {
            info!(key = %key.to_wire(), "cooldown reset");
            true
        } else {
            info!(key = %key.to_wire(), "no active cooldown to reset");
            false
        }
    }

    /// Snapshot in the legacy wire format.
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.entries
            .iter()
            .map(|(key, ts)| (key.to_wire(), *ts))
            .collect()
    }

    /// Load `cooldowns.json`, keeping only entries whose owning rule still
    /// exists and whose age is still within that rule's cooldown.
    pub async fn load_and_prune(&mut self, registry: &RuleRegistry, now_ms: u64) -> Result<()> {
        let Some(doc) = storage::load_json::<HashMap<String, u64>>(&self.path).await? else {
            return Ok(());
        };

        let mut entries = HashMap::new();
        for (wire, timestamp) in doc {
            match CooldownKey::from_wire(&wire, registry) {
                Some((key, cooldown_ms)) => {
                    if now_ms.saturating_sub(timestamp) < cooldown_ms {
                        entries.insert(key, timestamp);
                    } else {
                        debug!(key = %wire, "dropping expired cooldown entry");
                    }
                }
                None => {
                    warn!(key = %wire, "dropping cooldown entry for unknown rule");
                }
            }
        }

        info!(count = entries.len(), "cooldowns loaded");
        self.entries = entries;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::BindRule;

    fn key() -> CooldownKey {
        CooldownKey::new("g", "s", "Bob", "kit")
    }

    #[test]
    fn test_check_without_entry_is_zero() {
        let store = CooldownStore::new("/tmp/unused-cooldowns.json");
        assert_eq!(store.check(&key(), 60_000, 1_000), 0);
    }

    #[test]
    fn test_check_boundary() {
        let mut store = CooldownStore::new("/tmp/unused-cooldowns.json");
        let t0 = 1_000_000;
        let cooldown = 60_000;
        store.record(key(), t0);

        assert!(store.check(&key(), cooldown, t0 + cooldown - 1) > 0);
        assert_eq!(store.check(&key(), cooldown, t0 + cooldown), 0);
        assert_eq!(store.check(&key(), cooldown, t0 + cooldown + 1), 0);
    }

    #[test]
    fn test_reset() {
        let mut store = CooldownStore::new("/tmp/unused-cooldowns.json");
        store.record(key(), 5);
        assert!(store.reset(&key()));
        assert!(!store.reset(&key()));
        assert_eq!(store.check(&key(), 60_000, 10), 0);
    }

    #[test]
    fn test_wire_key_round_trip_with_underscores() {
        let mut registry = RuleRegistry::new("/tmp/unused-binds.json");
        let mut rule = BindRule::command("free kit_now", "kit give {PlayerName}");
        rule.cooldown = 60_000;
        registry.add("g", "s", rule);

        let original = CooldownKey::new("g", "s", "\"Bob_Smith\"", "free kit_now");
        let wire = original.to_wire();
        let (parsed, cooldown) = CooldownKey::from_wire(&wire, &registry).unwrap();
        assert_eq!(parsed, original);
        assert_eq!(cooldown, 60_000);
    }

    #[test]
    fn test_wire_key_unknown_rule() {
        let registry = RuleRegistry::new("/tmp/unused-binds.json");
        assert!(CooldownKey::from_wire("g_s_Bob_kit", &registry).is_none());
    }

    #[tokio::test]
    async fn test_load_and_prune() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let path = temp.path().join("cooldowns.json");

        let mut registry = RuleRegistry::new(temp.path().join("binds.json"));
        let mut rule = BindRule::spawn("kit", "kit_pvp");
        rule.cooldown = 60_000;
        registry.add("g", "s", rule);

        let now = 1_000_000;
        let mut doc = HashMap::new();
        doc.insert("g_s_Bob_kit".to_string(), now - 10_000); // still active
        doc.insert("g_s_Alice_kit".to_string(), now - 120_000); // expired
        doc.insert("g_s_Bob_unknown".to_string(), now - 1_000); // rule gone
        storage::save_json(&path, &doc).await.unwrap();

        let mut store = CooldownStore::new(&path);
        store.load_and_prune(&registry, now).await.unwrap();

        let bob = CooldownKey::new("g", "s", "Bob", "kit");
        let alice = CooldownKey::new("g", "s", "Alice", "kit");
        assert!(store.check(&bob, 60_000, now) > 0);
        assert_eq!(store.check(&alice, 60_000, now), 0);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_format_cooldown() {
        assert_eq!(format_cooldown(0), "0:00:00");
        assert_eq!(format_cooldown(60_000), "0:00:01");
        assert_eq!(format_cooldown(90 * 60 * 1000), "0:01:30");
        assert_eq!(format_cooldown(26 * 60 * 60 * 1000), "1:02:00");
    }
}
