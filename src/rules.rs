//! Bind rule registry.
//!
//! A bind maps a chat trigger phrase to either a console command template or an
//! entity spawn. Rules are scoped to one (guild, server) pair and kept in the
//! order admins added them. The registry persists the whole nested mapping to
//! `binds.json` after every mutation; field names are pinned to the legacy
//! document format so existing saved state keeps loading.

use crate::error::{ConsoleBindError, Result};
use crate::events::ChatType;
use crate::storage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Action kind of a bind rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindType {
    Command,
    Spawn,
}

/// One chat-triggered rule.
///
/// Invariant: `Command` rules carry `command` and no `entity`; `Spawn` rules
/// the inverse. The constructors enforce this; rules loaded from disk that
/// violate it are dropped with a warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindRule {
    /// Trigger phrase, matched as a case-insensitive substring of chat text
    pub message: String,
    /// Command template with a `{PlayerName}` placeholder (COMMAND rules)
    pub command: Option<String>,
    /// Entity short name to spawn at the player's position (SPAWN rules)
    pub entity: Option<String>,
    /// Cooldown in milliseconds, 0 for none
    #[serde(default)]
    pub cooldown: u64,
    #[serde(rename = "roleId", default)]
    pub role_id: Option<String>,
    #[serde(rename = "removeRole", default)]
    pub remove_role: bool,
    /// Template announced while on cooldown; `{PlayerName}` and `{Cooldown}`
    #[serde(rename = "cooldownMsg", default)]
    pub cooldown_msg: Option<String>,
    /// Template announced after a successful fire; `{PlayerName}`
    #[serde(rename = "claimMsg", default)]
    pub claim_msg: Option<String>,
    #[serde(rename = "chatType", default)]
    pub chat_type: ChatType,
    #[serde(rename = "type")]
    pub kind: BindType,
}

impl BindRule {
    /// A COMMAND rule running `command` when `message` is seen in chat.
    pub fn command(message: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            command: Some(command.into()),
            entity: None,
            cooldown: 0,
            role_id: None,
            remove_role: false,
            cooldown_msg: None,
            claim_msg: None,
            chat_type: ChatType::All,
            kind: BindType::Command,
        }
    }

    /// A SPAWN rule spawning `entity` at the player's position.
    pub fn spawn(message: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            command: None,
            entity: Some(entity.into()),
            cooldown: 0,
            role_id: None,
            remove_role: false,
            cooldown_msg: None,
            claim_msg: None,
            chat_type: ChatType::All,
            kind: BindType::Spawn,
        }
    }

    /// Check the command/entity invariant for rules coming from disk.
    pub fn is_well_formed(&self) -> bool {
        match self.kind {
            BindType::Command => self.command.is_some() && self.entity.is_none(),
            BindType::Spawn => self.entity.is_some() && self.command.is_none(),
        }
    }
}

type BindsDoc = HashMap<String, HashMap<String, Vec<BindRule>>>;

/// Ordered per-(guild, server) collection of bind rules.
#[derive(Debug)]
pub struct RuleRegistry {
    path: PathBuf,
    binds: BindsDoc,
}

impl RuleRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            binds: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a rule to a server's list.
    pub fn add(&mut self, guild_id: &str, server_id: &str, rule: BindRule) {
        self.binds
            .entry(guild_id.to_string())
            .or_default()
            .entry(server_id.to_string())
            .or_default()
            .push(rule);
    }

    /// Remove the rule at `index` (0-based). Later indices shift down by one.
    pub fn remove_at(&mut self, guild_id: &str, server_id: &str, index: usize) -> Result<BindRule> {
        let rules = self
            .binds
            .get_mut(guild_id)
            .and_then(|g| g.get_mut(server_id))
            .ok_or_else(|| {
                ConsoleBindError::Validation(format!("no binds found for server {}", server_id))
            })?;

        if index >= rules.len() {
            return Err(ConsoleBindError::Validation(format!(
                "invalid bind index {} (server has {} binds)",
                index + 1,
                rules.len()
            )));
        }

        Ok(rules.remove(index))
    }

    /// Rules for one server, in registry order.
    pub fn list(&self, guild_id: &str, server_id: &str) -> &[BindRule] {
        self.binds
            .get(guild_id)
            .and_then(|g| g.get(server_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Exact match on the stored trigger string. Used to reattach cooldown
    /// entries to their rules after a restart.
    pub fn find_by_trigger(
        &self,
        guild_id: &str,
        server_id: &str,
        trigger: &str,
    ) -> Option<&BindRule> {
        self.list(guild_id, server_id)
            .iter()
            .find(|rule| rule.message == trigger)
    }

    /// Full snapshot of the nested guild -> server -> rules mapping.
    pub fn snapshot(&self) -> BindsDoc {
        self.binds.clone()
    }

    /// Replace in-memory state from `binds.json`, dropping malformed rules.
    pub async fn load(&mut self) -> Result<()> {
        let Some(doc) = storage::load_json::<BindsDoc>(&self.path).await? else {
            return Ok(());
        };

        let mut binds: BindsDoc = HashMap::new();
        for (guild_id, servers) in doc {
            let guild = binds.entry(guild_id.clone()).or_default();
            for (server_id, rules) in servers {
                let kept: Vec<BindRule> = rules
                    .into_iter()
                    .filter(|rule| {
                        if rule.is_well_formed() {
                            true
                        } else {
                            warn!(
                                guild = %guild_id,
                                server = %server_id,
                                trigger = %rule.message,
                                "dropping malformed bind rule from disk"
                            );
                            false
                        }
                    })
                    .collect();
                guild.insert(server_id, kept);
            }
        }

        self.binds = binds;
        Ok(())
    }
}
