//! Discord account to gamertag linking.
//!
//! Role-gated binds need to know which Discord user a chatting player is, so
//! players link their gamertag once through a slash command. A gamertag
//! (case-insensitive) and a Discord id are each linked to at most one
//! counterpart at a time.

use crate::error::{ConsoleBindError, Result};
use crate::names::normalize_player_name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One linked account. Field names match the legacy document format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLink {
    pub gamertag: String,
    /// Platform the account plays on (`ps4` / `xboxone`)
    #[serde(rename = "console")]
    pub platform: String,
    #[serde(rename = "guildId")]
    pub guild_id: String,
}

/// discordId -> gamertag association plus the per-guild link role.
#[derive(Debug, Default)]
pub struct LinkTable {
    links: HashMap<String, PlayerLink>,
    link_roles: HashMap<String, String>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link a Discord user to a gamertag. Fails if either side is taken.
    pub fn link(&mut self, discord_id: &str, link: PlayerLink) -> Result<()> {
        if self.links.contains_key(discord_id) {
            return Err(ConsoleBindError::Validation(
                "Your Discord account is already linked to a gamertag.".to_string(),
            ));
        }
        let taken = self
            .links
            .values()
            .any(|existing| existing.gamertag.eq_ignore_ascii_case(&link.gamertag));
        if taken {
            return Err(ConsoleBindError::Validation(
                "This gamertag is already linked to another Discord user.".to_string(),
            ));
        }

        self.links.insert(discord_id.to_string(), link);
        Ok(())
    }

    /// Remove a link, returning the old association.
    pub fn unlink(&mut self, discord_id: &str) -> Result<PlayerLink> {
        self.links.remove(discord_id).ok_or_else(|| {
            ConsoleBindError::Validation(
                "This Discord user is not linked to any gamertag.".to_string(),
            )
        })
    }

    pub fn get(&self, discord_id: &str) -> Option<&PlayerLink> {
        self.links.get(discord_id)
    }

    /// Reverse lookup: find the Discord id whose linked gamertag normalizes to
    /// `normalized_name`.
    pub fn find_discord_id(&self, normalized_name: &str) -> Option<&str> {
        self.links
            .iter()
            .find(|(_, link)| normalize_player_name(&link.gamertag) == normalized_name)
            .map(|(id, _)| id.as_str())
    }

    /// Discord ids linked within one guild.
    pub fn linked_in_guild<'a>(&'a self, guild_id: &'a str) -> impl Iterator<Item = &'a str> {
        self.links
            .iter()
            .filter(move |(_, link)| link.guild_id == guild_id)
            .map(|(id, _)| id.as_str())
    }

    pub fn link_role(&self, guild_id: &str) -> Option<&str> {
        self.link_roles.get(guild_id).map(String::as_str)
    }

    pub fn set_link_role(&mut self, guild_id: &str, role_id: &str) {
        self.link_roles
            .insert(guild_id.to_string(), role_id.to_string());
    }

    /// Snapshot as the legacy array-of-pairs Map serialization.
    pub fn snapshot(&self) -> (Vec<(String, PlayerLink)>, HashMap<String, String>) {
        let mut links: Vec<_> = self
            .links
            .iter()
            .map(|(id, link)| (id.clone(), link.clone()))
            .collect();
        links.sort_by(|a, b| a.0.cmp(&b.0));
        (links, self.link_roles.clone())
    }

    pub fn restore(links: Vec<(String, PlayerLink)>, link_roles: HashMap<String, String>) -> Self {
        Self {
            links: links.into_iter().collect(),
            link_roles,
        }
    }
}
