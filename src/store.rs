//! Guild state store.
//!
//! AutoTP categories, GunGame state and player links persist together in one
//! `servers.json` document, mirroring the legacy layout: per-guild `autotp` and
//! `gungame` blocks plus top-level `playerLinks` (array-of-pairs) and
//! `linkRoles` maps. Unknown legacy fields (browser session bookkeeping) are
//! ignored on load.

use crate::autotp::AutoTpState;
use crate::gungame::GunGameState;
use crate::links::{LinkTable, PlayerLink};
use crate::storage;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuildDoc {
    #[serde(default)]
    pub autotp: AutoTpState,
    #[serde(default)]
    pub gungame: GunGameState,
}

/// On-disk shape of `servers.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServersDoc {
    #[serde(default)]
    pub guilds: BTreeMap<String, GuildDoc>,
    #[serde(rename = "playerLinks", default)]
    pub player_links: Vec<(String, PlayerLink)>,
    #[serde(rename = "linkRoles", default)]
    pub link_roles: HashMap<String, String>,
}

/// In-memory guild state with snapshot persistence.
#[derive(Debug)]
pub struct GuildStore {
    path: PathBuf,
    autotp: BTreeMap<String, AutoTpState>,
    gungame: BTreeMap<String, GunGameState>,
    links: LinkTable,
}

impl GuildStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            autotp: BTreeMap::new(),
            gungame: BTreeMap::new(),
            links: LinkTable::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn autotp(&self, guild_id: &str) -> Option<&AutoTpState> {
        self.autotp.get(guild_id)
    }

    pub fn autotp_mut(&mut self, guild_id: &str) -> &mut AutoTpState {
        self.autotp.entry(guild_id.to_string()).or_default()
    }

    pub fn gungame(&self, guild_id: &str) -> Option<&GunGameState> {
        self.gungame.get(guild_id)
    }

    pub fn gungame_mut(&mut self, guild_id: &str) -> &mut GunGameState {
        self.gungame.entry(guild_id.to_string()).or_default()
    }

    pub fn links(&self) -> &LinkTable {
        &self.links
    }

    pub fn links_mut(&mut self) -> &mut LinkTable {
        &mut self.links
    }

    /// The GunGame-enabled AutoTP category a player is currently active in.
    pub fn gungame_active_category(&self, guild_id: &str, player: &str) -> Option<String> {
        let autotp = self.autotp.get(guild_id)?;
        let gungame = self.gungame.get(guild_id)?;
        autotp
            .categories
            .iter()
            .find(|(name, category)| {
                category.active_players.iter().any(|p| p == player)
                    && gungame.is_enabled(name)
            })
            .map(|(name, _)| name.clone())
    }

    pub fn snapshot(&self) -> ServersDoc {
        let mut guilds: BTreeMap<String, GuildDoc> = BTreeMap::new();
        for (guild_id, autotp) in &self.autotp {
            guilds.entry(guild_id.clone()).or_default().autotp = autotp.clone();
        }
        for (guild_id, gungame) in &self.gungame {
            guilds.entry(guild_id.clone()).or_default().gungame = gungame.clone();
        }
        let (player_links, link_roles) = self.links.snapshot();
        ServersDoc {
            guilds,
            player_links,
            link_roles,
        }
    }

    /// Replace in-memory state from `servers.json`.
    pub async fn load(&mut self) -> Result<()> {
        let Some(doc) = storage::load_json::<ServersDoc>(&self.path).await? else {
            return Ok(());
        };

        self.autotp.clear();
        self.gungame.clear();
        for (guild_id, guild) in doc.guilds {
            self.autotp.insert(guild_id.clone(), guild.autotp);
            self.gungame.insert(guild_id, guild.gungame);
        }
        self.links = LinkTable::restore(doc.player_links, doc.link_roles);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autotp::Category;

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let path = temp.path().join("servers.json");

        let mut store = GuildStore::new(&path);
        let autotp = store.autotp_mut("g");
        autotp.enabled = true;
        autotp
            .categories
            .insert("pvp".to_string(), Category::new("!pvp", None));
        autotp.toggle_membership("!pvp", "Bob");

        store.gungame_mut("g").set_enabled("pvp", true);
        store
            .links_mut()
            .link(
                "111",
                PlayerLink {
                    gamertag: "Bob".to_string(),
                    platform: "ps4".to_string(),
                    guild_id: "g".to_string(),
                },
            )
            .unwrap();
        store.links_mut().set_link_role("g", "role-1");

        storage::save_json(&path, &store.snapshot()).await.unwrap();

        let mut loaded = GuildStore::new(&path);
        loaded.load().await.unwrap();
        assert!(loaded.autotp("g").unwrap().enabled);
        assert_eq!(loaded.autotp("g").unwrap().active_category("Bob"), Some("pvp"));
        assert!(loaded.gungame("g").unwrap().is_enabled("pvp"));
        assert_eq!(loaded.links().get("111").unwrap().gamertag, "Bob");
        assert_eq!(loaded.links().link_role("g"), Some("role-1"));
    }

    #[test]
    fn test_gungame_active_category_requires_both() {
        let mut store = GuildStore::new("/tmp/unused-servers.json");
        let autotp = store.autotp_mut("g");
        autotp.enabled = true;
        autotp
            .categories
            .insert("pvp".to_string(), Category::new("!pvp", None));
        autotp.toggle_membership("!pvp", "Bob");

        // Active in the category but GunGame disabled for it.
        assert!(store.gungame_active_category("g", "Bob").is_none());

        store.gungame_mut("g").set_enabled("pvp", true);
        assert_eq!(
            store.gungame_active_category("g", "Bob").as_deref(),
            Some("pvp")
        );
        assert!(store.gungame_active_category("g", "Alice").is_none());
    }

    #[test]
    fn test_legacy_document_fields_ignored() {
        let raw = serde_json::json!({
            "guilds": {
                "g": {
                    "nicknames": [["main", "12345"]],
                    "ids": [["12345", "main"]],
                    "colors": [["main", "green"]],
                    "autotp": { "enabled": true, "categories": {} },
                    "gungame": { "enabled": false, "weapons": [], "playerProgress": [] }
                }
            },
            "playerLinks": [],
            "linkRoles": {}
        });
        let doc: ServersDoc = serde_json::from_value(raw).unwrap();
        assert!(doc.guilds["g"].autotp.enabled);
    }
}
