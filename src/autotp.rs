//! Auto-teleport categories.
//!
//! A category is a named teleport group: a chat bind phrase toggles a player's
//! membership, and while active every respawn teleports them to a random
//! location from the category's list. Membership is exclusive per guild:
//! joining one category removes the player from every other.

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static COORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(?(-?\d+\.?\d*),\s*(-?\d+\.?\d*),\s*(-?\d+\.?\d*)\)?$").expect("coords pattern")
});

/// Validate admin-entered coordinates, accepting `(x,y,z)` or `x,y,z`.
/// Returns the canonical comma-joined form with the entered decimals intact.
pub fn normalize_coords(raw: &str) -> Option<String> {
    let caps = COORDS_RE.captures(raw.trim())?;
    Some(format!("{},{},{}", &caps[1], &caps[2], &caps[3]))
}

/// A named teleport destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    /// Comma-joined coordinate triple, e.g. `100,25,-300`
    pub coords: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoryMessages {
    #[serde(default)]
    pub signup: Option<String>,
    #[serde(default)]
    pub exit: Option<String>,
}

/// One teleport category. Field names match the legacy document format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Chat substring toggling membership
    pub bind: String,
    #[serde(default)]
    pub locations: Vec<Location>,
    /// Normalized names of currently active players
    #[serde(rename = "activePlayers", default)]
    pub active_players: Vec<String>,
    /// Optional command template run after each teleport; `{PlayerName}`
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub messages: CategoryMessages,
}

impl Category {
    pub fn new(bind: impl Into<String>, command: Option<String>) -> Self {
        Self {
            bind: bind.into(),
            locations: Vec::new(),
            active_players: Vec::new(),
            command,
            messages: CategoryMessages::default(),
        }
    }
}

/// A membership transition produced by a chat bind phrase. The engine turns
/// these into in-game announcements, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum MembershipChange {
    Joined {
        category: String,
        message: Option<String>,
    },
    Left {
        category: String,
        message: Option<String>,
    },
}

/// Per-guild AutoTP state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AutoTpState {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub categories: BTreeMap<String, Category>,
}

impl AutoTpState {
    /// React to a chat message: if it contains a category's bind phrase, toggle
    /// the player's membership in that category, removing them from every other
    /// category first. Returns the transitions in the order they happened.
    ///
    /// A player is active in at most one category; each transition carries that
    /// category's own exit/signup template.
    pub fn toggle_membership(&mut self, message: &str, player: &str) -> Vec<MembershipChange> {
        let target = self
            .categories
            .iter()
            .find(|(_, category)| message.contains(&category.bind))
            .map(|(name, _)| name.clone());

        let Some(target) = target else {
            return Vec::new();
        };

        let mut changes = Vec::new();

        for (name, category) in self.categories.iter_mut() {
            if *name == target {
                continue;
            }
            if let Some(index) = category.active_players.iter().position(|p| p == player) {
                category.active_players.remove(index);
                changes.push(MembershipChange::Left {
                    category: name.clone(),
                    message: category.messages.exit.clone(),
                });
            }
        }

        if let Some(category) = self.categories.get_mut(&target) {
            match category.active_players.iter().position(|p| p == player) {
                Some(index) => {
                    category.active_players.remove(index);
                    changes.push(MembershipChange::Left {
                        category: target,
                        message: category.messages.exit.clone(),
                    });
                }
                None => {
                    category.active_players.push(player.to_string());
                    changes.push(MembershipChange::Joined {
                        category: target,
                        message: category.messages.signup.clone(),
                    });
                }
            }
        }

        changes
    }

    /// The category a player is active in, if any.
    pub fn active_category(&self, player: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|(_, category)| category.active_players.iter().any(|p| p == player))
            .map(|(name, _)| name.as_str())
    }

    /// Pick a random teleport destination for an active player's respawn.
    /// Returns the category name, coordinates and optional follow-up command.
    /// None when the player is inactive or their category has no locations.
    pub fn pick_teleport(&self, player: &str) -> Option<TeleportTarget> {
        let (name, category) = self
            .categories
            .iter()
            .find(|(_, category)| category.active_players.iter().any(|p| p == player))?;

        if category.locations.is_empty() {
            return None;
        }

        let index = rand::rng().random_range(0..category.locations.len());
        Some(TeleportTarget {
            category: name.clone(),
            coords: category.locations[index].coords.clone(),
            command: category.command.clone(),
        })
    }
}

/// A chosen respawn teleport destination.
#[derive(Debug, Clone, PartialEq)]
pub struct TeleportTarget {
    pub category: String,
    pub coords: String,
    pub command: Option<String>,
}
