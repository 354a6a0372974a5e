//! Gun Game weapon progression.
//!
//! A kill-count-gated weapon ladder layered onto AutoTP categories: kills made
//! while active in a GunGame-enabled category advance the killer through an
//! ordered weapon list. Reaching the last weapon's kill requirement wins the
//! game and resets progress for every player in the guild.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One rung of the weapon ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    /// Item short name handed to the player
    pub weapon: String,
    /// Kills required to advance past this weapon
    pub kills: u32,
    /// Optional ammo spec: `"<ammo-short-name> <amount>"`
    #[serde(default)]
    pub ammo: Option<String>,
}

/// A player's progress along the ladder.
///
/// Invariant: `current_weapon_index` is always `< weapons.len()` for every
/// stored entry; a win clears the entry instead of leaving it past the end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(rename = "currentWeaponIndex")]
    pub current_weapon_index: usize,
    pub kills: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CategorySettings {
    #[serde(default)]
    pub enabled: bool,
}

// playerProgress persists as the legacy array-of-pairs Map serialization.
mod progress_pairs {
    use super::Progress;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    pub fn serialize<S: Serializer>(
        map: &HashMap<String, Progress>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut pairs: Vec<(&String, &Progress)> = map.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<String, Progress>, D::Error> {
        let pairs: Vec<(String, Progress)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

/// Per-guild GunGame state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GunGameState {
    #[serde(default)]
    pub categories: BTreeMap<String, CategorySettings>,
    #[serde(default)]
    pub weapons: Vec<Weapon>,
    #[serde(rename = "playerProgress", with = "progress_pairs", default)]
    pub player_progress: HashMap<String, Progress>,
}

/// Outcome of one counted kill.
#[derive(Debug, Clone, PartialEq)]
pub enum KillOutcome {
    /// Kill counted but no weapon change yet
    Counted,
    /// Player advanced; the commands grant the weapon/ammo and announce it
    Advanced { commands: Vec<String> },
    /// Player finished the ladder; all progress was cleared
    Won { commands: Vec<String> },
}

impl KillOutcome {
    pub fn commands(&self) -> &[String] {
        match self {
            KillOutcome::Counted => &[],
            KillOutcome::Advanced { commands } | KillOutcome::Won { commands } => commands,
        }
    }
}

impl GunGameState {
    pub fn is_enabled(&self, category: &str) -> bool {
        self.categories
            .get(category)
            .map(|settings| settings.enabled)
            .unwrap_or(false)
    }

    pub fn set_enabled(&mut self, category: &str, enabled: bool) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .enabled = enabled;
    }

    /// Drop progress for the given players (used when a category is re-enabled).
    pub fn clear_progress_for(&mut self, players: &[String]) {
        for player in players {
            self.player_progress.remove(player);
        }
    }

    pub fn add_weapon(&mut self, weapon: Weapon) {
        self.weapons.push(weapon);
    }

    /// Remove the weapon at `index` (0-based); progress of players at or past
    /// that rung is reset so no stored index can point beyond the ladder.
    pub fn remove_weapon(&mut self, index: usize) -> Option<Weapon> {
        if index >= self.weapons.len() {
            return None;
        }
        let removed = self.weapons.remove(index);
        self.player_progress
            .retain(|_, progress| progress.current_weapon_index < index);
        Some(removed)
    }

    pub fn reset(&mut self) {
        self.weapons.clear();
        self.categories.clear();
        self.player_progress.clear();
    }

    /// Count one kill for `killer`, who is active in GunGame category
    /// `category`. Returns the outcome along with the console commands to run,
    /// already ordered; the caller paces them.
    pub fn record_kill(&mut self, killer: &str, category: &str) -> KillOutcome {
        if self.weapons.is_empty() {
            return KillOutcome::Counted;
        }

        let progress = self
            .player_progress
            .entry(killer.to_string())
            .or_insert(Progress {
                current_weapon_index: 0,
                kills: 0,
            });

        // Stale entries pointing past the ladder (shrunk by an admin mid-game)
        // restart from the bottom.
        if progress.current_weapon_index >= self.weapons.len() {
            progress.current_weapon_index = 0;
            progress.kills = 0;
        }

        progress.kills += 1;
        let current = &self.weapons[progress.current_weapon_index];
        if progress.kills < current.kills {
            return KillOutcome::Counted;
        }

        progress.current_weapon_index += 1;
        progress.kills = 0;

        if progress.current_weapon_index >= self.weapons.len() {
            self.player_progress.clear();
            return KillOutcome::Won {
                commands: vec![
                    format!(
                        "say \"{} has won Gun Game in {}! Game has been reset.\"",
                        killer, category
                    ),
                    format!(
                        "say \"Congratulations {}! A new game will begin with the next kill.\"",
                        killer
                    ),
                ],
            };
        }

        let index = progress.current_weapon_index;
        let next = self.weapons[index].clone();
        let mut commands = vec![format!("inventory.giveto {} \"{}\"", killer, next.weapon)];
        if let Some(ammo) = &next.ammo {
            let (ammo_type, amount) = ammo.split_once(' ').unwrap_or((ammo.as_str(), "1"));
            commands.push(format!(
                "inventory.giveto {} \"{}\" \"{}\"",
                killer, ammo_type, amount
            ));
        }
        commands.push(format!(
            "say \"{} advanced to {}! ({}/{})\"",
            killer,
            next.weapon,
            index + 1,
            self.weapons.len()
        ));

        KillOutcome::Advanced { commands }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> GunGameState {
        let mut state = GunGameState::default();
        state.set_enabled("pvp", true);
        state.add_weapon(Weapon {
            weapon: "bow".to_string(),
            kills: 2,
            ammo: Some("arrow 20".to_string()),
        });
        state.add_weapon(Weapon {
            weapon: "rifle".to_string(),
            kills: 1,
            ammo: None,
        });
        state
    }

    #[test]
    fn test_kills_accumulate_before_advancing() {
        let mut state = ladder();
        assert_eq!(state.record_kill("Bob", "pvp"), KillOutcome::Counted);
        assert_eq!(state.player_progress["Bob"].kills, 1);

        let outcome = state.record_kill("Bob", "pvp");
        match outcome {
            KillOutcome::Advanced { commands } => {
                assert_eq!(commands[0], "inventory.giveto Bob \"rifle\"");
                assert!(commands.last().unwrap().contains("(2/2)"));
            }
            other => panic!("expected advance, got {:?}", other),
        }
        assert_eq!(state.player_progress["Bob"].current_weapon_index, 1);
        assert_eq!(state.player_progress["Bob"].kills, 0);
    }

    #[test]
    fn test_ammo_granted_with_weapon() {
        let mut state = GunGameState::default();
        state.add_weapon(Weapon {
            weapon: "spear".to_string(),
            kills: 1,
            ammo: None,
        });
        state.add_weapon(Weapon {
            weapon: "bow".to_string(),
            kills: 1,
            ammo: Some("arrow 20".to_string()),
        });

        let outcome = state.record_kill("Bob", "pvp");
        match outcome {
            KillOutcome::Advanced { commands } => {
                assert_eq!(commands[1], "inventory.giveto Bob \"arrow\" \"20\"");
            }
            other => panic!("expected advance, got {:?}", other),
        }
    }

    #[test]
    fn test_win_clears_all_players() {
        let mut state = ladder();
        // Alice makes some progress too.
        state.record_kill("Alice", "pvp");
        // Bob climbs the whole ladder: 2 kills for bow, 1 for rifle.
        state.record_kill("Bob", "pvp");
        state.record_kill("Bob", "pvp");
        let outcome = state.record_kill("Bob", "pvp");

        match outcome {
            KillOutcome::Won { commands } => {
                assert!(commands[0].contains("has won Gun Game in pvp"));
            }
            other => panic!("expected win, got {:?}", other),
        }
        // Full reset, not just the winner.
        assert!(state.player_progress.is_empty());
    }

    #[test]
    fn test_progress_index_stays_in_bounds() {
        let mut state = ladder();
        state.record_kill("Bob", "pvp");
        state.record_kill("Bob", "pvp");
        for progress in state.player_progress.values() {
            assert!(progress.current_weapon_index < state.weapons.len());
        }
    }

    #[test]
    fn test_remove_weapon_resets_affected_players() {
        let mut state = ladder();
        state.record_kill("Bob", "pvp");
        state.record_kill("Bob", "pvp"); // Bob now on index 1
        state.record_kill("Alice", "pvp"); // Alice on index 0

        let removed = state.remove_weapon(1).unwrap();
        assert_eq!(removed.weapon, "rifle");
        assert!(!state.player_progress.contains_key("Bob"));
        assert!(state.player_progress.contains_key("Alice"));
    }

    #[test]
    fn test_no_weapons_is_noop() {
        let mut state = GunGameState::default();
        assert_eq!(state.record_kill("Bob", "pvp"), KillOutcome::Counted);
        assert!(state.player_progress.is_empty());
    }

    #[test]
    fn test_legacy_progress_serialization() {
        let mut state = ladder();
        state.record_kill("Bob", "pvp");

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["playerProgress"][0][0], "Bob");
        assert_eq!(json["playerProgress"][0][1]["currentWeaponIndex"], 0);
        assert_eq!(json["playerProgress"][0][1]["kills"], 1);
        assert_eq!(json["weapons"][0]["weapon"], "bow");

        let back: GunGameState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
