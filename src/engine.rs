//! Bind matching engine.
//!
//! Ties the whole pipeline together: console log lines come in, get parsed
//! into events, and fan out into bind rules, AutoTP teleports and GunGame
//! progression. Matched rules queue per server and drain one command at a
//! time with a fixed pause between sends, since the web console drops input
//! that arrives too fast.
//!
//! Locking discipline: the tokio mutexes around the registry and the stores
//! are held only to read or mutate state, never across a console send. Every
//! mutation is followed by a snapshot-then-save so a crash loses at most the
//! in-flight change.

use crate::autotp::{normalize_coords, Category, Location};
use crate::config::Config;
use crate::console::{ConsoleExecutor, ServerKey};
use crate::cooldowns::{format_cooldown, now_ms, CooldownKey, CooldownStore};
use crate::error::{ConsoleBindError, Result};
use crate::events::{self, ChatEvent, ConsoleEvent, KillEvent, RespawnEvent};
use crate::gungame::Weapon;
use crate::links::PlayerLink;
use crate::names::normalize_player_name;
use crate::position::PositionResolver;
use crate::queue::{CommandQueue, QueueEntry};
use crate::rolegate::RoleGate;
use crate::rules::{BindRule, BindType, RuleRegistry};
use crate::storage;
use crate::store::GuildStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

const BINDS_FILE: &str = "binds.json";
const COOLDOWNS_FILE: &str = "cooldowns.json";
const SERVERS_FILE: &str = "servers.json";

/// Window during which repeat chat from the same player is ignored.
const SPAM_GATE_MS: u64 = 5_000;
/// Minimum gap between respawn teleports for one player.
const TELEPORT_GATE_MS: u64 = 5_000;

pub struct BindEngine {
    console: Arc<dyn ConsoleExecutor>,
    roles: Arc<dyn RoleGate>,
    rules: Mutex<RuleRegistry>,
    cooldowns: Mutex<CooldownStore>,
    store: Mutex<GuildStore>,
    queue: CommandQueue,
    positions: PositionResolver,
    /// (guild, server, player) -> last processing start, ms since epoch
    processing: StdMutex<HashMap<(String, String, String), u64>>,
    /// (guild, player, category) -> last respawn teleport, ms since epoch
    teleported: StdMutex<HashMap<(String, String, String), u64>>,
    pacing: Duration,
}

impl BindEngine {
    pub fn new(
        console: Arc<dyn ConsoleExecutor>,
        roles: Arc<dyn RoleGate>,
        config: &Config,
    ) -> Self {
        let data_dir = &config.data_dir;
        Self {
            console,
            roles,
            rules: Mutex::new(RuleRegistry::new(data_dir.join(BINDS_FILE))),
            cooldowns: Mutex::new(CooldownStore::new(data_dir.join(COOLDOWNS_FILE))),
            store: Mutex::new(GuildStore::new(data_dir.join(SERVERS_FILE))),
            queue: CommandQueue::new(),
            positions: PositionResolver::new(),
            processing: StdMutex::new(HashMap::new()),
            teleported: StdMutex::new(HashMap::new()),
            pacing: Duration::from_millis(config.queue_interval_ms),
        }
    }

    /// Load all persisted state. Called once before any console line is fed in.
    pub async fn startup(&self) -> Result<()> {
        let mut rules = self.rules.lock().await;
        rules.load().await?;
        self.cooldowns
            .lock()
            .await
            .load_and_prune(&rules, now_ms())
            .await?;
        drop(rules);
        self.store.lock().await.load().await?;
        info!("engine state loaded");
        Ok(())
    }

    /// Flush all state to disk.
    pub async fn shutdown(&self) -> Result<()> {
        self.save_rules().await?;
        self.save_cooldowns().await?;
        self.save_store().await?;
        info!("engine state flushed");
        Ok(())
    }

    /// Periodic pump picking up entries that were queued while a drain was
    /// finishing. Runs until the task is aborted.
    pub fn spawn_pump(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.pacing);
            loop {
                ticker.tick().await;
                for server in engine.queue.servers_with_pending() {
                    engine.pump_server(&server);
                }
            }
        })
    }

    /// Feed one raw scraped console line through the pipeline.
    pub async fn handle_console_line(self: &Arc<Self>, server: &ServerKey, raw: &str) {
        let Some(payload) = events::extract_payload(raw) else {
            return;
        };
        let Some(event) = events::parse_event(payload) else {
            return;
        };

        match event {
            ConsoleEvent::Position(position) => {
                self.positions.resolve(server, position);
            }
            ConsoleEvent::Respawn(respawn) => self.handle_respawn(server, respawn).await,
            ConsoleEvent::Kill(kill) => self.handle_kill(server, kill).await,
            ConsoleEvent::Chat(chat) => self.handle_chat(server, chat).await,
        }
    }

    async fn handle_chat(self: &Arc<Self>, server: &ServerKey, chat: ChatEvent) {
        let player = normalize_player_name(&chat.player);
        if player.is_empty() {
            return;
        }

        let now = now_ms();
        if !self.spam_gate_allows(server, &player, now) {
            debug!(server = %server, player = %player, "chat dropped by spam gate");
            return;
        }

        self.handle_autotp_toggle(server, &chat.message, &player)
            .await;

        let rules: Vec<BindRule> = {
            self.rules
                .lock()
                .await
                .list(&server.guild_id, &server.server_id)
                .to_vec()
        };

        let message_lower = chat.message.to_lowercase();
        let mut queued = false;

        for rule in rules {
            if !rule.chat_type.matches(&chat.chat_type) {
                continue;
            }
            if !message_lower.contains(&rule.message.to_lowercase()) {
                continue;
            }

            let mut discord_id = None;
            if let Some(role_id) = &rule.role_id {
                let linked = {
                    self.store
                        .lock()
                        .await
                        .links()
                        .find_discord_id(&player)
                        .map(str::to_string)
                };
                let Some(id) = linked else {
                    debug!(
                        server = %server,
                        player = %player,
                        trigger = %rule.message,
                        "skipping role-gated bind for unlinked player"
                    );
                    continue;
                };
                match self.roles.has_role(&server.guild_id, &id, role_id).await {
                    Ok(true) => discord_id = Some(id),
                    Ok(false) => continue,
                    Err(err) => {
                        warn!(
                            server = %server,
                            player = %player,
                            error = %err,
                            "role check failed, skipping bind"
                        );
                        continue;
                    }
                }
            }

            let key = CooldownKey::new(
                &server.guild_id,
                &server.server_id,
                &player,
                &rule.message,
            );
            let remaining = { self.cooldowns.lock().await.check(&key, rule.cooldown, now) };
            if remaining > 0 {
                if let Some(template) = &rule.cooldown_msg {
                    let text = template
                        .replace("{PlayerName}", &player)
                        .replace("{Cooldown}", &format_cooldown(remaining));
                    self.say(server, &text).await;
                }
                continue;
            }

            self.queue.push(
                server,
                QueueEntry {
                    rule,
                    player_name: player.clone(),
                    enqueued_at: now,
                    discord_id,
                },
            );
            queued = true;
        }

        if queued {
            self.pump_server(server);
        }
    }

    async fn handle_autotp_toggle(&self, server: &ServerKey, message: &str, player: &str) {
        let changes = {
            let mut store = self.store.lock().await;
            let enabled = store
                .autotp(&server.guild_id)
                .map(|state| state.enabled)
                .unwrap_or(false);
            if !enabled {
                return;
            }
            store
                .autotp_mut(&server.guild_id)
                .toggle_membership(message, player)
        };
        if changes.is_empty() {
            return;
        }

        if let Err(err) = self.save_store().await {
            error!(error = %err, "failed to persist teleport membership change");
        }

        for change in changes {
            let (category, template) = match change {
                crate::autotp::MembershipChange::Joined { category, message } => {
                    (category, message)
                }
                crate::autotp::MembershipChange::Left { category, message } => {
                    (category, message)
                }
            };
            if let Some(template) = template {
                let text = template
                    .replace("{PlayerName}", player)
                    .replace("{Category}", &category);
                self.say(server, &text).await;
            }
        }
    }

    async fn handle_respawn(&self, server: &ServerKey, respawn: RespawnEvent) {
        let player = normalize_player_name(&respawn.player);
        if player.is_empty() {
            return;
        }

        let target = {
            let store = self.store.lock().await;
            match store.autotp(&server.guild_id) {
                Some(state) if state.enabled => state.pick_teleport(&player),
                _ => None,
            }
        };
        let Some(target) = target else {
            return;
        };

        if !self.teleport_gate_allows(&server.guild_id, &player, &target.category, now_ms()) {
            debug!(server = %server, player = %player, "respawn teleport suppressed");
            return;
        }

        let command = format!("global.teleportpos {} {}", target.coords, player);
        if let Err(err) = self.console.execute(server, &command).await {
            warn!(server = %server, player = %player, error = %err, "respawn teleport failed");
            return;
        }
        info!(
            server = %server,
            player = %player,
            category = %target.category,
            "teleported respawned player"
        );

        if let Some(template) = target.command {
            tokio::time::sleep(self.pacing).await;
            let follow_up = template.replace("{PlayerName}", &player);
            if let Err(err) = self.console.execute(server, &follow_up).await {
                warn!(server = %server, error = %err, "post-teleport command failed");
            }
        }
    }

    async fn handle_kill(&self, server: &ServerKey, kill: KillEvent) {
        let killer = normalize_player_name(&kill.killer);
        let victim = normalize_player_name(&kill.victim);
        if killer.is_empty() || killer == victim {
            return;
        }

        let outcome = {
            let mut store = self.store.lock().await;
            let Some(category) = store.gungame_active_category(&server.guild_id, &killer) else {
                return;
            };
            store
                .gungame_mut(&server.guild_id)
                .record_kill(&killer, &category)
        };

        if let Err(err) = self.save_store().await {
            error!(error = %err, "failed to persist kill progress");
        }

        for (i, command) in outcome.commands().iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pacing).await;
            }
            if let Err(err) = self.console.execute(server, command).await {
                warn!(server = %server, error = %err, "progression command failed");
            }
        }
    }

    /// Claim and drain a server's queue in a background task. No-op when a
    /// drain is already running or nothing is pending.
    fn pump_server(self: &Arc<Self>, server: &ServerKey) {
        if !self.queue.try_begin_drain(server) {
            return;
        }
        let engine = Arc::clone(self);
        let server = server.clone();
        tokio::spawn(async move {
            while let Some(entry) = engine.queue.pop(&server) {
                engine.dispatch(&server, entry).await;
                tokio::time::sleep(engine.pacing).await;
            }
            engine.queue.finish_drain(&server);
        });
    }

    async fn dispatch(&self, server: &ServerKey, entry: QueueEntry) {
        let executed = match entry.rule.kind {
            BindType::Spawn => self.dispatch_spawn(server, &entry).await,
            BindType::Command => self.dispatch_command(server, &entry).await,
        };
        if !executed {
            return;
        }

        if entry.rule.cooldown > 0 {
            let key = CooldownKey::new(
                &server.guild_id,
                &server.server_id,
                &entry.player_name,
                &entry.rule.message,
            );
            {
                self.cooldowns.lock().await.record(key, now_ms());
            }
            if let Err(err) = self.save_cooldowns().await {
                error!(error = %err, "failed to persist cooldown");
            }
        }

        if let Some(template) = &entry.rule.claim_msg {
            tokio::time::sleep(self.pacing).await;
            self.say(server, &template.replace("{PlayerName}", &entry.player_name))
                .await;
        }
    }

    /// Spawn an entity at the triggering player's position. A position that
    /// cannot be resolved drops the entry without starting its cooldown.
    async fn dispatch_spawn(&self, server: &ServerKey, entry: &QueueEntry) -> bool {
        let Some(entity) = &entry.rule.entity else {
            return false;
        };

        let position = match self
            .positions
            .get_position(self.console.as_ref(), server, &entry.player_name)
            .await
        {
            Ok(position) => position,
            Err(err) => {
                warn!(
                    server = %server,
                    player = %entry.player_name,
                    error = %err,
                    "dropping spawn bind, position unavailable"
                );
                return false;
            }
        };

        let command = format!("spawn {} {}", entity, position);
        match self.console.execute(server, &command).await {
            Ok(_) => true,
            Err(err) => {
                warn!(server = %server, error = %err, "spawn command failed");
                false
            }
        }
    }

    async fn dispatch_command(&self, server: &ServerKey, entry: &QueueEntry) -> bool {
        let Some(template) = &entry.rule.command else {
            return false;
        };

        let command = template.replace("{PlayerName}", &entry.player_name);
        if let Err(err) = self.console.execute(server, &command).await {
            warn!(server = %server, error = %err, "bind command failed");
            return false;
        }

        // One-shot binds revoke the gating role after a successful run.
        if entry.rule.remove_role {
            if let (Some(role_id), Some(discord_id)) = (&entry.rule.role_id, &entry.discord_id) {
                if let Err(err) = self
                    .roles
                    .remove_role(&server.guild_id, discord_id, role_id)
                    .await
                {
                    warn!(
                        discord_id = %discord_id,
                        error = %err,
                        "failed to revoke one-shot role"
                    );
                }
            }
        }
        true
    }

    async fn say(&self, server: &ServerKey, text: &str) {
        let command = format!("say \"{}\"", text);
        if let Err(err) = self.console.execute(server, &command).await {
            warn!(server = %server, error = %err, "chat announcement failed");
        }
    }

    /// True when this player's chat may start processing; records the attempt.
    /// Stale entries are pruned on the way in.
    fn spam_gate_allows(&self, server: &ServerKey, player: &str, now: u64) -> bool {
        let mut processing = self
            .processing
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        processing.retain(|_, started| now.saturating_sub(*started) < SPAM_GATE_MS);

        let key = (
            server.guild_id.clone(),
            server.server_id.clone(),
            player.to_string(),
        );
        if processing.contains_key(&key) {
            return false;
        }
        processing.insert(key, now);
        true
    }

    fn teleport_gate_allows(&self, guild_id: &str, player: &str, category: &str, now: u64) -> bool {
        let mut teleported = self
            .teleported
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        teleported.retain(|_, at| now.saturating_sub(*at) < TELEPORT_GATE_MS);

        let key = (
            guild_id.to_string(),
            player.to_string(),
            category.to_string(),
        );
        if teleported.contains_key(&key) {
            return false;
        }
        teleported.insert(key, now);
        true
    }

    async fn save_rules(&self) -> Result<()> {
        let (path, doc) = {
            let rules = self.rules.lock().await;
            (rules.path().to_path_buf(), rules.snapshot())
        };
        storage::save_json(&path, &doc).await
    }

    async fn save_cooldowns(&self) -> Result<()> {
        let (path, doc) = {
            let cooldowns = self.cooldowns.lock().await;
            (cooldowns.path().to_path_buf(), cooldowns.snapshot())
        };
        storage::save_json(&path, &doc).await
    }

    async fn save_store(&self) -> Result<()> {
        let (path, doc) = {
            let store = self.store.lock().await;
            (store.path().to_path_buf(), store.snapshot())
        };
        storage::save_json(&path, &doc).await
    }

    // --- admin surface, called from slash commands ---

    pub async fn add_rule(&self, guild_id: &str, server_id: &str, rule: BindRule) -> Result<()> {
        if !rule.is_well_formed() {
            return Err(ConsoleBindError::Validation(
                "a bind needs exactly one of a command or an entity".to_string(),
            ));
        }
        {
            self.rules.lock().await.add(guild_id, server_id, rule);
        }
        self.save_rules().await
    }

    pub async fn remove_rule(
        &self,
        guild_id: &str,
        server_id: &str,
        index: usize,
    ) -> Result<BindRule> {
        let removed = {
            self.rules
                .lock()
                .await
                .remove_at(guild_id, server_id, index)?
        };
        self.save_rules().await?;
        Ok(removed)
    }

    pub async fn list_rules(&self, guild_id: &str, server_id: &str) -> Vec<BindRule> {
        self.rules.lock().await.list(guild_id, server_id).to_vec()
    }

    /// Clear a player's cooldowns. With a trigger, clears that one rule; with
    /// none, clears every rule the server has. Returns how many were active.
    pub async fn reset_cooldown(
        &self,
        guild_id: &str,
        server_id: &str,
        player: &str,
        trigger: Option<&str>,
    ) -> Result<usize> {
        let player = normalize_player_name(player);
        let triggers: Vec<String> = match trigger {
            Some(trigger) => vec![trigger.to_string()],
            None => {
                self.rules
                    .lock()
                    .await
                    .list(guild_id, server_id)
                    .iter()
                    .map(|rule| rule.message.clone())
                    .collect()
            }
        };

        let cleared = {
            let mut cooldowns = self.cooldowns.lock().await;
            triggers
                .iter()
                .filter(|trigger| {
                    cooldowns.reset(&CooldownKey::new(guild_id, server_id, &player, *trigger))
                })
                .count()
        };
        self.save_cooldowns().await?;
        Ok(cleared)
    }

    pub async fn link_player(
        &self,
        guild_id: &str,
        discord_id: &str,
        gamertag: &str,
        platform: &str,
    ) -> Result<()> {
        let role = {
            let mut store = self.store.lock().await;
            store.links_mut().link(
                discord_id,
                PlayerLink {
                    gamertag: gamertag.to_string(),
                    platform: platform.to_string(),
                    guild_id: guild_id.to_string(),
                },
            )?;
            store.links().link_role(guild_id).map(str::to_string)
        };
        self.save_store().await?;

        if let Some(role_id) = role {
            if let Err(err) = self.roles.add_role(guild_id, discord_id, &role_id).await {
                warn!(discord_id = %discord_id, error = %err, "failed to grant link role");
            }
        }
        Ok(())
    }

    pub async fn unlink_player(&self, guild_id: &str, discord_id: &str) -> Result<PlayerLink> {
        let (link, role) = {
            let mut store = self.store.lock().await;
            let link = store.links_mut().unlink(discord_id)?;
            (link, store.links().link_role(guild_id).map(str::to_string))
        };
        self.save_store().await?;

        if let Some(role_id) = role {
            if let Err(err) = self
                .roles
                .remove_role(guild_id, discord_id, &role_id)
                .await
            {
                warn!(discord_id = %discord_id, error = %err, "failed to revoke link role");
            }
        }
        Ok(link)
    }

    /// Set the guild's link role and grant it to everyone already linked.
    pub async fn set_link_role(&self, guild_id: &str, role_id: &str) -> Result<()> {
        let members: Vec<String> = {
            let mut store = self.store.lock().await;
            store.links_mut().set_link_role(guild_id, role_id);
            store
                .links()
                .linked_in_guild(guild_id)
                .map(str::to_string)
                .collect()
        };
        self.save_store().await?;

        for discord_id in members {
            if let Err(err) = self.roles.add_role(guild_id, &discord_id, role_id).await {
                warn!(discord_id = %discord_id, error = %err, "failed to grant link role");
            }
        }
        Ok(())
    }

    pub async fn set_autotp_enabled(&self, guild_id: &str, enabled: bool) -> Result<()> {
        {
            self.store.lock().await.autotp_mut(guild_id).enabled = enabled;
        }
        self.save_store().await
    }

    pub async fn add_category(
        &self,
        guild_id: &str,
        name: &str,
        bind: &str,
        command: Option<String>,
    ) -> Result<()> {
        {
            let mut store = self.store.lock().await;
            let autotp = store.autotp_mut(guild_id);
            if autotp.categories.contains_key(name) {
                return Err(ConsoleBindError::Validation(format!(
                    "category '{}' already exists",
                    name
                )));
            }
            autotp
                .categories
                .insert(name.to_string(), Category::new(bind, command));
        }
        self.save_store().await
    }

    pub async fn remove_category(&self, guild_id: &str, name: &str) -> Result<()> {
        {
            let mut store = self.store.lock().await;
            if store.autotp_mut(guild_id).categories.remove(name).is_none() {
                return Err(ConsoleBindError::Validation(format!(
                    "no category named '{}'",
                    name
                )));
            }
            store.gungame_mut(guild_id).categories.remove(name);
        }
        self.save_store().await
    }

    /// Add a teleport location; returns the canonical coordinate form.
    pub async fn add_location(
        &self,
        guild_id: &str,
        category: &str,
        name: &str,
        coords: &str,
    ) -> Result<String> {
        let coords = normalize_coords(coords).ok_or_else(|| {
            ConsoleBindError::Validation(
                "coordinates must look like 'x,y,z' or '(x,y,z)'".to_string(),
            )
        })?;
        {
            let mut store = self.store.lock().await;
            let target = store
                .autotp_mut(guild_id)
                .categories
                .get_mut(category)
                .ok_or_else(|| {
                    ConsoleBindError::Validation(format!("no category named '{}'", category))
                })?;
            target.locations.push(Location {
                name: name.to_string(),
                coords: coords.clone(),
            });
        }
        self.save_store().await?;
        Ok(coords)
    }

    pub async fn remove_location(
        &self,
        guild_id: &str,
        category: &str,
        name: &str,
    ) -> Result<()> {
        {
            let mut store = self.store.lock().await;
            let target = store
                .autotp_mut(guild_id)
                .categories
                .get_mut(category)
                .ok_or_else(|| {
                    ConsoleBindError::Validation(format!("no category named '{}'", category))
                })?;
            let index = target
                .locations
                .iter()
                .position(|location| location.name == name)
                .ok_or_else(|| {
                    ConsoleBindError::Validation(format!(
                        "no location named '{}' in '{}'",
                        name, category
                    ))
                })?;
            target.locations.remove(index);
        }
        self.save_store().await
    }

    pub async fn set_category_messages(
        &self,
        guild_id: &str,
        category: &str,
        signup: Option<String>,
        exit: Option<String>,
    ) -> Result<()> {
        {
            let mut store = self.store.lock().await;
            let target = store
                .autotp_mut(guild_id)
                .categories
                .get_mut(category)
                .ok_or_else(|| {
                    ConsoleBindError::Validation(format!("no category named '{}'", category))
                })?;
            if signup.is_some() {
                target.messages.signup = signup;
            }
            if exit.is_some() {
                target.messages.exit = exit;
            }
        }
        self.save_store().await
    }

    /// Toggle GunGame for a teleport category. Enabling wipes the progress of
    /// players currently active in it so everyone restarts from the bottom.
    pub async fn set_gungame_enabled(
        &self,
        guild_id: &str,
        category: &str,
        enabled: bool,
    ) -> Result<()> {
        {
            let mut store = self.store.lock().await;
            let known = store
                .autotp(guild_id)
                .map(|state| state.categories.contains_key(category))
                .unwrap_or(false);
            if !known {
                return Err(ConsoleBindError::Validation(format!(
                    "no category named '{}'",
                    category
                )));
            }
            if enabled {
                let active: Vec<String> = store
                    .autotp(guild_id)
                    .and_then(|state| state.categories.get(category))
                    .map(|c| c.active_players.clone())
                    .unwrap_or_default();
                store.gungame_mut(guild_id).clear_progress_for(&active);
            }
            store.gungame_mut(guild_id).set_enabled(category, enabled);
        }
        self.save_store().await
    }

    pub async fn add_gungame_weapon(&self, guild_id: &str, weapon: Weapon) -> Result<()> {
        {
            self.store.lock().await.gungame_mut(guild_id).add_weapon(weapon);
        }
        self.save_store().await
    }

    pub async fn remove_gungame_weapon(&self, guild_id: &str, index: usize) -> Result<Weapon> {
        let removed = {
            self.store
                .lock()
                .await
                .gungame_mut(guild_id)
                .remove_weapon(index)
                .ok_or_else(|| {
                    ConsoleBindError::Validation(format!("no weapon at position {}", index + 1))
                })?
        };
        self.save_store().await?;
        Ok(removed)
    }

    pub async fn list_gungame_weapons(&self, guild_id: &str) -> Vec<Weapon> {
        self.store
            .lock()
            .await
            .gungame(guild_id)
            .map(|state| state.weapons.clone())
            .unwrap_or_default()
    }

    pub async fn reset_gungame(&self, guild_id: &str) -> Result<()> {
        {
            self.store.lock().await.gungame_mut(guild_id).reset();
        }
        self.save_store().await
    }

    /// Teleport category names configured for a guild.
    pub async fn list_categories(&self, guild_id: &str) -> Vec<(String, Category)> {
        self.store
            .lock()
            .await
            .autotp(guild_id)
            .map(|state| {
                state
                    .categories
                    .iter()
                    .map(|(name, category)| (name.clone(), category.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Position;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::OnceLock;

    struct MockConsole {
        commands: StdMutex<Vec<String>>,
        engine: OnceLock<Arc<BindEngine>>,
        position: Position,
    }

    impl MockConsole {
        fn new() -> Self {
            Self {
                commands: StdMutex::new(Vec::new()),
                engine: OnceLock::new(),
                position: Position {
                    x: 1.0,
                    y: 2.0,
                    z: 3.0,
                },
            }
        }

        fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ConsoleExecutor for MockConsole {
        async fn execute(&self, server: &ServerKey, command: &str) -> Result<String> {
            self.commands.lock().unwrap().push(command.to_string());
            // Answer position queries the way the real console would, by
            // echoing a position line back to the engine.
            if command.starts_with("printpos") {
                if let Some(engine) = self.engine.get() {
                    engine.positions.resolve(server, self.position);
                }
            }
            Ok(String::new())
        }
    }

    #[derive(Default)]
    struct MockRoleGate {
        held: StdMutex<Vec<(String, String)>>,
        removed: StdMutex<Vec<(String, String)>>,
    }

    impl MockRoleGate {
        fn grant(&self, user_id: &str, role_id: &str) {
            self.held
                .lock()
                .unwrap()
                .push((user_id.to_string(), role_id.to_string()));
        }
    }

    #[async_trait]
    impl RoleGate for MockRoleGate {
        async fn has_role(&self, _guild: &str, user_id: &str, role_id: &str) -> Result<bool> {
            Ok(self
                .held
                .lock()
                .unwrap()
                .contains(&(user_id.to_string(), role_id.to_string())))
        }

        async fn add_role(&self, _guild: &str, user_id: &str, role_id: &str) -> Result<()> {
            self.grant(user_id, role_id);
            Ok(())
        }

        async fn remove_role(&self, _guild: &str, user_id: &str, role_id: &str) -> Result<()> {
            self.removed
                .lock()
                .unwrap()
                .push((user_id.to_string(), role_id.to_string()));
            Ok(())
        }
    }

    fn build_engine(
        data_dir: &Path,
    ) -> (Arc<BindEngine>, Arc<MockConsole>, Arc<MockRoleGate>) {
        let console = Arc::new(MockConsole::new());
        let roles = Arc::new(MockRoleGate::default());
        let config = Config {
            discord_token: String::new(),
            data_dir: data_dir.to_path_buf(),
            queue_interval_ms: 500,
        };
        let engine = Arc::new(BindEngine::new(
            Arc::clone(&console) as Arc<dyn ConsoleExecutor>,
            Arc::clone(&roles) as Arc<dyn RoleGate>,
            &config,
        ));
        let _ = console.engine.set(Arc::clone(&engine));
        (engine, console, roles)
    }

    fn server() -> ServerKey {
        ServerKey::new("g", "s")
    }

    async fn wait_for_commands(console: &MockConsole, count: usize) {
        for _ in 0..200 {
            if console.commands().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "timed out waiting for {} commands, got {:?}",
            count,
            console.commands()
        );
    }

    fn clear_spam_gate(engine: &BindEngine) {
        engine.processing.lock().unwrap().clear();
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_bind_end_to_end() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let (engine, console, _) = build_engine(temp.path());

        let mut rule = BindRule::command("!heal", "heal {PlayerName}");
        rule.claim_msg = Some("{PlayerName} was healed".to_string());
        engine.add_rule("g", "s", rule).await.unwrap();

        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: [CHAT LOCAL] Bob : !heal please")
            .await;
        wait_for_commands(&console, 2).await;

        let commands = console.commands();
        assert_eq!(commands[0], "heal Bob");
        assert_eq!(commands[1], "say \"Bob was healed\"");
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_bind_cooldown_starts_after_success() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let (engine, console, _) = build_engine(temp.path());

        let mut rule = BindRule::spawn("!kit", "kit_pvp");
        rule.cooldown = 60_000;
        rule.cooldown_msg = Some("{PlayerName} must wait {Cooldown}".to_string());
        engine.add_rule("g", "s", rule).await.unwrap();

        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: [CHAT LOCAL] Bob : !kit")
            .await;
        wait_for_commands(&console, 2).await;

        let commands = console.commands();
        assert_eq!(commands[0], "printpos Bob");
        assert_eq!(commands[1], "spawn kit_pvp 1,2,3");

        // Second trigger is on cooldown and only announces the wait.
        clear_spam_gate(&engine);
        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: [CHAT LOCAL] Bob : !kit")
            .await;
        wait_for_commands(&console, 3).await;

        let commands = console.commands();
        assert_eq!(commands.len(), 3);
        assert!(commands[2].starts_with("say \"Bob must wait"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spam_gate_drops_rapid_repeat_chat() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let (engine, console, _) = build_engine(temp.path());

        engine
            .add_rule("g", "s", BindRule::command("!heal", "heal {PlayerName}"))
            .await
            .unwrap();

        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: [CHAT LOCAL] Bob : !heal")
            .await;
        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: [CHAT LOCAL] Bob : !heal")
            .await;
        wait_for_commands(&console, 1).await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(console.commands().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_role_gated_bind_skips_unlinked_player() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let (engine, console, roles) = build_engine(temp.path());

        let mut rule = BindRule::command("!vip", "vip.grant {PlayerName}");
        rule.role_id = Some("role-9".to_string());
        engine.add_rule("g", "s", rule).await.unwrap();

        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: [CHAT LOCAL] Bob : !vip")
            .await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(console.commands().is_empty());

        // Linked and holding the role, the same chat fires.
        engine.link_player("g", "111", "Bob", "ps4").await.unwrap();
        roles.grant("111", "role-9");
        clear_spam_gate(&engine);
        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: [CHAT LOCAL] Bob : !vip")
            .await;
        wait_for_commands(&console, 1).await;
        assert_eq!(console.commands()[0], "vip.grant Bob");
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_bind_revokes_role() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let (engine, console, roles) = build_engine(temp.path());

        let mut rule = BindRule::command("!starter", "kit.give {PlayerName} starter");
        rule.role_id = Some("role-9".to_string());
        rule.remove_role = true;
        engine.add_rule("g", "s", rule).await.unwrap();
        engine.link_player("g", "111", "Bob", "ps4").await.unwrap();
        roles.grant("111", "role-9");

        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: [CHAT LOCAL] Bob : !starter")
            .await;
        wait_for_commands(&console, 1).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(
            roles.removed.lock().unwrap().as_slice(),
            &[("111".to_string(), "role-9".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_respawn_teleports_active_player() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let (engine, console, _) = build_engine(temp.path());

        engine.set_autotp_enabled("g", true).await.unwrap();
        engine.add_category("g", "pvp", "!pvp", None).await.unwrap();
        engine
            .add_location("g", "pvp", "arena", "100,25,-300")
            .await
            .unwrap();
        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: [CHAT LOCAL] Bob : !pvp")
            .await;

        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: Bob [ps4] has entered the game")
            .await;
        wait_for_commands(&console, 1).await;

        assert_eq!(console.commands()[0], "global.teleportpos 100,25,-300 Bob");
    }

    #[tokio::test(start_paused = true)]
    async fn test_teleport_gate_is_per_category() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let (engine, console, _) = build_engine(temp.path());

        engine.set_autotp_enabled("g", true).await.unwrap();
        engine.add_category("g", "pvp", "!pvp", None).await.unwrap();
        engine
            .add_location("g", "pvp", "arena", "100,25,-300")
            .await
            .unwrap();
        engine.add_category("g", "raid", "!raid", None).await.unwrap();
        engine
            .add_location("g", "raid", "base", "7,8,9")
            .await
            .unwrap();

        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: [CHAT LOCAL] Bob : !pvp")
            .await;
        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: Bob [ps4] has entered the game")
            .await;
        wait_for_commands(&console, 1).await;

        // Back-to-back respawn in the same category is suppressed.
        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: Bob [ps4] has entered the game")
            .await;
        assert_eq!(console.commands().len(), 1);

        // Switching categories teleports right away; the gate does not carry
        // over from the previous category.
        clear_spam_gate(&engine);
        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: [CHAT LOCAL] Bob : !raid")
            .await;
        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: Bob [ps4] has entered the game")
            .await;
        wait_for_commands(&console, 2).await;
        assert_eq!(console.commands()[1], "global.teleportpos 7,8,9 Bob");
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_advances_gungame_for_active_player() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let (engine, console, _) = build_engine(temp.path());

        engine.set_autotp_enabled("g", true).await.unwrap();
        engine.add_category("g", "pvp", "!pvp", None).await.unwrap();
        engine.set_gungame_enabled("g", "pvp", true).await.unwrap();
        engine
            .add_gungame_weapon(
                "g",
                Weapon {
                    weapon: "pistol".to_string(),
                    kills: 1,
                    ammo: None,
                },
            )
            .await
            .unwrap();
        engine
            .add_gungame_weapon(
                "g",
                Weapon {
                    weapon: "rifle".to_string(),
                    kills: 1,
                    ammo: None,
                },
            )
            .await
            .unwrap();
        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: [CHAT LOCAL] Bob : !pvp")
            .await;

        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: Alice was killed by Bob")
            .await;
        wait_for_commands(&console, 2).await;

        let commands = console.commands();
        assert_eq!(commands[0], "inventory.giveto Bob \"rifle\"");
        assert!(commands[1].contains("advanced to rifle"));

        // A kill by someone outside the category does nothing.
        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: Bob was killed by Alice")
            .await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(console.commands().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cooldowns_for_every_rule() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let (engine, console, _) = build_engine(temp.path());

        let mut kit = BindRule::command("!kit", "kit.give {PlayerName}");
        kit.cooldown = 60_000;
        engine.add_rule("g", "s", kit).await.unwrap();
        let mut heal = BindRule::command("!heal", "heal {PlayerName}");
        heal.cooldown = 60_000;
        engine.add_rule("g", "s", heal).await.unwrap();

        // One chat line matches both triggers and starts both cooldowns.
        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: [CHAT LOCAL] Bob : !kit !heal")
            .await;
        wait_for_commands(&console, 2).await;

        // No trigger given, so both rules are cleared.
        let cleared = engine.reset_cooldown("g", "s", "Bob", None).await.unwrap();
        assert_eq!(cleared, 2);
        let cleared = engine.reset_cooldown("g", "s", "Bob", None).await.unwrap();
        assert_eq!(cleared, 0);

        // Single-trigger reset still works on its own.
        clear_spam_gate(&engine);
        engine
            .handle_console_line(&server(), ":LOG:DEFAULT: [CHAT LOCAL] Bob : !kit")
            .await;
        wait_for_commands(&console, 3).await;
        let cleared = engine
            .reset_cooldown("g", "s", "Bob", Some("!kit"))
            .await
            .unwrap();
        assert_eq!(cleared, 1);
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        {
            let (engine, _, _) = build_engine(temp.path());
            engine
                .add_rule("g", "s", BindRule::command("!heal", "heal {PlayerName}"))
                .await
                .unwrap();
            engine.link_player("g", "111", "Bob", "ps4").await.unwrap();
            engine.shutdown().await.unwrap();
        }

        let (engine, _, _) = build_engine(temp.path());
        engine.startup().await.unwrap();
        assert_eq!(engine.list_rules("g", "s").await.len(), 1);
        let store = engine.store.lock().await;
        assert_eq!(store.links().get("111").unwrap().gamertag, "Bob");
    }
}
