//! Bind rule administration.
//!
//! `/bind add`, `/bind remove` and `/bind list` manage the chat-triggered
//! rules of one game server.

use crate::events::ChatType;
use crate::rules::{BindRule, BindType};
use crate::types::{Context, Error};
use poise::serenity_prelude as serenity;

/// Chat channel filter exposed as a slash-command choice.
#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum ChatTypeChoice {
    #[name = "all"]
    All,
    #[name = "local"]
    Local,
    #[name = "team"]
    Team,
    #[name = "server"]
    Server,
}

impl From<ChatTypeChoice> for ChatType {
    fn from(choice: ChatTypeChoice) -> Self {
        match choice {
            ChatTypeChoice::All => ChatType::All,
            ChatTypeChoice::Local => ChatType::Local,
            ChatTypeChoice::Team => ChatType::Team,
            ChatTypeChoice::Server => ChatType::Server,
        }
    }
}

/// Manage chat-triggered console binds.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    subcommands("add", "remove", "list")
)]
pub async fn bind(_context: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Add a bind. Give exactly one of `command` or `entity`.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn add(
    context: Context<'_>,
    #[description = "Server the bind applies to"] server: String,
    #[description = "Chat phrase that triggers the bind"] trigger: String,
    #[description = "Console command to run; {PlayerName} is replaced"] command: Option<String>,
    #[description = "Entity to spawn at the player's position"] entity: Option<String>,
    #[description = "Cooldown in minutes"] cooldown: Option<u64>,
    #[description = "Role required to use this bind"] role: Option<serenity::Role>,
    #[description = "Remove the role after a successful use"] remove_role: Option<bool>,
    #[description = "Message shown while on cooldown; {PlayerName} and {Cooldown}"]
    cooldown_message: Option<String>,
    #[description = "Message shown after a successful use; {PlayerName}"] claim_message: Option<
        String,
    >,
    #[description = "Chat channel the trigger listens on"] chat_type: Option<ChatTypeChoice>,
) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };

    let mut rule = match (command, entity) {
        (Some(command), None) => BindRule::command(trigger, command),
        (None, Some(entity)) => BindRule::spawn(trigger, entity),
        _ => {
            context
                .say("❌ Give exactly one of `command` or `entity`.")
                .await?;
            return Ok(());
        }
    };
    rule.cooldown = cooldown.unwrap_or(0).saturating_mul(60_000);
    rule.role_id = role.map(|role| role.id.to_string());
    rule.remove_role = remove_role.unwrap_or(false);
    rule.cooldown_msg = cooldown_message;
    rule.claim_msg = claim_message;
    rule.chat_type = chat_type.map(Into::into).unwrap_or_default();

    let trigger = rule.message.clone();
    match context
        .data()
        .engine
        .add_rule(&guild.to_string(), &server, rule)
        .await
    {
        Ok(()) => {
            context
                .say(format!("✅ Bind `{}` added to server `{}`.", trigger, server))
                .await?;
        }
        Err(e) => {
            context.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}

/// Remove a bind by its position in `/bind list`.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn remove(
    context: Context<'_>,
    #[description = "Server the bind applies to"] server: String,
    #[description = "Position shown by /bind list (starts at 1)"]
    #[min = 1]
    position: usize,
) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };

    match context
        .data()
        .engine
        .remove_rule(&guild.to_string(), &server, position - 1)
        .await
    {
        Ok(removed) => {
            context
                .say(format!("✅ Removed bind `{}`.", removed.message))
                .await?;
        }
        Err(e) => {
            context.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}

/// List a server's binds.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn list(
    context: Context<'_>,
    #[description = "Server the binds apply to"] server: String,
) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };

    let rules = context
        .data()
        .engine
        .list_rules(&guild.to_string(), &server)
        .await;
    if rules.is_empty() {
        context
            .say(format!("❌ No binds configured for server `{}`.", server))
            .await?;
        return Ok(());
    }

    let mut lines = Vec::with_capacity(rules.len());
    for (i, rule) in rules.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, describe(rule)));
    }
    context.say(lines.join("\n")).await?;
    Ok(())
}

fn describe(rule: &BindRule) -> String {
    let action = match rule.kind {
        BindType::Command => format!("runs `{}`", rule.command.as_deref().unwrap_or("?")),
        BindType::Spawn => format!("spawns `{}`", rule.entity.as_deref().unwrap_or("?")),
    };
    let mut extras = Vec::new();
    if rule.cooldown > 0 {
        extras.push(format!("{}m cooldown", rule.cooldown / 60_000));
    }
    if rule.role_id.is_some() {
        extras.push("role-gated".to_string());
    }
    if rule.chat_type != ChatType::All {
        extras.push(rule.chat_type.to_string());
    }
    if extras.is_empty() {
        format!("`{}` {}", rule.message, action)
    } else {
        format!("`{}` {} ({})", rule.message, action, extras.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_rule() {
        let mut rule = BindRule::spawn("kit", "kit_pvp");
        rule.cooldown = 120_000;
        rule.role_id = Some("1".to_string());
        assert_eq!(
            describe(&rule),
            "`kit` spawns `kit_pvp` (2m cooldown, role-gated)"
        );

        let plain = BindRule::command("heal", "heal {PlayerName}");
        assert_eq!(describe(&plain), "`heal` runs `heal {PlayerName}`");
    }
}
