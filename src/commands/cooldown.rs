//! Cooldown administration.

use crate::types::{Context, Error};

/// Clear a player's cooldowns, for one bind or for all of them.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn resetcooldown(
    context: Context<'_>,
    #[description = "Server the binds apply to"] server: String,
    #[description = "In-game player name"] player: String,
    #[description = "Bind trigger phrase; omit to clear every bind"] trigger: Option<String>,
) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };

    match context
        .data()
        .engine
        .reset_cooldown(&guild.to_string(), &server, &player, trigger.as_deref())
        .await
    {
        Ok(0) => {
            context
                .say(format!("❌ No active cooldowns for `{}`.", player))
                .await?;
        }
        Ok(cleared) => match trigger {
            Some(trigger) => {
                context
                    .say(format!("✅ Cooldown for `{}` on `{}` cleared.", player, trigger))
                    .await?;
            }
            None => {
                context
                    .say(format!("✅ Cleared {} cooldowns for `{}`.", cleared, player))
                    .await?;
            }
        },
        Err(e) => {
            context.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}
