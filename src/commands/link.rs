//! Account linking commands.
//!
//! `/link` lets players attach their own gamertag; `/unlink` and `/linkrole`
//! are for admins.

use crate::types::{Context, Error};
use poise::serenity_prelude as serenity;

/// Platform a linked account plays on.
#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum Platform {
    #[name = "PlayStation"]
    Ps4,
    #[name = "Xbox"]
    XboxOne,
}

impl Platform {
    fn as_str(&self) -> &'static str {
        match self {
            Platform::Ps4 => "ps4",
            Platform::XboxOne => "xboxone",
        }
    }
}

/// Link your Discord account to your in-game gamertag.
#[poise::command(slash_command, guild_only)]
pub async fn link(
    context: Context<'_>,
    #[description = "Your in-game gamertag"]
    #[min_length = 1]
    #[max_length = 64]
    gamertag: String,
    #[description = "Platform you play on"] platform: Platform,
) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };
    let discord_id = context.author().id.to_string();

    match context
        .data()
        .engine
        .link_player(&guild.to_string(), &discord_id, &gamertag, platform.as_str())
        .await
    {
        Ok(()) => {
            context
                .say(format!("✅ Linked <@{}> to `{}`.", discord_id, gamertag))
                .await?;
        }
        Err(e) => {
            context.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}

/// Remove a member's gamertag link.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn unlink(
    context: Context<'_>,
    #[description = "Member to unlink"] user: serenity::User,
) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };
    let discord_id = user.id.to_string();

    match context
        .data()
        .engine
        .unlink_player(&guild.to_string(), &discord_id)
        .await
    {
        Ok(link) => {
            context
                .say(format!("✅ Unlinked <@{}> from `{}`.", discord_id, link.gamertag))
                .await?;
        }
        Err(e) => {
            context.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}

/// Set the role granted to every linked member of this guild.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn linkrole(
    context: Context<'_>,
    #[description = "Role granted to linked members"] role: serenity::Role,
) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };

    match context
        .data()
        .engine
        .set_link_role(&guild.to_string(), &role.id.to_string())
        .await
    {
        Ok(()) => {
            context
                .say(format!(
                    "✅ Link role set to `{}` and granted to linked members.",
                    role.name
                ))
                .await?;
        }
        Err(e) => {
            context.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}
