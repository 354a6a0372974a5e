//! Gun Game administration.

use crate::gungame::Weapon;
use crate::types::{Context, Error};

/// Manage the Gun Game weapon ladder.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    subcommands("toggle", "weapon", "remove", "list", "reset")
)]
pub async fn gungame(_context: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Enable or disable Gun Game for a teleport category.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn toggle(
    context: Context<'_>,
    #[description = "Teleport category"] category: String,
    #[description = "Whether Gun Game runs in this category"] enabled: bool,
) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };

    match context
        .data()
        .engine
        .set_gungame_enabled(&guild.to_string(), &category, enabled)
        .await
    {
        Ok(()) => {
            let state = if enabled { "enabled" } else { "disabled" };
            context
                .say(format!("✅ Gun Game {} for `{}`.", state, category))
                .await?;
        }
        Err(e) => {
            context.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}

/// Append a weapon to the ladder.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn weapon(
    context: Context<'_>,
    #[description = "Weapon short name"] name: String,
    #[description = "Kills required to advance past it"]
    #[min = 1]
    kills: u32,
    #[description = "Ammo handed out with it, e.g. 'arrow 20'"] ammo: Option<String>,
) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };

    let weapon = Weapon {
        weapon: name.clone(),
        kills,
        ammo,
    };
    match context
        .data()
        .engine
        .add_gungame_weapon(&guild.to_string(), weapon)
        .await
    {
        Ok(()) => {
            context
                .say(format!("✅ Weapon `{}` added ({} kills).", name, kills))
                .await?;
        }
        Err(e) => {
            context.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}

/// Remove a weapon by its position in `/gungame list`.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn remove(
    context: Context<'_>,
    #[description = "Position shown by /gungame list (starts at 1)"]
    #[min = 1]
    position: usize,
) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };

    match context
        .data()
        .engine
        .remove_gungame_weapon(&guild.to_string(), position - 1)
        .await
    {
        Ok(removed) => {
            context
                .say(format!("✅ Removed weapon `{}`.", removed.weapon))
                .await?;
        }
        Err(e) => {
            context.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}

/// Show the weapon ladder.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn list(context: Context<'_>) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };

    let weapons = context
        .data()
        .engine
        .list_gungame_weapons(&guild.to_string())
        .await;
    if weapons.is_empty() {
        context.say("❌ The weapon ladder is empty.").await?;
        return Ok(());
    }

    let lines: Vec<String> = weapons
        .iter()
        .enumerate()
        .map(|(i, weapon)| match &weapon.ammo {
            Some(ammo) => format!(
                "{}. `{}` ({} kills, ammo `{}`)",
                i + 1,
                weapon.weapon,
                weapon.kills,
                ammo
            ),
            None => format!("{}. `{}` ({} kills)", i + 1, weapon.weapon, weapon.kills),
        })
        .collect();
    context.say(lines.join("\n")).await?;
    Ok(())
}

/// Wipe the ladder, category settings and all player progress.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn reset(context: Context<'_>) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };

    match context.data().engine.reset_gungame(&guild.to_string()).await {
        Ok(()) => {
            context.say("✅ Gun Game reset.").await?;
        }
        Err(e) => {
            context.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}
