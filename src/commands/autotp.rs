//! Auto-teleport administration.
//!
//! `/autotp` toggles the feature for the guild, `/category` manages teleport
//! categories and their locations, `/tpmessage` sets the announcement
//! templates.

use crate::types::{Context, Error};

/// Enable or disable automatic respawn teleports for this guild.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn autotp(
    context: Context<'_>,
    #[description = "Whether respawn teleports are active"] enabled: bool,
) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };

    match context
        .data()
        .engine
        .set_autotp_enabled(&guild.to_string(), enabled)
        .await
    {
        Ok(()) => {
            let state = if enabled { "enabled" } else { "disabled" };
            context
                .say(format!("✅ Auto-teleport is now {}.", state))
                .await?;
        }
        Err(e) => {
            context.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}

/// Manage teleport categories.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    subcommands("add", "remove", "addlocation", "removelocation", "list")
)]
pub async fn category(_context: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Create a teleport category.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn add(
    context: Context<'_>,
    #[description = "Category name"] name: String,
    #[description = "Chat phrase that toggles membership"] bind: String,
    #[description = "Command run after each teleport; {PlayerName}"] command: Option<String>,
) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };

    match context
        .data()
        .engine
        .add_category(&guild.to_string(), &name, &bind, command)
        .await
    {
        Ok(()) => {
            context
                .say(format!("✅ Category `{}` created with bind `{}`.", name, bind))
                .await?;
        }
        Err(e) => {
            context.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}

/// Delete a teleport category.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn remove(
    context: Context<'_>,
    #[description = "Category name"] name: String,
) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };

    match context
        .data()
        .engine
        .remove_category(&guild.to_string(), &name)
        .await
    {
        Ok(()) => {
            context.say(format!("✅ Category `{}` removed.", name)).await?;
        }
        Err(e) => {
            context.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}

/// Add a teleport destination to a category.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn addlocation(
    context: Context<'_>,
    #[description = "Category name"] category: String,
    #[description = "Location name"] name: String,
    #[description = "Coordinates, e.g. 100,25,-300"] coords: String,
) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };

    match context
        .data()
        .engine
        .add_location(&guild.to_string(), &category, &name, &coords)
        .await
    {
        Ok(coords) => {
            context
                .say(format!(
                    "✅ Location `{}` at `{}` added to `{}`.",
                    name, coords, category
                ))
                .await?;
        }
        Err(e) => {
            context.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}

/// Remove a teleport destination from a category.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn removelocation(
    context: Context<'_>,
    #[description = "Category name"] category: String,
    #[description = "Location name"] name: String,
) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };

    match context
        .data()
        .engine
        .remove_location(&guild.to_string(), &category, &name)
        .await
    {
        Ok(()) => {
            context
                .say(format!("✅ Location `{}` removed from `{}`.", name, category))
                .await?;
        }
        Err(e) => {
            context.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}

/// List this guild's teleport categories.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn list(context: Context<'_>) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };

    let categories = context
        .data()
        .engine
        .list_categories(&guild.to_string())
        .await;
    if categories.is_empty() {
        context.say("❌ No teleport categories configured.").await?;
        return Ok(());
    }

    let lines: Vec<String> = categories
        .iter()
        .map(|(name, category)| {
            format!(
                "`{}` (bind `{}`, {} locations, {} active)",
                name,
                category.bind,
                category.locations.len(),
                category.active_players.len()
            )
        })
        .collect();
    context.say(lines.join("\n")).await?;
    Ok(())
}

/// Set a category's signup and exit announcements.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn tpmessage(
    context: Context<'_>,
    #[description = "Category name"] category: String,
    #[description = "Announced on join; {PlayerName} and {Category}"] signup: Option<String>,
    #[description = "Announced on leave; {PlayerName} and {Category}"] exit: Option<String>,
) -> Result<(), Error> {
    let Some(guild) = context.guild_id() else {
        return Ok(());
    };
    if signup.is_none() && exit.is_none() {
        context
            .say("❌ Give at least one of `signup` or `exit`.")
            .await?;
        return Ok(());
    }

    match context
        .data()
        .engine
        .set_category_messages(&guild.to_string(), &category, signup, exit)
        .await
    {
        Ok(()) => {
            context
                .say(format!("✅ Messages updated for `{}`.", category))
                .await?;
        }
        Err(e) => {
            context.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}
