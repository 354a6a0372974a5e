//! Discord role checks for role-gated binds.
//!
//! The engine only needs three operations against Discord: does a member hold
//! a role, grant a role, revoke a role. They sit behind a trait so the engine
//! can be exercised without a gateway connection.

use crate::error::{ConsoleBindError, Result};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

#[async_trait]
pub trait RoleGate: Send + Sync {
    async fn has_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<bool>;
    async fn add_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<()>;
    async fn remove_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<()>;
}

/// Role gate backed by the Discord REST API.
pub struct SerenityRoleGate {
    http: Arc<serenity::Http>,
}

impl SerenityRoleGate {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }

    fn parse_id(raw: &str, what: &str) -> Result<u64> {
        raw.parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .ok_or_else(|| ConsoleBindError::Discord(format!("invalid {} id: {}", what, raw)))
    }

    fn parse_ids(
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(serenity::GuildId, serenity::UserId, serenity::RoleId)> {
        Ok((
            serenity::GuildId::new(Self::parse_id(guild_id, "guild")?),
            serenity::UserId::new(Self::parse_id(user_id, "user")?),
            serenity::RoleId::new(Self::parse_id(role_id, "role")?),
        ))
    }
}

#[async_trait]
impl RoleGate for SerenityRoleGate {
    async fn has_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<bool> {
        let (guild, user, role) = Self::parse_ids(guild_id, user_id, role_id)?;
        let member = self.http.get_member(guild, user).await?;
        Ok(member.roles.contains(&role))
    }

    async fn add_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<()> {
        let (guild, user, role) = Self::parse_ids(guild_id, user_id, role_id)?;
        self.http.add_member_role(guild, user, role, None).await?;
        Ok(())
    }

    async fn remove_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<()> {
        let (guild, user, role) = Self::parse_ids(guild_id, user_id, role_id)?;
        self.http.remove_member_role(guild, user, role, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_rejects_garbage() {
        assert!(SerenityRoleGate::parse_id("123456789", "guild").is_ok());
        assert!(SerenityRoleGate::parse_id("abc", "guild").is_err());
        assert!(SerenityRoleGate::parse_id("0", "guild").is_err());
        assert!(SerenityRoleGate::parse_id("", "guild").is_err());
    }
}
