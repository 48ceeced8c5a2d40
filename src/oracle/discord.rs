use super::{Eligibility, MembershipOracle};
use crate::model::Identity;
use async_trait::async_trait;
use serenity::http::Http;
use serenity::model::id::{GuildId, RoleId, UserId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Eligibility from guild membership, optionally narrowed to a role.
pub struct GuildMembershipOracle {
    http: Arc<Http>,
    guild_id: GuildId,
    required_role: Option<RoleId>,
}

impl std::fmt::Debug for GuildMembershipOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuildMembershipOracle")
            .field("guild_id", &self.guild_id)
            .field("required_role", &self.required_role)
            .finish_non_exhaustive()
    }
}

impl GuildMembershipOracle {
    pub fn new(http: Arc<Http>, guild_id: u64, required_role_id: Option<u64>) -> Self {
        Self {
            http,
            guild_id: GuildId::new(guild_id),
            required_role: required_role_id.map(RoleId::new),
        }
    }
}

#[async_trait]
impl MembershipOracle for GuildMembershipOracle {
    async fn check(&self, identity: &Identity) -> Eligibility {
        let Some(user_id) = parse_user_id(identity) else {
            debug!("Identity {} is not a Discord user id", identity);
            return Eligibility::NotEligible;
        };

        match self.http.get_member(self.guild_id, user_id).await {
            Ok(member) => evaluate_member(&member.roles, member.pending, self.required_role),
            Err(e) if is_not_found(&e) => {
                debug!("User {} is not a member of guild {}", user_id, self.guild_id);
                Eligibility::NotEligible
            }
            Err(e) => {
                warn!("Guild membership lookup for {} failed: {}", user_id, e);
                Eligibility::unknown(e.to_string())
            }
        }
    }
}

/// Discord answers 404 (Unknown Member / Unknown User) for non-members
fn is_not_found(error: &serenity::Error) -> bool {
    match error {
        serenity::Error::Http(e) => e.status_code().is_some_and(|s| s.as_u16() == 404),
        _ => false,
    }
}

fn parse_user_id(identity: &Identity) -> Option<UserId> {
    identity
        .as_str()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(UserId::new)
}

/// Decide eligibility for a fetched guild member
pub fn evaluate_member(roles: &[RoleId], pending: bool, required_role: Option<RoleId>) -> Eligibility {
    if pending {
        // Membership screening not yet completed
        return Eligibility::NotEligible;
    }
    match required_role {
        Some(role) if !roles.contains(&role) => Eligibility::NotEligible,
        _ => Eligibility::Eligible,
    }
}
