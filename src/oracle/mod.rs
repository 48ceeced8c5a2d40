//! Membership checks that gate issuance.
//!
//! An oracle answers one question: does this identity currently belong to
//! the community? Implementations never return errors. Anything that keeps
//! them from answering becomes [`Eligibility::Unknown`], which the issuance
//! engine treats as "try again later" rather than as a denial.

pub mod discord;
pub mod http;

pub use discord::GuildMembershipOracle;
pub use http::HttpMembershipOracle;

use crate::config::{MembershipConfig, MembershipProvider};
use crate::error::{AppError, AppResult};
use crate::model::Identity;
use async_trait::async_trait;
use serenity::http::Http;
use std::sync::Arc;

/// Answer of a membership check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    NotEligible,
    /// The check could not be completed
    Unknown(String),
}

impl Eligibility {
    pub fn unknown<S: Into<String>>(reason: S) -> Self {
        Self::Unknown(reason.into())
    }
}

#[async_trait]
pub trait MembershipOracle: Send + Sync {
    async fn check(&self, identity: &Identity) -> Eligibility;
}

/// Shared oracle handle.
pub type SharedOracle = Arc<dyn MembershipOracle>;

/// Build the oracle selected in configuration.
///
/// The discord provider reuses the bot's REST client.
pub fn from_config(config: &MembershipConfig, discord_http: Arc<Http>) -> AppResult<SharedOracle> {
    match config.provider {
        MembershipProvider::Discord => {
            let guild_id = config.guild_id.ok_or_else(|| {
                AppError::invalid_config("membership.guild_id is required for the discord provider")
            })?;
            Ok(Arc::new(GuildMembershipOracle::new(
                discord_http,
                guild_id,
                config.required_role_id,
            )))
        }
        MembershipProvider::Http => Ok(Arc::new(HttpMembershipOracle::from_config(config)?)),
    }
}
