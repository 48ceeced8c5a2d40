use crate::error::AppResult;
use crate::model::Identity;
use crate::store::SharedCredentialStore;
use std::collections::HashSet;
use tracing::info;

/// A record as shown to administrators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactedRecord {
    pub identity: Identity,
    /// Short prefix of the secret, see [`crate::model::Secret::redacted`]
    pub secret_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    Authorized {
        count: usize,
        /// Most recently issued last
        recent: Vec<RedactedRecord>,
    },
    Unauthorized,
}

/// Read-only store statistics for allow-listed administrators.
pub struct AdminSummary {
    store: SharedCredentialStore,
    admins: HashSet<Identity>,
    recent_count: usize,
}

impl std::fmt::Debug for AdminSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSummary")
            .field("admins", &self.admins.len())
            .field("recent_count", &self.recent_count)
            .finish_non_exhaustive()
    }
}

impl AdminSummary {
    pub fn new<I>(store: SharedCredentialStore, admins: I, recent_count: usize) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Identity>,
    {
        Self {
            store,
            admins: admins.into_iter().map(Into::into).collect(),
            recent_count,
        }
    }

    pub fn is_admin(&self, identity: &Identity) -> bool {
        self.admins.contains(identity)
    }

    pub async fn summarize(&self, requester: &Identity) -> AppResult<Summary> {
        if !self.is_admin(requester) {
            info!("Refused stats to non-admin {}", requester);
            return Ok(Summary::Unauthorized);
        }

        self.overview().await
    }

    /// Count and recent tail without the allow-list check. For callers that
    /// already are trusted, such as the offline admin tool.
    pub async fn overview(&self) -> AppResult<Summary> {
        let records = self.store.snapshot().await?;
        let skip = records.len().saturating_sub(self.recent_count);
        let recent = records[skip..]
            .iter()
            .map(|r| RedactedRecord {
                identity: r.identity.clone(),
                secret_prefix: r.secret.redacted(),
            })
            .collect();

        Ok(Summary::Authorized {
            count: records.len(),
            recent,
        })
    }
}
