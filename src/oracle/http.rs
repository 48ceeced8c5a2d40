use super::{Eligibility, MembershipOracle};
use crate::config::MembershipConfig;
use crate::error::{AppError, AppResult};
use crate::model::Identity;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, error, warn};

/// Statuses that count as belonging to the group
const MEMBER_STATUSES: &[&str] = &["member", "administrator", "creator"];

/// Response from the membership API
#[derive(Debug, Deserialize)]
pub struct MemberResponse {
    pub status: String,
}

/// Client for an external membership API.
///
/// `GET {url}/members/{identity}` answers `{"status": "..."}`; 404 means
/// the identity is unknown to the group. The identity always travels as one
/// percent-encoded path segment.
pub struct HttpMembershipOracle {
    http: Client,
    base_url: Url,
}

impl std::fmt::Debug for HttpMembershipOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMembershipOracle")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpMembershipOracle {
    /// Create a new membership client from config
    pub fn from_config(config: &MembershipConfig) -> AppResult<Self> {
        let base_url = config
            .url
            .as_deref()
            .ok_or_else(|| AppError::invalid_config("membership.url is required for the http provider"))?;

        let http = Client::builder().timeout(config.timeout()).build()?;
        Self::new(http, base_url)
    }

    pub fn new(http: Client, base_url: &str) -> AppResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::invalid_config(format!("membership.url {:?}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::invalid_config(format!(
                "membership.url {:?} cannot carry a path",
                base_url.as_str()
            )));
        }
        Ok(Self { http, base_url })
    }

    /// Resource URL for one identity, `None` if the identity cannot name a
    /// single path segment
    fn member_url(&self, identity: &Identity) -> Option<Url> {
        let id = identity.as_str();
        if matches!(id, "" | "." | "..") {
            return None;
        }

        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .push("members")
            .push(id);
        Some(url)
    }
}

#[async_trait]
impl MembershipOracle for HttpMembershipOracle {
    async fn check(&self, identity: &Identity) -> Eligibility {
        let Some(url) = self.member_url(identity) else {
            debug!("Identity {:?} cannot be looked up, not eligible", identity.as_str());
            return Eligibility::NotEligible;
        };
        debug!("Checking membership at {}", url);

        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Membership request failed: {}", e);
                return Eligibility::unknown(e.to_string());
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Eligibility::NotEligible;
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Membership service returned {}: {}", status, body);
            return Eligibility::unknown(format!("membership service returned {}", status));
        }

        match response.json::<MemberResponse>().await {
            Ok(member) => eligibility_for_status(&member.status),
            Err(e) => {
                error!("Failed to parse membership response: {}", e);
                Eligibility::unknown(e.to_string())
            }
        }
    }
}

/// Map a membership status string to eligibility
pub fn eligibility_for_status(status: &str) -> Eligibility {
    if MEMBER_STATUSES.contains(&status.trim().to_ascii_lowercase().as_str()) {
        Eligibility::Eligible
    } else {
        Eligibility::NotEligible
    }
}
