//! Gated, idempotent credential issuance.
//!
//! A request walks `LOOKUP -> CHECK_ELIGIBILITY -> ISSUE_AND_PERSIST`.
//! Identities that already hold a secret get it back straight from the
//! lookup, without a membership check or a write. Fresh secrets are only
//! ever recorded through `put_if_absent`, so concurrent requests for the
//! same identity converge on whichever secret was persisted first.

use crate::model::{Identity, InsertOutcome, Secret};
use crate::oracle::{Eligibility, SharedOracle};
use crate::secret::SecretGenerator;
use crate::store::SharedCredentialStore;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of an issuance request. Infrastructure failures are folded in
/// here; callers never see raw I/O errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The identity already held this secret
    ExistingSecret(Secret),
    /// A secret was generated and persisted by this request
    NewSecret(Secret),
    /// The identity is not a member
    Denied,
    /// The membership check could not be completed; retry later
    TransientFailure(String),
    /// The store could not be read or written; retry later
    StoreUnavailable(String),
}

impl Outcome {
    /// The secret this outcome hands out, if any
    pub fn secret(&self) -> Option<&Secret> {
        match self {
            Self::ExistingSecret(s) | Self::NewSecret(s) => Some(s),
            _ => None,
        }
    }
}

pub struct IssuanceEngine {
    store: SharedCredentialStore,
    oracle: SharedOracle,
    generator: SecretGenerator,
    oracle_timeout: Duration,
}

impl std::fmt::Debug for IssuanceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuanceEngine")
            .field("oracle_timeout", &self.oracle_timeout)
            .finish_non_exhaustive()
    }
}

impl IssuanceEngine {
    pub fn new(store: SharedCredentialStore, oracle: SharedOracle, oracle_timeout: Duration) -> Self {
        Self {
            store,
            oracle,
            generator: SecretGenerator::new(),
            oracle_timeout,
        }
    }

    /// Return the identity's secret, issuing one if it is eligible
    pub async fn request(&self, identity: &Identity) -> Outcome {
        match self.store.get(identity).await {
            Ok(Some(secret)) => {
                debug!("Returning existing secret for {}", identity);
                return Outcome::ExistingSecret(secret);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Credential lookup for {} failed: {}", identity, e);
                return Outcome::StoreUnavailable(e.to_string());
            }
        }

        match self.check_eligibility(identity).await {
            Eligibility::Eligible => self.issue(identity).await,
            Eligibility::NotEligible => {
                info!("Denied secret for {}: not a member", identity);
                Outcome::Denied
            }
            Eligibility::Unknown(reason) => {
                warn!("Membership check for {} inconclusive: {}", identity, reason);
                Outcome::TransientFailure(reason)
            }
        }
    }

    async fn check_eligibility(&self, identity: &Identity) -> Eligibility {
        match tokio::time::timeout(self.oracle_timeout, self.oracle.check(identity)).await {
            Ok(eligibility) => eligibility,
            Err(_) => Eligibility::unknown(format!(
                "membership check timed out after {:?}",
                self.oracle_timeout
            )),
        }
    }

    async fn issue(&self, identity: &Identity) -> Outcome {
        let candidate = self.generator.generate();

        match self.store.put_if_absent(identity, candidate.clone()).await {
            Ok(InsertOutcome::Inserted) => {
                info!("Issued new secret for {}", identity);
                Outcome::NewSecret(candidate)
            }
            Ok(InsertOutcome::AlreadyPresent(existing)) => {
                // Lost a race with a concurrent request; the candidate is dropped
                debug!("Concurrent issuance for {} already persisted a secret", identity);
                Outcome::ExistingSecret(existing)
            }
            Err(e) => {
                warn!("Failed to persist secret for {}: {}", identity, e);
                Outcome::StoreUnavailable(e.to_string())
            }
        }
    }
}
