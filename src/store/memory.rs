use super::CredentialStore;
use crate::error::AppResult;
use crate::model::{CredentialRecord, Identity, InsertOutcome, Secret};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Non-durable store kept in insertion order. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<CredentialRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing records, e.g. for tests.
    pub fn with_records(records: Vec<CredentialRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, identity: &Identity) -> AppResult<Option<Secret>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| &r.identity == identity)
            .map(|r| r.secret.clone()))
    }

    async fn put_if_absent(&self, identity: &Identity, secret: Secret) -> AppResult<InsertOutcome> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.iter().find(|r| &r.identity == identity) {
            return Ok(InsertOutcome::AlreadyPresent(existing.secret.clone()));
        }
        records.push(CredentialRecord::new(identity.clone(), secret));
        Ok(InsertOutcome::Inserted)
    }

    async fn snapshot(&self) -> AppResult<Vec<CredentialRecord>> {
        Ok(self.records.read().await.clone())
    }
}
