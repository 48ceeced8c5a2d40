pub mod bot;
pub mod config;
pub mod error;
pub mod issuance;
pub mod model;
pub mod oracle;
pub mod relay;
pub mod secret;
pub mod store;
pub mod summary;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use issuance::{IssuanceEngine, Outcome};
pub use model::{CredentialRecord, Identity, InsertOutcome, Secret};
pub use summary::{AdminSummary, Summary};
