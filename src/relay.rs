//! What the MTProxy relay needs from us: a client link per secret, and the
//! per-user secret table the proxy loads at startup.

use crate::config::RelayConfig;
use crate::model::{CredentialRecord, Secret};
use serde_json::{Map, Value};

/// `tg://proxy` link a Telegram client can open directly
pub fn proxy_link(relay: &RelayConfig, secret: &Secret) -> String {
    format!(
        "tg://proxy?server={}&port={}&secret={}",
        relay.server,
        relay.port,
        secret.expose()
    )
}

/// Name of an identity's entry in the proxy's user table
pub fn mtproxy_user_name(record: &CredentialRecord) -> String {
    format!("user_{}", record.identity)
}

/// User table in the shape the proxy config expects: `{"user_<id>": "<secret>"}`
pub fn mtproxy_users(records: &[CredentialRecord]) -> Value {
    let users: Map<String, Value> = records
        .iter()
        .map(|r| (mtproxy_user_name(r), Value::String(r.secret.expose().to_string())))
        .collect();
    Value::Object(users)
}
