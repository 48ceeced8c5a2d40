//! Reply texts for bot commands.

use crate::config::RelayConfig;
use crate::issuance::Outcome;
use crate::model::Secret;
use crate::relay::proxy_link;
use crate::summary::Summary;
use std::fmt::Write;

pub const DENIED: &str = "You are not a member of the community yet. \
    Join it and run `/start` again.";

pub const RETRY_LATER: &str = "Could not verify your membership right now. Please try again later.";

pub const STORE_UNAVAILABLE: &str = "Could not save your secret right now. Please try again later.";

pub const UNAUTHORIZED: &str = "This command is for administrators only.";

pub const INTERNAL_ERROR: &str = "Something went wrong. Please try again later.";

/// Text for the outcome of `/start`
pub fn outcome_message(outcome: &Outcome, relay: &RelayConfig) -> String {
    match outcome {
        Outcome::ExistingSecret(secret) => format!(
            "Your active secret: `{}`\n{}\n\n\
            If the link does not open, copy it and add the proxy in Telegram manually.",
            secret.expose(),
            link_block(relay, secret)
        ),
        Outcome::NewSecret(secret) => format!(
            "Membership confirmed!\n\n\
            Your personal secret: `{}`\n{}\n\n\
            Open the link in Telegram or add it under Settings > Data and Storage > Proxy.",
            secret.expose(),
            link_block(relay, secret)
        ),
        Outcome::Denied => DENIED.to_string(),
        Outcome::TransientFailure(_) => RETRY_LATER.to_string(),
        Outcome::StoreUnavailable(_) => STORE_UNAVAILABLE.to_string(),
    }
}

fn link_block(relay: &RelayConfig, secret: &Secret) -> String {
    format!("Connection link:\n`{}`", proxy_link(relay, secret))
}

/// Text for `/stats`
pub fn summary_message(summary: &Summary) -> String {
    let (count, recent) = match summary {
        Summary::Authorized { count, recent } => (count, recent),
        Summary::Unauthorized => return UNAUTHORIZED.to_string(),
    };

    let mut text = format!("**Proxy statistics**\n\nTotal users: {}\n", count);
    if recent.is_empty() {
        text.push_str("No secrets issued yet.");
        return text;
    }

    let _ = writeln!(text, "Last {}:", recent.len());
    for record in recent {
        let _ = writeln!(text, "- ID: {} secret: `{}`", record.identity, record.secret_prefix);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::RedactedRecord;

    fn relay() -> RelayConfig {
        RelayConfig {
            server: "proxy.example.org".to_string(),
            port: 443,
        }
    }

    #[test]
    fn test_secret_messages_include_link() {
        let secret = Secret::new("0123456789abcdef0123456789abcdef");
        for outcome in [
            Outcome::NewSecret(secret.clone()),
            Outcome::ExistingSecret(secret.clone()),
        ] {
            let text = outcome_message(&outcome, &relay());
            assert!(text.contains("`0123456789abcdef0123456789abcdef`"));
            assert!(text.contains(
                "tg://proxy?server=proxy.example.org&port=443&secret=0123456789abcdef0123456789abcdef"
            ));
        }
    }

    #[test]
    fn test_failures_do_not_leak_details() {
        let text = outcome_message(&Outcome::TransientFailure("HTTP 502 from api".into()), &relay());
        assert_eq!(text, RETRY_LATER);
        let text = outcome_message(&Outcome::StoreUnavailable("/var/lib/x: EIO".into()), &relay());
        assert_eq!(text, STORE_UNAVAILABLE);
        assert_eq!(outcome_message(&Outcome::Denied, &relay()), DENIED);
    }

    #[test]
    fn test_summary_message() {
        let summary = Summary::Authorized {
            count: 12,
            recent: vec![RedactedRecord {
                identity: "42".into(),
                secret_prefix: "01234567...".to_string(),
            }],
        };
        let text = summary_message(&summary);
        assert!(text.contains("Total users: 12"));
        assert!(text.contains("- ID: 42 secret: `01234567...`"));

        assert_eq!(summary_message(&Summary::Unauthorized), UNAUTHORIZED);
    }

    #[test]
    fn test_empty_summary_message() {
        let text = summary_message(&Summary::Authorized {
            count: 0,
            recent: vec![],
        });
        assert!(text.contains("Total users: 0"));
        assert!(text.contains("No secrets issued yet."));
    }
}
