use anyhow::Context;
use proxygate::model::Identity;
use proxygate::relay::mtproxy_users;
use proxygate::store::{CredentialStore, SharedCredentialStore};
use proxygate::{AdminSummary, Summary};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Print the issued count and the most recent records, secrets redacted
pub async fn stats(store: SharedCredentialStore, recent: usize, out: &mut impl Write) -> anyhow::Result<()> {
    let summary = AdminSummary::new(store, Vec::<Identity>::new(), recent);
    let Summary::Authorized { count, recent } = summary.overview().await? else {
        anyhow::bail!("overview is never gated");
    };

    writeln!(out, "Total users: {}", count)?;
    if !recent.is_empty() {
        writeln!(out, "Last {}:", recent.len())?;
        for record in recent {
            writeln!(out, "  {}  {}", record.identity, record.secret_prefix)?;
        }
    }
    Ok(())
}

/// Write the MTProxy user table as pretty JSON
pub async fn export_users(store: &dyn CredentialStore, out: &mut impl Write) -> anyhow::Result<()> {
    let records = store.snapshot().await?;
    serde_json::to_writer_pretty(&mut *out, &mtproxy_users(&records))?;
    writeln!(out)?;
    Ok(())
}

pub async fn export_users_to_file(store: &dyn CredentialStore, path: &Path) -> anyhow::Result<()> {
    let mut buf = Vec::new();
    export_users(store, &mut buf).await?;
    tokio::fs::write(path, buf)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("Wrote MTProxy user table to {}", path.display());
    Ok(())
}

/// Report whether an identity holds a secret, without printing it
pub async fn lookup(store: &dyn CredentialStore, identity: &Identity, out: &mut impl Write) -> anyhow::Result<()> {
    match store.get(identity).await? {
        Some(secret) => writeln!(out, "{}: {}", identity, secret.redacted())?,
        None => writeln!(out, "{}: no secret issued", identity)?,
    }
    Ok(())
}
