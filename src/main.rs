use proxygate::{
    bot::{self, Data},
    config::AppConfig,
    oracle, store, AdminSummary, IssuanceEngine,
};
use serenity::http::Http;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up PROXYGATE_* variables from a local .env before anything reads them
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proxygate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ProxyGate v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::init()?;
    config.validate_for_bot()?;
    info!("Configuration loaded");

    let credentials = store::open(&config.store).await?;

    let discord_http = Arc::new(Http::new(&config.discord.token));
    let membership = oracle::from_config(&config.membership, discord_http)?;
    info!("Membership provider: {:?}", config.membership.provider);

    let engine = Arc::new(IssuanceEngine::new(
        credentials.clone(),
        membership,
        config.membership.timeout(),
    ));

    if config.admin.ids.is_empty() {
        info!("No administrators configured; /stats is disabled");
    }
    let summary = Arc::new(AdminSummary::new(
        credentials,
        config.admin.ids.iter().cloned(),
        config.admin.recent_count,
    ));

    let data = Data {
        engine,
        summary,
        relay: config.relay.clone(),
    };

    match bot::start_bot(&config.discord.token, data).await {
        Ok(()) => info!("Discord bot shut down gracefully"),
        Err(e) => {
            error!("Discord bot error: {}", e);
            return Err(anyhow::anyhow!("{}", e));
        }
    }

    Ok(())
}
