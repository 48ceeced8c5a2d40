pub mod commands;
pub mod render;

use crate::config::RelayConfig;
use crate::issuance::IssuanceEngine;
use crate::summary::AdminSummary;
use poise::serenity_prelude::{self as serenity, FullEvent, GatewayIntents};
use std::sync::Arc;
use tracing::{error, info};

/// Shared data accessible in all commands
#[derive(Debug)]
pub struct Data {
    pub engine: Arc<IssuanceEngine>,
    pub summary: Arc<AdminSummary>,
    pub relay: RelayConfig,
}

type Error = Box<dyn std::error::Error + Send + Sync>;

/// Event handler for Discord events
async fn event_handler(
    _ctx: &serenity::Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    _data: &Data,
) -> Result<(), Error> {
    if let FullEvent::Ready { data_about_bot } = event {
        info!("Bot is ready! Logged in as {}", data_about_bot.user.name);
    }
    Ok(())
}

/// Create and configure the Discord bot framework
pub fn create_framework(data: Data) -> poise::Framework<Data, Error> {
    poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all_commands(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Command error in /{}: {}", ctx.command().name, error);
                            let reply = poise::CreateReply::default()
                                .content(render::INTERNAL_ERROR)
                                .ephemeral(true);
                            let _ = ctx.send(reply).await;
                        }
                        poise::FrameworkError::Setup { error, .. } => {
                            error!("Setup error: {}", error);
                        }
                        err => {
                            if let Err(e) = poise::builtins::on_error(err).await {
                                error!("Error while handling error: {}", e);
                            }
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Registered {} slash commands globally", framework.options().commands.len());
                Ok(data)
            })
        })
        .build()
}

/// Connect to the gateway and serve commands until shutdown.
pub async fn start_bot(token: &str, data: Data) -> Result<(), Error> {
    if token.is_empty() {
        return Err("Discord token is empty".into());
    }

    // Slash commands only; member lookups go through REST
    let intents = GatewayIntents::GUILDS | GatewayIntents::DIRECT_MESSAGES;

    let framework = create_framework(data);

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    info!("Starting Discord bot...");
    client.start().await?;

    Ok(())
}
