use crate::bot::{render, Data};
use crate::model::Identity;

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Get your personal proxy secret
#[poise::command(slash_command)]
pub async fn start(ctx: Context<'_>) -> Result<(), Error> {
    let identity = Identity::from(ctx.author().id.get());

    // Membership checks can be slow
    ctx.defer_ephemeral().await?;

    let outcome = ctx.data().engine.request(&identity).await;
    let text = render::outcome_message(&outcome, &ctx.data().relay);

    ctx.send(poise::CreateReply::default().content(text).ephemeral(true))
        .await?;

    Ok(())
}
