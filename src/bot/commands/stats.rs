use crate::bot::{render, Data};
use crate::model::Identity;

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Show issuance statistics (administrators only)
#[poise::command(slash_command)]
pub async fn stats(ctx: Context<'_>) -> Result<(), Error> {
    let identity = Identity::from(ctx.author().id.get());

    let summary = ctx.data().summary.summarize(&identity).await?;
    let text = render::summary_message(&summary);

    ctx.send(poise::CreateReply::default().content(text).ephemeral(true))
        .await?;

    Ok(())
}
