pub mod start;
pub mod stats;

pub use start::start;
pub use stats::stats;

use crate::bot::Data;

type Error = Box<dyn std::error::Error + Send + Sync>;

/// Get all registered commands
pub fn all_commands() -> Vec<poise::Command<Data, Error>> {
    vec![start(), stats()]
}
