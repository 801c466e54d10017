pub mod error;
pub mod send;

pub use error::DiscordError;
pub use send::{split_chunks, DiscordPoster, DISCORD_MAX};
