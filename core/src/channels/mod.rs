//! Chat channel bindings

pub mod base;
pub mod discord;

pub use base::Channel;
pub use discord::{DiscordChannel, SerenityGateway};
