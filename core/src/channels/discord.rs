//! Discord channel using serenity
//!
//! Two halves live here, both thin: the event handler that turns incoming
//! Discord messages into `MessageSnapshot`s for the engine, and
//! `SerenityGateway`, which maps the engine's `Gateway` operations onto
//! serenity's HTTP client. Byte transfer for avatar changes stays inside
//! this boundary.

use crate::config::{Config, DiscordConfig};
use crate::dispatch::{Gateway, MemberInfo};
use crate::engine::Engine;
use crate::error::{ChannelError, GatewayError, Result as StewardResult};
use crate::mention::MemberProfile;
use crate::messages::{ChannelProfile, MessageRef, MessageSnapshot, RoleProfile};
use crate::provider::CompletionProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serenity::all::{
    ChannelId, ChannelType, Client, ClientBuilder, Context, CreateAttachment, CreateChannel,
    CreateInvite, CreateMessage, CreateScheduledEvent, CreateThread, EditMember, EditMessage,
    EditProfile, EditRole, EventHandler, GatewayIntents, GuildId, Message, MessageId,
    MessageReference, PermissionOverwrite, PermissionOverwriteType, Permissions, Ready, RoleId,
    ScheduledEventType, Timestamp, UserId,
};
use serenity::http::Http;
use std::sync::Arc;
use std::sync::LazyLock;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Discord's avatar upload limit
const MAX_AVATAR_BYTES: usize = 8 * 1024 * 1024;

static CHANNEL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<#(\d+)>").expect("channel token pattern"));

/// Discord channel binding
pub struct DiscordChannel {
    config: DiscordConfig,
    engine: Arc<Engine>,
    http: Arc<Http>,
    running: Arc<RwLock<bool>>,
}

impl DiscordChannel {
    /// Wire up the HTTP client, gateway and engine from config
    pub fn new(config: &Config, provider: Arc<dyn CompletionProvider>) -> StewardResult<Self> {
        if config.discord.token.is_empty() {
            return Err(ChannelError::NotConfigured("Discord".to_string()).into());
        }

        let http = Arc::new(Http::new(&config.discord.token));
        let gateway = Arc::new(SerenityGateway::new(http.clone()));
        let engine = Arc::new(Engine::new(provider, gateway)?);

        Ok(Self {
            config: config.discord.clone(),
            engine,
            http,
            running: Arc::new(RwLock::new(false)),
        })
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

#[async_trait]
impl super::base::Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    async fn start(&self) -> StewardResult<()> {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::GUILD_MEMBERS;

        let handler = Handler {
            engine: self.engine.clone(),
            config: self.config.clone(),
        };

        let mut client: Client = ClientBuilder::new(&self.config.token, intents)
            .event_handler(handler)
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        *self.running.write().await = true;
        client
            .start()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    async fn stop(&self) -> StewardResult<()> {
        *self.running.write().await = false;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// serenity event handler feeding the engine
struct Handler {
    engine: Arc<Engine>,
    config: DiscordConfig,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, "discord connected");
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        if !self.config.is_allowed(msg.author.id.get()) {
            return;
        }

        let _typing = msg.channel_id.start_typing(&ctx.http);

        let snapshot = build_snapshot(&ctx, &msg, guild_id).await;
        let reply = match self.engine.handle_message(&snapshot).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "engine failed on message");
                "Something went wrong handling that message.".to_string()
            }
        };

        if reply.is_empty() {
            return;
        }
        if let Err(e) = msg.channel_id.say(&ctx.http, reply).await {
            warn!(error = %e, "failed to send reply");
        }
    }
}

/// Capture the per-message context the pipeline needs
async fn build_snapshot(ctx: &Context, msg: &Message, guild_id: GuildId) -> MessageSnapshot {
    let members = match guild_id.members(&ctx.http, None, None).await {
        Ok(members) => members
            .iter()
            .map(|m| MemberProfile {
                id: m.user.id.get(),
                display_name: m.display_name().to_string(),
                name: m.user.name.clone(),
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "failed to fetch channel members");
            Vec::new()
        }
    };

    let mut channel_mentions = Vec::new();
    for cap in CHANNEL_TOKEN.captures_iter(&msg.content) {
        if let Ok(id) = cap[1].parse::<u64>()
            && let Ok(channel) = ctx.http.get_channel(ChannelId::new(id)).await
            && let Some(guild_channel) = channel.guild()
        {
            channel_mentions.push(ChannelProfile {
                id,
                name: guild_channel.name.clone(),
            });
        }
    }

    let attachments = msg.attachments.iter().map(|a| a.url.clone()).collect();

    MessageSnapshot::new(
        guild_id.get(),
        msg.channel_id.get(),
        msg.id.get(),
        msg.author.id.get(),
        msg.author.name.clone(),
        msg.content.clone(),
    )
    .with_members(members)
    .with_channel_mentions(channel_mentions)
    .with_attachments(attachments)
}

/// `Gateway` over serenity's HTTP client
pub struct SerenityGateway {
    http: Arc<Http>,
}

impl SerenityGateway {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Gateway for SerenityGateway {
    async fn send_message(&self, channel_id: u64, text: &str) -> Result<MessageRef, GatewayError> {
        let sent = ChannelId::new(channel_id)
            .say(self.http.as_ref(), text)
            .await?;
        Ok(MessageRef {
            channel_id,
            message_id: sent.id.get(),
        })
    }

    async fn reply(&self, to: &MessageRef, text: &str) -> Result<MessageRef, GatewayError> {
        let reference =
            MessageReference::from((ChannelId::new(to.channel_id), MessageId::new(to.message_id)));
        let sent = ChannelId::new(to.channel_id)
            .send_message(
                self.http.as_ref(),
                CreateMessage::new().content(text).reference_message(reference),
            )
            .await?;
        Ok(MessageRef {
            channel_id: to.channel_id,
            message_id: sent.id.get(),
        })
    }

    async fn edit_message(&self, target: &MessageRef, text: &str) -> Result<(), GatewayError> {
        ChannelId::new(target.channel_id)
            .edit_message(
                self.http.as_ref(),
                MessageId::new(target.message_id),
                EditMessage::new().content(text),
            )
            .await?;
        Ok(())
    }

    async fn create_private_thread(
        &self,
        channel_id: u64,
        name: &str,
    ) -> Result<u64, GatewayError> {
        let thread = ChannelId::new(channel_id)
            .create_thread(
                self.http.as_ref(),
                CreateThread::new(name)
                    .kind(ChannelType::PrivateThread)
                    .invitable(false),
            )
            .await?;
        Ok(thread.id.get())
    }

    async fn add_thread_member(&self, thread_id: u64, user_id: u64) -> Result<(), GatewayError> {
        self.http
            .add_thread_channel_member(ChannelId::new(thread_id), UserId::new(user_id))
            .await?;
        Ok(())
    }

    async fn create_channel(&self, guild_id: u64, name: &str) -> Result<u64, GatewayError> {
        let channel = GuildId::new(guild_id)
            .create_channel(
                self.http.as_ref(),
                CreateChannel::new(name).kind(ChannelType::Text),
            )
            .await?;
        Ok(channel.id.get())
    }

    async fn make_channel_private(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<(), GatewayError> {
        // The @everyone role id equals the guild id
        let overwrite = PermissionOverwrite {
            allow: Permissions::empty(),
            deny: Permissions::VIEW_CHANNEL,
            kind: PermissionOverwriteType::Role(RoleId::new(guild_id)),
        };
        ChannelId::new(channel_id)
            .create_permission(self.http.as_ref(), overwrite)
            .await?;
        Ok(())
    }

    async fn grant_channel_access(
        &self,
        channel_id: u64,
        user_id: u64,
    ) -> Result<(), GatewayError> {
        let overwrite = PermissionOverwrite {
            allow: Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES,
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Member(UserId::new(user_id)),
        };
        ChannelId::new(channel_id)
            .create_permission(self.http.as_ref(), overwrite)
            .await?;
        Ok(())
    }

    async fn create_role(
        &self,
        guild_id: u64,
        name: &str,
        mentionable: bool,
    ) -> Result<u64, GatewayError> {
        let role = GuildId::new(guild_id)
            .create_role(
                self.http.as_ref(),
                EditRole::new().name(name).mentionable(mentionable),
            )
            .await?;
        Ok(role.id.get())
    }

    async fn assign_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
    ) -> Result<(), GatewayError> {
        self.http
            .add_member_role(
                GuildId::new(guild_id),
                UserId::new(user_id),
                RoleId::new(role_id),
                None,
            )
            .await?;
        Ok(())
    }

    async fn remove_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
    ) -> Result<(), GatewayError> {
        self.http
            .remove_member_role(
                GuildId::new(guild_id),
                UserId::new(user_id),
                RoleId::new(role_id),
                None,
            )
            .await?;
        Ok(())
    }

    async fn create_scheduled_event(
        &self,
        guild_id: u64,
        _channel_id: u64,
        name: &str,
        start: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let start_ts = Timestamp::from_unix_timestamp(start.timestamp())
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let end_ts = Timestamp::from_unix_timestamp((start + chrono::Duration::hours(1)).timestamp())
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        GuildId::new(guild_id)
            .create_scheduled_event(
                self.http.as_ref(),
                CreateScheduledEvent::new(ScheduledEventType::External, name, start_ts)
                    .location("this server")
                    .end_time(end_ts),
            )
            .await?;
        Ok(())
    }

    async fn create_invite(
        &self,
        channel_id: u64,
        max_uses: u32,
        temporary: bool,
    ) -> Result<String, GatewayError> {
        let invite = ChannelId::new(channel_id)
            .create_invite(
                self.http.as_ref(),
                CreateInvite::new()
                    .max_uses(max_uses.min(100) as u8)
                    .temporary(temporary),
            )
            .await?;
        Ok(invite.url())
    }

    async fn edit_member_nick(
        &self,
        guild_id: u64,
        user_id: u64,
        nick: &str,
    ) -> Result<(), GatewayError> {
        GuildId::new(guild_id)
            .edit_member(
                self.http.as_ref(),
                UserId::new(user_id),
                EditMember::new().nickname(nick),
            )
            .await?;
        Ok(())
    }

    async fn set_bot_avatar(&self, url: &str) -> Result<(), GatewayError> {
        let bytes = fetch_image(url).await?;
        let attachment = CreateAttachment::bytes(bytes, "avatar.png");

        let mut current = self.http.get_current_user().await?;
        current
            .edit(self.http.as_ref(), EditProfile::new().avatar(&attachment))
            .await?;
        Ok(())
    }

    async fn fetch_member(&self, guild_id: u64, user_id: u64) -> Result<MemberInfo, GatewayError> {
        let member = GuildId::new(guild_id)
            .member(self.http.as_ref(), UserId::new(user_id))
            .await
            .map_err(|_| GatewayError::NotFound(format!("member {}", user_id)))?;
        Ok(MemberInfo {
            profile: MemberProfile {
                id: user_id,
                display_name: member.display_name().to_string(),
                name: member.user.name.clone(),
            },
            is_bot: member.user.bot,
        })
    }

    async fn fetch_channel(&self, channel_id: u64) -> Result<ChannelProfile, GatewayError> {
        let channel = self
            .http
            .get_channel(ChannelId::new(channel_id))
            .await
            .map_err(|_| GatewayError::NotFound(format!("channel {}", channel_id)))?;
        let guild_channel = channel
            .guild()
            .ok_or_else(|| GatewayError::NotFound(format!("channel {}", channel_id)))?;
        Ok(ChannelProfile {
            id: channel_id,
            name: guild_channel.name.clone(),
        })
    }

    async fn list_roles(&self, guild_id: u64) -> Result<Vec<RoleProfile>, GatewayError> {
        let roles = self.http.get_guild_roles(GuildId::new(guild_id)).await?;
        Ok(roles
            .into_iter()
            .map(|r| RoleProfile {
                id: r.id.get(),
                name: r.name,
            })
            .collect())
    }
}

/// Fetch and validate an avatar image
async fn fetch_image(url: &str) -> Result<Vec<u8>, GatewayError> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| GatewayError::Transport(e.to_string()))?;

    if !response.status().is_success() {
        return Err(GatewayError::Transport(format!(
            "failed to fetch image, status {}",
            response.status()
        )));
    }

    let is_image = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("image/"))
        .unwrap_or(false);
    if !is_image {
        return Err(GatewayError::Transport(
            "the URL does not point to a valid image".to_string(),
        ));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| GatewayError::Transport(e.to_string()))?;
    if bytes.len() > MAX_AVATAR_BYTES {
        return Err(GatewayError::Transport(
            "the image is too large, 8 MB at most".to_string(),
        ));
    }

    Ok(bytes.to_vec())
}
