//! Action dispatch
//!
//! Takes a fully-bound parameter set and invokes the matching platform
//! operation exactly once. Every outcome — success, permission failure,
//! transport failure, semantic validation failure — is normalized into a
//! user-visible string here; nothing propagates out as a fault.

use crate::error::{CommandError, GatewayError};
use crate::mention::MemberProfile;
use crate::messages::{ChannelProfile, MessageRef, MessageSnapshot, RoleProfile};
use crate::schema::BoundParams;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, warn};

/// Nickname bounds enforced before touching the platform
const NICK_MIN: usize = 2;
const NICK_MAX: usize = 32;

/// A member as fetched from the platform
#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub profile: MemberProfile,
    pub is_bot: bool,
}

/// The chat-platform boundary consumed by the dispatcher.
///
/// Every operation may fail with a permission denial or a generic
/// transport error; both are recoverable.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn send_message(&self, channel_id: u64, text: &str) -> Result<MessageRef, GatewayError>;
    async fn reply(&self, to: &MessageRef, text: &str) -> Result<MessageRef, GatewayError>;
    async fn edit_message(&self, target: &MessageRef, text: &str) -> Result<(), GatewayError>;

    async fn create_private_thread(
        &self,
        channel_id: u64,
        name: &str,
    ) -> Result<u64, GatewayError>;
    async fn add_thread_member(&self, thread_id: u64, user_id: u64) -> Result<(), GatewayError>;

    async fn create_channel(&self, guild_id: u64, name: &str) -> Result<u64, GatewayError>;
    /// Deny @everyone on the channel via a permission overwrite
    async fn make_channel_private(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<(), GatewayError>;
    /// Allow one member into a channel via a permission overwrite
    async fn grant_channel_access(
        &self,
        channel_id: u64,
        user_id: u64,
    ) -> Result<(), GatewayError>;

    async fn create_role(
        &self,
        guild_id: u64,
        name: &str,
        mentionable: bool,
    ) -> Result<u64, GatewayError>;
    async fn assign_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
    ) -> Result<(), GatewayError>;
    async fn remove_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
    ) -> Result<(), GatewayError>;

    async fn create_scheduled_event(
        &self,
        guild_id: u64,
        channel_id: u64,
        name: &str,
        start: DateTime<Utc>,
    ) -> Result<(), GatewayError>;
    async fn create_invite(
        &self,
        channel_id: u64,
        max_uses: u32,
        temporary: bool,
    ) -> Result<String, GatewayError>;

    async fn edit_member_nick(
        &self,
        guild_id: u64,
        user_id: u64,
        nick: &str,
    ) -> Result<(), GatewayError>;
    async fn set_bot_avatar(&self, url: &str) -> Result<(), GatewayError>;

    async fn fetch_member(&self, guild_id: u64, user_id: u64) -> Result<MemberInfo, GatewayError>;
    async fn fetch_channel(&self, channel_id: u64) -> Result<ChannelProfile, GatewayError>;
    async fn list_roles(&self, guild_id: u64) -> Result<Vec<RoleProfile>, GatewayError>;
}

/// Invokes external actions and normalizes their outcomes
pub struct Dispatcher {
    gateway: Arc<dyn Gateway>,
}

impl Dispatcher {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Live role names for clarification prompts; empty on any failure
    pub async fn roles_for_prompt(&self, guild_id: u64) -> Vec<RoleProfile> {
        self.gateway.list_roles(guild_id).await.unwrap_or_default()
    }

    /// Invoke `action` with its fully-bound parameters. Called at most
    /// once per resolved request; always yields a user-visible string.
    pub async fn dispatch(
        &self,
        snapshot: &MessageSnapshot,
        action: &str,
        bound: &BoundParams,
    ) -> String {
        match action {
            "create_group_chat" => self.create_group_chat(snapshot, bound).await,
            "add_to_channel" => self.add_to_channel(snapshot, bound).await,
            "create_channel" => self.create_channel(snapshot, bound).await,
            "create_role" => self.create_role(snapshot, bound).await,
            "assign_role" => self.change_member_role(snapshot, bound, true).await,
            "revoke_role" => self.change_member_role(snapshot, bound, false).await,
            "schedule_event" => self.schedule_event(snapshot, bound).await,
            "create_invite" => self.create_invite(snapshot, bound).await,
            "rename_bot" => self.rename_bot(snapshot, bound).await,
            "set_avatar" => self.set_avatar(snapshot, bound).await,
            "remind" => self.remind(snapshot, bound).await,
            other => {
                warn!(action = other, "dispatch of unknown action");
                CommandError::UnknownAction(other.to_string()).to_string()
            }
        }
    }

    async fn create_group_chat(&self, snapshot: &MessageSnapshot, bound: &BoundParams) -> String {
        let Some(ids) = bound.get("user_mentions").and_then(|v| v.as_mentions()) else {
            return binding_error("create_group_chat");
        };

        let members = self.resolve_members(snapshot.guild_id, ids).await;
        if members.is_empty() {
            return "No valid users found. Please check the user IDs.".to_string();
        }

        let names: Vec<&str> = members.iter().map(|m| m.display_name.as_str()).collect();
        let thread_name = format!("Private Chat with {}", names.join(", "));

        let thread_id = match self
            .gateway
            .create_private_thread(snapshot.channel_id, &thread_name)
            .await
        {
            Ok(id) => id,
            Err(GatewayError::PermissionDenied) => {
                return "I don't have permission to create private threads!".to_string();
            }
            Err(e) => return transport_text("create the thread", &e),
        };

        for member in &members {
            if let Err(e) = self.gateway.add_thread_member(thread_id, member.id).await {
                return failure_text("add users to the thread", e);
            }
        }

        let mentions: Vec<String> = members.iter().map(|m| format!("<@{}>", m.id)).collect();
        let welcome = format!("Private thread created! Welcome {}!", mentions.join(", "));
        if let Err(e) = self.gateway.send_message(thread_id, &welcome).await {
            return failure_text("post in the new thread", e);
        }

        "Private thread created!".to_string()
    }

    async fn add_to_channel(&self, snapshot: &MessageSnapshot, bound: &BoundParams) -> String {
        let (Some(user_ids), Some(channel_ids)) = (
            bound.get("user_mentions").and_then(|v| v.as_mentions()),
            bound.get("channel_mentions").and_then(|v| v.as_mentions()),
        ) else {
            return binding_error("add_to_channel");
        };

        let members = self.resolve_members(snapshot.guild_id, user_ids).await;
        if members.is_empty() {
            return "No valid users found. Please check the user IDs.".to_string();
        }

        let mut channels = Vec::new();
        for id in channel_ids {
            if let Ok(channel) = self.gateway.fetch_channel(*id).await {
                channels.push(channel);
            }
        }
        if channels.is_empty() {
            return "No valid channels found. Please check the channel IDs.".to_string();
        }

        let user_names: Vec<&str> = members.iter().map(|m| m.display_name.as_str()).collect();
        let channel_names: Vec<&str> = channels.iter().map(|c| c.name.as_str()).collect();

        // Progress message, edited in place when the work is done
        let progress = match self
            .gateway
            .reply(
                &snapshot.message_ref(),
                &format!(
                    "Adding {} to Channel {}",
                    user_names.join(", "),
                    channel_names.join(", ")
                ),
            )
            .await
        {
            Ok(msg_ref) => msg_ref,
            Err(e) => return failure_text("post a progress message", e),
        };

        for channel in &channels {
            for member in &members {
                if let Err(e) = self.gateway.grant_channel_access(channel.id, member.id).await {
                    return match e {
                        GatewayError::PermissionDenied => {
                            "I don't have permission to add users to channels!".to_string()
                        }
                        other => transport_text("add users to channels", &other),
                    };
                }
            }
            let mentions: Vec<String> = members.iter().map(|m| format!("<@{}>", m.id)).collect();
            if let Err(e) = self
                .gateway
                .send_message(channel.id, &format!("Welcome {}!", mentions.join(", ")))
                .await
            {
                return failure_text("welcome users in the channel", e);
            }
        }

        let done = format!(
            "Finished adding {} to Channel {}",
            user_names.join(", "),
            channel_names.join(", ")
        );
        if let Err(e) = self.gateway.edit_message(&progress, &done).await {
            return failure_text("update the progress message", e);
        }

        done
    }

    async fn create_channel(&self, snapshot: &MessageSnapshot, bound: &BoundParams) -> String {
        let Some(name) = bound.get("name").and_then(|v| v.as_str()) else {
            return binding_error("create_channel");
        };
        let private = bound
            .get("private")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        if name.is_empty() || name.len() > 100 {
            return CommandError::NameLength {
                len: name.len(),
                min: 1,
                max: 100,
            }
            .to_string();
        }

        let channel_id = match self.gateway.create_channel(snapshot.guild_id, name).await {
            Ok(id) => id,
            Err(e) => return failure_text("create the channel", e),
        };

        if private {
            if let Err(e) = self
                .gateway
                .make_channel_private(snapshot.guild_id, channel_id)
                .await
            {
                return failure_text("make the channel private", e);
            }
            return format!("Created private channel **{}**.", name);
        }

        format!("Created channel **{}**.", name)
    }

    async fn create_role(&self, snapshot: &MessageSnapshot, bound: &BoundParams) -> String {
        let Some(name) = bound.get("name").and_then(|v| v.as_str()) else {
            return binding_error("create_role");
        };
        let mentionable = bound
            .get("mentionable")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        if name.is_empty() || name.len() > 100 {
            return CommandError::NameLength {
                len: name.len(),
                min: 1,
                max: 100,
            }
            .to_string();
        }

        match self
            .gateway
            .create_role(snapshot.guild_id, name, mentionable)
            .await
        {
            Ok(_) => format!("Created role **{}**.", name),
            Err(e) => failure_text("create the role", e),
        }
    }

    async fn change_member_role(
        &self,
        snapshot: &MessageSnapshot,
        bound: &BoundParams,
        assign: bool,
    ) -> String {
        let (Some(user_id), Some(role_name)) = (
            bound.get("user_mention").and_then(|v| v.as_mention()),
            bound.get("role_name").and_then(|v| v.as_str()),
        ) else {
            return binding_error(if assign { "assign_role" } else { "revoke_role" });
        };

        let member = match self.gateway.fetch_member(snapshot.guild_id, user_id).await {
            Ok(m) => m,
            Err(_) => return "No valid users found. Please check the user IDs.".to_string(),
        };

        let roles = match self.gateway.list_roles(snapshot.guild_id).await {
            Ok(roles) => roles,
            Err(e) => return failure_text("look up server roles", e),
        };
        let Some(role) = roles
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(role_name))
        else {
            return CommandError::UnknownRole(role_name.to_string()).to_string();
        };

        let result = if assign {
            self.gateway
                .assign_role(snapshot.guild_id, user_id, role.id)
                .await
        } else {
            self.gateway
                .remove_role(snapshot.guild_id, user_id, role.id)
                .await
        };

        match result {
            Ok(()) if assign => format!(
                "Gave **{}** the role **{}**.",
                member.profile.display_name, role.name
            ),
            Ok(()) => format!(
                "Removed the role **{}** from **{}**.",
                role.name, member.profile.display_name
            ),
            Err(e) => failure_text("change member roles", e),
        }
    }

    async fn schedule_event(&self, snapshot: &MessageSnapshot, bound: &BoundParams) -> String {
        let (Some(name), Some(start)) = (
            bound.get("name").and_then(|v| v.as_str()),
            bound.get("start_time").and_then(|v| v.as_instant()),
        ) else {
            return binding_error("schedule_event");
        };

        match self
            .gateway
            .create_scheduled_event(snapshot.guild_id, snapshot.channel_id, name, start)
            .await
        {
            Ok(()) => format!(
                "Scheduled **{}** for {} UTC.",
                name,
                start.format("%Y-%m-%d %H:%M")
            ),
            Err(e) => failure_text("create the event", e),
        }
    }

    async fn create_invite(&self, snapshot: &MessageSnapshot, bound: &BoundParams) -> String {
        let max_uses = bound
            .get("max_uses")
            .and_then(|v| v.as_int())
            .unwrap_or(0)
            .max(0) as u32;
        let temporary = bound
            .get("temporary")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        match self
            .gateway
            .create_invite(snapshot.channel_id, max_uses, temporary)
            .await
        {
            Ok(url) => format!("Here's your invite: {}", url),
            Err(e) => failure_text("create an invite", e),
        }
    }

    async fn rename_bot(&self, snapshot: &MessageSnapshot, bound: &BoundParams) -> String {
        let (Some(bot_id), Some(new_name)) = (
            bound.get("bot_mention").and_then(|v| v.as_mention()),
            bound.get("new_name").and_then(|v| v.as_str()),
        ) else {
            return binding_error("rename_bot");
        };

        let member = match self.gateway.fetch_member(snapshot.guild_id, bot_id).await {
            Ok(m) => m,
            Err(_) => return "No valid users found. Please check the user IDs.".to_string(),
        };
        if !member.is_bot {
            return "❌ The mentioned user is not a bot.".to_string();
        }
        if new_name.len() < NICK_MIN || new_name.len() > NICK_MAX {
            return format!(
                "❌ {}",
                CommandError::NameLength {
                    len: new_name.len(),
                    min: NICK_MIN,
                    max: NICK_MAX,
                }
            );
        }

        match self
            .gateway
            .edit_member_nick(snapshot.guild_id, bot_id, new_name)
            .await
        {
            Ok(()) => format!("✅ Successfully changed bot's name to **{}**!", new_name),
            Err(GatewayError::PermissionDenied) => {
                "❌ I don't have permission to change the bot's name.".to_string()
            }
            Err(e) => {
                error!(error = %e, "nickname edit failed");
                format!("❌ Failed to change name: {}", e)
            }
        }
    }

    async fn set_avatar(&self, snapshot: &MessageSnapshot, bound: &BoundParams) -> String {
        let (Some(bot_id), Some(url)) = (
            bound.get("bot_mention").and_then(|v| v.as_mention()),
            bound.get("url").and_then(|v| v.as_str()),
        ) else {
            return binding_error("set_avatar");
        };

        let member = match self.gateway.fetch_member(snapshot.guild_id, bot_id).await {
            Ok(m) => m,
            Err(_) => return "No valid users found. Please check the user IDs.".to_string(),
        };
        if !member.is_bot {
            return "❌ The mentioned user is not a bot.".to_string();
        }

        let url = url.trim().trim_matches(|c| c == '"' || c == '\'');
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return format!("❌ {}", CommandError::InvalidUrl);
        }

        match self.gateway.set_bot_avatar(url).await {
            Ok(()) => "✅ Bot avatar changed successfully!".to_string(),
            Err(GatewayError::PermissionDenied) => {
                "❌ I don't have permission to change the avatar.".to_string()
            }
            Err(e) => {
                error!(error = %e, "avatar change failed");
                format!("❌ Error changing avatar: {}", e)
            }
        }
    }

    /// Delayed send. Blocks its own handling path for the full delay; a
    /// caller wanting bounded latency imposes a timeout at this boundary.
    async fn remind(&self, snapshot: &MessageSnapshot, bound: &BoundParams) -> String {
        let (Some(message), Some(due)) = (
            bound.get("message").and_then(|v| v.as_str()),
            bound.get("delay").and_then(|v| v.as_instant()),
        ) else {
            return binding_error("remind");
        };

        let wait = (due - Utc::now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        match self
            .gateway
            .send_message(snapshot.channel_id, &format!("⏰ Reminder: {}", message))
            .await
        {
            Ok(_) => "Reminder delivered!".to_string(),
            Err(e) => failure_text("deliver the reminder", e),
        }
    }

    /// Fetch each mentioned member, silently dropping unknown ids
    async fn resolve_members(&self, guild_id: u64, ids: &[u64]) -> Vec<MemberProfile> {
        let mut members = Vec::new();
        for id in ids {
            if let Ok(info) = self.gateway.fetch_member(guild_id, *id).await {
                members.push(info.profile);
            }
        }
        members
    }
}

fn binding_error(action: &str) -> String {
    warn!(action, "dispatch reached with unbound parameters");
    "Something went wrong binding that command's parameters.".to_string()
}

fn failure_text(what: &str, err: GatewayError) -> String {
    match err {
        GatewayError::PermissionDenied => {
            format!("I don't have permission to {}!", what)
        }
        other => transport_text(what, &other),
    }
}

fn transport_text(what: &str, err: &GatewayError) -> String {
    error!(error = %err, "platform operation failed");
    format!("Failed to {}. Please try again later. ({})", what, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SlotValue;
    use crate::testing::RecordingGateway;

    fn snapshot() -> MessageSnapshot {
        MessageSnapshot::new(100, 200, 300, 400, "alice", "do the thing")
    }

    fn bound(entries: &[(&str, SlotValue)]) -> BoundParams {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_group_chat_happy_path() {
        let gateway = Arc::new(RecordingGateway::with_members(&[(1, "Alice", false)]));
        let dispatcher = Dispatcher::new(gateway.clone());

        let reply = dispatcher
            .dispatch(
                &snapshot(),
                "create_group_chat",
                &bound(&[("user_mentions", SlotValue::Mentions(vec![1]))]),
            )
            .await;

        assert_eq!(reply, "Private thread created!");
        let calls = gateway.calls();
        assert!(calls.iter().any(|c| c.starts_with("create_private_thread")));
        assert!(calls.contains(&"add_thread_member(5000, 1)".to_string()));
    }

    #[tokio::test]
    async fn test_create_group_chat_no_valid_users() {
        let gateway = Arc::new(RecordingGateway::new());
        let dispatcher = Dispatcher::new(gateway.clone());

        let reply = dispatcher
            .dispatch(
                &snapshot(),
                "create_group_chat",
                &bound(&[("user_mentions", SlotValue::Mentions(vec![9]))]),
            )
            .await;

        assert_eq!(reply, "No valid users found. Please check the user IDs.");
        assert!(gateway.calls().iter().all(|c| c.starts_with("fetch_member")));
    }

    #[tokio::test]
    async fn test_permission_denied_is_fixed_text() {
        let gateway = Arc::new(RecordingGateway::with_members(&[(1, "Alice", false)]));
        gateway.deny("create_private_thread");
        let dispatcher = Dispatcher::new(gateway);

        let reply = dispatcher
            .dispatch(
                &snapshot(),
                "create_group_chat",
                &bound(&[("user_mentions", SlotValue::Mentions(vec![1]))]),
            )
            .await;

        assert_eq!(reply, "I don't have permission to create private threads!");
    }

    #[tokio::test]
    async fn test_transport_failure_appends_error() {
        let gateway = Arc::new(RecordingGateway::with_members(&[(1, "Alice", false)]));
        gateway.fail("create_private_thread");
        let dispatcher = Dispatcher::new(gateway);

        let reply = dispatcher
            .dispatch(
                &snapshot(),
                "create_group_chat",
                &bound(&[("user_mentions", SlotValue::Mentions(vec![1]))]),
            )
            .await;

        assert!(reply.starts_with("Failed to create the thread"));
        assert!(reply.contains("simulated outage"));
    }

    #[tokio::test]
    async fn test_add_to_channel_edits_progress_once() {
        let gateway = Arc::new(RecordingGateway::with_members(&[(1, "Alice", false)]));
        gateway.add_channel(70, "general");
        let dispatcher = Dispatcher::new(gateway.clone());

        let reply = dispatcher
            .dispatch(
                &snapshot(),
                "add_to_channel",
                &bound(&[
                    ("user_mentions", SlotValue::Mentions(vec![1])),
                    ("channel_mentions", SlotValue::Mentions(vec![70])),
                ]),
            )
            .await;

        assert_eq!(reply, "Finished adding Alice to Channel general");
        let edits = gateway
            .calls()
            .iter()
            .filter(|c| c.starts_with("edit_message"))
            .count();
        assert_eq!(edits, 1);
    }

    #[tokio::test]
    async fn test_assign_role_unknown_role() {
        let gateway = Arc::new(RecordingGateway::with_members(&[(1, "Alice", false)]));
        gateway.add_role(5, "mods");
        let dispatcher = Dispatcher::new(gateway);

        let reply = dispatcher
            .dispatch(
                &snapshot(),
                "assign_role",
                &bound(&[
                    ("user_mention", SlotValue::Mention(1)),
                    ("role_name", SlotValue::Str("raiders".to_string())),
                ]),
            )
            .await;

        assert_eq!(reply, "No role named \"raiders\" exists on this server");
    }

    #[tokio::test]
    async fn test_assign_role_case_insensitive() {
        let gateway = Arc::new(RecordingGateway::with_members(&[(1, "Alice", false)]));
        gateway.add_role(5, "Raiders");
        let dispatcher = Dispatcher::new(gateway.clone());

        let reply = dispatcher
            .dispatch(
                &snapshot(),
                "assign_role",
                &bound(&[
                    ("user_mention", SlotValue::Mention(1)),
                    ("role_name", SlotValue::Str("raiders".to_string())),
                ]),
            )
            .await;

        assert_eq!(reply, "Gave **Alice** the role **Raiders**.");
        assert!(gateway.calls().contains(&"assign_role(100, 1, 5)".to_string()));
    }

    #[tokio::test]
    async fn test_rename_bot_rejects_non_bot() {
        let gateway = Arc::new(RecordingGateway::with_members(&[(1, "Alice", false)]));
        let dispatcher = Dispatcher::new(gateway.clone());

        let reply = dispatcher
            .dispatch(
                &snapshot(),
                "rename_bot",
                &bound(&[
                    ("bot_mention", SlotValue::Mention(1)),
                    ("new_name", SlotValue::Str("Steward".to_string())),
                ]),
            )
            .await;

        assert_eq!(reply, "❌ The mentioned user is not a bot.");
        // Validation failed before any mutation
        assert!(!gateway.calls().iter().any(|c| c.starts_with("edit_member_nick")));
    }

    #[tokio::test]
    async fn test_rename_bot_name_bounds() {
        let gateway = Arc::new(RecordingGateway::with_members(&[(2, "Robo", true)]));
        let dispatcher = Dispatcher::new(gateway);

        let reply = dispatcher
            .dispatch(
                &snapshot(),
                "rename_bot",
                &bound(&[
                    ("bot_mention", SlotValue::Mention(2)),
                    ("new_name", SlotValue::Str("x".to_string())),
                ]),
            )
            .await;

        assert!(reply.contains("between 2 and 32 characters"));
    }

    #[tokio::test]
    async fn test_set_avatar_rejects_bad_url() {
        let gateway = Arc::new(RecordingGateway::with_members(&[(2, "Robo", true)]));
        let dispatcher = Dispatcher::new(gateway.clone());

        let reply = dispatcher
            .dispatch(
                &snapshot(),
                "set_avatar",
                &bound(&[
                    ("bot_mention", SlotValue::Mention(2)),
                    ("url", SlotValue::Str("ftp://example.com/x.png".to_string())),
                ]),
            )
            .await;

        assert!(reply.contains("must start with http:// or https://"));
        assert!(!gateway.calls().iter().any(|c| c.starts_with("set_bot_avatar")));
    }

    #[tokio::test]
    async fn test_create_invite_defaults() {
        let gateway = Arc::new(RecordingGateway::new());
        let dispatcher = Dispatcher::new(gateway.clone());

        let reply = dispatcher
            .dispatch(
                &snapshot(),
                "create_invite",
                &bound(&[
                    ("max_uses", SlotValue::Int(5)),
                    ("temporary", SlotValue::Bool(false)),
                ]),
            )
            .await;

        assert!(reply.contains("https://discord.gg/"));
        assert!(gateway.calls().contains(&"create_invite(200, 5, false)".to_string()));
    }

    #[tokio::test]
    async fn test_create_channel_private_sets_overwrite() {
        let gateway = Arc::new(RecordingGateway::new());
        let dispatcher = Dispatcher::new(gateway.clone());

        let reply = dispatcher
            .dispatch(
                &snapshot(),
                "create_channel",
                &bound(&[
                    ("name", SlotValue::Str("plans".to_string())),
                    ("private", SlotValue::Bool(true)),
                ]),
            )
            .await;

        assert_eq!(reply, "Created private channel **plans**.");
        assert!(gateway
            .calls()
            .contains(&"make_channel_private(100, 6000)".to_string()));
    }

    #[tokio::test]
    async fn test_schedule_event() {
        let gateway = Arc::new(RecordingGateway::new());
        let dispatcher = Dispatcher::new(gateway.clone());

        let start = Utc::now() + chrono::Duration::hours(2);
        let reply = dispatcher
            .dispatch(
                &snapshot(),
                "schedule_event",
                &bound(&[
                    ("name", SlotValue::Str("movie night".to_string())),
                    ("start_time", SlotValue::Instant(start)),
                ]),
            )
            .await;

        assert!(reply.starts_with("Scheduled **movie night** for"));
        assert_eq!(gateway.calls_matching("create_scheduled_event"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remind_sleeps_then_sends() {
        let gateway = Arc::new(RecordingGateway::new());
        let dispatcher = Dispatcher::new(gateway.clone());

        let due = Utc::now() + chrono::Duration::seconds(30);
        let reply = dispatcher
            .dispatch(
                &snapshot(),
                "remind",
                &bound(&[
                    ("message", SlotValue::Str("standup".to_string())),
                    ("delay", SlotValue::Instant(due)),
                ]),
            )
            .await;

        assert_eq!(reply, "Reminder delivered!");
        assert!(gateway
            .calls()
            .iter()
            .any(|c| c.contains("⏰ Reminder: standup")));
    }
}
