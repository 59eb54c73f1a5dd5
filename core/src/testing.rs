//! Test doubles for the collaborator boundaries
//!
//! `RecordingGateway` answers every platform operation from in-memory
//! tables and records each call as a readable line. `ScriptedProvider`
//! returns canned model replies in order.

use crate::dispatch::{Gateway, MemberInfo};
use crate::error::{GatewayError, ProviderError};
use crate::mention::MemberProfile;
use crate::messages::{ChannelProfile, MessageRef, RoleProfile};
use crate::provider::CompletionProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct RecordingGateway {
    calls: Mutex<Vec<String>>,
    members: Mutex<HashMap<u64, MemberInfo>>,
    channels: Mutex<HashMap<u64, ChannelProfile>>,
    roles: Mutex<Vec<RoleProfile>>,
    denied_ops: Mutex<HashSet<String>>,
    failing_ops: Mutex<HashSet<String>>,
    next_message_id: AtomicU64,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            members: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
            roles: Mutex::new(Vec::new()),
            denied_ops: Mutex::new(HashSet::new()),
            failing_ops: Mutex::new(HashSet::new()),
            next_message_id: AtomicU64::new(9000),
        }
    }

    pub fn with_members(members: &[(u64, &str, bool)]) -> Self {
        let gateway = Self::new();
        for (id, name, is_bot) in members {
            gateway.add_member(*id, name, *is_bot);
        }
        gateway
    }

    pub fn add_member(&self, id: u64, name: &str, is_bot: bool) {
        self.members.lock().unwrap().insert(
            id,
            MemberInfo {
                profile: MemberProfile {
                    id,
                    display_name: name.to_string(),
                    name: name.to_lowercase(),
                },
                is_bot,
            },
        );
    }

    pub fn add_channel(&self, id: u64, name: &str) {
        self.channels.lock().unwrap().insert(
            id,
            ChannelProfile {
                id,
                name: name.to_string(),
            },
        );
    }

    pub fn add_role(&self, id: u64, name: &str) {
        self.roles.lock().unwrap().push(RoleProfile {
            id,
            name: name.to_string(),
        });
    }

    /// Make `op` fail with a permission denial
    pub fn deny(&self, op: &str) {
        self.denied_ops.lock().unwrap().insert(op.to_string());
    }

    /// Make `op` fail with a transport error
    pub fn fail(&self, op: &str) {
        self.failing_ops.lock().unwrap().insert(op.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, line: String) {
        self.calls.lock().unwrap().push(line);
    }

    fn outcome(&self, op: &str) -> Result<(), GatewayError> {
        if self.denied_ops.lock().unwrap().contains(op) {
            return Err(GatewayError::PermissionDenied);
        }
        if self.failing_ops.lock().unwrap().contains(op) {
            return Err(GatewayError::Transport("simulated outage".to_string()));
        }
        Ok(())
    }

    fn next_ref(&self, channel_id: u64) -> MessageRef {
        MessageRef {
            channel_id,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
        }
    }
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for RecordingGateway {
    async fn send_message(&self, channel_id: u64, text: &str) -> Result<MessageRef, GatewayError> {
        self.record(format!("send_message({}, {})", channel_id, text));
        self.outcome("send_message")?;
        Ok(self.next_ref(channel_id))
    }

    async fn reply(&self, to: &MessageRef, text: &str) -> Result<MessageRef, GatewayError> {
        self.record(format!("reply({}, {})", to.message_id, text));
        self.outcome("reply")?;
        Ok(self.next_ref(to.channel_id))
    }

    async fn edit_message(&self, target: &MessageRef, text: &str) -> Result<(), GatewayError> {
        self.record(format!("edit_message({}, {})", target.message_id, text));
        self.outcome("edit_message")
    }

    async fn create_private_thread(
        &self,
        channel_id: u64,
        name: &str,
    ) -> Result<u64, GatewayError> {
        self.record(format!("create_private_thread({}, {})", channel_id, name));
        self.outcome("create_private_thread")?;
        Ok(5000)
    }

    async fn add_thread_member(&self, thread_id: u64, user_id: u64) -> Result<(), GatewayError> {
        self.record(format!("add_thread_member({}, {})", thread_id, user_id));
        self.outcome("add_thread_member")
    }

    async fn create_channel(&self, guild_id: u64, name: &str) -> Result<u64, GatewayError> {
        self.record(format!("create_channel({}, {})", guild_id, name));
        self.outcome("create_channel")?;
        Ok(6000)
    }

    async fn make_channel_private(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<(), GatewayError> {
        self.record(format!("make_channel_private({}, {})", guild_id, channel_id));
        self.outcome("make_channel_private")
    }

    async fn grant_channel_access(
        &self,
        channel_id: u64,
        user_id: u64,
    ) -> Result<(), GatewayError> {
        self.record(format!("grant_channel_access({}, {})", channel_id, user_id));
        self.outcome("grant_channel_access")
    }

    async fn create_role(
        &self,
        guild_id: u64,
        name: &str,
        mentionable: bool,
    ) -> Result<u64, GatewayError> {
        self.record(format!("create_role({}, {}, {})", guild_id, name, mentionable));
        self.outcome("create_role")?;
        Ok(7000)
    }

    async fn assign_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
    ) -> Result<(), GatewayError> {
        self.record(format!("assign_role({}, {}, {})", guild_id, user_id, role_id));
        self.outcome("assign_role")
    }

    async fn remove_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
    ) -> Result<(), GatewayError> {
        self.record(format!("remove_role({}, {}, {})", guild_id, user_id, role_id));
        self.outcome("remove_role")
    }

    async fn create_scheduled_event(
        &self,
        guild_id: u64,
        channel_id: u64,
        name: &str,
        start: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        self.record(format!(
            "create_scheduled_event({}, {}, {}, {})",
            guild_id, channel_id, name, start
        ));
        self.outcome("create_scheduled_event")
    }

    async fn create_invite(
        &self,
        channel_id: u64,
        max_uses: u32,
        temporary: bool,
    ) -> Result<String, GatewayError> {
        self.record(format!(
            "create_invite({}, {}, {})",
            channel_id, max_uses, temporary
        ));
        self.outcome("create_invite")?;
        Ok("https://discord.gg/steward".to_string())
    }

    async fn edit_member_nick(
        &self,
        guild_id: u64,
        user_id: u64,
        nick: &str,
    ) -> Result<(), GatewayError> {
        self.record(format!("edit_member_nick({}, {}, {})", guild_id, user_id, nick));
        self.outcome("edit_member_nick")
    }

    async fn set_bot_avatar(&self, url: &str) -> Result<(), GatewayError> {
        self.record(format!("set_bot_avatar({})", url));
        self.outcome("set_bot_avatar")
    }

    async fn fetch_member(&self, _guild_id: u64, user_id: u64) -> Result<MemberInfo, GatewayError> {
        self.record(format!("fetch_member({})", user_id));
        self.outcome("fetch_member")?;
        self.members
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("member {}", user_id)))
    }

    async fn fetch_channel(&self, channel_id: u64) -> Result<ChannelProfile, GatewayError> {
        self.record(format!("fetch_channel({})", channel_id));
        self.outcome("fetch_channel")?;
        self.channels
            .lock()
            .unwrap()
            .get(&channel_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("channel {}", channel_id)))
    }

    async fn list_roles(&self, _guild_id: u64) -> Result<Vec<RoleProfile>, GatewayError> {
        self.record("list_roles".to_string());
        self.outcome("list_roles")?;
        Ok(self.roles.lock().unwrap().clone())
    }
}

/// Completion provider returning canned replies in order; repeats the last
/// reply when the script runs out
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            Ok(replies.pop_front().unwrap_or_default())
        } else {
            Ok(replies.front().cloned().unwrap_or_default())
        }
    }
}
