//! Per-message context snapshot
//!
//! The channel binding builds one `MessageSnapshot` per incoming message
//! and hands it to the engine. Everything the pipeline needs to resolve,
//! extract and dispatch lives here; nothing reaches back into the platform
//! client except through the `Gateway` trait.

use crate::mention::MemberProfile;
use chrono::{DateTime, Utc};

/// A channel referenced inline in a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelProfile {
    pub id: u64,
    pub name: String,
}

/// A role as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleProfile {
    pub id: u64,
    pub name: String,
}

/// Addressable location of a sent message, for replies and edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: u64,
    pub message_id: u64,
}

/// Situational context captured once per incoming message
#[derive(Debug, Clone)]
pub struct MessageSnapshot {
    /// Conversation scope; history is accumulated per guild
    pub guild_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
    pub sender_id: u64,
    pub sender_name: String,
    pub content: String,
    /// Channel member roster (id, display name, handle)
    pub members: Vec<MemberProfile>,
    /// Channels mentioned inline in the message
    pub channel_mentions: Vec<ChannelProfile>,
    /// Attachment URLs carried by the message
    pub attachments: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl MessageSnapshot {
    pub fn new(
        guild_id: u64,
        channel_id: u64,
        message_id: u64,
        sender_id: u64,
        sender_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            guild_id,
            channel_id,
            message_id,
            sender_id,
            sender_name: sender_name.into(),
            content: content.into(),
            members: Vec::new(),
            channel_mentions: Vec::new(),
            attachments: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// The grouping under which bounded history is accumulated
    pub fn scope(&self) -> u64 {
        self.guild_id
    }

    /// Location of the triggering message
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id,
            message_id: self.message_id,
        }
    }

    pub fn with_members(mut self, members: Vec<MemberProfile>) -> Self {
        self.members = members;
        self
    }

    pub fn with_channel_mentions(mut self, channels: Vec<ChannelProfile>) -> Self {
        self.channel_mentions = channels;
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }
}
