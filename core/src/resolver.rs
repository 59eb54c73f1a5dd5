//! Intent resolution
//!
//! Builds the model prompt from the message snapshot and bounded history,
//! sends a single completion request, and classifies the reply against the
//! command schema: the first action name found as a substring, in declared
//! order, wins. A reply naming no action is a conversational fallback and
//! goes back to the user verbatim.

use crate::error::Result;
use crate::mention::format_roster;
use crate::messages::MessageSnapshot;
use crate::provider::CompletionProvider;
use crate::schema::CommandSchema;
use std::sync::Arc;
use tracing::debug;

/// Outcome of resolving one message
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A known action was named in the reply
    Action {
        action: String,
        /// The model's full reply, kept for slot extraction
        reply: String,
    },
    /// No action named; the reply itself is the response
    Chat(String),
}

/// Maps raw model text to an action definition
pub struct IntentResolver {
    schema: Arc<CommandSchema>,
    provider: Arc<dyn CompletionProvider>,
}

impl IntentResolver {
    pub fn new(schema: Arc<CommandSchema>, provider: Arc<dyn CompletionProvider>) -> Self {
        Self { schema, provider }
    }

    /// One model round-trip, then classification
    pub async fn resolve(
        &self,
        snapshot: &MessageSnapshot,
        history_block: &str,
    ) -> Result<Resolution> {
        let prompt = self.build_prompt(snapshot, history_block);
        let reply = self.provider.complete(&prompt).await?;
        debug!(reply = %reply, "model reply");

        match self.schema.first_named_in(&reply) {
            Some(action) => Ok(Resolution::Action {
                action: action.name.to_string(),
                reply,
            }),
            None => Ok(Resolution::Chat(reply)),
        }
    }

    /// Fixed instruction text plus the situational context, one request
    fn build_prompt(&self, snapshot: &MessageSnapshot, history_block: &str) -> String {
        let mut commands = String::new();
        for action in self.schema.actions() {
            let params: Vec<String> = action
                .params
                .iter()
                .map(|p| {
                    if p.required {
                        format!("{}: {}", p.name, p.kind.label())
                    } else {
                        format!("{}: {} (optional)", p.name, p.kind.label())
                    }
                })
                .collect();
            commands.push_str(&format!(
                "- {}({}) — {}\n  e.g. {}\n",
                action.name,
                params.join(", "),
                action.description,
                action.usage
            ));
        }

        let channels = snapshot
            .channel_mentions
            .iter()
            .map(|c| format!("({}, #{})", c.id, c.name))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are a friendly Discord assistant. You live on a Discord server \
and help users with their server. You have access to the following commands:\n\
{commands}\n\
If you think a user wants to use a command, respond with only the command name \
and its arguments, exactly in the example syntax. Mentions are written as @id. \
If the user means themselves, use the sender id. Otherwise reply \
conversationally.\n\n\
Conversation so far:\n{history}\n\n\
Channel members (id, display name, handle):\n{roster}\n\n\
Channels mentioned (id, name):\n{channels}\n\n\
Sender: {sender_id} ({sender_name})\n\
Content: {content}",
            commands = commands,
            history = history_block,
            roster = format_roster(&snapshot.members),
            channels = channels,
            sender_id = snapshot.sender_id,
            sender_name = snapshot.sender_name,
            content = snapshot.content,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::mention::MemberProfile;
    use async_trait::async_trait;

    struct CannedProvider {
        reply: String,
    }

    #[async_trait]
    impl CompletionProvider for CannedProvider {
        async fn complete(&self, _prompt: &str) -> std::result::Result<String, ProviderError> {
            Ok(self.reply.clone())
        }
    }

    fn resolver(reply: &str) -> IntentResolver {
        IntentResolver::new(
            Arc::new(CommandSchema::builtin()),
            Arc::new(CannedProvider {
                reply: reply.to_string(),
            }),
        )
    }

    fn snapshot() -> MessageSnapshot {
        MessageSnapshot::new(1, 2, 3, 40, "alice", "make a group chat with bob").with_members(
            vec![MemberProfile {
                id: 41,
                display_name: "Bob".to_string(),
                name: "bob".to_string(),
            }],
        )
    }

    #[tokio::test]
    async fn test_resolves_named_action() {
        let r = resolver("create_group_chat(user_mentions=[@41])");
        match r.resolve(&snapshot(), "").await.unwrap() {
            Resolution::Action { action, reply } => {
                assert_eq!(action, "create_group_chat");
                assert!(reply.contains("@41"));
            }
            other => panic!("expected action, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_action_falls_back_to_chat() {
        let r = resolver("Sure! What would you like to chat about?");
        match r.resolve(&snapshot(), "").await.unwrap() {
            Resolution::Chat(text) => assert!(text.starts_with("Sure!")),
            other => panic!("expected chat, got {:?}", other),
        }
    }

    #[test]
    fn test_prompt_carries_context() {
        let r = resolver("");
        let snap = snapshot();
        let prompt = r.build_prompt(&snap, "alice: earlier message");
        assert!(prompt.contains("create_group_chat"));
        assert!(prompt.contains("(41, Bob, bob)"));
        assert!(prompt.contains("Sender: 40 (alice)"));
        assert!(prompt.contains("earlier message"));
    }
}
