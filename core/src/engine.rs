//! Per-message pipeline
//!
//! One call per incoming message: record history, resume a pending
//! clarification if the sender has one, otherwise resolve intent, extract
//! slots and either dispatch or suspend into a clarification. Every branch
//! ends in a user-visible string; a fully-bound request is dispatched
//! exactly once no matter how many clarification turns led to it.

use crate::clarify::{self, ReplyParse};
use crate::dispatch::{Dispatcher, Gateway};
use crate::error::{Result, StewardError, TimeError};
use crate::extract::Extractor;
use crate::history::{HistoryEntry, HistoryLog};
use crate::messages::MessageSnapshot;
use crate::pending::{PendingRequest, PendingStore};
use crate::provider::CompletionProvider;
use crate::resolver::{IntentResolver, Resolution};
use crate::schema::{ActionSpec, BoundParams, CommandSchema, SlotValue};
use crate::timeparse::ACCEPTED_PATTERNS;
use std::sync::Arc;
use tracing::{info, warn};

/// Author name under which the bot's own replies enter history
const BOT_AUTHOR: &str = "steward";

pub struct Engine {
    schema: Arc<CommandSchema>,
    extractor: Extractor,
    resolver: IntentResolver,
    dispatcher: Dispatcher,
    history: HistoryLog,
    pending: PendingStore,
}

impl Engine {
    /// Build an engine over the builtin command schema
    pub fn new(provider: Arc<dyn CompletionProvider>, gateway: Arc<dyn Gateway>) -> Result<Self> {
        Self::with_schema(CommandSchema::builtin(), provider, gateway)
    }

    /// Build an engine over an explicit schema. Validates the schema and
    /// compiles all extraction rules up front.
    pub fn with_schema(
        schema: CommandSchema,
        provider: Arc<dyn CompletionProvider>,
        gateway: Arc<dyn Gateway>,
    ) -> Result<Self> {
        schema.validate()?;
        let extractor = Extractor::new(&schema)?;
        let schema = Arc::new(schema);

        Ok(Self {
            resolver: IntentResolver::new(schema.clone(), provider),
            dispatcher: Dispatcher::new(gateway),
            extractor,
            schema,
            history: HistoryLog::new(),
            pending: PendingStore::new(),
        })
    }

    /// Process one incoming message, returning the reply to send
    pub async fn handle_message(&self, snapshot: &MessageSnapshot) -> Result<String> {
        let scope = snapshot.scope();
        self.history
            .record(
                scope,
                HistoryEntry::new(&snapshot.sender_name, &snapshot.content),
            )
            .await;

        // A pending clarification wins over fresh intent resolution
        let reply = match self.pending.peek_for_user(snapshot.sender_id).await {
            Some(pending) => self.resume_pending(pending, snapshot).await?,
            None => self.resolve_and_run(snapshot).await?,
        };

        self.history
            .record(scope, HistoryEntry::new(BOT_AUTHOR, &reply))
            .await;
        Ok(reply)
    }

    async fn resolve_and_run(&self, snapshot: &MessageSnapshot) -> Result<String> {
        let history_block = self.history.render(snapshot.scope()).await;

        let resolution = match self.resolver.resolve(snapshot, &history_block).await {
            Ok(resolution) => resolution,
            Err(StewardError::Provider(e)) => {
                warn!(error = %e, "completion request failed");
                return Ok(
                    "I couldn't reach my language model just now. Please try again.".to_string(),
                );
            }
            Err(e) => return Err(e),
        };

        let (action, model_reply) = match resolution {
            Resolution::Chat(text) => return Ok(text),
            Resolution::Action { action, reply } => (action, reply),
        };

        let Some(spec) = self.schema.get(&action) else {
            // first_named_in only returns schema entries; unreachable in
            // practice but not worth a panic
            warn!(action = %action, "resolved action vanished from schema");
            return Ok("I didn't understand that command.".to_string());
        };
        info!(action = %action, sender = snapshot.sender_id, "resolved intent");

        let mut bound = match self.extractor.extract(spec, &model_reply) {
            Ok(bound) => bound,
            Err(StewardError::Time(TimeError::InvalidFormat(text))) => {
                return Ok(format!(
                    "I couldn't read {:?} as a time. Accepted formats: {}.",
                    text, ACCEPTED_PATTERNS
                ));
            }
            Err(e) => return Err(e),
        };
        supplement_from_attachments(spec, &mut bound, snapshot);

        self.fill_or_dispatch(spec, bound, snapshot).await
    }

    /// The all-required-present check: dispatch, or park the request and
    /// prompt for the single first missing slot
    async fn fill_or_dispatch(
        &self,
        spec: &ActionSpec,
        mut bound: BoundParams,
        snapshot: &MessageSnapshot,
    ) -> Result<String> {
        if let Some(missing) = spec.first_missing_required(&bound) {
            let roles = if missing.name == "role_name" {
                self.dispatcher.roles_for_prompt(snapshot.guild_id).await
            } else {
                Vec::new()
            };
            let prompt = clarify::prompt_for(spec, missing, &roles);

            info!(
                action = spec.name,
                slot = missing.name,
                sender = snapshot.sender_id,
                "awaiting clarification"
            );
            self.pending
                .insert(PendingRequest {
                    user_id: snapshot.sender_id,
                    action: spec.name.to_string(),
                    bound,
                    awaiting_param: missing.name.to_string(),
                    awaiting_kind: missing.kind,
                })
                .await;
            return Ok(prompt);
        }

        spec.apply_defaults(&mut bound);
        Ok(self.dispatcher.dispatch(snapshot, spec.name, &bound).await)
    }

    /// The sender has a parked request; their whole message is the value
    /// of the awaited slot.
    async fn resume_pending(
        &self,
        pending: PendingRequest,
        snapshot: &MessageSnapshot,
    ) -> Result<String> {
        let Some(spec) = self.schema.get(&pending.action) else {
            self.pending
                .remove(pending.user_id, pending.awaiting_kind)
                .await;
            warn!(action = %pending.action, "pending action vanished from schema");
            return Ok("I lost track of that request; please retry the command.".to_string());
        };

        // An attachment can stand in for a URL slot answered without text
        let parsed = if pending.awaiting_param == "url"
            && snapshot.content.trim().is_empty()
            && let Some(url) = snapshot.attachments.first()
        {
            ReplyParse::Value(SlotValue::Str(url.clone()))
        } else {
            clarify::parse_reply(pending.awaiting_kind, &snapshot.content)
        };

        match parsed {
            // Only mention slots survive an unusable reply
            ReplyParse::NoMention => Ok(clarify::reprompt_for_mention(spec)),
            ReplyParse::Malformed(reason) => {
                self.pending
                    .remove(pending.user_id, pending.awaiting_kind)
                    .await;
                Ok(clarify::retry_whole_command(spec, &reason))
            }
            ReplyParse::Value(value) => {
                self.pending
                    .remove(pending.user_id, pending.awaiting_kind)
                    .await;
                let mut bound = pending.bound;
                bound.insert(pending.awaiting_param, value);
                self.fill_or_dispatch(spec, bound, snapshot).await
            }
        }
    }

    /// Direct access to the pending store (inspection, tests)
    pub fn pending(&self) -> &PendingStore {
        &self.pending
    }

    /// Direct access to the history log (inspection, tests)
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }
}

/// Bind the first attachment URL when `set_avatar` came without one
fn supplement_from_attachments(
    spec: &ActionSpec,
    bound: &mut BoundParams,
    snapshot: &MessageSnapshot,
) {
    if spec.param("url").is_some()
        && !bound.contains_key("url")
        && let Some(url) = snapshot.attachments.first()
    {
        bound.insert("url".to_string(), SlotValue::Str(url.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::schema::ParamKind;
    use crate::testing::{RecordingGateway, ScriptedProvider};
    use async_trait::async_trait;

    fn snapshot_from(user: u64, content: &str) -> MessageSnapshot {
        MessageSnapshot::new(100, 200, 300, user, format!("user{}", user), content)
    }

    fn engine_with(
        replies: &[&str],
        gateway: Arc<RecordingGateway>,
    ) -> (Engine, Arc<ScriptedProvider>) {
        let provider = Arc::new(ScriptedProvider::new(replies));
        let engine = Engine::new(provider.clone(), gateway).unwrap();
        (engine, provider)
    }

    #[tokio::test]
    async fn test_fully_bound_dispatches_once() {
        let gateway = Arc::new(RecordingGateway::with_members(&[(1, "Alice", false)]));
        let (engine, provider) =
            engine_with(&["create_group_chat(user_mentions=[@1])"], gateway.clone());

        let reply = engine
            .handle_message(&snapshot_from(40, "group chat with alice"))
            .await
            .unwrap();

        assert_eq!(reply, "Private thread created!");
        assert_eq!(gateway.calls_matching("create_private_thread"), 1);
        assert_eq!(provider.prompts().len(), 1);
        assert!(engine.pending().is_empty().await);
    }

    #[tokio::test]
    async fn test_chat_fallback_is_verbatim() {
        let gateway = Arc::new(RecordingGateway::new());
        let (engine, _) = engine_with(&["Happy to help! What's up?"], gateway.clone());

        let reply = engine
            .handle_message(&snapshot_from(40, "hello there"))
            .await
            .unwrap();

        assert_eq!(reply, "Happy to help! What's up?");
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_slot_prompts_and_parks() {
        let gateway = Arc::new(RecordingGateway::with_members(&[(2, "Robo", true)]));
        let (engine, _) = engine_with(&["rename_bot(new_name=\"Steward\")"], gateway.clone());

        let reply = engine
            .handle_message(&snapshot_from(40, "rename the bot to Steward"))
            .await
            .unwrap();

        assert!(reply.contains("@-mention"));
        let parked = engine.pending().peek_for_user(40).await.unwrap();
        assert_eq!(parked.action, "rename_bot");
        assert_eq!(parked.awaiting_param, "bot_mention");
        assert_eq!(gateway.calls_matching("edit_member_nick"), 0);
    }

    #[tokio::test]
    async fn test_clarification_resumes_and_dispatches_once() {
        let gateway = Arc::new(RecordingGateway::with_members(&[(2, "Robo", true)]));
        let (engine, provider) =
            engine_with(&["rename_bot(new_name=\"Steward\")"], gateway.clone());

        engine
            .handle_message(&snapshot_from(40, "rename the bot"))
            .await
            .unwrap();
        let reply = engine
            .handle_message(&snapshot_from(40, "<@2>"))
            .await
            .unwrap();

        assert_eq!(reply, "✅ Successfully changed bot's name to **Steward**!");
        assert_eq!(gateway.calls_matching("edit_member_nick"), 1);
        assert!(engine.pending().is_empty().await);
        // The clarification turn never re-ran intent resolution
        assert_eq!(provider.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_mention_slot_survives_mentionless_reply() {
        let gateway = Arc::new(RecordingGateway::with_members(&[(2, "Robo", true)]));
        let (engine, _) = engine_with(&["rename_bot(new_name=\"Steward\")"], gateway.clone());

        engine
            .handle_message(&snapshot_from(40, "rename the bot"))
            .await
            .unwrap();
        let reply = engine
            .handle_message(&snapshot_from(40, "the tall one"))
            .await
            .unwrap();

        assert!(reply.contains("still need a mention"));
        assert!(engine.pending().peek_for_user(40).await.is_some());

        // A proper mention then completes the original request
        let done = engine
            .handle_message(&snapshot_from(40, "oh, <@2>"))
            .await
            .unwrap();
        assert!(done.contains("Successfully changed"));
        assert_eq!(gateway.calls_matching("edit_member_nick"), 1);
    }

    #[tokio::test]
    async fn test_malformed_reply_consumes_and_asks_for_retry() {
        let gateway = Arc::new(RecordingGateway::new());
        let (engine, _) = engine_with(&["create_channel(private=true)"], gateway.clone());

        let prompt = engine
            .handle_message(&snapshot_from(40, "make a private channel"))
            .await
            .unwrap();
        assert!(prompt.contains("name"));

        let reply = engine
            .handle_message(&snapshot_from(40, "   "))
            .await
            .unwrap();

        assert!(reply.contains("retry the whole command"));
        assert!(engine.pending().is_empty().await);
        assert_eq!(gateway.calls_matching("create_channel"), 0);
    }

    #[tokio::test]
    async fn test_multi_slot_fill_one_at_a_time() {
        let gateway = Arc::new(RecordingGateway::with_members(&[(1, "Alice", false)]));
        gateway.add_role(5, "raiders");
        let (engine, _) = engine_with(&["assign_role()"], gateway.clone());

        // Both required slots missing: the target user is asked first
        let first = engine
            .handle_message(&snapshot_from(40, "give someone the raiders role"))
            .await
            .unwrap();
        assert!(first.contains("@-mention"));

        // Mention supplied; the role name is asked next, with live roles
        let second = engine
            .handle_message(&snapshot_from(40, "<@1>"))
            .await
            .unwrap();
        assert!(second.contains("Which role"));
        assert!(second.contains("raiders"));

        let third = engine
            .handle_message(&snapshot_from(40, "raiders"))
            .await
            .unwrap();
        assert_eq!(third, "Gave **Alice** the role **raiders**.");
        assert_eq!(gateway.calls_matching("assign_role"), 1);
        assert!(engine.pending().is_empty().await);
    }

    #[tokio::test]
    async fn test_pending_requests_of_different_kinds_coexist() {
        let gateway = Arc::new(RecordingGateway::with_members(&[(2, "Robo", true)]));
        let (engine, _) = engine_with(&["rename_bot(new_name=\"Steward\")"], gateway.clone());

        // Park a mention request through the pipeline, then a
        // quoted-string request directly.
        engine
            .handle_message(&snapshot_from(40, "rename the bot"))
            .await
            .unwrap();
        engine
            .pending()
            .insert(PendingRequest {
                user_id: 40,
                action: "create_channel".to_string(),
                bound: BoundParams::new(),
                awaiting_param: "name".to_string(),
                awaiting_kind: ParamKind::QuotedStr,
            })
            .await;
        assert_eq!(engine.pending().len().await, 2);

        // The mention-kind request is answered first; the other survives
        engine
            .handle_message(&snapshot_from(40, "<@2>"))
            .await
            .unwrap();
        let left = engine.pending().peek_for_user(40).await.unwrap();
        assert_eq!(left.action, "create_channel");
    }

    #[tokio::test]
    async fn test_attachment_stands_in_for_avatar_url() {
        let gateway = Arc::new(RecordingGateway::with_members(&[(2, "Robo", true)]));
        let (engine, _) = engine_with(&["set_avatar(bot_mention=@2)"], gateway.clone());

        let snapshot = snapshot_from(40, "use this picture as the bot avatar")
            .with_attachments(vec!["https://cdn.example/cat.png".to_string()]);
        let reply = engine.handle_message(&snapshot).await.unwrap();

        assert_eq!(reply, "✅ Bot avatar changed successfully!");
        assert!(gateway
            .calls()
            .contains(&"set_bot_avatar(https://cdn.example/cat.png)".to_string()));
    }

    #[tokio::test]
    async fn test_unreadable_duration_names_accepted_patterns() {
        let gateway = Arc::new(RecordingGateway::new());
        let (engine, _) = engine_with(
            &["remind(message=\"standup\", delay=whenever)"],
            gateway.clone(),
        );

        let reply = engine
            .handle_message(&snapshot_from(40, "remind me whenever"))
            .await
            .unwrap();

        assert!(reply.contains("Accepted formats"));
        assert!(reply.contains("YYYY-MM-DD"));
        assert!(engine.pending().is_empty().await);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_bounded_per_scope() {
        let gateway = Arc::new(RecordingGateway::new());
        let (engine, _) = engine_with(&["just chatting"], gateway);

        for i in 0..12 {
            engine
                .handle_message(&snapshot_from(40, &format!("message {}", i)))
                .await
                .unwrap();
        }

        assert_eq!(engine.history().len(100).await, 10);
    }

    #[tokio::test]
    async fn test_provider_failure_is_user_visible() {
        struct DownProvider;

        #[async_trait]
        impl CompletionProvider for DownProvider {
            async fn complete(&self, _: &str) -> std::result::Result<String, ProviderError> {
                Err(ProviderError::RequestFailed("503".to_string()))
            }
        }

        let gateway = Arc::new(RecordingGateway::new());
        let engine = Engine::new(Arc::new(DownProvider), gateway).unwrap();

        let reply = engine
            .handle_message(&snapshot_from(40, "hello"))
            .await
            .unwrap();
        assert!(reply.contains("couldn't reach"));
    }
}
