//! Static command schema
//!
//! Every action the bot can perform is declared here once, with an ordered
//! parameter list. The intent resolver classifies model replies against
//! this table, the slot extractor pulls values per declared kind, and the
//! clarification flow prompts for the first missing required parameter in
//! declared order. Declared order therefore matters twice: earlier actions
//! win classification ties, and earlier parameters are asked for first
//! (target entity before the value that depends on it).

use crate::error::CommandError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Parameter kinds understood by the slot extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Raw token, quotes optional
    Str,
    /// Double-quoted string
    QuotedStr,
    /// Bracketed, comma-separated list of strings
    StrArray,
    /// Single user/channel reference token
    Mention,
    /// Bracketed, comma-separated list of reference tokens
    MentionArray,
    /// Run of digits
    Int,
    /// Literal true/false
    Bool,
    /// Free-text time expression, see `timeparse`
    Duration,
}

impl ParamKind {
    /// Fixed order used when a user has pending requests of several kinds;
    /// the earliest kind here is the one their next message answers.
    pub const ALL: [ParamKind; 8] = [
        ParamKind::Mention,
        ParamKind::MentionArray,
        ParamKind::QuotedStr,
        ParamKind::StrArray,
        ParamKind::Duration,
        ParamKind::Int,
        ParamKind::Bool,
        ParamKind::Str,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ParamKind::Str => "text",
            ParamKind::QuotedStr => "quoted text",
            ParamKind::StrArray => "list",
            ParamKind::Mention => "mention",
            ParamKind::MentionArray => "mentions",
            ParamKind::Int => "number",
            ParamKind::Bool => "true/false",
            ParamKind::Duration => "time",
        }
    }
}

/// A typed parameter value extracted from model output or a clarification
/// reply
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    Str(String),
    List(Vec<String>),
    Mention(u64),
    Mentions(Vec<u64>),
    Int(i64),
    Bool(bool),
    Instant(DateTime<Utc>),
}

impl SlotValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SlotValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            SlotValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mention(&self) -> Option<u64> {
        match self {
            SlotValue::Mention(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_mentions(&self) -> Option<&[u64]> {
        match self {
            SlotValue::Mentions(ids) => Some(ids),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SlotValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SlotValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            SlotValue::Instant(t) => Some(*t),
            _ => None,
        }
    }
}

/// Partially- or fully-bound parameter set, param name to value
pub type BoundParams = HashMap<String, SlotValue>;

/// One declared parameter of an action
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<SlotValue>,
}

impl ParamSpec {
    fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
        }
    }

    fn optional(name: &'static str, kind: ParamKind, default: SlotValue) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: Some(default),
        }
    }
}

/// Static description of one supported command
#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Canonical intent-line example embedded into the system prompt
    pub usage: &'static str,
    pub params: Vec<ParamSpec>,
}

impl ActionSpec {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// First declared required parameter absent from `bound`
    pub fn first_missing_required(&self, bound: &BoundParams) -> Option<&ParamSpec> {
        self.params
            .iter()
            .find(|p| p.required && !bound.contains_key(p.name))
    }

    /// Fill absent optional parameters from their declared defaults
    pub fn apply_defaults(&self, bound: &mut BoundParams) {
        for param in &self.params {
            if let Some(ref default) = param.default
                && !bound.contains_key(param.name)
            {
                bound.insert(param.name.to_string(), default.clone());
            }
        }
    }
}

/// The fixed registry of actions, in classification priority order
#[derive(Debug, Clone)]
pub struct CommandSchema {
    actions: Vec<ActionSpec>,
}

impl CommandSchema {
    /// The builtin action table. Created once at process start.
    pub fn builtin() -> Self {
        use ParamKind::*;

        let actions = vec![
            ActionSpec {
                name: "create_group_chat",
                description: "Creates a private thread with the mentioned users.",
                usage: "create_group_chat(user_mentions=[@111, @222])",
                params: vec![ParamSpec::required("user_mentions", MentionArray)],
            },
            ActionSpec {
                name: "add_to_channel",
                description: "Adds the mentioned users to the mentioned channels.",
                usage: "add_to_channel(user_mentions=[@111], channel_mentions=[#333])",
                params: vec![
                    ParamSpec::required("user_mentions", MentionArray),
                    ParamSpec::required("channel_mentions", MentionArray),
                ],
            },
            ActionSpec {
                name: "create_channel",
                description: "Creates a text channel, optionally private.",
                usage: "create_channel(name=\"plans\", private=true)",
                params: vec![
                    ParamSpec::required("name", QuotedStr),
                    ParamSpec::optional("private", Bool, SlotValue::Bool(false)),
                ],
            },
            ActionSpec {
                name: "create_role",
                description: "Creates a role on the server.",
                usage: "create_role(name=\"raiders\", mentionable=true)",
                params: vec![
                    ParamSpec::required("name", QuotedStr),
                    ParamSpec::optional("mentionable", Bool, SlotValue::Bool(false)),
                ],
            },
            ActionSpec {
                name: "assign_role",
                description: "Gives an existing role to the mentioned user.",
                usage: "assign_role(user_mention=@111, role_name=\"raiders\")",
                params: vec![
                    ParamSpec::required("user_mention", Mention),
                    ParamSpec::required("role_name", QuotedStr),
                ],
            },
            ActionSpec {
                name: "revoke_role",
                description: "Removes a role from the mentioned user.",
                usage: "revoke_role(user_mention=@111, role_name=\"raiders\")",
                params: vec![
                    ParamSpec::required("user_mention", Mention),
                    ParamSpec::required("role_name", QuotedStr),
                ],
            },
            ActionSpec {
                name: "schedule_event",
                description: "Creates a scheduled server event at the given time.",
                usage: "schedule_event(name=\"movie night\", start_time=\"2025-03-10 19:00\")",
                params: vec![
                    ParamSpec::required("name", QuotedStr),
                    ParamSpec::required("start_time", Duration),
                ],
            },
            ActionSpec {
                name: "create_invite",
                description: "Creates an invite link for the current channel.",
                usage: "create_invite(max_uses=5, temporary=false)",
                params: vec![
                    ParamSpec::optional("max_uses", Int, SlotValue::Int(0)),
                    ParamSpec::optional("temporary", Bool, SlotValue::Bool(false)),
                ],
            },
            ActionSpec {
                name: "rename_bot",
                description: "Changes the nickname of the mentioned bot.",
                usage: "rename_bot(bot_mention=@111, new_name=\"Steward\")",
                params: vec![
                    ParamSpec::required("bot_mention", Mention),
                    ParamSpec::required("new_name", QuotedStr),
                ],
            },
            ActionSpec {
                name: "set_avatar",
                description: "Changes the avatar of the mentioned bot from an image URL.",
                usage: "set_avatar(bot_mention=@111, url=\"https://example.com/cat.png\")",
                params: vec![
                    ParamSpec::required("bot_mention", Mention),
                    ParamSpec::required("url", QuotedStr),
                ],
            },
            ActionSpec {
                name: "remind",
                description: "Sends a message in this channel after a delay.",
                usage: "remind(message=\"standup\", delay=\"10m\")",
                params: vec![
                    ParamSpec::required("message", QuotedStr),
                    ParamSpec::required("delay", Duration),
                ],
            },
        ];

        Self { actions }
    }

    /// Construct from an explicit table (tests, future extension)
    pub fn new(actions: Vec<ActionSpec>) -> Self {
        Self { actions }
    }

    /// Validate the table: unique names, no name a substring of another,
    /// defaults present exactly on optional parameters.
    pub fn validate(&self) -> Result<(), CommandError> {
        for (i, action) in self.actions.iter().enumerate() {
            for other in &self.actions[i + 1..] {
                if action.name == other.name {
                    return Err(CommandError::DuplicateName(action.name.to_string()));
                }
                if other.name.contains(action.name) {
                    return Err(CommandError::ShadowedName {
                        name: action.name.to_string(),
                        of: other.name.to_string(),
                    });
                }
                if action.name.contains(other.name) {
                    return Err(CommandError::ShadowedName {
                        name: other.name.to_string(),
                        of: action.name.to_string(),
                    });
                }
            }
            for param in &action.params {
                if !param.required && param.default.is_none() {
                    return Err(CommandError::MissingDefault {
                        action: action.name.to_string(),
                        param: param.name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn actions(&self) -> &[ActionSpec] {
        &self.actions
    }

    pub fn get(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Scan free text for action names in declared order; the first name
    /// found as a substring wins.
    pub fn first_named_in(&self, text: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|a| text.contains(a.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_validates() {
        let schema = CommandSchema::builtin();
        schema.validate().unwrap();
        assert!(schema.get("create_group_chat").is_some());
        assert!(schema.get("no_such_action").is_none());
    }

    #[test]
    fn test_shadowed_name_rejected() {
        let schema = CommandSchema::new(vec![
            ActionSpec {
                name: "create_role",
                description: "",
                usage: "",
                params: vec![],
            },
            ActionSpec {
                name: "role",
                description: "",
                usage: "",
                params: vec![],
            },
        ]);
        assert!(matches!(
            schema.validate(),
            Err(CommandError::ShadowedName { .. })
        ));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let spec = ActionSpec {
            name: "remind",
            description: "",
            usage: "",
            params: vec![],
        };
        let schema = CommandSchema::new(vec![spec.clone(), spec]);
        assert!(matches!(
            schema.validate(),
            Err(CommandError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_optional_without_default_rejected() {
        let schema = CommandSchema::new(vec![ActionSpec {
            name: "broken",
            description: "",
            usage: "",
            params: vec![ParamSpec {
                name: "flag",
                kind: ParamKind::Bool,
                required: false,
                default: None,
            }],
        }]);
        assert!(matches!(
            schema.validate(),
            Err(CommandError::MissingDefault { .. })
        ));
    }

    #[test]
    fn test_first_named_in_declared_order() {
        let schema = CommandSchema::builtin();
        // Both names present: earlier-declared create_group_chat wins.
        let text = "remind me to create_group_chat later";
        assert_eq!(
            schema.first_named_in(text).map(|a| a.name),
            Some("create_group_chat")
        );
        assert!(schema.first_named_in("just chatting").is_none());
    }

    #[test]
    fn test_first_missing_required_in_declared_order() {
        let schema = CommandSchema::builtin();
        let action = schema.get("assign_role").unwrap();
        let mut bound = BoundParams::new();
        // Both missing: the target user comes before the role name.
        assert_eq!(
            action.first_missing_required(&bound).map(|p| p.name),
            Some("user_mention")
        );
        bound.insert("user_mention".to_string(), SlotValue::Mention(1));
        assert_eq!(
            action.first_missing_required(&bound).map(|p| p.name),
            Some("role_name")
        );
    }

    #[test]
    fn test_apply_defaults() {
        let schema = CommandSchema::builtin();
        let action = schema.get("create_invite").unwrap();
        let mut bound = BoundParams::new();
        bound.insert("max_uses".to_string(), SlotValue::Int(5));
        action.apply_defaults(&mut bound);
        assert_eq!(bound.get("max_uses").and_then(|v| v.as_int()), Some(5));
        assert_eq!(
            bound.get("temporary").and_then(|v| v.as_bool()),
            Some(false)
        );
    }
}
