//! Clarification prompts and reply parsing
//!
//! When a required slot is missing the user gets one prompt describing how
//! to supply that single value; their entire next message is then parsed
//! as that value. One missing slot at a time, never a batch.

use crate::mention::find_mention_tokens;
use crate::messages::RoleProfile;
use crate::schema::{ActionSpec, ParamKind, ParamSpec, SlotValue};
use crate::timeparse::{self, ACCEPTED_PATTERNS};

/// Result of reading a clarification reply as the awaited slot's value
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyParse {
    /// The reply supplied a usable value
    Value(SlotValue),
    /// Awaited slot is a mention and the reply contains none; the pending
    /// request must not be consumed
    NoMention,
    /// The reply consumed the pending request but the value was unusable;
    /// the user has to retry the whole command
    Malformed(String),
}

/// Build the follow-up prompt for one missing slot.
///
/// `roles` carries live server data for the role-name slots; empty
/// otherwise.
pub fn prompt_for(action: &ActionSpec, param: &ParamSpec, roles: &[RoleProfile]) -> String {
    match (param.kind, param.name) {
        (ParamKind::Mention | ParamKind::MentionArray, "channel_mentions") => format!(
            "Which channel should I use for `{}`? Please mention it, like `#general`.",
            action.name
        ),
        (ParamKind::Mention | ParamKind::MentionArray, _) => format!(
            "Who should `{}` apply to? Please @-mention them in your next message.",
            action.name
        ),
        (ParamKind::QuotedStr | ParamKind::Str, "role_name") => {
            let listing = if roles.is_empty() {
                String::new()
            } else {
                let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
                format!(" Current roles: {}.", names.join(", "))
            };
            format!(
                "Which role is `{}` for? Reply with the role name.{}",
                action.name, listing
            )
        }
        (ParamKind::QuotedStr | ParamKind::Str, "url") => format!(
            "Please reply with the image URL for `{}` (or attach an image).",
            action.name
        ),
        (ParamKind::QuotedStr | ParamKind::Str, _) => format!(
            "What should the {} for `{}` be? Reply with the text.",
            param.name.replace('_', " "),
            action.name
        ),
        (ParamKind::StrArray, _) => format!(
            "Please reply with the {} for `{}`, separated by commas.",
            param.name.replace('_', " "),
            action.name
        ),
        (ParamKind::Duration, _) => format!(
            "When should `{}` happen? Accepted formats: {}.",
            action.name, ACCEPTED_PATTERNS
        ),
        (ParamKind::Int, _) => format!(
            "How many? Reply with a number for {} of `{}`.",
            param.name.replace('_', " "),
            action.name
        ),
        (ParamKind::Bool, _) => format!(
            "Should {} be on? Reply `true` or `false` for `{}`.",
            param.name.replace('_', " "),
            action.name
        ),
    }
}

/// Fixed re-prompt when a mention slot got a reply without any mention
pub fn reprompt_for_mention(action: &ActionSpec) -> String {
    format!(
        "I still need a mention for `{}`. Please @-mention the user or channel.",
        action.name
    )
}

/// Fixed message after a malformed reply consumed the pending request
pub fn retry_whole_command(action: &ActionSpec, reason: &str) -> String {
    format!(
        "{} I've dropped the pending `{}` request; please retry the whole command.",
        reason, action.name
    )
}

/// Parse an entire message body as the value of the awaited slot
pub fn parse_reply(kind: ParamKind, body: &str) -> ReplyParse {
    let trimmed = body.trim();
    match kind {
        ParamKind::Mention => match find_mention_tokens(trimmed).first() {
            Some(id) => ReplyParse::Value(SlotValue::Mention(*id)),
            None => ReplyParse::NoMention,
        },
        ParamKind::MentionArray => {
            let ids = find_mention_tokens(trimmed);
            if ids.is_empty() {
                ReplyParse::NoMention
            } else {
                ReplyParse::Value(SlotValue::Mentions(ids))
            }
        }
        ParamKind::QuotedStr | ParamKind::Str => {
            let value = trimmed.trim_matches(|c| c == '"' || c == '\'').to_string();
            if value.is_empty() {
                ReplyParse::Malformed("That message was empty.".to_string())
            } else {
                ReplyParse::Value(SlotValue::Str(value))
            }
        }
        ParamKind::StrArray => {
            let items: Vec<String> = trimmed
                .split(',')
                .map(|s| s.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if items.is_empty() {
                ReplyParse::Malformed("I couldn't read a list from that.".to_string())
            } else {
                ReplyParse::Value(SlotValue::List(items))
            }
        }
        ParamKind::Int => {
            let digits: String = trimmed
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            match digits.parse::<i64>() {
                Ok(n) => ReplyParse::Value(SlotValue::Int(n)),
                Err(_) => ReplyParse::Malformed("I couldn't read a number from that.".to_string()),
            }
        }
        ParamKind::Bool => {
            let lowered = trimmed.to_lowercase();
            if lowered.contains("true") {
                ReplyParse::Value(SlotValue::Bool(true))
            } else if lowered.contains("false") {
                ReplyParse::Value(SlotValue::Bool(false))
            } else {
                ReplyParse::Malformed("I was expecting `true` or `false`.".to_string())
            }
        }
        ParamKind::Duration => match timeparse::parse_time(trimmed) {
            Ok(instant) => ReplyParse::Value(SlotValue::Instant(instant)),
            Err(_) => ReplyParse::Malformed(format!(
                "I couldn't read that as a time. Accepted formats: {}.",
                ACCEPTED_PATTERNS
            )),
        },
    }
}
