//! Slot extraction from model output
//!
//! For each declared parameter kind there is exactly one extraction rule,
//! applied to the model's raw reply text. A rule either matches fully and
//! yields a typed value, or the parameter is absent. Absence is never an
//! error here; required/optional is judged by the schema.
//!
//! All patterns are compiled once per schema at startup, so a malformed
//! pattern is a startup failure rather than a silent per-message miss.

use crate::error::{CommandError, StewardError};
use crate::mention::resolve_mention_token;
use crate::schema::{ActionSpec, BoundParams, CommandSchema, ParamKind, SlotValue};
use crate::timeparse;
use regex::Regex;
use std::collections::HashMap;

/// A compiled extraction rule for one `(action, param)` pair
struct SlotRule {
    kind: ParamKind,
    pattern: Regex,
}

/// Precompiled extractor for a command schema
pub struct Extractor {
    rules: HashMap<(&'static str, &'static str), SlotRule>,
}

impl Extractor {
    pub fn new(schema: &CommandSchema) -> Result<Self, CommandError> {
        let mut rules = HashMap::new();
        for action in schema.actions() {
            for param in &action.params {
                let pattern = compile_rule(param.name, param.kind).map_err(|e| {
                    CommandError::BadPattern {
                        param: param.name.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                rules.insert(
                    (action.name, param.name),
                    SlotRule {
                        kind: param.kind,
                        pattern,
                    },
                );
            }
        }
        Ok(Self { rules })
    }

    /// Run every declared rule of `action` against `reply`.
    ///
    /// Absent parameters are simply left out of the result. A duration
    /// that is present but unparseable is a validation failure and
    /// surfaces as a `TimeError` so the user sees the accepted patterns.
    pub fn extract(&self, action: &ActionSpec, reply: &str) -> Result<BoundParams, StewardError> {
        let mut bound = BoundParams::new();
        for param in &action.params {
            let Some(rule) = self.rules.get(&(action.name, param.name)) else {
                continue;
            };
            if let Some(value) = apply_rule(rule, reply)? {
                bound.insert(param.name.to_string(), value);
            }
        }
        Ok(bound)
    }
}

fn compile_rule(name: &str, kind: ParamKind) -> Result<Regex, regex::Error> {
    // \b keeps `name=` from matching inside a longer parameter like
    // `role_name=`.
    let name = regex::escape(name);
    let pattern = match kind {
        ParamKind::QuotedStr => format!(r#"\b{name}\s*=\s*"([^"]*)""#),
        ParamKind::StrArray | ParamKind::MentionArray => {
            format!(r"\b{name}\s*=\s*\[([^\]]*)\]")
        }
        ParamKind::Mention => format!(r"\b{name}\s*=\s*([^\s,()\[\]]+)"),
        ParamKind::Bool => format!(r"(?i)\b{name}\s*=\s*(true|false)"),
        ParamKind::Int => format!(r"\b{name}\s*=\s*(\d+)"),
        // Quoted form preferred; otherwise everything up to a comma or
        // closing paren, so absolute layouts with spaces survive.
        ParamKind::Duration | ParamKind::Str => {
            format!(r#"\b{name}\s*=\s*(?:"([^"]*)"|([^,)\n]+))"#)
        }
    };
    Regex::new(&pattern)
}

fn apply_rule(rule: &SlotRule, reply: &str) -> Result<Option<SlotValue>, StewardError> {
    let Some(caps) = rule.pattern.captures(reply) else {
        return Ok(None);
    };

    let value = match rule.kind {
        ParamKind::QuotedStr => SlotValue::Str(caps[1].to_string()),
        ParamKind::StrArray => SlotValue::List(split_list(&caps[1])),
        ParamKind::MentionArray => {
            let ids: Vec<u64> = caps[1]
                .split(',')
                .filter_map(|t| resolve_mention_token(t.trim()))
                .collect();
            if ids.is_empty() {
                return Ok(None);
            }
            SlotValue::Mentions(ids)
        }
        ParamKind::Mention => match resolve_mention_token(&caps[1]) {
            Some(id) => SlotValue::Mention(id),
            None => return Ok(None),
        },
        ParamKind::Bool => SlotValue::Bool(caps[1].eq_ignore_ascii_case("true")),
        ParamKind::Int => match caps[1].parse::<i64>() {
            Ok(n) => SlotValue::Int(n),
            Err(_) => return Ok(None),
        },
        ParamKind::Duration => {
            let raw = quoted_or_raw(&caps);
            SlotValue::Instant(timeparse::parse_time(&raw)?)
        }
        ParamKind::Str => SlotValue::Str(quoted_or_raw(&caps)),
    };

    Ok(Some(value))
}

/// Value of the quoted alternative if it matched, else the raw run trimmed
fn quoted_or_raw(caps: &regex::Captures<'_>) -> String {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Split a bracketed list body on commas, trimming whitespace and
/// surrounding quote characters from each element
fn split_list(body: &str) -> Vec<String> {
    body.split(',')
        .map(|item| item.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
