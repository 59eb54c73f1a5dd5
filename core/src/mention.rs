//! Mention token normalization
//!
//! Discord renders user, channel and role references as inline tokens like
//! `<@123>`, `<@!123>`, `<#456>` or `<@&789>`. The model echoes these (or
//! looser forms like `@123`) back in its intent lines, and clarification
//! replies contain them verbatim. Everything downstream works on plain ids.

use regex::Regex;
use std::sync::LazyLock;

/// A channel member as embedded into the model prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberProfile {
    pub id: u64,
    pub display_name: String,
    pub name: String,
}

static MENTION_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[@#][!&]?(\d+)>").expect("mention token pattern")
});

/// Strip all non-digit characters from a reference token and parse the id.
///
/// Returns `None` when no digits remain or the digits overflow a u64.
/// Absence is represented, never thrown.
pub fn resolve_mention_token(token: &str) -> Option<u64> {
    let digits: String = token.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok()
}

/// Find every platform mention token in a message body, in order.
///
/// Used when resuming a pending mention slot: a reply without any token
/// here is distinguishable from a wrong value and must not consume the
/// pending request.
pub fn find_mention_tokens(text: &str) -> Vec<u64> {
    MENTION_TOKEN
        .captures_iter(text)
        .filter_map(|cap| cap[1].parse::<u64>().ok())
        .collect()
}

/// Render the channel roster as `(id, display_name, name)` triples for
/// prompt embedding, one member per line.
pub fn format_roster(members: &[MemberProfile]) -> String {
    members
        .iter()
        .map(|m| format!("({}, {}, {})", m.id, m.display_name, m.name))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_mention_token() {
        assert_eq!(resolve_mention_token("<@123456>"), Some(123456));
        assert_eq!(resolve_mention_token("<@!123456>"), Some(123456));
        assert_eq!(resolve_mention_token("<#42>"), Some(42));
        assert_eq!(resolve_mention_token("@99"), Some(99));
        assert_eq!(resolve_mention_token("99"), Some(99));
        assert_eq!(resolve_mention_token("@alice"), None);
        assert_eq!(resolve_mention_token(""), None);
    }

    #[test]
    fn test_resolve_mention_token_overflow() {
        // 21 digits does not fit a u64
        assert_eq!(resolve_mention_token("999999999999999999999"), None);
    }

    #[test]
    fn test_find_mention_tokens() {
        let found = find_mention_tokens("add <@1> and <@!2> to <#3>");
        assert_eq!(found, vec![1, 2, 3]);
        assert!(find_mention_tokens("no tokens here, just 123").is_empty());
    }

    #[test]
    fn test_format_roster() {
        let members = vec![
            MemberProfile {
                id: 1,
                display_name: "Alice".to_string(),
                name: "alice".to_string(),
            },
            MemberProfile {
                id: 2,
                display_name: "Bob".to_string(),
                name: "bob".to_string(),
            },
        ];
        let roster = format_roster(&members);
        assert_eq!(roster, "(1, Alice, alice)\n(2, Bob, bob)");
    }
}
