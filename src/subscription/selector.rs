//! Client selector to native filter translation
//!
//! Client selectors name message headers with the `JMS` prefix; the broker's
//! filter language uses `AMQ` header names and reports durability as
//! `DURABLE`/`NON_DURABLE`. Translation rewrites whole identifiers outside
//! string literals and the two delivery mode literals. Everything else is
//! passed through unchanged.

use std::fmt;

/// Identifier rewrites applied outside string literals
const IDENTIFIERS: &[(&str, &str)] = &[
    ("JMSDeliveryMode", "AMQDurable"),
    ("JMSPriority", "AMQPriority"),
    ("JMSTimestamp", "AMQTimestamp"),
    ("JMSMessageID", "AMQUserID"),
    ("JMSExpiration", "AMQExpiration"),
    ("JMSXGroupID", "AMQGroupID"),
];

/// String literal rewrites
const LITERALS: &[(&str, &str)] = &[
    ("'PERSISTENT'", "'DURABLE'"),
    ("'NON_PERSISTENT'", "'NON_DURABLE'"),
];

/// A selector that cannot be translated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid selector '{}': {}", self.selector, self.reason)
    }
}

impl std::error::Error for SelectorError {}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn rewrite_identifier(word: &str) -> &str {
    IDENTIFIERS
        .iter()
        .find(|(from, _)| *from == word)
        .map_or(word, |(_, to)| *to)
}

fn rewrite_literal(literal: &str) -> &str {
    LITERALS
        .iter()
        .find(|(from, _)| *from == literal)
        .map_or(literal, |(_, to)| *to)
}

/// Translate a client selector into the broker's native filter syntax.
///
/// A missing or blank selector means "no filter" and yields `None`.
pub fn to_core_filter(selector: Option<&str>) -> Result<Option<String>, SelectorError> {
    let Some(selector) = selector.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };

    let mut out = String::with_capacity(selector.len());
    let mut rest = selector;

    while let Some(c) = rest.chars().next() {
        if c == '\'' {
            let end = literal_end(rest).ok_or_else(|| SelectorError {
                selector: selector.to_string(),
                reason: "unterminated string literal".to_string(),
            })?;
            out.push_str(rewrite_literal(&rest[..end]));
            rest = &rest[end..];
        } else if is_identifier_char(c) {
            let end = rest
                .find(|c: char| !is_identifier_char(c))
                .unwrap_or(rest.len());
            out.push_str(rewrite_identifier(&rest[..end]));
            rest = &rest[end..];
        } else {
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }

    Ok(Some(out))
}

/// Byte offset just past the literal that opens `input`, honoring `''` escapes
fn literal_end(input: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("JMSPriority > 4", "AMQPriority > 4" ; "priority")]
    #[test_case("JMSDeliveryMode = 'PERSISTENT'", "AMQDurable = 'DURABLE'" ; "persistent")]
    #[test_case("JMSDeliveryMode='NON_PERSISTENT'", "AMQDurable='NON_DURABLE'" ; "non persistent")]
    #[test_case("JMSMessageID = 'ID:1'", "AMQUserID = 'ID:1'" ; "message id")]
    #[test_case("JMSTimestamp < 5 AND JMSExpiration > 0", "AMQTimestamp < 5 AND AMQExpiration > 0" ; "timestamps")]
    #[test_case("JMSXGroupID IS NULL", "AMQGroupID IS NULL" ; "group id")]
    #[test_case("color = 'red'", "color = 'red'" ; "untouched")]
    fn test_translation(selector: &str, expected: &str) {
        assert_eq!(to_core_filter(Some(selector)).unwrap().as_deref(), Some(expected));
    }

    #[test]
    fn test_identifiers_inside_literals_are_kept() {
        assert_eq!(
            to_core_filter(Some("note = 'JMSPriority is high'"))
                .unwrap()
                .as_deref(),
            Some("note = 'JMSPriority is high'")
        );
    }

    #[test]
    fn test_partial_identifiers_are_kept() {
        assert_eq!(
            to_core_filter(Some("MyJMSPriority = 1 AND JMSPriority_x = 2"))
                .unwrap()
                .as_deref(),
            Some("MyJMSPriority = 1 AND JMSPriority_x = 2")
        );
    }

    #[test]
    fn test_escaped_quote_in_literal() {
        assert_eq!(
            to_core_filter(Some("name = 'it''s' AND JMSPriority = 1"))
                .unwrap()
                .as_deref(),
            Some("name = 'it''s' AND AMQPriority = 1")
        );
    }

    #[test]
    fn test_blank_selector() {
        assert_eq!(to_core_filter(None).unwrap(), None);
        assert_eq!(to_core_filter(Some("")).unwrap(), None);
        assert_eq!(to_core_filter(Some("   ")).unwrap(), None);
    }

    #[test]
    fn test_unterminated_literal() {
        let err = to_core_filter(Some("color = 'red")).unwrap_err();
        assert_eq!(err.reason, "unterminated string literal");
    }
}
