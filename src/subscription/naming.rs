//! Subscription queue naming
//!
//! A subscription on a topic is backed by a queue named after the client id
//! and subscription name. Both parts are escaped so the `.` separator stays
//! unambiguous: `\` becomes `\\` and `.` becomes `\.`.

use std::fmt;

const SEPARATOR: char = '.';
const ESCAPE: char = '\\';

/// Prefix of queues backing non-durable subscriptions
const NON_DURABLE_PREFIX: &str = "nonDurable.";

/// A queue name that does not follow the subscription naming convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingError {
    pub queue_name: String,
    pub reason: &'static str,
}

impl fmt::Display for NamingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid subscription queue name '{}': {}",
            self.queue_name, self.reason
        )
    }
}

impl std::error::Error for NamingError {}

/// Escape one name component
pub fn escape(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        if c == ESCAPE || c == SEPARATOR {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

fn join(client_id: Option<&str>, subscription_name: &str) -> String {
    match client_id {
        Some(client) => format!(
            "{}{}{}",
            escape(client),
            SEPARATOR,
            escape(subscription_name)
        ),
        None => escape(subscription_name),
    }
}

/// Queue name of a durable subscription.
///
/// Without a client id the subscription is shared and named after the
/// subscription alone.
pub fn durable_queue_name(client_id: Option<&str>, subscription_name: &str) -> String {
    join(client_id, subscription_name)
}

/// Queue name of a named non-durable subscription
pub fn non_durable_queue_name(client_id: Option<&str>, subscription_name: &str) -> String {
    format!("{}{}", NON_DURABLE_PREFIX, join(client_id, subscription_name))
}

fn push_to_last(parts: &mut [String], c: char) {
    if let Some(last) = parts.last_mut() {
        last.push(c);
    }
}

/// Split a durable subscription queue name into `(client_id, subscription_name)`.
///
/// A name with no separator is a shared subscription and yields no client id.
/// An empty client id is reported as `None` as well.
pub fn decompose_durable(queue_name: &str) -> Result<(Option<String>, String), NamingError> {
    let error = |reason| NamingError {
        queue_name: queue_name.to_string(),
        reason,
    };

    let mut parts = vec![String::new()];
    let mut chars = queue_name.chars();

    while let Some(c) = chars.next() {
        match c {
            ESCAPE => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| error("trailing escape character"))?;
                push_to_last(&mut parts, escaped);
            }
            SEPARATOR if parts.len() == 1 => parts.push(String::new()),
            SEPARATOR => return Err(error("more than one separator")),
            c => push_to_last(&mut parts, c),
        }
    }

    let name = parts.pop().unwrap_or_default();
    let client_id = parts.pop().filter(|c| !c.is_empty());
    Ok((client_id, name))
}
