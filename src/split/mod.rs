//! Message splitting
//!
//! A splitter turns one message into an ordered list of parts. Every part
//! carries the correlation id of its parent plus a 1-based index and the
//! total part count, which the aggregator uses to put them back together.
//! Parts do not inherit the parent's message id, so splitting a part again
//! never reuses the outer correlation id.

use crate::message::{Message, CORRELATION_ID, MESSAGE_ID, SPLIT_INDEX, SPLIT_SIZE};
use bytes::Bytes;
use sha2::{Digest, Sha256};

pub trait Splitter: Send + Sync {
    /// Split `message` into ordered parts.
    ///
    /// Must depend only on the message, so splitting the same input twice
    /// yields the same parts.
    fn split(&self, message: &Message) -> Vec<Message>;
}

/// Splits the body on a byte delimiter
#[derive(Debug, Clone)]
pub struct DelimiterSplitter {
    delimiter: String,
    trim: bool,
    skip_empty: bool,
}

impl Default for DelimiterSplitter {
    fn default() -> Self {
        Self::new(",")
    }
}

impl DelimiterSplitter {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
            trim: false,
            skip_empty: false,
        }
    }

    /// Strip ASCII whitespace around each part
    pub fn trimmed(mut self) -> Self {
        self.trim = true;
        self
    }

    /// Drop parts that are empty (after trimming, if enabled)
    pub fn skip_empty(mut self) -> Self {
        self.skip_empty = true;
        self
    }
}

impl Splitter for DelimiterSplitter {
    fn split(&self, message: &Message) -> Vec<Message> {
        if message.body().is_empty() {
            return Vec::new();
        }

        let bodies = split_bytes(message.body(), self.delimiter.as_bytes())
            .into_iter()
            .map(|part| if self.trim { trim_ascii(&part) } else { part })
            .filter(|part| !(self.skip_empty && part.is_empty()))
            .collect();

        tag_parts(message, bodies)
    }
}

/// One part per line; accepts `\n` and `\r\n`, ignores a trailing newline
#[derive(Debug, Clone, Default)]
pub struct LineSplitter;

impl Splitter for LineSplitter {
    fn split(&self, message: &Message) -> Vec<Message> {
        let mut lines: Vec<Bytes> = split_bytes(message.body(), b"\n")
            .into_iter()
            .map(|line| match line.last() {
                Some(b'\r') => line.slice(..line.len() - 1),
                _ => line,
            })
            .collect();

        if lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        tag_parts(message, lines)
    }
}

/// Correlation id shared by all parts of `message`.
///
/// Uses the message id when present, otherwise a digest of the body.
pub fn correlation_id_for(message: &Message) -> String {
    match message.message_id() {
        Some(id) => id.to_string(),
        None => format!("{:x}", Sha256::digest(message.body())),
    }
}

fn tag_parts(message: &Message, bodies: Vec<Bytes>) -> Vec<Message> {
    let correlation_id = correlation_id_for(message);
    let total = bodies.len();

    bodies
        .into_iter()
        .enumerate()
        .map(|(i, body)| {
            Message::from_parts(message.headers().clone(), body)
                .without_header(MESSAGE_ID)
                .with_header(CORRELATION_ID, correlation_id.clone())
                .with_header(SPLIT_INDEX, (i + 1).to_string())
                .with_header(SPLIT_SIZE, total.to_string())
        })
        .collect()
}

/// Zero-copy split: every part is a slice of `body`
fn split_bytes(body: &Bytes, delimiter: &[u8]) -> Vec<Bytes> {
    if delimiter.is_empty() {
        return vec![body.clone()];
    }

    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + delimiter.len() <= body.len() {
        if &body[i..i + delimiter.len()] == delimiter {
            parts.push(body.slice(start..i));
            i += delimiter.len();
            start = i;
        } else {
            i += 1;
        }
    }
    parts.push(body.slice(start..));
    parts
}

fn trim_ascii(part: &Bytes) -> Bytes {
    let start = part
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(part.len());
    let end = part
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    part.slice(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bodies(parts: &[Message]) -> Vec<String> {
        parts.iter().map(|p| p.body_lossy().into_owned()).collect()
    }

    #[test]
    fn test_split_abc() {
        let parts = DelimiterSplitter::default().split(&Message::from("A,B,C"));

        assert_eq!(bodies(&parts), vec!["A", "B", "C"]);
        let indices: Vec<_> = parts.iter().map(|p| p.split_index().unwrap()).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert!(parts.iter().all(|p| p.split_size() == Some(3)));

        let correlation = parts[0].correlation_id().unwrap();
        assert!(parts.iter().all(|p| p.correlation_id() == Some(correlation)));
    }

    #[test]
    fn test_split_is_idempotent() {
        let splitter = DelimiterSplitter::default();
        let message = Message::from("A,B,C");
        assert_eq!(splitter.split(&message), splitter.split(&message));
    }

    #[test]
    fn test_message_id_becomes_correlation_id() {
        let message = Message::from("A,B").with_header(MESSAGE_ID, "order-7");
        let parts = DelimiterSplitter::default().split(&message);
        assert!(parts.iter().all(|p| p.correlation_id() == Some("order-7")));
        assert!(parts.iter().all(|p| p.message_id().is_none()));
    }

    #[test]
    fn test_nested_split_gets_its_own_correlation_id() {
        let splitter = DelimiterSplitter::new(";");
        let outer = Message::from("a1;a2|b1;b2").with_header(MESSAGE_ID, "order-7");
        let halves = DelimiterSplitter::new("|").split(&outer);
        let inner = splitter.split(&halves[0]);

        assert_eq!(bodies(&inner), vec!["a1", "a2"]);
        let inner_id = inner[0].correlation_id().unwrap();
        assert_ne!(inner_id, "order-7");
        assert!(inner.iter().all(|p| p.correlation_id() == Some(inner_id)));
        assert_eq!(inner[1].split_size(), Some(2));
    }

    #[test]
    fn test_empty_body_has_no_parts() {
        assert!(DelimiterSplitter::default().split(&Message::from("")).is_empty());
    }

    #[test]
    fn test_empty_fields_are_kept_unless_skipped() {
        let message = Message::from("A,, B ,");
        let kept = DelimiterSplitter::default().split(&message);
        assert_eq!(bodies(&kept), vec!["A", "", " B ", ""]);

        let cleaned = DelimiterSplitter::default().trimmed().skip_empty().split(&message);
        assert_eq!(bodies(&cleaned), vec!["A", "B"]);
        assert_eq!(cleaned[1].split_index(), Some(2));
        assert_eq!(cleaned[1].split_size(), Some(2));
    }

    #[test]
    fn test_multibyte_delimiter() {
        let parts = DelimiterSplitter::new("::").split(&Message::from("a::b:c::"));
        assert_eq!(bodies(&parts), vec!["a", "b:c", ""]);
    }

    #[test]
    fn test_line_splitter() {
        let parts = LineSplitter.split(&Message::from("first\r\nsecond\nthird\n"));
        assert_eq!(bodies(&parts), vec!["first", "second", "third"]);
    }
}
