//! Strategies for combining split parts
//!
//! A strategy folds one incoming part into the accumulated result. The
//! aggregator always calls it in split index order, so order-sensitive
//! strategies such as body concatenation produce stable output.

use crate::message::Message;
use bytes::{BufMut, BytesMut};
use std::sync::Arc;

/// Type alias for custom combination functions
pub type CombineFunction = Arc<dyn Fn(Option<Message>, Message) -> Message + Send + Sync>;

#[derive(Clone)]
pub enum AggregationStrategy {
    /// Concatenate bodies with a separator; headers come from the first part
    Join { separator: String },
    /// Keep only the most recent part
    Latest,
    /// Custom combination function
    Custom(CombineFunction),
}

impl std::fmt::Debug for AggregationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Join { separator } => write!(f, "Join({separator:?})"),
            Self::Latest => write!(f, "Latest"),
            Self::Custom(_) => write!(f, "Custom(<function>)"),
        }
    }
}

impl AggregationStrategy {
    pub fn join(separator: impl Into<String>) -> Self {
        Self::Join {
            separator: separator.into(),
        }
    }

    pub fn custom<F>(combine: F) -> Self
    where
        F: Fn(Option<Message>, Message) -> Message + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(combine))
    }

    /// Fold `incoming` into `existing`
    pub fn aggregate(&self, existing: Option<Message>, incoming: Message) -> Message {
        match (self, existing) {
            (Self::Custom(combine), existing) => combine(existing, incoming),
            (_, None) | (Self::Latest, Some(_)) => incoming,
            (Self::Join { separator }, Some(existing)) => {
                let mut body = BytesMut::with_capacity(
                    existing.body().len() + separator.len() + incoming.body().len(),
                );
                body.put_slice(existing.body());
                body.put_slice(separator.as_bytes());
                body.put_slice(incoming.body());
                existing.with_body(body.freeze())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_keeps_first_headers() {
        let strategy = AggregationStrategy::join("+");
        let first = Message::from("X").with_header("origin", "first");
        let second = Message::from("Y").with_header("origin", "second");

        let acc = strategy.aggregate(None, first);
        let acc = strategy.aggregate(Some(acc), second);

        assert_eq!(acc.body_str(), Some("X+Y"));
        assert_eq!(acc.header("origin"), Some("first"));
    }

    #[test]
    fn test_latest_wins() {
        let strategy = AggregationStrategy::Latest;
        let acc = strategy.aggregate(None, Message::from("1"));
        let acc = strategy.aggregate(Some(acc), Message::from("2"));
        assert_eq!(acc.body_str(), Some("2"));
    }

    #[test]
    fn test_custom_receives_none_for_first_part() {
        let strategy = AggregationStrategy::custom(|existing, incoming| match existing {
            None => incoming.with_header("first", "yes"),
            Some(acc) => acc,
        });
        let acc = strategy.aggregate(None, Message::from("a"));
        assert_eq!(acc.header("first"), Some("yes"));
        assert_eq!(format!("{strategy:?}"), "Custom(<function>)");
    }
}
