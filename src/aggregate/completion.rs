//! Completion conditions for aggregation

use crate::message::Message;
use std::sync::Arc;

/// Decides completion from the accumulator and the number of folded parts
pub type CompletionFunction = Arc<dyn Fn(&Message, usize) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub enum CompletionPolicy {
    /// Complete after exactly this many parts
    FixedSize(usize),
    /// Complete after the part count carried by the split headers
    #[default]
    FromSplitSize,
    /// Complete when the function returns true
    Custom(CompletionFunction),
}

impl std::fmt::Debug for CompletionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FixedSize(n) => write!(f, "FixedSize({n})"),
            Self::FromSplitSize => write!(f, "FromSplitSize"),
            Self::Custom(_) => write!(f, "Custom(<function>)"),
        }
    }
}

impl CompletionPolicy {
    pub fn custom<F>(is_complete: F) -> Self
    where
        F: Fn(&Message, usize) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(is_complete))
    }

    /// Expected number of parts, read from the first part seen
    pub fn expected_parts(&self, part: &Message) -> Option<usize> {
        match self {
            Self::FixedSize(n) => Some(*n),
            Self::FromSplitSize | Self::Custom(_) => part.split_size(),
        }
    }

    pub fn is_complete(
        &self,
        accumulator: &Message,
        folded: usize,
        expected: Option<usize>,
    ) -> bool {
        match self {
            Self::Custom(is_complete) => is_complete(accumulator, folded),
            Self::FixedSize(_) | Self::FromSplitSize => expected == Some(folded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SPLIT_SIZE;

    #[test]
    fn test_expected_parts() {
        let part = Message::from("A").with_header(SPLIT_SIZE, "3");
        assert_eq!(CompletionPolicy::FixedSize(5).expected_parts(&part), Some(5));
        assert_eq!(CompletionPolicy::FromSplitSize.expected_parts(&part), Some(3));
        assert_eq!(
            CompletionPolicy::FromSplitSize.expected_parts(&Message::from("A")),
            None
        );
    }

    #[test]
    fn test_size_based_completion() {
        let acc = Message::from("X+Y");
        let policy = CompletionPolicy::FromSplitSize;
        assert!(!policy.is_complete(&acc, 2, Some(3)));
        assert!(policy.is_complete(&acc, 3, Some(3)));
        assert!(!policy.is_complete(&acc, 3, None));
    }

    #[test]
    fn test_custom_completion() {
        let policy = CompletionPolicy::custom(|acc, _| acc.body().ends_with(b"END"));
        assert!(policy.is_complete(&Message::from("a+END"), 2, None));
        assert!(!policy.is_complete(&Message::from("a"), 1, Some(1)));
    }
}
