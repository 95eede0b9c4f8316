//! Core identifier and value types.

use std::any::Any;
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque shared value used for arguments and metadata.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Owned result slot content. Moved out by the wrapper, so no `Clone` bound.
pub type ResultSlot = Box<dyn Any + Send>;

/// Wrap a value as an opaque [`Value`].
pub fn value<T: Any + Send + Sync>(v: T) -> Value {
    Arc::new(v)
}

/// Identifier of a registered function.
///
/// Must be non-empty to be registered; emptiness is checked by the
/// [`Registry`](crate::Registry), not here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionKey(String);

impl FunctionKey {
    /// Create a key from anything string-like.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FunctionKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for FunctionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl Borrow<str> for FunctionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for FunctionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Point in a call's lifecycle at which advice runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdvicePhase {
    /// Before the target. Gatekeeper.
    Before,
    /// Around the target. Gatekeeper; may skip the target.
    Around,
    /// After everything else, exactly once per call.
    After,
    /// After a call that produced no error and no panic.
    AfterReturning,
    /// After a panic or a gatekeeper veto.
    AfterThrowing,
}

impl AdvicePhase {
    /// Number of phases.
    pub const COUNT: usize = 5;

    /// Returns all phases in protocol order.
    #[must_use]
    pub fn all() -> &'static [AdvicePhase] {
        &[
            Self::Before,
            Self::Around,
            Self::AfterReturning,
            Self::AfterThrowing,
            Self::After,
        ]
    }

    /// Bucket index within an [`AdviceChain`](crate::AdviceChain).
    #[must_use]
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Before => 0,
            Self::Around => 1,
            Self::After => 2,
            Self::AfterReturning => 3,
            Self::AfterThrowing => 4,
        }
    }

    /// Returns `true` for phases whose failure aborts the call.
    #[must_use]
    pub fn is_gatekeeper(self) -> bool {
        matches!(self, Self::Before | Self::Around)
    }
}

impl fmt::Display for AdvicePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => write!(f, "Before"),
            Self::Around => write!(f, "Around"),
            Self::After => write!(f, "After"),
            Self::AfterReturning => write!(f, "AfterReturning"),
            Self::AfterThrowing => write!(f, "AfterThrowing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn key_from_str_and_string_agree() {
        assert_eq!(FunctionKey::from("a"), FunctionKey::from("a".to_string()));
        assert_eq!(FunctionKey::new("a").as_str(), "a");
    }

    #[test]
    fn empty_key_detected() {
        assert!(FunctionKey::from("").is_empty());
        assert!(!FunctionKey::from("x").is_empty());
    }

    #[test]
    fn key_serializes_as_plain_string() {
        let json = serde_json::to_string(&FunctionKey::from("GetUser")).unwrap();
        assert_eq!(json, "\"GetUser\"");
    }

    #[test]
    fn phase_indices_are_distinct() {
        let indices: HashSet<usize> = AdvicePhase::all().iter().map(|p| p.index()).collect();
        assert_eq!(indices.len(), AdvicePhase::COUNT);
        assert!(indices.iter().all(|i| *i < AdvicePhase::COUNT));
    }

    #[test]
    fn only_before_and_around_are_gatekeepers() {
        let gatekeepers: Vec<_> = AdvicePhase::all()
            .iter()
            .copied()
            .filter(|p| p.is_gatekeeper())
            .collect();
        assert_eq!(gatekeepers, vec![AdvicePhase::Before, AdvicePhase::Around]);
    }

    #[test]
    fn value_downcasts_to_original_type() {
        let v = value(42_u32);
        assert_eq!(v.downcast_ref::<u32>(), Some(&42));
        assert!(v.downcast_ref::<i64>().is_none());
    }
}
