//! Source spans and the stable node identifiers derived from them.

use std::fmt;
use std::sync::Arc;

/// A byte-offset range into a single source file, plus the 1-based line/column
/// of its start for human-readable messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub file: Arc<str>,
    pub start: u32,
    pub end: u32,
    pub line: u32,
    pub column: u32,
}

impl Span {
    #[must_use]
    pub fn new(file: Arc<str>, start: u32, end: u32, line: u32, column: u32) -> Self {
        Self {
            file,
            start,
            end,
            line,
            column,
        }
    }

    /// An unknown span, used for synthetic nodes (builtins, defaulting decisions).
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            file: Arc::from("<unknown>"),
            start: 0,
            end: 0,
            line: 0,
            column: 0,
        }
    }

    /// Smallest span covering both `self` and `other`; `self` must precede `other`
    /// in the same file, which callers in this crate always arrange.
    #[must_use]
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            file: self.file.clone(),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: self.line,
            column: self.column,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A reproducible identifier for a Core AST node.
///
/// Derived from `(filename, start-offset, end-offset, kind, child-path)` so that
/// re-elaborating unchanged source yields an identical sequence of NodeIDs
/// (spec invariant: stable NodeIDs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// `child_path` disambiguates sibling nodes that share a span and kind, e.g.
    /// the two operands of a desugared binary operator application.
    #[must_use]
    pub fn derive(file: &str, start: u32, end: u32, kind: &str, child_path: &[u32]) -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = ahash::AHasher::default();
        file.hash(&mut hasher);
        start.hash(&mut hasher);
        end.hash(&mut hasher);
        kind.hash(&mut hasher);
        child_path.hash(&mut hasher);
        Self(hasher.finish())
    }

    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_stable_across_runs() {
        let a = NodeId::derive("tests/fact.ail", 10, 20, "App", &[0]);
        let b = NodeId::derive("tests/fact.ail", 10, 20, "App", &[0]);
        assert_eq!(a, b);
    }

    #[test]
    fn child_path_disambiguates_siblings() {
        let a = NodeId::derive("tests/fact.ail", 10, 20, "App", &[0]);
        let b = NodeId::derive("tests/fact.ail", 10, 20, "App", &[1]);
        assert_ne!(a, b);
    }
}
