//! Capability-based permission system for the effect runtime.
//!
//! Capabilities gate which effect operations the evaluator may invoke. They
//! are checked at the effect-dispatch boundary — the point where the
//! evaluator is about to call into a host-provided `IO`/`FS`/`Clock`/`Net`
//! handler. Without a capability set, that boundary is purely
//! architectural; with one, it becomes a security boundary: the program can
//! request any effect operation, but the runtime only fulfills requests
//! whose effect label is in the granted set.
//!
//! # Usage
//!
//! ```
//! use ailang_core::capability::{Capability, CapabilitySet};
//!
//! let caps = CapabilitySet::new(vec![Capability::Io, Capability::Clock]);
//! assert!(caps.allows("IO"));
//! assert!(!caps.allows("Net"));
//! ```

use std::fmt;

/// A single granted effect label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Io,
    Fs,
    Clock,
    Net,
}

impl Capability {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Io => "IO",
            Self::Fs => "FS",
            Self::Clock => "Clock",
            Self::Net => "Net",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Some(match label {
            "IO" => Self::Io,
            "FS" => Self::Fs,
            "Clock" => Self::Clock,
            "Net" => Self::Net,
            _ => return None,
        })
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when an effect operation is denied by the capability set.
#[derive(Debug, Clone)]
pub struct PermissionDenied {
    pub label: String,
}

impl fmt::Display for PermissionDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capability '{}' is required but was not granted", self.label)
    }
}

impl std::error::Error for PermissionDenied {}

/// A set of granted capabilities for a single run. Immutable once
/// constructed — capabilities cannot be escalated mid-evaluation.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    granted: Vec<Capability>,
}

impl CapabilitySet {
    #[must_use]
    pub fn new(granted: Vec<Capability>) -> Self {
        Self { granted }
    }

    /// Denies everything — pure computation, no effect handler may run.
    #[must_use]
    pub fn none() -> Self {
        Self { granted: Vec::new() }
    }

    #[must_use]
    pub fn all() -> Self {
        Self {
            granted: vec![Capability::Io, Capability::Fs, Capability::Clock, Capability::Net],
        }
    }

    /// Parses the CLI's `--caps X,Y` comma list.
    #[must_use]
    pub fn parse_list(list: &str) -> Self {
        let granted = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(Capability::from_label)
            .collect();
        Self { granted }
    }

    pub fn check(&self, label: &str) -> Result<(), PermissionDenied> {
        if self.granted.iter().any(|c| c.label() == label) {
            Ok(())
        } else {
            Err(PermissionDenied { label: label.to_owned() })
        }
    }

    #[must_use]
    pub fn allows(&self, label: &str) -> bool {
        self.check(label).is_ok()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Capability] {
        &self.granted
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.granted.is_empty() {
            return f.write_str("CapabilitySet(none)");
        }
        f.write_str("CapabilitySet(")?;
        for (i, cap) in self.granted.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{cap}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_denies_everything() {
        let caps = CapabilitySet::none();
        assert!(!caps.allows("IO"));
        assert!(caps.check("IO").is_err());
    }

    #[test]
    fn parse_list_splits_and_trims() {
        let caps = CapabilitySet::parse_list("IO, Clock");
        assert!(caps.allows("IO"));
        assert!(caps.allows("Clock"));
        assert!(!caps.allows("Net"));
    }
}
