use std::fmt;

use serde::{Deserialize, Serialize};

/// Location of an event in the ledger's total order.
///
/// Ordering: `block` → `log_index`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub block: u64,
    pub log_index: u64,
}

impl Position {
    pub const fn new(block: u64, log_index: u64) -> Self {
        Self { block, log_index }
    }

    /// Returns `true` if `self` comes strictly after `other`.
    ///
    /// `None` stands for "before the first event", so every position follows it.
    pub fn follows(&self, other: Option<Position>) -> bool {
        match other {
            None => true,
            Some(prev) => *self > prev,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.log_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_block_then_log_index() {
        assert!(Position::new(1, 9) < Position::new(2, 0));
        assert!(Position::new(2, 0) < Position::new(2, 1));
    }

    #[test]
    fn follows_requires_strict_progress() {
        let p = Position::new(5, 3);
        assert!(p.follows(None));
        assert!(p.follows(Some(Position::new(5, 2))));
        assert!(!p.follows(Some(p)));
        assert!(!p.follows(Some(Position::new(6, 0))));
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(Position::new(12, 4).to_string(), "12:4");
    }
}
