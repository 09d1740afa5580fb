//! Loop-prevention tokens.
//!
//! Every operation a synchronizer forwards to the state manager is stamped
//! with a [`DebounceToken`]. The manager carries the token in the event it
//! emits, so the issuer can recognise its own change coming back around and
//! panes can tell a synchronized update from local input.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use super::pane::PaneId;

static NEXT_ISSUER: AtomicU32 = AtomicU32::new(1);

/// Identity of a token issuer, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IssuerId(u32);

impl IssuerId {
    fn next() -> Self {
        Self(NEXT_ISSUER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for IssuerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "issuer#{}", self.0)
    }
}

/// Marks a change as originating from synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceToken {
    issuer: IssuerId,
    op_id: u64,
    origin: Option<PaneId>,
    issued_at: Instant,
}

impl DebounceToken {
    /// Who issued this token.
    pub fn issuer(&self) -> IssuerId {
        self.issuer
    }

    /// Per-issuer operation counter.
    pub fn op_id(&self) -> u64 {
        self.op_id
    }

    /// Pane whose input started the operation, if any.
    pub fn origin(&self) -> Option<PaneId> {
        self.origin
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    /// Whether this token came from `issuer`.
    pub fn is_from(&self, issuer: IssuerId) -> bool {
        self.issuer == issuer
    }

    /// Whether the token is younger than `window` at `now`.
    pub fn is_fresh(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.issued_at) < window
    }
}

impl fmt::Display for DebounceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/op{}", self.issuer, self.op_id)
    }
}

/// Hands out tokens with a stable issuer id and increasing operation ids.
#[derive(Debug)]
pub struct TokenIssuer {
    id: IssuerId,
    next_op: Cell<u64>,
}

impl Default for TokenIssuer {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenIssuer {
    pub fn new() -> Self {
        Self {
            id: IssuerId::next(),
            next_op: Cell::new(0),
        }
    }

    pub fn id(&self) -> IssuerId {
        self.id
    }

    /// Issue a token for an operation started by `origin`.
    pub fn issue(&self, origin: Option<PaneId>) -> DebounceToken {
        let op_id = self.next_op.get() + 1;
        self.next_op.set(op_id);
        DebounceToken {
            issuer: self.id,
            op_id,
            origin,
            issued_at: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issuers_are_distinct() {
        let a = TokenIssuer::new();
        let b = TokenIssuer::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_tokens_increase_and_carry_origin() {
        let issuer = TokenIssuer::new();
        let first = issuer.issue(Some(PaneId(3)));
        let second = issuer.issue(None);

        assert_eq!(first.op_id() + 1, second.op_id());
        assert_eq!(first.origin(), Some(PaneId(3)));
        assert!(first.is_from(issuer.id()));
        assert_ne!(first, second);
    }

    #[test]
    fn test_freshness_window() {
        let issuer = TokenIssuer::new();
        let token = issuer.issue(None);
        let window = Duration::from_millis(50);

        assert!(token.is_fresh(token.issued_at(), window));
        assert!(!token.is_fresh(token.issued_at() + window, window));
    }
}
