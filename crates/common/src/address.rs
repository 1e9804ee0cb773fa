//! Global log addresses

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in the shared log, assigned exactly once by the sequencer
///
/// Addresses are totally ordered by issuance: if `a < b` and both were
/// claimed, `a` was handed out no later than `b`. The absence of an address
/// (an empty stream, a snapshot taken before the first entry) is modelled as
/// `Option<Address>::None`, which orders below every real address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(u64);

impl Address {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// The address immediately after this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The address immediately before this one, if any
    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }

    /// This address advanced by `n` positions
    pub fn offset(self, n: u64) -> Self {
        Self(self.0 + n)
    }

    /// First address strictly after `after` (address zero when `after` is none)
    pub fn first_after(after: Option<Address>) -> Self {
        after.map_or(Self(0), Self::next)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_orders_below_every_address() {
        assert!(None < Some(Address::new(0)));
        assert!(Some(Address::new(0)) < Some(Address::new(1)));
    }

    #[test]
    fn test_neighbours() {
        let a = Address::new(5);
        assert_eq!(a.next(), Address::new(6));
        assert_eq!(a.prev(), Some(Address::new(4)));
        assert_eq!(Address::new(0).prev(), None);
        assert_eq!(a.offset(3), Address::new(8));
    }

    #[test]
    fn test_first_after() {
        assert_eq!(Address::first_after(None), Address::new(0));
        assert_eq!(Address::first_after(Some(Address::new(9))), Address::new(10));
    }
}
