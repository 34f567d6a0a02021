//! Strongly-typed identifiers used across the compiler core.
//!
//! Downstream crates should *not* use raw integers for IDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! new_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(v: u64) -> Self {
                Self(v)
            }
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

// Index of an operator inside one `OperatorGraph` arena.
new_id!(OperatorId);
// Identity shared by every copy of one logical operator.
new_id!(OriginId);
new_id!(SubPlanId);

static NEXT_ORIGIN: AtomicU64 = AtomicU64::new(1);

impl OriginId {
    /// Allocate a fresh origin id.
    ///
    /// Origins only need to be unique; the counter is process-wide so graphs
    /// built independently (or rewritten later) never collide.
    pub fn fresh() -> Self {
        Self(NEXT_ORIGIN.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_origins_are_distinct() {
        let a = OriginId::fresh();
        let b = OriginId::fresh();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn ids_display_with_type_name() {
        assert_eq!(OperatorId::new(7).to_string(), "OperatorId(7)");
        assert_eq!(SubPlanId::new(0).to_string(), "SubPlanId(0)");
    }
}
