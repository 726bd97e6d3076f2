//! Self-checks of the per-rank lattice structures.
//!
//! [`Layout`](crate::topology::Layout) and
//! [`Comlists`](crate::algs::comlist::Comlists) verify their neighbor tables,
//! halo maps and send/receive lists after construction in debug builds, or
//! in any build with the `check-invariants` feature.

use crate::lattice_error::LatticeError;

/// A lattice structure that can check its own consistency.
pub trait DebugInvariants {
    /// Panic on the first broken invariant when checks are compiled in.
    fn debug_assert_invariants(&self);
    /// First broken invariant (neighbor symmetry, halo ownership, list order).
    fn validate_invariants(&self) -> Result<(), LatticeError>;
}

/// Run a fallible check and panic with `ctx` on error when checks are
/// compiled in; expands to nothing otherwise.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
