//! LatticeError: unified error type for su2-lattice public APIs
//!
//! Every failure in this crate is fatal to the Markov chain: a sweep that
//! stopped halfway has no physical meaning, so callers abort the run on the
//! first `Err`. The variants are grouped the way they are reported:
//! configuration problems (raised once at startup), communication failures,
//! and invariant violations found while building the layout or comlists.

use crate::data::field::FieldKind;
use crate::topology::geometry::Parity;
use crate::update::kernel::Algorithm;
use thiserror::Error;

/// Unified error type for lattice construction, communication and updates.
#[derive(Debug, Error)]
pub enum LatticeError {
    // ----- configuration ---------------------------------------------------
    /// The lattice must have at least one axis.
    #[error("Configuration error: lattice dimension must be at least 1, got {0}")]
    InvalidDimension(usize),
    /// Extents must be even and at least 2, otherwise the periodic lattice is not bipartite.
    #[error("Configuration error: extent {extent} on axis {axis} must be even and >= 2")]
    InvalidExtent { axis: usize, extent: usize },
    /// The requested number of slices does not divide the extent.
    #[error("Configuration error: axis {axis} of extent {extent} cannot be cut into {slices} equal slices")]
    IndivisibleSlicing {
        axis: usize,
        extent: usize,
        slices: usize,
    },
    /// A sliced axis would end up with fewer than 2 sites per rank.
    #[error("Configuration error: axis {axis} of extent {extent} is too short for {slices} slices (need >= 2 sites per slice)")]
    SliceTooThin {
        axis: usize,
        extent: usize,
        slices: usize,
    },
    /// Product of `nslices` differs from the number of ranks.
    #[error("Configuration error: slicing uses {requested} ranks but {available} are available")]
    RankCountMismatch { requested: usize, available: usize },
    /// No factorisation of the rank count fits the lattice.
    #[error("Configuration error: cannot slice the lattice across {ranks} ranks")]
    NoSlicing { ranks: usize },
    /// Rank id outside `[0, size)`.
    #[error("Configuration error: rank {rank} out of range for {size} ranks")]
    InvalidRank { rank: usize, size: usize },
    /// A numeric parameter failed validation.
    #[error("Configuration error: {0}")]
    InvalidParameter(String),
    /// The algorithm is not implemented for the requested field kind.
    #[error("Configuration error: algorithm {algorithm:?} is not available for {kind:?}")]
    UnsupportedAlgorithm { kind: FieldKind, algorithm: Algorithm },
    /// An update or measurement referred to a scalar field that is switched off.
    #[error("Configuration error: field {0:?} is not enabled")]
    FieldNotEnabled(FieldKind),

    // ----- communication ---------------------------------------------------
    /// Transport-level failure while talking to `neighbor`.
    #[error("Communication failure with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ----- invariants ------------------------------------------------------
    /// Paired send/receive lists disagree in length.
    #[error("Invariant violation: rank {neighbor} sends {sent} {parity:?} sites but {expected} halo slots expect them")]
    ListSizeMismatch {
        neighbor: usize,
        parity: Parity,
        sent: usize,
        expected: usize,
    },
    /// One halo slot is filled from two different remote sites.
    #[error("Invariant violation: halo slot {slot} mapped to remote sites {first} and {second}")]
    HaloDoubleMapped { slot: usize, first: u64, second: u64 },
    /// A peer requested a site this rank does not own.
    #[error("Invariant violation: rank {neighbor} requested global site {global} which is not owned here")]
    ManifestSiteNotOwned { neighbor: usize, global: u64 },
    /// Any other broken structural invariant.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ----- kernels ---------------------------------------------------------
    /// A local-update kernel could not produce a result.
    #[error("Kernel failure for {kind:?} at site {site}: {reason}")]
    KernelFailure {
        kind: FieldKind,
        site: usize,
        reason: String,
    },
}

impl LatticeError {
    /// Shorthand for a communication failure with a formatted message.
    pub fn comm(neighbor: usize, msg: impl Into<String>) -> Self {
        LatticeError::CommError {
            neighbor,
            source: msg.into().into(),
        }
    }

    /// True for the configuration class of errors (reported once at startup).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LatticeError::InvalidDimension(_)
                | LatticeError::InvalidExtent { .. }
                | LatticeError::IndivisibleSlicing { .. }
                | LatticeError::SliceTooThin { .. }
                | LatticeError::RankCountMismatch { .. }
                | LatticeError::NoSlicing { .. }
                | LatticeError::InvalidRank { .. }
                | LatticeError::InvalidParameter(_)
                | LatticeError::UnsupportedAlgorithm { .. }
                | LatticeError::FieldNotEnabled(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comm_error_carries_neighbor_and_message() {
        let err = LatticeError::comm(3, "timed out");
        assert!(matches!(err, LatticeError::CommError { neighbor: 3, .. }));
        assert_eq!(err.to_string(), "Communication failure with rank 3: timed out");
        assert!(!err.is_configuration());
    }

    #[test]
    fn configuration_class() {
        let err = LatticeError::InvalidExtent { axis: 1, extent: 3 };
        assert!(err.is_configuration());
        assert!(err.to_string().contains("axis 1"));
    }
}
