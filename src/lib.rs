#![cfg_attr(docsrs, feature(doc_cfg))]
//! # su2-lattice
//!
//! su2-lattice is a distributed Monte-Carlo engine for SU(2) lattice gauge
//! theory coupled to scalar fields (fundamental doublet, adjoint triplet,
//! real singlet). The global periodic lattice is sliced into one block per
//! rank; neighbor values living on other ranks are mirrored into halo slots
//! refreshed by explicit exchanges between checkerboard passes.
//!
//! ## Features
//! - Layout with neighbor tables, parity classes and a deduplicated halo shell
//!   that also covers the diagonal neighbors staples need
//! - Comlists negotiated once at startup, checked for size symmetry
//! - Halo exchange and rank-ordered reductions over pluggable communicators
//!   (serial, in-process threads, MPI)
//! - Checkerboard scheduler with parallel same-parity updates (`rayon`)
//! - Metropolis, heatbath and overrelaxation kernels and the observables of
//!   the model
//!
//! ## Determinism
//!
//! Every random number is drawn from a `SmallRng` keyed by the run seed, the
//! pass counter and the global site index. The same configuration therefore
//! produces bit-identical fields on any number of ranks, in any visitation
//! order and with or without `rayon`.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! su2-lattice = "0.1"
//! # Optional features:
//! # features = ["mpi-support", "check-invariants"]
//! ```
//!
//! ```no_run
//! use su2_lattice::prelude::*;
//!
//! let config = SimulationConfig::default();
//! let mut sim = Simulation::new(config, NoComm)?;
//! sim.run(100, 10, |m| {
//!     println!("{}: {}", m.sweep, m.plaquette);
//!     Ok(())
//! })?;
//! # Ok::<(), LatticeError>(())
//! ```

pub mod algs;
pub mod config;
pub mod data;
pub mod debug_invariants;
pub mod lattice_error;
pub mod physics;
pub mod simulation;
pub mod topology;
pub mod update;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::comlist::Comlists;
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, LocalComm, NoComm};
    pub use crate::config::{
        ActionParams, FieldsConfig, InitConfig, LatticeConfig, MetropolisWidths,
        SimulationConfig, UpdateStep,
    };
    pub use crate::data::{Field, FieldKind, FieldSet};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::lattice_error::LatticeError;
    pub use crate::physics::{Measurement, Su2};
    pub use crate::simulation::{Lattice, Simulation};
    pub use crate::topology::{GlobalLattice, Layout, Parity, Slicing};
    pub use crate::update::{Algorithm, Counters, VisitOrder};
}
