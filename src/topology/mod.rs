//! Lattice topology: global geometry, slicing across ranks and the per-rank layout.
//!
//! This module provides:
//! - [`GlobalLattice`] and [`Parity`] for the periodic hypercubic lattice
//! - [`Slicing`] for the Cartesian decomposition into rank blocks
//! - [`Layout`] with neighbor tables, halo slots and parity classes
//!
//! Everything here is computed once at startup and is immutable afterwards.

pub mod geometry;
pub mod layout;
pub mod site;
pub mod slicing;

pub use geometry::{GlobalLattice, Parity};
pub use layout::Layout;
pub use site::{HaloSource, NO_SITE, SiteKind};
pub use slicing::Slicing;
