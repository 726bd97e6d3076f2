//! SU(2) algebra, the lattice action, measured observables, the magnetic
//! charge of the triplet's Abelian projection and smearing for blocking.

pub mod action;
pub mod magnetic;
pub mod observables;
pub mod smearing;
pub mod su2;

pub use action::{SiteTerms, local_action, site_action, site_terms};
pub use observables::{LocalSample, Measurement, measure, measure_local};
pub use smearing::smear_fields;
pub use su2::Su2;
