//! Monte-Carlo updates: kernels, random streams, counters and the
//! checkerboard scheduler that drives them.

pub mod counters;
pub mod heatbath;
pub mod kernel;
pub mod metropolis;
pub mod overrelax;
pub mod rng;
pub mod scheduler;

pub use counters::{Counters, Tally};
pub use kernel::{Algorithm, LocalUpdate, SiteContext, make_kernel};
pub use rng::SiteRng;
pub use scheduler::{HaloKey, Scheduler, SweepEnv, VisitOrder};
