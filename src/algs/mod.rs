//! Communication algorithms: transports, wire format, comlists, halo exchange
//! and reductions.

pub mod comlist;
pub mod communicator;
pub mod halo;
pub mod reduction;
pub mod wire;

pub use comlist::Comlists;
pub use halo::{exchange, exchange_components, exchange_full};
pub use reduction::{gather_to_root, reduce_sum, reduce_sum_slice};
