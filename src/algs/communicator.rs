//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable** but non-blocking: the halo and comlist code
//! calls `.wait()` before it trusts that a buffer is ready, and treats a
//! `None` from a receive handle as a fatal communication failure.

use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Non-blocking communication interface (minimal by design).
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// This process' rank.
    fn rank(&self) -> usize;
    /// Number of ranks taking part.
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Typed message tag. Each communication epoch uses its own tag range so
/// startup negotiation, reductions and halo traffic never match each other.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(u16);

impl CommTag {
    /// Comlist manifest: per-parity request counts.
    pub const MANIFEST_SIZES: CommTag = CommTag(0x1000);
    /// Comlist manifest: requested global site indices.
    pub const MANIFEST_SITES: CommTag = CommTag(0x1001);
    /// Comlist cross-check of per-parity list lengths.
    pub const LIST_CHECK: CommTag = CommTag(0x1002);
    /// Reductions (gather to root).
    pub const REDUCE_GATHER: CommTag = CommTag(0x2000);
    /// Reductions (broadcast from root).
    pub const REDUCE_BCAST: CommTag = CommTag(0x2001);
    /// Per-site records collected on rank 0.
    pub const GATHER: CommTag = CommTag(0x2002);
    /// Base of the halo-exchange range; see [`CommTag::halo`].
    pub const HALO_BASE: CommTag = CommTag(0x4000);

    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Tag of one halo message class: field kind, component and parity.
    pub fn halo(kind: u8, comp: usize, parity: usize) -> Self {
        debug_assert!(comp < 0x80 && parity < 2);
        Self(Self::HALO_BASE.0 | ((kind as u16) << 8) | ((comp as u16) << 1) | parity as u16)
    }
}

/// Compile-time no-op comm for single-rank runs and pure serial unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}
}

// --- LocalComm: several ranks inside one process ---
type Key = (usize, usize, u16); // (src, dst, tag)
type Mailbox = Arc<DashMap<Key, VecDeque<Bytes>>>;

/// Default time a receive waits before it is reported as failed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Receive handle of [`LocalComm`]; polls the shared mailbox on `wait`.
pub struct LocalHandle {
    mailbox: Mailbox,
    key: Key,
    timeout: Duration,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let deadline = Instant::now() + self.timeout;
        let mut spins = 0u32;
        loop {
            if let Some(mut queue) = self.mailbox.get_mut(&self.key) {
                if let Some(bytes) = queue.pop_front() {
                    return Some(bytes.to_vec());
                }
            }
            if Instant::now() >= deadline {
                log::error!(
                    "receive from rank {} (tag {:#06x}) timed out on rank {}",
                    self.key.0,
                    self.key.2,
                    self.key.1
                );
                return None;
            }
            spins += 1;
            if spins < 64 {
                std::thread::yield_now();
            } else {
                std::thread::sleep(Duration::from_micros(50));
            }
        }
    }
}

/// In-process communicator: one instance per simulated rank, usually each
/// driven from its own thread. Messages between a (src, dst, tag) triple are
/// delivered in FIFO order, like MPI's non-overtaking rule.
#[derive(Clone, Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Mailbox,
    timeout: Duration,
}

impl LocalComm {
    /// Create `size` connected communicators, index = rank.
    pub fn world(size: usize) -> Vec<LocalComm> {
        Self::world_with_timeout(size, DEFAULT_TIMEOUT)
    }

    /// Like [`LocalComm::world`] with a custom receive timeout.
    pub fn world_with_timeout(size: usize, timeout: Duration) -> Vec<LocalComm> {
        let mailbox: Mailbox = Arc::new(DashMap::new());
        (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                mailbox: mailbox.clone(),
                timeout,
            })
            .collect()
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        self.mailbox
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            mailbox: self.mailbox.clone(),
            key: (peer, self.rank, tag),
            timeout: self.timeout,
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use crate::lattice_error::LatticeError;
    use mpi::environment::Universe;
    use mpi::request::StaticScope;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// MPI world communicator. Buffers handed to MPI are owned by the handle
    /// until `wait` returns. A receive yields exactly the bytes of the matched
    /// message, so a short message fails the callers' length checks like it
    /// does with [`LocalComm`].
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
        _universe: Universe,
    }

    impl MpiComm {
        /// Initialise MPI and wrap the world communicator.
        pub fn new() -> Result<Self, LatticeError> {
            let universe = mpi::initialize()
                .ok_or_else(|| LatticeError::comm(0, "MPI already initialised"))?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                world,
                rank,
                size,
                _universe: universe,
            })
        }
    }

    pub struct MpiHandle(Box<dyn FnOnce() -> Option<Vec<u8>>>);

    impl Wait for MpiHandle {
        fn wait(self) -> Option<Vec<u8>> {
            (self.0)()
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            let owned: &'static [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let raw = owned as *const [u8] as *mut [u8];
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, owned, tag as i32);
            MpiHandle(Box::new(move || {
                req.wait();
                // SAFETY: `raw` came from `Box::leak` above and MPI no longer
                // references it once the request has completed.
                unsafe { drop(Box::from_raw(raw)) };
                None
            }))
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let owned: &'static mut [u8] = Box::leak(vec![0u8; buf.len()].into_boxed_slice());
            let raw = owned as *mut [u8];
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, owned, tag as i32);
            MpiHandle(Box::new(move || -> Option<Vec<u8>> {
                let status = req.wait();
                // SAFETY: as in `isend`; the request is complete.
                let mut data = unsafe { Box::from_raw(raw) }.into_vec();
                // only the matched message's bytes; the length check is the caller's
                let count = status.count(u8::equivalent_datatype());
                data.truncate(usize::try_from(count).ok()?);
                Some(data)
            }))
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
