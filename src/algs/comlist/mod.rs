//! Communication lists: which owned sites go to which peer, and which halo
//! slots are filled from it, split by parity.
//!
//! Lists are negotiated once at startup:
//! 1. every rank builds its receive lists from its own halo slots, grouped by
//!    owning peer and ordered by global site index (even sites, then odd);
//! 2. per-parity counts are exchanged ([`size_exchange`]);
//! 3. the receive lists are sent to the peers as manifests of global indices
//!    ([`manifest`]) and turned into send lists of local owned sites;
//! 4. the resulting send-list lengths are sent back and checked against the
//!    receive lists, so a length mismatch is caught before the first sweep.
//!
//! Position `k` of a peer's send list for parity `P` is the site that lands in
//! position `k` of this rank's receive list for `P`. Halo exchange relies on
//! that and nothing else.

pub mod manifest;
pub mod size_exchange;

use crate::algs::communicator::{CommTag, Communicator};
use crate::debug_invariants::DebugInvariants;
use crate::lattice_error::LatticeError;
use crate::topology::geometry::Parity;
use crate::topology::layout::Layout;
use crate::topology::site::SiteKind;

/// Send and receive lists shared with one peer rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerLink {
    pub peer: usize,
    /// Owned sites to pack, per parity.
    pub send: [Vec<usize>; 2],
    /// Halo slots to fill, per parity.
    pub recv: [Vec<usize>; 2],
}

impl PeerLink {
    #[inline]
    pub fn send_list(&self, parity: Parity) -> &[usize] {
        &self.send[parity.index()]
    }

    #[inline]
    pub fn recv_list(&self, parity: Parity) -> &[usize] {
        &self.recv[parity.index()]
    }
}

/// All peer links of one rank, ascending by peer. Read-only after negotiation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Comlists {
    links: Vec<PeerLink>,
}

/// Receive lists of `layout`, one `[even, odd]` pair per neighbor rank.
fn build_recv_lists(layout: &Layout) -> Vec<(usize, [Vec<usize>; 2])> {
    layout
        .neighbor_ranks()
        .into_iter()
        .map(|peer| {
            let mut lists: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
            for slot in layout.halo_slots_from(peer) {
                lists[layout.parity(slot).index()].push(slot);
            }
            for l in &mut lists {
                l.sort_unstable_by_key(|&s| layout.global_index(s));
            }
            (peer, lists)
        })
        .collect()
}

/// Turn a peer's manifest into local send lists, checking that every
/// requested site is owned here and sits in the parity bucket it was asked in.
fn resolve_manifest(
    layout: &Layout,
    peer: usize,
    counts: [usize; 2],
    manifest: &[u64],
) -> Result<[Vec<usize>; 2], LatticeError> {
    let mut send: [Vec<usize>; 2] = [Vec::with_capacity(counts[0]), Vec::with_capacity(counts[1])];
    for (k, &global) in manifest.iter().enumerate() {
        let parity = if k < counts[0] { Parity::Even } else { Parity::Odd };
        let local = match layout.find_global(global).map(|i| layout.site_kind(i)) {
            Some(SiteKind::Owned(i)) => i,
            _ => return Err(LatticeError::ManifestSiteNotOwned { neighbor: peer, global }),
        };
        if layout.parity(local) != parity {
            return Err(LatticeError::InvariantViolation(format!(
                "rank {peer} requested site {global} as {parity:?}"
            )));
        }
        send[parity.index()].push(local);
    }
    Ok(send)
}

impl Comlists {
    /// Negotiate the comlists of `layout` with all neighbor ranks.
    ///
    /// Every rank of the communicator must call this collectively.
    ///
    /// # Errors
    /// - configuration errors if the communicator does not match the layout;
    /// - [`LatticeError::CommError`] on transport failure;
    /// - [`LatticeError::ManifestSiteNotOwned`] / [`LatticeError::ListSizeMismatch`]
    ///   if the two sides of a link disagree.
    pub fn negotiate<C: Communicator>(layout: &Layout, comm: &C) -> Result<Self, LatticeError> {
        if comm.size() != layout.size() {
            return Err(LatticeError::RankCountMismatch {
                requested: layout.size(),
                available: comm.size(),
            });
        }
        if comm.rank() != layout.rank() {
            return Err(LatticeError::InvalidParameter(format!(
                "communicator rank {} does not match layout rank {}",
                comm.rank(),
                layout.rank()
            )));
        }

        let recv = build_recv_lists(layout);
        if recv.is_empty() {
            log::debug!("rank {}: no neighbor ranks, halo exchange is a no-op", layout.rank());
            return Ok(Self::default());
        }
        let peers: Vec<usize> = recv.iter().map(|(p, _)| *p).collect();

        // 1) how many sites of each parity each peer wants from us
        let want: Vec<[usize; 2]> = recv.iter().map(|(_, l)| [l[0].len(), l[1].len()]).collect();
        let asked = size_exchange::exchange_parity_counts(comm, &peers, &want, CommTag::MANIFEST_SIZES)?;

        // 2) which sites, by global index
        let requests: Vec<Vec<u64>> = recv
            .iter()
            .map(|(_, l)| l.iter().flatten().map(|&s| layout.global_index(s)).collect())
            .collect();
        let incoming: Vec<usize> = asked.iter().map(|c| c[0] + c[1]).collect();
        let manifests =
            manifest::exchange_manifests(comm, &peers, &requests, &incoming, CommTag::MANIFEST_SITES)?;

        let mut links = Vec::with_capacity(peers.len());
        for (((peer, recv_lists), counts), manifest) in recv.into_iter().zip(&asked).zip(&manifests) {
            let send = resolve_manifest(layout, peer, *counts, manifest)?;
            links.push(PeerLink {
                peer,
                send,
                recv: recv_lists,
            });
        }

        // 3) cross-check: what each peer will send must fill our receive lists
        let sending: Vec<[usize; 2]> = links.iter().map(|l| [l.send[0].len(), l.send[1].len()]).collect();
        let will_get = size_exchange::exchange_parity_counts(comm, &peers, &sending, CommTag::LIST_CHECK)?;
        for (link, got) in links.iter().zip(&will_get) {
            for parity in Parity::ALL {
                let expected = link.recv_list(parity).len();
                if got[parity.index()] != expected {
                    return Err(LatticeError::ListSizeMismatch {
                        neighbor: link.peer,
                        parity,
                        sent: got[parity.index()],
                        expected,
                    });
                }
            }
        }

        for l in &links {
            log::debug!(
                "rank {} <-> {}: send {}+{} recv {}+{} (even+odd)",
                layout.rank(),
                l.peer,
                l.send[0].len(),
                l.send[1].len(),
                l.recv[0].len(),
                l.recv[1].len()
            );
        }
        let out = Self { links };
        crate::debug_invariants!(out.validate_invariants(), "Comlists::negotiate");
        Ok(out)
    }

    /// Peer links, ascending by peer rank.
    pub fn links(&self) -> &[PeerLink] {
        &self.links
    }

    /// True when this rank has no neighbor ranks at all.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn link(&self, peer: usize) -> Option<&PeerLink> {
        self.links
            .binary_search_by_key(&peer, |l| l.peer)
            .ok()
            .map(|i| &self.links[i])
    }

    /// Total number of sites sent for `parity`, across all peers.
    pub fn send_len(&self, parity: Parity) -> usize {
        self.links.iter().map(|l| l.send_list(parity).len()).sum()
    }

    /// Total number of halo slots received for `parity`, across all peers.
    pub fn recv_len(&self, parity: Parity) -> usize {
        self.links.iter().map(|l| l.recv_list(parity).len()).sum()
    }
}

impl DebugInvariants for Comlists {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Comlists");
    }

    fn validate_invariants(&self) -> Result<(), LatticeError> {
        if !self.links.windows(2).all(|w| w[0].peer < w[1].peer) {
            return Err(LatticeError::InvariantViolation(
                "peer links not strictly ascending".into(),
            ));
        }
        let mut seen = hashbrown::HashSet::new();
        for link in &self.links {
            for slot in link.recv.iter().flatten() {
                if !seen.insert(*slot) {
                    return Err(LatticeError::InvariantViolation(format!(
                        "halo slot {slot} is filled twice"
                    )));
                }
            }
        }
        Ok(())
    }
}
