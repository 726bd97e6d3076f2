//! Per-rank lattice layout: owned block, halo shell, neighbor tables and parity.
//!
//! A [`Layout`] is computed once from the global extents, the slicing and the
//! rank id. It is a pure function of those inputs, so the layouts of all ranks
//! can be built side by side (tests do this) and every rank agrees on the
//! numbering without any communication.
//!
//! The halo shell holds one slot per distinct remote site at offset `±e_a` or
//! `±e_a ± e_b` (`a != b`) from an owned site. Slots are keyed by global index,
//! so a corner site referenced from several directions is stored once. The
//! diagonal part lets plaquette/staple chains such as `prev[next[i][a]][b]`
//! resolve to valid slots.

use crate::debug_invariants::DebugInvariants;
use crate::lattice_error::LatticeError;
use crate::topology::geometry::{GlobalLattice, Parity, index_to_coords};
use crate::topology::site::{HaloSource, NO_SITE, SiteKind};
use crate::topology::slicing::Slicing;
use hashbrown::HashMap;
use itertools::Itertools;

/// Immutable description of one rank's part of the lattice.
#[derive(Clone, Debug)]
pub struct Layout {
    lattice: GlobalLattice,
    slicing: Slicing,
    rank: usize,
    origin: Vec<usize>,
    sites: usize,
    sites_total: usize,
    /// Global coordinates of every owned site and halo slot, `sites_total * dim`.
    coords: Vec<usize>,
    global: Vec<u64>,
    parity: Vec<Parity>,
    next: Vec<usize>,
    prev: Vec<usize>,
    halo_owner: Vec<usize>,
    halo_lookup: HashMap<u64, usize>,
    parity_sites: [Vec<usize>; 2],
}

impl Layout {
    /// Build the layout of `rank`.
    ///
    /// # Errors
    /// [`LatticeError::InvalidRank`] if `rank` is outside the slicing's rank grid.
    pub fn new(lattice: GlobalLattice, slicing: Slicing, rank: usize) -> Result<Self, LatticeError> {
        let size = slicing.ranks();
        if rank >= size {
            return Err(LatticeError::InvalidRank { rank, size });
        }
        let dim = lattice.dim();
        let mut origin = vec![0; dim];
        slicing.rank_coords(rank, &mut origin);
        for (o, &l) in origin.iter_mut().zip(slicing.slice_extents()) {
            *o *= l;
        }

        let sites = slicing.local_volume();
        let mut layout = Layout {
            lattice,
            slicing,
            rank,
            origin,
            sites,
            sites_total: sites,
            coords: Vec::with_capacity(sites * dim),
            global: Vec::with_capacity(sites),
            parity: Vec::with_capacity(sites),
            next: Vec::new(),
            prev: Vec::new(),
            halo_owner: Vec::new(),
            halo_lookup: HashMap::new(),
            parity_sites: [Vec::new(), Vec::new()],
        };

        // owned block, axis 0 fastest
        let mut local = vec![0; dim];
        let mut x = vec![0; dim];
        for i in 0..sites {
            index_to_coords(layout.slicing.slice_extents(), i, &mut local);
            for d in 0..dim {
                x[d] = layout.origin[d] + local[d];
            }
            layout.push_row(&x);
        }

        layout.build_halo_shell();
        layout.build_neighbor_tables();
        for i in 0..sites {
            layout.parity_sites[layout.parity[i].index()].push(i);
        }

        log::info!(
            "rank {rank}/{size}: nslices {:?}, local extents {:?}, {} sites + {} halo slots",
            layout.slicing.nslices(),
            layout.slicing.slice_extents(),
            layout.sites,
            layout.halos()
        );
        crate::debug_invariants!(layout.validate_invariants(), "Layout::new");
        Ok(layout)
    }

    fn push_row(&mut self, x: &[usize]) {
        self.coords.extend_from_slice(x);
        self.global.push(self.lattice.index_of(x));
        self.parity.push(Parity::of_coords(x));
    }

    fn intern_halo(&mut self, x: &[usize]) {
        let owner = self.slicing.owner_of(x);
        if owner == self.rank {
            return;
        }
        let g = self.lattice.index_of(x);
        if self.halo_lookup.contains_key(&g) {
            return;
        }
        let slot = self.sites_total;
        self.halo_lookup.insert(g, slot);
        self.halo_owner.push(owner);
        self.push_row(x);
        self.sites_total += 1;
    }

    fn build_halo_shell(&mut self) {
        let dim = self.dim();
        let mut x = vec![0; dim];
        let mut y = vec![0; dim];
        let mut z = vec![0; dim];
        for i in 0..self.sites {
            x.copy_from_slice(self.coords(i));
            for a in 0..dim {
                for step in [1isize, -1] {
                    self.lattice.shifted(&x, a, step, &mut y);
                    self.intern_halo(&y);
                }
            }
            for (a, b) in (0..dim).tuple_combinations() {
                for (sa, sb) in [(1isize, 1isize), (1, -1), (-1, 1), (-1, -1)] {
                    self.lattice.shifted(&x, a, sa, &mut y);
                    self.lattice.shifted(&y, b, sb, &mut z);
                    self.intern_halo(&z);
                }
            }
        }
    }

    fn build_neighbor_tables(&mut self) {
        let dim = self.dim();
        self.next = vec![NO_SITE; self.sites_total * dim];
        self.prev = vec![NO_SITE; self.sites_total * dim];
        let mut x = vec![0; dim];
        let mut y = vec![0; dim];
        for r in 0..self.sites_total {
            x.copy_from_slice(self.coords(r));
            for d in 0..dim {
                self.lattice.shifted(&x, d, 1, &mut y);
                self.next[r * dim + d] = self.find_site(&y).unwrap_or(NO_SITE);
                self.lattice.shifted(&x, d, -1, &mut y);
                self.prev[r * dim + d] = self.find_site(&y).unwrap_or(NO_SITE);
            }
        }
    }

    // ----- sizes -------------------------------------------------------------

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks in the slicing.
    #[inline]
    pub fn size(&self) -> usize {
        self.slicing.ranks()
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.lattice.dim()
    }

    #[inline]
    pub fn lattice(&self) -> &GlobalLattice {
        &self.lattice
    }

    #[inline]
    pub fn slicing(&self) -> &Slicing {
        &self.slicing
    }

    /// Global coordinates of local site 0.
    pub fn origin(&self) -> &[usize] {
        &self.origin
    }

    /// Owned sites on this rank.
    #[inline]
    pub fn sites(&self) -> usize {
        self.sites
    }

    /// Halo slots on this rank.
    #[inline]
    pub fn halos(&self) -> usize {
        self.sites_total - self.sites
    }

    /// Owned sites plus halo slots: the length of every field array.
    #[inline]
    pub fn sites_total(&self) -> usize {
        self.sites_total
    }

    /// Sites in the whole lattice.
    pub fn volume(&self) -> usize {
        self.lattice.volume()
    }

    // ----- per-site queries ------------------------------------------------

    /// Forward neighbor of `i` along `dir`. Always valid for owned sites.
    #[inline]
    pub fn next(&self, i: usize, dir: usize) -> usize {
        self.next[i * self.dim() + dir]
    }

    /// Backward neighbor of `i` along `dir`. Always valid for owned sites.
    #[inline]
    pub fn prev(&self, i: usize, dir: usize) -> usize {
        self.prev[i * self.dim() + dir]
    }

    /// Forward neighbor, `None` where a halo row leaves the shell.
    #[inline]
    pub fn try_next(&self, i: usize, dir: usize) -> Option<usize> {
        Some(self.next(i, dir)).filter(|&n| n != NO_SITE)
    }

    /// Backward neighbor, `None` where a halo row leaves the shell.
    #[inline]
    pub fn try_prev(&self, i: usize, dir: usize) -> Option<usize> {
        Some(self.prev(i, dir)).filter(|&n| n != NO_SITE)
    }

    #[inline]
    pub fn parity(&self, i: usize) -> Parity {
        self.parity[i]
    }

    /// Global linear index of an owned site or halo slot.
    #[inline]
    pub fn global_index(&self, i: usize) -> u64 {
        self.global[i]
    }

    /// Global coordinates of an owned site or halo slot.
    #[inline]
    pub fn coords(&self, i: usize) -> &[usize] {
        let d = self.dim();
        &self.coords[i * d..(i + 1) * d]
    }

    #[inline]
    pub fn site_kind(&self, i: usize) -> SiteKind {
        SiteKind::classify(i, self.sites)
    }

    /// Owner and global index of a halo slot; `None` for owned sites.
    pub fn halo_source(&self, i: usize) -> Option<HaloSource> {
        match self.site_kind(i) {
            SiteKind::Owned(_) => None,
            SiteKind::Halo(h) => Some(HaloSource {
                owner: self.halo_owner[h],
                global: self.global[i],
            }),
        }
    }

    /// Owned sites of one parity, ascending.
    #[inline]
    pub fn parity_sites(&self, parity: Parity) -> &[usize] {
        &self.parity_sites[parity.index()]
    }

    /// Local index (owned or halo) of a global coordinate, if present on this rank.
    pub fn find_site(&self, x: &[usize]) -> Option<usize> {
        if self.slicing.owner_of(x) == self.rank {
            let ext = self.slicing.slice_extents();
            let mut idx = 0usize;
            for d in (0..x.len()).rev() {
                idx = idx * ext[d] + (x[d] - self.origin[d]);
            }
            Some(idx)
        } else {
            self.halo_lookup.get(&self.lattice.index_of(x)).copied()
        }
    }

    /// Local index of a global linear index, if present on this rank.
    pub fn find_global(&self, global: u64) -> Option<usize> {
        let mut x = vec![0; self.dim()];
        self.lattice.coords_of(global, &mut x);
        self.find_site(&x)
    }

    /// Rank owning a global coordinate.
    pub fn rank_of(&self, x: &[usize]) -> usize {
        self.slicing.owner_of(x)
    }

    /// True if neighbors along `axis` always live on this rank (single slice),
    /// so that axis never goes through the communication layer.
    #[inline]
    pub fn is_axis_local(&self, axis: usize) -> bool {
        !self.slicing.is_sliced(axis)
    }

    /// Ranks owning at least one halo slot, ascending.
    pub fn neighbor_ranks(&self) -> Vec<usize> {
        self.halo_owner.iter().copied().sorted_unstable().dedup().collect()
    }

    /// Halo slots filled from `peer`, in slot order.
    pub fn halo_slots_from(&self, peer: usize) -> impl Iterator<Item = usize> + '_ {
        self.halo_owner
            .iter()
            .enumerate()
            .filter(move |&(_, &o)| o == peer)
            .map(move |(h, _)| self.sites + h)
    }
}

impl DebugInvariants for Layout {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Layout");
    }

    fn validate_invariants(&self) -> Result<(), LatticeError> {
        if self.sites * self.size() != self.volume() {
            return Err(LatticeError::InvariantViolation(format!(
                "{} owned sites on each of {} ranks do not cover volume {}",
                self.sites,
                self.size(),
                self.volume()
            )));
        }
        if self.halo_lookup.len() != self.halos() {
            return Err(LatticeError::InvariantViolation(
                "halo lookup and halo slots disagree".into(),
            ));
        }
        for (g, &slot) in &self.halo_lookup {
            if self.global[slot] != *g {
                return Err(LatticeError::HaloDoubleMapped {
                    slot,
                    first: self.global[slot],
                    second: *g,
                });
            }
            if self.halo_owner[slot - self.sites] == self.rank {
                return Err(LatticeError::InvariantViolation(format!(
                    "halo slot {slot} is owned by this rank"
                )));
            }
        }
        for i in 0..self.sites {
            for d in 0..self.dim() {
                let n = self.next(i, d);
                let p = self.prev(i, d);
                if n == NO_SITE || p == NO_SITE {
                    return Err(LatticeError::InvariantViolation(format!(
                        "owned site {i} has no neighbor along axis {d}"
                    )));
                }
                if self.prev(n, d) != i || self.next(p, d) != i {
                    return Err(LatticeError::InvariantViolation(format!(
                        "next/prev are not inverse at site {i}, axis {d}"
                    )));
                }
                if self.parity(n) == self.parity(i) {
                    return Err(LatticeError::InvariantViolation(format!(
                        "site {i} and its neighbor along {d} share a parity"
                    )));
                }
            }
        }
        Ok(())
    }
}
