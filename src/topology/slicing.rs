//! Cartesian slicing of the global lattice into one hyper-rectangular block per rank.
//!
//! Each axis `d` is cut into `nslices[d]` equal pieces of `slice_extents[d]`
//! sites. Ranks are laid out on the resulting rank grid with axis 0 fastest,
//! the same convention as site indices.

use crate::lattice_error::LatticeError;
use crate::topology::geometry::{GlobalLattice, coords_to_index, index_to_coords};

/// Per-axis slicing of a [`GlobalLattice`] across a fixed number of ranks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slicing {
    nslices: Vec<usize>,
    slice_extents: Vec<usize>,
}

fn prime_factors(mut n: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut p = 2;
    while p * p <= n {
        while n % p == 0 {
            out.push(p);
            n /= p;
        }
        p += 1;
    }
    if n > 1 {
        out.push(n);
    }
    out
}

impl Slicing {
    /// Use `requested` if given, otherwise pick a slicing automatically.
    pub fn resolve(
        lattice: &GlobalLattice,
        requested: Option<&[usize]>,
        ranks: usize,
    ) -> Result<Self, LatticeError> {
        match requested {
            Some(n) => Self::explicit(lattice, n, ranks),
            None => Self::automatic(lattice, ranks),
        }
    }

    /// Validate an explicit `nslices` vector.
    ///
    /// # Errors
    /// ConfigurationError variants when the length is wrong, the product differs
    /// from `ranks`, an axis is not divisible, or a sliced axis would keep fewer
    /// than 2 sites per rank.
    pub fn explicit(
        lattice: &GlobalLattice,
        nslices: &[usize],
        ranks: usize,
    ) -> Result<Self, LatticeError> {
        if nslices.len() != lattice.dim() {
            return Err(LatticeError::InvalidParameter(format!(
                "nslices has {} entries for a {}-dimensional lattice",
                nslices.len(),
                lattice.dim()
            )));
        }
        let requested: usize = nslices.iter().product();
        if requested != ranks {
            return Err(LatticeError::RankCountMismatch {
                requested,
                available: ranks,
            });
        }
        let mut slice_extents = Vec::with_capacity(nslices.len());
        for (axis, (&extent, &slices)) in lattice.extents().iter().zip(nslices).enumerate() {
            if slices == 0 || extent % slices != 0 {
                return Err(LatticeError::IndivisibleSlicing {
                    axis,
                    extent,
                    slices,
                });
            }
            let local = extent / slices;
            if slices > 1 && local < 2 {
                return Err(LatticeError::SliceTooThin {
                    axis,
                    extent,
                    slices,
                });
            }
            slice_extents.push(local);
        }
        Ok(Self {
            nslices: nslices.to_vec(),
            slice_extents,
        })
    }

    /// Factor `ranks` into the axes: largest prime first, each onto the axis
    /// with the longest remaining local extent (lowest axis on ties).
    pub fn automatic(lattice: &GlobalLattice, ranks: usize) -> Result<Self, LatticeError> {
        if ranks == 0 {
            return Err(LatticeError::NoSlicing { ranks });
        }
        let mut nslices = vec![1usize; lattice.dim()];
        let mut local = lattice.extents().to_vec();
        let mut factors = prime_factors(ranks);
        factors.sort_unstable_by(|a, b| b.cmp(a));
        for p in factors {
            let mut best: Option<usize> = None;
            for d in 0..local.len() {
                if local[d] % p != 0 || local[d] / p < 2 {
                    continue;
                }
                if best.is_none_or(|b| local[d] > local[b]) {
                    best = Some(d);
                }
            }
            let d = best.ok_or(LatticeError::NoSlicing { ranks })?;
            nslices[d] *= p;
            local[d] /= p;
        }
        log::debug!("automatic slicing of {:?} over {ranks} ranks: {nslices:?}", lattice.extents());
        Ok(Self {
            nslices,
            slice_extents: local,
        })
    }

    #[inline]
    pub fn nslices(&self) -> &[usize] {
        &self.nslices
    }

    /// Local extent per axis (`sliceL`).
    #[inline]
    pub fn slice_extents(&self) -> &[usize] {
        &self.slice_extents
    }

    /// Number of ranks this slicing spans.
    pub fn ranks(&self) -> usize {
        self.nslices.iter().product()
    }

    /// Sites owned by every rank.
    pub fn local_volume(&self) -> usize {
        self.slice_extents.iter().product()
    }

    /// True if the axis is cut into more than one slice.
    #[inline]
    pub fn is_sliced(&self, axis: usize) -> bool {
        self.nslices[axis] > 1
    }

    /// Position of `rank` on the rank grid.
    pub fn rank_coords(&self, rank: usize, out: &mut [usize]) {
        index_to_coords(&self.nslices, rank, out);
    }

    /// Rank at a rank-grid position.
    pub fn rank_at(&self, rank_coords: &[usize]) -> usize {
        coords_to_index(&self.nslices, rank_coords)
    }

    /// Rank that owns a global coordinate.
    pub fn owner_of(&self, x: &[usize]) -> usize {
        let mut idx = 0usize;
        for d in (0..x.len()).rev() {
            idx = idx * self.nslices[d] + x[d] / self.slice_extents[d];
        }
        idx
    }
}
