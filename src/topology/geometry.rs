//! Global lattice geometry: extents, coordinate/index maps and checkerboard parity.
//!
//! All linear indices use **axis 0 fastest** ordering, both for the global
//! lattice and for every rank-local block, so a global index is a stable key
//! that does not depend on how the lattice was sliced.

use crate::lattice_error::LatticeError;
use serde::{Deserialize, Serialize};

/// Checkerboard class of a site: parity of the sum of its global coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    /// Both parities in sweep order.
    pub const ALL: [Parity; 2] = [Parity::Even, Parity::Odd];

    #[inline]
    pub fn opposite(self) -> Parity {
        match self {
            Parity::Even => Parity::Odd,
            Parity::Odd => Parity::Even,
        }
    }

    /// 0 for even, 1 for odd.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Parity of a global coordinate vector.
    #[inline]
    pub fn of_coords(x: &[usize]) -> Parity {
        if x.iter().sum::<usize>() % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }
}

/// Linear index of `x` inside a box of shape `extents` (axis 0 fastest).
#[inline]
pub fn coords_to_index(extents: &[usize], x: &[usize]) -> usize {
    debug_assert_eq!(extents.len(), x.len());
    let mut idx = 0usize;
    for d in (0..extents.len()).rev() {
        idx = idx * extents[d] + x[d];
    }
    idx
}

/// Inverse of [`coords_to_index`]: writes the coordinates of `i` into `out`.
#[inline]
pub fn index_to_coords(extents: &[usize], mut i: usize, out: &mut [usize]) {
    debug_assert_eq!(extents.len(), out.len());
    for (d, &l) in extents.iter().enumerate() {
        out[d] = i % l;
        i /= l;
    }
}

/// The global D-dimensional periodic hypercubic lattice. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalLattice {
    extents: Vec<usize>,
}

impl GlobalLattice {
    /// Validate and wrap the extents.
    ///
    /// # Errors
    /// - [`LatticeError::InvalidDimension`] for an empty extent list.
    /// - [`LatticeError::InvalidExtent`] for an odd or < 2 extent: a periodic
    ///   axis of odd length is not bipartite, which breaks the checkerboard.
    pub fn new(extents: Vec<usize>) -> Result<Self, LatticeError> {
        if extents.is_empty() {
            return Err(LatticeError::InvalidDimension(0));
        }
        for (axis, &extent) in extents.iter().enumerate() {
            if extent < 2 || extent % 2 != 0 {
                return Err(LatticeError::InvalidExtent { axis, extent });
            }
        }
        Ok(Self { extents })
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.extents.len()
    }

    #[inline]
    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    /// Total number of sites.
    pub fn volume(&self) -> usize {
        self.extents.iter().product()
    }

    /// Global linear index of a coordinate vector.
    #[inline]
    pub fn index_of(&self, x: &[usize]) -> u64 {
        coords_to_index(&self.extents, x) as u64
    }

    /// Coordinates of a global linear index.
    #[inline]
    pub fn coords_of(&self, idx: u64, out: &mut [usize]) {
        index_to_coords(&self.extents, idx as usize, out);
    }

    /// Periodic wrap of a (possibly negative or overflowing) coordinate.
    #[inline]
    pub fn wrap(&self, axis: usize, coord: isize) -> usize {
        coord.rem_euclid(self.extents[axis] as isize) as usize
    }

    /// Copy `x` into `out`, moved by `step` along `axis` with periodic wraparound.
    #[inline]
    pub fn shifted(&self, x: &[usize], axis: usize, step: isize, out: &mut [usize]) {
        out.copy_from_slice(x);
        out[axis] = self.wrap(axis, x[axis] as isize + step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_odd_and_tiny_extents() {
        assert!(matches!(
            GlobalLattice::new(vec![4, 3]),
            Err(LatticeError::InvalidExtent { axis: 1, extent: 3 })
        ));
        assert!(matches!(
            GlobalLattice::new(vec![0]),
            Err(LatticeError::InvalidExtent { axis: 0, extent: 0 })
        ));
        assert!(matches!(
            GlobalLattice::new(vec![]),
            Err(LatticeError::InvalidDimension(0))
        ));
    }

    #[test]
    fn index_roundtrip_axis0_fastest() {
        let lat = GlobalLattice::new(vec![4, 2, 6]).unwrap();
        assert_eq!(lat.index_of(&[1, 0, 0]), 1);
        assert_eq!(lat.index_of(&[0, 1, 0]), 4);
        assert_eq!(lat.index_of(&[0, 0, 1]), 8);
        let mut x = [0; 3];
        for i in 0..lat.volume() as u64 {
            lat.coords_of(i, &mut x);
            assert_eq!(lat.index_of(&x), i);
        }
    }

    #[test]
    fn periodic_shift_wraps_both_ways() {
        let lat = GlobalLattice::new(vec![4, 4]).unwrap();
        let mut out = [0; 2];
        lat.shifted(&[0, 3], 0, -1, &mut out);
        assert_eq!(out, [3, 3]);
        lat.shifted(&[0, 3], 1, 1, &mut out);
        assert_eq!(out, [0, 0]);
    }

    #[test]
    fn parity_from_coordinate_sum() {
        assert_eq!(Parity::of_coords(&[0, 0, 0]), Parity::Even);
        assert_eq!(Parity::of_coords(&[1, 0, 2]), Parity::Odd);
        assert_eq!(Parity::Odd.opposite(), Parity::Even);
        assert_eq!(Parity::Odd.index(), 1);
    }
}
