//! Dense per-site field storage.
//!
//! A [`Field`] stores `comps` component vectors of `dofs` reals for every
//! owned site and halo slot, laid out `[site][comp][dof]` in one `Vec<f64>`.
//! Owned entries are written by update commits only, halo entries by the halo
//! exchange only.

use serde::{Deserialize, Serialize};

/// Upper bound of reals per component vector over all field kinds.
pub const MAX_DOFS: usize = 4;

/// One component vector, zero-padded to [`MAX_DOFS`].
pub type SiteValue = [f64; MAX_DOFS];

/// The field species of the model.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// SU(2) gauge links, one unit quaternion per direction.
    Link,
    /// Fundamental Higgs doublet, stored as a quaternion.
    Doublet,
    /// Adjoint (real) triplet.
    Triplet,
    /// Real gauge-singlet scalar.
    Singlet,
    /// U(1) hypercharge links, one angle per direction.
    U1Link,
    /// Second Higgs doublet, same storage as [`FieldKind::Doublet`].
    Doublet2,
}

impl FieldKind {
    pub const ALL: [FieldKind; 6] = [
        FieldKind::Link,
        FieldKind::Doublet,
        FieldKind::Triplet,
        FieldKind::Singlet,
        FieldKind::U1Link,
        FieldKind::Doublet2,
    ];

    /// Reals per component vector.
    #[inline]
    pub fn dofs(self) -> usize {
        match self {
            FieldKind::Link | FieldKind::Doublet | FieldKind::Doublet2 => 4,
            FieldKind::Triplet => 3,
            FieldKind::Singlet | FieldKind::U1Link => 1,
        }
    }

    /// Component vectors per site: one per direction for links, one otherwise.
    #[inline]
    pub fn components(self, dim: usize) -> usize {
        if self.is_link() { dim } else { 1 }
    }

    #[inline]
    pub fn is_link(self) -> bool {
        matches!(self, FieldKind::Link | FieldKind::U1Link)
    }

    /// Small stable id, used in message tags.
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// Dense field over all owned sites and halo slots of one rank.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    kind: FieldKind,
    comps: usize,
    dofs: usize,
    sites_total: usize,
    data: Vec<f64>,
}

impl Field {
    /// Zero-filled field of `kind` for a `dim`-dimensional layout with `sites_total` rows.
    pub fn zeros(kind: FieldKind, dim: usize, sites_total: usize) -> Self {
        let comps = kind.components(dim);
        let dofs = kind.dofs();
        Self {
            kind,
            comps,
            dofs,
            sites_total,
            data: vec![0.0; sites_total * comps * dofs],
        }
    }

    #[inline]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    #[inline]
    pub fn comps(&self) -> usize {
        self.comps
    }

    #[inline]
    pub fn dofs(&self) -> usize {
        self.dofs
    }

    #[inline]
    pub fn sites_total(&self) -> usize {
        self.sites_total
    }

    #[inline]
    fn offset(&self, site: usize, comp: usize) -> usize {
        debug_assert!(site < self.sites_total && comp < self.comps);
        (site * self.comps + comp) * self.dofs
    }

    /// Component vector `comp` of `site`.
    #[inline]
    pub fn get(&self, site: usize, comp: usize) -> &[f64] {
        let o = self.offset(site, comp);
        &self.data[o..o + self.dofs]
    }

    #[inline]
    pub fn get_mut(&mut self, site: usize, comp: usize) -> &mut [f64] {
        let o = self.offset(site, comp);
        &mut self.data[o..o + self.dofs]
    }

    /// Copy of a component vector, zero-padded.
    #[inline]
    pub fn value(&self, site: usize, comp: usize) -> SiteValue {
        let mut v = [0.0; MAX_DOFS];
        v[..self.dofs].copy_from_slice(self.get(site, comp));
        v
    }

    /// Overwrite a component vector from a padded value.
    #[inline]
    pub fn set(&mut self, site: usize, comp: usize, v: &SiteValue) {
        let dofs = self.dofs;
        self.get_mut(site, comp).copy_from_slice(&v[..dofs]);
    }

    /// All values of all sites, halo slots included.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Values of the owned rows `[0, sites)` only.
    pub fn owned(&self, sites: usize) -> &[f64] {
        &self.data[..sites * self.comps * self.dofs]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_fixed_shapes() {
        assert_eq!(FieldKind::Link.components(4), 4);
        assert_eq!(FieldKind::Triplet.components(4), 1);
        assert_eq!(FieldKind::Triplet.dofs(), 3);
        assert!(FieldKind::ALL.iter().all(|k| k.dofs() <= MAX_DOFS));
        assert_eq!(FieldKind::Singlet.id(), 3);
        assert_eq!(FieldKind::U1Link.components(3), 3);
        assert_eq!(FieldKind::U1Link.dofs(), 1);
        assert_eq!(FieldKind::Doublet2.components(3), 1);
        assert_eq!(FieldKind::Doublet2.id(), 5);
    }

    #[test]
    fn values_are_padded_and_isolated() {
        let mut f = Field::zeros(FieldKind::Triplet, 3, 5);
        f.set(2, 0, &[1.0, 2.0, 3.0, 99.0]);
        assert_eq!(f.get(2, 0), &[1.0, 2.0, 3.0]);
        assert_eq!(f.value(2, 0), [1.0, 2.0, 3.0, 0.0]);
        assert_eq!(f.get(1, 0), &[0.0; 3]);
        assert_eq!(f.owned(2).len(), 6);
    }

    #[test]
    fn link_components_are_contiguous_per_site() {
        let mut f = Field::zeros(FieldKind::Link, 2, 3);
        f.get_mut(1, 1)[0] = 7.0;
        assert_eq!(f.as_slice()[(1 * 2 + 1) * 4], 7.0);
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&FieldKind::Doublet).unwrap(), "\"doublet\"");
        assert_eq!(serde_json::to_string(&FieldKind::U1Link).unwrap(), "\"u1link\"");
        let back: FieldKind = serde_json::from_str("\"doublet2\"").unwrap();
        assert_eq!(back, FieldKind::Doublet2);
    }
}
