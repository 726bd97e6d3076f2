//! Site indices: one flat index space split into owned sites and halo slots.
//!
//! `[0, sites)` are sites this rank owns and updates; `[sites, sites_total)`
//! are halo slots holding copies of remote boundary sites. The boundary is
//! validated once when the layout is built and trusted afterwards.

/// Sentinel stored in neighbor tables when a halo row has no neighbor in the shell.
pub const NO_SITE: usize = usize::MAX;

/// Tagged view of a flat site index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SiteKind {
    /// Physically owned site, index in `[0, sites)`.
    Owned(usize),
    /// Halo slot, holding `slot` = offset from `sites`.
    Halo(usize),
}

impl SiteKind {
    /// Classify `index` against the owned/halo boundary `sites`.
    #[inline]
    pub fn classify(index: usize, sites: usize) -> SiteKind {
        if index < sites {
            SiteKind::Owned(index)
        } else {
            SiteKind::Halo(index - sites)
        }
    }

    #[inline]
    pub fn is_halo(self) -> bool {
        matches!(self, SiteKind::Halo(_))
    }
}

/// Where a halo slot's data comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HaloSource {
    /// Rank owning the remote site.
    pub owner: usize,
    /// Global linear index of the remote site.
    pub global: u64,
}
