//! Local-update kernel interface.
//!
//! A kernel is a pure proposal: given read-only access to the layout, the
//! fields and the couplings, it returns the new value of one component at one
//! site, or `None` to leave it unchanged. The scheduler evaluates all sites of
//! one parity this way (possibly in parallel) and only then commits the
//! accepted values, so no kernel can observe a write made in the same pass.

use crate::config::ActionParams;
use crate::data::field::{FieldKind, SiteValue};
use crate::data::field_set::FieldSet;
use crate::lattice_error::LatticeError;
use crate::physics::su2::Su2;
use crate::topology::layout::Layout;
use crate::update::rng::SiteRng;
use serde::{Deserialize, Serialize};

/// Update algorithm of one update step.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Metropolis,
    Heatbath,
    Overrelax,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::Metropolis, Algorithm::Heatbath, Algorithm::Overrelax];

    /// Whether a kernel exists for this (algorithm, field) pair.
    pub fn supports(self, kind: FieldKind) -> bool {
        match self {
            Algorithm::Metropolis => true,
            Algorithm::Heatbath => kind == FieldKind::Link,
            Algorithm::Overrelax => kind != FieldKind::Singlet,
        }
    }
}

/// Read-only view handed to kernels and action evaluators.
#[derive(Copy, Clone)]
pub struct SiteContext<'a> {
    pub layout: &'a Layout,
    pub fields: &'a FieldSet,
    pub params: &'a ActionParams,
}

impl<'a> SiteContext<'a> {
    pub fn new(layout: &'a Layout, fields: &'a FieldSet, params: &'a ActionParams) -> Self {
        Self {
            layout,
            fields,
            params,
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.layout.dim()
    }

    #[inline]
    pub fn next(&self, i: usize, dir: usize) -> usize {
        self.layout.next(i, dir)
    }

    #[inline]
    pub fn prev(&self, i: usize, dir: usize) -> usize {
        self.layout.prev(i, dir)
    }

    #[inline]
    pub fn has(&self, kind: FieldKind) -> bool {
        self.fields.is_enabled(kind)
    }

    #[inline]
    pub fn link(&self, i: usize, mu: usize) -> Su2 {
        Su2::from_slice(self.fields.link().get(i, mu))
    }

    /// Doublet at `i`; zero when the doublet is disabled.
    #[inline]
    pub fn doublet(&self, i: usize) -> Su2 {
        self.fields
            .get(FieldKind::Doublet)
            .map_or(Su2::ZERO, |f| Su2::from_slice(f.get(i, 0)))
    }

    /// Second doublet at `i`; zero when it is disabled.
    #[inline]
    pub fn doublet2(&self, i: usize) -> Su2 {
        self.fields
            .get(FieldKind::Doublet2)
            .map_or(Su2::ZERO, |f| Su2::from_slice(f.get(i, 0)))
    }

    /// U(1) angle of link `(i, mu)`; zero when U(1) is disabled.
    #[inline]
    pub fn u1link(&self, i: usize, mu: usize) -> f64 {
        self.fields.get(FieldKind::U1Link).map_or(0.0, |f| f.get(i, mu)[0])
    }

    /// Hypercharge factor `exp(−i a σ₃)` of link `(i, mu)`.
    #[inline]
    pub fn u1_phase(&self, i: usize, mu: usize) -> Su2 {
        hypercharge(self.u1link(i, mu))
    }

    /// Triplet at `i`; zero when the triplet is disabled.
    #[inline]
    pub fn triplet(&self, i: usize) -> [f64; 3] {
        self.fields.get(FieldKind::Triplet).map_or([0.0; 3], |f| {
            let a = f.get(i, 0);
            [a[0], a[1], a[2]]
        })
    }

    /// Singlet at `i`; zero when the singlet is disabled.
    #[inline]
    pub fn singlet(&self, i: usize) -> f64 {
        self.fields
            .get(FieldKind::Singlet)
            .map_or(0.0, |f| f.get(i, 0)[0])
    }
}

/// `exp(−i a σ₃)` as a quaternion.
#[inline]
pub fn hypercharge(a: f64) -> Su2 {
    Su2([a.cos(), 0.0, 0.0, -a.sin()])
}

/// Map an angle into `(−π, π]`.
pub fn wrap_angle(a: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let w = a - TAU * (a / TAU).round();
    if w <= -PI { w + TAU } else { w }
}

/// One local-update algorithm for one field kind.
pub trait LocalUpdate: Send + Sync {
    fn kind(&self) -> FieldKind;

    fn algorithm(&self) -> Algorithm;

    /// Field kinds whose neighbor values the kernel reads.
    fn reads(&self) -> &'static [FieldKind];

    /// New value of component `comp` at owned site `site`, or `None` to keep it.
    fn propose(
        &self,
        ctx: &SiteContext<'_>,
        site: usize,
        comp: usize,
        rng: &mut SiteRng,
    ) -> Result<Option<SiteValue>, LatticeError>;
}

/// Field kinds each kind's local action touches.
pub fn coupled_kinds(kind: FieldKind) -> &'static [FieldKind] {
    match kind {
        FieldKind::Link => &[
            FieldKind::Link,
            FieldKind::Doublet,
            FieldKind::Triplet,
            FieldKind::U1Link,
            FieldKind::Doublet2,
        ],
        FieldKind::Doublet => &[
            FieldKind::Link,
            FieldKind::Doublet,
            FieldKind::Triplet,
            FieldKind::Singlet,
            FieldKind::U1Link,
            FieldKind::Doublet2,
        ],
        FieldKind::Triplet => &[FieldKind::Link, FieldKind::Doublet, FieldKind::Triplet],
        FieldKind::Singlet => &[FieldKind::Doublet, FieldKind::Singlet],
        FieldKind::U1Link => &[
            FieldKind::Link,
            FieldKind::Doublet,
            FieldKind::U1Link,
            FieldKind::Doublet2,
        ],
        FieldKind::Doublet2 => &[
            FieldKind::Link,
            FieldKind::Doublet,
            FieldKind::U1Link,
            FieldKind::Doublet2,
        ],
    }
}

/// Build the kernel for one update step.
///
/// # Errors
/// [`LatticeError::UnsupportedAlgorithm`] for pairs without a kernel.
pub fn make_kernel(
    kind: FieldKind,
    algorithm: Algorithm,
    width: f64,
) -> Result<Box<dyn LocalUpdate>, LatticeError> {
    use crate::update::{heatbath, metropolis, overrelax};
    if !algorithm.supports(kind) {
        return Err(LatticeError::UnsupportedAlgorithm { kind, algorithm });
    }
    Ok(match algorithm {
        Algorithm::Metropolis => Box::new(metropolis::Metropolis::new(kind, width)),
        Algorithm::Heatbath => Box::new(heatbath::LinkHeatbath),
        Algorithm::Overrelax => Box::new(overrelax::Overrelax::new(kind)),
    })
}
