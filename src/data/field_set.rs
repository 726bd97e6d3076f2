//! The set of fields of one run: links plus the enabled scalar kinds.

use crate::config::{FieldsConfig, InitConfig};
use crate::data::field::{Field, FieldKind};
use crate::lattice_error::LatticeError;
use crate::physics::su2::{Su2, haar_random};
use crate::topology::layout::Layout;
use crate::update::rng::SiteRng;

/// Stream tags of the hot-start draws, kept apart from sweep passes.
const HOT_START_PASS: u64 = u64::MAX;
const HOT_START_U1_PASS: u64 = u64::MAX - 1;

/// Link field and the scalar fields enabled at configuration time.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSet {
    link: Field,
    doublet: Option<Field>,
    triplet: Option<Field>,
    singlet: Option<Field>,
    u1link: Option<Field>,
    doublet2: Option<Field>,
}

impl FieldSet {
    /// Zero-filled fields sized for `layout`.
    pub fn new(layout: &Layout, enabled: &FieldsConfig) -> Self {
        let make = |kind| Field::zeros(kind, layout.dim(), layout.sites_total());
        let opt = |on: bool, kind| on.then(|| make(kind));
        Self {
            link: make(FieldKind::Link),
            doublet: opt(enabled.doublet, FieldKind::Doublet),
            triplet: opt(enabled.triplet, FieldKind::Triplet),
            singlet: opt(enabled.singlet, FieldKind::Singlet),
            u1link: opt(enabled.u1link, FieldKind::U1Link),
            doublet2: opt(enabled.doublet2, FieldKind::Doublet2),
        }
    }

    /// Set every owned and halo row to its initial value.
    ///
    /// Hot links are drawn from a stream keyed by global site index and
    /// direction, so all rank counts start from the same configuration.
    pub fn initialize(&mut self, layout: &Layout, init: &InitConfig, seed: u64) {
        let dim = layout.dim();
        for i in 0..layout.sites_total() {
            let global = layout.global_index(i);
            for mu in 0..dim {
                let stream = global * dim as u64 + mu as u64;
                let u = if init.hot_start {
                    let mut rng = SiteRng::for_site(seed, HOT_START_PASS, stream);
                    haar_random(&mut rng)
                } else {
                    Su2::IDENTITY
                };
                self.link.set(i, mu, &u.to_value());
                if let Some(f) = &mut self.u1link {
                    let a = if init.hot_start {
                        let mut rng = SiteRng::for_site(seed, HOT_START_U1_PASS, stream);
                        std::f64::consts::PI * rng.symmetric()
                    } else {
                        0.0
                    };
                    f.set(i, mu, &[a, 0.0, 0.0, 0.0]);
                }
            }
            if let Some(f) = &mut self.doublet {
                f.set(i, 0, &[init.phi0, 0.0, 0.0, 0.0]);
            }
            if let Some(f) = &mut self.doublet2 {
                f.set(i, 0, &[init.phi2_0, 0.0, 0.0, 0.0]);
            }
            if let Some(f) = &mut self.triplet {
                f.set(i, 0, &[init.sigma0, 0.0, 0.0, 0.0]);
            }
            if let Some(f) = &mut self.singlet {
                f.set(i, 0, &[init.singlet0, 0.0, 0.0, 0.0]);
            }
        }
        log::info!(
            "initialised {} fields ({} start)",
            self.enabled_kinds().len(),
            if init.hot_start { "hot" } else { "cold" }
        );
    }

    #[inline]
    pub fn link(&self) -> &Field {
        &self.link
    }

    pub fn get(&self, kind: FieldKind) -> Option<&Field> {
        match kind {
            FieldKind::Link => Some(&self.link),
            FieldKind::Doublet => self.doublet.as_ref(),
            FieldKind::Triplet => self.triplet.as_ref(),
            FieldKind::Singlet => self.singlet.as_ref(),
            FieldKind::U1Link => self.u1link.as_ref(),
            FieldKind::Doublet2 => self.doublet2.as_ref(),
        }
    }

    pub fn get_mut(&mut self, kind: FieldKind) -> Option<&mut Field> {
        match kind {
            FieldKind::Link => Some(&mut self.link),
            FieldKind::Doublet => self.doublet.as_mut(),
            FieldKind::Triplet => self.triplet.as_mut(),
            FieldKind::Singlet => self.singlet.as_mut(),
            FieldKind::U1Link => self.u1link.as_mut(),
            FieldKind::Doublet2 => self.doublet2.as_mut(),
        }
    }

    /// Like [`FieldSet::get`] but a disabled kind is an error.
    pub fn require(&self, kind: FieldKind) -> Result<&Field, LatticeError> {
        self.get(kind).ok_or(LatticeError::FieldNotEnabled(kind))
    }

    pub fn require_mut(&mut self, kind: FieldKind) -> Result<&mut Field, LatticeError> {
        self.get_mut(kind).ok_or(LatticeError::FieldNotEnabled(kind))
    }

    #[inline]
    pub fn is_enabled(&self, kind: FieldKind) -> bool {
        self.get(kind).is_some()
    }

    /// Present kinds in [`FieldKind::ALL`] order.
    pub fn enabled_kinds(&self) -> Vec<FieldKind> {
        FieldKind::ALL
            .into_iter()
            .filter(|&k| self.is_enabled(k))
            .collect()
    }
}
