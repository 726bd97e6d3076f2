//! Metropolis kernels for every field kind.
//!
//! Links are proposed as `U' = R U` with `R ∝ (1, ε v)`, `v` uniform in the
//! cube; scalars as independent uniform shifts of width `ε` per component;
//! U(1) angles as a shift of width `ε` wrapped back into `(−π, π]`.
//! All proposals are symmetric, so acceptance is `min(1, exp(−ΔS))`.

use crate::data::field::{FieldKind, SiteValue};
use crate::lattice_error::LatticeError;
use crate::physics::action::local_action;
use crate::physics::su2::Su2;
use crate::update::kernel::{Algorithm, LocalUpdate, SiteContext, coupled_kinds, wrap_angle};
use crate::update::rng::SiteRng;

pub struct Metropolis {
    kind: FieldKind,
    width: f64,
}

impl Metropolis {
    pub fn new(kind: FieldKind, width: f64) -> Self {
        Self { kind, width }
    }

    fn candidate(&self, old: &SiteValue, dofs: usize, rng: &mut SiteRng) -> Option<SiteValue> {
        if self.kind == FieldKind::Link {
            let step = Su2([
                1.0,
                self.width * rng.symmetric(),
                self.width * rng.symmetric(),
                self.width * rng.symmetric(),
            ]);
            return Some(step.normalized()?.mul(Su2(*old)).normalized()?.to_value());
        }
        let mut new = *old;
        for v in new.iter_mut().take(dofs) {
            *v += self.width * rng.symmetric();
        }
        if self.kind == FieldKind::U1Link {
            new[0] = wrap_angle(new[0]);
        }
        Some(new)
    }
}

impl LocalUpdate for Metropolis {
    fn kind(&self) -> FieldKind {
        self.kind
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::Metropolis
    }

    fn reads(&self) -> &'static [FieldKind] {
        coupled_kinds(self.kind)
    }

    fn propose(
        &self,
        ctx: &SiteContext<'_>,
        site: usize,
        comp: usize,
        rng: &mut SiteRng,
    ) -> Result<Option<SiteValue>, LatticeError> {
        let field = ctx.fields.require(self.kind)?;
        let old = field.value(site, comp);
        let Some(new) = self.candidate(&old, field.dofs(), rng) else {
            return Ok(None);
        };
        let delta = local_action(ctx, self.kind, site, comp, &new)
            - local_action(ctx, self.kind, site, comp, &old);
        Ok(rng.accept(delta).then_some(new))
    }
}
