//! Overrelaxation: reflections that keep the linear part of the local action.
//!
//! - links: `U' = W† U† W†` with `W = Ŝ'`, which leaves `(U Ŝ')_0` unchanged;
//! - doublets: `φ' = 2 (φ·F) F / |F|² − φ`;
//! - triplet: the same reflection about `G`;
//! - U(1) links: the local action is `C − R cos(a − θ)`, with `θ` read off
//!   from the action at four angles, and `a' = 2θ − a`.
//!
//! Terms that are not linear in the updated value (triplet hopping for
//! links, the radial potentials for scalars) change under the reflection, so
//! every proposal is followed by a Metropolis test on the full `ΔS`.

use crate::data::field::{FieldKind, SiteValue};
use crate::lattice_error::LatticeError;
use crate::physics::action::{
    Higgs, doublet_action_with_force, doublet_force, link_staple, link_triplet_hop,
    triplet_action_with_force, triplet_force, u1link_action,
};
use crate::physics::su2::dot3;
use crate::update::kernel::{Algorithm, LocalUpdate, SiteContext, coupled_kinds, wrap_angle};
use crate::update::rng::SiteRng;
use std::f64::consts::{FRAC_PI_2, PI};

pub struct Overrelax {
    kind: FieldKind,
}

impl Overrelax {
    /// Caller guarantees `kind` is not [`FieldKind::Singlet`].
    pub fn new(kind: FieldKind) -> Self {
        debug_assert!(Algorithm::Overrelax.supports(kind));
        Self { kind }
    }
}

fn reflect_link(ctx: &SiteContext<'_>, site: usize, mu: usize, rng: &mut SiteRng) -> Option<SiteValue> {
    let old = ctx.link(site, mu);
    let w = link_staple(ctx, site, mu).scale(-1.0).normalized()?;
    let new = w.dagger().mul(old.dagger()).mul(w.dagger()).normalized()?;
    let delta = link_triplet_hop(ctx, site, mu, new) - link_triplet_hop(ctx, site, mu, old);
    rng.accept(delta).then(|| new.to_value())
}

fn reflect_doublet(ctx: &SiteContext<'_>, h: Higgs, site: usize, rng: &mut SiteRng) -> Option<SiteValue> {
    let old = match h {
        Higgs::First => ctx.doublet(site),
        Higgs::Second => ctx.doublet2(site),
    };
    let f = doublet_force(ctx, h, site);
    let fsq = f.norm_sq();
    if fsq == 0.0 {
        return None;
    }
    let new = f.scale(2.0 * old.dot(f) / fsq).sub(old);
    let delta =
        doublet_action_with_force(ctx, h, site, new, f) - doublet_action_with_force(ctx, h, site, old, f);
    rng.accept(delta).then(|| new.to_value())
}

fn reflect_u1(ctx: &SiteContext<'_>, site: usize, mu: usize, rng: &mut SiteRng) -> Option<SiteValue> {
    let s = |a: f64| u1link_action(ctx, site, mu, a);
    // S(π) − S(0) = 2R cos θ, S(−π/2) − S(π/2) = 2R sin θ
    let c = s(PI) - s(0.0);
    let d = s(-FRAC_PI_2) - s(FRAC_PI_2);
    if c == 0.0 && d == 0.0 {
        return None;
    }
    let theta = d.atan2(c);
    let old = ctx.u1link(site, mu);
    let new = wrap_angle(2.0 * theta - old);
    rng.accept(s(new) - s(old)).then_some([new, 0.0, 0.0, 0.0])
}

fn reflect_triplet(ctx: &SiteContext<'_>, site: usize, rng: &mut SiteRng) -> Option<SiteValue> {
    let old = ctx.triplet(site);
    let g = triplet_force(ctx, site);
    let gsq = dot3(&g, &g);
    if gsq == 0.0 {
        return None;
    }
    let c = 2.0 * dot3(&old, &g) / gsq;
    let new = [c * g[0] - old[0], c * g[1] - old[1], c * g[2] - old[2]];
    let delta = triplet_action_with_force(ctx, site, new, g) - triplet_action_with_force(ctx, site, old, g);
    rng.accept(delta).then_some([new[0], new[1], new[2], 0.0])
}

impl LocalUpdate for Overrelax {
    fn kind(&self) -> FieldKind {
        self.kind
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::Overrelax
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
        ctx.fields.require(self.kind)?;
        match self.kind {
            FieldKind::Link => Ok(reflect_link(ctx, site, comp, rng)),
            FieldKind::Doublet => Ok(reflect_doublet(ctx, Higgs::First, site, rng)),
            FieldKind::Doublet2 => Ok(reflect_doublet(ctx, Higgs::Second, site, rng)),
            FieldKind::Triplet => Ok(reflect_triplet(ctx, site, rng)),
            FieldKind::U1Link => Ok(reflect_u1(ctx, site, comp, rng)),
            FieldKind::Singlet => Err(LatticeError::UnsupportedAlgorithm {
                kind: FieldKind::Singlet,
                algorithm: Algorithm::Overrelax,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActionParams, FieldsConfig, InitConfig};
    use crate::data::field_set::FieldSet;
    use crate::physics::action::{doublet_action, link_action};
    use crate::physics::su2::Su2;
    use crate::topology::geometry::GlobalLattice;
    use crate::topology::layout::Layout;
    use crate::topology::slicing::Slicing;

    fn hot(fields: FieldsConfig) -> (Layout, FieldSet) {
        let lat = GlobalLattice::new(vec![4, 4, 4]).unwrap();
        let l = Layout::new(lat.clone(), Slicing::automatic(&lat, 1).unwrap(), 0).unwrap();
        let mut fs = FieldSet::new(&l, &fields);
        let init = InitConfig {
            hot_start: true,
            phi0: 0.8,
            ..Default::default()
        };
        fs.initialize(&l, &init, 4);
        (l, fs)
    }

    #[test]
    fn pure_gauge_reflection_is_microcanonical() {
        let (l, fs) = hot(FieldsConfig::default());
        let p = ActionParams {
            betasu2: 2.5,
            ..Default::default()
        };
        let ctx = SiteContext::new(&l, &fs, &p);
        let k = Overrelax::new(FieldKind::Link);
        for i in 0..10 {
            let mut rng = SiteRng::for_site(0, 0, i as u64);
            let v = k.propose(&ctx, i, 2, &mut rng).unwrap().expect("always accepted");
            let before = link_action(&ctx, i, 2, ctx.link(i, 2));
            let after = link_action(&ctx, i, 2, Su2(v));
            assert!((before - after).abs() < 1e-10);
            assert!((Su2(v).norm_sq() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn free_doublet_reflection_keeps_action() {
        // no potential: the reflection keeps |φ|² only if φ ∥ F, but the hopping
        // part is always preserved
        let (l, fs) = hot(FieldsConfig {
            doublet: true,
            ..Default::default()
        });
        let p = ActionParams::default();
        let ctx = SiteContext::new(&l, &fs, &p);
        let i = 3;
        let f = doublet_force(&ctx, Higgs::First, i);
        let old = ctx.doublet(i);
        let mut rng = SiteRng::for_site(0, 0, 0);
        if let Some(v) = k_doublet().propose(&ctx, i, 0, &mut rng).unwrap() {
            assert!((Su2(v).dot(f) - old.dot(f)).abs() < 1e-10);
            assert!(doublet_action(&ctx, Higgs::First, i, Su2(v)).is_finite());
        }
    }

    fn k_doublet() -> Overrelax {
        Overrelax::new(FieldKind::Doublet)
    }

    fn gauged_doublets() -> (Layout, FieldSet) {
        let (l, mut fs) = hot(FieldsConfig {
            doublet: true,
            u1link: true,
            doublet2: true,
            ..Default::default()
        });
        for i in 0..l.sites() {
            let mut rng = SiteRng::for_site(21, 0, i as u64);
            let v = [rng.symmetric(), rng.symmetric(), rng.symmetric(), rng.symmetric()];
            fs.get_mut(FieldKind::Doublet2).unwrap().set(i, 0, &v);
        }
        (l, fs)
    }

    #[test]
    fn u1_reflection_is_microcanonical() {
        let (l, fs) = gauged_doublets();
        let p = ActionParams {
            betau1: 1.3,
            ..Default::default()
        };
        let ctx = SiteContext::new(&l, &fs, &p);
        let k = Overrelax::new(FieldKind::U1Link);
        for i in 0..10 {
            let mu = i % 3;
            let mut rng = SiteRng::for_site(0, 0, i as u64);
            let v = k.propose(&ctx, i, mu, &mut rng).unwrap().expect("ΔS is rounding only");
            let before = u1link_action(&ctx, i, mu, ctx.u1link(i, mu));
            let after = u1link_action(&ctx, i, mu, v[0]);
            assert!((before - after).abs() < 1e-10, "{before} vs {after}");
            assert!(v[0] > -PI && v[0] <= PI);
        }
    }

    #[test]
    fn second_doublet_reflection_keeps_hopping_part() {
        let (l, fs) = gauged_doublets();
        let p = ActionParams::default();
        let ctx = SiteContext::new(&l, &fs, &p);
        let k = Overrelax::new(FieldKind::Doublet2);
        for i in 0..10 {
            let f = doublet_force(&ctx, Higgs::Second, i);
            let old = ctx.doublet2(i);
            let mut rng = SiteRng::for_site(0, 0, i as u64);
            if let Some(v) = k.propose(&ctx, i, 0, &mut rng).unwrap() {
                assert!((Su2(v).dot(f) - old.dot(f)).abs() < 1e-10);
                // no potential: |φ₂|² is the only term that moves
                let d = doublet_action(&ctx, Higgs::Second, i, Su2(v)) - doublet_action(&ctx, Higgs::Second, i, old);
                assert!((d - 3.0 * (Su2(v).norm_sq() - old.norm_sq())).abs() < 1e-10);
            }
        }
    }
}
