//! SU(2) link heatbath.
//!
//! The part of the link action linear in `U` is `−2k (U Ŝ')_0` with
//! `S' = −S` the negated staple and `k = |S'|`. `W = U Ŝ'` is drawn from
//! `sqrt(1 − w0²) exp(α w0)`, `α = 2k`, and the new link is `W Ŝ'†`:
//! - Haar measure when `α` is negligible,
//! - Creutz's method for small `α`,
//! - Kennedy–Pendleton otherwise.
//!
//! The triplet hopping term is quadratic in `U`; it is handled with a
//! Metropolis accept/reject on top of the exact draw.

use crate::data::field::{FieldKind, SiteValue};
use crate::lattice_error::LatticeError;
use crate::physics::action::{link_staple, link_triplet_hop};
use crate::physics::su2::{Su2, haar_random};
use crate::update::kernel::{Algorithm, LocalUpdate, SiteContext, coupled_kinds};
use crate::update::rng::SiteRng;

/// Below this `α` the weight is flat and the Haar measure is used.
const HAAR_ALPHA: f64 = 1e-10;
/// Creutz's method up to this `α`, Kennedy–Pendleton above.
const CREUTZ_ALPHA: f64 = 2.0;
/// Rejection-loop cap; reaching it means the staple is corrupt.
pub const MAX_TRIES: usize = 10_000;
/// Rejection count at which a draw is reported as suspicious.
const WARN_TRIES: usize = 100;

fn note_slow_draw(method: &str, alpha: f64, tries: usize) {
    if tries == WARN_TRIES {
        log::warn!("{method} heatbath: {tries} rejections at alpha {alpha}");
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct LinkHeatbath;

fn creutz(alpha: f64, rng: &mut SiteRng) -> Option<f64> {
    let low = (-2.0 * alpha).exp();
    for tries in 0..MAX_TRIES {
        note_slow_draw("creutz", alpha, tries);
        let y = low + (1.0 - low) * rng.uniform_open0();
        let a0 = 1.0 + y.ln() / alpha;
        if rng.uniform() < (1.0 - a0 * a0).max(0.0).sqrt() {
            return Some(a0);
        }
    }
    None
}

fn kennedy_pendleton(alpha: f64, rng: &mut SiteRng) -> Option<f64> {
    for tries in 0..MAX_TRIES {
        note_slow_draw("kennedy-pendleton", alpha, tries);
        let r1 = rng.uniform_open0().ln();
        let c = (std::f64::consts::TAU * rng.uniform()).cos();
        let r3 = rng.uniform_open0().ln();
        let lambda2 = -(r1 + c * c * r3) / (2.0 * alpha);
        let r4 = rng.uniform();
        if r4 * r4 <= 1.0 - lambda2 {
            return Some(1.0 - 2.0 * lambda2);
        }
    }
    None
}

/// Draw `W` with density `∝ sqrt(1 − w0²) exp(α w0)` on S³.
pub fn sample_weighted(alpha: f64, rng: &mut SiteRng) -> Option<Su2> {
    if alpha < HAAR_ALPHA {
        return Some(haar_random(rng));
    }
    let a0 = if alpha < CREUTZ_ALPHA {
        creutz(alpha, rng)?
    } else {
        kennedy_pendleton(alpha, rng)?
    };
    let r = (1.0 - a0 * a0).max(0.0).sqrt();
    let cos_t = rng.symmetric();
    let sin_t = (1.0 - cos_t * cos_t).max(0.0).sqrt();
    let phi = std::f64::consts::TAU * rng.uniform();
    Some(Su2([a0, r * sin_t * phi.cos(), r * sin_t * phi.sin(), r * cos_t]))
}

impl LocalUpdate for LinkHeatbath {
    fn kind(&self) -> FieldKind {
        FieldKind::Link
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::Heatbath
    }

    fn reads(&self) -> &'static [FieldKind] {
        coupled_kinds(FieldKind::Link)
    }

    fn propose(
        &self,
        ctx: &SiteContext<'_>,
        site: usize,
        mu: usize,
        rng: &mut SiteRng,
    ) -> Result<Option<SiteValue>, LatticeError> {
        let old = ctx.link(site, mu);
        let sp = link_staple(ctx, site, mu).scale(-1.0);
        let k = sp.norm();
        let alpha = 2.0 * k;
        let fail = |reason: String| LatticeError::KernelFailure {
            kind: FieldKind::Link,
            site,
            reason,
        };
        if !alpha.is_finite() {
            return Err(fail(format!("non-finite staple norm {k}")));
        }
        let w = sample_weighted(alpha, rng)
            .ok_or_else(|| fail(format!("no sample after {MAX_TRIES} tries at alpha {alpha}")))?;
        let new = match sp.normalized() {
            Some(dir) if alpha >= HAAR_ALPHA => w.mul_dag(dir),
            _ => w,
        };
        let delta = link_triplet_hop(ctx, site, mu, new) - link_triplet_hop(ctx, site, mu, old);
        Ok(rng.accept(delta).then(|| new.to_value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActionParams, FieldsConfig, InitConfig};
    use crate::data::field_set::FieldSet;
    use crate::topology::geometry::GlobalLattice;
    use crate::topology::layout::Layout;
    use crate::topology::slicing::Slicing;

    fn mean_a0(alpha: f64, n: usize) -> f64 {
        (0..n)
            .map(|i| {
                let mut rng = SiteRng::for_site(17, 0, i as u64);
                let w = sample_weighted(alpha, &mut rng).unwrap();
                assert!((w.norm_sq() - 1.0).abs() < 1e-12);
                w.0[0]
            })
            .sum::<f64>()
            / n as f64
    }

    #[test]
    fn sampled_elements_are_unitary_and_biased_toward_identity() {
        // <w0> = I_2(α)/I_1(α); 0 for the Haar measure, close to 1 for large α
        assert!(mean_a0(0.0, 4000).abs() < 0.05);
        let small = mean_a0(1.0, 4000);
        let large = mean_a0(20.0, 4000);
        assert!(small > 0.15 && small < 0.35, "alpha 1: {small}");
        assert!(large > 0.9, "alpha 20: {large}");
    }

    #[test]
    fn heatbath_output_is_unitary_and_follows_staple() {
        let lat = GlobalLattice::new(vec![4, 4, 4]).unwrap();
        let l = Layout::new(lat.clone(), Slicing::automatic(&lat, 1).unwrap(), 0).unwrap();
        let mut fs = FieldSet::new(&l, &FieldsConfig::default());
        fs.initialize(&l, &InitConfig::default(), 0);
        let p = ActionParams {
            betasu2: 50.0,
            ..Default::default()
        };
        let ctx = SiteContext::new(&l, &fs, &p);
        for i in 0..8 {
            let mut rng = SiteRng::for_site(2, 0, i as u64);
            let v = LinkHeatbath.propose(&ctx, i, 0, &mut rng).unwrap().unwrap();
            let u = Su2(v);
            assert!((u.norm_sq() - 1.0).abs() < 1e-12);
            // staple of an identity background points along the identity
            assert!(u.0[0] > 0.9);
        }
    }

    #[test]
    fn corrupt_neighbor_link_is_a_kernel_failure() {
        let lat = GlobalLattice::new(vec![4, 4]).unwrap();
        let l = Layout::new(lat.clone(), Slicing::automatic(&lat, 1).unwrap(), 0).unwrap();
        let mut fs = FieldSet::new(&l, &FieldsConfig::default());
        fs.initialize(&l, &InitConfig::default(), 0);
        let site = 5;
        // U_1(x+0) enters the upper staple of (site, 0)
        let xmu = l.next(site, 0);
        fs.get_mut(FieldKind::Link).unwrap().set(xmu, 1, &[f64::NAN, 0.0, 0.0, 0.0]);
        let p = ActionParams::default();
        let ctx = SiteContext::new(&l, &fs, &p);
        let mut rng = SiteRng::for_site(0, 0, 0);
        let err = LinkHeatbath.propose(&ctx, site, 0, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            LatticeError::KernelFailure { kind: FieldKind::Link, site: 5, .. }
        ));
        assert!(!err.is_configuration());
    }
}
