//! Lattice action: staples, hopping terms, potentials and local actions.
//!
//! Conventions, with `mod = ½|φ|²` for the doublet and `t = ½|Σ|²` for the
//! triplet:
//! - plaquette trace `ptrace(x,μ,ν) = Re Tr U_μ(x) U_ν(x+μ) U_μ(x+ν)† U_ν(x)†`;
//! - U(1) plaquette `cos(a_μ(x) + a_ν(x+μ) − a_μ(x+ν) − a_ν(x))`;
//! - doublet hop `−(φ(x)† U_μ(x) φ(x+μ) E_μ(x))_0` with the hypercharge
//!   factor `E = exp(−i a σ₃)` (identity without U(1)), the same for both
//!   doublets; triplet hop `−Σ(x)·R(U_μ(x)) Σ(x+μ)`;
//! - kinetic terms carry `2·mod` (resp. `2·t`) per direction.
//!
//! The `*_action` functions return the part of the total action that depends
//! on one site value (up to a constant), which is what the kernels compare.
//! [`site_action`] returns each site's non-overlapping share of the total,
//! used for measurements.

use crate::config::ActionParams;
use crate::data::field::{FieldKind, SiteValue};
use crate::physics::su2::{Su2, dot3, rotate, rotate_transposed};
use crate::update::kernel::{SiteContext, hypercharge};

/// One of the two Higgs doublets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Higgs {
    First,
    Second,
}

impl Higgs {
    pub const ALL: [Higgs; 2] = [Higgs::First, Higgs::Second];

    #[inline]
    pub fn kind(self) -> FieldKind {
        match self {
            Higgs::First => FieldKind::Doublet,
            Higgs::Second => FieldKind::Doublet2,
        }
    }

    #[inline]
    fn at(self, ctx: &SiteContext<'_>, i: usize) -> Su2 {
        match self {
            Higgs::First => ctx.doublet(i),
            Higgs::Second => ctx.doublet2(i),
        }
    }
}

/// `Re Tr` of the plaquette at `i` in the `(mu, nu)` plane.
pub fn plaquette_trace(ctx: &SiteContext<'_>, i: usize, mu: usize, nu: usize) -> f64 {
    let xmu = ctx.next(i, mu);
    let xnu = ctx.next(i, nu);
    ctx.link(i, mu)
        .mul(ctx.link(xmu, nu))
        .mul_dag(ctx.link(xnu, mu))
        .mul_dag(ctx.link(i, nu))
        .re_trace()
}

/// Upper staple `U_ν(x+μ) U_μ(x+ν)† U_ν(x)†` and lower staple
/// `U_ν(x+μ−ν)† U_μ(x−ν)† U_ν(x−ν)` of link `(i, mu)` in the `(μ, ν)` plane.
pub fn staple_pair(ctx: &SiteContext<'_>, i: usize, mu: usize, nu: usize) -> (Su2, Su2) {
    let xmu = ctx.next(i, mu);
    let xnu = ctx.next(i, nu);
    let up = ctx.link(xmu, nu).mul_dag(ctx.link(xnu, mu)).mul_dag(ctx.link(i, nu));
    let xmnu = ctx.prev(i, nu);
    let xmunu = ctx.prev(xmu, nu);
    let down = ctx
        .link(xmunu, nu)
        .dagger()
        .mul_dag(ctx.link(xmnu, mu))
        .mul(ctx.link(xmnu, nu));
    (up, down)
}

/// Sum of upper and lower Wilson staples of link `(i, mu)`: the `V` with
/// `Σ_ν≠μ [ptrace(x,μ,ν) + ptrace(x−ν,μ,ν)] = 2 (U V)_0`.
pub fn wilson_staple(ctx: &SiteContext<'_>, i: usize, mu: usize) -> Su2 {
    let mut v = Su2::ZERO;
    for nu in (0..ctx.dim()).filter(|&nu| nu != mu) {
        let (up, down) = staple_pair(ctx, i, mu, nu);
        v = v.add(up).add(down);
    }
    v
}

/// Linear part of the link action: `S = −½β V − ½ Σ_h φ_h(x+μ) E φ_h(x)†`,
/// so that the `U`-dependent action of the link is `2 (U S)_0` plus the
/// triplet term.
pub fn link_staple(ctx: &SiteContext<'_>, i: usize, mu: usize) -> Su2 {
    let mut s = wilson_staple(ctx, i, mu).scale(-0.5 * ctx.params.betasu2);
    let e = ctx.u1_phase(i, mu);
    for h in Higgs::ALL.into_iter().filter(|h| ctx.has(h.kind())) {
        let hop = h.at(ctx, ctx.next(i, mu)).mul(e).mul_dag(h.at(ctx, i));
        s = s.add(hop.scale(-0.5));
    }
    s
}

/// Triplet hopping along `(i, mu)` with the link replaced by `u`.
pub fn link_triplet_hop(ctx: &SiteContext<'_>, i: usize, mu: usize, u: Su2) -> f64 {
    if !ctx.has(FieldKind::Triplet) {
        return 0.0;
    }
    let a = ctx.triplet(i);
    let b = ctx.triplet(ctx.next(i, mu));
    -dot3(&a, &rotate(&u.adjoint(), &b))
}

/// Action of link `(i, mu)` set to `u`: the `2(D−1)` plaquettes containing
/// it plus the doublet and triplet hops across it.
pub fn link_action(ctx: &SiteContext<'_>, i: usize, mu: usize, u: Su2) -> f64 {
    let s = link_staple(ctx, i, mu);
    2.0 * ctx.params.betasu2 * (ctx.dim() - 1) as f64
        + 2.0 * u.mul(s).0[0]
        + link_triplet_hop(ctx, i, mu, u)
}

// ----- U(1) ------------------------------------------------------------------

/// U(1) plaquette angle at `i` in the `(mu, nu)` plane.
pub fn u1_plaquette_angle(ctx: &SiteContext<'_>, i: usize, mu: usize, nu: usize) -> f64 {
    ctx.u1link(i, mu) + ctx.u1link(ctx.next(i, mu), nu) - ctx.u1link(ctx.next(i, nu), mu) - ctx.u1link(i, nu)
}

/// Action of U(1) link `(i, mu)` set to angle `a`: the `2(D−1)` plaquettes
/// containing it plus the hops of both doublets across it.
pub fn u1link_action(ctx: &SiteContext<'_>, i: usize, mu: usize, a: f64) -> f64 {
    let xmu = ctx.next(i, mu);
    let mut plaq = 0.0;
    for nu in (0..ctx.dim()).filter(|&nu| nu != mu) {
        let up = a + ctx.u1link(xmu, nu) - ctx.u1link(ctx.next(i, nu), mu) - ctx.u1link(i, nu);
        let xmnu = ctx.prev(i, nu);
        let down = ctx.u1link(xmnu, mu) + ctx.u1link(ctx.prev(xmu, nu), nu) - a - ctx.u1link(xmnu, nu);
        plaq += (1.0 - up.cos()) + (1.0 - down.cos());
    }
    let u = ctx.link(i, mu);
    let e = hypercharge(a);
    let mut hop = 0.0;
    for h in Higgs::ALL.into_iter().filter(|h| ctx.has(h.kind())) {
        hop -= h.at(ctx, i).dag_mul(u).mul(h.at(ctx, xmu)).mul(e).0[0];
    }
    ctx.params.betau1 * plaq + hop
}

// ----- doublets --------------------------------------------------------------

/// `F = Σ_μ [U_μ(x) φ(x+μ) E_μ(x) + U_μ(x−μ)† φ(x−μ) E_μ(x−μ)†]` for doublet
/// `h`; the hopping part of its action at `i` is `−φ·F`.
pub fn doublet_force(ctx: &SiteContext<'_>, h: Higgs, i: usize) -> Su2 {
    let mut f = Su2::ZERO;
    for mu in 0..ctx.dim() {
        let fwd = ctx.link(i, mu).mul(h.at(ctx, ctx.next(i, mu))).mul(ctx.u1_phase(i, mu));
        let xm = ctx.prev(i, mu);
        let bwd = ctx.link(xm, mu).dag_mul(h.at(ctx, xm)).mul_dag(ctx.u1_phase(xm, mu));
        f = f.add(fwd).add(bwd);
    }
    f
}

/// Terms of the first doublet alone and its portals to triplet and singlet.
fn doublet_potential(p: &ActionParams, m: f64, t: f64, s: f64) -> f64 {
    p.msq_phi * m + p.lambda_phi * m * m + p.a2 * m * t + p.a1_s * s * m + p.a2_s * s * s * m
}

/// `(R, I)` with `R + iI = φ₁†φ₂`, normalised like `½|φ|²`.
pub fn phi12(h1: Su2, h2: Su2) -> (f64, f64) {
    let (a, b) = (h1.0, h2.0);
    let im = 0.5 * (a[3] * b[0] + a[2] * b[1] - a[1] * b[2] - a[0] * b[3]);
    (0.5 * h1.dot(h2), im)
}

/// Every potential term that contains the second doublet.
pub fn two_doublet_potential(p: &ActionParams, h1: Su2, h2: Su2) -> f64 {
    let f11 = 0.5 * h1.norm_sq();
    let f22 = 0.5 * h2.norm_sq();
    let (r, im) = phi12(h1, h2);
    p.msq_phi2 * f22 + p.m12sq.re * r - p.m12sq.im * im
        + p.lam2 * f22 * f22
        + p.lam3 * f11 * f22
        + p.lam4 * (r * r + im * im)
        + p.lam5.re * (r * r - im * im)
        - 2.0 * p.lam5.im * r * im
        + f11 * (p.lam6.re * r - p.lam6.im * im)
        + f22 * (p.lam7.re * r + p.lam7.im * im)
}

/// Action of doublet `h` at `i` set to `phi`.
pub fn doublet_action(ctx: &SiteContext<'_>, h: Higgs, i: usize, phi: Su2) -> f64 {
    doublet_action_with_force(ctx, h, i, phi, doublet_force(ctx, h, i))
}

pub(crate) fn doublet_action_with_force(ctx: &SiteContext<'_>, h: Higgs, i: usize, phi: Su2, f: Su2) -> f64 {
    let kinetic = ctx.dim() as f64 * phi.norm_sq() - phi.dot(f);
    let p = ctx.params;
    match h {
        Higgs::First => {
            let m = 0.5 * phi.norm_sq();
            kinetic
                + doublet_potential(p, m, tripletsq(ctx, i), ctx.singlet(i))
                + two_doublet_potential(p, phi, ctx.doublet2(i))
        }
        Higgs::Second => kinetic + two_doublet_potential(p, ctx.doublet(i), phi),
    }
}

#[inline]
pub fn doubletsq(ctx: &SiteContext<'_>, i: usize) -> f64 {
    0.5 * ctx.doublet(i).norm_sq()
}

// ----- triplet ---------------------------------------------------------------

/// `G = Σ_μ [R(U_μ(x)) Σ(x+μ) + R(U_μ(x−μ))ᵀ Σ(x−μ)]`.
pub fn triplet_force(ctx: &SiteContext<'_>, i: usize) -> [f64; 3] {
    let mut g = [0.0; 3];
    for mu in 0..ctx.dim() {
        let fwd = rotate(&ctx.link(i, mu).adjoint(), &ctx.triplet(ctx.next(i, mu)));
        let xm = ctx.prev(i, mu);
        let bwd = rotate_transposed(&ctx.link(xm, mu).adjoint(), &ctx.triplet(xm));
        for k in 0..3 {
            g[k] += fwd[k] + bwd[k];
        }
    }
    g
}

fn triplet_potential(p: &ActionParams, t: f64, m: f64) -> f64 {
    p.msq_triplet * t + p.b4 * t * t + p.a2 * m * t
}

/// Action of the triplet at `i` set to `a`.
pub fn triplet_action(ctx: &SiteContext<'_>, i: usize, a: [f64; 3]) -> f64 {
    triplet_action_with_force(ctx, i, a, triplet_force(ctx, i))
}

pub(crate) fn triplet_action_with_force(
    ctx: &SiteContext<'_>,
    i: usize,
    a: [f64; 3],
    g: [f64; 3],
) -> f64 {
    let sq = dot3(&a, &a);
    ctx.dim() as f64 * sq - dot3(&a, &g) + triplet_potential(ctx.params, 0.5 * sq, doubletsq(ctx, i))
}

#[inline]
pub fn tripletsq(ctx: &SiteContext<'_>, i: usize) -> f64 {
    let a = ctx.triplet(i);
    0.5 * dot3(&a, &a)
}

// ----- singlet ---------------------------------------------------------------

fn singlet_potential(p: &ActionParams, s: f64, m: f64) -> f64 {
    let s2 = s * s;
    p.b1_s * s + p.msq_s * s2 + p.b3_s * s2 * s + p.b4_s * s2 * s2 + p.a1_s * s * m + p.a2_s * s2 * m
}

/// Action of the singlet at `i` set to `s`.
pub fn singlet_action(ctx: &SiteContext<'_>, i: usize, s: f64) -> f64 {
    let mut nb = 0.0;
    for mu in 0..ctx.dim() {
        nb += ctx.singlet(ctx.next(i, mu)) + ctx.singlet(ctx.prev(i, mu));
    }
    ctx.dim() as f64 * s * s - s * nb + singlet_potential(ctx.params, s, doubletsq(ctx, i))
}

/// Action of component `comp` at `site` set to `v`, for any field kind.
pub fn local_action(ctx: &SiteContext<'_>, kind: FieldKind, site: usize, comp: usize, v: &SiteValue) -> f64 {
    match kind {
        FieldKind::Link => link_action(ctx, site, comp, Su2(*v)),
        FieldKind::Doublet => doublet_action(ctx, Higgs::First, site, Su2(*v)),
        FieldKind::Triplet => triplet_action(ctx, site, [v[0], v[1], v[2]]),
        FieldKind::Singlet => singlet_action(ctx, site, v[0]),
        FieldKind::U1Link => u1link_action(ctx, site, comp, v[0]),
        FieldKind::Doublet2 => doublet_action(ctx, Higgs::Second, site, Su2(*v)),
    }
}

// ----- per-site shares of the total action -----------------------------------

/// Split of one site's share of the action, used by measurements.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SiteTerms {
    /// `β Σ_{μ<ν} (1 − ½ ptrace)`
    pub wilson: f64,
    /// `Σ_{μ<ν} ½ ptrace`
    pub plaquette: f64,
    /// `β_U1 Σ_{μ<ν} (1 − cos θ)`
    pub u1_wilson: f64,
    pub doublet_hop: f64,
    pub doublet_kin: f64,
    pub doublet_pot: f64,
    pub doublet2_hop: f64,
    pub doublet2_kin: f64,
    /// Every potential term containing the second doublet.
    pub doublet2_pot: f64,
    pub triplet_hop: f64,
    pub triplet_kin: f64,
    pub triplet_pot: f64,
    pub singlet_kin: f64,
    pub singlet_pot: f64,
}

impl SiteTerms {
    pub fn total(&self) -> f64 {
        self.wilson
            + self.u1_wilson
            + self.doublet_kin
            + self.doublet_pot
            + self.doublet2_kin
            + self.doublet2_pot
            + self.triplet_kin
            + self.triplet_pot
            + self.singlet_kin
            + self.singlet_pot
    }
}

/// Terms of the total action attributed to site `i`: plaquettes with `i` as
/// lower corner, forward hops, and the site's potentials.
pub fn site_terms(ctx: &SiteContext<'_>, i: usize) -> SiteTerms {
    let p = ctx.params;
    let dim = ctx.dim();
    let mut out = SiteTerms::default();
    for mu in 0..dim {
        for nu in mu + 1..dim {
            let half = 0.5 * plaquette_trace(ctx, i, mu, nu);
            out.plaquette += half;
            out.wilson += p.betasu2 * (1.0 - half);
            if ctx.has(FieldKind::U1Link) {
                out.u1_wilson += p.betau1 * (1.0 - u1_plaquette_angle(ctx, i, mu, nu).cos());
            }
        }
    }
    let m = doubletsq(ctx, i);
    let t = tripletsq(ctx, i);
    let s = ctx.singlet(i);
    if ctx.has(FieldKind::Doublet) {
        out.doublet_hop = forward_hop(ctx, Higgs::First, i);
        out.doublet_kin = dim as f64 * 2.0 * m - out.doublet_hop;
        out.doublet_pot = p.msq_phi * m + p.lambda_phi * m * m;
    }
    if ctx.has(FieldKind::Doublet2) {
        let phi2 = ctx.doublet2(i);
        out.doublet2_hop = forward_hop(ctx, Higgs::Second, i);
        out.doublet2_kin = dim as f64 * phi2.norm_sq() - out.doublet2_hop;
        out.doublet2_pot = two_doublet_potential(p, ctx.doublet(i), phi2);
    }
    if ctx.has(FieldKind::Triplet) {
        let a = ctx.triplet(i);
        for mu in 0..dim {
            out.triplet_hop += dot3(&a, &rotate(&ctx.link(i, mu).adjoint(), &ctx.triplet(ctx.next(i, mu))));
        }
        out.triplet_kin = dim as f64 * 2.0 * t - out.triplet_hop;
        out.triplet_pot = triplet_potential(p, t, m);
    }
    if ctx.has(FieldKind::Singlet) {
        let mut hop = 0.0;
        for mu in 0..dim {
            hop += s * ctx.singlet(ctx.next(i, mu));
        }
        out.singlet_kin = dim as f64 * s * s - hop;
        out.singlet_pot = singlet_potential(p, s, m);
    }
    out
}

/// `Σ_μ φ(x)·(U_μ(x) φ(x+μ) E_μ(x))` for doublet `h`.
fn forward_hop(ctx: &SiteContext<'_>, h: Higgs, i: usize) -> f64 {
    let phi = h.at(ctx, i);
    (0..ctx.dim())
        .map(|mu| phi.dot(ctx.link(i, mu).mul(h.at(ctx, ctx.next(i, mu))).mul(ctx.u1_phase(i, mu))))
        .sum()
}

/// Local action density: site `i`'s share of the total action, so that the
/// sum over all sites is the total.
pub fn site_action(ctx: &SiteContext<'_>, i: usize) -> f64 {
    site_terms(ctx, i).total()
}
