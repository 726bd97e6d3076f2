//! Abelian projection along the triplet: magnetic field and monopole charge.
//!
//! With `n̂ = Σ/|Σ|` the projector `Π = ½(1 + n̂·σ)` selects the unbroken
//! U(1). Projected links are `P_μ(x) = Π(x) U_μ(x) Π(x+μ)` and the projected
//! field strength is
//! `α_{μν}(x) = √β arg Tr[P_μ(x) P_ν(x+μ) P_μ(x+ν)† P_ν(x)†]`.
//! The magnetic field is `B_k = ½ ε_{kμν} α_{μν}` and the charge in the cube
//! spanned from `x` is `Σ_k [B_k(x+k) − B_k(x)]`, an integer multiple of
//! `2π √β`.
//!
//! `B(x+k)` lies outside the halo shell of the plaquettes it needs, so the
//! charge is computed in two stages: `B` on owned sites, one halo exchange of
//! `B`, then the lattice divergence.

use crate::algs::comlist::Comlists;
use crate::algs::communicator::Communicator;
use crate::algs::halo;
use crate::data::field::{Field, FieldKind};
use crate::lattice_error::LatticeError;
use crate::physics::su2::{Su2, dot3};
use crate::update::kernel::SiteContext;
use num_complex::Complex64;
use std::f64::consts::TAU;

/// Complex 2x2 matrix, row-major.
pub type Mat2 = [[Complex64; 2]; 2];

fn matmul(a: &Mat2, b: &Mat2) -> Mat2 {
    let mut out = [[Complex64::new(0.0, 0.0); 2]; 2];
    for (r, row) in out.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = a[r][0] * b[0][c] + a[r][1] * b[1][c];
        }
    }
    out
}

fn dagger(a: &Mat2) -> Mat2 {
    [
        [a[0][0].conj(), a[1][0].conj()],
        [a[0][1].conj(), a[1][1].conj()],
    ]
}

/// `u0 + i u·σ` as a complex matrix.
pub fn su2_matrix(u: Su2) -> Mat2 {
    let [u0, u1, u2, u3] = u.0;
    [
        [Complex64::new(u0, u3), Complex64::new(u2, u1)],
        [Complex64::new(-u2, u1), Complex64::new(u0, -u3)],
    ]
}

/// `½(1 + n̂·σ)` for triplet `a`. A vanishing triplet has no direction and
/// projects along `σ₃`.
pub fn projector(a: [f64; 3]) -> Mat2 {
    let norm = dot3(&a, &a).sqrt();
    let n = if norm > 0.0 {
        [a[0] / norm, a[1] / norm, a[2] / norm]
    } else {
        [0.0, 0.0, 1.0]
    };
    [
        [Complex64::new(0.5 * (1.0 + n[2]), 0.0), Complex64::new(0.5 * n[0], -0.5 * n[1])],
        [Complex64::new(0.5 * n[0], 0.5 * n[1]), Complex64::new(0.5 * (1.0 - n[2]), 0.0)],
    ]
}

/// `Π(x) U_μ(x) Π(x+μ)`.
pub fn projected_link(ctx: &SiteContext<'_>, i: usize, mu: usize) -> Mat2 {
    let left = projector(ctx.triplet(i));
    let right = projector(ctx.triplet(ctx.next(i, mu)));
    matmul(&matmul(&left, &su2_matrix(ctx.link(i, mu))), &right)
}

/// Projected Abelian field strength `α_{μν}(x)`, antisymmetric in `(μ, ν)`.
pub fn alpha_proj(ctx: &SiteContext<'_>, i: usize, mu: usize, nu: usize) -> f64 {
    let p1 = projected_link(ctx, i, mu);
    let p2 = projected_link(ctx, ctx.next(i, mu), nu);
    let p3 = projected_link(ctx, ctx.next(i, nu), mu);
    let p4 = projected_link(ctx, i, nu);
    let loop_ = matmul(&matmul(&matmul(&p1, &p2), &dagger(&p3)), &dagger(&p4));
    let tr = loop_[0][0] + loop_[1][1];
    tr.arg() * ctx.params.betasu2.sqrt()
}

/// `B_dir(x) = ½ ε_{dir μ ν} α_{μν}(x)`, summed over planes orthogonal to `dir`.
pub fn magfield(ctx: &SiteContext<'_>, i: usize, dir: usize) -> f64 {
    let dim = ctx.dim();
    let mut b = 0.0;
    for d1 in (0..dim).filter(|&d| d != dir) {
        for d2 in (d1 + 1..dim).filter(|&d| d != dir) {
            let alpha = alpha_proj(ctx, i, d1, d2);
            // one transposition brings (dir, d1, d2) into order when d1 < dir < d2
            if d1 < dir && dir < d2 {
                b -= alpha;
            } else {
                b += alpha;
            }
        }
    }
    b
}

/// Magnetic field of every owned site, halos refreshed. One component per
/// direction.
pub fn magfield_all<C: Communicator>(
    ctx: &SiteContext<'_>,
    comlists: &Comlists,
    comm: &C,
) -> Result<Field, LatticeError> {
    let dim = ctx.dim();
    let mut b = Field::zeros(FieldKind::U1Link, dim, ctx.layout.sites_total());
    for i in 0..ctx.layout.sites() {
        for dir in 0..dim {
            b.get_mut(i, dir)[0] = magfield(ctx, i, dir);
        }
    }
    halo::exchange_full(comlists, comm, &mut b)?;
    Ok(b)
}

/// Charge in the cube spanned from every owned site, in units of
/// `2π √β` so that each entry is an integer. Collective.
pub fn magcharge<C: Communicator>(
    ctx: &SiteContext<'_>,
    comlists: &Comlists,
    comm: &C,
) -> Result<Vec<f64>, LatticeError> {
    ctx.fields.require(FieldKind::Triplet)?;
    let b = magfield_all(ctx, comlists, comm)?;
    let unit = TAU * ctx.params.betasu2.sqrt();
    Ok((0..ctx.layout.sites())
        .map(|i| {
            let div: f64 = (0..ctx.dim())
                .map(|dir| b.get(ctx.next(i, dir), dir)[0] - b.get(i, dir)[0])
                .sum();
            div / unit
        })
        .collect())
}
