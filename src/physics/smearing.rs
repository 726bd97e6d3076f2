//! Covariant smearing ahead of blocking.
//!
//! Only sites with even global coordinates along every blocked direction
//! survive blocking, so only those are smeared; all other sites and the
//! links along unblocked directions are copied unchanged.
//!
//! - SU(2) links along a blocked `i`: `U'_i(x) = V_i(x) V_i(x+i)` projected
//!   back onto the group, with `V_i = (U_i + Σ_j staple†) / paths`, `j` over
//!   the other blocked directions and both staple orientations;
//! - U(1) links along a blocked `i`: the sum of the two angles, wrapped;
//! - scalars: the site value averaged with its parallel-transported blocked
//!   neighbors.
//!
//! `V_i(x+i)` is beyond the halo shell of the staples, so `V` is built on
//! owned sites and halo-exchanged before the products are taken.

use crate::algs::comlist::Comlists;
use crate::algs::communicator::Communicator;
use crate::algs::halo;
use crate::data::field::{Field, FieldKind};
use crate::data::field_set::FieldSet;
use crate::lattice_error::LatticeError;
use crate::physics::action::staple_pair;
use crate::physics::su2::{Su2, rotate, rotate_transposed};
use crate::topology::geometry::Parity;
use crate::update::kernel::{SiteContext, wrap_angle};

fn blocked(block_dirs: &[bool]) -> impl Iterator<Item = usize> + '_ {
    block_dirs.iter().enumerate().filter(|(_, b)| **b).map(|(d, _)| d)
}

/// True when `i` survives blocking along `block_dirs`.
pub fn is_block_site(ctx: &SiteContext<'_>, i: usize, block_dirs: &[bool]) -> bool {
    let x = ctx.layout.coords(i);
    blocked(block_dirs).all(|d| x[d] % 2 == 0)
}

/// `V_dir(x)`: the link plus the reversed staples in the other blocked
/// directions, divided by the number of paths.
pub fn extended_staple(ctx: &SiteContext<'_>, i: usize, dir: usize, block_dirs: &[bool]) -> Su2 {
    let mut v = ctx.link(i, dir);
    let mut paths = 1.0;
    for j in blocked(block_dirs).filter(|&j| j != dir) {
        let (up, down) = staple_pair(ctx, i, dir, j);
        v = v.add(up.dagger()).add(down.dagger());
        paths += 2.0;
    }
    v.scale(1.0 / paths)
}

/// Triplet averaged with `R(U) Σ` of its blocked neighbors.
pub fn smear_triplet(ctx: &SiteContext<'_>, i: usize, block_dirs: &[bool]) -> [f64; 3] {
    let mut acc = ctx.triplet(i);
    let mut sites = 1.0;
    for d in blocked(block_dirs) {
        let fwd = rotate(&ctx.link(i, d).adjoint(), &ctx.triplet(ctx.next(i, d)));
        let xm = ctx.prev(i, d);
        let bwd = rotate_transposed(&ctx.link(xm, d).adjoint(), &ctx.triplet(xm));
        for k in 0..3 {
            acc[k] += fwd[k] + bwd[k];
        }
        sites += 2.0;
    }
    acc.map(|a| a / sites)
}

/// Doublet (first or second) averaged with its transported blocked neighbors,
/// hypercharge phase included.
pub fn smear_doublet(ctx: &SiteContext<'_>, kind: FieldKind, i: usize, block_dirs: &[bool]) -> Su2 {
    let at = |j: usize| match kind {
        FieldKind::Doublet2 => ctx.doublet2(j),
        _ => ctx.doublet(j),
    };
    let mut acc = at(i);
    let mut sites = 1.0;
    for d in blocked(block_dirs) {
        let fwd = ctx.link(i, d).mul(at(ctx.next(i, d))).mul(ctx.u1_phase(i, d));
        let xm = ctx.prev(i, d);
        let bwd = ctx.link(xm, d).dag_mul(at(xm)).mul_dag(ctx.u1_phase(xm, d));
        acc = acc.add(fwd).add(bwd);
        sites += 2.0;
    }
    acc.scale(1.0 / sites)
}

/// Singlet averaged with its blocked neighbors.
pub fn smear_singlet(ctx: &SiteContext<'_>, i: usize, block_dirs: &[bool]) -> f64 {
    let mut acc = ctx.singlet(i);
    let mut sites = 1.0;
    for d in blocked(block_dirs) {
        acc += ctx.singlet(ctx.next(i, d)) + ctx.singlet(ctx.prev(i, d));
        sites += 2.0;
    }
    acc / sites
}

/// Smear every enabled field for blocking along `block_dirs`. The result has
/// its halos refreshed. Collective.
pub fn smear_fields<C: Communicator>(
    ctx: &SiteContext<'_>,
    comlists: &Comlists,
    comm: &C,
    block_dirs: &[bool],
) -> Result<FieldSet, LatticeError> {
    let dim = ctx.dim();
    if block_dirs.len() != dim {
        return Err(LatticeError::InvalidParameter(format!(
            "{} blocking flags for a {dim}-dimensional lattice",
            block_dirs.len()
        )));
    }
    let sites = ctx.layout.sites();

    // stage 1: V on owned sites, then its halos
    let mut v = Field::zeros(FieldKind::Link, dim, ctx.layout.sites_total());
    for i in 0..sites {
        for dir in blocked(block_dirs) {
            v.set(i, dir, &extended_staple(ctx, i, dir, block_dirs).to_value());
        }
    }
    for parity in Parity::ALL {
        for dir in blocked(block_dirs) {
            halo::exchange(comlists, comm, &mut v, dir, parity)?;
        }
    }

    // stage 2: smeared values on the surviving sites
    let mut out = ctx.fields.clone();
    for i in (0..sites).filter(|&i| is_block_site(ctx, i, block_dirs)) {
        for dir in blocked(block_dirs) {
            let vx = Su2::from_slice(v.get(i, dir));
            let vn = Su2::from_slice(v.get(ctx.next(i, dir), dir));
            let u = vx.mul(vn).normalized().ok_or_else(|| LatticeError::KernelFailure {
                kind: FieldKind::Link,
                site: i,
                reason: format!("smeared link along {dir} vanishes"),
            })?;
            out.require_mut(FieldKind::Link)?.set(i, dir, &u.to_value());
            if let Some(f) = out.get_mut(FieldKind::U1Link) {
                let a = wrap_angle(ctx.u1link(i, dir) + ctx.u1link(ctx.next(i, dir), dir));
                f.set(i, dir, &[a, 0.0, 0.0, 0.0]);
            }
        }
        for kind in [FieldKind::Doublet, FieldKind::Doublet2] {
            if let Some(f) = out.get_mut(kind) {
                f.set(i, 0, &smear_doublet(ctx, kind, i, block_dirs).to_value());
            }
        }
        if let Some(f) = out.get_mut(FieldKind::Triplet) {
            let a = smear_triplet(ctx, i, block_dirs);
            f.set(i, 0, &[a[0], a[1], a[2], 0.0]);
        }
        if let Some(f) = out.get_mut(FieldKind::Singlet) {
            f.set(i, 0, &[smear_singlet(ctx, i, block_dirs), 0.0, 0.0, 0.0]);
        }
    }

    for kind in out.enabled_kinds() {
        halo::exchange_full(comlists, comm, out.require_mut(kind)?)?;
    }
    log::debug!("smeared {:?} along {:?}", out.enabled_kinds(), block_dirs);
    Ok(out)
}
