//! Volume-averaged and per-site observables.
//!
//! Per-site shares from [`site_terms`] are summed over owned sites, reduced
//! over ranks and divided by the global volume. Halos must be fully
//! exchanged first (see `Scheduler::flush`). With a triplet present the
//! magnetic charge takes one extra halo exchange.

use crate::algs::comlist::Comlists;
use crate::algs::communicator::Communicator;
use crate::algs::reduction::{gather_to_root, reduce_sum_slice};
use crate::data::field::FieldKind;
use crate::lattice_error::LatticeError;
use crate::physics::action::{doubletsq, phi12, site_action, site_terms, tripletsq};
use crate::physics::magnetic::magcharge;
use crate::update::kernel::SiteContext;
use serde::{Deserialize, Serialize};

/// Doublet averages; `phisq` is `½|φ|²`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DoubletObservables {
    pub hop: f64,
    pub phisq: f64,
    pub phi4: f64,
}

/// Second-doublet averages, plus `φ₁†φ₂ = R + iI` (normalised like `½|φ|²`).
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Doublet2Observables {
    pub hop: f64,
    pub phisq: f64,
    pub phi4: f64,
    pub phi12_re: f64,
    pub phi12_im: f64,
}

/// Triplet averages; `sigmasq` is `½|Σ|²`. The magnetic entries are lattice
/// totals: `mag_charge` the net charge (zero up to rounding on a periodic
/// lattice) and `monopoles` the number of monopoles plus antimonopoles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TripletObservables {
    pub hop: f64,
    pub sigmasq: f64,
    pub sigma4: f64,
    pub phisq_sigmasq: f64,
    pub mag_charge: f64,
    pub monopoles: f64,
}

/// Singlet moments `⟨S⟩ .. ⟨S⁴⟩` and the portal correlators `⟨½|φ|² S⟩`,
/// `⟨½|φ|² S²⟩`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SingletObservables {
    pub s: f64,
    pub s2: f64,
    pub s3: f64,
    pub s4: f64,
    pub s_phisq: f64,
    pub s2_phisq: f64,
}

/// `⟨β_U1 Σ_{μ<ν} (1 − cos θ)⟩`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct U1Observables {
    pub wilson: f64,
}

/// One measurement; every average is per lattice site.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub sweep: u64,
    pub action: f64,
    /// `⟨½ Re Tr P⟩` over all plaquettes.
    pub plaquette: f64,
    pub wilson: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub u1: Option<U1Observables>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doublet: Option<DoubletObservables>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doublet2: Option<Doublet2Observables>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triplet: Option<TripletObservables>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub singlet: Option<SingletObservables>,
}

// slots of the reduction buffer
const ACTION: usize = 0;
const PLAQ: usize = 1;
const WILSON: usize = 2;
const D_HOP: usize = 3;
const D_SQ: usize = 4;
const D_4: usize = 5;
const T_HOP: usize = 6;
const T_SQ: usize = 7;
const T_4: usize = 8;
const DT: usize = 9;
const S1: usize = 10;
const S_PHI: usize = 14;
const S2_PHI: usize = 15;
const U1_WILSON: usize = 16;
const D2_HOP: usize = 17;
const D2_SQ: usize = 18;
const D2_4: usize = 19;
const PHI12_RE: usize = 20;
const PHI12_IM: usize = 21;
const CHARGE: usize = 22;
const CHARGE_ABS: usize = 23;
const SLOTS: usize = 24;

/// Measure the current configuration. Collective.
pub fn measure<C: Communicator>(
    ctx: &SiteContext<'_>,
    comlists: &Comlists,
    comm: &C,
    sweep: u64,
) -> Result<Measurement, LatticeError> {
    let mut local = [0.0f64; SLOTS];
    for i in 0..ctx.layout.sites() {
        let t = site_terms(ctx, i);
        local[ACTION] += t.total();
        local[PLAQ] += t.plaquette;
        local[WILSON] += t.wilson;
        local[U1_WILSON] += t.u1_wilson;
        local[D_HOP] += t.doublet_hop;
        local[D2_HOP] += t.doublet2_hop;
        local[T_HOP] += t.triplet_hop;
        let m = doubletsq(ctx, i);
        let sig = tripletsq(ctx, i);
        local[D_SQ] += m;
        local[D_4] += m * m;
        local[T_SQ] += sig;
        local[T_4] += sig * sig;
        local[DT] += m * sig;
        let s = ctx.singlet(i);
        let mut pow = 1.0;
        for k in 0..4 {
            pow *= s;
            local[S1 + k] += pow;
        }
        local[S_PHI] += m * s;
        local[S2_PHI] += m * s * s;
        if ctx.has(FieldKind::Doublet2) {
            let phi2 = ctx.doublet2(i);
            let m2 = 0.5 * phi2.norm_sq();
            local[D2_SQ] += m2;
            local[D2_4] += m2 * m2;
            let (r, im) = phi12(ctx.doublet(i), phi2);
            local[PHI12_RE] += r;
            local[PHI12_IM] += im;
        }
    }
    if ctx.has(FieldKind::Triplet) {
        for q in magcharge(ctx, comlists, comm)? {
            local[CHARGE] += q;
            local[CHARGE_ABS] += q.abs();
        }
    }
    let global = reduce_sum_slice(comm, &local)?;
    let vol = ctx.layout.volume() as f64;
    let dim = ctx.dim();
    let planes = (dim * (dim - 1) / 2).max(1) as f64;
    let avg = |slot: usize| global[slot] / vol;

    let out = Measurement {
        sweep,
        action: avg(ACTION),
        plaquette: avg(PLAQ) / planes,
        wilson: avg(WILSON),
        u1: ctx.has(FieldKind::U1Link).then(|| U1Observables {
            wilson: avg(U1_WILSON),
        }),
        doublet: ctx.has(FieldKind::Doublet).then(|| DoubletObservables {
            hop: avg(D_HOP),
            phisq: avg(D_SQ),
            phi4: avg(D_4),
        }),
        doublet2: ctx.has(FieldKind::Doublet2).then(|| Doublet2Observables {
            hop: avg(D2_HOP),
            phisq: avg(D2_SQ),
            phi4: avg(D2_4),
            phi12_re: avg(PHI12_RE),
            phi12_im: avg(PHI12_IM),
        }),
        triplet: ctx.has(FieldKind::Triplet).then(|| TripletObservables {
            hop: avg(T_HOP),
            sigmasq: avg(T_SQ),
            sigma4: avg(T_4),
            phisq_sigmasq: avg(DT),
            mag_charge: global[CHARGE],
            monopoles: global[CHARGE_ABS],
        }),
        singlet: ctx.has(FieldKind::Singlet).then(|| SingletObservables {
            s: avg(S1),
            s2: avg(S1 + 1),
            s3: avg(S1 + 2),
            s4: avg(S1 + 3),
            s_phisq: avg(S_PHI),
            s2_phisq: avg(S2_PHI),
        }),
    };
    log::debug!(
        "sweep {}: action {:.8} plaquette {:.8}",
        out.sweep,
        out.action,
        out.plaquette
    );
    Ok(out)
}

/// Observables of one site, as collected by [`measure_local`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalSample {
    /// Global coordinates.
    pub coords: Vec<usize>,
    /// The site's share of the total action.
    pub action: f64,
    /// `½|Σ|²`, with a triplet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sigmasq: Option<f64>,
    /// Magnetic charge of the cube spanned from the site, an integer, with a
    /// triplet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magcharge: Option<f64>,
}

// fields of one per-site record on the wire
const REC_GLOBAL: usize = 0;
const REC_ACTION: usize = 1;
const REC_SIGMASQ: usize = 2;
const REC_CHARGE: usize = 3;
const REC_LEN: usize = 4;

/// Per-site observables of the whole lattice, collected on rank 0 and sorted
/// by global site index. Rank 0 gets `Some`, the others `None`. Collective.
pub fn measure_local<C: Communicator>(
    ctx: &SiteContext<'_>,
    comlists: &Comlists,
    comm: &C,
) -> Result<Option<Vec<LocalSample>>, LatticeError> {
    let sites = ctx.layout.sites();
    let with_triplet = ctx.has(FieldKind::Triplet);
    let charges = if with_triplet {
        magcharge(ctx, comlists, comm)?
    } else {
        vec![0.0; sites]
    };
    let mut records = vec![0.0; sites * REC_LEN];
    for (i, rec) in records.chunks_exact_mut(REC_LEN).enumerate() {
        rec[REC_GLOBAL] = ctx.layout.global_index(i) as f64;
        rec[REC_ACTION] = site_action(ctx, i);
        rec[REC_SIGMASQ] = tripletsq(ctx, i);
        rec[REC_CHARGE] = charges[i];
    }
    let Some(all) = gather_to_root(comm, &records)? else {
        return Ok(None);
    };
    let lattice = ctx.layout.lattice();
    let mut samples: Vec<(u64, LocalSample)> = all
        .chunks_exact(REC_LEN)
        .map(|rec| {
            let global = rec[REC_GLOBAL] as u64;
            let mut coords = vec![0; lattice.dim()];
            lattice.coords_of(global, &mut coords);
            let sample = LocalSample {
                coords,
                action: rec[REC_ACTION],
                sigmasq: with_triplet.then_some(rec[REC_SIGMASQ]),
                magcharge: with_triplet.then_some(rec[REC_CHARGE]),
            };
            (global, sample)
        })
        .collect();
    samples.sort_by_key(|(g, _)| *g);
    Ok(Some(samples.into_iter().map(|(_, s)| s).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::config::{ActionParams, FieldsConfig, InitConfig};
    use crate::data::field_set::FieldSet;
    use crate::topology::geometry::GlobalLattice;
    use crate::topology::layout::Layout;
    use crate::topology::slicing::Slicing;

    #[test]
    fn cold_start_values() {
        let lat = GlobalLattice::new(vec![4, 4, 4]).unwrap();
        let l = Layout::new(lat.clone(), Slicing::automatic(&lat, 1).unwrap(), 0).unwrap();
        let mut fs = FieldSet::new(
            &l,
            &FieldsConfig {
                doublet: true,
                singlet: true,
                ..Default::default()
            },
        );
        let init = InitConfig {
            phi0: 2.0,
            singlet0: 0.5,
            ..Default::default()
        };
        fs.initialize(&l, &init, 0);
        let p = ActionParams {
            msq_phi: 0.25,
            ..Default::default()
        };
        let ctx = SiteContext::new(&l, &fs, &p);
        let m = measure(&ctx, &Comlists::default(), &NoComm, 7).unwrap();
        assert_eq!(m.sweep, 7);
        assert!((m.plaquette - 1.0).abs() < 1e-14);
        assert!(m.wilson.abs() < 1e-14);
        let d = m.doublet.unwrap();
        // ½|φ|² = 2, hop = Σ_μ |φ|² = 12, kinetic part vanishes
        assert!((d.phisq - 2.0).abs() < 1e-14);
        assert!((d.phi4 - 4.0).abs() < 1e-14);
        assert!((d.hop - 12.0).abs() < 1e-14);
        assert!((m.action - 0.25 * 2.0).abs() < 1e-12);
        let s = m.singlet.unwrap();
        assert!((s.s2 - 0.25).abs() < 1e-14);
        // ½|φ|² S = 2 · 0.5, ½|φ|² S² = 2 · 0.25
        assert!((s.s_phisq - 1.0).abs() < 1e-14);
        assert!((s.s2_phisq - 0.5).abs() < 1e-14);
        assert!(m.triplet.is_none());
        assert!(m.u1.is_none() && m.doublet2.is_none());
    }

    #[test]
    fn two_doublets_and_u1_cold_values() {
        let lat = GlobalLattice::new(vec![4, 4]).unwrap();
        let l = Layout::new(lat.clone(), Slicing::automatic(&lat, 1).unwrap(), 0).unwrap();
        let mut fs = FieldSet::new(
            &l,
            &FieldsConfig {
                doublet: true,
                u1link: true,
                doublet2: true,
                ..Default::default()
            },
        );
        let init = InitConfig {
            phi0: 2.0,
            phi2_0: 3.0,
            ..Default::default()
        };
        fs.initialize(&l, &init, 0);
        let p = ActionParams {
            betau1: 1.0,
            ..Default::default()
        };
        let ctx = SiteContext::new(&l, &fs, &p);
        let m = measure(&ctx, &Comlists::default(), &NoComm, 0).unwrap();
        assert_eq!(m.u1.unwrap().wilson, 0.0);
        let d2 = m.doublet2.unwrap();
        // ½|φ₂|² = 4.5, φ₁†φ₂ = ½ · 2 · 3
        assert!((d2.phisq - 4.5).abs() < 1e-14);
        assert!((d2.hop - 2.0 * 9.0).abs() < 1e-14);
        assert!((d2.phi12_re - 3.0).abs() < 1e-14);
        assert!(d2.phi12_im.abs() < 1e-14);
    }

    #[test]
    fn triplet_measurement_counts_no_monopoles_when_cold() {
        let lat = GlobalLattice::new(vec![4, 4, 4]).unwrap();
        let l = Layout::new(lat.clone(), Slicing::automatic(&lat, 1).unwrap(), 0).unwrap();
        let mut fs = FieldSet::new(
            &l,
            &FieldsConfig {
                triplet: true,
                ..Default::default()
            },
        );
        fs.initialize(&l, &InitConfig::default(), 0);
        let p = ActionParams {
            betasu2: 9.0,
            ..Default::default()
        };
        let ctx = SiteContext::new(&l, &fs, &p);
        let t = measure(&ctx, &Comlists::default(), &NoComm, 0).unwrap().triplet.unwrap();
        assert_eq!(t.monopoles, 0.0);
        assert_eq!(t.mag_charge, 0.0);
    }

    #[test]
    fn local_samples_cover_the_lattice_in_index_order() {
        let lat = GlobalLattice::new(vec![4, 2, 2]).unwrap();
        let l = Layout::new(lat.clone(), Slicing::automatic(&lat, 1).unwrap(), 0).unwrap();
        let mut fs = FieldSet::new(
            &l,
            &FieldsConfig {
                triplet: true,
                ..Default::default()
            },
        );
        fs.initialize(&l, &InitConfig::default(), 0);
        for i in 0..l.sites() {
            fs.get_mut(FieldKind::Triplet).unwrap().set(i, 0, &[0.0, 0.0, 2.0, 0.0]);
        }
        let p = ActionParams {
            msq_triplet: 0.5,
            ..Default::default()
        };
        let ctx = SiteContext::new(&l, &fs, &p);
        let samples = measure_local(&ctx, &Comlists::default(), &NoComm).unwrap().unwrap();
        assert_eq!(samples.len(), 16);
        assert_eq!(samples[1].coords, vec![1, 0, 0]);
        for s in &samples {
            assert_eq!(s.sigmasq, Some(2.0));
            assert_eq!(s.magcharge.map(f64::abs), Some(0.0));
            // kinetic part vanishes, potential is msq · ½|Σ|²
            assert!((s.action - 1.0).abs() < 1e-14);
        }
    }

    #[test]
    fn disabled_fields_are_skipped_in_json() {
        let m = Measurement::default();
        let json = serde_json::to_string(&m).unwrap();
        assert!(!json.contains("doublet"));
        let back: Measurement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
