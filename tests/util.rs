#![allow(dead_code)]
use num_complex::Complex64;
use std::collections::BTreeMap;
use su2_lattice::prelude::*;

/// Run `f` once per rank of an in-process world of `n` ranks, each on its own
/// thread; results are returned in rank order.
pub fn run_on_ranks<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(LocalComm) -> T + Sync,
{
    run_on_ranks_with_timeout(n, std::time::Duration::from_secs(20), f)
}

pub fn run_on_ranks_with_timeout<T, F>(n: usize, timeout: std::time::Duration, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(LocalComm) -> T + Sync,
{
    let world = LocalComm::world_with_timeout(n, timeout);
    std::thread::scope(|s| {
        let f = &f;
        let handles: Vec<_> = world.into_iter().map(|c| s.spawn(move || f(c))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Config on `extents` with explicit slicing (or automatic when `None`).
pub fn config(extents: &[usize], nslices: Option<&[usize]>) -> SimulationConfig {
    SimulationConfig {
        lattice: LatticeConfig {
            extents: extents.to_vec(),
            nslices: nslices.map(<[usize]>::to_vec),
        },
        ..Default::default()
    }
}

/// Every field kind on, every kernel in the sweep, hot links.
pub fn full_model(extents: &[usize], nslices: Option<&[usize]>) -> SimulationConfig {
    let mut c = config(extents, nslices);
    c.fields = FieldsConfig {
        doublet: true,
        triplet: true,
        singlet: true,
        u1link: true,
        doublet2: true,
    };
    c.action = ActionParams {
        betasu2: 2.2,
        betau1: 1.4,
        msq_phi: -0.1,
        lambda_phi: 0.5,
        msq_phi2: 0.3,
        m12sq: Complex64::new(0.05, -0.02),
        lam2: 0.4,
        lam3: 0.1,
        lam4: 0.05,
        lam5: Complex64::new(0.02, 0.01),
        lam6: Complex64::new(0.01, 0.0),
        lam7: Complex64::new(0.0, 0.01),
        msq_triplet: 0.2,
        b4: 0.3,
        a2: 0.1,
        b1_s: 0.02,
        msq_s: 0.5,
        b3_s: 0.01,
        b4_s: 0.2,
        a1_s: 0.05,
        a2_s: 0.03,
    };
    c.init = InitConfig {
        hot_start: true,
        phi0: 0.7,
        sigma0: 0.4,
        singlet0: 0.1,
        phi2_0: 0.5,
    };
    c.updates = vec![
        UpdateStep::new(FieldKind::Link, Algorithm::Heatbath, 1),
        UpdateStep::new(FieldKind::Link, Algorithm::Overrelax, 1),
        UpdateStep::new(FieldKind::Link, Algorithm::Metropolis, 1),
        UpdateStep::new(FieldKind::Doublet, Algorithm::Metropolis, 1),
        UpdateStep::new(FieldKind::Doublet, Algorithm::Overrelax, 1),
        UpdateStep::new(FieldKind::Triplet, Algorithm::Metropolis, 1),
        UpdateStep::new(FieldKind::Triplet, Algorithm::Overrelax, 1),
        UpdateStep::new(FieldKind::Singlet, Algorithm::Metropolis, 2),
        UpdateStep::new(FieldKind::U1Link, Algorithm::Metropolis, 1),
        UpdateStep::new(FieldKind::U1Link, Algorithm::Overrelax, 1),
        UpdateStep::new(FieldKind::Doublet2, Algorithm::Metropolis, 1),
        UpdateStep::new(FieldKind::Doublet2, Algorithm::Overrelax, 1),
    ];
    c.seed = 20240611;
    c
}

/// Union of per-rank gathers; panics if two ranks report the same site.
pub fn merge(parts: Vec<BTreeMap<u64, Vec<f64>>>) -> BTreeMap<u64, Vec<f64>> {
    let mut out = BTreeMap::new();
    for part in parts {
        for (g, row) in part {
            assert!(out.insert(g, row).is_none(), "site {g} owned twice");
        }
    }
    out
}

/// Bitwise comparison of two gathered fields.
pub fn assert_bit_identical(a: &BTreeMap<u64, Vec<f64>>, b: &BTreeMap<u64, Vec<f64>>) {
    assert_eq!(a.len(), b.len());
    for ((ga, ra), (gb, rb)) in a.iter().zip(b) {
        assert_eq!(ga, gb);
        let ba: Vec<u64> = ra.iter().map(|v| v.to_bits()).collect();
        let bb: Vec<u64> = rb.iter().map(|v| v.to_bits()).collect();
        assert_eq!(ba, bb, "site {ga} differs: {ra:?} vs {rb:?}");
    }
}
