mod util;

use std::collections::BTreeMap;
use su2_lattice::physics::LocalSample;
use su2_lattice::prelude::*;
use util::{assert_bit_identical, full_model, merge, run_on_ranks};

type Rows = BTreeMap<u64, Vec<f64>>;

fn owned_rows(layout: &Layout, fields: &FieldSet, kind: FieldKind) -> Rows {
    let f = fields.require(kind).unwrap();
    (0..layout.sites())
        .map(|i| {
            let row = (0..f.comps()).flat_map(|c| f.get(i, c).iter().copied()).collect();
            (layout.global_index(i), row)
        })
        .collect()
}

/// Local samples on rank 0 and the smeared fields of every kind, after one
/// sweep of the full model.
fn derived(nslices: &[usize]) -> (Vec<LocalSample>, Vec<Rows>) {
    let ranks = nslices.iter().product();
    let per_rank = run_on_ranks(ranks, |comm| {
        let mut sim = Simulation::new(full_model(&[4, 4, 4], Some(nslices)), comm).unwrap();
        sim.sweep().unwrap();
        let samples = sim.measure_local().unwrap();
        let smeared = sim.smeared(&[true, false, true]).unwrap();
        let rows: Vec<Rows> = FieldKind::ALL
            .iter()
            .map(|&k| owned_rows(sim.lattice().layout(), &smeared, k))
            .collect();
        (samples, rows)
    });
    let mut samples = None;
    let mut by_kind: Vec<Vec<Rows>> = vec![Vec::new(); FieldKind::ALL.len()];
    for (rank, (s, rows)) in per_rank.into_iter().enumerate() {
        assert_eq!(s.is_some(), rank == 0, "only rank 0 collects samples");
        if s.is_some() {
            samples = s;
        }
        for (slot, r) in by_kind.iter_mut().zip(rows) {
            slot.push(r);
        }
    }
    (samples.unwrap(), by_kind.into_iter().map(merge).collect())
}

#[test]
fn local_samples_and_smearing_agree_across_rank_counts() {
    let (s1, f1) = derived(&[1, 1, 1]);
    for nslices in [&[2, 1, 1][..], &[2, 2, 1][..]] {
        let (s, f) = derived(nslices);
        assert_eq!(s.len(), 64);
        for (a, b) in s1.iter().zip(&s) {
            assert_eq!(a.coords, b.coords);
            assert_eq!(a.action.to_bits(), b.action.to_bits());
            assert_eq!(a.sigmasq, b.sigmasq);
            assert_eq!(a.magcharge, b.magcharge);
        }
        for k in 0..FieldKind::ALL.len() {
            assert_bit_identical(&f1[k], &f[k]);
        }
    }
}

#[test]
fn local_charges_are_integers_and_match_the_monopole_count() {
    let results = run_on_ranks(2, |comm| {
        let mut sim = Simulation::new(full_model(&[4, 4, 4], Some(&[2, 1, 1])), comm).unwrap();
        sim.sweep().unwrap();
        let m = sim.measure().unwrap();
        (m, sim.measure_local().unwrap())
    });
    let (m, samples) = &results[0];
    let samples = samples.as_ref().unwrap();
    let charges: Vec<f64> = samples.iter().map(|s| s.magcharge.unwrap()).collect();
    for q in &charges {
        assert!((q - q.round()).abs() < 1e-9, "charge {q}");
    }
    let t = m.triplet.unwrap();
    let abs: f64 = charges.iter().map(|q| q.abs()).sum();
    assert!((t.monopoles - abs).abs() < 1e-9);
    assert!(t.mag_charge.abs() < 1e-9);
}
