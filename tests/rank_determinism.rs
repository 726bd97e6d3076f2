mod util;

use std::collections::BTreeMap;
use su2_lattice::prelude::*;
use util::{assert_bit_identical, full_model, merge, run_on_ranks};

type Gathered = Vec<BTreeMap<u64, Vec<f64>>>;

fn evolve(nslices: &[usize], sweeps: usize) -> (Gathered, Vec<Measurement>) {
    let ranks = nslices.iter().product();
    let per_rank = run_on_ranks(ranks, |comm| {
        let mut sim = Simulation::new(full_model(&[4, 4, 4], Some(nslices)), comm).unwrap();
        let mut ms = Vec::new();
        sim.run(sweeps as u64, 1, |m| {
            ms.push(m.clone());
            Ok(())
        })
        .unwrap();
        let fields: Gathered = FieldKind::ALL
            .iter()
            .map(|&k| sim.gather_field(k).unwrap())
            .collect();
        (fields, ms)
    });
    let measurements = per_rank[0].1.clone();
    // every rank sees the same reduced measurement
    for (_, ms) in &per_rank {
        assert_eq!(ms, &measurements);
    }
    let mut by_kind: Vec<Vec<_>> = vec![Vec::new(); FieldKind::ALL.len()];
    for (fields, _) in per_rank {
        for (slot, f) in by_kind.iter_mut().zip(fields) {
            slot.push(f);
        }
    }
    (by_kind.into_iter().map(merge).collect(), measurements)
}

#[test]
fn fields_are_bit_identical_for_1_2_and_4_ranks() {
    let (one, m1) = evolve(&[1, 1, 1], 2);
    let (two, m2) = evolve(&[2, 1, 1], 2);
    let (four, m4) = evolve(&[2, 2, 1], 2);
    for k in 0..FieldKind::ALL.len() {
        assert_eq!(one[k].len(), 64);
        assert_bit_identical(&one[k], &two[k]);
        assert_bit_identical(&one[k], &four[k]);
    }
    // partial sums are added in a different order, so only approximately equal
    for (a, b) in m1.iter().zip(m2.iter().chain(&m4)) {
        assert_eq!(a.sweep, b.sweep);
        assert!((a.action - b.action).abs() < 1e-10);
        assert!((a.plaquette - b.plaquette).abs() < 1e-12);
    }
}

#[test]
fn slicing_along_different_axes_agrees() {
    let (a, _) = evolve(&[1, 2, 1], 1);
    let (b, _) = evolve(&[1, 1, 2], 1);
    for k in 0..FieldKind::ALL.len() {
        assert_bit_identical(&a[k], &b[k]);
    }
}

#[test]
fn extremal_links_at_infinite_beta_never_change() {
    let results = run_on_ranks(2, |comm| {
        let mut cfg = util::config(&[4, 4, 4], Some(&[2, 1, 1]));
        cfg.action.betasu2 = 1e12;
        cfg.updates = vec![UpdateStep::new(FieldKind::Link, Algorithm::Metropolis, 1)];
        let mut sim = Simulation::new(cfg, comm).unwrap();
        for _ in 0..3 {
            sim.sweep().unwrap();
        }
        let counters = sim.reduced_counters().unwrap();
        (sim.gather_field(FieldKind::Link).unwrap(), counters)
    });
    for (links, counters) in &results {
        let t = counters.tally(FieldKind::Link, Algorithm::Metropolis);
        assert_eq!(t.proposed, 3 * 3 * 64);
        assert_eq!(t.accepted, 0);
        for row in links.values() {
            for u in row.chunks_exact(4) {
                assert_eq!(u, &[1.0, 0.0, 0.0, 0.0]);
            }
        }
    }
}
