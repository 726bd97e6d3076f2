use proptest::prelude::*;
use su2_lattice::prelude::*;
use su2_lattice::topology::NO_SITE;

fn layouts(extents: &[usize], ranks: usize) -> Option<Vec<Layout>> {
    let lat = GlobalLattice::new(extents.to_vec()).ok()?;
    let slicing = Slicing::automatic(&lat, ranks).ok()?;
    Some(
        (0..ranks)
            .map(|r| Layout::new(lat.clone(), slicing.clone(), r).unwrap())
            .collect(),
    )
}

fn check_neighbors(l: &Layout) {
    let dim = l.dim();
    let mut x = vec![0; dim];
    for i in 0..l.sites() {
        for d in 0..dim {
            let n = l.next(i, d);
            let p = l.prev(i, d);
            assert_eq!(l.prev(n, d), i, "prev(next({i},{d}))");
            assert_eq!(l.next(p, d), i, "next(prev({i},{d}))");
            l.lattice().shifted(l.coords(i), d, 1, &mut x);
            assert_eq!(l.coords(n), &x[..]);
            assert_ne!(l.parity(n), l.parity(i));
        }
    }
    // halo rows: wherever both steps stay in the shell they invert too
    for i in l.sites()..l.sites_total() {
        for d in 0..dim {
            if let Some(n) = l.try_next(i, d) {
                if let Some(back) = l.try_prev(n, d) {
                    assert_eq!(back, i);
                }
            }
        }
    }
}

fn extents_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(prop::sample::select(vec![2usize, 4, 6, 8]), 2..=4)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn neighbor_tables_are_mutual_inverses(
        extents in extents_strategy(),
        ranks in prop::sample::select(vec![1usize, 2, 3, 4, 8]),
    ) {
        let Some(all) = layouts(&extents, ranks) else {
            // rank count does not fit this lattice
            return Ok(());
        };
        let mut owned = 0;
        for l in &all {
            check_neighbors(l);
            prop_assert!(l.validate_invariants().is_ok());
            owned += l.sites();
        }
        prop_assert_eq!(owned, all[0].volume());
    }

    #[test]
    fn staple_chains_resolve_inside_the_shell(
        extents in extents_strategy(),
        ranks in prop::sample::select(vec![2usize, 4]),
    ) {
        let Some(all) = layouts(&extents, ranks) else {
            return Ok(());
        };
        for l in &all {
            for i in 0..l.sites() {
                for a in 0..l.dim() {
                    for b in 0..l.dim() {
                        prop_assert_ne!(l.next(l.prev(i, b), a), NO_SITE);
                        prop_assert_ne!(l.prev(l.next(i, b), a), NO_SITE);
                    }
                }
            }
        }
    }
}

#[test]
fn odd_extent_is_rejected() {
    assert!(matches!(
        GlobalLattice::new(vec![4, 3]),
        Err(LatticeError::InvalidExtent { axis: 1, extent: 3 })
    ));
}

#[test]
fn impossible_slicing_is_a_configuration_error() {
    let lat = GlobalLattice::new(vec![4, 4]).unwrap();
    let err = Slicing::explicit(&lat, &[3, 1], 3).unwrap_err();
    assert!(err.is_configuration());
    let err = Slicing::automatic(&lat, 5).unwrap_err();
    assert!(err.is_configuration());
}
