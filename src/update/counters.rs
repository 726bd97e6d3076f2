//! Acceptance and timing counters.
//!
//! Counters are rank-local while sweeping. [`Counters::reduce`] combines them
//! over all ranks and is only called at measurement time.

use crate::algs::communicator::Communicator;
use crate::algs::reduction::reduce_sum_slice;
use crate::data::field::FieldKind;
use crate::lattice_error::LatticeError;
use crate::update::kernel::Algorithm;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Tally of one (field kind, algorithm) pair.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct Tally {
    pub proposed: u64,
    pub accepted: u64,
}

impl Tally {
    /// Fraction of accepted proposals; 0 when nothing was proposed.
    pub fn ratio(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }
}

/// Rank-local counters of one run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Counters {
    tallies: BTreeMap<(FieldKind, Algorithm), Tally>,
    /// Time spent inside halo exchanges.
    comm_time: Duration,
    exchanges: u64,
    sweeps: u64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: FieldKind, algorithm: Algorithm, proposed: u64, accepted: u64) {
        let t = self.tallies.entry((kind, algorithm)).or_default();
        t.proposed += proposed;
        t.accepted += accepted;
    }

    pub fn record_exchange(&mut self, elapsed: Duration) {
        self.comm_time += elapsed;
        self.exchanges += 1;
    }

    pub fn record_sweep(&mut self) {
        self.sweeps += 1;
    }

    pub fn tally(&self, kind: FieldKind, algorithm: Algorithm) -> Tally {
        self.tallies.get(&(kind, algorithm)).copied().unwrap_or_default()
    }

    pub fn tallies(&self) -> impl Iterator<Item = (FieldKind, Algorithm, Tally)> + '_ {
        self.tallies.iter().map(|(&(k, a), &t)| (k, a, t))
    }

    /// Accepted proposals summed over every pair.
    pub fn total_accepted(&self) -> u64 {
        self.tallies.values().map(|t| t.accepted).sum()
    }

    pub fn comm_time(&self) -> Duration {
        self.comm_time
    }

    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Global counters: tallies, communication time (rank-seconds) and
    /// exchange counts summed over ranks. The sweep count is rank-invariant.
    ///
    /// Collective. Every rank must hold the same set of (kind, algorithm)
    /// keys, which holds when all ranks run the same update steps.
    pub fn reduce<C: Communicator>(&self, comm: &C) -> Result<Counters, LatticeError> {
        let mut local = Vec::with_capacity(2 * self.tallies.len() + 2);
        for t in self.tallies.values() {
            local.push(t.proposed as f64);
            local.push(t.accepted as f64);
        }
        local.push(self.comm_time.as_secs_f64());
        local.push(self.exchanges as f64);
        let global = reduce_sum_slice(comm, &local)?;

        let mut out = Counters {
            sweeps: self.sweeps,
            ..Default::default()
        };
        for (key, pair) in self.tallies.keys().zip(global.chunks_exact(2)) {
            out.tallies.insert(
                *key,
                Tally {
                    proposed: pair[0] as u64,
                    accepted: pair[1] as u64,
                },
            );
        }
        let n = global.len();
        out.comm_time = Duration::from_secs_f64(global[n - 2].max(0.0));
        out.exchanges = global[n - 1] as u64;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{LocalComm, NoComm};

    #[test]
    fn tallies_accumulate() {
        let mut c = Counters::new();
        c.record(FieldKind::Link, Algorithm::Heatbath, 10, 7);
        c.record(FieldKind::Link, Algorithm::Heatbath, 10, 3);
        let t = c.tally(FieldKind::Link, Algorithm::Heatbath);
        assert_eq!((t.proposed, t.accepted), (20, 10));
        assert_eq!(t.ratio(), 0.5);
        assert_eq!(c.tally(FieldKind::Singlet, Algorithm::Metropolis).ratio(), 0.0);
        assert_eq!(c.total_accepted(), 10);
    }

    #[test]
    fn single_rank_reduce_is_identity() {
        let mut c = Counters::new();
        c.record(FieldKind::Doublet, Algorithm::Metropolis, 4, 1);
        c.record_exchange(Duration::from_millis(3));
        let r = c.reduce(&NoComm).unwrap();
        assert_eq!(r.tally(FieldKind::Doublet, Algorithm::Metropolis), c.tally(FieldKind::Doublet, Algorithm::Metropolis));
        assert_eq!(r.exchanges(), 1);
    }

    #[test]
    fn reduce_sums_over_ranks() {
        let world = LocalComm::world(3);
        let results: Vec<Counters> = std::thread::scope(|s| {
            let hs: Vec<_> = world
                .iter()
                .map(|comm| {
                    s.spawn(move || {
                        let mut c = Counters::new();
                        c.record(FieldKind::Link, Algorithm::Overrelax, 8, comm.rank() as u64);
                        c.record_exchange(Duration::ZERO);
                        c.reduce(comm).unwrap()
                    })
                })
                .collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for r in &results {
            let t = r.tally(FieldKind::Link, Algorithm::Overrelax);
            assert_eq!((t.proposed, t.accepted), (24, 3));
            assert_eq!(r.exchanges(), 3);
        }
    }
}
