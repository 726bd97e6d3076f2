//! Checkerboard update scheduler.
//!
//! One sweep runs every configured update step in order; a step is
//! `repeat × components × {Even, Odd}` passes. A pass over parity `P`:
//!
//! 1. refreshes the halos the kernel reads that changed since they were last
//!    exchanged (tracked per field kind, component and parity);
//! 2. evaluates the kernel on every owned site of parity `P` against the
//!    frozen field state, in parallel with the `rayon` feature;
//! 3. commits the accepted values and marks `(kind, comp, P)` stale.
//!
//! Every rank walks the same steps and marks the same keys stale whether or
//! not it accepted anything, so the collective exchanges stay matched.

use crate::algs::comlist::Comlists;
use crate::algs::communicator::Communicator;
use crate::algs::halo;
use crate::config::{ActionParams, SimulationConfig};
use crate::data::field::{FieldKind, SiteValue};
use crate::data::field_set::FieldSet;
use crate::lattice_error::LatticeError;
use crate::topology::geometry::Parity;
use crate::topology::layout::Layout;
use crate::update::counters::Counters;
use crate::update::kernel::{Algorithm, LocalUpdate, SiteContext, make_kernel};
use crate::update::rng::SiteRng;
use hashbrown::HashSet;
use std::time::Instant;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Halo bookkeeping key: one field component restricted to one parity.
pub type HaloKey = (FieldKind, usize, Parity);

/// Order in which the sites of one pass are visited.
///
/// Only affects scheduling: results are identical for both orders.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum VisitOrder {
    #[default]
    Forward,
    Reverse,
}

/// Everything a pass reads but never mutates.
pub struct SweepEnv<'a, C: Communicator> {
    pub layout: &'a Layout,
    pub comlists: &'a Comlists,
    pub comm: &'a C,
    pub params: &'a ActionParams,
}

impl<C: Communicator> Clone for SweepEnv<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: Communicator> Copy for SweepEnv<'_, C> {}

struct Step {
    kernel: Box<dyn LocalUpdate>,
    repeat: usize,
}

pub struct Scheduler {
    steps: Vec<Step>,
    stale: HashSet<HaloKey>,
    seed: u64,
    pass: u64,
    order: VisitOrder,
}

impl Scheduler {
    /// Kernels for the update steps of `config`, in configuration order.
    ///
    /// All halos start out stale.
    pub fn from_config(config: &SimulationConfig, fields: &FieldSet, dim: usize) -> Result<Self, LatticeError> {
        let mut s = Self::empty(config.seed);
        for step in &config.updates {
            if !fields.is_enabled(step.field) {
                return Err(LatticeError::FieldNotEnabled(step.field));
            }
            let kernel = make_kernel(step.field, step.algorithm, config.metropolis.for_kind(step.field))?;
            s.push(kernel, step.repeat);
        }
        if config.fields.triplet
            && config
                .updates
                .iter()
                .any(|u| u.field == FieldKind::Link && u.algorithm != Algorithm::Metropolis)
        {
            log::warn!("link heatbath/overrelaxation with a triplet: the triplet term is only Metropolis-corrected");
        }
        s.mark_all_stale(fields, dim);
        Ok(s)
    }

    /// Scheduler without steps; add them with [`Scheduler::push`].
    pub fn empty(seed: u64) -> Self {
        Self {
            steps: Vec::new(),
            stale: HashSet::new(),
            seed,
            pass: 0,
            order: VisitOrder::Forward,
        }
    }

    pub fn push(&mut self, kernel: Box<dyn LocalUpdate>, repeat: usize) {
        self.steps.push(Step { kernel, repeat });
    }

    pub fn set_visit_order(&mut self, order: VisitOrder) {
        self.order = order;
    }

    pub fn steps(&self) -> usize {
        self.steps.len()
    }

    /// Passes run so far; also the stream tag of the next pass.
    pub fn pass_count(&self) -> u64 {
        self.pass
    }

    pub fn is_stale(&self, key: HaloKey) -> bool {
        self.stale.contains(&key)
    }

    /// Treat every halo of every enabled field as out of date.
    pub fn mark_all_stale(&mut self, fields: &FieldSet, dim: usize) {
        for kind in fields.enabled_kinds() {
            for comp in 0..kind.components(dim) {
                for parity in Parity::ALL {
                    self.stale.insert((kind, comp, parity));
                }
            }
        }
    }

    /// One full sweep over all steps.
    pub fn sweep<C: Communicator>(
        &mut self,
        env: SweepEnv<'_, C>,
        fields: &mut FieldSet,
        counters: &mut Counters,
    ) -> Result<(), LatticeError> {
        let dim = env.layout.dim();
        for step in 0..self.steps.len() {
            let kind = self.steps[step].kernel.kind();
            for _ in 0..self.steps[step].repeat {
                for comp in 0..kind.components(dim) {
                    for parity in Parity::ALL {
                        self.pass_once(env, fields, counters, step, comp, parity)?;
                    }
                }
            }
        }
        counters.record_sweep();
        Ok(())
    }

    /// A single checkerboard pass of step `step` over component `comp` and
    /// the owned sites of `parity`. Returns the number of accepted updates on
    /// this rank.
    pub fn pass_once<C: Communicator>(
        &mut self,
        env: SweepEnv<'_, C>,
        fields: &mut FieldSet,
        counters: &mut Counters,
        step: usize,
        comp: usize,
        parity: Parity,
    ) -> Result<usize, LatticeError> {
        let kernel = self
            .steps
            .get(step)
            .map(|s| &*s.kernel)
            .ok_or_else(|| LatticeError::InvalidParameter(format!("no update step {step}")))?;
        let kind = kernel.kind();
        let writes = (kind, comp, parity);

        // 1) refresh what the kernel reads
        let dim = env.layout.dim();
        for &read in kernel.reads() {
            let Some(field) = fields.get_mut(read) else {
                continue;
            };
            for c in 0..read.components(dim) {
                for p in Parity::ALL {
                    let key = (read, c, p);
                    // same-parity values of the written component are never read
                    if key == writes || !self.stale.contains(&key) {
                        continue;
                    }
                    let t0 = Instant::now();
                    halo::exchange(env.comlists, env.comm, field, c, p)?;
                    counters.record_exchange(t0.elapsed());
                    self.stale.remove(&key);
                }
            }
        }

        // 2) propose against the frozen state
        let proposals = {
            let ctx = SiteContext::new(env.layout, fields, env.params);
            propose_all(kernel, &ctx, comp, parity, self.seed, self.pass, self.order)?
        };

        // 3) commit
        let field = fields.require_mut(kind)?;
        for (site, value) in &proposals {
            field.set(*site, comp, value);
        }
        let visited = env.layout.parity_sites(parity).len();
        counters.record(kind, kernel.algorithm(), visited as u64, proposals.len() as u64);
        self.stale.insert(writes);
        self.pass += 1;
        log::trace!(
            "pass {}: {kind:?}/{:?}[{comp}] {parity:?} accepted {}/{visited}",
            self.pass - 1,
            kernel.algorithm(),
            proposals.len()
        );
        Ok(proposals.len())
    }

    /// Exchange every stale halo, leaving all fields fully consistent.
    ///
    /// Collective; run before measurements.
    pub fn flush<C: Communicator>(
        &mut self,
        env: SweepEnv<'_, C>,
        fields: &mut FieldSet,
        counters: &mut Counters,
    ) -> Result<(), LatticeError> {
        let mut keys: Vec<HaloKey> = self.stale.iter().copied().collect();
        // the set iterates in hash order; exchanges must match across ranks
        keys.sort_unstable();
        for key @ (kind, comp, parity) in keys {
            let field = fields.require_mut(kind)?;
            let t0 = Instant::now();
            halo::exchange(env.comlists, env.comm, field, comp, parity)?;
            counters.record_exchange(t0.elapsed());
            self.stale.remove(&key);
        }
        Ok(())
    }
}

fn propose_site(
    kernel: &dyn LocalUpdate,
    ctx: &SiteContext<'_>,
    site: usize,
    comp: usize,
    seed: u64,
    pass: u64,
) -> Result<Option<(usize, SiteValue)>, LatticeError> {
    let mut rng = SiteRng::for_site(seed, pass, ctx.layout.global_index(site));
    Ok(kernel.propose(ctx, site, comp, &mut rng)?.map(|v| (site, v)))
}

#[cfg(feature = "rayon")]
fn propose_all(
    kernel: &dyn LocalUpdate,
    ctx: &SiteContext<'_>,
    comp: usize,
    parity: Parity,
    seed: u64,
    pass: u64,
    order: VisitOrder,
) -> Result<Vec<(usize, SiteValue)>, LatticeError> {
    let sites = ctx.layout.parity_sites(parity);
    let run = |&site: &usize| propose_site(kernel, ctx, site, comp, seed, pass);
    let out: Vec<Option<(usize, SiteValue)>> = match order {
        VisitOrder::Forward => sites.par_iter().map(run).collect::<Result<_, _>>()?,
        VisitOrder::Reverse => sites.par_iter().rev().map(run).collect::<Result<_, _>>()?,
    };
    Ok(out.into_iter().flatten().collect())
}

#[cfg(not(feature = "rayon"))]
fn propose_all(
    kernel: &dyn LocalUpdate,
    ctx: &SiteContext<'_>,
    comp: usize,
    parity: Parity,
    seed: u64,
    pass: u64,
    order: VisitOrder,
) -> Result<Vec<(usize, SiteValue)>, LatticeError> {
    let sites = ctx.layout.parity_sites(parity);
    let run = |&site: &usize| propose_site(kernel, ctx, site, comp, seed, pass);
    let out: Vec<Option<(usize, SiteValue)>> = match order {
        VisitOrder::Forward => sites.iter().map(run).collect::<Result<_, _>>()?,
        VisitOrder::Reverse => sites.iter().rev().map(run).collect::<Result<_, _>>()?,
    };
    Ok(out.into_iter().flatten().collect())
}
