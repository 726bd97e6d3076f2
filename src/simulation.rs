//! Simulation driver.
//!
//! [`Lattice`] is the immutable per-rank context (layout plus negotiated
//! comlists), built once and passed to every collective operation.
//! [`Simulation`] owns it together with the communicator, the fields, the
//! scheduler and the counters.

use crate::algs::comlist::Comlists;
use crate::algs::communicator::Communicator;
use crate::config::{LatticeConfig, SimulationConfig};
use crate::data::field::FieldKind;
use crate::data::field_set::FieldSet;
use crate::lattice_error::LatticeError;
use crate::physics::observables::{LocalSample, Measurement, measure, measure_local};
use crate::physics::smearing::smear_fields;
use crate::topology::geometry::{GlobalLattice, Parity};
use crate::topology::layout::Layout;
use crate::topology::slicing::Slicing;
use crate::update::counters::Counters;
use crate::update::kernel::SiteContext;
use crate::update::scheduler::{Scheduler, SweepEnv, VisitOrder};
use std::collections::BTreeMap;

/// Layout and comlists of one rank.
#[derive(Clone, Debug)]
pub struct Lattice {
    layout: Layout,
    comlists: Comlists,
}

impl Lattice {
    /// Slice the lattice over the ranks of `comm` and negotiate comlists.
    ///
    /// Collective.
    pub fn new<C: Communicator>(config: &LatticeConfig, comm: &C) -> Result<Self, LatticeError> {
        let global = GlobalLattice::new(config.extents.clone())?;
        let slicing = Slicing::resolve(&global, config.nslices.as_deref(), comm.size())?;
        let layout = Layout::new(global, slicing, comm.rank())?;
        Self::from_layout(layout, comm)
    }

    /// Negotiate comlists for an existing layout. Collective.
    pub fn from_layout<C: Communicator>(layout: Layout, comm: &C) -> Result<Self, LatticeError> {
        let comlists = Comlists::negotiate(&layout, comm)?;
        log::info!(
            "rank {}/{}: {} owned sites, {} halo slots, {} peers",
            layout.rank(),
            layout.size(),
            layout.sites(),
            layout.halos(),
            comlists.links().len()
        );
        Ok(Self { layout, comlists })
    }

    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[inline]
    pub fn comlists(&self) -> &Comlists {
        &self.comlists
    }
}

/// A running Markov chain on one rank.
pub struct Simulation<C: Communicator> {
    config: SimulationConfig,
    lattice: Lattice,
    comm: C,
    fields: FieldSet,
    scheduler: Scheduler,
    counters: Counters,
    sweeps: u64,
}

impl<C: Communicator> Simulation<C> {
    /// Validate `config`, build the lattice context and initialise the fields.
    ///
    /// Collective: every rank of `comm` must call it with the same config.
    pub fn new(config: SimulationConfig, comm: C) -> Result<Self, LatticeError> {
        config.validate()?;
        let lattice = Lattice::new(&config.lattice, &comm)?;
        let layout = lattice.layout();
        let mut fields = FieldSet::new(layout, &config.fields);
        fields.initialize(layout, &config.init, config.seed);
        let scheduler = Scheduler::from_config(&config, &fields, layout.dim())?;
        if comm.rank() == 0 {
            log::info!(
                "lattice {:?} on {} ranks (nslices {:?}), {} update steps, seed {}",
                layout.lattice().extents(),
                layout.size(),
                layout.slicing().nslices(),
                scheduler.steps(),
                config.seed
            );
        }
        Ok(Self {
            config,
            lattice,
            comm,
            fields,
            scheduler,
            counters: Counters::new(),
            sweeps: 0,
        })
    }

    /// One full sweep over all update steps. Collective.
    pub fn sweep(&mut self) -> Result<(), LatticeError> {
        let env = SweepEnv {
            layout: &self.lattice.layout,
            comlists: &self.lattice.comlists,
            comm: &self.comm,
            params: &self.config.action,
        };
        self.scheduler.sweep(env, &mut self.fields, &mut self.counters)?;
        self.sweeps += 1;
        Ok(())
    }

    /// A single checkerboard pass of update step `step`. Collective.
    pub fn pass(&mut self, step: usize, comp: usize, parity: Parity) -> Result<usize, LatticeError> {
        let env = SweepEnv {
            layout: &self.lattice.layout,
            comlists: &self.lattice.comlists,
            comm: &self.comm,
            params: &self.config.action,
        };
        self.scheduler
            .pass_once(env, &mut self.fields, &mut self.counters, step, comp, parity)
    }

    /// Bring every halo up to date. Collective.
    pub fn flush(&mut self) -> Result<(), LatticeError> {
        let env = SweepEnv {
            layout: &self.lattice.layout,
            comlists: &self.lattice.comlists,
            comm: &self.comm,
            params: &self.config.action,
        };
        self.scheduler.flush(env, &mut self.fields, &mut self.counters)
    }

    /// Flush halos and measure. Collective.
    pub fn measure(&mut self) -> Result<Measurement, LatticeError> {
        self.flush()?;
        let ctx = SiteContext::new(&self.lattice.layout, &self.fields, &self.config.action);
        measure(&ctx, &self.lattice.comlists, &self.comm, self.sweeps)
    }

    /// Flush halos and collect per-site observables on rank 0. Collective.
    pub fn measure_local(&mut self) -> Result<Option<Vec<LocalSample>>, LatticeError> {
        self.flush()?;
        let ctx = SiteContext::new(&self.lattice.layout, &self.fields, &self.config.action);
        measure_local(&ctx, &self.lattice.comlists, &self.comm)
    }

    /// Flush halos and return the fields smeared for blocking along
    /// `block_dirs`; the chain's own fields are untouched. Collective.
    pub fn smeared(&mut self, block_dirs: &[bool]) -> Result<FieldSet, LatticeError> {
        self.flush()?;
        let ctx = SiteContext::new(&self.lattice.layout, &self.fields, &self.config.action);
        smear_fields(&ctx, &self.lattice.comlists, &self.comm, block_dirs)
    }

    /// Run `iterations` sweeps, handing a measurement to `sink` every
    /// `interval` sweeps (never when `interval` is 0). Collective.
    pub fn run<F>(&mut self, iterations: u64, interval: u64, mut sink: F) -> Result<(), LatticeError>
    where
        F: FnMut(&Measurement) -> Result<(), LatticeError>,
    {
        for it in 1..=iterations {
            self.sweep()?;
            if interval > 0 && it % interval == 0 {
                let m = self.measure()?;
                sink(&m)?;
                if self.comm.rank() == 0 {
                    log::info!("sweep {}: action {:.8} plaquette {:.8}", m.sweep, m.action, m.plaquette);
                }
            }
        }
        Ok(())
    }

    /// Owned values of `kind`, all components concatenated, keyed by global
    /// site index.
    pub fn gather_field(&self, kind: FieldKind) -> Result<BTreeMap<u64, Vec<f64>>, LatticeError> {
        let field = self.fields.require(kind)?;
        let layout = self.lattice.layout();
        let mut out = BTreeMap::new();
        for i in 0..layout.sites() {
            let row: Vec<f64> = (0..field.comps())
                .flat_map(|c| field.get(i, c).iter().copied())
                .collect();
            out.insert(layout.global_index(i), row);
        }
        Ok(out)
    }

    /// Replace every owned value of `kind` through `f(global, comp, values)`.
    /// All halos are considered stale afterwards.
    pub fn set_owned<F>(&mut self, kind: FieldKind, mut f: F) -> Result<(), LatticeError>
    where
        F: FnMut(u64, usize, &mut [f64]),
    {
        let layout = &self.lattice.layout;
        let field = self.fields.require_mut(kind)?;
        for i in 0..layout.sites() {
            let g = layout.global_index(i);
            for c in 0..field.comps() {
                f(g, c, field.get_mut(i, c));
            }
        }
        self.scheduler.mark_all_stale(&self.fields, layout.dim());
        Ok(())
    }

    /// Rank-local counters.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Counters summed over all ranks. Collective.
    pub fn reduced_counters(&self) -> Result<Counters, LatticeError> {
        self.counters.reduce(&self.comm)
    }

    pub fn set_visit_order(&mut self, order: VisitOrder) {
        self.scheduler.set_visit_order(order);
    }

    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }
}
