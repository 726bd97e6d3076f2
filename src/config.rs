//! Run configuration.
//!
//! [`SimulationConfig`] is plain serde data. Reading it from a file is up to
//! the caller; [`SimulationConfig::validate`] must pass before a
//! [`Simulation`](crate::simulation::Simulation) is built from it.

use crate::data::field::FieldKind;
use crate::lattice_error::LatticeError;
use crate::topology::geometry::GlobalLattice;
use crate::update::kernel::Algorithm;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Global extents and optional explicit slicing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatticeConfig {
    pub extents: Vec<usize>,
    /// Slices per axis; chosen automatically when absent.
    #[serde(default)]
    pub nslices: Option<Vec<usize>>,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            extents: vec![8, 8, 8],
            nslices: None,
        }
    }
}

/// Scalar fields present in the run. Links are always present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldsConfig {
    pub doublet: bool,
    pub triplet: bool,
    pub singlet: bool,
    /// U(1) hypercharge links; both doublets couple to them.
    pub u1link: bool,
    /// Second doublet of the two-Higgs-doublet model.
    pub doublet2: bool,
}

impl FieldsConfig {
    pub fn is_enabled(&self, kind: FieldKind) -> bool {
        match kind {
            FieldKind::Link => true,
            FieldKind::Doublet => self.doublet,
            FieldKind::Triplet => self.triplet,
            FieldKind::Singlet => self.singlet,
            FieldKind::U1Link => self.u1link,
            FieldKind::Doublet2 => self.doublet2,
        }
    }
}

/// Couplings of the lattice action.
///
/// Complex couplings of the two-doublet potential are written `[re, im]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionParams {
    pub betasu2: f64,
    pub betau1: f64,
    pub msq_phi: f64,
    /// `λ₁` of the two-doublet potential.
    pub lambda_phi: f64,
    pub msq_phi2: f64,
    pub m12sq: Complex64,
    pub lam2: f64,
    pub lam3: f64,
    pub lam4: f64,
    pub lam5: Complex64,
    pub lam6: Complex64,
    pub lam7: Complex64,
    pub msq_triplet: f64,
    pub b4: f64,
    /// Doublet-triplet portal.
    pub a2: f64,
    pub b1_s: f64,
    pub msq_s: f64,
    pub b3_s: f64,
    pub b4_s: f64,
    /// Singlet-doublet portals `S |φ|²` and `S² |φ|²`.
    pub a1_s: f64,
    pub a2_s: f64,
}

impl Default for ActionParams {
    fn default() -> Self {
        Self {
            betasu2: 2.0,
            betau1: 0.0,
            msq_phi: 0.0,
            lambda_phi: 0.0,
            msq_phi2: 0.0,
            m12sq: Complex64::new(0.0, 0.0),
            lam2: 0.0,
            lam3: 0.0,
            lam4: 0.0,
            lam5: Complex64::new(0.0, 0.0),
            lam6: Complex64::new(0.0, 0.0),
            lam7: Complex64::new(0.0, 0.0),
            msq_triplet: 0.0,
            b4: 0.0,
            a2: 0.0,
            b1_s: 0.0,
            msq_s: 0.0,
            b3_s: 0.0,
            b4_s: 0.0,
            a1_s: 0.0,
            a2_s: 0.0,
        }
    }
}

impl ActionParams {
    fn named(&self) -> [(&'static str, f64); 25] {
        [
            ("betasu2", self.betasu2),
            ("betau1", self.betau1),
            ("msq_phi", self.msq_phi),
            ("lambda_phi", self.lambda_phi),
            ("msq_phi2", self.msq_phi2),
            ("m12sq.re", self.m12sq.re),
            ("m12sq.im", self.m12sq.im),
            ("lam2", self.lam2),
            ("lam3", self.lam3),
            ("lam4", self.lam4),
            ("lam5.re", self.lam5.re),
            ("lam5.im", self.lam5.im),
            ("lam6.re", self.lam6.re),
            ("lam6.im", self.lam6.im),
            ("lam7.re", self.lam7.re),
            ("lam7.im", self.lam7.im),
            ("msq_triplet", self.msq_triplet),
            ("b4", self.b4),
            ("a2", self.a2),
            ("b1_s", self.b1_s),
            ("msq_s", self.msq_s),
            ("b3_s", self.b3_s),
            ("b4_s", self.b4_s),
            ("a1_s", self.a1_s),
            ("a2_s", self.a2_s),
        ]
    }
}

/// Initial field values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitConfig {
    /// Haar-random links and uniform U(1) angles instead of the identity.
    pub hot_start: bool,
    pub phi0: f64,
    pub phi2_0: f64,
    pub sigma0: f64,
    pub singlet0: f64,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            hot_start: false,
            phi0: 1.0,
            phi2_0: 1.0,
            sigma0: 1.0,
            singlet0: 0.0,
        }
    }
}

/// Proposal widths of the Metropolis kernels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetropolisWidths {
    pub link: f64,
    pub doublet: f64,
    pub triplet: f64,
    pub singlet: f64,
    /// Half-width of the angle shift, in radians.
    pub u1link: f64,
    pub doublet2: f64,
}

impl Default for MetropolisWidths {
    fn default() -> Self {
        Self {
            link: 0.5,
            doublet: 0.5,
            triplet: 0.5,
            singlet: 0.5,
            u1link: 0.5,
            doublet2: 0.5,
        }
    }
}

impl MetropolisWidths {
    pub fn for_kind(&self, kind: FieldKind) -> f64 {
        match kind {
            FieldKind::Link => self.link,
            FieldKind::Doublet => self.doublet,
            FieldKind::Triplet => self.triplet,
            FieldKind::Singlet => self.singlet,
            FieldKind::U1Link => self.u1link,
            FieldKind::Doublet2 => self.doublet2,
        }
    }
}

/// One entry of the in-sweep update order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStep {
    pub field: FieldKind,
    pub algorithm: Algorithm,
    #[serde(default = "one")]
    pub repeat: usize,
}

fn one() -> usize {
    1
}

impl UpdateStep {
    pub fn new(field: FieldKind, algorithm: Algorithm, repeat: usize) -> Self {
        Self {
            field,
            algorithm,
            repeat,
        }
    }
}

/// Complete, validated description of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub lattice: LatticeConfig,
    pub fields: FieldsConfig,
    pub action: ActionParams,
    pub init: InitConfig,
    /// Update steps of one sweep, executed in this order.
    pub updates: Vec<UpdateStep>,
    pub metropolis: MetropolisWidths,
    pub seed: u64,
    /// Receive timeout of in-process communicators, in milliseconds.
    pub comm_timeout_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            lattice: LatticeConfig::default(),
            fields: FieldsConfig::default(),
            action: ActionParams::default(),
            init: InitConfig::default(),
            updates: vec![
                UpdateStep::new(FieldKind::Link, Algorithm::Heatbath, 1),
                UpdateStep::new(FieldKind::Link, Algorithm::Overrelax, 2),
            ],
            metropolis: MetropolisWidths::default(),
            seed: 1,
            comm_timeout_ms: 60_000,
        }
    }
}

impl SimulationConfig {
    pub fn comm_timeout(&self) -> Duration {
        Duration::from_millis(self.comm_timeout_ms)
    }

    /// Check every value; the first problem found is returned.
    pub fn validate(&self) -> Result<(), LatticeError> {
        let lattice = GlobalLattice::new(self.lattice.extents.clone())?;
        if let Some(n) = &self.lattice.nslices {
            if n.len() != lattice.dim() {
                return Err(LatticeError::InvalidParameter(format!(
                    "nslices has {} entries for a {}-dimensional lattice",
                    n.len(),
                    lattice.dim()
                )));
            }
        }
        for (name, v) in self.action.named() {
            if !v.is_finite() {
                return Err(LatticeError::InvalidParameter(format!("{name} = {v} is not finite")));
            }
        }
        for (name, beta) in [("betasu2", self.action.betasu2), ("betau1", self.action.betau1)] {
            if beta < 0.0 {
                return Err(LatticeError::InvalidParameter(format!(
                    "{name} = {beta} must be non-negative"
                )));
            }
        }
        for kind in FieldKind::ALL {
            let w = self.metropolis.for_kind(kind);
            if !(w.is_finite() && w > 0.0) {
                return Err(LatticeError::InvalidParameter(format!(
                    "metropolis width for {kind:?} must be positive, got {w}"
                )));
            }
        }
        if self.updates.is_empty() {
            return Err(LatticeError::InvalidParameter("no update steps configured".into()));
        }
        for step in &self.updates {
            if !self.fields.is_enabled(step.field) {
                return Err(LatticeError::FieldNotEnabled(step.field));
            }
            if !step.algorithm.supports(step.field) {
                return Err(LatticeError::UnsupportedAlgorithm {
                    kind: step.field,
                    algorithm: step.algorithm,
                });
            }
            if step.repeat == 0 {
                return Err(LatticeError::InvalidParameter(format!(
                    "update step {:?}/{:?} has repeat 0",
                    step.field, step.algorithm
                )));
            }
        }
        if self.comm_timeout_ms == 0 {
            return Err(LatticeError::InvalidParameter("comm_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        SimulationConfig::default().validate().unwrap();
    }

    #[test]
    fn disabled_field_in_updates_is_rejected() {
        let mut c = SimulationConfig::default();
        c.updates.push(UpdateStep::new(FieldKind::Doublet, Algorithm::Metropolis, 1));
        assert!(matches!(
            c.validate(),
            Err(LatticeError::FieldNotEnabled(FieldKind::Doublet))
        ));
        c.fields.doublet = true;
        c.validate().unwrap();
    }

    #[test]
    fn singlet_heatbath_is_unsupported() {
        let mut c = SimulationConfig::default();
        c.fields.singlet = true;
        c.updates = vec![UpdateStep::new(FieldKind::Singlet, Algorithm::Heatbath, 1)];
        let err = c.validate().unwrap_err();
        assert!(matches!(err, LatticeError::UnsupportedAlgorithm { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let mut c = SimulationConfig::default();
        c.action.lambda_phi = f64::NAN;
        assert!(c.validate().is_err());
        let mut c = SimulationConfig::default();
        c.metropolis.link = 0.0;
        assert!(c.validate().is_err());
        let mut c = SimulationConfig::default();
        c.lattice.extents = vec![4, 5];
        assert!(matches!(c.validate(), Err(LatticeError::InvalidExtent { axis: 1, .. })));
    }

    #[test]
    fn two_doublet_couplings_parse_as_pairs() {
        let c: SimulationConfig = serde_json::from_str(
            r#"{
                "fields": { "doublet": true, "doublet2": true, "u1link": true },
                "action": { "betau1": 1.5, "m12sq": [0.1, -0.2], "lam5": [0.3, 0.0] },
                "updates": [
                    { "field": "u1link", "algorithm": "overrelax" },
                    { "field": "doublet2", "algorithm": "metropolis" }
                ]
            }"#,
        )
        .unwrap();
        c.validate().unwrap();
        assert_eq!(c.action.m12sq, Complex64::new(0.1, -0.2));
        assert_eq!(c.action.lam7, Complex64::new(0.0, 0.0));
        assert_eq!(c.init.phi2_0, 1.0);

        let mut bad = c.clone();
        bad.action.lam6.im = f64::INFINITY;
        assert!(bad.validate().unwrap_err().to_string().contains("lam6.im"));
        let mut bad = c;
        bad.action.betau1 = -1.0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let c: SimulationConfig = serde_json::from_str(
            r#"{
                "lattice": { "extents": [4, 4, 4], "nslices": [2, 1, 1] },
                "fields": { "doublet": true },
                "action": { "betasu2": 8.0, "lambda_phi": 0.1 },
                "updates": [
                    { "field": "link", "algorithm": "heatbath" },
                    { "field": "doublet", "algorithm": "overrelax", "repeat": 3 }
                ],
                "seed": 42
            }"#,
        )
        .unwrap();
        c.validate().unwrap();
        assert_eq!(c.updates[0].repeat, 1);
        assert_eq!(c.updates[1].repeat, 3);
        assert_eq!(c.action.msq_phi, 0.0);
        assert_eq!(c.metropolis, MetropolisWidths::default());
        let back: SimulationConfig =
            serde_json::from_str(&serde_json::to_string(&c).unwrap()).unwrap();
        assert_eq!(back, c);
    }
}
