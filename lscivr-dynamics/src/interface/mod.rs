pub use ndarray::prelude::*;
pub use model::HarmonicModel;
pub use structure::{ElectronicStructure, QuantityStatus};

use crate::errors::{DynamicsError, OracleFailure, Result};
use itertools::Itertools;

mod model;
mod structure;

/// Kind of a single request to the electronic structure program.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestKind {
    /// energies of all states
    Energy,
    /// energy and nuclear gradient of one state
    Gradient {
        state: usize,
        excited_states: Option<usize>,
    },
    /// nonadiabatic coupling vector between two states
    Coupling { bra: usize, ket: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct QCRequest {
    pub kind: RequestKind,
    // orbitals of a previous job at the same geometry, used as the initial guess
    pub guess: Option<String>,
}

impl QCRequest {
    pub fn new(kind: RequestKind) -> Self {
        Self { kind, guess: None }
    }
}

/// The quantities that are needed at every geometry to evaluate the equations of motion.
#[derive(Clone, Debug, PartialEq)]
pub struct ElectronicTargets {
    pub n_states: usize,
    pub gradients: Vec<usize>,
    // pairs (i, j) with i < j
    pub couplings: Vec<(usize, usize)>,
    pub excited_states: Option<usize>,
}

impl ElectronicTargets {
    /// Gradients of all states and couplings of all pairs.
    pub fn all(n_states: usize) -> Self {
        Self {
            n_states,
            gradients: (0..n_states).collect(),
            couplings: (0..n_states).tuple_combinations().collect(),
            excited_states: None,
        }
    }

    pub fn new(
        n_states: usize,
        gradients: Vec<usize>,
        couplings: Vec<(usize, usize)>,
        excited_states: Option<usize>,
    ) -> Result<Self> {
        if let Some(state) = gradients.iter().find(|state| **state >= n_states) {
            return Err(DynamicsError::Config(format!(
                "gradient requested for state {} but only {} states are propagated",
                state, n_states
            )));
        }
        let mut pairs: Vec<(usize, usize)> = Vec::with_capacity(couplings.len());
        for (i, j) in couplings.into_iter() {
            if i == j || i >= n_states || j >= n_states {
                return Err(DynamicsError::Config(format!(
                    "invalid coupling pair ({}, {}) for {} states",
                    i, j, n_states
                )));
            }
            pairs.push((i.min(j), i.max(j)));
        }
        Ok(Self {
            n_states,
            gradients: gradients.into_iter().unique().collect(),
            couplings: pairs.into_iter().unique().collect(),
            excited_states,
        })
    }

    /// One gradient job per target state followed by one coupling job per pair.
    pub fn requests(&self) -> Vec<QCRequest> {
        let gradients = self.gradients.iter().map(|state| {
            QCRequest::new(RequestKind::Gradient {
                state: *state,
                excited_states: self.excited_states,
            })
        });
        let couplings = self
            .couplings
            .iter()
            .map(|(bra, ket)| QCRequest::new(RequestKind::Coupling { bra: *bra, ket: *ket }));
        gradients.chain(couplings).collect()
    }
}

/// Trait that provides an interface for a quantum chemistry program.
/// A single request is served by `evaluate`, the complete set of energies,
/// gradients and nonadiabatic couplings at a geometry by `compute_data`.
pub trait QCInterface {
    fn evaluate(
        &mut self,
        coordinates: ArrayView1<f64>,
        request: &QCRequest,
    ) -> std::result::Result<ElectronicStructure, OracleFailure>;

    /// Runs the jobs for all targets one after another. The orbitals of every job
    /// are used as the guess of the next one.
    fn compute_data(
        &mut self,
        coordinates: ArrayView1<f64>,
        targets: &ElectronicTargets,
    ) -> std::result::Result<ElectronicStructure, OracleFailure> {
        let mut data = ElectronicStructure::new(targets.n_states, coordinates.len());
        let mut guess: Option<String> = None;

        for mut request in targets.requests() {
            request.guess = guess.take();
            let result = self.evaluate(coordinates, &request)?;
            guess = result.orbitals.clone();
            data.absorb(result)?;
        }
        // energy-only job if the other jobs did not provide all energies
        if data.status.energies.iter().any(|found| !found) {
            let request = QCRequest {
                kind: RequestKind::Energy,
                guess,
            };
            let result = self.evaluate(coordinates, &request)?;
            data.absorb(result)?;
        }
        data.verify(targets)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_targets_cover_every_pair() {
        let targets = ElectronicTargets::all(3);
        assert_eq!(targets.gradients, vec![0, 1, 2]);
        assert_eq!(targets.couplings, vec![(0, 1), (0, 2), (1, 2)]);
        assert_eq!(targets.requests().len(), 6);
    }

    #[test]
    fn explicit_targets_are_normalized() {
        let targets =
            ElectronicTargets::new(3, vec![1, 1, 0], vec![(2, 0), (0, 2), (1, 2)], Some(4))
                .unwrap();
        assert_eq!(targets.gradients, vec![1, 0]);
        assert_eq!(targets.couplings, vec![(0, 2), (1, 2)]);
        assert_eq!(
            targets.requests()[0].kind,
            RequestKind::Gradient {
                state: 1,
                excited_states: Some(4)
            }
        );
    }

    #[test]
    fn invalid_targets_are_rejected() {
        assert!(ElectronicTargets::new(2, vec![2], vec![], None).is_err());
        assert!(ElectronicTargets::new(2, vec![], vec![(1, 1)], None).is_err());
        assert!(ElectronicTargets::new(2, vec![], vec![(0, 3)], None).is_err());
    }

    /// Oracle that serves gradients only and records the guesses it was given
    struct GuessRecorder {
        guesses: Vec<Option<String>>,
        kinds: Vec<RequestKind>,
    }

    impl QCInterface for GuessRecorder {
        fn evaluate(
            &mut self,
            coordinates: ArrayView1<f64>,
            request: &QCRequest,
        ) -> std::result::Result<ElectronicStructure, OracleFailure> {
            self.guesses.push(request.guess.clone());
            self.kinds.push(request.kind.clone());
            let mut result = ElectronicStructure::new(3, coordinates.len());
            match request.kind {
                RequestKind::Gradient { state, .. } => {
                    result.set_energy(state, state as f64);
                    result.set_gradient(state, coordinates);
                }
                RequestKind::Energy => {
                    for state in 0..3 {
                        result.set_energy(state, state as f64);
                    }
                }
                RequestKind::Coupling { .. } => {}
            }
            result.orbitals = Some(format!("orbitals_{}", self.guesses.len()));
            Ok(result)
        }
    }

    #[test]
    fn jobs_are_chained_and_missing_energies_requested() {
        let mut oracle = GuessRecorder {
            guesses: Vec::new(),
            kinds: Vec::new(),
        };
        let targets = ElectronicTargets::new(3, vec![0, 2], vec![], None).unwrap();
        let coordinates: Array1<f64> = array![0.1, 0.2, 0.3];
        let data = oracle
            .compute_data(coordinates.view(), &targets)
            .unwrap();

        assert_eq!(
            oracle.guesses,
            vec![
                None,
                Some(String::from("orbitals_1")),
                Some(String::from("orbitals_2"))
            ]
        );
        assert_eq!(oracle.kinds[2], RequestKind::Energy);
        assert_eq!(data.energies, array![0.0, 1.0, 2.0]);
        assert_eq!(data.orbitals, Some(String::from("orbitals_3")));
    }

    #[test]
    fn missing_coupling_is_reported() {
        let mut oracle = GuessRecorder {
            guesses: Vec::new(),
            kinds: Vec::new(),
        };
        let targets = ElectronicTargets::all(3);
        let coordinates: Array1<f64> = array![0.1, 0.2, 0.3];
        let failure = oracle.compute_data(coordinates.view(), &targets).unwrap_err();
        assert_eq!(failure, OracleFailure::CouplingMissing(0, 1));
    }
}
