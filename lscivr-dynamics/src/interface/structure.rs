use crate::errors::OracleFailure;
use crate::interface::ElectronicTargets;
use ndarray::prelude::*;

/// Records which quantities of an [ElectronicStructure] were provided by the program.
#[derive(Clone, Debug, PartialEq)]
pub struct QuantityStatus {
    pub energies: Vec<bool>,
    pub gradients: Vec<bool>,
    // pairs (i, j) with i < j
    pub couplings: Vec<(usize, usize)>,
}

/// Energies, gradients and nonadiabatic couplings of all electronic states at one geometry.
/// The couplings are antisymmetric, `couplings[[i, j, ..]] = -couplings[[j, i, ..]]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ElectronicStructure {
    pub energies: Array1<f64>,
    pub gradients: Array2<f64>,
    pub couplings: Array3<f64>,
    pub status: QuantityStatus,
    // orbital file or orbital block that can serve as guess for the next job
    pub orbitals: Option<String>,
}

impl ElectronicStructure {
    pub fn new(n_states: usize, n_nuclear: usize) -> Self {
        Self {
            energies: Array1::zeros(n_states),
            gradients: Array2::zeros((n_states, n_nuclear)),
            couplings: Array3::zeros((n_states, n_states, n_nuclear)),
            status: QuantityStatus {
                energies: vec![false; n_states],
                gradients: vec![false; n_states],
                couplings: Vec::new(),
            },
            orbitals: None,
        }
    }

    pub fn n_states(&self) -> usize {
        self.energies.len()
    }

    pub fn n_nuclear(&self) -> usize {
        self.gradients.ncols()
    }

    pub fn set_energy(&mut self, state: usize, energy: f64) {
        self.energies[state] = energy;
        self.status.energies[state] = true;
    }

    pub fn set_gradient(&mut self, state: usize, gradient: ArrayView1<f64>) {
        self.gradients.slice_mut(s![state, ..]).assign(&gradient);
        self.status.gradients[state] = true;
    }

    /// Stores the coupling vector <bra|d/dR|ket> together with its antisymmetric partner.
    pub fn set_coupling(&mut self, bra: usize, ket: usize, coupling: ArrayView1<f64>) {
        if bra == ket {
            return;
        }
        self.couplings.slice_mut(s![bra, ket, ..]).assign(&coupling);
        self.couplings
            .slice_mut(s![ket, bra, ..])
            .assign(&coupling.mapv(|value| -value));
        let pair: (usize, usize) = (bra.min(ket), bra.max(ket));
        if !self.status.couplings.contains(&pair) {
            self.status.couplings.push(pair);
        }
    }

    pub fn has_coupling(&self, i: usize, j: usize) -> bool {
        self.status.couplings.contains(&(i.min(j), i.max(j)))
    }

    /// Takes over every quantity that was found in `other`.
    pub fn absorb(&mut self, other: ElectronicStructure) -> Result<(), OracleFailure> {
        if other.n_states() != self.n_states() || other.n_nuclear() != self.n_nuclear() {
            return Err(OracleFailure::Unavailable(format!(
                "result for {} states and {} nuclear coordinates does not match {} states and {} coordinates",
                other.n_states(),
                other.n_nuclear(),
                self.n_states(),
                self.n_nuclear()
            )));
        }
        for state in 0..self.n_states() {
            if other.status.energies[state] {
                self.set_energy(state, other.energies[state]);
            }
            if other.status.gradients[state] {
                self.set_gradient(state, other.gradients.row(state));
            }
        }
        for (i, j) in other.status.couplings.iter() {
            self.set_coupling(*i, *j, other.couplings.slice(s![*i, *j, ..]));
        }
        if other.orbitals.is_some() {
            self.orbitals = other.orbitals;
        }
        Ok(())
    }

    /// Checks that all requested quantities are present.
    pub fn verify(&self, targets: &ElectronicTargets) -> Result<(), OracleFailure> {
        for state in targets.gradients.iter() {
            if !self.status.gradients.get(*state).copied().unwrap_or(false) {
                return Err(OracleFailure::GradientMissing(*state));
            }
        }
        for (i, j) in targets.couplings.iter() {
            if !self.has_coupling(*i, *j) {
                return Err(OracleFailure::CouplingMissing(*i, *j));
            }
        }
        match self.status.energies.iter().position(|found| !found) {
            Some(state) => Err(OracleFailure::EnergyMissing(state)),
            None => Ok(()),
        }
    }
}
