use crate::errors::OracleFailure;
use crate::interface::{ElectronicStructure, QCInterface, QCRequest, RequestKind};
use ndarray::prelude::*;

/// Analytic model of shifted harmonic potentials, E_i(x) = k/2 |x|^2 + offset_i,
/// with a coupling vector that has the same value in every component.
#[derive(Clone, Debug)]
pub struct HarmonicModel {
    pub force_constant: f64,
    pub offsets: Array1<f64>,
    pub coupling: f64,
    // number of evaluated requests
    pub n_calls: usize,
}

impl HarmonicModel {
    pub fn new(force_constant: f64, offsets: Vec<f64>, coupling: f64) -> Self {
        Self {
            force_constant,
            offsets: Array1::from(offsets),
            coupling,
            n_calls: 0,
        }
    }

    /// Equidistant states separated by `energy_gap`.
    pub fn equidistant(n_states: usize, force_constant: f64, energy_gap: f64, coupling: f64) -> Self {
        let offsets: Vec<f64> = (0..n_states).map(|i| i as f64 * energy_gap).collect();
        Self::new(force_constant, offsets, coupling)
    }

    fn energy(&self, coordinates: ArrayView1<f64>, state: usize) -> f64 {
        0.5 * self.force_constant * coordinates.dot(&coordinates) + self.offsets[state]
    }
}

impl QCInterface for HarmonicModel {
    fn evaluate(
        &mut self,
        coordinates: ArrayView1<f64>,
        request: &QCRequest,
    ) -> Result<ElectronicStructure, OracleFailure> {
        self.n_calls += 1;
        let n_states: usize = self.offsets.len();
        let mut result = ElectronicStructure::new(n_states, coordinates.len());

        match request.kind {
            RequestKind::Energy => {
                for state in 0..n_states {
                    result.set_energy(state, self.energy(coordinates, state));
                }
            }
            RequestKind::Gradient { state, .. } => {
                if state >= n_states {
                    return Err(OracleFailure::GradientMissing(state));
                }
                result.set_energy(state, self.energy(coordinates, state));
                result.set_gradient(state, (&coordinates * self.force_constant).view());
            }
            RequestKind::Coupling { bra, ket } => {
                if bra >= n_states || ket >= n_states {
                    return Err(OracleFailure::CouplingMissing(bra, ket));
                }
                let coupling: Array1<f64> = Array1::from_elem(coordinates.len(), self.coupling);
                result.set_coupling(bra, ket, coupling.view());
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::ElectronicTargets;
    use approx::assert_abs_diff_eq;

    #[test]
    fn model_provides_all_targets() {
        let mut model = HarmonicModel::equidistant(2, 1.0, 0.1, 0.0);
        let coordinates: Array1<f64> = array![0.3, -0.4];
        let data = model
            .compute_data(coordinates.view(), &ElectronicTargets::all(2))
            .unwrap();

        assert_abs_diff_eq!(data.energies[0], 0.125, epsilon = 1e-14);
        assert_abs_diff_eq!(data.energies[1], 0.225, epsilon = 1e-14);
        assert_abs_diff_eq!(data.gradients, array![[0.3, -0.4], [0.3, -0.4]], epsilon = 1e-14);
        assert_eq!(model.n_calls, 3);
    }
}
