use super::{
    current_derivatives, AcceptedStep, EquationsOfMotion, Evaluation, Integrator, IntegratorState,
};
use crate::dynamics::{Derivatives, PhaseSpace};
use crate::errors::{DynamicsError, Result};
use crate::initialization::IntegratorKind;
use log::debug;

// extrapolation levels 1..MAX_LEVELS use 2, 4, .., 16 midpoint substeps
pub const MAX_LEVELS: usize = 9;

/// Richardson extrapolation of modified midpoint estimates with 2k substeps at level k.
#[derive(Clone, Debug, Default)]
pub struct RichardsonTable {
    rows: Vec<PhaseSpace>,
}

impl RichardsonTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Adds the estimate of the next level and updates the extrapolated values.
    pub fn push(&mut self, estimate: PhaseSpace) {
        self.rows.push(estimate);
        let k: usize = self.rows.len();
        for j in (1..k).rev() {
            let c: f64 = (k as f64 / (k as f64 - 1.0)).powi(2 * (k - j) as i32);
            let refined = PhaseSpace {
                q: (&self.rows[j].q * c - &self.rows[j - 1].q) / (c - 1.0),
                p: (&self.rows[j].p * c - &self.rows[j - 1].p) / (c - 1.0),
            };
            self.rows[j - 1] = refined;
        }
    }

    /// Best extrapolated estimate
    pub fn best(&self) -> Option<&PhaseSpace> {
        self.rows.first()
    }
}

/// Bulirsch-Stoer integrator for one global increment H per step. There is no step size
/// control: a step that does not converge within [MAX_LEVELS] levels is an error.
pub struct BulirschStoer {
    tolerance: f64,
}

impl BulirschStoer {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Modified midpoint rule with `n_substeps` substeps. `rate` is the derivative at `point`.
    pub fn midpoint(
        &self,
        point: &PhaseSpace,
        rate: &Derivatives,
        increment: f64,
        n_substeps: usize,
        eom: &mut EquationsOfMotion,
    ) -> Result<PhaseSpace> {
        let h: f64 = increment / n_substeps as f64;
        let mut previous: PhaseSpace = point.clone();
        let mut current: PhaseSpace = point.displaced(rate, h);
        for _ in 1..n_substeps {
            let slope: Derivatives = eom.evaluate(&current)?.derivatives;
            let next: PhaseSpace = previous.displaced(&slope, 2.0 * h);
            previous = current;
            current = next;
        }
        let slope: Derivatives = eom.evaluate(&current)?.derivatives;
        Ok(current.displaced(&slope, h).midpoint(&previous))
    }
}

impl Integrator for BulirschStoer {
    fn kind(&self) -> IntegratorKind {
        IntegratorKind::BulirschStoer
    }

    fn initialize(
        &mut self,
        _point: &PhaseSpace,
        start: &Evaluation,
        state: &mut IntegratorState,
        _eom: &mut EquationsOfMotion,
    ) -> Result<()> {
        state.history.push(start.derivatives.clone());
        Ok(())
    }

    fn restore(&mut self, state: &IntegratorState) -> Result<()> {
        current_derivatives(state).map(|_| ())
    }

    fn step(
        &mut self,
        point: &PhaseSpace,
        increment: f64,
        state: &IntegratorState,
        eom: &mut EquationsOfMotion,
    ) -> Result<AcceptedStep> {
        let rate: &Derivatives = current_derivatives(state)?;
        let mut table = RichardsonTable::new();
        let first: PhaseSpace = self.midpoint(point, rate, increment, 2, eom)?;
        let mut previous: PhaseSpace = first.clone();
        table.push(first);
        let mut error: f64 = f64::INFINITY;

        for level in 2..MAX_LEVELS {
            let n_substeps: usize = 2 * level;
            table.push(self.midpoint(point, rate, increment, n_substeps, eom)?);
            let best: PhaseSpace = match table.best() {
                Some(best) => best.clone(),
                None => break,
            };
            error = best.rms_difference(&previous);
            debug!(
                "Bulirsch-Stoer level {} with {:>2} substeps: error {:.3e}",
                level, n_substeps, error
            );
            if error < self.tolerance {
                let evaluation: Evaluation = eom.evaluate(&best)?;
                return Ok(AcceptedStep {
                    point: best,
                    evaluation,
                    increment,
                });
            }
            previous = best;
        }
        Err(DynamicsError::Convergence {
            substeps: 2 * (MAX_LEVELS - 1),
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::integrators::tests::*;
    use crate::interface::ElectronicTargets;
    use ndarray::prelude::*;

    #[test]
    fn extrapolation_error_decreases_when_substeps_double() {
        let mut oracle = model();
        let masses: Array1<f64> = array![1.0];
        let targets = ElectronicTargets::all(2);
        let mut eom = EquationsOfMotion::new(&mut oracle, masses.view(), &targets);
        let point = model_point();
        let rate = eom.evaluate(&point).unwrap().derivatives;
        let integrator = BulirschStoer::new(1e-8);
        let increment: f64 = 1.0;
        let exact = model_solution(increment);

        let mut table = RichardsonTable::new();
        let mut errors: Vec<f64> = Vec::new();
        for level in 1..MAX_LEVELS {
            let estimate = integrator
                .midpoint(&point, &rate, increment, 2 * level, &mut eom)
                .unwrap();
            table.push(estimate);
            errors.push(table.best().unwrap().rms_difference(&exact));
        }
        // 2, 4, 8 and 16 substeps
        let doubling: Vec<f64> = vec![errors[0], errors[1], errors[3], errors[7]];
        for pair in doubling.windows(2) {
            assert!(pair[1] < pair[0], "errors {:?}", doubling);
        }
        assert!(errors[7] < 1e-8);
    }

    #[test]
    fn steps_follow_the_exact_solution() {
        let mut integrator = BulirschStoer::new(1e-9);
        let (point, energies, _) = propagate(&mut integrator, 0.5, 4);
        let exact = model_solution(2.0);

        assert!(point.rms_difference(&exact) < 1e-7);
        assert!((energies[0] - energies[4]).abs() / energies[0] < 1e-6);
    }

    #[test]
    fn missing_convergence_is_fatal() {
        let mut oracle = model();
        let masses: Array1<f64> = array![1.0];
        let targets = ElectronicTargets::all(2);
        let mut eom = EquationsOfMotion::new(&mut oracle, masses.view(), &targets);
        let point = model_point();
        let start = eom.evaluate(&point).unwrap();
        let mut state = IntegratorState::new();
        let mut integrator = BulirschStoer::new(0.0);
        integrator
            .initialize(&point, &start, &mut state, &mut eom)
            .unwrap();

        match integrator.step(&point, 1.0, &state, &mut eom) {
            Err(DynamicsError::Convergence { substeps, .. }) => assert_eq!(substeps, 16),
            other => panic!("unexpected result {:?}", other.map(|step| step.point)),
        }
        // initial evaluation plus 2 + 4 + .. + 16 midpoint evaluations
        assert_eq!(eom.n_calls(), 1 + 72);
    }
}
