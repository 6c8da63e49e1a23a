use super::{
    current_derivatives, AcceptedStep, EquationsOfMotion, Evaluation, Integrator, IntegratorState,
};
use crate::dynamics::{Derivatives, PhaseSpace};
use crate::errors::Result;
use crate::initialization::IntegratorKind;

/// Classical fourth order Runge-Kutta scheme. The first stage reuses the derivative
/// at the current point, the last evaluation at the new point becomes the next first stage.
#[derive(Default)]
pub struct RungeKutta4 {}

impl RungeKutta4 {
    pub fn new() -> Self {
        Self {}
    }
}

impl Integrator for RungeKutta4 {
    fn kind(&self) -> IntegratorKind {
        IntegratorKind::Rk4
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
        let h: f64 = increment;
        let k1: &Derivatives = current_derivatives(state)?;
        let k2: Derivatives = eom.evaluate(&point.displaced(k1, 0.5 * h))?.derivatives;
        let k3: Derivatives = eom.evaluate(&point.displaced(&k2, 0.5 * h))?.derivatives;
        let k4: Derivatives = eom.evaluate(&point.displaced(&k3, h))?.derivatives;

        let next: PhaseSpace = point.combine(
            h / 6.0,
            &[(1.0, k1), (2.0, &k2), (2.0, &k3), (1.0, &k4)],
        );
        let evaluation: Evaluation = eom.evaluate(&next)?;
        Ok(AcceptedStep {
            point: next,
            evaluation,
            increment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::integrators::tests::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn energy_drift_over_hundred_steps() {
        let mut integrator = RungeKutta4::new();
        let (point, energies, n_calls) = propagate(&mut integrator, 0.01, 100);

        let initial: f64 = energies[0];
        assert_abs_diff_eq!(initial, 0.055, epsilon = 1e-12);
        for energy in energies.iter() {
            assert!((initial - energy).abs() / initial < 1.0e-3);
        }
        assert_abs_diff_eq!(point.q[2], 0.1 * 1.0_f64.cos(), epsilon = 1e-9);
        assert!(point.rms_difference(&model_solution(1.0)) < 1e-9);
        // one evaluation at the start, four per step
        assert_eq!(n_calls, 1 + 4 * 100);
    }

    #[test]
    fn step_without_initialization_fails() {
        let mut oracle = model();
        let masses = ndarray::array![1.0];
        let targets = crate::interface::ElectronicTargets::all(2);
        let mut eom = EquationsOfMotion::new(&mut oracle, masses.view(), &targets);
        let state = IntegratorState::new();
        let mut integrator = RungeKutta4::new();
        assert!(integrator
            .step(&model_point(), 0.01, &state, &mut eom)
            .is_err());
        assert!(integrator.restore(&state).is_err());
        assert_eq!(eom.n_calls(), 0);
    }
}
