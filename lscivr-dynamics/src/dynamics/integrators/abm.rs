use super::{AcceptedStep, EquationsOfMotion, Evaluation, Integrator, IntegratorState};
use crate::defaults::TIME_TOLERANCE;
use crate::dynamics::{DerivativeHistory, Derivatives, PhaseSpace, HISTORY_LENGTH};
use crate::errors::{DynamicsError, Result};
use crate::initialization::IntegratorKind;
use log::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbmPhase {
    Bootstrapping,
    Steady,
    Failed,
}

/// Fourth order Adams-Bashforth predictor with Adams-Moulton corrector.
/// The derivative history is started with modified Euler steps backwards in time.
pub struct AdamsBashforthMoulton {
    stepsize: f64,
    phase: AbmPhase,
}

impl AdamsBashforthMoulton {
    pub fn new(stepsize: f64) -> Self {
        Self {
            stepsize,
            phase: AbmPhase::Bootstrapping,
        }
    }

    pub fn phase(&self) -> AbmPhase {
        self.phase
    }

    /// Three modified Euler steps of size -h starting at `point`. Returns the derivatives
    /// at t0 - 3h, t0 - 2h, t0 - h and t0.
    fn bootstrap(
        &self,
        point: &PhaseSpace,
        start: &Evaluation,
        eom: &mut EquationsOfMotion,
    ) -> Result<Vec<Derivatives>> {
        let h: f64 = -self.stepsize;
        let mut derivatives: Vec<Derivatives> = vec![start.derivatives.clone()];
        let mut current: PhaseSpace = point.clone();
        let mut rate: Derivatives = start.derivatives.clone();

        for substep in 1..HISTORY_LENGTH {
            let predictor: PhaseSpace = current.displaced(&rate, h);
            let predicted_rate: Derivatives = eom.evaluate(&predictor)?.derivatives;
            let corrector: PhaseSpace = current.combine(h, &[(0.5, &rate), (0.5, &predicted_rate)]);
            rate = eom.evaluate(&corrector)?.derivatives;
            debug!("ABM start-up step {} finished at t0 - {}h", substep, substep);
            current = corrector;
            derivatives.push(rate.clone());
        }
        derivatives.reverse();
        Ok(derivatives)
    }

    fn predictor_corrector(
        &self,
        point: &PhaseSpace,
        h: f64,
        history: &DerivativeHistory,
        eom: &mut EquationsOfMotion,
    ) -> Result<AcceptedStep> {
        let f: Vec<&Derivatives> = (0..HISTORY_LENGTH)
            .map(|age| history.get(age))
            .collect::<Option<Vec<&Derivatives>>>()
            .ok_or_else(|| {
                DynamicsError::Config(format!(
                    "Adams-Bashforth-Moulton needs {} stored derivatives, found {}",
                    HISTORY_LENGTH,
                    history.len()
                ))
            })?;

        let predictor: PhaseSpace = point.combine(
            h / 24.0,
            &[(55.0, f[0]), (-59.0, f[1]), (37.0, f[2]), (-9.0, f[3])],
        );
        let predicted_rate: Derivatives = eom.evaluate(&predictor)?.derivatives;
        let corrector: PhaseSpace = point.combine(
            h / 24.0,
            &[(9.0, &predicted_rate), (19.0, f[0]), (-5.0, f[1]), (1.0, f[2])],
        );
        let evaluation: Evaluation = eom.evaluate(&corrector)?;

        Ok(AcceptedStep {
            point: corrector,
            evaluation,
            increment: h,
        })
    }
}

impl Integrator for AdamsBashforthMoulton {
    fn kind(&self) -> IntegratorKind {
        IntegratorKind::Abm
    }

    fn fixed_increment(&self) -> bool {
        true
    }

    fn initialize(
        &mut self,
        point: &PhaseSpace,
        start: &Evaluation,
        state: &mut IntegratorState,
        eom: &mut EquationsOfMotion,
    ) -> Result<()> {
        self.phase = AbmPhase::Bootstrapping;
        match self.bootstrap(point, start, eom) {
            Ok(derivatives) => {
                state.history = DerivativeHistory::from_oldest_first(derivatives);
                self.phase = AbmPhase::Steady;
                Ok(())
            }
            Err(error) => {
                self.phase = AbmPhase::Failed;
                Err(error)
            }
        }
    }

    fn restore(&mut self, state: &IntegratorState) -> Result<()> {
        if !state.history.is_full() {
            self.phase = AbmPhase::Failed;
            return Err(DynamicsError::Config(format!(
                "Adams-Bashforth-Moulton needs {} stored derivatives to restart, found {}",
                HISTORY_LENGTH,
                state.history.len()
            )));
        }
        self.phase = AbmPhase::Steady;
        Ok(())
    }

    fn step(
        &mut self,
        point: &PhaseSpace,
        increment: f64,
        state: &IntegratorState,
        eom: &mut EquationsOfMotion,
    ) -> Result<AcceptedStep> {
        if self.phase != AbmPhase::Steady {
            return Err(DynamicsError::Config(format!(
                "Adams-Bashforth-Moulton integrator cannot step in phase {:?}",
                self.phase
            )));
        }
        if (increment - self.stepsize).abs() > TIME_TOLERANCE * self.stepsize {
            return Err(DynamicsError::Config(format!(
                "Adams-Bashforth-Moulton uses a fixed step of {} a.u., requested {}",
                self.stepsize, increment
            )));
        }
        let result = self.predictor_corrector(point, self.stepsize, &state.history, eom);
        if result.is_err() {
            self.phase = AbmPhase::Failed;
        }
        result
    }
}
