mod abm;
mod bulirsch_stoer;
mod runge_kutta;

pub use abm::{AbmPhase, AdamsBashforthMoulton};
pub use bulirsch_stoer::{BulirschStoer, RichardsonTable, MAX_LEVELS};
pub use runge_kutta::RungeKutta4;

use crate::dynamics::derivatives::{compute_derivatives, compute_energy};
use crate::dynamics::{DerivativeHistory, Derivatives, PhaseSpace};
use crate::errors::{DynamicsError, Result};
use crate::initialization::{IntegratorConfiguration, IntegratorKind};
use crate::interface::{ElectronicStructure, ElectronicTargets, QCInterface};
use ndarray::prelude::*;

/// Derivatives at a phase space point together with the electronic structure they came from.
#[derive(Clone, Debug)]
pub struct Evaluation {
    pub derivatives: Derivatives,
    pub structure: ElectronicStructure,
}

/// Couples the electronic structure program to the derivative engine.
/// Every call of [EquationsOfMotion::evaluate] is one complete electronic structure calculation.
pub struct EquationsOfMotion<'a> {
    interface: &'a mut dyn QCInterface,
    masses: ArrayView1<'a, f64>,
    targets: &'a ElectronicTargets,
    n_calls: usize,
}

impl<'a> EquationsOfMotion<'a> {
    pub fn new(
        interface: &'a mut dyn QCInterface,
        masses: ArrayView1<'a, f64>,
        targets: &'a ElectronicTargets,
    ) -> Self {
        Self {
            interface,
            masses,
            targets,
            n_calls: 0,
        }
    }

    pub fn n_states(&self) -> usize {
        self.targets.n_states
    }

    pub fn n_calls(&self) -> usize {
        self.n_calls
    }

    pub fn evaluate(&mut self, point: &PhaseSpace) -> Result<Evaluation> {
        self.n_calls += 1;
        let structure: ElectronicStructure = self
            .interface
            .compute_data(point.nuclear_coordinates(self.n_states()), self.targets)?;
        let derivatives: Derivatives = compute_derivatives(
            self.masses,
            point.q.view(),
            point.p.view(),
            structure.couplings.view(),
            structure.gradients.view(),
            structure.energies.view(),
        )?;
        Ok(Evaluation {
            derivatives,
            structure,
        })
    }

    pub fn energy(&self, point: &PhaseSpace, structure: &ElectronicStructure) -> Result<f64> {
        compute_energy(
            self.masses,
            point.q.view(),
            point.p.view(),
            structure.energies.view(),
        )
    }
}

/// Time, step index and derivative history of a trajectory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntegratorState {
    pub time: f64,
    pub step: usize,
    pub history: DerivativeHistory,
}

impl IntegratorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an accepted step: the derivative at the new point becomes the newest entry.
    pub fn advance(&mut self, increment: f64, derivatives: Derivatives) {
        self.history.push(derivatives);
        self.time += increment;
        self.step += 1;
    }
}

/// The new phase space point of an accepted step and the evaluation at that point.
#[derive(Clone, Debug)]
pub struct AcceptedStep {
    pub point: PhaseSpace,
    pub evaluation: Evaluation,
    pub increment: f64,
}

pub trait Integrator {
    fn kind(&self) -> IntegratorKind;

    /// Multistep methods cannot change the step size.
    fn fixed_increment(&self) -> bool {
        false
    }

    /// Prepares the history at the start of a trajectory. `start` is the evaluation at `point`.
    fn initialize(
        &mut self,
        point: &PhaseSpace,
        start: &Evaluation,
        state: &mut IntegratorState,
        eom: &mut EquationsOfMotion,
    ) -> Result<()>;

    /// Resumes from a history that was read from a restart file.
    fn restore(&mut self, state: &IntegratorState) -> Result<()>;

    /// Advances `point` by `increment`. The history in `state` is not modified.
    fn step(
        &mut self,
        point: &PhaseSpace,
        increment: f64,
        state: &IntegratorState,
        eom: &mut EquationsOfMotion,
    ) -> Result<AcceptedStep>;
}

pub fn create_integrator(config: &IntegratorConfiguration) -> Box<dyn Integrator> {
    match config.integrator {
        IntegratorKind::Abm => Box::new(AdamsBashforthMoulton::new(config.stepsize)),
        IntegratorKind::BulirschStoer => Box::new(BulirschStoer::new(config.tolerance)),
        IntegratorKind::Rk4 => Box::new(RungeKutta4::new()),
    }
}

/// Newest derivative of the history, which belongs to the current point.
fn current_derivatives(state: &IntegratorState) -> Result<&Derivatives> {
    state.history.newest().ok_or_else(|| {
        DynamicsError::Config(String::from(
            "the integrator was not initialized with the derivatives at the current point",
        ))
    })
}
