pub mod derivatives;
pub mod energy_monitor;
pub mod history;
pub mod integrators;
pub mod phase_space;
pub mod simulation;

pub use derivatives::{compute_derivatives, compute_energy};
pub use energy_monitor::check_energy_conservation;
pub use history::{DerivativeHistory, HISTORY_LENGTH};
pub use integrators::{
    create_integrator, AcceptedStep, EquationsOfMotion, Evaluation, Integrator, IntegratorState,
};
pub use phase_space::{Derivatives, PhaseSpace};
