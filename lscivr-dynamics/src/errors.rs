use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single evaluation of the electronic structure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleFailure {
    #[error("energy of electronic state {0} is missing in the electronic structure output")]
    EnergyMissing(usize),
    #[error("gradient of electronic state {0} is missing in the electronic structure output")]
    GradientMissing(usize),
    #[error("nonadiabatic coupling between states {0} and {1} is missing in the electronic structure output")]
    CouplingMissing(usize, usize),
    #[error("optimized orbitals are missing in the electronic structure output")]
    OrbitalMissing,
    #[error("electronic structure program unavailable: {0}")]
    Unavailable(String),
    #[error("electronic structure server not available after {0:.1} s")]
    Timeout(f64),
}

#[derive(Error, Debug)]
pub enum DynamicsError {
    #[error("shape mismatch: {0}")]
    Shape(String),
    #[error(transparent)]
    Oracle(#[from] OracleFailure),
    #[error(
        "energy conservation violated: total energy changed by {percentage:.3} % \
         (initial {initial:.10}, current {current:.10})"
    )]
    EnergyConservation {
        initial: f64,
        current: f64,
        percentage: f64,
    },
    #[error(
        "Bulirsch-Stoer extrapolation did not converge with up to {substeps} substeps \
         (last error {error:.3e}), reduce the step size"
    )]
    Convergence { substeps: usize, error: f64 },
    #[error("mode matrix is not orthonormal after renormalization (deviation {0:.3e})")]
    ModeMatrix(f64),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("unusable restart file {path:?}: {reason}")]
    Restart { path: PathBuf, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DynamicsError>;
