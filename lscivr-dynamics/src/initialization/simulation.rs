use crate::dynamics::{IntegratorState, PhaseSpace};
use crate::errors::{DynamicsError, Result};
use crate::initialization::restart::Checkpoint;
use crate::initialization::system::SystemData;
use crate::initialization::DynamicConfiguration;
use crate::interface::ElectronicTargets;
use crate::output::OutputFiles;
use log::info;
use ndarray::prelude::*;
use std::path::{Path, PathBuf};

/// Time, total energy and phase space point of a recorded step.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub time: f64,
    pub energy: f64,
    pub point: PhaseSpace,
}

/// Struct that holds the [DynamicConfiguration] and the state of one trajectory
pub struct Simulation {
    pub config: DynamicConfiguration,
    pub directory: PathBuf,
    pub n_states: usize,
    pub atom_labels: Vec<String>,
    // masses of the nuclear degrees of freedom in a.u.
    pub masses: Array1<f64>,
    pub targets: ElectronicTargets,
    pub phase_space: PhaseSpace,
    pub state: IntegratorState,
    // reference energy E0 of the conservation check
    pub initial_energy: Option<f64>,
    pub energy: Option<f64>,
    // adiabatic energies at the current point
    pub energies: Array1<f64>,
    pub output: OutputFiles,
    pub restarted: bool,
    pub frames: Vec<Frame>,
    pub n_calls: usize,
}

impl Simulation {
    /// Initialize the struct [Simulation] from the [SystemData]. A restart
    /// takes the phase space point and the derivatives from the restart file.
    pub fn new(system: &SystemData, directory: &Path) -> Result<Self> {
        let point: Option<PhaseSpace> = if system.config.restart_flag {
            None
        } else {
            Some(system.initial_phase_space()?)
        };
        Self::build(
            system.config.clone(),
            system.masses.clone(),
            system.atom_labels.clone(),
            point,
            directory,
        )
    }

    /// Trajectory of a model system that starts at `point`. The number of
    /// nuclear degrees of freedom is given by the masses.
    pub fn from_phase_space(
        config: DynamicConfiguration,
        masses: Array1<f64>,
        atom_labels: Vec<String>,
        point: PhaseSpace,
        directory: &Path,
    ) -> Result<Self> {
        Self::build(config, masses, atom_labels, Some(point), directory)
    }

    fn build(
        config: DynamicConfiguration,
        masses: Array1<f64>,
        atom_labels: Vec<String>,
        point: Option<PhaseSpace>,
        directory: &Path,
    ) -> Result<Self> {
        config.validate()?;
        let n_states: usize = config.nstates;
        let ndof: usize = n_states + masses.len();
        let targets: ElectronicTargets = config.electronic_targets()?;
        let output = OutputFiles::new(directory, &config.print_config.restart_file);

        let (phase_space, state, initial_energy, restarted) = if config.restart_flag {
            let checkpoint: Checkpoint = Checkpoint::read(&output.restart)?;
            checkpoint.verify(
                &output.restart,
                ndof,
                config.integrator_config.integrator,
                n_states,
            )?;
            info!(
                "Restart from {} at step {} (t = {:.4} a.u.)",
                output.restart.display(),
                checkpoint.step,
                checkpoint.time
            );
            let state: IntegratorState = checkpoint.integrator_state();
            (checkpoint.coordinates, state, Some(checkpoint.energy), true)
        } else {
            let point: PhaseSpace = point.ok_or_else(|| {
                DynamicsError::Config(String::from("no initial phase space point was given"))
            })?;
            (point, IntegratorState::new(), None, false)
        };
        if phase_space.ndof() != ndof {
            return Err(DynamicsError::Shape(format!(
                "phase space with {} degrees of freedom for {} states and {} nuclear coordinates",
                phase_space.ndof(),
                n_states,
                masses.len()
            )));
        }

        Ok(Self {
            config,
            directory: directory.to_path_buf(),
            n_states,
            atom_labels,
            masses,
            targets,
            phase_space,
            state,
            initial_energy,
            energy: initial_energy,
            energies: Array1::zeros(n_states),
            output,
            restarted,
            frames: Vec::new(),
            n_calls: 0,
        })
    }

    pub fn nuclear_coordinates(&self) -> ArrayView1<f64> {
        self.phase_space.nuclear_coordinates(self.n_states)
    }

    /// The xyz trajectory needs three labelled cartesian coordinates per atom.
    pub fn has_cartesian_geometry(&self) -> bool {
        !self.atom_labels.is_empty() && 3 * self.atom_labels.len() == self.masses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initialization::IntegratorKind;

    fn model_config() -> DynamicConfiguration {
        let mut config = DynamicConfiguration::default();
        config.null_modes = 0;
        config
    }

    #[test]
    fn fresh_start_from_a_point() {
        let directory = tempfile::tempdir().unwrap();
        let point = PhaseSpace::new(array![1.0, 0.0, 0.1], array![0.0, 1.0, 0.0]).unwrap();
        let simulation = Simulation::from_phase_space(
            model_config(),
            array![1.0],
            Vec::new(),
            point.clone(),
            directory.path(),
        )
        .unwrap();
        assert!(!simulation.restarted);
        assert_eq!(simulation.phase_space, point);
        assert_eq!(simulation.nuclear_coordinates(), array![0.1].view());
        assert!(!simulation.has_cartesian_geometry());
        assert_eq!(simulation.targets, ElectronicTargets::all(2));

        assert!(matches!(
            Simulation::from_phase_space(
                model_config(),
                array![1.0, 1.0],
                Vec::new(),
                point,
                directory.path()
            ),
            Err(DynamicsError::Shape(_))
        ));
    }

    #[test]
    fn restart_reads_the_checkpoint() {
        let directory = tempfile::tempdir().unwrap();
        let point = PhaseSpace::new(array![0.5, 0.5, 0.2], array![0.1, 0.9, -0.3]).unwrap();
        let mut state = IntegratorState::new();
        state.advance(0.25, point.clone());
        let checkpoint = Checkpoint::new(IntegratorKind::Rk4, 2, &point, &state, 0.07);
        checkpoint
            .write(&directory.path().join("restart.out"))
            .unwrap();

        let mut config = model_config();
        config.restart_flag = true;
        let simulation = Simulation::from_phase_space(
            config.clone(),
            array![1.0],
            Vec::new(),
            PhaseSpace::zeros(3),
            directory.path(),
        )
        .unwrap();
        assert!(simulation.restarted);
        assert_eq!(simulation.phase_space, point);
        assert_eq!(simulation.state, state);
        assert_eq!(simulation.initial_energy, Some(0.07));

        config.integrator_config.integrator = IntegratorKind::Abm;
        assert!(matches!(
            Simulation::from_phase_space(
                config,
                array![1.0],
                Vec::new(),
                PhaseSpace::zeros(3),
                directory.path()
            ),
            Err(DynamicsError::Restart { .. })
        ));
    }
}
