use crate::defaults::TIME_TOLERANCE;
use crate::dynamics::{
    check_energy_conservation, create_integrator, AcceptedStep, EquationsOfMotion, Evaluation,
    Integrator,
};
use crate::errors::{DynamicsError, Result};
use crate::initialization::{Checkpoint, Frame, Simulation};
use crate::interface::{ElectronicTargets, QCInterface};
use crate::output::*;
use log::{error, info};
use ndarray::prelude::*;
use std::time::Instant;

impl Simulation {
    /// Propagates the trajectory until the final time. Every error stops the trajectory:
    /// it is logged, the last accepted state is written to the restart file and the
    /// error is returned.
    pub fn lsc_dynamics(&mut self, interface: &mut dyn QCInterface) -> Result<()> {
        let timer: Instant = Instant::now();
        let mut integrator: Box<dyn Integrator> =
            create_integrator(&self.config.integrator_config);
        print_header_dynamics(
            &integrator.kind().to_string(),
            self.config.integrator_config.stepsize,
            self.config.integrator_config.t_max,
        );

        let masses: Array1<f64> = self.masses.clone();
        let targets: ElectronicTargets = self.targets.clone();
        let mut eom = EquationsOfMotion::new(interface, masses.view(), &targets);
        let result: Result<()> = self.propagate(integrator.as_mut(), &mut eom);
        self.n_calls += eom.n_calls();

        match result {
            Ok(()) => {
                self.log_progress(&format!(
                    "Trajectory finished at t = {:.4} a.u. after {} steps",
                    self.state.time, self.state.step
                ));
                print_footer_dynamics(timer.elapsed().as_secs_f64(), self.n_calls);
                Ok(())
            }
            Err(failure) => Err(self.terminate(failure)),
        }
    }

    fn propagate(
        &mut self,
        integrator: &mut dyn Integrator,
        eom: &mut EquationsOfMotion,
    ) -> Result<()> {
        if self.restarted {
            integrator.restore(&self.state)?;
            self.log_progress(&format!(
                "Restart at step {} (t = {:.4} a.u.)",
                self.state.step, self.state.time
            ));
        } else {
            self.log_progress_start();
            let start: Evaluation = eom.evaluate(&self.phase_space)?;
            let energy: f64 = eom.energy(&self.phase_space, &start.structure)?;
            self.initial_energy = Some(energy);
            self.energy = Some(energy);
            self.energies = start.structure.energies.clone();
            integrator.initialize(&self.phase_space, &start, &mut self.state, eom)?;
            self.record(energy, true)?;
        }
        let initial_energy: f64 = self.initial_energy.ok_or_else(|| {
            DynamicsError::Config(String::from("the initial energy of the trajectory is unknown"))
        })?;

        while let Some(increment) = self.next_increment(integrator.fixed_increment()) {
            let timer: Instant = Instant::now();
            print_header_dynamics_step(self.state.step + 1, self.state.time + increment);
            let accepted: AcceptedStep =
                integrator.step(&self.phase_space, increment, &self.state, eom)?;
            let energy: f64 = eom.energy(&accepted.point, &accepted.evaluation.structure)?;
            let drift: f64 =
                check_energy_conservation(initial_energy, energy, self.config.energy_threshold)?;

            self.state
                .advance(accepted.increment, accepted.evaluation.derivatives);
            self.phase_space = accepted.point;
            self.energies = accepted.evaluation.structure.energies;
            self.energy = Some(energy);
            self.record(energy, false)?;
            self.log_progress(&format!(
                "Step {:>6} t = {:>12.4} a.u. E = {:>20.12} loss = {:>10.3e}",
                self.state.step, self.state.time, energy, drift
            ));
            print_footer_dynamics_step(energy, drift, timer.elapsed().as_secs_f64());
        }
        Ok(())
    }

    /// Step size of the next step or `None` when the final time is reached.
    /// Only integrators with a variable increment shorten the last step.
    pub fn next_increment(&self, fixed_increment: bool) -> Option<f64> {
        let stepsize: f64 = self.config.integrator_config.stepsize;
        let remaining: f64 = self.config.integrator_config.t_max - self.state.time;
        let slack: f64 = TIME_TOLERANCE * stepsize;
        if remaining >= stepsize - slack {
            Some(stepsize)
        } else if !fixed_increment && remaining > slack {
            Some(remaining)
        } else {
            None
        }
    }

    /// Writes the current point to the artifacts and the restart file.
    fn record(&mut self, energy: f64, first_call: bool) -> Result<()> {
        let print = self.config.print_config.clone();
        if print.print_energies {
            write_energy_trace(
                &self.output.energies,
                self.state.time,
                energy,
                self.energies.view(),
                first_call,
            )?;
        }
        if print.print_coordinates && self.has_cartesian_geometry() {
            write_xyz_frame(
                &self.output.trajectory,
                &self.atom_labels,
                self.phase_space.nuclear_coordinates(self.n_states),
                self.state.time,
                first_call,
            )?;
        }
        if print.print_restart {
            self.write_checkpoint(energy)?;
        }
        self.frames.push(Frame {
            time: self.state.time,
            energy,
            point: self.phase_space.clone(),
        });
        Ok(())
    }

    fn write_checkpoint(&self, energy: f64) -> Result<()> {
        Checkpoint::new(
            self.config.integrator_config.integrator,
            self.n_states,
            &self.phase_space,
            &self.state,
            energy,
        )
        .write(&self.output.restart)
    }

    /// Common exit of every failure.
    fn terminate(&mut self, failure: DynamicsError) -> DynamicsError {
        error!("Trajectory stopped at step {}: {}", self.state.step, failure);
        self.log_progress(&format!(
            "Trajectory stopped after step {} (t = {:.4} a.u.): {}",
            self.state.step, self.state.time, failure
        ));
        if let (false, Some(energy)) = (self.state.history.is_empty(), self.energy) {
            match self.write_checkpoint(energy) {
                Ok(()) => info!(
                    "Last accepted state written to {}",
                    self.output.restart.display()
                ),
                Err(err) => error!("The restart file could not be written: {}", err),
            }
        }
        failure
    }

    fn log_progress_start(&self) {
        let message: String = format!(
            "Trajectory started with the {} integrator, {} electronic states and {} nuclear coordinates",
            self.config.integrator_config.integrator,
            self.n_states,
            self.masses.len()
        );
        if let Err(err) = write_progress(&self.output.progress, &message, true) {
            error!("Progress log {} not writable: {}", self.output.progress.display(), err);
        }
    }

    fn log_progress(&self, message: &str) {
        if let Err(err) = write_progress(&self.output.progress, message, false) {
            error!("Progress log {} not writable: {}", self.output.progress.display(), err);
        }
    }
}
