use crate::defaults::*;
use crate::errors::{DynamicsError, Result};
use crate::interface::ElectronicTargets;
use itertools::Itertools;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

fn default_nstates() -> usize {
    NSTATES
}
fn default_initial_state() -> usize {
    INITIAL_STATE
}
fn default_gradient_states() -> StateSelection<usize> {
    StateSelection::Keyword(String::from(TARGET_ALL))
}
fn default_coupling_pairs() -> StateSelection<(usize, usize)> {
    StateSelection::Keyword(String::from(TARGET_ALL))
}
fn default_null_modes() -> usize {
    NULL_MODES
}
fn default_restart_flag() -> bool {
    RESTARTFLAG
}
fn default_energy_threshold() -> f64 {
    ENERGY_THRESHOLD
}
fn default_integrator() -> IntegratorKind {
    IntegratorKind::Rk4
}
fn default_stepsize() -> f64 {
    STEPSIZE
}
fn default_t_max() -> f64 {
    T_MAX
}
fn default_tolerance() -> f64 {
    TOLERANCE
}
fn default_integrator_configuration() -> IntegratorConfiguration {
    IntegratorConfiguration::default()
}
fn default_print_restart() -> bool {
    PRINT_RESTART
}
fn default_print_coordinates() -> bool {
    PRINT_COORDINATES
}
fn default_print_energies() -> bool {
    PRINT_ENERGIES
}
fn default_restart_file() -> String {
    String::from(RESTART_FILE_NAME)
}
fn default_print_configuration() -> PrintConfiguration {
    PrintConfiguration::default()
}

/// Either the keyword "all" or an explicit list of states or state pairs.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum StateSelection<T> {
    Keyword(String),
    List(Vec<T>),
}

impl<T: Clone> StateSelection<T> {
    pub fn resolve<F: FnOnce() -> Vec<T>>(&self, all: F) -> Result<Vec<T>> {
        match self {
            StateSelection::Keyword(word) if word.eq_ignore_ascii_case(TARGET_ALL) => Ok(all()),
            StateSelection::Keyword(word) => Err(DynamicsError::Config(format!(
                "unknown state selection '{}', use \"{}\" or a list",
                word, TARGET_ALL
            ))),
            StateSelection::List(list) => Ok(list.clone()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorKind {
    #[serde(alias = "ABM")]
    Abm,
    #[serde(alias = "BSH", alias = "bsh")]
    BulirschStoer,
    #[serde(alias = "RK4")]
    Rk4,
}

impl fmt::Display for IntegratorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name: &str = match self {
            IntegratorKind::Abm => "abm",
            IntegratorKind::BulirschStoer => "bulirsch_stoer",
            IntegratorKind::Rk4 => "rk4",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for IntegratorKind {
    type Err = DynamicsError;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "abm" => Ok(IntegratorKind::Abm),
            "bulirsch_stoer" | "bsh" => Ok(IntegratorKind::BulirschStoer),
            "rk4" => Ok(IntegratorKind::Rk4),
            other => Err(DynamicsError::Config(format!(
                "unknown integrator '{}', choose abm, bulirsch_stoer or rk4",
                other
            ))),
        }
    }
}

/// Struct that loads the configuration of the dynamics from the file "dynamics.toml"
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DynamicConfiguration {
    #[serde(default = "default_nstates")]
    pub nstates: usize,
    #[serde(default = "default_initial_state")]
    pub initial_state: usize,
    #[serde(default = "default_gradient_states")]
    pub gradient_states: StateSelection<usize>,
    #[serde(default = "default_coupling_pairs")]
    pub coupling_pairs: StateSelection<(usize, usize)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excited_states: Option<usize>,
    #[serde(default = "default_null_modes")]
    pub null_modes: usize,
    #[serde(default = "default_restart_flag")]
    pub restart_flag: bool,
    #[serde(default = "default_energy_threshold")]
    pub energy_threshold: f64,
    #[serde(default = "default_integrator_configuration")]
    pub integrator_config: IntegratorConfiguration,
    #[serde(default = "default_print_configuration")]
    pub print_config: PrintConfiguration,
}

impl Default for DynamicConfiguration {
    fn default() -> Self {
        Self {
            nstates: default_nstates(),
            initial_state: default_initial_state(),
            gradient_states: default_gradient_states(),
            coupling_pairs: default_coupling_pairs(),
            excited_states: None,
            null_modes: default_null_modes(),
            restart_flag: default_restart_flag(),
            energy_threshold: default_energy_threshold(),
            integrator_config: default_integrator_configuration(),
            print_config: default_print_configuration(),
        }
    }
}

impl DynamicConfiguration {
    /// Reads the configuration file of the trajectory directory. If it does not exist,
    /// the default settings are used and written to the directory.
    pub fn from_directory(directory: &Path) -> Result<Self> {
        let config_file_path: PathBuf = directory.join(CONFIG_FILE_NAME);
        let exists: bool = config_file_path.exists();
        let config_string: String = if exists {
            fs::read_to_string(&config_file_path)?
        } else {
            String::new()
        };
        let config: Self = Self::from_toml(&config_string).map_err(|err| {
            DynamicsError::Config(format!("{}: {}", config_file_path.display(), err))
        })?;
        if !exists {
            let config_string: String = toml::to_string(&config)
                .map_err(|err| DynamicsError::Config(err.to_string()))?;
            fs::write(&config_file_path, config_string)?;
        }
        Ok(config)
    }

    pub fn from_toml(input: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(input).map_err(|err| DynamicsError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let integrator: &IntegratorConfiguration = &self.integrator_config;
        let problem: Option<String> = if self.nstates == 0 {
            Some(String::from("at least one electronic state is required"))
        } else if self.initial_state >= self.nstates {
            Some(format!(
                "initial state {} is not one of the {} states",
                self.initial_state, self.nstates
            ))
        } else if !(integrator.stepsize > 0.0) {
            Some(format!("step size {} must be positive", integrator.stepsize))
        } else if !(integrator.t_max >= 0.0) {
            Some(format!("final time {} must not be negative", integrator.t_max))
        } else if !(integrator.tolerance > 0.0) {
            Some(format!("tolerance {} must be positive", integrator.tolerance))
        } else if !(self.energy_threshold > 0.0) {
            Some(format!(
                "energy threshold {} must be positive",
                self.energy_threshold
            ))
        } else {
            None
        };
        match problem {
            Some(problem) => Err(DynamicsError::Config(problem)),
            None => Ok(()),
        }
    }

    /// States that need gradients and pairs that need couplings at every geometry.
    pub fn electronic_targets(&self) -> Result<ElectronicTargets> {
        let n_states: usize = self.nstates;
        let gradients: Vec<usize> = self.gradient_states.resolve(|| (0..n_states).collect())?;
        let couplings: Vec<(usize, usize)> = self
            .coupling_pairs
            .resolve(|| (0..n_states).tuple_combinations().collect())?;
        let targets = ElectronicTargets::new(n_states, gradients, couplings, self.excited_states)?;
        if targets.gradients.len() < n_states {
            warn!(
                "Gradients are only requested for the states {:?}, the other states enter the forces with zero gradient",
                targets.gradients
            );
        }
        Ok(targets)
    }
}

/// Integrator selection and its parameters (atomic units)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct IntegratorConfiguration {
    #[serde(default = "default_integrator")]
    pub integrator: IntegratorKind,
    #[serde(default = "default_stepsize")]
    pub stepsize: f64,
    #[serde(default = "default_t_max")]
    pub t_max: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for IntegratorConfiguration {
    fn default() -> Self {
        Self {
            integrator: default_integrator(),
            stepsize: default_stepsize(),
            t_max: default_t_max(),
            tolerance: default_tolerance(),
        }
    }
}

/// Struct that controls the output of the simulation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PrintConfiguration {
    #[serde(default = "default_print_restart")]
    pub print_restart: bool,
    #[serde(default = "default_print_coordinates")]
    pub print_coordinates: bool,
    #[serde(default = "default_print_energies")]
    pub print_energies: bool,
    #[serde(default = "default_restart_file")]
    pub restart_file: String,
}

impl Default for PrintConfiguration {
    fn default() -> Self {
        Self {
            print_restart: default_print_restart(),
            print_coordinates: default_print_coordinates(),
            print_energies: default_print_energies(),
            restart_file: default_restart_file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_gives_defaults() {
        let config = DynamicConfiguration::from_toml("").unwrap();
        assert_eq!(config, DynamicConfiguration::default());
        assert_eq!(config.energy_threshold, 0.02);
        assert_eq!(config.integrator_config.integrator, IntegratorKind::Rk4);
        let targets = config.electronic_targets().unwrap();
        assert_eq!(targets, ElectronicTargets::all(2));
    }

    #[test]
    fn explicit_settings() {
        let input = r#"
            nstates = 3
            initial_state = 1
            gradient_states = [0, 2]
            coupling_pairs = [[2, 0]]
            excited_states = 5
            energy_threshold = 0.05

            [integrator_config]
            integrator = "BSH"
            stepsize = 3.0
            t_max = 10.0
            tolerance = 0.01
        "#;
        let config = DynamicConfiguration::from_toml(input).unwrap();
        assert_eq!(
            config.integrator_config.integrator,
            IntegratorKind::BulirschStoer
        );
        let targets = config.electronic_targets().unwrap();
        assert_eq!(targets.gradients, vec![0, 2]);
        assert_eq!(targets.couplings, vec![(0, 2)]);
        assert_eq!(targets.excited_states, Some(5));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(DynamicConfiguration::from_toml("initial_state = 2").is_err());
        assert!(DynamicConfiguration::from_toml("[integrator_config]\nstepsize = -1.0").is_err());
        assert!(DynamicConfiguration::from_toml("[integrator_config]\nintegrator = \"euler\"").is_err());
        let config = DynamicConfiguration::from_toml("gradient_states = \"some\"").unwrap();
        assert!(config.electronic_targets().is_err());
    }

    #[test]
    fn integrator_names() {
        for kind in [IntegratorKind::Abm, IntegratorKind::BulirschStoer, IntegratorKind::Rk4] {
            assert_eq!(kind.to_string().parse::<IntegratorKind>().unwrap(), kind);
        }
        assert_eq!("BSH".parse::<IntegratorKind>().unwrap(), IntegratorKind::BulirschStoer);
    }

    #[test]
    fn missing_file_is_written() {
        let directory = tempfile::tempdir().unwrap();
        let config = DynamicConfiguration::from_directory(directory.path()).unwrap();
        assert!(directory.path().join(CONFIG_FILE_NAME).exists());
        let again = DynamicConfiguration::from_directory(directory.path()).unwrap();
        assert_eq!(config, again);
    }
}
