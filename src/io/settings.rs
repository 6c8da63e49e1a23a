use crate::defaults::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_verbose() -> i8 {
    VERBOSE
}
fn default_backend() -> Backend {
    Backend::Model
}
fn default_geometry_file() -> String {
    String::from(GEOMETRY_FILE_NAME)
}
fn default_modes_file() -> String {
    String::from(MODES_FILE_NAME)
}
fn default_initial_conditions_file() -> String {
    String::from(INITIAL_CONDITIONS_FILE_NAME)
}
fn default_command() -> String {
    String::from(FILE_PROTOCOL_COMMAND)
}
fn default_input_name() -> String {
    String::from(INPUT_NAME)
}
fn default_orbital_file() -> String {
    String::from(ORBITAL_FILE_NAME)
}
fn default_capture_stdout() -> bool {
    CAPTURE_STDOUT
}
fn default_host() -> String {
    String::from(HOST)
}
fn default_port() -> u16 {
    PORT
}
fn default_max_wait() -> f64 {
    MAX_WAIT
}
fn default_poll_interval() -> f64 {
    POLL_INTERVAL
}
fn default_io_timeout() -> f64 {
    IO_TIMEOUT
}
fn default_force_constant() -> f64 {
    FORCE_CONSTANT
}
fn default_energy_gap() -> f64 {
    ENERGY_GAP
}
fn default_coupling() -> f64 {
    COUPLING
}

/// Electronic structure program that provides energies, gradients and couplings.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    File,
    Network,
    Model,
}

/// Settings of the program, read from "lscivr.toml". The dynamics
/// are configured separately in "dynamics.toml".
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Configuration {
    #[serde(default = "default_verbose")]
    pub verbose: i8,
    #[serde(default = "default_backend")]
    pub backend: Backend,
    #[serde(default = "default_geometry_file")]
    pub geometry_file: String,
    #[serde(default = "default_modes_file")]
    pub modes_file: String,
    #[serde(default = "default_initial_conditions_file")]
    pub initial_conditions_file: String,
    #[serde(default)]
    pub file_protocol: FileProtocolConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            verbose: default_verbose(),
            backend: default_backend(),
            geometry_file: default_geometry_file(),
            modes_file: default_modes_file(),
            initial_conditions_file: default_initial_conditions_file(),
            file_protocol: FileProtocolConfig::default(),
            network: NetworkConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

/// External program that is started once per geometry and communicates through files.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FileProtocolConfig {
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default = "default_input_name")]
    pub input_name: String,
    // root label of every electronic state in the output, 1..=N if not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_labels: Option<Vec<usize>>,
    #[serde(default = "default_orbital_file")]
    pub orbital_file: String,
    #[serde(default = "default_capture_stdout")]
    pub capture_stdout: bool,
    // input groups, e.g. [file_protocol.groups.contrl] scftyp = "mcscf"
    #[serde(default)]
    pub groups: BTreeMap<String, BTreeMap<String, toml::Value>>,
}

impl Default for FileProtocolConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            arguments: Vec::new(),
            input_name: default_input_name(),
            state_labels: None,
            orbital_file: default_orbital_file(),
            capture_stdout: default_capture_stdout(),
            groups: BTreeMap::new(),
        }
    }
}

/// Electronic structure server that is reached over TCP.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NetworkConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_wait")]
    pub max_wait: f64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
    #[serde(default = "default_io_timeout")]
    pub io_timeout: f64,
    // highest excited state of the job options, nstates - 1 if not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_state: Option<usize>,
    // options of the electronic structure method, forwarded to every job
    #[serde(default)]
    pub options: BTreeMap<String, toml::Value>,
}

impl NetworkConfig {
    /// The server is polled every `poll_interval` seconds for at most `max_wait` seconds.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.poll_interval > 0.0 && self.poll_interval.is_finite()) {
            return Err(format!(
                "network.poll_interval must be positive, found {}",
                self.poll_interval
            ));
        }
        if !(self.max_wait >= 0.0 && self.max_wait.is_finite()) {
            return Err(format!(
                "network.max_wait must not be negative, found {}",
                self.max_wait
            ));
        }
        if !(self.io_timeout >= 0.0 && self.io_timeout.is_finite()) {
            return Err(format!(
                "network.io_timeout must not be negative, found {}",
                self.io_timeout
            ));
        }
        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_wait: default_max_wait(),
            poll_interval: default_poll_interval(),
            io_timeout: default_io_timeout(),
            max_state: None,
            options: BTreeMap::new(),
        }
    }
}

/// Shifted harmonic potentials for tests of the dynamics.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_force_constant")]
    pub force_constant: f64,
    #[serde(default = "default_energy_gap")]
    pub energy_gap: f64,
    #[serde(default = "default_coupling")]
    pub coupling: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            force_constant: default_force_constant(),
            energy_gap: default_energy_gap(),
            coupling: default_coupling(),
        }
    }
}
