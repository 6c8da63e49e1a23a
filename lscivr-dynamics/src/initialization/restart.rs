use crate::dynamics::{DerivativeHistory, Derivatives, IntegratorState, PhaseSpace, HISTORY_LENGTH};
use crate::errors::{DynamicsError, Result};
use crate::initialization::IntegratorKind;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};

const COORDINATES_HEADER: &str = "Coordinates (a.u.) at the last update:";
const DERIVATIVES_HEADER: &str = "Derivatives (a.u.) at the last 4 time steps:";
const ENERGY_HEADER: &str = "Energy at the last time step";
const TIME_HEADER: &str = "Total time in a.u.";
const STEP_HEADER: &str = "Step index";
const INTEGRATOR_HEADER: &str = "Integrator";
const STATES_HEADER: &str = "Electronic states";
const HEADERS: [&str; 7] = [
    COORDINATES_HEADER,
    DERIVATIVES_HEADER,
    ENERGY_HEADER,
    TIME_HEADER,
    STEP_HEADER,
    INTEGRATOR_HEADER,
    STATES_HEADER,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Layout {
    Json,
    Yaml,
    Text,
}

impl Layout {
    fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.to_lowercase())
            .as_deref()
        {
            Some("json") => Layout::Json,
            Some("yaml") | Some("yml") => Layout::Yaml,
            _ => Layout::Text,
        }
    }
}

/// Everything that is needed to continue a trajectory after the last accepted step.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub integrator: IntegratorKind,
    pub n_states: usize,
    pub step: usize,
    pub time: f64,
    pub energy: f64,
    pub coordinates: PhaseSpace,
    // oldest first, the last entry belongs to `coordinates`
    pub derivatives: Vec<Derivatives>,
}

impl Checkpoint {
    pub fn new(
        integrator: IntegratorKind,
        n_states: usize,
        point: &PhaseSpace,
        state: &IntegratorState,
        energy: f64,
    ) -> Self {
        Self {
            integrator,
            n_states,
            step: state.step,
            time: state.time,
            energy,
            coordinates: point.clone(),
            derivatives: state.history.oldest_first(),
        }
    }

    pub fn integrator_state(&self) -> IntegratorState {
        IntegratorState {
            time: self.time,
            step: self.step,
            history: DerivativeHistory::from_oldest_first(self.derivatives.clone()),
        }
    }

    /// Checks that the checkpoint belongs to the configured trajectory.
    pub fn verify(
        &self,
        path: &Path,
        ndof: usize,
        integrator: IntegratorKind,
        n_states: usize,
    ) -> Result<()> {
        if self.coordinates.ndof() != ndof
            || self.derivatives.iter().any(|entry| entry.ndof() != ndof)
        {
            return Err(DynamicsError::Shape(format!(
                "restart file {} holds {} degrees of freedom, the system has {}",
                path.display(),
                self.coordinates.ndof(),
                ndof
            )));
        }
        let reason: Option<String> = if self.integrator != integrator {
            Some(format!(
                "written by the {} integrator, but {} is configured",
                self.integrator, integrator
            ))
        } else if self.n_states != n_states {
            Some(format!(
                "written for {} electronic states, but {} are configured",
                self.n_states, n_states
            ))
        } else if self.derivatives.is_empty() || self.derivatives.len() > HISTORY_LENGTH {
            Some(format!(
                "{} stored derivatives, expected 1 to {}",
                self.derivatives.len(),
                HISTORY_LENGTH
            ))
        } else {
            None
        };
        match reason {
            Some(reason) => Err(DynamicsError::Restart {
                path: path.to_path_buf(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Writes the checkpoint to a temporary file that replaces `path` afterwards.
    pub fn write(&self, path: &Path) -> Result<()> {
        let content: String = match Layout::from_path(path) {
            Layout::Json => serde_json::to_string_pretty(self).map_err(|err| restart_error(path, err))?,
            Layout::Yaml => serde_yaml::to_string(self).map_err(|err| restart_error(path, err))?,
            Layout::Text => self.to_text(),
        };
        let mut temporary: OsString = path.as_os_str().to_owned();
        temporary.push(".tmp");
        let temporary: PathBuf = PathBuf::from(temporary);
        fs::write(&temporary, content)?;
        fs::rename(&temporary, path)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content: String = fs::read_to_string(path).map_err(|err| restart_error(path, err))?;
        match Layout::from_path(path) {
            Layout::Json => serde_json::from_str(&content).map_err(|err| restart_error(path, err)),
            Layout::Yaml => serde_yaml::from_str(&content).map_err(|err| restart_error(path, err)),
            Layout::Text => Self::from_text(&content).map_err(|reason| DynamicsError::Restart {
                path: path.to_path_buf(),
                reason,
            }),
        }
    }

    pub fn to_text(&self) -> String {
        let mut text: String = String::new();
        // writing into a String cannot fail
        let _ = writeln!(text, "{}", INTEGRATOR_HEADER);
        let _ = writeln!(text, "{}", self.integrator);
        let _ = writeln!(text, "{}", STATES_HEADER);
        let _ = writeln!(text, "{}", self.n_states);
        let _ = writeln!(text, "{}", STEP_HEADER);
        let _ = writeln!(text, "{}", self.step);
        let _ = writeln!(text, "{}", TIME_HEADER);
        let _ = writeln!(text, "{:>25.16e}", self.time);
        let _ = writeln!(text, "{}", ENERGY_HEADER);
        let _ = writeln!(text, "{:>25.16e}", self.energy);
        let _ = writeln!(text, "{}", COORDINATES_HEADER);
        write_pairs(&mut text, &self.coordinates);
        let _ = writeln!(text, "{}", DERIVATIVES_HEADER);
        let n_entries: usize = self.derivatives.len();
        for (index, entry) in self.derivatives.iter().enumerate() {
            let age: usize = n_entries - 1 - index;
            if age == 0 {
                let _ = writeln!(text, "t = 0");
            } else {
                let _ = writeln!(text, "t = -{}", age);
            }
            write_pairs(&mut text, entry);
        }
        text
    }

    /// Parses the text layout. The sections are found by their headers, their order is free.
    pub fn from_text(input: &str) -> std::result::Result<Self, String> {
        let lines: Vec<&str> = input.lines().map(|line| line.trim()).collect();

        let integrator: IntegratorKind = single_value(&lines, INTEGRATOR_HEADER)?
            .parse()
            .map_err(|err: DynamicsError| err.to_string())?;
        let n_states: usize = parse_number(single_value(&lines, STATES_HEADER)?, STATES_HEADER)?;
        let step: usize = parse_number(single_value(&lines, STEP_HEADER)?, STEP_HEADER)?;
        let time: f64 = parse_number(single_value(&lines, TIME_HEADER)?, TIME_HEADER)?;
        let energy: f64 = parse_number(single_value(&lines, ENERGY_HEADER)?, ENERGY_HEADER)?;

        let start: usize = find_section(&lines, COORDINATES_HEADER)?;
        let (coordinates, _) = read_pairs(&lines, start);
        if coordinates.ndof() == 0 {
            return Err(format!("no values below '{}'", COORDINATES_HEADER));
        }

        let mut position: usize = find_section(&lines, DERIVATIVES_HEADER)?;
        let mut derivatives: Vec<Derivatives> = Vec::new();
        while let Some(line) = lines.get(position) {
            if !line.starts_with("t =") {
                break;
            }
            let (entry, next) = read_pairs(&lines, position + 1);
            if entry.ndof() != coordinates.ndof() {
                return Err(format!(
                    "derivative block '{}' holds {} values, the coordinates {}",
                    line,
                    entry.ndof(),
                    coordinates.ndof()
                ));
            }
            derivatives.push(entry);
            position = next;
        }
        if derivatives.is_empty() {
            return Err(format!("no derivative blocks below '{}'", DERIVATIVES_HEADER));
        }

        Ok(Self {
            integrator,
            n_states,
            step,
            time,
            energy,
            coordinates,
            derivatives,
        })
    }
}

fn restart_error<E: std::fmt::Display>(path: &Path, err: E) -> DynamicsError {
    DynamicsError::Restart {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

fn write_pairs(text: &mut String, point: &PhaseSpace) {
    for (q, p) in point.q.iter().zip(point.p.iter()) {
        let _ = writeln!(text, "{:>25.16e}{:>25.16e}", q, p);
    }
}

fn find_section(lines: &[&str], header: &str) -> std::result::Result<usize, String> {
    lines
        .iter()
        .position(|line| *line == header)
        .map(|index| index + 1)
        .ok_or_else(|| format!("section '{}' is missing", header))
}

fn single_value<'a>(lines: &[&'a str], header: &str) -> std::result::Result<&'a str, String> {
    let start: usize = find_section(lines, header)?;
    lines[start..]
        .iter()
        .find(|line| !line.is_empty())
        .filter(|line| !HEADERS.contains(*line))
        .copied()
        .ok_or_else(|| format!("no value below '{}'", header))
}

fn parse_number<T: std::str::FromStr>(value: &str, header: &str) -> std::result::Result<T, String> {
    value
        .parse::<T>()
        .map_err(|_| format!("cannot read '{}' below '{}'", value, header))
}

/// Reads `q p` lines from `start` on until a line does not hold exactly two numbers.
/// Returns the values and the index of the first line that was not consumed.
fn read_pairs(lines: &[&str], start: usize) -> (PhaseSpace, usize) {
    let mut q: Vec<f64> = Vec::new();
    let mut p: Vec<f64> = Vec::new();
    let mut position: usize = start;
    while let Some(line) = lines.get(position) {
        let values: Vec<f64> = match line
            .split_whitespace()
            .map(|word| word.parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
        {
            Ok(values) if values.len() == 2 => values,
            _ => break,
        };
        q.push(values[0]);
        p.push(values[1]);
        position += 1;
    }
    (
        PhaseSpace {
            q: Array1::from(q),
            p: Array1::from(p),
        },
        position,
    )
}
