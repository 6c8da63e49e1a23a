use crate::defaults::CURRENT_GEOMETRY_FILE_NAME;
use crate::io::{format_geometry, FileProtocolConfig};
use crate::utils::Timer;
use anyhow::bail;
use log::{debug, info};
use lscivr_dynamics::interface::{
    ElectronicStructure, ElectronicTargets, QCInterface, QCRequest, RequestKind,
};
use lscivr_dynamics::OracleFailure;
use ndarray::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub use input::{format_group, write_input};
pub use parser::{parse_orbitals, parse_output};

mod input;
mod parser;

fn unavailable<E: std::fmt::Display>(context: &str, path: &Path, error: E) -> OracleFailure {
    OracleFailure::Unavailable(format!("{} {}: {}", context, path.display(), error))
}

/// External program that is started once per geometry. It reads an input file,
/// writes its results to `<input_name>.out` and its orbitals to `<input_name>.dat`.
/// A single run provides all gradients and couplings of the configured job.
pub struct FileProtocolInterface {
    directory: PathBuf,
    config: FileProtocolConfig,
    labels: Vec<String>,
    // amu per atom
    masses: Array1<f64>,
    state_labels: Vec<usize>,
}

impl FileProtocolInterface {
    pub fn new(
        directory: &Path,
        config: FileProtocolConfig,
        labels: Vec<String>,
        masses: Array1<f64>,
        n_states: usize,
    ) -> anyhow::Result<Self> {
        let state_labels: Vec<usize> = match &config.state_labels {
            Some(state_labels) => state_labels.clone(),
            None => (1..=n_states).collect(),
        };
        if state_labels.len() != n_states {
            bail!(
                "{} state labels given for {} electronic states",
                state_labels.len(),
                n_states
            );
        }
        if labels.len() != masses.len() {
            bail!("{} atom labels but {} masses", labels.len(), masses.len());
        }
        Ok(Self {
            directory: directory.to_path_buf(),
            config,
            labels,
            masses,
            state_labels,
        })
    }

    fn path(&self, extension: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{}", self.config.input_name, extension))
    }

    fn orbital_path(&self) -> PathBuf {
        self.directory.join(&self.config.orbital_file)
    }

    /// Writes the geometry and the input of the job. The input of the previous job is kept as
    /// `<input_name>_old.inp`.
    fn prepare(&self, coordinates: ArrayView1<f64>) -> Result<(), OracleFailure> {
        let geometry_path: PathBuf = self.directory.join(CURRENT_GEOMETRY_FILE_NAME);
        fs::write(
            &geometry_path,
            format_geometry(&self.labels, self.masses.view(), coordinates),
        )
        .map_err(|error| unavailable("unable to write", &geometry_path, error))?;

        let orbital_path: PathBuf = self.orbital_path();
        let orbitals: Option<String> = if orbital_path.exists() {
            Some(
                fs::read_to_string(&orbital_path)
                    .map_err(|error| unavailable("unable to read", &orbital_path, error))?,
            )
        } else {
            None
        };

        let input_path: PathBuf = self.path("inp");
        if input_path.exists() {
            let old_path: PathBuf = self
                .directory
                .join(format!("{}_old.inp", self.config.input_name));
            fs::rename(&input_path, &old_path)
                .map_err(|error| unavailable("unable to move", &input_path, error))?;
        }
        let input: String = write_input(
            &self.config.groups,
            &self.labels,
            self.masses.view(),
            coordinates,
            orbitals.as_deref(),
        );
        fs::write(&input_path, input).map_err(|error| unavailable("unable to write", &input_path, error))
    }

    /// Runs the program synchronously in the trajectory directory.
    fn execute(&self) -> Result<(), OracleFailure> {
        let input_file: String = format!("{}.inp", self.config.input_name);
        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.arguments)
            .arg(&input_file)
            .current_dir(&self.directory);
        if self.config.capture_stdout {
            let output_path: PathBuf = self.path("out");
            let output_file = fs::File::create(&output_path)
                .map_err(|error| unavailable("unable to create", &output_path, error))?;
            command.stdout(Stdio::from(output_file));
        }
        let status = command.status().map_err(|error| {
            OracleFailure::Unavailable(format!(
                "unable to start '{}': {}",
                self.config.command, error
            ))
        })?;
        if !status.success() {
            return Err(OracleFailure::Unavailable(format!(
                "'{} {} {}' failed with {}",
                self.config.command,
                self.config.arguments.join(" "),
                input_file,
                status
            )));
        }
        Ok(())
    }

    /// Reads all quantities of the output file.
    fn read_output(&self) -> Result<ElectronicStructure, OracleFailure> {
        let output_path: PathBuf = self.path("out");
        let output: String = fs::read_to_string(&output_path)
            .map_err(|error| unavailable("unable to read", &output_path, error))?;
        Ok(parse_output(&output, self.labels.len(), &self.state_labels))
    }

    /// Copies the optimized orbitals of the punch file to the orbital file that serves
    /// as guess of the next job.
    fn store_orbitals(&self) -> Result<PathBuf, OracleFailure> {
        let punch_path: PathBuf = self.path("dat");
        let punch: String =
            fs::read_to_string(&punch_path).map_err(|_| OracleFailure::OrbitalMissing)?;
        let orbitals: String = parse_orbitals(&punch).ok_or(OracleFailure::OrbitalMissing)?;
        let orbital_path: PathBuf = self.orbital_path();
        fs::write(&orbital_path, orbitals)
            .map_err(|error| unavailable("unable to write", &orbital_path, error))?;
        Ok(orbital_path)
    }

    fn run(&self, coordinates: ArrayView1<f64>) -> Result<ElectronicStructure, OracleFailure> {
        let timer: Timer = Timer::start();
        self.prepare(coordinates)?;
        self.execute()?;
        let data: ElectronicStructure = self.read_output()?;
        info!(
            "{:<25} {:>18.2} s",
            format!("{} job:", self.config.command),
            timer.elapsed()
        );
        Ok(data)
    }
}

impl QCInterface for FileProtocolInterface {
    /// Every request runs the complete job, the result contains all quantities the
    /// program printed.
    fn evaluate(
        &mut self,
        coordinates: ArrayView1<f64>,
        request: &QCRequest,
    ) -> Result<ElectronicStructure, OracleFailure> {
        debug!("file protocol request {:?}", request.kind);
        let mut data: ElectronicStructure = self.run(coordinates)?;
        match request.kind {
            RequestKind::Gradient { state, .. }
                if !data.status.gradients.get(state).copied().unwrap_or(false) =>
            {
                return Err(OracleFailure::GradientMissing(state));
            }
            RequestKind::Coupling { bra, ket } if !data.has_coupling(bra, ket) => {
                return Err(OracleFailure::CouplingMissing(bra, ket));
            }
            _ => {}
        }
        data.orbitals = Some(self.store_orbitals()?.display().to_string());
        Ok(data)
    }

    fn compute_data(
        &mut self,
        coordinates: ArrayView1<f64>,
        targets: &ElectronicTargets,
    ) -> Result<ElectronicStructure, OracleFailure> {
        let mut data: ElectronicStructure = self.run(coordinates)?;
        data.verify(targets)?;
        data.orbitals = Some(self.store_orbitals()?.display().to_string());
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const PROGRAM: &str = r#"#!/bin/sh
cat << 'EOF'
 STATE-SPECIFIC GRADIENT OF STATE   1
 E=     -1.0000000000
    1 H        0.1000000000    0.0000000000    0.0000000000
    2 H       -0.1000000000    0.0000000000    0.0000000000
 STATE-SPECIFIC GRADIENT OF STATE   2
 E=     -0.5000000000
    1 H        0.2000000000    0.0000000000    0.0000000000
    2 H       -0.2000000000    0.0000000000    0.0000000000
 NONADIABATIC COUPLING MATRIX ELEMENT
 <STATE  2 | D/DR | STATE  1>
    1 H        0.0000000000    0.0000000000    0.3000000000
    2 H        0.0000000000    0.0000000000   -0.3000000000
EOF
cat > cas.dat << 'EOF'
--- OPTIMIZED MCSCF MO-S ---
 $VEC
 1  1 1.0E+00
 $END
EOF
"#;

    fn interface(directory: &Path, script: &str) -> FileProtocolInterface {
        let program: PathBuf = directory.join("program.sh");
        fs::write(&program, script).unwrap();
        let config = FileProtocolConfig {
            command: String::from("sh"),
            arguments: vec![program.display().to_string()],
            ..FileProtocolConfig::default()
        };
        FileProtocolInterface::new(
            directory,
            config,
            vec![String::from("H"), String::from("H")],
            array![1.0078, 1.0078],
            2,
        )
        .unwrap()
    }

    #[test]
    fn one_run_provides_all_quantities() {
        let directory = tempfile::tempdir().unwrap();
        let mut oracle = interface(directory.path(), PROGRAM);
        let coordinates = array![0.0, 0.0, -0.7, 0.0, 0.0, 0.7];

        let data = oracle
            .compute_data(coordinates.view(), &ElectronicTargets::all(2))
            .unwrap();
        assert_abs_diff_eq!(data.energies, array![-1.0, -0.5], epsilon = 1e-12);
        assert_abs_diff_eq!(data.couplings[[0, 1, 2]], -0.3, epsilon = 1e-12);
        assert!(directory.path().join("geometry_current.dat").exists());
        assert!(directory.path().join("vec.dat").exists());
        assert!(!fs::read_to_string(directory.path().join("cas.inp"))
            .unwrap()
            .contains("$VEC"));

        // the orbitals of the first run are the guess of the second one
        oracle
            .compute_data(coordinates.view(), &ElectronicTargets::all(2))
            .unwrap();
        assert!(directory.path().join("cas_old.inp").exists());
        assert!(fs::read_to_string(directory.path().join("cas.inp"))
            .unwrap()
            .contains(" $VEC"));
    }

    #[test]
    fn failures_are_specific() {
        let directory = tempfile::tempdir().unwrap();
        let coordinates = array![0.0, 0.0, -0.7, 0.0, 0.0, 0.7];

        let mut failing = interface(directory.path(), "#!/bin/sh\nexit 3\n");
        let failure = failing
            .compute_data(coordinates.view(), &ElectronicTargets::all(2))
            .unwrap_err();
        assert!(matches!(failure, OracleFailure::Unavailable(_)));

        let without_orbitals: String = PROGRAM.replace("OPTIMIZED", "NATURAL");
        let mut oracle = interface(directory.path(), &without_orbitals);
        assert_eq!(
            oracle.compute_data(coordinates.view(), &ElectronicTargets::all(2)),
            Err(OracleFailure::OrbitalMissing)
        );

        let without_coupling: String = PROGRAM.replace("NONADIABATIC", "DIABATIC");
        let mut oracle = interface(directory.path(), &without_coupling);
        assert_eq!(
            oracle.compute_data(coordinates.view(), &ElectronicTargets::all(2)),
            Err(OracleFailure::CouplingMissing(0, 1))
        );
        let request = QCRequest::new(RequestKind::Gradient {
            state: 1,
            excited_states: None,
        });
        assert!(oracle.evaluate(coordinates.view(), &request).is_ok());
    }

    #[test]
    fn state_labels_have_to_match_the_states() {
        let directory = tempfile::tempdir().unwrap();
        let config = FileProtocolConfig {
            state_labels: Some(vec![1, 2, 3]),
            ..FileProtocolConfig::default()
        };
        let labels = vec![String::from("H")];
        assert!(
            FileProtocolInterface::new(directory.path(), config, labels, array![1.0078], 2)
                .is_err()
        );
    }
}
