use crate::defaults::CONFIG_FILE_NAME;
use crate::io::geometry::{read_geometry, read_initial_conditions, read_normal_modes, Molecule};
use crate::io::Configuration;
use anyhow::{anyhow, Context, Result};
use log::info;
use lscivr_dynamics::initialization::{DynamicConfiguration, InitialConditions, SystemData};
use ndarray::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads the configuration file of the trajectory directory. If it does not exist,
/// the default settings are written to the directory so that the user can see
/// all the used options.
pub fn read_input(directory: &Path) -> Result<Configuration> {
    let config_file_path: PathBuf = directory.join(CONFIG_FILE_NAME);
    let exists: bool = config_file_path.exists();
    let config_string: String = if exists {
        fs::read_to_string(&config_file_path)
            .with_context(|| format!("unable to read {}", config_file_path.display()))?
    } else {
        String::new()
    };
    let config: Configuration = toml::from_str(&config_string)
        .with_context(|| format!("invalid settings in {}", config_file_path.display()))?;
    config
        .network
        .validate()
        .map_err(|message| anyhow!("invalid settings in {}: {}", config_file_path.display(), message))?;
    if !exists {
        let config_string: String = toml::to_string(&config)?;
        fs::write(&config_file_path, config_string)
            .with_context(|| format!("unable to write {}", config_file_path.display()))?;
    }
    Ok(config)
}

/// Loads the molecule, the normal modes and the initial conditions of a trajectory.
/// A restarted trajectory takes its phase space point from the restart file and
/// only needs the molecule.
pub fn create_system_data(
    directory: &Path,
    config: &Configuration,
    dynamic_config: DynamicConfiguration,
) -> Result<SystemData> {
    let molecule: Molecule = read_geometry(&directory.join(&config.geometry_file))?;
    let n_cartesian: usize = 3 * molecule.n_atoms();
    let restart: bool = dynamic_config.restart_flag;
    let system = SystemData::new(
        dynamic_config,
        molecule.labels,
        molecule.masses,
        molecule.coordinates,
    )?;
    if restart {
        return Ok(system);
    }

    let modes: Array2<f64> = read_normal_modes(&directory.join(&config.modes_file), n_cartesian)?;
    let system = system.with_normal_modes(modes.view())?;
    let conditions_path: PathBuf = directory.join(&config.initial_conditions_file);
    let conditions: InitialConditions = if conditions_path.exists() {
        read_initial_conditions(&conditions_path)?
    } else {
        info!(
            "{} not found, the trajectory starts at the reference geometry",
            conditions_path.display()
        );
        InitialConditions::default()
    };
    Ok(system.with_initial_conditions(conditions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lscivr_dynamics::constants::BOHR_TO_ANGS;
    use approx::assert_abs_diff_eq;

    #[test]
    fn default_settings_are_written() {
        let directory = tempfile::tempdir().unwrap();
        let config = read_input(directory.path()).unwrap();
        assert_eq!(config, Configuration::default());
        assert!(directory.path().join(CONFIG_FILE_NAME).exists());
        assert_eq!(read_input(directory.path()).unwrap(), config);
    }

    #[test]
    fn invalid_server_waits_are_rejected() {
        let directory = tempfile::tempdir().unwrap();
        fs::write(
            directory.path().join(CONFIG_FILE_NAME),
            "backend = \"network\"\n[network]\npoll_interval = 0.0\n",
        )
        .unwrap();
        let error = read_input(directory.path()).unwrap_err();
        assert!(format!("{:#}", error).contains("poll_interval"));
    }

    #[test]
    fn system_from_the_input_files() {
        let directory = tempfile::tempdir().unwrap();
        fs::write(
            directory.path().join("geometry.dat"),
            "2\nH 1.0 0.0 0.0 -0.37\nH 1.0 0.0 0.0 0.37\n",
        )
        .unwrap();
        let identity: String = (0..6)
            .map(|i| {
                (0..6)
                    .map(|j| if i == j { "1.0" } else { "0.0" })
                    .collect::<Vec<&str>>()
                    .join(" ")
            })
            .collect::<Vec<String>>()
            .join("\n");
        fs::write(directory.path().join("modes.dat"), identity).unwrap();

        let config = Configuration::default();
        let mut dynamic_config = DynamicConfiguration::default();
        dynamic_config.null_modes = 5;
        let system = create_system_data(directory.path(), &config, dynamic_config).unwrap();
        assert_eq!(system.n_atoms, 2);
        assert_eq!(system.normal_modes.as_ref().unwrap().n_modes(), 1);

        let point = system.initial_phase_space().unwrap();
        assert_eq!(point.ndof(), 2 + 6);
        // the molecule starts at rest in the reference geometry
        assert_abs_diff_eq!(point.q[7], 0.37 / BOHR_TO_ANGS, epsilon = 1e-10);
        assert_abs_diff_eq!(point.p.sum(), 0.0, epsilon = 1e-14);
    }
}
