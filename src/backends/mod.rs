use crate::io::{Backend, Configuration};
use log::info;
use lscivr_dynamics::initialization::SystemData;
use lscivr_dynamics::interface::{HarmonicModel, QCInterface};
use std::path::Path;

pub mod file_protocol;
pub mod network;

pub use file_protocol::FileProtocolInterface;
pub use network::NetworkInterface;

/// Builds the electronic structure backend of the trajectory in `directory`.
pub fn create_interface(
    directory: &Path,
    config: &Configuration,
    system: &SystemData,
) -> anyhow::Result<Box<dyn QCInterface>> {
    let n_states: usize = system.config.nstates;
    let interface: Box<dyn QCInterface> = match config.backend {
        Backend::File => {
            info!("electronic structure from '{}'", config.file_protocol.command);
            Box::new(FileProtocolInterface::new(
                directory,
                config.file_protocol.clone(),
                system.atom_labels.clone(),
                system.atomic_masses.clone(),
                n_states,
            )?)
        }
        Backend::Network => {
            info!(
                "electronic structure from the server at {}:{}",
                config.network.host, config.network.port
            );
            Box::new(NetworkInterface::new(
                directory,
                config.network.clone(),
                system.atom_labels.clone(),
                n_states,
            )?)
        }
        Backend::Model => {
            info!("electronic structure from the harmonic model");
            Box::new(HarmonicModel::equidistant(
                n_states,
                config.model.force_constant,
                config.model.energy_gap,
                config.model.coupling,
            ))
        }
    };
    Ok(interface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lscivr_dynamics::initialization::DynamicConfiguration;
    use lscivr_dynamics::interface::{ElectronicTargets, QCRequest, RequestKind};
    use ndarray::prelude::*;

    fn hydrogen() -> SystemData {
        SystemData::new(
            DynamicConfiguration::default(),
            vec![String::from("H"), String::from("H")],
            array![1.0078, 1.0078],
            array![0.0, 0.0, -0.7, 0.0, 0.0, 0.7],
        )
        .unwrap()
    }

    #[test]
    fn model_backend() {
        let directory = tempfile::tempdir().unwrap();
        let mut config = Configuration::default();
        config.model.energy_gap = 0.25;
        let system = hydrogen();
        let mut interface = create_interface(directory.path(), &config, &system).unwrap();
        let data = interface
            .compute_data(system.coordinates.view(), &ElectronicTargets::all(2))
            .unwrap();
        assert!((data.energies[1] - data.energies[0] - 0.25).abs() < 1e-14);
        assert!(interface
            .evaluate(
                system.coordinates.view(),
                &QCRequest::new(RequestKind::Energy)
            )
            .is_ok());
    }

    #[test]
    fn backend_settings_are_checked() {
        let directory = tempfile::tempdir().unwrap();
        let mut config = Configuration::default();
        config.backend = Backend::File;
        config.file_protocol.state_labels = Some(vec![1]);
        assert!(create_interface(directory.path(), &config, &hydrogen()).is_err());

        config.backend = Backend::Network;
        assert!(create_interface(directory.path(), &config, &hydrogen()).is_ok());
    }
}
