use crate::constants;
use crate::dynamics::PhaseSpace;
use crate::errors::{DynamicsError, Result};
use crate::initialization::normal_modes::NormalModes;
use crate::initialization::DynamicConfiguration;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

/// Sampled initial conditions: mapping variables and mass-weighted normal coordinates.
/// Empty nuclear entries select the reference geometry at rest.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct InitialConditions {
    #[serde(default)]
    pub elec_q: Vec<f64>,
    #[serde(default)]
    pub elec_p: Vec<f64>,
    #[serde(default)]
    pub nucl_q: Vec<f64>,
    #[serde(default)]
    pub nucl_p: Vec<f64>,
}

/// Struct that hold the data of the molecular system:
/// the reference geometry, the atom labels, the masses and the normal modes
pub struct SystemData {
    // Type that holds all the input settings from the user.
    pub config: DynamicConfiguration,
    pub n_atoms: usize,
    pub atom_labels: Vec<String>,
    // masses of the atoms in amu
    pub atomic_masses: Array1<f64>,
    // masses of every cartesian coordinate in a.u.
    pub masses: Array1<f64>,
    // reference geometry in bohr, x1 y1 z1 x2 ...
    pub coordinates: Array1<f64>,
    pub normal_modes: Option<NormalModes>,
    pub initial_conditions: Option<InitialConditions>,
}

impl SystemData {
    pub fn new(
        config: DynamicConfiguration,
        atom_labels: Vec<String>,
        atomic_masses: Array1<f64>,
        coordinates: Array1<f64>,
    ) -> Result<Self> {
        let n_atoms: usize = atom_labels.len();
        if atomic_masses.len() != n_atoms || coordinates.len() != 3 * n_atoms {
            return Err(DynamicsError::Shape(format!(
                "{} atoms with {} masses and {} cartesian coordinates",
                n_atoms,
                atomic_masses.len(),
                coordinates.len()
            )));
        }
        let masses: Array1<f64> = atomic_masses
            .iter()
            .flat_map(|mass| std::iter::repeat(mass * constants::AMU_TO_AU).take(3))
            .collect();

        Ok(Self {
            config,
            n_atoms,
            atom_labels,
            atomic_masses,
            masses,
            coordinates,
            normal_modes: None,
            initial_conditions: None,
        })
    }

    /// Builds the mass-weighted normal mode transform from the rows of the mode file.
    pub fn with_normal_modes(mut self, mode_matrix: ArrayView2<f64>) -> Result<Self> {
        self.normal_modes = Some(NormalModes::new(
            mode_matrix,
            self.masses.view(),
            self.config.null_modes,
        )?);
        Ok(self)
    }

    pub fn with_initial_conditions(mut self, initial_conditions: InitialConditions) -> Self {
        self.initial_conditions = Some(initial_conditions);
        self
    }

    pub fn center_of_mass(&self) -> Array1<f64> {
        let total: f64 = self.atomic_masses.sum();
        let mut center: Array1<f64> = Array1::zeros(3);
        if total <= 0.0 {
            return center;
        }
        for (atom, mass) in self.atomic_masses.iter().enumerate() {
            for axis in 0..3 {
                center[axis] += mass * self.coordinates[3 * atom + axis];
            }
        }
        center / total
    }

    /// Reference geometry relative to its centre of mass.
    fn centered_coordinates(&self) -> Array1<f64> {
        let center: Array1<f64> = self.center_of_mass();
        Array1::from_shape_fn(self.coordinates.len(), |i| {
            self.coordinates[i] - center[i % 3]
        })
    }

    /// Phase space point at t = 0: the mapping variables followed by the cartesian
    /// nuclear coordinates and momenta obtained from the sampled normal coordinates.
    pub fn initial_phase_space(&self) -> Result<PhaseSpace> {
        let n_states: usize = self.config.nstates;
        let modes: &NormalModes = self.normal_modes.as_ref().ok_or_else(|| {
            DynamicsError::Config(String::from("the normal modes of the system are missing"))
        })?;
        let default_conditions = InitialConditions::default();
        let conditions: &InitialConditions =
            self.initial_conditions.as_ref().unwrap_or(&default_conditions);

        let (elec_q, elec_p): (Array1<f64>, Array1<f64>) =
            if conditions.elec_q.is_empty() && conditions.elec_p.is_empty() {
                let mut elec_q: Array1<f64> = Array1::zeros(n_states);
                elec_q[self.config.initial_state] = 1.0;
                (elec_q, Array1::zeros(n_states))
            } else {
                (
                    Array1::from(conditions.elec_q.clone()),
                    Array1::from(conditions.elec_p.clone()),
                )
            };
        if elec_q.len() != n_states || elec_p.len() != n_states {
            return Err(DynamicsError::Shape(format!(
                "{}/{} mapping variables for {} electronic states",
                elec_q.len(),
                elec_p.len(),
                n_states
            )));
        }

        let centered: Array1<f64> = self.centered_coordinates();
        let q_normal: Array1<f64> = if conditions.nucl_q.is_empty() {
            let (q_normal, _) = modes.to_normal(centered.view(), Array1::zeros(centered.len()).view())?;
            q_normal
        } else {
            Array1::from(conditions.nucl_q.clone())
        };
        let p_normal: Array1<f64> = if conditions.nucl_p.is_empty() {
            Array1::zeros(modes.n_modes())
        } else {
            Array1::from(conditions.nucl_p.clone())
        };
        let (mut q_cartesian, p_cartesian) = modes.to_cartesian(q_normal.view(), p_normal.view())?;

        // translations are projected out of the normal coordinates
        let center: Array1<f64> = self.center_of_mass();
        q_cartesian
            .iter_mut()
            .enumerate()
            .for_each(|(i, value)| *value += center[i % 3]);

        let mut q: Vec<f64> = elec_q.to_vec();
        q.extend(q_cartesian.iter());
        let mut p: Vec<f64> = elec_p.to_vec();
        p.extend(p_cartesian.iter());
        PhaseSpace::new(Array1::from(q), Array1::from(p))
    }
}
