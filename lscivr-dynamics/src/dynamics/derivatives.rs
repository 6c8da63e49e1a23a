use crate::dynamics::{Derivatives, PhaseSpace};
use crate::errors::{DynamicsError, Result};
use itertools::Itertools;
use ndarray::prelude::*;

fn check_dimensions(
    masses: ArrayView1<f64>,
    q: ArrayView1<f64>,
    p: ArrayView1<f64>,
    energies: ArrayView1<f64>,
) -> Result<()> {
    let ndof: usize = energies.len() + masses.len();
    if q.len() != ndof || p.len() != ndof {
        return Err(DynamicsError::Shape(format!(
            "phase space of length {}/{} does not match {} states and {} nuclear coordinates",
            q.len(),
            p.len(),
            energies.len(),
            masses.len()
        )));
    }
    Ok(())
}

/// Equations of motion of the symmetrized mapping Hamiltonian in the adiabatic representation.
/// `couplings[[i, j, ..]]` is the nonadiabatic coupling vector <i|d/dR|j>.
pub fn compute_derivatives(
    masses: ArrayView1<f64>,
    q: ArrayView1<f64>,
    p: ArrayView1<f64>,
    couplings: ArrayView3<f64>,
    gradients: ArrayView2<f64>,
    energies: ArrayView1<f64>,
) -> Result<Derivatives> {
    check_dimensions(masses, q, p, energies)?;
    let n_states: usize = energies.len();
    let n_nuclear: usize = masses.len();
    if gradients.dim() != (n_states, n_nuclear)
        || couplings.dim() != (n_states, n_states, n_nuclear)
    {
        return Err(DynamicsError::Shape(format!(
            "gradients {:?} or couplings {:?} do not match {} states and {} nuclear coordinates",
            gradients.dim(),
            couplings.dim(),
            n_states,
            n_nuclear
        )));
    }
    let inv_n: f64 = 1.0 / n_states as f64;
    let ndof: usize = n_states + n_nuclear;

    let q_el: ArrayView1<f64> = q.slice(s![..n_states]);
    let p_el: ArrayView1<f64> = p.slice(s![..n_states]);
    let velocities: Array1<f64> = &p.slice(s![n_states..]) / &masses;

    let mut dq: Array1<f64> = Array1::zeros(ndof);
    let mut dp: Array1<f64> = Array1::zeros(ndof);

    // mapping variables
    for i in 0..n_states {
        let mut q_coupling: f64 = 0.0;
        let mut p_coupling: f64 = 0.0;
        let mut energy_difference: f64 = 0.0;
        for j in (0..n_states).filter(|j| *j != i) {
            let projection: f64 = couplings.slice(s![j, i, ..]).dot(&velocities);
            q_coupling += q_el[j] * projection;
            p_coupling += p_el[j] * projection;
            energy_difference += energies[i] - energies[j];
        }
        dq[i] = inv_n * p_el[i] * energy_difference + q_coupling;
        dp[i] = -inv_n * q_el[i] * energy_difference + p_coupling;
    }

    // nuclear coordinates
    dq.slice_mut(s![n_states..]).assign(&velocities);

    let mut force: Array1<f64> = gradients.sum_axis(Axis(0)) * (-inv_n);
    for (i, j) in (0..n_states).tuple_combinations() {
        let population: f64 = p_el[i].powi(2) - p_el[j].powi(2) + q_el[i].powi(2) - q_el[j].powi(2);
        let gradient_difference: Array1<f64> = &gradients.row(i) - &gradients.row(j);
        force.scaled_add(-0.5 * inv_n * population, &gradient_difference);

        let coherence: f64 = p_el[i] * p_el[j] + q_el[i] * q_el[j];
        force.scaled_add(
            -coherence * (energies[j] - energies[i]),
            &couplings.slice(s![i, j, ..]),
        );
    }
    dp.slice_mut(s![n_states..]).assign(&force);

    Ok(PhaseSpace { q: dq, p: dp })
}

/// Total energy of the mapping Hamiltonian. Only used for monitoring.
pub fn compute_energy(
    masses: ArrayView1<f64>,
    q: ArrayView1<f64>,
    p: ArrayView1<f64>,
    energies: ArrayView1<f64>,
) -> Result<f64> {
    check_dimensions(masses, q, p, energies)?;
    let n_states: usize = energies.len();
    let inv_n: f64 = 1.0 / n_states as f64;

    let kinetic: f64 = p
        .slice(s![n_states..])
        .iter()
        .zip(masses.iter())
        .map(|(momentum, mass)| 0.5 * momentum * momentum / mass)
        .sum();

    let mut potential: f64 = inv_n * energies.sum();
    for (i, j) in (0..n_states).tuple_combinations() {
        let population: f64 = p[i].powi(2) - p[j].powi(2) + q[i].powi(2) - q[j].powi(2);
        potential += 0.5 * inv_n * population * (energies[i] - energies[j]);
    }
    Ok(kinetic + potential)
}
