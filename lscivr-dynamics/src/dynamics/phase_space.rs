use crate::errors::{DynamicsError, Result};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

/// Positions and momenta of the mapping variables (first `n_states` entries)
/// followed by the nuclear cartesian coordinates in atomic units.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PhaseSpace {
    pub q: Array1<f64>,
    pub p: Array1<f64>,
}

/// Time derivatives (dq/dt, dp/dt) share the layout of the phase space.
pub type Derivatives = PhaseSpace;

impl PhaseSpace {
    pub fn new(q: Array1<f64>, p: Array1<f64>) -> Result<Self> {
        if q.len() != p.len() {
            return Err(DynamicsError::Shape(format!(
                "{} positions but {} momenta",
                q.len(),
                p.len()
            )));
        }
        Ok(Self { q, p })
    }

    pub fn zeros(ndof: usize) -> Self {
        Self {
            q: Array1::zeros(ndof),
            p: Array1::zeros(ndof),
        }
    }

    pub fn ndof(&self) -> usize {
        self.q.len()
    }

    pub fn nuclear_coordinates(&self, n_states: usize) -> ArrayView1<f64> {
        self.q.slice(s![n_states..])
    }

    pub fn nuclear_momenta(&self, n_states: usize) -> ArrayView1<f64> {
        self.p.slice(s![n_states..])
    }

    /// y + h * f
    pub fn displaced(&self, rate: &Derivatives, h: f64) -> PhaseSpace {
        let mut q: Array1<f64> = self.q.clone();
        let mut p: Array1<f64> = self.p.clone();
        q.scaled_add(h, &rate.q);
        p.scaled_add(h, &rate.p);
        PhaseSpace { q, p }
    }

    /// y + h * sum_k c_k f_k
    pub fn combine(&self, h: f64, terms: &[(f64, &Derivatives)]) -> PhaseSpace {
        let mut q: Array1<f64> = self.q.clone();
        let mut p: Array1<f64> = self.p.clone();
        for (weight, rate) in terms.iter() {
            q.scaled_add(h * weight, &rate.q);
            p.scaled_add(h * weight, &rate.p);
        }
        PhaseSpace { q, p }
    }

    /// Average of two points
    pub fn midpoint(&self, other: &PhaseSpace) -> PhaseSpace {
        PhaseSpace {
            q: (&self.q + &other.q) * 0.5,
            p: (&self.p + &other.p) * 0.5,
        }
    }

    /// Root mean square deviation over all positions and momenta.
    pub fn rms_difference(&self, other: &PhaseSpace) -> f64 {
        let dq: f64 = (&self.q - &other.q).mapv(|x| x * x).sum();
        let dp: f64 = (&self.p - &other.p).mapv(|x| x * x).sum();
        ((dq + dp) / (2 * self.ndof()) as f64).sqrt()
    }
}
