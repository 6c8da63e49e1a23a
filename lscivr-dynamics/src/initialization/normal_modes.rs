use crate::defaults::ORTHONORMALITY_THRESHOLD;
use crate::errors::{DynamicsError, Result};
use log::{debug, info};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::prelude::*;

/// Largest deviation of U^T U from the identity.
pub fn orthonormality_deviation(matrix: ArrayView2<f64>) -> f64 {
    let overlap: Array2<f64> = matrix.t().dot(&matrix);
    let identity: Array2<f64> = Array2::eye(overlap.nrows());
    (&overlap - &identity)
        .iter()
        .fold(0.0, |max: f64, value| max.max(value.abs()))
}

fn normalize_columns(matrix: &mut Array2<f64>) {
    for mut column in matrix.columns_mut() {
        let norm: f64 = column.dot(&column).sqrt();
        if norm > 0.0 {
            column /= norm;
        }
    }
}

/// Symmetric (Loewdin) orthogonalization U (U^T U)^(-1/2).
fn loewdin_orthogonalization(matrix: ArrayView2<f64>) -> Result<Array2<f64>> {
    let n: usize = matrix.ncols();
    let overlap: Array2<f64> = matrix.t().dot(&matrix);
    let overlap: DMatrix<f64> = DMatrix::from_fn(n, n, |i, j| overlap[[i, j]]);
    let eigen = SymmetricEigen::new(overlap);
    if let Some(smallest) = eigen.eigenvalues.iter().cloned().reduce(f64::min) {
        if smallest <= f64::EPSILON {
            return Err(DynamicsError::ModeMatrix(smallest));
        }
    }
    let inverse_root: DMatrix<f64> = &eigen.eigenvectors
        * DMatrix::from_diagonal(&eigen.eigenvalues.map(|value| value.sqrt().recip()))
        * eigen.eigenvectors.transpose();
    let inverse_root: Array2<f64> = Array2::from_shape_fn((n, n), |(i, j)| inverse_root[(i, j)]);
    Ok(matrix.dot(&inverse_root))
}

/// Mass-weighted rotation between cartesian coordinates and the vibrational normal coordinates.
/// `modes` holds one row per vibrational mode (the rigid-body rows are removed)
/// and `masses` one entry per cartesian coordinate in atomic units.
#[derive(Clone, Debug)]
pub struct NormalModes {
    pub modes: Array2<f64>,
    pub masses: Array1<f64>,
}

impl NormalModes {
    /// `displacements` holds one cartesian displacement vector per row, starting with the
    /// `null_modes` translations and rotations.
    pub fn new(displacements: ArrayView2<f64>, masses: ArrayView1<f64>, null_modes: usize) -> Result<Self> {
        let n_cart: usize = masses.len();
        if displacements.dim() != (n_cart, n_cart) {
            return Err(DynamicsError::Shape(format!(
                "mode matrix of shape {:?} does not match {} cartesian coordinates",
                displacements.dim(),
                n_cart
            )));
        }
        if null_modes > n_cart {
            return Err(DynamicsError::Shape(format!(
                "{} rigid-body modes exceed {} cartesian coordinates",
                null_modes, n_cart
            )));
        }
        // U = L^T sqrt(M) with one row per mode
        let sqrt_masses: Array1<f64> = masses.mapv(f64::sqrt);
        let mut rotation: Array2<f64> = &displacements * &sqrt_masses;
        normalize_columns(&mut rotation);

        let mut deviation: f64 = orthonormality_deviation(rotation.view());
        debug!("Orthonormality deviation of the mode matrix: {:.3e}", deviation);
        if deviation > ORTHONORMALITY_THRESHOLD {
            rotation = loewdin_orthogonalization(rotation.view())?;
            normalize_columns(&mut rotation);
            deviation = orthonormality_deviation(rotation.view());
            info!(
                "Mode matrix orthogonalized, remaining deviation {:.3e}",
                deviation
            );
            if deviation > ORTHONORMALITY_THRESHOLD {
                return Err(DynamicsError::ModeMatrix(deviation));
            }
        }

        Ok(Self {
            modes: rotation.slice(s![null_modes.., ..]).to_owned(),
            masses: masses.to_owned(),
        })
    }

    pub fn n_modes(&self) -> usize {
        self.modes.nrows()
    }

    pub fn n_cartesian(&self) -> usize {
        self.modes.ncols()
    }

    pub fn to_cartesian(
        &self,
        q_normal: ArrayView1<f64>,
        p_normal: ArrayView1<f64>,
    ) -> Result<(Array1<f64>, Array1<f64>)> {
        to_cartesian(q_normal, p_normal, self.modes.view(), self.masses.view())
    }

    pub fn to_normal(
        &self,
        q_cartesian: ArrayView1<f64>,
        p_cartesian: ArrayView1<f64>,
    ) -> Result<(Array1<f64>, Array1<f64>)> {
        to_normal(q_cartesian, p_cartesian, self.modes.view(), self.masses.view())
    }
}

/// q = M^(-1/2) U^T Q and p = M^(1/2) U^T P
pub fn to_cartesian(
    q_normal: ArrayView1<f64>,
    p_normal: ArrayView1<f64>,
    modes: ArrayView2<f64>,
    masses: ArrayView1<f64>,
) -> Result<(Array1<f64>, Array1<f64>)> {
    if q_normal.len() != modes.nrows()
        || p_normal.len() != modes.nrows()
        || masses.len() != modes.ncols()
    {
        return Err(DynamicsError::Shape(format!(
            "{}/{} normal coordinates and {} masses do not match the mode matrix {:?}",
            q_normal.len(),
            p_normal.len(),
            masses.len(),
            modes.dim()
        )));
    }
    let sqrt_masses: Array1<f64> = masses.mapv(f64::sqrt);
    let q: Array1<f64> = modes.t().dot(&q_normal) / &sqrt_masses;
    let p: Array1<f64> = modes.t().dot(&p_normal) * &sqrt_masses;
    Ok((q, p))
}

/// Q = U M^(1/2) q and P = U M^(-1/2) p
pub fn to_normal(
    q_cartesian: ArrayView1<f64>,
    p_cartesian: ArrayView1<f64>,
    modes: ArrayView2<f64>,
    masses: ArrayView1<f64>,
) -> Result<(Array1<f64>, Array1<f64>)> {
    if q_cartesian.len() != modes.ncols()
        || p_cartesian.len() != modes.ncols()
        || masses.len() != modes.ncols()
    {
        return Err(DynamicsError::Shape(format!(
            "{}/{} cartesian coordinates and {} masses do not match the mode matrix {:?}",
            q_cartesian.len(),
            p_cartesian.len(),
            masses.len(),
            modes.dim()
        )));
    }
    let sqrt_masses: Array1<f64> = masses.mapv(f64::sqrt);
    let q: Array1<f64> = modes.dot(&(&q_cartesian * &sqrt_masses));
    let p: Array1<f64> = modes.dot(&(&p_cartesian / &sqrt_masses));
    Ok((q, p))
}
