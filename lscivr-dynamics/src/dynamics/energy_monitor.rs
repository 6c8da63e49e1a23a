use crate::errors::{DynamicsError, Result};

/// Compares the total energy with the initial energy E0 and fails if the
/// relative loss (E0 - E) / E0 exceeds the threshold. Returns the relative loss.
pub fn check_energy_conservation(initial: f64, current: f64, threshold: f64) -> Result<f64> {
    let drift: f64 = (initial - current) / initial;
    if drift > threshold {
        return Err(DynamicsError::EnergyConservation {
            initial,
            current,
            percentage: 100.0 * drift,
        });
    }
    Ok(drift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn small_drift_is_accepted() {
        let drift = check_energy_conservation(0.055, 0.0545, 0.02).unwrap();
        assert_abs_diff_eq!(drift, 0.0005 / 0.055, epsilon = 1e-12);
        // a gain of energy passes the one-sided check
        assert!(check_energy_conservation(0.055, 0.07, 0.02).is_ok());
    }

    #[test]
    fn large_drift_is_fatal() {
        match check_energy_conservation(1.0, 0.97, 0.02) {
            Err(DynamicsError::EnergyConservation { percentage, .. }) => {
                assert_abs_diff_eq!(percentage, 3.0, epsilon = 1e-10)
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
