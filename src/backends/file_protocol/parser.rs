use lazy_static::lazy_static;
use lscivr_dynamics::interface::ElectronicStructure;
use ndarray::prelude::*;
use regex::Regex;

lazy_static! {
    // 1.23, -0.032, 1.2E-04, .5 and the Fortran exponent 1.2D-04
    static ref FLOAT_RE: String = r"[-+]?(?:\d+\.\d*|\.\d+)(?:[eEdD][-+]?\d+)?".to_string();

    static ref NUMBER_RE: Regex = Regex::new(&*FLOAT_RE).unwrap();

    // " STATE-SPECIFIC GRADIENT OF STATE   2"
    static ref GRADIENT_RE: Regex =
        Regex::new(r"STATE-SPECIFIC GRADIENT OF STATE\s+(\d+)").unwrap();

    static ref COUPLING_RE: Regex = Regex::new(r"NONADIABATIC COUPLING MATRIX ELEMENT").unwrap();

    // " <STATE  2 | D/DR | STATE  1>"
    static ref STATE_PAIR_RE: Regex = Regex::new(r"STATE\s+(\d+)\D+?STATE\s+(\d+)").unwrap();

    // "    1 O     0.012345678   -0.000123456    0.001234567"
    static ref ATOM_ROW_RE: Regex = Regex::new(&format!(
        r"^\s*\d+\s+[A-Za-z]\S*\s+({0})\s+({0})\s+({0})\s*$",
        *FLOAT_RE
    ))
    .unwrap();
}

fn parse_float(text: &str) -> Option<f64> {
    text.replace(['D', 'd'], "E").parse::<f64>().ok()
}

/// Reads `n_atoms` consecutive atom rows, starting at the first atom row at or after `start`.
/// Returns the flattened vector and the index of the line after the block.
fn read_atom_block(lines: &[&str], start: usize, n_atoms: usize) -> Option<(Array1<f64>, usize)> {
    let first: usize = (start..lines.len()).find(|index| ATOM_ROW_RE.is_match(lines[*index]))?;
    let mut values: Vec<f64> = Vec::with_capacity(3 * n_atoms);
    for line in lines.iter().skip(first).take(n_atoms) {
        let captures = ATOM_ROW_RE.captures(line)?;
        for index in 1..=3 {
            values.push(parse_float(&captures[index])?);
        }
    }
    if values.len() != 3 * n_atoms {
        return None;
    }
    Some((Array1::from(values), first + n_atoms))
}

/// The first floating-point number in `rest` or in the lines following `start`.
fn first_number(lines: &[&str], rest: &str, start: usize) -> Option<(f64, usize)> {
    if let Some(found) = NUMBER_RE.find(rest) {
        return Some((parse_float(found.as_str())?, start));
    }
    for (index, line) in lines.iter().enumerate().skip(start) {
        if let Some(found) = NUMBER_RE.find(line) {
            return Some((parse_float(found.as_str())?, index + 1));
        }
    }
    None
}

/// Collects the state energies, state-specific gradients and nonadiabatic couplings
/// found in the output. `state_labels[i]` is the root label of the internal state i.
/// Quantities of unknown roots and incomplete blocks are skipped, so that the
/// verification of the result reports them as missing.
pub fn parse_output(
    output: &str,
    n_atoms: usize,
    state_labels: &[usize],
) -> ElectronicStructure {
    let lines: Vec<&str> = output.lines().collect();
    let mut data = ElectronicStructure::new(state_labels.len(), 3 * n_atoms);
    let state_of = |label: usize| state_labels.iter().position(|root| *root == label);

    let mut index: usize = 0;
    while index < lines.len() {
        let line: &str = lines[index];
        index += 1;

        if let Some(captures) = GRADIENT_RE.captures(line) {
            let state: Option<usize> = captures[1].parse::<usize>().ok().and_then(state_of);
            let rest: &str = &line[captures.get(0).map_or(line.len(), |m| m.end())..];
            let (energy, next) = match (state, first_number(&lines, rest, index)) {
                (Some(_), Some(found)) => found,
                _ => continue,
            };
            if let (Some(state), Some((gradient, after))) =
                (state, read_atom_block(&lines, next, n_atoms))
            {
                data.set_energy(state, energy);
                data.set_gradient(state, gradient.view());
                index = after;
            }
        } else if COUPLING_RE.is_match(line) {
            let pair_line: Option<usize> =
                (index..lines.len()).find(|i| STATE_PAIR_RE.is_match(lines[*i]));
            let pair_line: usize = match pair_line {
                Some(i) => i,
                None => continue,
            };
            let captures = match STATE_PAIR_RE.captures(lines[pair_line]) {
                Some(captures) => captures,
                None => continue,
            };
            let first: Option<usize> = captures[1].parse::<usize>().ok().and_then(state_of);
            let second: Option<usize> = captures[2].parse::<usize>().ok().and_then(state_of);
            if let (Some(i), Some(j)) = (first, second) {
                if i == j {
                    continue;
                }
                if let Some((coupling, after)) = read_atom_block(&lines, pair_line + 1, n_atoms) {
                    data.set_coupling(i.max(j), i.min(j), coupling.view());
                    index = after;
                }
            }
        }
    }
    data
}

/// Extracts the `$VEC ... $END` block of the optimized orbitals from the punch file.
pub fn parse_orbitals(punch: &str) -> Option<String> {
    let mut orbitals: Option<String> = None;
    let mut lines = punch.lines();
    while let Some(line) = lines.next() {
        if !line.contains("OPTIMIZED MCSCF") {
            continue;
        }
        let mut block: Vec<&str> = Vec::new();
        let mut complete: bool = false;
        for line in lines.by_ref() {
            if block.is_empty() && !line.contains("$VEC") {
                continue;
            }
            block.push(line);
            if line.contains("$END") {
                complete = true;
                break;
            }
        }
        if complete {
            let mut text: String = block.join("\n");
            text.push('\n');
            orbitals = Some(text);
        }
    }
    orbitals
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use lscivr_dynamics::interface::ElectronicTargets;
    use lscivr_dynamics::OracleFailure;

    const OUTPUT: &str = "
 ITERATIONS CONVERGED
 STATE-SPECIFIC GRADIENT OF STATE   1
 E=     -76.0123456789   ITERS=   12
            ATOM     ZNUC       DE/DX         DE/DY         DE/DZ
 -----------------------------------------------------------------
    1 O        0.0120000000   -0.0010000000    0.0000000000
    2 H       -0.0060000000    0.0005000000    0.0000000000
    3 H       -0.0060000000    0.0005000000    0.0000000000

 STATE-SPECIFIC GRADIENT OF STATE   2
 E=     -75.8000000000
    1 O        0.1000000000    0.2000000000    0.3000000000
    2 H        0.4000000000    0.5000000000    0.6000000000
    3 H        0.7000000000    0.8000000000    0.9000000000

 NONADIABATIC COUPLING MATRIX ELEMENT
 <STATE  2 | D/DR | STATE  1>
    1 O        1.0D-01        2.0D-01       -3.0D-01
    2 H        0.0000000000   0.0000000000    0.5000000000
    3 H        0.0000000000   0.0000000000   -0.5000000000
";

    #[test]
    fn energies_gradients_and_couplings_by_marker() {
        let data = parse_output(OUTPUT, 3, &[1, 2]);
        assert_abs_diff_eq!(data.energies, array![-76.0123456789, -75.8], epsilon = 1e-12);
        assert_abs_diff_eq!(data.gradients[[0, 0]], 0.012, epsilon = 1e-12);
        assert_abs_diff_eq!(data.gradients[[1, 8]], 0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(data.couplings[[1, 0, 0]], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(data.couplings[[0, 1, 2]], 0.3, epsilon = 1e-12);
        assert_eq!(data.verify(&ElectronicTargets::all(2)), Ok(()));
    }

    #[test]
    fn root_labels_are_mapped_to_states() {
        // the second and third root are propagated
        let data = parse_output(OUTPUT, 3, &[2, 3]);
        assert_abs_diff_eq!(data.energies[0], -75.8, epsilon = 1e-12);
        assert_eq!(data.status.gradients, vec![true, false]);
        assert_eq!(
            data.verify(&ElectronicTargets::all(2)),
            Err(OracleFailure::GradientMissing(1))
        );
    }

    #[test]
    fn truncated_output_reports_the_missing_quantity() {
        let cut: usize = OUTPUT.find(" NONADIABATIC").unwrap();
        let data = parse_output(&OUTPUT[..cut], 3, &[1, 2]);
        assert_eq!(
            data.verify(&ElectronicTargets::all(2)),
            Err(OracleFailure::CouplingMissing(0, 1))
        );

        let cut: usize = OUTPUT.find("    3 H        0.7").unwrap();
        let data = parse_output(&OUTPUT[..cut], 3, &[1, 2]);
        assert_eq!(data.status.gradients, vec![true, false]);
    }

    #[test]
    fn optimized_orbitals_from_the_punch_file() {
        let punch = "
--- NATURAL ORBITALS OF MCSCF ---
 $VEC
 1  1 9.99E-01
 $END
--- OPTIMIZED MCSCF MO-S --- GENERATED AT 10:00:00
E(MCSCF)=      -76.0123456789, E(NUC)=    9.1, 12 ITERS
 $VEC
 1  1 1.00E+00 0.00E+00
 2  1 0.00E+00 1.00E+00
 $END
";
        let orbitals = parse_orbitals(punch).unwrap();
        assert!(orbitals.starts_with(" $VEC\n 1  1 1.00E+00"));
        assert!(orbitals.ends_with(" $END\n"));
        assert_eq!(orbitals.lines().count(), 4);
        assert_eq!(parse_orbitals("--- OPTIMIZED MCSCF MO-S ---\n $VEC\n 1  1 1.0\n"), None);
        assert_eq!(parse_orbitals(" $VEC\n $END\n"), None);
    }
}
