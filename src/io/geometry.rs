use anyhow::{bail, Context, Result};
use lscivr_dynamics::constants::{ANGS_TO_BOHR, BOHR_TO_ANGS};
use lscivr_dynamics::initialization::InitialConditions;
use ndarray::prelude::*;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::Path;

/// Atom labels, masses in amu and cartesian coordinates in bohr (x1 y1 z1 x2 ...)
#[derive(Clone, Debug, PartialEq)]
pub struct Molecule {
    pub labels: Vec<String>,
    pub masses: Array1<f64>,
    pub coordinates: Array1<f64>,
}

impl Molecule {
    pub fn n_atoms(&self) -> usize {
        self.labels.len()
    }
}

/// Parses the atom list: the number of atoms in the first line, followed by one
/// line "label mass x y z" per atom with the position in angstrom.
pub fn parse_geometry(input: &str) -> Result<Molecule> {
    let mut lines = input.lines().filter(|line| !line.trim().is_empty());
    let first: &str = lines.next().context("the geometry is empty")?;
    let n_atoms: usize = first
        .trim()
        .parse()
        .with_context(|| format!("'{}' is not a number of atoms", first.trim()))?;

    let mut labels: Vec<String> = Vec::with_capacity(n_atoms);
    let mut masses: Vec<f64> = Vec::with_capacity(n_atoms);
    let mut coordinates: Vec<f64> = Vec::with_capacity(3 * n_atoms);
    for (index, line) in lines.take(n_atoms).enumerate() {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() < 5 {
            bail!("atom {} needs a label, a mass and 3 coordinates: '{}'", index + 1, line);
        }
        labels.push(words[0].to_string());
        let values: Vec<f64> = words[1..5]
            .iter()
            .map(|word| word.parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .with_context(|| format!("invalid number in line '{}'", line))?;
        masses.push(values[0]);
        coordinates.extend(values[1..].iter().map(|x| x * ANGS_TO_BOHR));
    }
    if labels.len() != n_atoms {
        bail!("{} atoms announced, but {} found", n_atoms, labels.len());
    }
    Ok(Molecule {
        labels,
        masses: Array1::from(masses),
        coordinates: Array1::from(coordinates),
    })
}

pub fn read_geometry(file_path: &Path) -> Result<Molecule> {
    let input: String = fs::read_to_string(file_path)
        .with_context(|| format!("unable to read the geometry {}", file_path.display()))?;
    parse_geometry(&input).with_context(|| format!("invalid geometry in {}", file_path.display()))
}

/// Atom list with the full precision of the coordinates (in bohr) converted to angstrom.
pub fn format_geometry(labels: &[String], masses: ArrayView1<f64>, coordinates: ArrayView1<f64>) -> String {
    let mut text: String = String::new();
    let _ = writeln!(text, "{}", labels.len());
    for ((label, mass), position) in labels
        .iter()
        .zip(masses.iter())
        .zip(coordinates.exact_chunks(3))
    {
        let _ = writeln!(
            text,
            "{:<4}{:>14.8}{:>26.16e}{:>26.16e}{:>26.16e}",
            label,
            mass,
            position[0] * BOHR_TO_ANGS,
            position[1] * BOHR_TO_ANGS,
            position[2] * BOHR_TO_ANGS
        );
    }
    text
}

/// Reads the mode matrix: one cartesian displacement vector per row, lines
/// starting with '#' are comments.
pub fn parse_normal_modes(input: &str, n_cartesian: usize) -> Result<Array2<f64>> {
    let rows: Vec<Vec<f64>> = input
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            line.split_whitespace()
                .map(|word| word.parse::<f64>())
                .collect::<std::result::Result<Vec<f64>, _>>()
                .with_context(|| format!("invalid number in mode line '{}'", line))
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;
    let n_rows: usize = rows.len();
    if n_rows != n_cartesian || rows.iter().any(|row| row.len() != n_cartesian) {
        bail!(
            "the mode matrix has to be a {} x {} matrix, found {} rows with lengths {:?}",
            n_cartesian,
            n_cartesian,
            n_rows,
            rows.iter().map(|row| row.len()).collect::<Vec<usize>>()
        );
    }
    let values: Vec<f64> = rows.into_iter().flatten().collect();
    Ok(Array2::from_shape_vec((n_rows, n_cartesian), values)?)
}

pub fn read_normal_modes(file_path: &Path, n_cartesian: usize) -> Result<Array2<f64>> {
    let input: String = fs::read_to_string(file_path)
        .with_context(|| format!("unable to read the normal modes {}", file_path.display()))?;
    parse_normal_modes(&input, n_cartesian)
        .with_context(|| format!("invalid normal modes in {}", file_path.display()))
}

pub fn read_initial_conditions(file_path: &Path) -> Result<InitialConditions> {
    let input: String = fs::read_to_string(file_path).with_context(|| {
        format!("unable to read the initial conditions {}", file_path.display())
    })?;
    serde_json::from_str(&input)
        .with_context(|| format!("invalid initial conditions in {}", file_path.display()))
}
