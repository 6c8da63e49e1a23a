use crate::constants;
use crate::defaults;
use chrono::Local;
use ndarray::prelude::*;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Paths of the artifacts of one trajectory.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputFiles {
    pub energies: PathBuf,
    pub trajectory: PathBuf,
    pub progress: PathBuf,
    pub restart: PathBuf,
}

impl OutputFiles {
    pub fn new(directory: &Path, restart_file: &str) -> Self {
        Self {
            energies: directory.join(defaults::ENERGY_FILE_NAME),
            trajectory: directory.join(defaults::TRAJECTORY_FILE_NAME),
            progress: directory.join(defaults::PROGRESS_FILE_NAME),
            restart: directory.join(restart_file),
        }
    }
}

/// Opens the file for writing. The first call of a trajectory truncates it,
/// later calls append.
fn open_stream(file_path: &Path, first_call: bool) -> io::Result<BufWriter<File>> {
    let file: File = if first_call {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(file_path)?
    } else {
        OpenOptions::new().append(true).create(true).open(file_path)?
    };
    Ok(BufWriter::new(file))
}

/// Appends the time, the total energy and the energies of all states to the energy trace.
pub fn write_energy_trace(
    file_path: &Path,
    time: f64,
    total_energy: f64,
    energies: ArrayView1<f64>,
    first_call: bool,
) -> io::Result<()> {
    let mut stream = open_stream(file_path, first_call)?;
    if first_call {
        write!(stream, "#{:>24}{:>25}", "time (a.u.)", "total energy")?;
        for state in 0..energies.len() {
            write!(stream, "{:>25}", format!("E_{}", state))?;
        }
        writeln!(stream)?;
    }
    write!(stream, "{:>25.10}{:>25.14}", time, total_energy)?;
    for energy in energies.iter() {
        write!(stream, "{:>25.14}", energy)?;
    }
    writeln!(stream)?;
    stream.flush()
}

/// Appends one frame to the xyz trajectory. The coordinates are given in bohr.
pub fn write_xyz_frame(
    file_path: &Path,
    atom_labels: &[String],
    coordinates: ArrayView1<f64>,
    time: f64,
    first_call: bool,
) -> io::Result<()> {
    let mut stream = open_stream(file_path, first_call)?;
    writeln!(stream, "{}", atom_labels.len())?;
    writeln!(stream, "t = {:.4} a.u.", time)?;
    for (label, position) in atom_labels.iter().zip(coordinates.exact_chunks(3)) {
        writeln!(
            stream,
            "{:<4}{:>20.10}{:>20.10}{:>20.10}",
            label,
            position[0] * constants::BOHR_TO_ANGS,
            position[1] * constants::BOHR_TO_ANGS,
            position[2] * constants::BOHR_TO_ANGS
        )?;
    }
    stream.flush()
}

/// Appends a time-stamped line to the progress log.
pub fn write_progress(file_path: &Path, message: &str, first_call: bool) -> io::Result<()> {
    let mut stream = open_stream(file_path, first_call)?;
    writeln!(
        stream,
        "[{}] {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        message
    )?;
    stream.flush()
}
