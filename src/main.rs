use crate::backends::create_interface;
use crate::io::{create_system_data, read_input, write_footer, write_header, Configuration};
use crate::utils::Timer;
use anyhow::{Context, Result};
use clap::{crate_name, crate_version, value_parser, Arg, ArgAction, Command};
use env_logger::Builder;
use log::{error, warn, LevelFilter};
use lscivr_dynamics::initialization::{DynamicConfiguration, Simulation, SystemData};
use lscivr_dynamics::interface::QCInterface;
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

mod backends;
mod defaults;
mod io;
mod utils;

/// Runs the complete trajectory of one directory.
fn run_trajectory(directory: &Path, restart: bool) -> Result<()> {
    let config: Configuration = read_input(directory)?;
    let mut dynamics_config: DynamicConfiguration = DynamicConfiguration::from_directory(directory)?;
    if restart {
        dynamics_config.restart_flag = true;
    }
    let system: SystemData = create_system_data(directory, &config, dynamics_config)?;
    let mut dynamics: Simulation = Simulation::new(&system, directory)?;
    let mut interface: Box<dyn QCInterface> = create_interface(directory, &config, &system)?;
    dynamics.lsc_dynamics(interface.as_mut())?;
    Ok(())
}

fn main() {
    // Input.
    let matches = Command::new(crate_name!())
        .version(crate_version!())
        .about("semiclassical nonadiabatic trajectories in the mapping representation")
        .arg(
            Arg::new("directory")
                .help("Trajectory directories, each one is propagated independently")
                .value_name("DIRECTORY")
                .value_parser(value_parser!(PathBuf))
                .multiple_values(true)
                .default_value(".")
                .index(1),
        )
        .arg(
            Arg::new("restart")
                .help("Continues the trajectories from their restart files")
                .long("restart")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("jobs")
                .help("Number of trajectories that are propagated in parallel")
                .long("jobs")
                .short('j')
                .value_name("N")
                .value_parser(value_parser!(usize)),
        )
        .get_matches();
    let directories: Vec<PathBuf> = matches
        .get_many::<PathBuf>("directory")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let restart: bool = matches.get_flag("restart");
    let jobs: usize = matches.get_one::<usize>("jobs").copied().unwrap_or(0);

    // Logging.
    // The log level is taken from the settings of the first trajectory.
    let verbose: i8 = directories
        .first()
        .and_then(|directory| read_input(directory).ok())
        .map_or(0, |config| config.verbose);
    let log_level: LevelFilter = match verbose {
        2 => LevelFilter::Trace,
        1 => LevelFilter::Debug,
        0 => LevelFilter::Info,
        -1 => LevelFilter::Warn,
        -2 => LevelFilter::Error,
        _ => LevelFilter::Info,
    };
    // and the logger is build.
    Builder::new()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .filter(None, log_level)
        .init();

    // The program header is written to the command line.
    write_header();
    // and the total wall-time timer is started.
    let timer: Timer = Timer::start();

    // Multithreading.
    // Every trajectory owns its directory, so they are propagated independently.
    let results: Vec<(PathBuf, Result<()>)> = match rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("unable to start the thread pool")
    {
        Ok(pool) => pool.install(|| {
            directories
                .par_iter()
                .map(|directory| (directory.clone(), run_trajectory(directory, restart)))
                .collect()
        }),
        Err(err) => {
            error!("{:#}", err);
            process::exit(1);
        }
    };

    let mut n_failed: usize = 0;
    for (directory, result) in results.iter() {
        if let Err(err) = result {
            n_failed += 1;
            error!("trajectory in {} failed: {:#}", directory.display(), err);
        }
    }
    if n_failed > 0 {
        warn!(
            "{} of {} trajectories failed",
            n_failed,
            results.len()
        );
    }

    write_footer(timer);
    if n_failed > 0 {
        process::exit(1);
    }
}
