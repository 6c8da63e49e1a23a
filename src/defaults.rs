// config file of the program, the dynamics are configured in "dynamics.toml"
pub const CONFIG_FILE_NAME: &str = "lscivr.toml";
// reference geometry: atom count, then "label mass(amu) x y z" in angstrom
pub const GEOMETRY_FILE_NAME: &str = "geometry.dat";
// mode matrix, one cartesian displacement vector per row
pub const MODES_FILE_NAME: &str = "modes.dat";
// sampled initial conditions
pub const INITIAL_CONDITIONS_FILE_NAME: &str = "initial_conditions.json";
pub const VERBOSE: i8 = 0;

// FILE PROTOCOL
pub const FILE_PROTOCOL_COMMAND: &str = "rungms";
pub const INPUT_NAME: &str = "cas";
pub const ORBITAL_FILE_NAME: &str = "vec.dat";
pub const CAPTURE_STDOUT: bool = true;
// geometry of the current job, the reference geometry file is left untouched
pub const CURRENT_GEOMETRY_FILE_NAME: &str = "geometry_current.dat";

// NETWORK PROTOCOL
pub const HOST: &str = "localhost";
pub const PORT: u16 = 11111;
// seconds until the server has to be available
pub const MAX_WAIT: f64 = 10.0;
// seconds between two availability checks
pub const POLL_INTERVAL: f64 = 1.0;
// seconds a single job may take, 0 waits without limit
pub const IO_TIMEOUT: f64 = 0.0;

// ANALYTIC MODEL
pub const FORCE_CONSTANT: f64 = 1.0;
pub const ENERGY_GAP: f64 = 0.1;
pub const COUPLING: f64 = 0.0;
