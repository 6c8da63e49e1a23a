// config file
pub const CONFIG_FILE_NAME: &str = "dynamics.toml";
// restart file, the extension selects the layout (.json, .yaml or plain text)
pub const RESTART_FILE_NAME: &str = "restart.out";
// energy trace: time, total energy and the energies of all states
pub const ENERGY_FILE_NAME: &str = "energy.out";
// multi-frame xyz trajectory in angstrom
pub const TRAJECTORY_FILE_NAME: &str = "nuc_geo.xyz";
// append-only progress log
pub const PROGRESS_FILE_NAME: &str = "progress.out";
// number of electronic states
pub const NSTATES: usize = 2;
// initially occupied electronic state (0-based)
pub const INITIAL_STATE: usize = 0;
// gradients and couplings that are requested at every geometry
pub const TARGET_ALL: &str = "all";
// translational and rotational modes at the top of the mode matrix
pub const NULL_MODES: usize = 6;
// new trajectory or restart from the restart file
pub const RESTARTFLAG: bool = false;
// relative loss of total energy that terminates the trajectory
pub const ENERGY_THRESHOLD: f64 = 0.02;
// step size in a.u. (ABM step, Bulirsch-Stoer increment or RK4 step)
pub const STEPSIZE: f64 = 1.0;
// final time of the trajectory in a.u.
pub const T_MAX: f64 = 100.0;
// convergence threshold of the Bulirsch-Stoer extrapolation
pub const TOLERANCE: f64 = 1.0e-6;
pub const PRINT_RESTART: bool = true;
pub const PRINT_COORDINATES: bool = true;
pub const PRINT_ENERGIES: bool = true;
// relative slack when comparing the remaining time with the step size
pub const TIME_TOLERANCE: f64 = 1.0e-8;
// orthonormality deviation of the mode matrix that triggers a Loewdin orthogonalization
pub const ORTHONORMALITY_THRESHOLD: f64 = 1.0e-6;
