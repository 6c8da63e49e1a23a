pub use io::*;
pub use normal_modes::NormalModes;
pub use restart::Checkpoint;
pub use simulation::*;
pub use system::*;

pub mod io;
pub mod normal_modes;
pub mod restart;
pub mod simulation;
pub mod system;
