pub mod helper;
pub mod write_data;

pub use helper::*;
pub use write_data::*;
