pub mod constants;
pub mod defaults;
pub mod dynamics;
pub mod errors;
pub mod initialization;
pub mod interface;
pub mod output;

pub use errors::{DynamicsError, OracleFailure, Result};
