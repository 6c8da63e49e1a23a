mod geometry;
mod imprint;
mod input;
pub(crate) mod settings;

pub use geometry::*;
pub use imprint::{write_footer, write_header};
pub use input::*;
pub use settings::{Backend, Configuration, FileProtocolConfig, ModelConfig, NetworkConfig};
