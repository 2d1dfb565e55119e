//! Schema module - Configuration, layout and record types for microcosm simulations.

mod config;
mod records;
mod seed;

pub use config::*;
pub use records::*;
pub use seed::*;
