//! Compute module - Field physics, agent state machine and conservation ledger.

mod agent;
mod field;
mod genome;
mod ledger;
mod population;
mod simulation;
mod source;

pub use agent::*;
pub use field::*;
pub use genome::*;
pub use ledger::*;
pub use population::*;
pub use simulation::*;
pub use source::*;
