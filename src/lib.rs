//! Entropy Audit - A mass- and energy-audited ecological microcosm.
//!
//! Diffusing scalar fields (substrate, pollutant, heat, necromass) on a
//! toroidal grid interact with discrete agents that eat, excrete, age,
//! reproduce and die. Every unit of mass and energy that is injected,
//! transformed or destroyed is booked in a ledger, and periodic audits check
//! the books against live state.
//!
//! # Architecture
//!
//! - `schema`: Configuration, genesis layout and record types
//! - `compute`: Field physics, agent state machine, population, ledger
//! - `recording`: Run folder writer (time series, audits, metadata)
//!
//! # Example
//!
//! ```rust,no_run
//! use entropy_audit::{compute::Simulation, schema::SimulationConfig};
//!
//! let config = SimulationConfig {
//!     width: 20,
//!     height: 20,
//!     random_seed: Some(42),
//!     ..SimulationConfig::default()
//! };
//! let mut sim = Simulation::new(config).expect("valid configuration");
//!
//! let ticks = sim.run(500);
//! let report = sim.audit_report();
//!
//! println!("{} ticks, {} agents alive", ticks, sim.agents().len());
//! println!("mass error {:.3e} ({:?})", report.mass.error, report.mass.status);
//! println!("energy error {:.3e} ({:?})", report.energy.error, report.energy.status);
//! ```

pub mod compute;
pub mod recording;
pub mod schema;

// Re-export commonly used types
pub use compute::{Ledger, Simulation};
pub use recording::RunRecorder;
pub use schema::{AuditReport, ConfigError, SimulationConfig, StepRecord};
