//! Conservation ledger.
//!
//! Running totals of every flow that crosses the system boundary. Baselines
//! are fixed at genesis. Loss counters can step down when a field clamps a
//! negative residue to zero, since that adds mass back. The audits compare
//! `baseline + inflow` against `live state + outflow`.

use serde::{Deserialize, Serialize};

use crate::schema::AuditStatus;

/// Mass and energy accounting for one simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    /// Non-thermal field mass at genesis.
    pub initial_env_mass: f64,
    /// Agent biomass at genesis.
    pub initial_bio_mass: f64,
    /// Heat field total at genesis.
    pub initial_heat: f64,
    /// Agent energy at genesis.
    pub initial_agent_energy: f64,
    /// Mass injected by sources.
    pub mass_sourced: f64,
    /// Mass removed by decay, net of mass restored by clamping.
    pub mass_decayed: f64,
    /// Heat removed by decay, net of heat restored by clamping.
    pub heat_radiated: f64,
    /// Energy created by metabolism and thermal sources.
    pub energy_generated: f64,
}

impl Ledger {
    /// Create a ledger with genesis baselines and zeroed flow counters.
    pub fn with_baseline(env_mass: f64, bio_mass: f64, heat: f64, agent_energy: f64) -> Self {
        Self {
            initial_env_mass: env_mass,
            initial_bio_mass: bio_mass,
            initial_heat: heat,
            initial_agent_energy: agent_energy,
            ..Self::default()
        }
    }

    #[inline]
    pub fn record_sourced(&mut self, amount: f64) {
        self.mass_sourced += amount;
    }

    #[inline]
    pub fn record_decayed(&mut self, amount: f64) {
        self.mass_decayed += amount;
    }

    #[inline]
    pub fn record_radiated(&mut self, amount: f64) {
        self.heat_radiated += amount;
    }

    #[inline]
    pub fn record_generated(&mut self, amount: f64) {
        self.energy_generated += amount;
    }

    /// Signed mass discrepancy: `(initial + sourced) - (current + decayed)`.
    pub fn mass_discrepancy(&self, env_mass: f64, bio_mass: f64) -> f64 {
        let start = self.initial_env_mass + self.initial_bio_mass + self.mass_sourced;
        let end = env_mass + bio_mass + self.mass_decayed;
        start - end
    }

    /// Signed energy discrepancy: `(initial + generated) - (current + radiated)`.
    pub fn energy_discrepancy(&self, heat: f64, agent_energy: f64) -> f64 {
        let start = self.initial_heat + self.initial_agent_energy + self.energy_generated;
        let end = heat + agent_energy + self.heat_radiated;
        start - end
    }
}

/// What the mass auditor should do with a raw discrepancy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MassVerdict {
    /// Exactly zero; leave state alone.
    Balanced,
    /// Sub-threshold drift; reconcile by adding this amount to the necromass field.
    Dust(f64),
    /// Too large to be rounding noise.
    Leak,
}

/// Classify a raw mass discrepancy.
///
/// Every nonzero discrepancy under `dust_threshold` is dust; anything at or
/// above it is a leak.
pub fn judge_mass(error: f64, dust_threshold: f64) -> MassVerdict {
    if error.abs() >= dust_threshold {
        MassVerdict::Leak
    } else if error == 0.0 {
        MassVerdict::Balanced
    } else {
        MassVerdict::Dust(error)
    }
}

/// Classify an energy discrepancy. Energy is never corrected.
pub fn judge_energy(error: f64, tolerance: f64) -> AuditStatus {
    if error.abs() < tolerance {
        AuditStatus::Balanced
    } else {
        AuditStatus::Leak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_ledger_balances_against_baseline() {
        let ledger = Ledger::with_baseline(100.0, 80.0, 8000.0, 800.0);
        assert_eq!(ledger.mass_discrepancy(100.0, 80.0), 0.0);
        assert_eq!(ledger.energy_discrepancy(8000.0, 800.0), 0.0);
    }

    #[test]
    fn test_flows_enter_both_sides() {
        let mut ledger = Ledger::with_baseline(10.0, 5.0, 0.0, 0.0);
        ledger.record_sourced(3.0);
        ledger.record_decayed(1.5);

        // 10 + 5 + 3 = 16.5 + 1.5
        assert!(ledger.mass_discrepancy(11.0, 5.5).abs() < 1e-12);
        assert!((ledger.mass_discrepancy(11.0, 5.0) - 0.5).abs() < 1e-12);

        ledger.record_generated(4.0);
        ledger.record_radiated(1.0);
        assert!(ledger.energy_discrepancy(2.0, 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_judge_mass() {
        assert_eq!(judge_mass(0.0, 1e-5), MassVerdict::Balanced);
        assert_eq!(judge_mass(3e-12, 1e-5), MassVerdict::Dust(3e-12));
        assert_eq!(judge_mass(-2e-6, 1e-5), MassVerdict::Dust(-2e-6));
        assert_eq!(judge_mass(1e-3, 1e-5), MassVerdict::Leak);
        assert_eq!(judge_mass(-1e-5, 1e-5), MassVerdict::Leak);
    }

    #[test]
    fn test_judge_energy() {
        assert_eq!(judge_energy(5e-5, 1e-4), AuditStatus::Balanced);
        assert_eq!(judge_energy(-0.3, 1e-4), AuditStatus::Leak);
    }
}
