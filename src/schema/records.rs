//! Record types handed to persistence and display collaborators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Why an agent died. Exactly one cause is recorded per death.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    Starvation,
    Toxicity,
    Senescence,
    Heat,
}

/// Per-species death counts by cause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathTally {
    pub starvation: u64,
    pub toxicity: u64,
    pub senescence: u64,
    pub heat: u64,
}

impl DeathTally {
    pub fn record(&mut self, cause: DeathCause) {
        match cause {
            DeathCause::Starvation => self.starvation += 1,
            DeathCause::Toxicity => self.toxicity += 1,
            DeathCause::Senescence => self.senescence += 1,
            DeathCause::Heat => self.heat += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.starvation + self.toxicity + self.senescence + self.heat
    }
}

/// Per-species population summary for one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeciesSnapshot {
    pub population: usize,
    pub avg_energy: f64,
    pub avg_stored_mass: f64,
    pub avg_age: f64,
    pub deaths: DeathTally,
}

/// Population summary emitted after every tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub tick: u64,
    pub total_population: usize,
    pub avg_age: f64,
    pub species: BTreeMap<String, SpeciesSnapshot>,
}

/// Outcome classification of one conservation audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Discrepancy within tolerance (any mass dust is still reconciled).
    Balanced,
    /// Sub-threshold drift reconciled into the necromass field.
    Dusted,
    /// Discrepancy too large to be rounding noise.
    Leak,
}

impl AuditStatus {
    pub fn is_leak(self) -> bool {
        self == AuditStatus::Leak
    }
}

/// Mass audit result with its component breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MassAudit {
    pub tick: u64,
    /// Signed discrepancy `(initial + in) - (current + out)`, recomputed after
    /// any correction. The discrepancy found is `error + correction`.
    pub error: f64,
    /// Amount added to the reconciliation cell (0 when nothing was applied).
    pub correction: f64,
    pub env_mass: f64,
    pub bio_mass: f64,
    pub sourced: f64,
    pub decayed: f64,
    pub status: AuditStatus,
}

/// Energy audit result with its component breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyAudit {
    pub tick: u64,
    pub error: f64,
    pub heat_field: f64,
    pub bio_energy: f64,
    pub generated: f64,
    pub radiated: f64,
    pub status: AuditStatus,
}

/// Combined physics audit for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub mass: MassAudit,
    pub energy: EnergyAudit,
}

/// Run summary written once a run finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub seed: u64,
    pub total_ticks: u64,
    pub final_population: usize,
    pub max_population: usize,
    pub species_final_counts: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_counts_each_cause_once() {
        let mut tally = DeathTally::default();
        tally.record(DeathCause::Starvation);
        tally.record(DeathCause::Starvation);
        tally.record(DeathCause::Heat);

        assert_eq!(tally.starvation, 2);
        assert_eq!(tally.heat, 1);
        assert_eq!(tally.toxicity, 0);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&AuditStatus::Dusted).unwrap();
        assert_eq!(json, "\"dusted\"");
    }
}
