//! Simulation driver.
//!
//! Owns the field grid, sources, population, ledger and the single seeded
//! RNG, and runs the per-tick pipeline:
//! field update -> source injection -> agent transactions -> occupancy rebuild.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::schema::{
    AuditReport, AuditStatus, ConfigError, DeathTally, EnergyAudit, MassAudit, SimulationConfig,
    SpeciesSnapshot, StepRecord,
};

use super::{
    Agent, FieldGrid, Genome, Ledger, MassVerdict, Population, SourceInjector, judge_energy,
    judge_mass,
};

/// A running microcosm.
pub struct Simulation {
    config: SimulationConfig,
    fields: FieldGrid,
    sources: SourceInjector,
    population: Population,
    ledger: Ledger,
    rng: StdRng,
    seed: u64,
    tick: u64,
}

impl Simulation {
    /// Validate the configuration, lay out fields and sources, place the
    /// genesis population and fix the ledger baselines.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let fields = FieldGrid::new(&config)?;
        let genomes = config
            .species
            .iter()
            .map(|s| Genome::new(s, &fields, &config.biology).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        let seed = config.random_seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);

        let sources = SourceInjector::new(&config, &fields, &mut rng)?;
        let population = Population::genesis(&config, &genomes, &mut rng);
        let ledger = Ledger::with_baseline(
            fields.env_mass(),
            population.bio_mass(),
            fields.heat_total(),
            population.total_energy(),
        );

        log::info!(
            "simulation {}x{} seeded with {}: {} agents, {} fields, {} sources",
            config.width,
            config.height,
            seed,
            population.len(),
            fields.iter().count(),
            sources.sources().len()
        );

        Ok(Self {
            config,
            fields,
            sources,
            population,
            ledger,
            rng,
            seed,
            tick: 0,
        })
    }

    /// Advance one tick.
    pub fn step(&mut self) {
        self.fields.update(&mut self.ledger);
        self.sources.apply(&mut self.fields, &mut self.ledger);
        let summary = self
            .population
            .advance(&mut self.fields, &mut self.ledger, &mut self.rng);
        self.tick += 1;

        log::trace!(
            "tick {}: population {} (+{} -{}, {} blocked)",
            self.tick,
            self.population.len(),
            summary.births,
            summary.deaths,
            summary.failed_births
        );
    }

    /// Run up to `steps` ticks, stopping early on extinction.
    /// Returns the number of ticks actually run.
    pub fn run(&mut self, steps: u64) -> u64 {
        let mut ran = 0;
        while ran < steps {
            if self.population.is_extinct() {
                log::info!("population extinct at tick {}", self.tick);
                break;
            }
            self.step();
            ran += 1;
        }
        ran
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn fields(&self) -> &FieldGrid {
        &self.fields
    }

    pub fn agents(&self) -> &[Agent] {
        self.population.agents()
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn deaths(&self) -> &BTreeMap<String, DeathTally> {
        self.population.deaths()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Seed of the simulation RNG (drawn from entropy if none was configured).
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Whether the configured audit interval falls on the current tick.
    pub fn audit_due(&self) -> bool {
        let interval = self.config.audit.interval;
        interval > 0 && self.tick > 0 && self.tick % interval == 0
    }

    /// Mass audit returning the discrepancy left after any dusting.
    pub fn check_mass_integrity(&mut self) -> f64 {
        self.mass_audit().error
    }

    /// Energy discrepancy. Report only; energy is never corrected.
    pub fn check_energy_integrity(&self) -> f64 {
        self.ledger
            .energy_discrepancy(self.fields.heat_total(), self.population.total_energy())
    }

    fn mass_discrepancy(&self) -> f64 {
        self.ledger
            .mass_discrepancy(self.fields.env_mass(), self.population.bio_mass())
    }

    /// Compare the mass ledger against live state, dusting sub-threshold drift
    /// into the necromass field at the grid centre.
    ///
    /// Any nonzero drift below the dust threshold is corrected. The status is
    /// `Balanced` when that drift was already under the mass tolerance and
    /// `Dusted` otherwise.
    pub fn mass_audit(&mut self) -> MassAudit {
        let found = self.mass_discrepancy();
        let audit = &self.config.audit;
        let tolerance = audit.mass_tolerance;

        let (status, correction) = match judge_mass(found, audit.dust_threshold) {
            MassVerdict::Balanced => (AuditStatus::Balanced, 0.0),
            MassVerdict::Dust(amount) => {
                let cell = self.fields.reconciliation_cell();
                let necromass = self.fields.necromass();
                self.fields.add(necromass, cell, amount);
                log::debug!(
                    "tick {}: dusted {:.3e} mass into necromass at {:?}",
                    self.tick,
                    amount,
                    cell
                );
                let status = if amount.abs() < tolerance {
                    AuditStatus::Balanced
                } else {
                    AuditStatus::Dusted
                };
                (status, amount)
            }
            MassVerdict::Leak => {
                log::warn!("tick {}: mass leak of {:.6e}", self.tick, found);
                (AuditStatus::Leak, 0.0)
            }
        };

        MassAudit {
            tick: self.tick,
            error: self.mass_discrepancy(),
            correction,
            env_mass: self.fields.env_mass(),
            bio_mass: self.population.bio_mass(),
            sourced: self.ledger.mass_sourced,
            decayed: self.ledger.mass_decayed,
            status,
        }
    }

    /// Compare the energy ledger against live state.
    pub fn energy_audit(&self) -> EnergyAudit {
        let error = self.check_energy_integrity();
        let status = judge_energy(error, self.config.audit.energy_tolerance);
        if status.is_leak() {
            log::warn!("tick {}: energy leak of {:.6e}", self.tick, error);
        }

        EnergyAudit {
            tick: self.tick,
            error,
            heat_field: self.fields.heat_total(),
            bio_energy: self.population.total_energy(),
            generated: self.ledger.energy_generated,
            radiated: self.ledger.heat_radiated,
            status,
        }
    }

    /// Run both audits.
    pub fn audit_report(&mut self) -> AuditReport {
        let mass = self.mass_audit();
        let energy = self.energy_audit();
        log::info!(
            "audit at tick {}: mass {:?} ({:.3e}), energy {:?} ({:.3e})",
            self.tick,
            mass.status,
            mass.error,
            energy.status,
            energy.error
        );
        AuditReport { mass, energy }
    }

    /// Population statistics for the current tick.
    pub fn snapshot(&self) -> StepRecord {
        let agents = self.population.agents();

        let mut species: BTreeMap<String, SpeciesSnapshot> = self
            .population
            .deaths()
            .iter()
            .map(|(id, tally)| {
                (
                    id.clone(),
                    SpeciesSnapshot {
                        deaths: *tally,
                        ..SpeciesSnapshot::default()
                    },
                )
            })
            .collect();

        for agent in agents {
            let entry = species.entry(agent.species_id().to_string()).or_default();
            entry.population += 1;
            entry.avg_energy += agent.energy;
            entry.avg_stored_mass += agent.stored_mass;
            entry.avg_age += agent.age;
        }
        for entry in species.values_mut() {
            if entry.population > 0 {
                let n = entry.population as f64;
                entry.avg_energy /= n;
                entry.avg_stored_mass /= n;
                entry.avg_age /= n;
            }
        }

        let avg_age = if agents.is_empty() {
            0.0
        } else {
            agents.iter().map(|a| a.age).sum::<f64>() / agents.len() as f64
        };

        StepRecord {
            tick: self.tick,
            total_population: agents.len(),
            avg_age,
            species,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SpeciesConfig;

    fn test_config(seed: u64) -> SimulationConfig {
        SimulationConfig {
            width: 20,
            height: 20,
            random_seed: Some(seed),
            ..SimulationConfig::default()
        }
    }

    /// Discrepancy as it stands, without letting the auditor dust it.
    fn raw_mass_error(sim: &Simulation) -> f64 {
        sim.mass_discrepancy()
    }

    #[test]
    fn test_genesis_snapshot() {
        let sim = Simulation::new(test_config(42)).unwrap();
        let record = sim.snapshot();

        assert_eq!(sim.tick(), 0);
        assert_eq!(sim.seed(), 42);
        assert_eq!(record.total_population, 40);
        let standard = &record.species["standard"];
        assert_eq!(standard.population, 40);
        assert!((standard.avg_energy - 20.0).abs() < 1e-12);
        assert_eq!(standard.deaths.total(), 0);
        assert_eq!(sim.check_energy_integrity(), 0.0);
    }

    #[test]
    fn test_scenario_conserves_over_50_ticks() {
        let mut sim = Simulation::new(test_config(42)).unwrap();
        let ran = sim.run(50);

        assert_eq!(ran, 50);
        assert!(!sim.agents().is_empty());
        let mass = raw_mass_error(&sim);
        let energy = sim.check_energy_integrity();
        assert!(mass.abs() < 0.01, "mass discrepancy {}", mass);
        assert!(energy.abs() < 1.0, "energy discrepancy {}", energy);
        assert!(sim.check_mass_integrity().abs() < 0.01);
    }

    #[test]
    fn test_long_run_conserves() {
        let mut sim = Simulation::new(test_config(123)).unwrap();
        sim.run(200);

        let mass = raw_mass_error(&sim);
        let energy = sim.check_energy_integrity();
        assert!(mass.abs() < 1.0, "mass discrepancy {}", mass);
        assert!(energy.abs() < 5.0, "energy discrepancy {}", energy);
    }

    #[test]
    fn test_default_grid_conserves() {
        let config = SimulationConfig {
            random_seed: Some(42),
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::new(config).unwrap();
        assert_eq!(sim.fields().width(), 50);

        sim.run(50);
        let mass = raw_mass_error(&sim);
        let energy = sim.check_energy_integrity();
        assert!(mass.abs() < 0.01, "mass discrepancy at 50 {}", mass);
        assert!(energy.abs() < 1.0, "energy discrepancy at 50 {}", energy);

        sim.run(150);
        let mass = raw_mass_error(&sim);
        let energy = sim.check_energy_integrity();
        assert!(mass.abs() < 1.0, "mass discrepancy at 200 {}", mass);
        assert!(energy.abs() < 5.0, "energy discrepancy at 200 {}", energy);
    }

    #[test]
    fn test_default_grid_long_run_seed_123() {
        let config = SimulationConfig {
            random_seed: Some(123),
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::new(config).unwrap();
        sim.run(200);

        let mass = raw_mass_error(&sim);
        let energy = sim.check_energy_integrity();
        assert!(mass.abs() < 1.0, "mass discrepancy {}", mass);
        assert!(energy.abs() < 5.0, "energy discrepancy {}", energy);
    }

    #[test]
    fn test_starved_world_goes_extinct() {
        let mut config = test_config(999);
        config.sources.clear();
        let mut sim = Simulation::new(config).unwrap();

        let ran = sim.run(500);

        assert!(ran < 500, "population survived {} ticks", ran);
        assert_eq!(sim.tick(), ran);
        assert!(sim.agents().is_empty());
        assert!(sim.population().is_extinct());
        assert!(sim.deaths()["standard"].total() >= 40);
        let mass = raw_mass_error(&sim);
        assert!(mass.abs() < 1.0, "mass discrepancy {}", mass);
        assert!(sim.check_energy_integrity().abs() < 1.0);

        // An extinct world does not advance.
        assert_eq!(sim.run(10), 0);
        assert_eq!(sim.tick(), ran);
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let mut a = Simulation::new(test_config(7)).unwrap();
        let mut b = Simulation::new(test_config(7)).unwrap();
        a.run(30);
        b.run(30);

        assert_eq!(a.snapshot(), b.snapshot());
        assert_eq!(a.ledger(), b.ledger());
        let carbon_a = &a.fields().get("carbon").unwrap().data;
        let carbon_b = &b.fields().get("carbon").unwrap().data;
        assert_eq!(carbon_a, carbon_b);
    }

    #[test]
    fn test_leaky_excretion_fails_fast() {
        let mut config = test_config(1);
        config.species[0].excretions = BTreeMap::from([("waste".into(), 0.9)]);
        assert!(matches!(
            Simulation::new(config),
            Err(ConfigError::ExcretionWeights { .. })
        ));
    }

    #[test]
    fn test_invalid_dimensions_fail_fast() {
        let mut config = test_config(1);
        config.width = 0;
        assert!(matches!(
            Simulation::new(config),
            Err(ConfigError::InvalidDimensions)
        ));
    }

    #[test]
    fn test_dusting_reconciles_small_drift() {
        let mut sim = Simulation::new(test_config(3)).unwrap();
        let cell = sim.fields().reconciliation_cell();
        let necromass = sim.fields().necromass();
        let before = sim.fields().value(necromass, cell);

        sim.ledger.initial_env_mass += 5e-6;
        let audit = sim.mass_audit();

        assert_eq!(audit.status, AuditStatus::Dusted);
        assert!((audit.correction - 5e-6).abs() < 1e-9);
        // The reported error is the residual after reconciliation.
        assert!(audit.error.abs() < 1e-12, "residual {}", audit.error);
        assert!((audit.error + audit.correction - 5e-6).abs() < 1e-9);
        let after = sim.fields().value(necromass, cell);
        assert!((after - before - 5e-6).abs() < 1e-9);

        let follow_up = sim.mass_audit();
        assert_eq!(follow_up.status, AuditStatus::Balanced);
        assert!(follow_up.error.abs() < 1e-12);
    }

    #[test]
    fn test_drift_under_tolerance_is_still_reconciled() {
        let mut sim = Simulation::new(test_config(3)).unwrap();
        let cell = sim.fields().reconciliation_cell();
        let necromass = sim.fields().necromass();
        let before = sim.fields().value(necromass, cell);

        sim.ledger.initial_env_mass += 5e-9;
        let audit = sim.mass_audit();

        assert_eq!(audit.status, AuditStatus::Balanced);
        assert!((audit.correction - 5e-9).abs() < 1e-13);
        assert!(audit.error.abs() < 1e-12, "residual {}", audit.error);
        let after = sim.fields().value(necromass, cell);
        assert!((after - before - 5e-9).abs() < 1e-13);

        assert!(sim.check_mass_integrity().abs() < 1e-12);
    }

    #[test]
    fn test_large_drift_is_a_leak() {
        let mut sim = Simulation::new(test_config(3)).unwrap();
        let total_before = sim.fields().env_mass();

        sim.ledger.initial_env_mass += 1.0;
        let report = sim.audit_report();

        assert_eq!(report.mass.status, AuditStatus::Leak);
        assert_eq!(report.mass.correction, 0.0);
        assert_eq!(sim.fields().env_mass(), total_before);
        assert_eq!(report.energy.status, AuditStatus::Balanced);
    }

    #[test]
    fn test_two_species_snapshot() {
        let mut config = test_config(5);
        config.species.push(SpeciesConfig {
            id: "grazer".into(),
            initial_count: 8,
            ..SpeciesConfig::default()
        });
        let mut sim = Simulation::new(config).unwrap();
        sim.run(10);

        let record = sim.snapshot();
        assert_eq!(record.species.len(), 2);
        let counted: usize = record.species.values().map(|s| s.population).sum();
        assert_eq!(counted, record.total_population);
        assert!(sim.check_mass_integrity().abs() < 0.01);
    }

    #[test]
    fn test_audit_due() {
        let mut config = test_config(2);
        config.audit.interval = 5;
        let mut sim = Simulation::new(config).unwrap();
        assert!(!sim.audit_due());
        sim.run(5);
        assert!(sim.audit_due() || sim.agents().is_empty());
    }
}
