//! Configuration types for microcosm simulation parameters.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::PopulationLayout;

/// Name of the mandatory thermal field.
pub const HEAT_FIELD: &str = "heat";

/// Name of the mandatory field receiving dead biomass.
pub const NECROMASS_FIELD: &str = "necromass";

/// Largest diffusion rate that keeps the stencil centre weight non-negative.
pub const MAX_DIFFUSION_RATE: f64 = 1.0 / 6.0;

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Grid width in cells (X dimension).
    pub width: usize,
    /// Grid height in cells (Y dimension).
    pub height: usize,
    /// Seed for the simulation random stream. `None` draws one from entropy.
    pub random_seed: Option<u64>,
    /// Scalar field definitions.
    pub fields: Vec<FieldConfig>,
    /// Declarative mass/energy sources.
    pub sources: Vec<SourceConfig>,
    /// Species definitions, in seeding order.
    pub species: Vec<SpeciesConfig>,
    /// Genesis placement strategy.
    pub layout: PopulationLayout,
    /// Constants shared by every species.
    pub biology: BiologyConfig,
    /// Conservation audit thresholds.
    pub audit: AuditConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 50,
            height: 50,
            random_seed: None,
            fields: vec![
                FieldConfig::new("carbon", 0.01, 0.08, 0.0),
                FieldConfig::new("waste", 0.01, 0.08, 0.0),
                FieldConfig::new(HEAT_FIELD, 0.05, 0.15, 20.0),
                FieldConfig::new(NECROMASS_FIELD, 0.001, 0.001, 0.0),
            ],
            sources: vec![
                SourceConfig::Vent {
                    field: "carbon".into(),
                    amount: 3.0,
                    range: Some((5.0, 10.0)),
                    position: None,
                    count: 20,
                },
                SourceConfig::Rain {
                    field: "carbon".into(),
                    amount: 0.08,
                },
                SourceConfig::Rain {
                    field: "waste".into(),
                    amount: 0.08,
                },
            ],
            species: vec![SpeciesConfig::default()],
            layout: PopulationLayout::default(),
            biology: BiologyConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

/// Physical properties of one scalar field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Field name, referenced by sources and genomes.
    pub name: String,
    /// Fraction of the field lost per tick.
    pub decay: f64,
    /// Orthogonal neighbour weight of the diffusion stencil.
    pub diffusion: f64,
    /// Uniform value of every cell at genesis.
    #[serde(default)]
    pub initial_value: f64,
}

impl FieldConfig {
    pub fn new(name: &str, decay: f64, diffusion: f64, initial_value: f64) -> Self {
        Self {
            name: name.to_string(),
            decay,
            diffusion,
            initial_value,
        }
    }
}

/// Declarative source specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Uniform increment added to every cell each tick.
    Rain { field: String, amount: f64 },
    /// Point injector(s) with a fixed per-tick magnitude.
    Vent {
        field: String,
        /// Magnitude used when no range is given.
        amount: f64,
        /// Magnitude sampled once per vent from `[lo, hi]`.
        #[serde(default)]
        range: Option<(f64, f64)>,
        /// Fixed `(x, y)` cell. Random cell per vent when absent.
        #[serde(default)]
        position: Option<(usize, usize)>,
        /// Number of vent instances.
        #[serde(default = "default_vent_count")]
        count: usize,
    },
}

fn default_vent_count() -> usize {
    1
}

impl SourceConfig {
    /// Name of the field this source feeds.
    pub fn field(&self) -> &str {
        match self {
            SourceConfig::Rain { field, .. } | SourceConfig::Vent { field, .. } => field,
        }
    }
}

/// Per-species metabolism, reproduction and mortality parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesConfig {
    /// Species identifier.
    pub id: String,
    /// Substrate field -> energy extraction efficiency.
    pub intakes: BTreeMap<String, f64>,
    /// Field -> share of metabolic waste. Must sum to 1.0.
    pub excretions: BTreeMap<String, f64>,
    /// Field -> fraction of harvested mass internalized as toxin.
    pub toxins: BTreeMap<String, f64>,
    /// Maximum total mass removed from a cell per tick.
    pub max_bite: f64,
    /// Energy of a genesis agent.
    pub starting_energy: f64,
    /// Energy burned (and released as heat) per tick.
    pub metabolic_cost: f64,
    /// Heat produced per unit of energy gained.
    pub entropy_coefficient: f64,
    /// Fraction of processable intake kept as structural mass.
    pub growth_efficiency: f64,
    /// Energy needed before reproduction is considered.
    pub repro_threshold: f64,
    /// Chance of reproducing once the thresholds are met.
    pub repro_probability: f64,
    /// Age added to a parent per successful birth.
    pub repro_aging_cost: f64,
    /// Age gained per tick.
    pub aging_rate: f64,
    /// Energy at or below which the agent starves.
    pub death_energy: f64,
    /// Internal toxin load above which the agent dies.
    pub toxin_tolerance: f64,
    /// Local heat above which the agent dies.
    pub heat_tolerance: f64,
    /// Age at which the agent dies of senescence.
    pub lifespan_limit: f64,
    /// Agents placed at genesis.
    pub initial_count: usize,
}

impl Default for SpeciesConfig {
    fn default() -> Self {
        Self {
            id: "standard".into(),
            intakes: BTreeMap::from([("carbon".into(), 0.8), (NECROMASS_FIELD.into(), 0.1)]),
            excretions: BTreeMap::from([("waste".into(), 1.0)]),
            toxins: BTreeMap::from([("waste".into(), 0.1)]),
            max_bite: 4.0,
            starting_energy: 20.0,
            metabolic_cost: 1.0,
            entropy_coefficient: 0.5,
            growth_efficiency: 0.2,
            repro_threshold: 40.0,
            repro_probability: 0.1,
            repro_aging_cost: 40.0,
            aging_rate: 1.0,
            death_energy: 0.0,
            toxin_tolerance: 40.0,
            heat_tolerance: 40.0,
            lifespan_limit: 400.0,
            initial_count: 40,
        }
    }
}

/// Constants shared by every species.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BiologyConfig {
    /// Structural mass of every agent body.
    pub body_mass: f64,
    /// Fraction of parent energy handed to a newborn.
    pub offspring_energy_share: f64,
}

impl Default for BiologyConfig {
    fn default() -> Self {
        Self {
            body_mass: 2.0,
            offspring_energy_share: 0.5,
        }
    }
}

/// Conservation audit thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Mass discrepancies below this are reconciled into the necromass field.
    pub dust_threshold: f64,
    /// Mass discrepancy considered balanced.
    pub mass_tolerance: f64,
    /// Energy discrepancy considered balanced.
    pub energy_tolerance: f64,
    /// Ticks between audits in headless runs (0 = final audit only).
    pub interval: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            dust_threshold: 1e-5,
            mass_tolerance: 1e-8,
            energy_tolerance: 1e-4,
            interval: 2000,
        }
    }
}

impl SimulationConfig {
    /// Get total number of cells.
    #[inline]
    pub fn grid_size(&self) -> usize {
        self.width * self.height
    }

    /// Validate configuration parameters.
    ///
    /// Field references inside genomes and sources are resolved later, when
    /// the field grid exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }

        let mut names = BTreeSet::new();
        for field in &self.fields {
            if !names.insert(field.name.as_str()) {
                return Err(ConfigError::DuplicateField(field.name.clone()));
            }
            if !(0.0..=MAX_DIFFUSION_RATE).contains(&field.diffusion) {
                return Err(ConfigError::InvalidDiffusionRate {
                    field: field.name.clone(),
                    rate: field.diffusion,
                });
            }
            if !(0.0..=1.0).contains(&field.decay) {
                return Err(ConfigError::InvalidDecayRate {
                    field: field.name.clone(),
                    rate: field.decay,
                });
            }
        }
        for required in [HEAT_FIELD, NECROMASS_FIELD] {
            if !names.contains(required) {
                return Err(ConfigError::MissingField(required.to_string()));
            }
        }

        for source in &self.sources {
            if let SourceConfig::Vent {
                field,
                range,
                position,
                ..
            } = source
            {
                if let Some((lo, hi)) = range
                    && lo > hi
                {
                    return Err(ConfigError::InvalidVentRange {
                        field: field.clone(),
                        lo: *lo,
                        hi: *hi,
                    });
                }
                if let Some((x, y)) = position
                    && (*x >= self.width || *y >= self.height)
                {
                    return Err(ConfigError::SourceOutOfBounds {
                        field: field.clone(),
                        x: *x,
                        y: *y,
                    });
                }
            }
        }

        if self.species.is_empty() {
            return Err(ConfigError::NoSpecies);
        }
        let mut ids = BTreeSet::new();
        for species in &self.species {
            if !ids.insert(species.id.as_str()) {
                return Err(ConfigError::DuplicateSpecies(species.id.clone()));
            }
            if !(0.0..=1.0).contains(&species.repro_probability) {
                return Err(ConfigError::InvalidProbability {
                    species: species.id.clone(),
                    value: species.repro_probability,
                });
            }
        }

        if !(0.0..=1.0).contains(&self.biology.offspring_energy_share) {
            return Err(ConfigError::InvalidOffspringShare(
                self.biology.offspring_energy_share,
            ));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid dimensions (width, height) must be non-zero")]
    InvalidDimensions,
    #[error("Required field '{0}' is not configured")]
    MissingField(String),
    #[error("Field '{0}' is configured more than once")]
    DuplicateField(String),
    #[error("Field '{field}' diffusion rate {rate} is outside [0, 1/6]")]
    InvalidDiffusionRate { field: String, rate: f64 },
    #[error("Field '{field}' decay rate {rate} is outside [0, 1]")]
    InvalidDecayRate { field: String, rate: f64 },
    #[error("Source references unknown field '{0}'")]
    UnknownSourceField(String),
    #[error("Vent on '{field}' has inverted range ({lo}, {hi})")]
    InvalidVentRange { field: String, lo: f64, hi: f64 },
    #[error("Vent on '{field}' at ({x}, {y}) lies outside the grid")]
    SourceOutOfBounds { field: String, x: usize, y: usize },
    #[error("No species configured")]
    NoSpecies,
    #[error("Species '{0}' is configured more than once")]
    DuplicateSpecies(String),
    #[error("Species '{species}' references unknown field '{field}'")]
    UnknownSpeciesField { species: String, field: String },
    #[error("Species '{species}' cannot take in or excrete thermal field '{field}'")]
    ThermalFieldReference { species: String, field: String },
    #[error("Species '{species}' leaks mass: excretion weights sum to {sum}, must be 1.0")]
    ExcretionWeights { species: String, sum: f64 },
    #[error("Species '{species}' reproduction probability {value} is outside [0, 1]")]
    InvalidProbability { species: String, value: f64 },
    #[error("Offspring energy share {0} is outside [0, 1]")]
    InvalidOffspringShare(f64),
}
