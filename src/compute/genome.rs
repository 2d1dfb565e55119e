//! Species genomes.
//!
//! A genome is built once per species from its configuration, with every
//! field name resolved to a [`FieldId`]. It is immutable afterwards and shared
//! by all agents of the species through an `Arc`.

use std::collections::BTreeMap;

use crate::schema::{BiologyConfig, ConfigError, SpeciesConfig};

use super::{FieldGrid, FieldId, FieldKind};

/// Allowed deviation of the excretion weight sum from 1.0.
pub const EXCRETION_TOLERANCE: f64 = 1e-6;

/// Numeric trait table. Copied into every agent at birth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Traits {
    pub starting_energy: f64,
    pub growth_efficiency: f64,
    pub metabolic_cost: f64,
    pub max_bite: f64,
    pub entropy_coefficient: f64,
    pub toxin_tolerance: f64,
    pub heat_tolerance: f64,
    pub repro_threshold: f64,
    pub repro_probability: f64,
    pub repro_aging_cost: f64,
    pub aging_rate: f64,
    pub lifespan_limit: f64,
    pub death_energy: f64,
    /// Structural mass of a body; also the mass cost of one offspring.
    pub body_mass: f64,
}

impl Traits {
    fn from_config(config: &SpeciesConfig, biology: &BiologyConfig) -> Self {
        Self {
            starting_energy: config.starting_energy,
            growth_efficiency: config.growth_efficiency,
            metabolic_cost: config.metabolic_cost,
            max_bite: config.max_bite,
            entropy_coefficient: config.entropy_coefficient,
            toxin_tolerance: config.toxin_tolerance,
            heat_tolerance: config.heat_tolerance,
            repro_threshold: config.repro_threshold,
            repro_probability: config.repro_probability,
            repro_aging_cost: config.repro_aging_cost,
            aging_rate: config.aging_rate,
            lifespan_limit: config.lifespan_limit,
            death_energy: config.death_energy,
            body_mass: biology.body_mass,
        }
    }
}

/// How an agent treats one field on its cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactiveField {
    pub field: FieldId,
    /// Energy extracted per unit of processed mass; `None` if not a substrate.
    pub efficiency: Option<f64>,
    /// Fraction of harvested mass internalized as toxin.
    pub toxin_sensitivity: f64,
}

/// Immutable per-species definition.
#[derive(Debug, Clone)]
pub struct Genome {
    pub species_id: String,
    intakes: Vec<(FieldId, f64)>,
    excretions: Vec<(FieldId, f64)>,
    toxins: Vec<(FieldId, f64)>,
    reactive: Vec<ReactiveField>,
    pub traits: Traits,
}

impl Genome {
    /// Build and validate a genome against the field grid.
    ///
    /// Fails if excretion weights do not sum to 1.0, or if any map names a
    /// field that is unknown or thermal.
    pub fn new(
        config: &SpeciesConfig,
        fields: &FieldGrid,
        biology: &BiologyConfig,
    ) -> Result<Self, ConfigError> {
        let intakes = resolve_map(&config.id, &config.intakes, fields)?;
        let excretions = resolve_map(&config.id, &config.excretions, fields)?;
        let toxins = resolve_map(&config.id, &config.toxins, fields)?;

        let sum: f64 = excretions.iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > EXCRETION_TOLERANCE {
            return Err(ConfigError::ExcretionWeights {
                species: config.id.clone(),
                sum,
            });
        }

        let mut ids: Vec<FieldId> = intakes
            .iter()
            .chain(&excretions)
            .chain(&toxins)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let lookup = |map: &[(FieldId, f64)], id: FieldId| {
            map.iter().find(|(f, _)| *f == id).map(|(_, v)| *v)
        };
        let reactive = ids
            .into_iter()
            .map(|id| ReactiveField {
                field: id,
                efficiency: lookup(&intakes, id),
                toxin_sensitivity: lookup(&toxins, id).unwrap_or(0.0),
            })
            .collect();

        Ok(Self {
            species_id: config.id.clone(),
            intakes,
            excretions,
            toxins,
            reactive,
            traits: Traits::from_config(config, biology),
        })
    }

    /// Substrate fields and their energy efficiencies.
    pub fn intakes(&self) -> &[(FieldId, f64)] {
        &self.intakes
    }

    /// Excretion targets and their weights (summing to 1).
    pub fn excretions(&self) -> &[(FieldId, f64)] {
        &self.excretions
    }

    /// Toxic fields and their sensitivities.
    pub fn toxins(&self) -> &[(FieldId, f64)] {
        &self.toxins
    }

    /// Union of intake, toxin and excretion fields, in field order.
    pub fn reactive_fields(&self) -> &[ReactiveField] {
        &self.reactive
    }
}

fn resolve_map(
    species: &str,
    map: &BTreeMap<String, f64>,
    fields: &FieldGrid,
) -> Result<Vec<(FieldId, f64)>, ConfigError> {
    map.iter()
        .map(|(name, &value)| {
            let id = fields
                .resolve(name)
                .ok_or_else(|| ConfigError::UnknownSpeciesField {
                    species: species.to_string(),
                    field: name.clone(),
                })?;
            if fields.field(id).kind == FieldKind::Thermal {
                return Err(ConfigError::ThermalFieldReference {
                    species: species.to_string(),
                    field: name.clone(),
                });
            }
            Ok((id, value))
        })
        .collect()
}
