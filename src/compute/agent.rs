//! Agent metabolic state machine.
//!
//! One [`Agent::step`] per tick runs the phases below against the agent's
//! own cell, in this order:
//!
//! 1. Aging (senescence check, nothing else runs on death)
//! 2. Intake over the reactive fields, capped by the bite size
//! 3. Thermodynamics (energy gain, metabolic cost, heat release)
//! 4. Growth and excretion of processed mass
//! 5. Survival filters: starvation, toxicity, heat
//! 6. Reproduction roll
//!
//! The order matters for conservation: every unit removed from a field in
//! phase 2 ends up in stored mass, internal toxins, or back in a field by the
//! end of phase 4.

use std::sync::Arc;

use rand::Rng;

use crate::schema::DeathCause;

use super::{FieldGrid, Genome, Ledger, Traits};

/// Floor on reactive mass when computing the harvest ratio.
const MIN_TILE_MASS: f64 = 1e-6;

/// Result of one agent tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Die(DeathCause),
    /// Body-mass cost already deducted; placement is up to the population.
    Reproduce,
    Stay,
}

/// A single organism.
#[derive(Debug, Clone)]
pub struct Agent {
    /// Cell `(x, y)` on the torus.
    pub position: (usize, usize),
    pub genome: Arc<Genome>,
    /// Private copy of the species traits.
    pub traits: Traits,
    pub energy: f64,
    pub stored_mass: f64,
    pub internal_toxins: f64,
    pub age: f64,
}

impl Agent {
    /// Genesis agent with the species' starting energy.
    pub fn new(position: (usize, usize), genome: Arc<Genome>) -> Self {
        let traits = genome.traits;
        Self {
            position,
            genome,
            traits,
            energy: traits.starting_energy,
            stored_mass: 0.0,
            internal_toxins: 0.0,
            age: 0.0,
        }
    }

    /// Newborn inheriting the parent's trait snapshot.
    pub fn offspring(position: (usize, usize), parent: &Agent, energy: f64) -> Self {
        Self {
            position,
            genome: Arc::clone(&parent.genome),
            traits: parent.traits,
            energy,
            stored_mass: 0.0,
            internal_toxins: 0.0,
            age: 0.0,
        }
    }

    #[inline]
    pub fn species_id(&self) -> &str {
        &self.genome.species_id
    }

    /// Mass that returns to the environment when this agent dies.
    #[inline]
    pub fn biomass(&self) -> f64 {
        self.traits.body_mass + self.stored_mass + self.internal_toxins
    }

    /// Advance one tick against the agent's cell.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        fields: &mut FieldGrid,
        ledger: &mut Ledger,
        rng: &mut R,
    ) -> StepOutcome {
        let cell = self.position;
        let t = self.traits;
        let heat = fields.heat();

        // 1. Aging
        self.age += t.aging_rate;
        if self.age >= t.lifespan_limit {
            return StepOutcome::Die(DeathCause::Senescence);
        }

        // 2. Intake
        let reactive = self.genome.reactive_fields();
        let on_tile: f64 = reactive.iter().map(|r| fields.value(r.field, cell)).sum();
        let ratio = (t.max_bite / on_tile.max(MIN_TILE_MASS)).min(1.0);

        let mut processable = 0.0;
        let mut energy_gain = 0.0;
        for r in reactive {
            let grabbed = fields.value(r.field, cell) * ratio;
            fields.add(r.field, cell, -grabbed);

            let toxin = grabbed * r.toxin_sensitivity;
            self.internal_toxins += toxin;
            let rest = grabbed - toxin;

            match r.efficiency {
                Some(efficiency) => {
                    processable += rest;
                    energy_gain += rest * efficiency;
                }
                // Not a substrate: hand it back untouched.
                None => fields.add(r.field, cell, rest),
            }
        }

        // 3. Thermodynamics
        let conversion_heat = energy_gain * t.entropy_coefficient;
        self.energy += energy_gain - t.metabolic_cost;
        fields.add(heat, cell, conversion_heat + t.metabolic_cost);
        ledger.record_generated(energy_gain + conversion_heat);

        // 4. Growth and excretion
        let kept = processable * t.growth_efficiency;
        self.stored_mass += kept;
        let waste = processable - kept;
        if waste != 0.0 {
            let excretions = self.genome.excretions();
            let mut released = 0.0;
            for (i, &(field, weight)) in excretions.iter().enumerate() {
                // Last target takes the remainder so rounding never loses mass.
                let share = if i + 1 == excretions.len() {
                    waste - released
                } else {
                    waste * weight
                };
                fields.add(field, cell, share);
                released += share;
            }
        }

        // 5. Survival filters
        if self.energy <= t.death_energy {
            return StepOutcome::Die(DeathCause::Starvation);
        }
        if self.internal_toxins > t.toxin_tolerance {
            return StepOutcome::Die(DeathCause::Toxicity);
        }
        if fields.value(heat, cell) > t.heat_tolerance {
            return StepOutcome::Die(DeathCause::Heat);
        }

        // 6. Reproduction
        if self.energy >= t.repro_threshold
            && self.stored_mass >= t.body_mass
            && rng.gen_range(0.0..1.0) < t.repro_probability
        {
            self.stored_mass -= t.body_mass;
            return StepOutcome::Reproduce;
        }

        StepOutcome::Stay
    }
}
