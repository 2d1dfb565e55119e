//! Population controller.
//!
//! Owns the live agents and the occupancy map, decides execution order, and
//! resolves agent outcomes: necromass bursts on death, offspring placement on
//! reproduction, occupancy rebuild at the end of every tick.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::schema::{
    DeathCause, DeathTally, PopulationLayout, SITE_OFFSETS, SimulationConfig, cluster_sites,
};

use super::{Agent, FieldGrid, Genome, Ledger, StepOutcome, wrap_coord};

/// The eight Moore neighbours `(dx, dy)` of a cell.
pub const NEIGHBOR_OFFSETS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// One-agent-per-cell occupancy grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyMap {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl OccupancyMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width * height],
        }
    }

    #[inline]
    pub fn is_occupied(&self, (x, y): (usize, usize)) -> bool {
        self.cells[y * self.width + x]
    }

    #[inline]
    pub fn occupy(&mut self, (x, y): (usize, usize)) {
        self.cells[y * self.width + x] = true;
    }

    /// Cell reached from `(x, y)` by `(dx, dy)` on the torus.
    #[inline]
    pub fn offset(&self, (x, y): (usize, usize), dx: i64, dy: i64) -> (usize, usize) {
        (
            wrap_coord(x as i64 + dx, self.width),
            wrap_coord(y as i64 + dy, self.height),
        )
    }

    /// Number of occupied cells.
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

/// Births and deaths resolved during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub births: usize,
    pub deaths: usize,
    pub failed_births: usize,
}

/// Release a dead agent into the environment.
///
/// Residual energy (possibly negative) becomes heat on the death cell. The
/// biomass is split into nine equal shares over the 3x3 toroidal
/// neighbourhood of the necromass field.
pub fn necromass_burst(fields: &mut FieldGrid, position: (usize, usize), mass: f64, energy: f64) {
    let heat = fields.heat();
    let necromass = fields.necromass();
    fields.add(heat, position, energy);

    let share = mass / 9.0;
    for dy in -1..=1 {
        for dx in -1..=1 {
            let cell = fields.offset(position, dx, dy);
            fields.add(necromass, cell, share);
        }
    }
}

/// Live agents plus their bookkeeping.
#[derive(Debug, Clone)]
pub struct Population {
    agents: Vec<Agent>,
    occupancy: OccupancyMap,
    deaths: BTreeMap<String, DeathTally>,
    offspring_energy_share: f64,
}

impl Population {
    /// Empty population for the given grid.
    pub fn new(
        width: usize,
        height: usize,
        species: impl IntoIterator<Item = String>,
        offspring_energy_share: f64,
    ) -> Self {
        Self {
            agents: Vec::new(),
            occupancy: OccupancyMap::new(width, height),
            deaths: species
                .into_iter()
                .map(|id| (id, DeathTally::default()))
                .collect(),
            offspring_energy_share,
        }
    }

    /// Place the genesis population. `genomes` follows `config.species` order.
    pub fn genesis<R: Rng + ?Sized>(
        config: &SimulationConfig,
        genomes: &[Arc<Genome>],
        rng: &mut R,
    ) -> Self {
        let mut population = Self::new(
            config.width,
            config.height,
            genomes.iter().map(|g| g.species_id.clone()),
            config.biology.offspring_energy_share,
        );
        let counts: Vec<usize> = config.species.iter().map(|s| s.initial_count).collect();

        match config.layout {
            PopulationLayout::Clustered => {
                let site_count = counts.iter().copied().max().unwrap_or(0);
                let sites = cluster_sites(config.width, config.height, site_count);
                for (site_idx, &site) in sites.iter().enumerate() {
                    for (s_idx, genome) in genomes.iter().enumerate() {
                        if site_idx >= counts[s_idx] {
                            continue;
                        }
                        let (dx, dy) = SITE_OFFSETS[s_idx % SITE_OFFSETS.len()];
                        let cell = population.occupancy.offset(site, dx, dy);
                        population.insert(Agent::new(cell, Arc::clone(genome)));
                    }
                }
            }
            PopulationLayout::Random => {
                for (s_idx, genome) in genomes.iter().enumerate() {
                    let mut free: Vec<(usize, usize)> = (0..config.height)
                        .flat_map(|y| (0..config.width).map(move |x| (x, y)))
                        .filter(|&cell| !population.occupancy.is_occupied(cell))
                        .collect();
                    if free.len() < counts[s_idx] {
                        log::warn!(
                            "grid saturated: placing {} of {} '{}' agents",
                            free.len(),
                            counts[s_idx],
                            genome.species_id
                        );
                    }
                    free.shuffle(rng);
                    for cell in free.into_iter().take(counts[s_idx]) {
                        population.insert(Agent::new(cell, Arc::clone(genome)));
                    }
                }
            }
        }
        population
    }

    /// Add an agent if its cell is free. Returns whether it was placed.
    pub fn insert(&mut self, agent: Agent) -> bool {
        if self.occupancy.is_occupied(agent.position) {
            return false;
        }
        self.occupancy.occupy(agent.position);
        self.deaths.entry(agent.species_id().to_string()).or_default();
        self.agents.push(agent);
        true
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn occupancy(&self) -> &OccupancyMap {
        &self.occupancy
    }

    pub fn deaths(&self) -> &BTreeMap<String, DeathTally> {
        &self.deaths
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_extinct(&self) -> bool {
        self.agents.is_empty()
    }

    /// Body + stored + toxin mass over all agents.
    pub fn bio_mass(&self) -> f64 {
        self.agents.iter().map(Agent::biomass).sum()
    }

    /// Internal energy over all agents.
    pub fn total_energy(&self) -> f64 {
        self.agents.iter().map(|a| a.energy).sum()
    }

    /// Run every agent once in shuffled order and resolve the outcomes.
    ///
    /// Each agent finishes its whole transaction before the next one starts,
    /// so later agents see cells already depleted by earlier ones.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        fields: &mut FieldGrid,
        ledger: &mut Ledger,
        rng: &mut R,
    ) -> TickSummary {
        let mut order = std::mem::take(&mut self.agents);
        order.shuffle(rng);

        let mut summary = TickSummary::default();
        let mut next = Vec::with_capacity(order.len());
        let mut next_occupancy = OccupancyMap::new(self.occupancy.width, self.occupancy.height);

        for mut agent in order {
            match agent.step(fields, ledger, rng) {
                StepOutcome::Die(cause) => {
                    self.bury(&agent, cause, fields);
                    summary.deaths += 1;
                    continue;
                }
                StepOutcome::Reproduce => {
                    match self.reproduce(&mut agent, &next_occupancy, rng) {
                        Some(child) => {
                            next_occupancy.occupy(child.position);
                            next.push(child);
                            summary.births += 1;
                        }
                        None => summary.failed_births += 1,
                    }
                }
                StepOutcome::Stay => {}
            }
            next_occupancy.occupy(agent.position);
            next.push(agent);
        }

        self.agents = next;
        self.occupancy = next_occupancy;
        summary
    }

    /// Tally a death and return the body to the environment.
    pub fn bury(&mut self, agent: &Agent, cause: DeathCause, fields: &mut FieldGrid) {
        self.deaths
            .entry(agent.species_id().to_string())
            .or_default()
            .record(cause);
        necromass_burst(fields, agent.position, agent.biomass(), agent.energy);
    }

    /// Place a child next to `parent`, trying the neighbours in random order.
    ///
    /// A cell is free only if it is empty both in the start-of-tick map and in
    /// `next_occupancy`. When no cell is free the body-mass cost already paid
    /// by the parent is refunded and no child is created.
    pub fn reproduce<R: Rng + ?Sized>(
        &self,
        parent: &mut Agent,
        next_occupancy: &OccupancyMap,
        rng: &mut R,
    ) -> Option<Agent> {
        let mut offsets = NEIGHBOR_OFFSETS;
        offsets.shuffle(rng);

        for (dx, dy) in offsets {
            let cell = self.occupancy.offset(parent.position, dx, dy);
            if self.occupancy.is_occupied(cell) || next_occupancy.is_occupied(cell) {
                continue;
            }
            let gift = parent.energy * self.offspring_energy_share;
            parent.energy -= gift;
            parent.age += parent.traits.repro_aging_cost;
            return Some(Agent::offspring(cell, parent, gift));
        }

        parent.stored_mass += parent.traits.body_mass;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BiologyConfig, SpeciesConfig};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn setup(width: usize, height: usize) -> (FieldGrid, Arc<Genome>, Population) {
        let config = SimulationConfig {
            width,
            height,
            ..SimulationConfig::default()
        };
        let fields = FieldGrid::new(&config).unwrap();
        let genome = Arc::new(
            Genome::new(&SpeciesConfig::default(), &fields, &BiologyConfig::default()).unwrap(),
        );
        let population = Population::new(width, height, ["standard".to_string()], 0.5);
        (fields, genome, population)
    }

    #[test]
    fn test_burst_spreads_mass_over_nine_cells() {
        let (mut fields, genome, mut population) = setup(5, 5);
        let necromass = fields.necromass();
        let heat = fields.heat();

        let mut agent = Agent::new((0, 0), genome);
        agent.stored_mass = 2.5;
        agent.internal_toxins = 0.5;
        agent.energy = 7.0;
        let burst = agent.biomass();
        assert!((burst - 5.0).abs() < 1e-12);

        population.bury(&agent, DeathCause::Toxicity, &mut fields);

        let share = burst / 9.0;
        for &cell in &[(4, 4), (0, 4), (1, 4), (4, 0), (0, 0), (1, 0), (4, 1), (0, 1), (1, 1)] {
            assert!((fields.value(necromass, cell) - share).abs() < 1e-12, "{:?}", cell);
        }
        assert_eq!(fields.value(necromass, (2, 2)), 0.0);
        assert!((fields.field(necromass).total() - burst).abs() < 1e-12);
        assert!((fields.value(heat, (0, 0)) - 27.0).abs() < 1e-12);
        assert_eq!(population.deaths()["standard"].toxicity, 1);
    }

    #[test]
    fn test_crowded_reproduction_refunds() {
        let (_, genome, mut population) = setup(5, 5);
        for dy in -1..=1i64 {
            for dx in -1..=1i64 {
                let cell = ((2 + dx) as usize, (2 + dy) as usize);
                assert!(population.insert(Agent::new(cell, Arc::clone(&genome))));
            }
        }
        let mut parent = Agent::new((2, 2), Arc::clone(&genome));
        parent.energy = 60.0;
        parent.stored_mass = 1.0;

        let next = OccupancyMap::new(5, 5);
        let child = population.reproduce(&mut parent, &next, &mut StdRng::seed_from_u64(3));

        assert!(child.is_none());
        assert!((parent.stored_mass - 3.0).abs() < 1e-12);
        assert_eq!(parent.energy, 60.0);
        assert_eq!(parent.age, 0.0);
        assert_eq!(population.len(), 9);
    }

    #[test]
    fn test_crowded_tick_conserves_bio_mass() {
        let (mut fields, genome, mut population) = setup(5, 5);
        for dy in -1..=1i64 {
            for dx in -1..=1i64 {
                let cell = ((2 + dx) as usize, (2 + dy) as usize);
                let mut agent = Agent::new(cell, Arc::clone(&genome));
                if cell == (2, 2) {
                    agent.traits.repro_probability = 1.0;
                    agent.energy = 100.0;
                    agent.stored_mass = 5.0;
                }
                population.insert(agent);
            }
        }
        let bio_before = population.bio_mass();

        let summary = population.advance(
            &mut fields,
            &mut Ledger::default(),
            &mut StdRng::seed_from_u64(11),
        );

        assert_eq!(summary.failed_births, 1);
        assert_eq!(summary.births, 0);
        assert_eq!(population.len(), 9);
        assert!((population.bio_mass() - bio_before).abs() < 1e-12);
    }

    #[test]
    fn test_reproduction_places_child() {
        let (_, genome, mut population) = setup(5, 5);
        population.insert(Agent::new((0, 0), Arc::clone(&genome)));
        let mut parent = population.agents()[0].clone();
        parent.energy = 60.0;

        let next = OccupancyMap::new(5, 5);
        let child = population
            .reproduce(&mut parent, &next, &mut StdRng::seed_from_u64(5))
            .expect("free neighbour available");

        assert_ne!(child.position, (0, 0));
        let (cx, cy) = child.position;
        assert!([0, 1, 4].contains(&cx) && [0, 1, 4].contains(&cy));
        assert_eq!(parent.energy, 30.0);
        assert_eq!(child.energy, 30.0);
        assert_eq!(parent.age, parent.traits.repro_aging_cost);
        assert_eq!(child.age, 0.0);
    }

    #[test]
    fn test_advance_rebuilds_occupancy() {
        let (mut fields, genome, mut population) = setup(6, 6);
        population.insert(Agent::new((1, 1), Arc::clone(&genome)));
        let mut doomed = Agent::new((4, 4), Arc::clone(&genome));
        doomed.age = 1_000.0;
        population.insert(doomed);

        let summary = population.advance(
            &mut fields,
            &mut Ledger::default(),
            &mut StdRng::seed_from_u64(1),
        );

        assert_eq!(summary.deaths, 1);
        assert_eq!(population.len(), 1);
        assert!(population.occupancy().is_occupied((1, 1)));
        assert!(!population.occupancy().is_occupied((4, 4)));
        assert_eq!(population.occupancy().count(), 1);
        assert_eq!(population.deaths()["standard"].senescence, 1);
    }

    #[test]
    fn test_clustered_genesis() {
        let config = SimulationConfig {
            width: 20,
            height: 20,
            ..SimulationConfig::default()
        };
        let fields = FieldGrid::new(&config).unwrap();
        let genome = Arc::new(
            Genome::new(&config.species[0], &fields, &config.biology).unwrap(),
        );
        let population = Population::genesis(&config, &[genome], &mut StdRng::seed_from_u64(0));

        assert_eq!(population.len(), 40);
        assert_eq!(population.occupancy().count(), 40);
    }

    #[test]
    fn test_random_genesis_saturates_small_grid() {
        let mut config = SimulationConfig {
            width: 4,
            height: 4,
            layout: PopulationLayout::Random,
            ..SimulationConfig::default()
        };
        config.species[0].initial_count = 30;
        let fields = FieldGrid::new(&config).unwrap();
        let genome = Arc::new(
            Genome::new(&config.species[0], &fields, &config.biology).unwrap(),
        );
        let population = Population::genesis(&config, &[genome], &mut StdRng::seed_from_u64(0));

        assert_eq!(population.len(), 16);
        assert_eq!(population.occupancy().count(), 16);
    }

    #[test]
    fn test_two_species_share_sites() {
        let mut config = SimulationConfig {
            width: 30,
            height: 30,
            ..SimulationConfig::default()
        };
        let mut mutant = SpeciesConfig {
            id: "mutant".into(),
            ..SpeciesConfig::default()
        };
        mutant.initial_count = 10;
        config.species.push(mutant);

        let fields = FieldGrid::new(&config).unwrap();
        let genomes: Vec<Arc<Genome>> = config
            .species
            .iter()
            .map(|s| Arc::new(Genome::new(s, &fields, &config.biology).unwrap()))
            .collect();
        let population = Population::genesis(&config, &genomes, &mut StdRng::seed_from_u64(0));

        let mutants = population
            .agents()
            .iter()
            .filter(|a| a.species_id() == "mutant")
            .count();
        assert_eq!(mutants, 10);
        assert_eq!(population.len(), 50);
        assert_eq!(population.deaths().len(), 2);
    }
}
