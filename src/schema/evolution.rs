//! Evolution configuration and the data exchanged with observers and storage.
//!
//! This module provides the types for configuring the locomotion evolution
//! of a grown tensegrity: the cycle-count schedule, population sizes, the
//! serialized genome format and the snapshots broadcast after each ranking.

use serde::{Deserialize, Serialize};

/// Top-level configuration for evolving a gait.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Ascending cycle counts, one per difficulty tier.
    #[serde(default = "default_cycle_pattern")]
    pub cycle_pattern: Vec<u32>,
    /// Number of winners kept and persisted each generation.
    #[serde(default = "default_persistent_population")]
    pub persistent_population: usize,
    /// Number of mutated challengers run against the winners.
    #[serde(default = "default_challenger_population")]
    pub challenger_population: usize,
    /// Physics ticks in one actuation cycle.
    #[serde(default = "default_ticks_per_cycle")]
    pub ticks_per_cycle: u32,
    /// Mutations applied when a challenger is derived from a winner.
    #[serde(default = "default_mutation_count")]
    pub mutation_count: u32,
    /// Horizontal distance from the target that counts as reaching it.
    #[serde(default = "default_target_radius")]
    pub target_radius: f32,
    /// Rest length of a contracted muscle relative to its relaxed length.
    #[serde(default = "default_muscle_contraction")]
    pub muscle_contraction: f32,
    /// Ticks a muscle takes to contract or relax.
    #[serde(default = "default_twitch_countdown")]
    pub twitch_countdown: u32,
    /// Let runners pick their direction from the bearing of the target.
    #[serde(default)]
    pub autopilot: bool,
    /// Maximum number of physics instances alive at once.
    #[serde(default = "default_max_instances")]
    pub max_instances: usize,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            cycle_pattern: default_cycle_pattern(),
            persistent_population: default_persistent_population(),
            challenger_population: default_challenger_population(),
            ticks_per_cycle: default_ticks_per_cycle(),
            mutation_count: default_mutation_count(),
            target_radius: default_target_radius(),
            muscle_contraction: default_muscle_contraction(),
            twitch_countdown: default_twitch_countdown(),
            autopilot: false,
            max_instances: default_max_instances(),
            random_seed: None,
        }
    }
}

fn default_cycle_pattern() -> Vec<u32> {
    vec![5, 6, 7, 8, 9, 10]
}
fn default_persistent_population() -> usize {
    8
}
fn default_challenger_population() -> usize {
    8
}
fn default_ticks_per_cycle() -> u32 {
    2000
}
fn default_mutation_count() -> u32 {
    3
}
fn default_target_radius() -> f32 {
    1.0
}
fn default_muscle_contraction() -> f32 {
    0.7
}
fn default_twitch_countdown() -> u32 {
    100
}
fn default_max_instances() -> usize {
    24
}

impl EvolutionConfig {
    /// Validate evolution configuration.
    pub fn validate(&self) -> Result<(), EvolutionConfigError> {
        if self.cycle_pattern.is_empty() {
            return Err(EvolutionConfigError::EmptyCyclePattern);
        }
        if self.cycle_pattern[0] == 0 || self.cycle_pattern.windows(2).any(|w| w[0] >= w[1]) {
            return Err(EvolutionConfigError::CyclePatternNotAscending(
                self.cycle_pattern.clone(),
            ));
        }
        if self.persistent_population == 0 || self.challenger_population == 0 {
            return Err(EvolutionConfigError::PopulationTooSmall);
        }
        let needed = self.persistent_population + self.challenger_population;
        if self.max_instances < needed {
            return Err(EvolutionConfigError::PoolTooSmall {
                needed,
                available: self.max_instances,
            });
        }
        if self.ticks_per_cycle < 12 {
            return Err(EvolutionConfigError::InvalidTicksPerCycle(
                self.ticks_per_cycle,
            ));
        }
        if self.muscle_contraction <= 0.0 || self.muscle_contraction > 1.0 {
            return Err(EvolutionConfigError::InvalidContraction(
                self.muscle_contraction,
            ));
        }
        if self.target_radius <= 0.0 {
            return Err(EvolutionConfigError::InvalidTargetRadius(self.target_radius));
        }
        Ok(())
    }

    /// Total runners alive while challengers run.
    pub fn total_population(&self) -> usize {
        self.persistent_population + self.challenger_population
    }
}

/// Direction a runner is trying to move in. Each direction has its own gene.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Direction {
    #[default]
    Rest,
    Forward,
    Left,
    Right,
    Reverse,
}

impl Direction {
    /// All directions.
    pub const ALL: [Direction; 5] = [
        Direction::Rest,
        Direction::Forward,
        Direction::Left,
        Direction::Right,
        Direction::Reverse,
    ];
}

/// Serialized gene: the dice rolls for one direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneData {
    pub direction: Direction,
    pub dice: Vec<u8>,
}

/// Serialized genome as kept in durable storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeData {
    /// Number of mutations in the genome's ancestry.
    pub tosses: u32,
    pub genes: Vec<GeneData>,
}

/// Current phase of the population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvolutionPhase {
    /// Winners run to the current cycle count.
    #[default]
    WinnersRun,
    /// First generation of challengers is spawned.
    ChallengersBorn,
    /// Existing challengers are recycled with fresh genomes.
    ChallengersReborn,
    /// Challengers run and are ranked against the winners.
    ChallengersRun,
    /// Ranked evolvers are split and winners persisted.
    WinnersStored,
    /// Move to the next cycle count or finish.
    EvolutionAdvance,
    /// Terminal: the schedule is exhausted.
    EvolutionDone,
    /// Terminal: every winner reached the target at the last tier.
    EvolutionHarder,
}

impl EvolutionPhase {
    /// Whether evolution has stopped.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EvolutionPhase::EvolutionDone | EvolutionPhase::EvolutionHarder
        )
    }
}

/// Standing of one evolver in a ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolverSnapshot {
    pub name: String,
    /// Distance to the target at the ranked cycle.
    pub proximity: f32,
    pub tosses: u32,
    pub reached_target: bool,
    pub persisted: bool,
}

/// Result of ranking the population at one completed cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionSnapshot {
    pub cycle_pattern: Vec<u32>,
    /// Index into the cycle pattern.
    pub tier: usize,
    /// Completed cycle count the ranking was taken at.
    pub cycle: u32,
    /// Evolvers in rank order, best first.
    pub evolvers: Vec<EvolverSnapshot>,
}

/// Evolution configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionConfigError {
    #[error("Cycle pattern must not be empty")]
    EmptyCyclePattern,
    #[error("Cycle pattern {0:?} must be strictly ascending and positive")]
    CyclePatternNotAscending(Vec<u32>),
    #[error("Winner and challenger populations must be non-zero")]
    PopulationTooSmall,
    #[error("Instance pool of {available} cannot hold {needed} runners")]
    PoolTooSmall { needed: usize, available: usize },
    #[error("A cycle of {0} ticks is too short")]
    InvalidTicksPerCycle(u32),
    #[error("Muscle contraction {0} must be in (0, 1]")]
    InvalidContraction(f32),
    #[error("Target radius {0} must be positive")]
    InvalidTargetRadius(f32),
}
