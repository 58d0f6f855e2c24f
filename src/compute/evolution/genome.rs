//! Dice genomes and the twitches they encode.
//!
//! A gene is a sequence of die rolls for one [`Direction`]. Every four dice
//! describe one twitch: which muscle fires, when in the cycle it contracts
//! and when it lets go. Genomes are values; mutation returns a new genome.

use std::collections::BTreeMap;

use rand::prelude::*;

use crate::schema::{Direction, GeneData, GenomeData};

/// Dice per twitch.
const TWITCH_DICE: usize = 4;

/// Random number generator wrapper for genome operations.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded when a seed is given, random otherwise.
    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::random, Self::new)
    }

    /// Roll a die.
    pub fn die(&mut self) -> u8 {
        self.rng.gen_range(1..=6)
    }

    /// Roll a die showing any face but `current`.
    pub fn reroll(&mut self, current: u8) -> u8 {
        let value = self.rng.gen_range(1..=5);
        if value >= current { value + 1 } else { value }
    }

    /// Uniform index below `len`.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// True with the given probability.
    pub fn chance(&mut self, probability: f64) -> bool {
        self.rng.gen_bool(probability)
    }
}

/// One muscle contraction within a cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Twitch {
    pub muscle: usize,
    /// Fraction of the cycle at which the muscle contracts.
    pub attack: f32,
    /// Fraction of the cycle at which it relaxes. May exceed one, wrapping
    /// into the next cycle.
    pub decay: f32,
}

impl Twitch {
    fn from_dice(dice: &[u8], muscle_count: usize) -> Self {
        let roll = |i: usize| dice[i].saturating_sub(1) as usize;
        let attack = roll(2) as f32 / 6.0;
        Self {
            muscle: (roll(0) * 6 + roll(1)) % muscle_count,
            attack,
            decay: attack + dice[3] as f32 / 12.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenomeError {
    #[error("Die {value} in the {direction:?} gene is not between 1 and 6")]
    InvalidDie { direction: Direction, value: u8 },
}

/// Directional genes plus the number of mutations behind them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Genome {
    genes: BTreeMap<Direction, Vec<u8>>,
    tosses: u32,
}

impl Genome {
    pub fn from_data(data: &GenomeData) -> Result<Self, GenomeError> {
        let mut genes = BTreeMap::new();
        for gene in &data.genes {
            if let Some(&value) = gene.dice.iter().find(|&&die| !(1..=6).contains(&die)) {
                return Err(GenomeError::InvalidDie {
                    direction: gene.direction,
                    value,
                });
            }
            if !gene.dice.is_empty() {
                genes.insert(gene.direction, gene.dice.clone());
            }
        }
        Ok(Self {
            genes,
            tosses: data.tosses,
        })
    }

    pub fn to_data(&self) -> GenomeData {
        GenomeData {
            tosses: self.tosses,
            genes: self
                .genes
                .iter()
                .map(|(&direction, dice)| GeneData {
                    direction,
                    dice: dice.clone(),
                })
                .collect(),
        }
    }

    /// Dice of one direction's gene, empty if it has none.
    pub fn dice(&self, direction: Direction) -> &[u8] {
        self.genes.get(&direction).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tosses(&self) -> u32 {
        self.tosses
    }

    /// Decode a direction's gene for a structure with `muscle_count` muscles.
    pub fn twitches(&self, direction: Direction, muscle_count: usize) -> Vec<Twitch> {
        if muscle_count == 0 {
            return Vec::new();
        }
        self.dice(direction)
            .chunks_exact(TWITCH_DICE)
            .map(|dice| Twitch::from_dice(dice, muscle_count))
            .collect()
    }

    /// A copy with one mutation in the given direction's gene.
    ///
    /// An empty gene, or one time in four, gains a fresh twitch. Otherwise
    /// a single die is re-rolled to a different face.
    pub fn mutated(&self, direction: Direction, rng: &mut GenomeRng) -> Genome {
        let mut genome = self.clone();
        let dice = genome.genes.entry(direction).or_default();
        if dice.is_empty() || rng.chance(0.25) {
            dice.extend((0..TWITCH_DICE).map(|_| rng.die()));
        } else {
            let position = rng.index(dice.len());
            dice[position] = rng.reroll(dice[position]);
        }
        genome.tosses += 1;
        genome
    }

    /// A copy with `count` mutations in the given direction.
    pub fn with_mutations(&self, direction: Direction, count: u32, rng: &mut GenomeRng) -> Genome {
        (0..count).fold(self.clone(), |genome, _| genome.mutated(direction, rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_twitch_decoding() {
        let data = GenomeData {
            tosses: 0,
            genes: vec![GeneData {
                direction: Direction::Forward,
                dice: vec![2, 3, 4, 6, 1, 1, 1, 1],
            }],
        };
        let genome = Genome::from_data(&data).unwrap();
        let twitches = genome.twitches(Direction::Forward, 5);
        assert_eq!(twitches.len(), 2);
        assert_eq!(twitches[0].muscle, 8 % 5);
        assert!((twitches[0].attack - 0.5).abs() < 1e-6);
        assert!((twitches[0].decay - 1.0).abs() < 1e-6);
        assert_eq!(twitches[1].muscle, 0);
        assert!(genome.twitches(Direction::Left, 5).is_empty());
        assert!(genome.twitches(Direction::Forward, 0).is_empty());
    }

    #[test]
    fn test_invalid_die_rejected() {
        let data = GenomeData {
            tosses: 1,
            genes: vec![GeneData {
                direction: Direction::Rest,
                dice: vec![1, 7],
            }],
        };
        assert_eq!(
            Genome::from_data(&data),
            Err(GenomeError::InvalidDie {
                direction: Direction::Rest,
                value: 7
            })
        );
    }

    #[test]
    fn test_mutation_copies() {
        let mut rng = GenomeRng::new(42);
        let original = Genome::default();
        let first = original.mutated(Direction::Forward, &mut rng);
        assert!(original.dice(Direction::Forward).is_empty());
        assert_eq!(first.dice(Direction::Forward).len(), 4);
        assert_eq!(first.tosses(), 1);

        let second = first.mutated(Direction::Forward, &mut rng);
        assert_ne!(second, first);
        assert_eq!(second.tosses(), 2);
        assert!(second.dice(Direction::Left).is_empty());
    }

    #[test]
    fn test_reroll_changes_face() {
        let mut rng = GenomeRng::new(7);
        for current in 1..=6 {
            for _ in 0..20 {
                let value = rng.reroll(current);
                assert_ne!(value, current);
                assert!((1..=6).contains(&value));
            }
        }
    }

    #[test]
    fn test_with_mutations_counts_tosses() {
        let mut rng = GenomeRng::new(1);
        let genome = Genome::default().with_mutations(Direction::Right, 5, &mut rng);
        assert_eq!(genome.tosses(), 5);
        assert!(genome.dice(Direction::Right).len() >= 4);
        assert!(genome.dice(Direction::Right).iter().all(|die| (1..=6).contains(die)));
    }

    fn gene_strategy() -> impl Strategy<Value = GeneData> {
        (
            proptest::sample::select(Direction::ALL.to_vec()),
            proptest::collection::vec(1u8..=6, 0..16),
        )
            .prop_map(|(direction, dice)| GeneData { direction, dice })
    }

    proptest! {
        #[test]
        fn property_data_round_trip(
            tosses in 0u32..1000,
            genes in proptest::collection::btree_map(
                proptest::sample::select(Direction::ALL.to_vec()),
                gene_strategy(),
                0..5,
            ),
        ) {
            let data = GenomeData {
                tosses,
                genes: genes
                    .into_iter()
                    .map(|(direction, gene)| GeneData { direction, dice: gene.dice })
                    .collect(),
            };
            let genome = Genome::from_data(&data).unwrap();
            let json = serde_json::to_string(&genome.to_data()).unwrap();
            let restored: GenomeData = serde_json::from_str(&json).unwrap();
            let restored = Genome::from_data(&restored).unwrap();
            for direction in Direction::ALL {
                prop_assert_eq!(genome.dice(direction), restored.dice(direction));
            }
            prop_assert_eq!(restored.tosses(), tosses);
        }
    }
}
