//! The population: winners, challengers and the phase machine between them.

use std::cmp::Ordering;

use cgmath::Point3;
use log::{debug, info, warn};
use tokio::sync::watch;

use crate::compute::{Engine, GrowthError, InstancePool, Leader, PoolError};
use crate::schema::{
    EvolutionConfig, EvolutionConfigError, EvolutionPhase, EvolutionSnapshot, EvolverSnapshot,
    GenomeData,
};

use super::genome::{Genome, GenomeError, GenomeRng};
use super::runner::Runner;
use super::store::{GenomeStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] EvolutionConfigError),
    #[error(transparent)]
    Genome(#[from] GenomeError),
    #[error(transparent)]
    Growth(#[from] GrowthError),
    #[error("Evolver {name} has no proximity sample for cycle {cycle}")]
    MissingSample { name: String, cycle: u32 },
    #[error("Leader has no muscles to evolve")]
    Embryonic,
}

/// A runner with its proximity history.
pub struct Evolver<E: Engine> {
    name: String,
    runner: Runner<E>,
    /// Proximity after each completed cycle: `history[i]` after `i + 1`.
    history: Vec<f32>,
    reached_target: bool,
    persisted: bool,
}

impl<E: Engine> Evolver<E> {
    fn new(name: String, runner: Runner<E>, persisted: bool) -> Self {
        Self {
            name,
            runner,
            history: Vec::new(),
            reached_target: false,
            persisted,
        }
    }

    /// Run one tick unless the target is reached or `max_cycles` are done.
    /// Returns whether the evolver advanced.
    fn iterate(&mut self, max_cycles: u32, target_radius: f32) -> bool {
        if self.reached_target || self.runner.completed_cycles() >= max_cycles {
            return false;
        }
        self.runner.iterate();
        if self.runner.completed_cycles() as usize > self.history.len() {
            let proximity = self.runner.proximity();
            self.history.push(proximity);
            if proximity <= target_radius {
                self.reached_target = true;
                debug!("{} reached the target after {} cycles", self.name, self.history.len());
            }
        }
        true
    }

    /// Proximity at a completed cycle count, recording it first if this
    /// evolver stopped short of it.
    fn sample(&mut self, cycle: u32) -> Result<f32, EvolutionError> {
        let wanted = cycle as usize;
        if wanted > 0 {
            if self.reached_target {
                while self.history.len() < wanted {
                    self.history.push(self.runner.proximity());
                }
            } else if self.history.len() == wanted - 1 {
                self.history.push(self.runner.proximity());
            }
        }
        self.proximity_at(cycle)
            .ok_or_else(|| EvolutionError::MissingSample {
                name: self.name.clone(),
                cycle,
            })
    }

    fn proximity_at(&self, cycle: u32) -> Option<f32> {
        (cycle as usize)
            .checked_sub(1)
            .and_then(|index| self.history.get(index).copied())
    }

    /// Start over from the leader, keeping name and genome.
    fn restart(&mut self, leader: &Leader<E::Snapshot>) {
        let genome = self.runner.genome().clone();
        self.reborn(self.name.clone(), leader, genome);
    }

    fn reborn(&mut self, name: String, leader: &Leader<E::Snapshot>, genome: Genome) {
        self.runner.reset(leader, genome);
        self.name = name;
        self.history.clear();
        self.reached_target = false;
    }

    fn snapshot(&self, cycle: u32) -> EvolverSnapshot {
        EvolverSnapshot {
            name: self.name.clone(),
            proximity: self
                .proximity_at(cycle)
                .unwrap_or_else(|| self.runner.proximity()),
            tosses: self.runner.genome().tosses(),
            reached_target: self.reached_target,
            persisted: self.persisted,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn history(&self) -> &[f32] {
        &self.history
    }

    pub fn reached_target(&self) -> bool {
        self.reached_target
    }

    pub fn persisted(&self) -> bool {
        self.persisted
    }

    pub fn runner(&self) -> &Runner<E> {
        &self.runner
    }

    fn into_engine(self) -> E {
        self.runner.into_engine()
    }
}

fn by_proximity<E: Engine>(cycle: u32) -> impl Fn(&Evolver<E>, &Evolver<E>) -> Ordering {
    move |a: &Evolver<E>, b: &Evolver<E>| {
        let a = a.proximity_at(cycle).unwrap_or(f32::INFINITY);
        let b = b.proximity_at(cycle).unwrap_or(f32::INFINITY);
        a.total_cmp(&b)
    }
}

/// Sort evolvers closest first by their proximity at a completed cycle.
///
/// Evolvers that stopped one cycle short record their current proximity
/// first. Equal proximities keep their order.
pub fn rank_evolvers<E: Engine>(
    evolvers: &mut [Evolver<E>],
    cycle: u32,
) -> Result<(), EvolutionError> {
    for evolver in evolvers.iter_mut() {
        evolver.sample(cycle)?;
    }
    let compare = by_proximity(cycle);
    evolvers.sort_by(|a, b| compare(a, b));
    Ok(())
}

/// Split ranked evolvers into the first `persistent` and the rest.
pub fn split_evolvers<T>(mut ranked: Vec<T>, persistent: usize) -> (Vec<T>, Vec<T>) {
    let losers = ranked.split_off(persistent.min(ranked.len()));
    (ranked, losers)
}

/// Evolves gaits for one leader across a schedule of cycle counts.
pub struct Population<E: Engine, S: GenomeStore> {
    config: EvolutionConfig,
    leader: Leader<E::Snapshot>,
    target: Point3<f32>,
    location: String,
    store: S,
    rng: GenomeRng,
    phase: EvolutionPhase,
    tier: usize,
    /// Highest cycle count ranked during the current challenger run.
    frontier: u32,
    winners: Vec<Evolver<E>>,
    challengers: Vec<Evolver<E>>,
    snapshot_tx: watch::Sender<Vec<EvolutionSnapshot>>,
    births: usize,
}

impl<E: Engine, S: GenomeStore> Population<E, S> {
    /// Build the first winners from the genomes stored for `location`,
    /// cycling through them if there are fewer than needed.
    pub fn new(
        config: EvolutionConfig,
        leader: Leader<E::Snapshot>,
        target: Point3<f32>,
        location: impl Into<String>,
        store: S,
        pool: &mut InstancePool<E>,
    ) -> Result<Self, EvolutionError> {
        config.validate()?;
        if leader.muscles.is_empty() {
            return Err(EvolutionError::Embryonic);
        }
        let location = location.into();
        let stored = store
            .load(&location)?
            .iter()
            .map(Genome::from_data)
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            "population for {} from {} stored genomes",
            location,
            stored.len()
        );

        let mut winners: Vec<Evolver<E>> = Vec::with_capacity(config.persistent_population);
        for index in 0..config.persistent_population {
            let engine = match pool.acquire() {
                Ok(engine) => engine,
                Err(error) => {
                    for evolver in winners {
                        pool.release(evolver.into_engine());
                    }
                    return Err(error.into());
                }
            };
            let genome = if stored.is_empty() {
                Genome::default()
            } else {
                stored[index % stored.len()].clone()
            };
            let runner = Runner::new(engine, &leader, genome, target, &config);
            winners.push(Evolver::new(
                format!("evolver-{}", index + 1),
                runner,
                !stored.is_empty(),
            ));
        }

        let (snapshot_tx, _) = watch::channel(Vec::new());
        Ok(Self {
            rng: GenomeRng::from_seed(config.random_seed),
            births: winners.len(),
            config,
            leader,
            target,
            location,
            store,
            phase: EvolutionPhase::WinnersRun,
            tier: 0,
            frontier: 0,
            winners,
            challengers: Vec::new(),
            snapshot_tx,
        })
    }

    /// Advance the phase machine by one tick.
    pub fn iterate(&mut self, pool: &mut InstancePool<E>) -> Result<EvolutionPhase, EvolutionError> {
        let max_cycles = self.max_cycles();
        let radius = self.config.target_radius;
        match self.phase {
            EvolutionPhase::WinnersRun => {
                let mut advanced = false;
                for winner in &mut self.winners {
                    advanced |= winner.iterate(max_cycles, radius);
                }
                if !advanced {
                    self.phase = if self.winners.iter().all(|winner| winner.reached_target) {
                        EvolutionPhase::EvolutionDone
                    } else if self.challengers.is_empty() {
                        EvolutionPhase::ChallengersBorn
                    } else {
                        EvolutionPhase::ChallengersReborn
                    };
                }
            }
            EvolutionPhase::ChallengersBorn => {
                self.spawn_challengers(pool)?;
                self.frontier = 0;
                self.phase = EvolutionPhase::ChallengersRun;
            }
            EvolutionPhase::ChallengersReborn => {
                self.rebirth_challengers();
                self.frontier = 0;
                self.phase = EvolutionPhase::ChallengersRun;
            }
            EvolutionPhase::ChallengersRun => {
                let mut advanced = false;
                for challenger in &mut self.challengers {
                    advanced |= challenger.iterate(max_cycles, radius);
                }
                let frontier = self
                    .challengers
                    .iter()
                    .map(|challenger| {
                        if challenger.reached_target {
                            max_cycles
                        } else {
                            challenger.runner.completed_cycles()
                        }
                    })
                    .min()
                    .unwrap_or(max_cycles);
                while self.frontier < frontier {
                    self.frontier += 1;
                    self.broadcast_ranking(self.frontier)?;
                }
                if !advanced {
                    self.phase = EvolutionPhase::WinnersStored;
                }
            }
            EvolutionPhase::WinnersStored => {
                self.store_winners(max_cycles)?;
                self.phase = EvolutionPhase::EvolutionAdvance;
            }
            EvolutionPhase::EvolutionAdvance => {
                self.phase = self.advance();
            }
            EvolutionPhase::EvolutionDone | EvolutionPhase::EvolutionHarder => {}
        }
        Ok(self.phase)
    }

    /// Spawn challengers from mutated winners until there are enough. On
    /// pool exhaustion the challengers spawned so far are kept.
    fn spawn_challengers(&mut self, pool: &mut InstancePool<E>) -> Result<(), EvolutionError> {
        while self.challengers.len() < self.config.challenger_population {
            let engine = pool.acquire()?;
            let parent = &self.winners[self.challengers.len() % self.winners.len()];
            let genome = parent.runner.genome().with_mutations(
                parent.runner.direction(),
                self.config.mutation_count,
                &mut self.rng,
            );
            self.births += 1;
            let runner = Runner::new(engine, &self.leader, genome, self.target, &self.config);
            self.challengers.push(Evolver::new(
                format!("evolver-{}", self.births),
                runner,
                false,
            ));
        }
        info!("{} challengers born", self.challengers.len());
        Ok(())
    }

    /// Reuse every challenger's engine for a mutated winner's genome.
    fn rebirth_challengers(&mut self) {
        let parents = self.winners.len();
        for (index, challenger) in self.challengers.iter_mut().enumerate() {
            let parent = &self.winners[index % parents];
            let genome = parent.runner.genome().with_mutations(
                parent.runner.direction(),
                self.config.mutation_count,
                &mut self.rng,
            );
            self.births += 1;
            challenger.reborn(format!("evolver-{}", self.births), &self.leader, genome);
            challenger.persisted = false;
        }
        debug!("{} challengers reborn", self.challengers.len());
    }

    /// Rank winners and challengers together without changing their roles.
    fn broadcast_ranking(&mut self, cycle: u32) -> Result<(), EvolutionError> {
        for evolver in self.winners.iter_mut().chain(self.challengers.iter_mut()) {
            evolver.sample(cycle)?;
        }
        let compare = by_proximity(cycle);
        let mut ranked: Vec<&Evolver<E>> = self.winners.iter().chain(&self.challengers).collect();
        ranked.sort_by(|a, b| compare(*a, *b));
        let snapshot = self.snapshot(cycle, ranked.into_iter());
        self.publish(snapshot);
        Ok(())
    }

    /// Keep the best as winners and persist their genomes.
    fn store_winners(&mut self, cycle: u32) -> Result<(), EvolutionError> {
        for evolver in self.winners.iter_mut().chain(self.challengers.iter_mut()) {
            evolver.sample(cycle)?;
        }
        let mut evolvers = std::mem::take(&mut self.winners);
        evolvers.append(&mut self.challengers);
        rank_evolvers(&mut evolvers, cycle)?;
        let (mut winners, mut losers) =
            split_evolvers(evolvers, self.config.persistent_population);
        for winner in &mut winners {
            winner.persisted = true;
        }
        for loser in &mut losers {
            loser.persisted = false;
        }
        self.winners = winners;
        self.challengers = losers;

        let snapshot = self.snapshot(cycle, self.winners.iter().chain(&self.challengers));
        self.publish(snapshot);
        let genomes: Vec<GenomeData> = self
            .winners
            .iter()
            .map(|winner| winner.runner.genome().to_data())
            .collect();
        self.store.store(&self.location, &genomes)?;
        info!(
            "tier {} ({} cycles): stored {} winners, best {}",
            self.tier,
            cycle,
            genomes.len(),
            self.winners.first().map_or("none", |winner| winner.name.as_str())
        );
        Ok(())
    }

    fn advance(&mut self) -> EvolutionPhase {
        if self.tier + 1 < self.config.cycle_pattern.len() {
            self.tier += 1;
            self.frontier = 0;
            for winner in &mut self.winners {
                winner.restart(&self.leader);
            }
            info!("advancing to {} cycles", self.max_cycles());
            EvolutionPhase::WinnersRun
        } else if self.winners.iter().all(|winner| winner.reached_target) {
            warn!("every winner reached the target, the schedule can be harder");
            EvolutionPhase::EvolutionHarder
        } else {
            EvolutionPhase::EvolutionDone
        }
    }

    fn snapshot<'a>(
        &self,
        cycle: u32,
        ranked: impl Iterator<Item = &'a Evolver<E>>,
    ) -> EvolutionSnapshot
    where
        E: 'a,
    {
        EvolutionSnapshot {
            cycle_pattern: self.config.cycle_pattern.clone(),
            tier: self.tier,
            cycle,
            evolvers: ranked.map(|evolver| evolver.snapshot(cycle)).collect(),
        }
    }

    /// Record a snapshot. Each tier keeps its latest snapshot; a snapshot
    /// for a tier seen before the most recent one starts the list over.
    fn publish(&self, snapshot: EvolutionSnapshot) {
        self.snapshot_tx.send_modify(|snapshots| {
            match snapshots.iter().position(|seen| seen.tier == snapshot.tier) {
                Some(index) if index + 1 == snapshots.len() => snapshots[index] = snapshot,
                Some(_) => {
                    snapshots.clear();
                    snapshots.push(snapshot);
                }
                None => snapshots.push(snapshot),
            }
        });
    }

    /// Return every runner's engine to the pool.
    pub fn release(self, pool: &mut InstancePool<E>) {
        for evolver in self.winners.into_iter().chain(self.challengers) {
            pool.release(evolver.into_engine());
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<EvolutionSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn phase(&self) -> EvolutionPhase {
        self.phase
    }

    pub fn tier(&self) -> usize {
        self.tier
    }

    /// Cycle count of the current tier.
    pub fn max_cycles(&self) -> u32 {
        self.config.cycle_pattern[self.tier]
    }

    pub fn winners(&self) -> &[Evolver<E>] {
        &self.winners
    }

    pub fn challengers(&self) -> &[Evolver<E>] {
        &self.challengers
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{Muscle, ScalarEngine, Stage};
    use crate::compute::evolution::MemoryGenomeStore;
    use crate::schema::{Direction, GeneData, PhysicsConfig};
    use proptest::prelude::*;

    fn leader() -> Leader<<ScalarEngine as Engine>::Snapshot> {
        let mut engine = ScalarEngine::new(PhysicsConfig::default());
        let a = engine.create_joint(Point3::new(0.0, 0.0, 0.0));
        let b = engine.create_joint(Point3::new(1.0, 0.0, 0.0));
        engine.create_interval(a, b, false, 1.0, 1.0, 0);
        engine.set_stage(Stage::Pretenst);
        Leader {
            snapshot: engine.snapshot(),
            muscles: vec![Muscle {
                interval: 0,
                rest: 1.0,
            }],
            midpoint: Point3::new(0.5, 0.0, 0.0),
        }
    }

    fn config() -> EvolutionConfig {
        EvolutionConfig {
            cycle_pattern: vec![5, 6, 7],
            persistent_population: 2,
            challenger_population: 2,
            ticks_per_cycle: 12,
            twitch_countdown: 2,
            max_instances: 4,
            random_seed: Some(3),
            ..Default::default()
        }
    }

    fn pool(capacity: usize) -> InstancePool<ScalarEngine> {
        InstancePool::new(capacity, || ScalarEngine::new(PhysicsConfig::default()))
    }

    fn population(
        pool: &mut InstancePool<ScalarEngine>,
        store: MemoryGenomeStore,
    ) -> Population<ScalarEngine, MemoryGenomeStore> {
        Population::new(
            config(),
            leader(),
            Point3::new(100.0, 0.0, 0.0),
            "column",
            store,
            pool,
        )
        .unwrap()
    }

    fn evolver(name: &str, history: Vec<f32>) -> Evolver<ScalarEngine> {
        let runner = Runner::new(
            ScalarEngine::new(PhysicsConfig::default()),
            &leader(),
            Genome::default(),
            Point3::new(100.0, 0.0, 0.0),
            &config(),
        );
        let mut evolver = Evolver::new(name.to_string(), runner, false);
        evolver.history = history;
        evolver
    }

    fn names(evolvers: &[Evolver<ScalarEngine>]) -> Vec<&str> {
        evolvers.iter().map(Evolver::name).collect()
    }

    #[test]
    fn test_ranking_reads_the_requested_cycle() {
        for flipped in [false, true] {
            let mut evolvers = vec![
                evolver("steady", vec![5.0, 3.0, 1.0]),
                evolver("slow", vec![5.0, 4.0, 1.0]),
            ];
            if flipped {
                evolvers.reverse();
            }
            rank_evolvers(&mut evolvers, 2).unwrap();
            assert_eq!(names(&evolvers), vec!["steady", "slow"]);
        }
    }

    #[test]
    fn test_ranking_ties_keep_order() {
        let mut evolvers = vec![
            evolver("first", vec![2.0]),
            evolver("second", vec![2.0]),
            evolver("best", vec![1.0]),
        ];
        rank_evolvers(&mut evolvers, 1).unwrap();
        assert_eq!(names(&evolvers), vec!["best", "first", "second"]);
    }

    #[test]
    fn test_stalled_evolver_is_sampled() {
        let mut evolvers = vec![evolver("stalled", vec![7.0]), evolver("far", vec![9.0, 8.0])];
        rank_evolvers(&mut evolvers, 2).unwrap();
        assert_eq!(names(&evolvers), vec!["far", "stalled"]);
        assert_eq!(evolvers[1].history().len(), 2);
        assert!((evolvers[1].history()[1] - 99.5).abs() < 1e-3);
    }

    #[test]
    fn test_missing_sample_is_an_error() {
        let mut evolvers = vec![evolver("ok", vec![1.0, 2.0, 3.0]), evolver("behind", vec![1.0])];
        assert!(matches!(
            rank_evolvers(&mut evolvers, 3),
            Err(EvolutionError::MissingSample { cycle: 3, .. })
        ));
        let mut lone = evolver("empty", Vec::new());
        assert!(matches!(
            lone.sample(0),
            Err(EvolutionError::MissingSample { cycle: 0, .. })
        ));
    }

    proptest! {
        #[test]
        fn property_split_sizes(total in 0usize..40, persistent in 0usize..20) {
            let evolvers: Vec<usize> = (0..total).collect();
            let (winners, losers) = split_evolvers(evolvers, persistent);
            prop_assert_eq!(winners.len(), persistent.min(total));
            prop_assert_eq!(winners.len() + losers.len(), total);
            prop_assert!(winners.iter().chain(&losers).enumerate().all(|(i, &e)| i == e));
        }
    }

    #[test]
    fn test_first_generation() {
        let mut pool = pool(4);
        let mut population = population(&mut pool, MemoryGenomeStore::new());
        let receiver = population.subscribe();
        let mut ticks = 0;
        while population.phase() != EvolutionPhase::EvolutionAdvance {
            population.iterate(&mut pool).unwrap();
            ticks += 1;
            assert!(ticks < 1000);
        }
        assert_eq!(population.winners().len(), 2);
        assert_eq!(population.challengers().len(), 2);
        assert!(population.winners().iter().all(Evolver::persisted));
        assert_eq!(population.store().writes(), 1);
        assert_eq!(population.store().get("column").map(<[GenomeData]>::len), Some(2));
        assert_eq!(pool.outstanding(), 4);

        let snapshots = receiver.borrow().clone();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].tier, 0);
        assert_eq!(snapshots[0].cycle, 5);
        assert_eq!(snapshots[0].evolvers.len(), 4);
    }

    #[test]
    fn test_schedule_runs_to_done() {
        let mut pool = pool(4);
        let mut population = population(&mut pool, MemoryGenomeStore::new());
        let receiver = population.subscribe();
        let mut ticks = 0;
        while !population.phase().is_terminal() {
            population.iterate(&mut pool).unwrap();
            ticks += 1;
            assert!(ticks < 5000);
        }
        assert_eq!(population.phase(), EvolutionPhase::EvolutionDone);
        assert_eq!(population.tier(), 2);
        assert_eq!(population.store().writes(), 3);
        let tiers: Vec<usize> = receiver.borrow().iter().map(|s| s.tier).collect();
        assert_eq!(tiers, vec![0, 1, 2]);

        population.release(&mut pool);
        assert_eq!(pool.outstanding(), 0);
    }

    fn ranking(tier: usize, cycle: u32) -> EvolutionSnapshot {
        EvolutionSnapshot {
            cycle_pattern: config().cycle_pattern,
            tier,
            cycle,
            evolvers: Vec::new(),
        }
    }

    #[test]
    fn test_snapshots_keep_latest_per_tier() {
        let mut pool = pool(4);
        let population = population(&mut pool, MemoryGenomeStore::new());
        let receiver = population.subscribe();
        let tiers = |receiver: &watch::Receiver<Vec<EvolutionSnapshot>>| {
            receiver
                .borrow()
                .iter()
                .map(|snapshot| (snapshot.tier, snapshot.cycle))
                .collect::<Vec<_>>()
        };

        population.publish(ranking(0, 1));
        population.publish(ranking(0, 2));
        assert_eq!(tiers(&receiver), vec![(0, 2)]);

        population.publish(ranking(1, 1));
        population.publish(ranking(1, 3));
        assert_eq!(tiers(&receiver), vec![(0, 2), (1, 3)]);

        population.publish(ranking(0, 4));
        assert_eq!(tiers(&receiver), vec![(0, 4)]);
        population.release(&mut pool);
    }

    #[test]
    fn test_last_tier_with_every_winner_home_is_harder() {
        for home in [true, false] {
            let mut pool = pool(4);
            let mut population = population(&mut pool, MemoryGenomeStore::new());
            population.phase = EvolutionPhase::EvolutionAdvance;
            population.tier = 2;
            for winner in &mut population.winners {
                winner.reached_target = home;
            }
            let expected = if home {
                EvolutionPhase::EvolutionHarder
            } else {
                EvolutionPhase::EvolutionDone
            };
            assert_eq!(population.iterate(&mut pool).unwrap(), expected);
        }
    }

    #[test]
    fn test_advance_restarts_winners() {
        let mut pool = pool(4);
        let mut population = population(&mut pool, MemoryGenomeStore::new());
        population.phase = EvolutionPhase::EvolutionAdvance;
        population.winners[0].history = vec![1.0];
        population.winners[0].reached_target = true;
        assert_eq!(
            population.iterate(&mut pool).unwrap(),
            EvolutionPhase::WinnersRun
        );
        assert_eq!(population.tier(), 1);
        assert_eq!(population.max_cycles(), 6);
        assert!(population.winners()[0].history().is_empty());
        assert!(!population.winners()[0].reached_target());
    }

    #[test]
    fn test_exhausted_pool_retries_birth() {
        let mut pool = pool(4);
        let mut population = population(&mut pool, MemoryGenomeStore::new());
        let hog = pool.acquire().unwrap();
        while population.phase() == EvolutionPhase::WinnersRun {
            population.iterate(&mut pool).unwrap();
        }
        assert_eq!(population.phase(), EvolutionPhase::ChallengersBorn);
        assert!(matches!(
            population.iterate(&mut pool),
            Err(EvolutionError::Pool(PoolError::Exhausted { capacity: 4 }))
        ));
        assert_eq!(population.phase(), EvolutionPhase::ChallengersBorn);
        assert_eq!(population.challengers().len(), 1);

        pool.release(hog);
        assert_eq!(
            population.iterate(&mut pool).unwrap(),
            EvolutionPhase::ChallengersRun
        );
        assert_eq!(population.challengers().len(), 2);
    }

    #[test]
    fn test_failed_construction_releases_engines() {
        let mut pool = pool(1);
        let result = Population::new(
            config(),
            leader(),
            Point3::new(100.0, 0.0, 0.0),
            "column",
            MemoryGenomeStore::new(),
            &mut pool,
        );
        assert!(matches!(result, Err(EvolutionError::Pool(_))));
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_embryonic_leader_rejected() {
        let mut pool = pool(4);
        let leader = Leader {
            muscles: Vec::new(),
            ..leader()
        };
        let result = Population::new(
            config(),
            leader,
            Point3::new(100.0, 0.0, 0.0),
            "column",
            MemoryGenomeStore::new(),
            &mut pool,
        );
        assert!(matches!(result, Err(EvolutionError::Embryonic)));
    }

    #[test]
    fn test_stored_genomes_are_cycled() {
        let stored = GenomeData {
            tosses: 4,
            genes: vec![GeneData {
                direction: Direction::Forward,
                dice: vec![1, 2, 3, 4],
            }],
        };
        let store = MemoryGenomeStore::new().with_location("column", vec![stored.clone()]);
        let mut pool = pool(4);
        let population = population(&mut pool, store);
        for winner in population.winners() {
            assert_eq!(winner.runner().genome().to_data(), stored);
            assert!(winner.persisted());
        }
    }

    #[test]
    fn test_challengers_are_mutated_winners() {
        let mut pool = pool(4);
        let mut population = population(&mut pool, MemoryGenomeStore::new());
        while population.phase() != EvolutionPhase::ChallengersRun {
            population.iterate(&mut pool).unwrap();
        }
        for challenger in population.challengers() {
            assert_eq!(challenger.runner().genome().tosses(), 3);
            assert!(!challenger.runner().genome().dice(Direction::Forward).is_empty());
        }
    }
}
