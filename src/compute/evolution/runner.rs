//! A settled tensegrity walking under genome control.

use cgmath::{InnerSpace, Point3, Vector2};

use crate::compute::{Engine, Leader, Muscle, midpoint};
use crate::schema::{Direction, EvolutionConfig};

use super::genome::{Genome, Twitch};

/// Drives one engine with the twitches of a genome.
///
/// Directions are read in the horizontal plane: `Forward` is `+x`, `Right`
/// is `+z`.
pub struct Runner<E: Engine> {
    engine: E,
    muscles: Vec<Muscle>,
    genome: Genome,
    direction: Direction,
    twitches: Vec<Twitch>,
    target: Point3<f32>,
    autopilot: bool,
    ticks_per_cycle: u64,
    contraction: f32,
    twitch_countdown: u32,
    age: u64,
}

impl<E: Engine> Runner<E> {
    /// Restore the leader into `engine` and start running `genome`.
    pub fn new(
        mut engine: E,
        leader: &Leader<E::Snapshot>,
        genome: Genome,
        target: Point3<f32>,
        config: &EvolutionConfig,
    ) -> Self {
        engine.restore(&leader.snapshot);
        let direction = Direction::Forward;
        let twitches = genome.twitches(direction, leader.muscles.len());
        Self {
            engine,
            muscles: leader.muscles.clone(),
            genome,
            direction,
            twitches,
            target,
            autopilot: config.autopilot,
            ticks_per_cycle: u64::from(config.ticks_per_cycle),
            contraction: config.muscle_contraction,
            twitch_countdown: config.twitch_countdown,
            age: 0,
        }
    }

    /// Start over from the leader with another genome.
    pub fn reset(&mut self, leader: &Leader<E::Snapshot>, genome: Genome) {
        self.engine.restore(&leader.snapshot);
        self.muscles = leader.muscles.clone();
        self.genome = genome;
        self.age = 0;
        self.set_direction(Direction::Forward);
    }

    /// Fire the twitches due this tick and advance the engine.
    pub fn iterate(&mut self) {
        let tick = self.age % self.ticks_per_cycle;
        if self.autopilot && tick == 0 {
            self.set_direction(self.choose_direction());
        }
        for twitch in &self.twitches {
            let muscle = self.muscles[twitch.muscle];
            if tick == self.cycle_tick(twitch.attack) {
                self.engine.set_interval_target(
                    muscle.interval,
                    muscle.rest * self.contraction,
                    self.twitch_countdown,
                );
            } else if tick == self.cycle_tick(twitch.decay) {
                self.engine
                    .set_interval_target(muscle.interval, muscle.rest, self.twitch_countdown);
            }
        }
        self.engine.iterate();
        self.age += 1;
    }

    fn cycle_tick(&self, fraction: f32) -> u64 {
        (fraction * self.ticks_per_cycle as f32) as u64 % self.ticks_per_cycle
    }

    /// Switch gene, relaxing every muscle.
    fn set_direction(&mut self, direction: Direction) {
        if direction != self.direction {
            for muscle in &self.muscles {
                self.engine
                    .set_interval_target(muscle.interval, muscle.rest, self.twitch_countdown);
            }
        }
        self.direction = direction;
        self.twitches = self.genome.twitches(direction, self.muscles.len());
    }

    /// The direction whose axis best matches the bearing of the target.
    fn choose_direction(&self) -> Direction {
        let bearing = self.to_target();
        if bearing.x.abs() >= bearing.y.abs() {
            if bearing.x >= 0.0 {
                Direction::Forward
            } else {
                Direction::Reverse
            }
        } else if bearing.y >= 0.0 {
            Direction::Right
        } else {
            Direction::Left
        }
    }

    /// Horizontal offset from the midpoint to the target, as `(x, z)`.
    fn to_target(&self) -> Vector2<f32> {
        let midpoint = self.midpoint();
        Vector2::new(self.target.x - midpoint.x, self.target.z - midpoint.z)
    }

    pub fn midpoint(&self) -> Point3<f32> {
        midpoint(&self.engine.joint_locations())
    }

    /// Horizontal distance from the midpoint to the target.
    pub fn proximity(&self) -> f32 {
        self.to_target().magnitude()
    }

    pub fn completed_cycles(&self) -> u32 {
        (self.age / self.ticks_per_cycle) as u32
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }
}
