//! Gait evolution for settled tensegrities.
//!
//! The evolution system consists of:
//!
//! - **Genomes** (`genome`): dice genes per direction, decoded into twitches
//! - **Runners** (`runner`): one engine driven by one genome
//! - **Population** (`population`): the winners/challengers phase machine
//! - **Genome stores** (`store`): durable storage of winning genomes
//!
//! # Example
//!
//! ```rust,no_run
//! use cgmath::Point3;
//! use pretenst::compute::evolution::{MemoryGenomeStore, Population};
//! use pretenst::compute::{InstancePool, ScalarEngine, Tensegrity};
//! use pretenst::schema::{EvolutionConfig, Experiment, PhysicsConfig};
//!
//! let experiment = Experiment::default();
//! let engine = ScalarEngine::new(PhysicsConfig::default());
//! let tensegrity = Tensegrity::from_experiment(engine, &experiment).unwrap();
//! // ... iterate until the tensegrity is pretenst ...
//! let leader = tensegrity.leader().unwrap();
//!
//! let config = EvolutionConfig::default();
//! let mut pool = InstancePool::new(config.max_instances, || {
//!     ScalarEngine::new(PhysicsConfig::default())
//! });
//! let mut population = Population::new(
//!     config,
//!     leader,
//!     Point3::new(10.0, 0.0, 0.0),
//!     "column",
//!     MemoryGenomeStore::new(),
//!     &mut pool,
//! )
//! .unwrap();
//! while !population.iterate(&mut pool).unwrap().is_terminal() {}
//! population.release(&mut pool);
//! ```

mod genome;
mod population;
mod runner;
mod store;

pub use genome::{Genome, GenomeError, GenomeRng, Twitch};
pub use population::{EvolutionError, Evolver, Population, rank_evolvers, split_evolvers};
pub use runner::Runner;
pub use store::{DirectoryGenomeStore, GenomeStore, MemoryGenomeStore, StoreError};
