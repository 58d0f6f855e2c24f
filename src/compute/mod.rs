//! Compute module - growth and evolution of tensegrity structures.

mod arena;
mod brick;
mod engine;
mod fabric;
mod growth;
mod pool;
mod scalar;
mod tensegrity;
mod vulcanize;

pub mod evolution;

pub use brick::*;
pub use engine::*;
pub use fabric::*;
pub use growth::*;
pub use pool::*;
pub use scalar::*;
pub use tensegrity::*;
pub use vulcanize::*;
