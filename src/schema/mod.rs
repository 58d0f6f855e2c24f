//! Schema module - Configuration, growth programs and evolution data types.

mod config;
mod evolution;
mod tenscript;

pub use config::*;
pub use evolution::*;
pub use tenscript::*;
