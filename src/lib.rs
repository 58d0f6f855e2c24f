//! Pretenst - growing tensegrity structures and evolving their gaits.
//!
//! A tenscript program describes a tree of brick chains. This crate grows
//! it brick by brick on a physics engine, joins and spaces marked faces,
//! and carries the result through slack to a pretensed, standing
//! structure. A settled structure can then be handed to a population that
//! evolves muscle twitch patterns walking it towards a target.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration types, tenscript programs and evolution data
//! - `compute`: Engine seam, fabric, growth, stage machine and evolution
//!
//! # Example
//!
//! ```rust,no_run
//! use pretenst::{
//!     schema::{FaceName, MarkAction, PhysicsConfig, Tenscript, TenscriptNode},
//!     compute::{ScalarEngine, Stage, Tensegrity},
//! };
//!
//! // Two columns from the seed, their tips pulled together
//! let tree = TenscriptNode::new(0)
//!     .branch(FaceName::A, TenscriptNode::new(3).mark(FaceName::A, 1))
//!     .branch(FaceName::B, TenscriptNode::new(3).mark(FaceName::A, 1));
//! let tenscript = Tenscript::new("arch", tree).with_mark(1, MarkAction::Join);
//!
//! let engine = ScalarEngine::new(PhysicsConfig::default());
//! let mut tensegrity =
//!     Tensegrity::new(engine, tenscript, Default::default(), Default::default()).unwrap();
//!
//! while tensegrity.stage() != Stage::Pretenst {
//!     match tensegrity.iterate().unwrap() {
//!         Stage::Shaping => tensegrity.request_stage(Stage::Slack).unwrap(),
//!         Stage::Slack => tensegrity.request_stage(Stage::Pretensing).unwrap(),
//!         _ => {}
//!     }
//! }
//! println!("{:?}", tensegrity.fabric().stats());
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{Engine, Fabric, ScalarEngine, Stage, Tensegrity};
pub use schema::{Experiment, Tenscript, TenscriptNode};
