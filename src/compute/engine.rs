//! The physics engine seam.
//!
//! Growth and evolution never integrate anything themselves. They drive an
//! [`Engine`], which owns positional arrays of joints, intervals and faces
//! and relaxes them one tick at a time. Removal from any array is a swap
//! remove: the last element moves into the vacated index.

use cgmath::{Matrix4, Point3};
use serde::{Deserialize, Serialize};

/// Construction stage of a tensegrity.
///
/// Stages are ordered. `Busy` is transient: it reports that the engine is
/// still settling length changes and never stands for a stage of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Busy,
    Growing,
    Shaping,
    Slack,
    Pretensing,
    Pretenst,
}

impl Stage {
    /// The stage that follows this one, if any.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Busy => None,
            Stage::Growing => Some(Stage::Shaping),
            Stage::Shaping => Some(Stage::Slack),
            Stage::Slack => Some(Stage::Pretensing),
            Stage::Pretensing => Some(Stage::Pretenst),
            Stage::Pretenst => None,
        }
    }
}

/// Capabilities of a numeric physics engine.
pub trait Engine {
    /// Complete physical state, used for checkpoints and for cloning runners.
    type Snapshot: Clone;

    /// Add a joint and return its index.
    fn create_joint(&mut self, location: Point3<f32>) -> usize;

    /// Remove a joint. The last joint takes its index and every interval and
    /// face referring to that joint is re-pointed.
    fn remove_joint(&mut self, index: usize);

    /// Add an interval whose rest length moves from `current_length` to
    /// `target_length` over `countdown` ticks. Returns its index.
    fn create_interval(
        &mut self,
        alpha: usize,
        omega: usize,
        push: bool,
        current_length: f32,
        target_length: f32,
        countdown: u32,
    ) -> usize;

    /// Remove an interval. The last interval takes its index.
    fn remove_interval(&mut self, index: usize);

    /// Start moving an interval's rest length towards a new target.
    fn set_interval_target(&mut self, index: usize, target_length: f32, countdown: u32);

    /// Add a triangular face and return its index.
    fn create_face(&mut self, joint0: usize, joint1: usize, joint2: usize) -> usize;

    /// Remove a face. The last face takes its index.
    fn remove_face(&mut self, index: usize);

    /// Advance one tick. Returns `Stage::Busy` while length changes are
    /// still counting down, otherwise the current stage.
    fn iterate(&mut self) -> Stage;

    /// Current stage.
    fn stage(&self) -> Stage;

    /// Enter a new stage.
    fn set_stage(&mut self, stage: Stage);

    /// Capture the complete physical state.
    fn snapshot(&self) -> Self::Snapshot;

    /// Replace the complete physical state.
    fn restore(&mut self, snapshot: &Self::Snapshot);

    fn joint_count(&self) -> usize;
    fn interval_count(&self) -> usize;
    fn face_count(&self) -> usize;

    /// Location of one joint.
    fn joint_location(&self, index: usize) -> Point3<f32>;

    /// Locations of every joint, in index order.
    fn joint_locations(&self) -> Vec<Point3<f32>>;

    /// Current length of one interval.
    fn interval_length(&self, index: usize) -> f32;

    /// Strain of every interval, in index order.
    fn interval_strains(&self) -> Vec<f32>;

    /// Spring constant of every interval, in index order.
    fn stiffnesses(&self) -> Vec<f32>;

    /// Apply a rigid transformation to every joint.
    fn transform_joints(&mut self, matrix: &Matrix4<f32>);
}

/// Ticks an interval needs to change its rest length from `current` to `target`.
pub fn countdown(budget: f32, current: f32, target: f32) -> u32 {
    (budget * (target - current).abs()).round() as u32
}
