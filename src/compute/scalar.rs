//! Scalar CPU implementation of the physics engine.
//!
//! Joints have unit mass. Every interval is a linear spring pulling its ends
//! towards its rest length; pulls go slack when shorter than rest. The
//! integrator is semi-implicit Euler with one tick as the time step.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Transform, Vector3};

use super::engine::{Engine, Stage};
use crate::schema::PhysicsConfig;

/// Shortest rest length used when computing strain.
const MIN_REST: f32 = 1e-3;
/// Intervals shorter than this exert no force.
const MIN_LENGTH: f32 = 1e-6;

#[derive(Debug, Clone)]
struct JointState {
    location: Point3<f32>,
    velocity: Vector3<f32>,
}

#[derive(Debug, Clone)]
struct IntervalState {
    alpha: usize,
    omega: usize,
    push: bool,
    rest: f32,
    target: f32,
    countdown: u32,
}

impl IntervalState {
    /// Move the rest length one tick closer to its target.
    fn approach(&mut self) {
        if self.countdown == 0 {
            return;
        }
        self.rest += (self.target - self.rest) / self.countdown as f32;
        self.countdown -= 1;
        if self.countdown == 0 {
            self.rest = self.target;
        }
    }
}

/// Complete state of a [`ScalarEngine`].
#[derive(Debug, Clone)]
pub struct ScalarSnapshot {
    joints: Vec<JointState>,
    intervals: Vec<IntervalState>,
    faces: Vec<[usize; 3]>,
    stage: Stage,
    age: u64,
}

/// Pure scalar spring integrator.
#[derive(Debug, Clone)]
pub struct ScalarEngine {
    config: PhysicsConfig,
    joints: Vec<JointState>,
    intervals: Vec<IntervalState>,
    faces: Vec<[usize; 3]>,
    stage: Stage,
    age: u64,
}

impl ScalarEngine {
    /// Create an empty engine in the `Growing` stage.
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            config,
            joints: Vec::new(),
            intervals: Vec::new(),
            faces: Vec::new(),
            stage: Stage::Growing,
            age: 0,
        }
    }

    /// Ticks iterated so far.
    pub fn age(&self) -> u64 {
        self.age
    }

    /// Physics parameters.
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    fn length(&self, interval: &IntervalState) -> f32 {
        let alpha = self.joints[interval.alpha].location;
        let omega = self.joints[interval.omega].location;
        (omega - alpha).magnitude()
    }

    fn stiffness(&self, interval: &IntervalState) -> f32 {
        if interval.push {
            self.config.stiffness * self.config.push_over_pull
        } else {
            self.config.stiffness
        }
    }

    fn is_counting_down(&self) -> bool {
        self.intervals.iter().any(|interval| interval.countdown > 0)
    }

    fn apply_forces(&self) -> Vec<Vector3<f32>> {
        let mut forces = vec![Vector3::new(0.0, 0.0, 0.0); self.joints.len()];
        for interval in &self.intervals {
            let span = self.joints[interval.omega].location - self.joints[interval.alpha].location;
            let length = span.magnitude();
            if length < MIN_LENGTH {
                continue;
            }
            let extension = length - interval.rest;
            if !interval.push && extension < 0.0 {
                continue;
            }
            let force = span / length * (extension * self.stiffness(interval));
            forces[interval.alpha] += force;
            forces[interval.omega] -= force;
        }
        forces
    }

    fn integrate(&mut self, forces: Vec<Vector3<f32>>) {
        let grounded = self.stage >= Stage::Pretensing;
        let drag = 1.0 - self.config.drag;
        let friction = 1.0 - self.config.floor_friction;
        for (joint, force) in self.joints.iter_mut().zip(forces) {
            joint.velocity = (joint.velocity + force) * drag;
            if grounded {
                joint.velocity.y -= self.config.gravity;
            }
            joint.location += joint.velocity;
            if grounded && joint.location.y < 0.0 {
                joint.location.y = 0.0;
                joint.velocity.y = joint.velocity.y.max(0.0);
                joint.velocity.x *= friction;
                joint.velocity.z *= friction;
            }
        }
    }
}

impl Engine for ScalarEngine {
    type Snapshot = ScalarSnapshot;

    fn create_joint(&mut self, location: Point3<f32>) -> usize {
        self.joints.push(JointState {
            location,
            velocity: Vector3::new(0.0, 0.0, 0.0),
        });
        self.joints.len() - 1
    }

    fn remove_joint(&mut self, index: usize) {
        let last = self.joints.len() - 1;
        self.joints.swap_remove(index);
        if index == last {
            return;
        }
        for interval in &mut self.intervals {
            if interval.alpha == last {
                interval.alpha = index;
            }
            if interval.omega == last {
                interval.omega = index;
            }
        }
        for face in &mut self.faces {
            for joint in face.iter_mut() {
                if *joint == last {
                    *joint = index;
                }
            }
        }
    }

    fn create_interval(
        &mut self,
        alpha: usize,
        omega: usize,
        push: bool,
        current_length: f32,
        target_length: f32,
        countdown: u32,
    ) -> usize {
        let rest = if countdown == 0 {
            target_length
        } else {
            current_length
        };
        self.intervals.push(IntervalState {
            alpha,
            omega,
            push,
            rest,
            target: target_length,
            countdown,
        });
        self.intervals.len() - 1
    }

    fn remove_interval(&mut self, index: usize) {
        self.intervals.swap_remove(index);
    }

    fn set_interval_target(&mut self, index: usize, target_length: f32, countdown: u32) {
        let interval = &mut self.intervals[index];
        interval.target = target_length;
        interval.countdown = countdown;
        if countdown == 0 {
            interval.rest = target_length;
        }
    }

    fn create_face(&mut self, joint0: usize, joint1: usize, joint2: usize) -> usize {
        self.faces.push([joint0, joint1, joint2]);
        self.faces.len() - 1
    }

    fn remove_face(&mut self, index: usize) {
        self.faces.swap_remove(index);
    }

    fn iterate(&mut self) -> Stage {
        self.age += 1;
        for interval in &mut self.intervals {
            interval.approach();
        }
        let forces = self.apply_forces();
        self.integrate(forces);
        if self.is_counting_down() {
            return Stage::Busy;
        }
        if self.stage == Stage::Pretensing {
            self.stage = Stage::Pretenst;
        }
        self.stage
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn set_stage(&mut self, stage: Stage) {
        match stage {
            Stage::Slack => {
                for index in 0..self.intervals.len() {
                    let length = self.length(&self.intervals[index]);
                    let interval = &mut self.intervals[index];
                    interval.rest = length;
                    interval.target = length;
                    interval.countdown = 0;
                }
                for joint in &mut self.joints {
                    joint.velocity = Vector3::new(0.0, 0.0, 0.0);
                }
            }
            Stage::Pretensing => {
                let factor = 1.0 + self.config.pretenst_factor;
                let countdown = self.config.pretenst_countdown;
                for interval in self.intervals.iter_mut().filter(|i| i.push) {
                    interval.target = interval.rest * factor;
                    interval.countdown = countdown;
                }
            }
            _ => {}
        }
        self.stage = stage;
    }

    fn snapshot(&self) -> ScalarSnapshot {
        ScalarSnapshot {
            joints: self.joints.clone(),
            intervals: self.intervals.clone(),
            faces: self.faces.clone(),
            stage: self.stage,
            age: self.age,
        }
    }

    fn restore(&mut self, snapshot: &ScalarSnapshot) {
        self.joints = snapshot.joints.clone();
        self.intervals = snapshot.intervals.clone();
        self.faces = snapshot.faces.clone();
        self.stage = snapshot.stage;
        self.age = snapshot.age;
    }

    fn joint_count(&self) -> usize {
        self.joints.len()
    }

    fn interval_count(&self) -> usize {
        self.intervals.len()
    }

    fn face_count(&self) -> usize {
        self.faces.len()
    }

    fn joint_location(&self, index: usize) -> Point3<f32> {
        self.joints[index].location
    }

    fn joint_locations(&self) -> Vec<Point3<f32>> {
        self.joints.iter().map(|joint| joint.location).collect()
    }

    fn interval_length(&self, index: usize) -> f32 {
        self.length(&self.intervals[index])
    }

    fn interval_strains(&self) -> Vec<f32> {
        self.intervals
            .iter()
            .map(|interval| (self.length(interval) - interval.rest) / interval.rest.max(MIN_REST))
            .collect()
    }

    fn stiffnesses(&self) -> Vec<f32> {
        self.intervals
            .iter()
            .map(|interval| self.stiffness(interval))
            .collect()
    }

    fn transform_joints(&mut self, matrix: &Matrix4<f32>) {
        for joint in &mut self.joints {
            joint.location = matrix.transform_point(joint.location);
            joint.velocity = matrix.transform_vector(joint.velocity);
        }
    }
}

/// Midpoint of a set of locations.
pub fn midpoint(locations: &[Point3<f32>]) -> Point3<f32> {
    if locations.is_empty() {
        return Point3::origin();
    }
    let sum = locations
        .iter()
        .fold(Vector3::new(0.0, 0.0, 0.0), |sum, location| {
            sum + location.to_vec()
        });
    Point3::from_vec(sum / locations.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spring(rest: f32, countdown: u32) -> ScalarEngine {
        let mut engine = ScalarEngine::new(PhysicsConfig::default());
        let alpha = engine.create_joint(Point3::new(0.0, 0.0, 0.0));
        let omega = engine.create_joint(Point3::new(1.0, 0.0, 0.0));
        engine.create_interval(alpha, omega, true, 1.0, rest, countdown);
        engine
    }

    #[test]
    fn test_busy_while_counting_down() {
        let mut engine = spring(1.5, 3);
        assert_eq!(engine.iterate(), Stage::Busy);
        assert_eq!(engine.iterate(), Stage::Busy);
        assert_eq!(engine.iterate(), Stage::Growing);
    }

    #[test]
    fn test_push_relaxes_to_rest_length() {
        let mut engine = spring(1.5, 0);
        for _ in 0..2000 {
            engine.iterate();
        }
        assert!((engine.interval_length(0) - 1.5).abs() < 0.01);
    }

    #[test]
    fn test_slack_pull_exerts_nothing() {
        let mut engine = ScalarEngine::new(PhysicsConfig::default());
        let alpha = engine.create_joint(Point3::new(0.0, 0.0, 0.0));
        let omega = engine.create_joint(Point3::new(1.0, 0.0, 0.0));
        engine.create_interval(alpha, omega, false, 1.0, 2.0, 0);
        engine.iterate();
        assert_eq!(engine.joint_location(omega), Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_remove_joint_repoints_intervals() {
        let mut engine = ScalarEngine::new(PhysicsConfig::default());
        let a = engine.create_joint(Point3::new(0.0, 0.0, 0.0));
        let b = engine.create_joint(Point3::new(1.0, 0.0, 0.0));
        let c = engine.create_joint(Point3::new(0.0, 2.0, 0.0));
        engine.create_interval(a, c, false, 2.0, 2.0, 0);
        engine.remove_joint(b);
        assert_eq!(engine.joint_count(), 2);
        assert!((engine.interval_length(0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_pretensing_settles_to_pretenst() {
        let mut engine = spring(1.0, 0);
        engine.set_stage(Stage::Slack);
        engine.set_stage(Stage::Pretensing);
        let mut stage = Stage::Busy;
        for _ in 0..10_000 {
            stage = engine.iterate();
            if stage == Stage::Pretenst {
                break;
            }
        }
        assert_eq!(stage, Stage::Pretenst);
        assert!(engine.joint_locations().iter().all(|joint| joint.y >= 0.0));
    }

    #[test]
    fn test_snapshot_restore() {
        let mut engine = spring(1.2, 0);
        let snapshot = engine.snapshot();
        for _ in 0..100 {
            engine.iterate();
        }
        engine.restore(&snapshot);
        assert_eq!(engine.age(), 0);
        assert_eq!(engine.joint_location(1), Point3::new(1.0, 0.0, 0.0));
    }
}
