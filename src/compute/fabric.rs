//! The structural graph of a tensegrity: joints, intervals and faces.
//!
//! A [`Fabric`] owns an [`Engine`] and mirrors its positional arrays with
//! generation-tagged keys. Every structural change goes through the fabric so
//! both sides stay in step.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

use super::arena::Mirror;
use super::engine::{Engine, countdown};
use crate::schema::{FabricConfig, FaceName};

slotmap::new_key_type! {
    /// Handle to a joint.
    pub struct JointKey;
    /// Handle to an interval.
    pub struct IntervalKey;
    /// Handle to a face.
    pub struct FaceKey;
}

/// Structural role of an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntervalRole {
    /// Compression strut.
    Push,
    /// Cable around the ring of a merged face pair.
    Ring,
    /// Cable from a ring joint to the far end of its neighbour's push.
    Cross,
    /// Cable bounding a brick face.
    Triangle,
    /// Ray from a face apex to one of the face's ends.
    Radial,
    /// Axis pulling two faces together until they merge.
    Connector,
    /// Strut axis holding two faces apart until the structure slackens.
    Distancer,
    /// Vulcanizing cable between tips sharing two or more neighbours.
    BowMid,
    /// Vulcanizing cable between tips sharing one neighbour.
    BowEnd,
}

impl IntervalRole {
    pub fn is_push(self) -> bool {
        self == IntervalRole::Push
    }

    /// Intervals the engine treats as struts, resisting compression.
    pub fn is_strut(self) -> bool {
        matches!(self, IntervalRole::Push | IntervalRole::Distancer)
    }

    /// Temporary intervals created for radial pulls.
    pub fn is_radial(self) -> bool {
        matches!(
            self,
            IntervalRole::Radial | IntervalRole::Connector | IntervalRole::Distancer
        )
    }
}

/// Handedness of a face's twist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Spin {
    Left,
    Right,
}

impl Spin {
    pub fn opposite(self) -> Spin {
        match self {
            Spin::Left => Spin::Right,
            Spin::Right => Spin::Left,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub alpha: JointKey,
    pub omega: JointKey,
    pub role: IntervalRole,
    /// Multiplier on the role's rest length.
    pub scale: f32,
}

impl Interval {
    /// Whether the interval touches a joint.
    pub fn touches(&self, joint: JointKey) -> bool {
        self.alpha == joint || self.omega == joint
    }

    /// The end that is not `joint`.
    pub fn other_end(&self, joint: JointKey) -> Option<JointKey> {
        if self.alpha == joint {
            Some(self.omega)
        } else if self.omega == joint {
            Some(self.alpha)
        } else {
            None
        }
    }
}

/// Joint at a face's centroid with a ray to each of its ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Apex {
    pub joint: JointKey,
    pub rays: [IntervalKey; 3],
    /// Radial pulls anchored here.
    pub uses: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// Counter-clockwise seen from outside the brick.
    pub ends: [JointKey; 3],
    pub pulls: [IntervalKey; 3],
    pub spin: Spin,
    pub scale: f32,
    pub name: FaceName,
    pub marks: Vec<u32>,
    pub apex: Option<Apex>,
}

/// Two faces tied by an axis between their apexes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialPull {
    pub alpha: FaceKey,
    pub omega: FaceKey,
    pub axis: IntervalKey,
    pub role: IntervalRole,
}

/// Summary of a fabric's size and proportions.
#[derive(Debug, Clone, Default)]
pub struct FabricStats {
    pub joint_count: usize,
    pub face_count: usize,
    pub max_height: f32,
    pub push_count: usize,
    pub push_range: (f32, f32),
    pub pull_count: usize,
    pub pull_range: (f32, f32),
}

/// Structural invariant violations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FabricError {
    #[error("Joint {0:?} does not exist")]
    MissingJoint(JointKey),
    #[error("Interval {0:?} does not exist")]
    MissingInterval(IntervalKey),
    #[error("Face {0:?} does not exist")]
    MissingFace(FaceKey),
    #[error("Face {0:?} has no apex joint")]
    MissingApex(FaceKey),
    #[error("Joint {0:?} is not the end of a push")]
    MissingPush(JointKey),
    #[error("Faces {0:?} and {1:?} have the same spin")]
    SameSpin(FaceKey, FaceKey),
    #[error("Joint {0:?} is still used by an interval or face")]
    JointInUse(JointKey),
    #[error("Face {0:?} still anchors a radial pull")]
    ApexInUse(FaceKey),
}

/// Joints, intervals and faces mirrored onto an engine.
pub struct Fabric<E: Engine> {
    engine: E,
    config: FabricConfig,
    joints: Mirror<JointKey, ()>,
    intervals: Mirror<IntervalKey, Interval>,
    faces: Mirror<FaceKey, Face>,
}

impl<E: Engine> Fabric<E> {
    /// Create an empty fabric on an empty engine.
    pub fn new(engine: E, config: FabricConfig) -> Self {
        Self {
            engine,
            config,
            joints: Mirror::new(),
            intervals: Mirror::new(),
            faces: Mirror::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    pub fn config(&self) -> &FabricConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Joints
    // ------------------------------------------------------------------

    pub fn create_joint(&mut self, location: Point3<f32>) -> JointKey {
        let index = self.engine.create_joint(location);
        self.joints.insert(index, ())
    }

    /// Remove a joint that no interval or face refers to.
    pub fn remove_joint(&mut self, joint: JointKey) -> Result<(), FabricError> {
        if !self.joints.contains(joint) {
            return Err(FabricError::MissingJoint(joint));
        }
        let in_use = self.intervals.iter().any(|(_, i)| i.touches(joint))
            || self.faces.iter().any(|(_, f)| f.ends.contains(&joint));
        if in_use {
            return Err(FabricError::JointInUse(joint));
        }
        let (index, ()) = self
            .joints
            .remove(joint)
            .ok_or(FabricError::MissingJoint(joint))?;
        self.engine.remove_joint(index);
        Ok(())
    }

    pub fn joint_index(&self, joint: JointKey) -> Result<usize, FabricError> {
        self.joints
            .index(joint)
            .ok_or(FabricError::MissingJoint(joint))
    }

    pub fn location(&self, joint: JointKey) -> Result<Point3<f32>, FabricError> {
        Ok(self.engine.joint_location(self.joint_index(joint)?))
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn joints(&self) -> impl Iterator<Item = JointKey> + '_ {
        self.joints.keys()
    }

    /// Average location of all joints.
    pub fn midpoint(&self) -> Point3<f32> {
        super::scalar::midpoint(&self.engine.joint_locations())
    }

    // ------------------------------------------------------------------
    // Intervals
    // ------------------------------------------------------------------

    /// Rest length of a role at unit scale. Radial roles have none.
    pub fn role_length(&self, role: IntervalRole) -> Option<f32> {
        match role {
            IntervalRole::Push => Some(self.config.push_length),
            IntervalRole::Ring => Some(self.config.ring_length),
            IntervalRole::Cross => Some(self.config.cross_length),
            IntervalRole::Triangle => Some(self.config.triangle_length),
            IntervalRole::BowMid => Some(self.config.bow_mid_length),
            IntervalRole::BowEnd => Some(self.config.bow_end_length),
            IntervalRole::Radial | IntervalRole::Connector | IntervalRole::Distancer => None,
        }
    }

    /// Create an interval heading for its role's rest length times `scale`.
    /// Roles without a rest length keep their current length.
    pub fn create_interval(
        &mut self,
        alpha: JointKey,
        omega: JointKey,
        role: IntervalRole,
        scale: f32,
    ) -> Result<IntervalKey, FabricError> {
        let current = self.distance(alpha, omega)?;
        let target = self
            .role_length(role)
            .map_or(current, |length| length * scale);
        self.create_interval_with_target(alpha, omega, role, scale, target)
    }

    /// Create an interval heading for an explicit target length.
    pub fn create_interval_with_target(
        &mut self,
        alpha: JointKey,
        omega: JointKey,
        role: IntervalRole,
        scale: f32,
        target: f32,
    ) -> Result<IntervalKey, FabricError> {
        let alpha_index = self.joint_index(alpha)?;
        let omega_index = self.joint_index(omega)?;
        let current = self.distance(alpha, omega)?;
        let ticks = countdown(self.config.interval_countdown, current, target);
        let index = self.engine.create_interval(
            alpha_index,
            omega_index,
            role.is_strut(),
            current,
            target,
            ticks,
        );
        Ok(self.intervals.insert(
            index,
            Interval {
                alpha,
                omega,
                role,
                scale,
            },
        ))
    }

    pub fn remove_interval(&mut self, interval: IntervalKey) -> Result<Interval, FabricError> {
        let (index, removed) = self
            .intervals
            .remove(interval)
            .ok_or(FabricError::MissingInterval(interval))?;
        self.engine.remove_interval(index);
        Ok(removed)
    }

    pub fn interval(&self, interval: IntervalKey) -> Result<&Interval, FabricError> {
        self.intervals
            .get(interval)
            .ok_or(FabricError::MissingInterval(interval))
    }

    pub fn interval_index(&self, interval: IntervalKey) -> Result<usize, FabricError> {
        self.intervals
            .index(interval)
            .ok_or(FabricError::MissingInterval(interval))
    }

    pub fn interval_length(&self, interval: IntervalKey) -> Result<f32, FabricError> {
        Ok(self.engine.interval_length(self.interval_index(interval)?))
    }

    /// Move an interval towards a new target length.
    pub fn set_interval_target(
        &mut self,
        interval: IntervalKey,
        target: f32,
    ) -> Result<(), FabricError> {
        let index = self.interval_index(interval)?;
        let current = self.engine.interval_length(index);
        let ticks = countdown(self.config.interval_countdown, current, target);
        self.engine.set_interval_target(index, target, ticks);
        Ok(())
    }

    /// Intervals in engine order.
    pub fn intervals(&self) -> impl Iterator<Item = (IntervalKey, &Interval)> + '_ {
        self.intervals.iter()
    }

    pub fn interval_count(&self) -> usize {
        self.intervals.len()
    }

    /// Whether any interval joins two joints.
    pub fn connected(&self, a: JointKey, b: JointKey) -> bool {
        self.intervals
            .iter()
            .any(|(_, interval)| interval.touches(a) && interval.touches(b))
    }

    /// The joint at the other end of `joint`'s push.
    pub fn opposite_end(&self, joint: JointKey) -> Result<JointKey, FabricError> {
        self.intervals
            .iter()
            .filter(|(_, interval)| interval.role.is_push())
            .find_map(|(_, interval)| interval.other_end(joint))
            .ok_or(FabricError::MissingPush(joint))
    }

    pub fn distance(&self, a: JointKey, b: JointKey) -> Result<f32, FabricError> {
        Ok((self.location(b)? - self.location(a)?).magnitude())
    }

    // ------------------------------------------------------------------
    // Faces
    // ------------------------------------------------------------------

    /// Create a face over existing joints and pulls.
    pub fn create_face(
        &mut self,
        ends: [JointKey; 3],
        pulls: [IntervalKey; 3],
        spin: Spin,
        scale: f32,
        name: FaceName,
    ) -> Result<FaceKey, FabricError> {
        let [i0, i1, i2] = [
            self.joint_index(ends[0])?,
            self.joint_index(ends[1])?,
            self.joint_index(ends[2])?,
        ];
        let index = self.engine.create_face(i0, i1, i2);
        Ok(self.faces.insert(
            index,
            Face {
                ends,
                pulls,
                spin,
                scale,
                name,
                marks: Vec::new(),
                apex: None,
            },
        ))
    }

    /// Remove a face together with its bounding pulls.
    pub fn remove_face(&mut self, face: FaceKey) -> Result<Face, FabricError> {
        let existing = self.face(face)?;
        if existing.apex.is_some() {
            return Err(FabricError::ApexInUse(face));
        }
        if let Some(&missing) = existing
            .pulls
            .iter()
            .find(|&&pull| !self.intervals.contains(pull))
        {
            return Err(FabricError::MissingInterval(missing));
        }
        let (index, removed) = self
            .faces
            .remove(face)
            .ok_or(FabricError::MissingFace(face))?;
        self.engine.remove_face(index);
        for pull in removed.pulls {
            self.remove_interval(pull)?;
        }
        Ok(removed)
    }

    pub fn face(&self, face: FaceKey) -> Result<&Face, FabricError> {
        self.faces.get(face).ok_or(FabricError::MissingFace(face))
    }

    pub fn face_mut(&mut self, face: FaceKey) -> Result<&mut Face, FabricError> {
        self.faces.get_mut(face).ok_or(FabricError::MissingFace(face))
    }

    /// Faces in engine order.
    pub fn faces(&self) -> impl Iterator<Item = (FaceKey, &Face)> + '_ {
        self.faces.iter()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Tag a face with a mark.
    pub fn add_mark(&mut self, face: FaceKey, mark: u32) -> Result<(), FabricError> {
        self.face_mut(face)?.marks.push(mark);
        Ok(())
    }

    pub fn face_locations(&self, face: FaceKey) -> Result<[Point3<f32>; 3], FabricError> {
        let ends = self.face(face)?.ends;
        Ok([
            self.location(ends[0])?,
            self.location(ends[1])?,
            self.location(ends[2])?,
        ])
    }

    pub fn face_centroid(&self, face: FaceKey) -> Result<Point3<f32>, FabricError> {
        let [a, b, c] = self.face_locations(face)?;
        Ok(Point3::centroid(&[a, b, c]))
    }

    /// Outward unit normal.
    pub fn face_normal(&self, face: FaceKey) -> Result<Vector3<f32>, FabricError> {
        let [a, b, c] = self.face_locations(face)?;
        Ok((b - a).cross(c - a).normalize())
    }

    /// Merge two faces of opposite spin.
    ///
    /// The reversed ends of `alpha` are interleaved with the ends of `omega`
    /// into a six-joint ring, choosing the rotation with the shortest
    /// perimeter. Each ring joint gets a ring pull to the next and a cross
    /// pull to the far end of the next joint's push. Both faces and their
    /// pulls are then removed.
    pub fn connect(&mut self, alpha: FaceKey, omega: FaceKey) -> Result<(), FabricError> {
        let (a, b) = (self.face(alpha)?, self.face(omega)?);
        if a.spin == b.spin {
            return Err(FabricError::SameSpin(alpha, omega));
        }
        let scale = (a.scale + b.scale) / 2.0;
        let reversed = [a.ends[2], a.ends[1], a.ends[0]];
        let forward = b.ends;

        let mut best: Option<([JointKey; 6], f32)> = None;
        for rotation in 0..3 {
            let ring = [
                forward[0],
                reversed[rotation],
                forward[1],
                reversed[(rotation + 1) % 3],
                forward[2],
                reversed[(rotation + 2) % 3],
            ];
            let mut perimeter = 0.0;
            for i in 0..6 {
                perimeter += self.distance(ring[i], ring[(i + 1) % 6])?;
            }
            if best.is_none_or(|(_, shortest)| perimeter < shortest) {
                best = Some((ring, perimeter));
            }
        }
        let Some((ring, _)) = best else {
            return Err(FabricError::MissingFace(alpha));
        };

        let mut far_ends = [ring[0]; 6];
        for (far, &joint) in far_ends.iter_mut().zip(ring.iter()) {
            *far = self.opposite_end(joint)?;
        }
        for i in 0..6 {
            let next = (i + 1) % 6;
            self.create_interval(ring[i], ring[next], IntervalRole::Ring, scale)?;
            self.create_interval(ring[i], far_ends[next], IntervalRole::Cross, scale)?;
        }
        self.remove_face(alpha)?;
        self.remove_face(omega)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Radial pulls
    // ------------------------------------------------------------------

    /// Tie two faces together with an axis of the given role between apexes
    /// at their centroids.
    pub fn create_radial_pull(
        &mut self,
        alpha: FaceKey,
        omega: FaceKey,
        role: IntervalRole,
        target: f32,
    ) -> Result<RadialPull, FabricError> {
        let alpha_apex = self.hold_apex(alpha)?;
        let omega_apex = self.hold_apex(omega)?;
        let scale = (self.face(alpha)?.scale + self.face(omega)?.scale) / 2.0;
        let axis = self.create_interval_with_target(alpha_apex, omega_apex, role, scale, target)?;
        Ok(RadialPull {
            alpha,
            omega,
            axis,
            role,
        })
    }

    /// Remove a radial pull's axis and release its apexes.
    pub fn remove_radial_pull(&mut self, pull: &RadialPull) -> Result<(), FabricError> {
        self.remove_interval(pull.axis)?;
        self.release_apex(pull.alpha)?;
        self.release_apex(pull.omega)
    }

    /// Distance between the apexes of a radial pull.
    pub fn radial_length(&self, pull: &RadialPull) -> Result<f32, FabricError> {
        self.interval_length(pull.axis)
    }

    fn hold_apex(&mut self, face: FaceKey) -> Result<JointKey, FabricError> {
        if let Some(apex) = self.face_mut(face)?.apex.as_mut() {
            apex.uses += 1;
            return Ok(apex.joint);
        }
        let centroid = self.face_centroid(face)?;
        let ends = self.face(face)?.ends;
        let scale = self.face(face)?.scale;
        let joint = self.create_joint(centroid);
        let mut rays = [IntervalKey::default(); 3];
        for (ray, end) in rays.iter_mut().zip(ends) {
            *ray = self.create_interval(joint, end, IntervalRole::Radial, scale)?;
        }
        self.face_mut(face)?.apex = Some(Apex {
            joint,
            rays,
            uses: 1,
        });
        Ok(joint)
    }

    fn release_apex(&mut self, face: FaceKey) -> Result<(), FabricError> {
        let apex = self
            .face_mut(face)?
            .apex
            .as_mut()
            .ok_or(FabricError::MissingApex(face))?;
        apex.uses -= 1;
        if apex.uses > 0 {
            return Ok(());
        }
        let Some(apex) = self.face_mut(face)?.apex.take() else {
            return Err(FabricError::MissingApex(face));
        };
        for ray in apex.rays {
            self.remove_interval(ray)?;
        }
        self.remove_joint(apex.joint)
    }

    // ------------------------------------------------------------------
    // Whole fabric
    // ------------------------------------------------------------------

    /// Transform every joint.
    pub fn apply_matrix(&mut self, matrix: &Matrix4<f32>) {
        self.engine.transform_joints(matrix);
    }

    pub fn stats(&self) -> FabricStats {
        let locations = self.engine.joint_locations();
        let max_height = locations
            .iter()
            .map(|location| location.y)
            .fold(f32::NEG_INFINITY, f32::max);
        let mut stats = FabricStats {
            joint_count: self.joints.len(),
            face_count: self.faces.len(),
            max_height: if locations.is_empty() { 0.0 } else { max_height },
            ..Default::default()
        };
        for (index, (_, interval)) in self.intervals.iter().enumerate() {
            let length = self.engine.interval_length(index);
            let (count, range) = if interval.role.is_push() {
                (&mut stats.push_count, &mut stats.push_range)
            } else {
                (&mut stats.pull_count, &mut stats.pull_range)
            };
            *range = if *count == 0 {
                (length, length)
            } else {
                (range.0.min(length), range.1.max(length))
            };
            *count += 1;
        }
        stats
    }
}
