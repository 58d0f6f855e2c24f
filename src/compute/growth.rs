//! Interpreting a tenscript into bricks, one tick at a time.
//!
//! Growth keeps an explicit worklist of [`Bud`]s. Each tick grows one brick
//! per bud. When every bud is spent, the faces sharing a mark are handed to
//! the mark's action once, and from then on every tick checks whether the
//! connectors have pulled their faces close enough to merge.

use std::collections::BTreeMap;

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Quaternion, Vector3};
use log::{debug, info, warn};

use super::brick::{Brick, Placement, brick_on_face, create_brick, seed_brick};
use super::engine::{Engine, Stage};
use super::fabric::{Fabric, FabricError, FaceKey, IntervalRole, RadialPull};
use crate::schema::{
    FaceName, GrowthConfig, MarkAction, Tenscript, TenscriptError, TenscriptNode,
};

/// Errors raised while growing or staging a tensegrity.
#[derive(Debug, thiserror::Error)]
pub enum GrowthError {
    #[error(transparent)]
    Fabric(#[from] FabricError),
    #[error(transparent)]
    Tenscript(#[from] TenscriptError),
    #[error("Brick has no face {0}")]
    MissingBrickFace(FaceName),
    #[error("Cannot move from stage {from:?} to {to:?}")]
    StageTransition { from: Stage, to: Stage },
    #[error("Tensegrity is {0:?}, not pretenst")]
    NotSettled(Stage),
}

/// A growth cursor: the rest of a node still to grow from a face.
#[derive(Debug, Clone)]
pub struct Bud {
    pub node: TenscriptNode,
    pub face: FaceKey,
    /// Bricks still to grow in this node's chain.
    pub remaining: u32,
    pub scale: f32,
}

/// Growth state of one tensegrity.
#[derive(Debug)]
pub struct Growth {
    tenscript: Tenscript,
    config: GrowthConfig,
    buds: Vec<Bud>,
    connectors: Vec<RadialPull>,
    distancers: Vec<RadialPull>,
    strategies_done: bool,
    ticks: usize,
    bricks: usize,
    mark_groups: usize,
}

impl Growth {
    /// Validate the tenscript and build the seed brick.
    pub fn new<E: Engine>(
        tenscript: Tenscript,
        config: GrowthConfig,
        fabric: &mut Fabric<E>,
    ) -> Result<Self, GrowthError> {
        tenscript.validate()?;
        let root = tenscript.tree.clone();
        let scale = root.scale_factor();
        let seed = seed_brick(fabric, scale)?;
        let mut growth = Self {
            tenscript,
            config,
            buds: Vec::new(),
            connectors: Vec::new(),
            distancers: Vec::new(),
            strategies_done: false,
            ticks: 0,
            bricks: 0,
            mark_groups: 0,
        };
        if root.steps == 0 {
            growth.buds = growth.finish_node(fabric, &root, &seed, scale)?;
        } else {
            let face = seed
                .face(FaceName::A)
                .ok_or(GrowthError::MissingBrickFace(FaceName::A))?;
            growth.buds.push(Bud {
                node: root.clone(),
                face,
                remaining: root.steps,
                scale,
            });
        }
        info!(
            "growing {} ({} steps)",
            growth.tenscript.name,
            root.total_steps()
        );
        Ok(growth)
    }

    /// Advance growth by one tick.
    pub fn step<E: Engine>(&mut self, fabric: &mut Fabric<E>) -> Result<(), GrowthError> {
        if !self.buds.is_empty() {
            self.execute_buds(fabric)?;
        }
        if self.buds.is_empty() {
            if !self.strategies_done {
                self.run_face_strategies(fabric)?;
                self.strategies_done = true;
            }
            self.settle_connectors(fabric)?;
        }
        Ok(())
    }

    /// Grow one brick per bud and collect the buds that follow.
    fn execute_buds<E: Engine>(&mut self, fabric: &mut Fabric<E>) -> Result<(), GrowthError> {
        let buds = std::mem::take(&mut self.buds);
        let mut next = Vec::with_capacity(buds.len());
        for bud in buds {
            let brick = brick_on_face(fabric, bud.face, bud.scale, self.config.brick_gap)?;
            self.bricks += 1;
            let remaining = bud.remaining - 1;
            if remaining > 0 {
                let face = brick
                    .face(FaceName::A)
                    .ok_or(GrowthError::MissingBrickFace(FaceName::A))?;
                next.push(Bud {
                    face,
                    remaining,
                    ..bud
                });
            } else {
                next.extend(self.finish_node(fabric, &bud.node, &brick, bud.scale)?);
            }
        }
        self.ticks += 1;
        debug!("growth tick {}: {} buds", self.ticks, next.len());
        self.buds = next;
        Ok(())
    }

    /// Mark the faces of a node's last brick and bud its branches.
    fn finish_node<E: Engine>(
        &self,
        fabric: &mut Fabric<E>,
        node: &TenscriptNode,
        brick: &Brick,
        scale: f32,
    ) -> Result<Vec<Bud>, GrowthError> {
        for (&name, &mark) in &node.marks {
            let face = brick
                .face(name)
                .ok_or(GrowthError::MissingBrickFace(name))?;
            fabric.add_mark(face, mark)?;
        }
        node.branches
            .iter()
            .map(|(&name, child)| {
                let face = brick
                    .face(name)
                    .ok_or(GrowthError::MissingBrickFace(name))?;
                Ok(Bud {
                    node: child.clone(),
                    face,
                    remaining: child.steps,
                    scale: scale * child.scale_factor(),
                })
            })
            .collect()
    }

    /// Run each mark's action over the faces carrying it.
    fn run_face_strategies<E: Engine>(
        &mut self,
        fabric: &mut Fabric<E>,
    ) -> Result<(), GrowthError> {
        let mut groups: BTreeMap<u32, Vec<FaceKey>> = BTreeMap::new();
        for (key, face) in fabric.faces() {
            for &mark in &face.marks {
                groups.entry(mark).or_default().push(key);
            }
        }
        self.mark_groups = groups.len();
        for (mark, faces) in groups {
            match self.tenscript.action(mark) {
                Some(MarkAction::Join) => self.join(fabric, mark, &faces)?,
                Some(MarkAction::Distance { scale }) => {
                    let spread = scale.unwrap_or(self.config.distancer_factor);
                    self.distance(fabric, &faces, spread)?;
                }
                Some(MarkAction::Base) => base(fabric, &faces)?,
                Some(MarkAction::Anchor) | Some(MarkAction::NoOp) | None => {}
            }
        }
        Ok(())
    }

    fn join<E: Engine>(
        &mut self,
        fabric: &mut Fabric<E>,
        mark: u32,
        faces: &[FaceKey],
    ) -> Result<(), GrowthError> {
        match *faces {
            [alpha, omega] => {
                if fabric.face(alpha)?.spin == fabric.face(omega)?.spin {
                    self.join_through_brick(fabric, faces)
                } else {
                    self.connect_faces(fabric, alpha, omega)
                }
            }
            [_, _, _] => self.join_through_brick(fabric, faces),
            _ => {
                warn!(
                    "mark {} joins {} faces, only 2 or 3 can be joined",
                    mark,
                    faces.len()
                );
                Ok(())
            }
        }
    }

    /// Grow a brick amid the faces and connect each to its closest
    /// unused face of opposite spin.
    fn join_through_brick<E: Engine>(
        &mut self,
        fabric: &mut Fabric<E>,
        faces: &[FaceKey],
    ) -> Result<(), GrowthError> {
        let mut centroids = Vec::with_capacity(faces.len());
        let mut scale = 0.0;
        for &face in faces {
            centroids.push(fabric.face_centroid(face)?);
            scale += fabric.face(face)?.scale;
        }
        let placement = Placement {
            center: Point3::centroid(&centroids),
            rotation: Quaternion::new(1.0, 0.0, 0.0, 0.0),
            mirrored: false,
            scale: scale / faces.len() as f32,
        };
        let brick = create_brick(fabric, &placement)?;
        self.bricks += 1;

        let mut used = Vec::new();
        for (&face, &centroid) in faces.iter().zip(&centroids) {
            let spin = fabric.face(face)?.spin;
            let mut closest: Option<(FaceKey, f32)> = None;
            for &candidate in brick.faces.values() {
                if used.contains(&candidate) || fabric.face(candidate)?.spin == spin {
                    continue;
                }
                let distance = (fabric.face_centroid(candidate)? - centroid).magnitude();
                if closest.is_none_or(|(_, nearest)| distance < nearest) {
                    closest = Some((candidate, distance));
                }
            }
            let Some((partner, _)) = closest else {
                return Err(FabricError::SameSpin(face, face).into());
            };
            used.push(partner);
            self.connect_faces(fabric, face, partner)?;
        }
        Ok(())
    }

    fn connect_faces<E: Engine>(
        &mut self,
        fabric: &mut Fabric<E>,
        alpha: FaceKey,
        omega: FaceKey,
    ) -> Result<(), GrowthError> {
        let scale = (fabric.face(alpha)?.scale + fabric.face(omega)?.scale) / 2.0;
        let target = self.config.connector_target * scale;
        let connector = fabric.create_radial_pull(alpha, omega, IntervalRole::Connector, target)?;
        self.connectors.push(connector);
        Ok(())
    }

    /// Strut every pair of faces apart, lengthening their distance by
    /// `spread` times itself.
    fn distance<E: Engine>(
        &mut self,
        fabric: &mut Fabric<E>,
        faces: &[FaceKey],
        spread: f32,
    ) -> Result<(), GrowthError> {
        for (i, &alpha) in faces.iter().enumerate() {
            for &omega in &faces[i + 1..] {
                let current =
                    (fabric.face_centroid(omega)? - fabric.face_centroid(alpha)?).magnitude();
                let distancer = fabric.create_radial_pull(
                    alpha,
                    omega,
                    IntervalRole::Distancer,
                    current * (1.0 + spread),
                )?;
                self.distancers.push(distancer);
            }
        }
        Ok(())
    }

    /// Merge the faces of every connector whose apexes have met.
    fn settle_connectors<E: Engine>(
        &mut self,
        fabric: &mut Fabric<E>,
    ) -> Result<(), GrowthError> {
        let mut index = 0;
        while index < self.connectors.len() {
            let connector = self.connectors[index];
            let length = fabric.radial_length(&connector)?;
            if length <= self.config.connector_length {
                fabric.remove_radial_pull(&connector)?;
                self.connectors.remove(index);
                fabric.connect(connector.alpha, connector.omega)?;
                debug!("connector merged at {:.4}", length);
            } else {
                index += 1;
            }
        }
        Ok(())
    }

    /// Remove every distancer, as the structure is about to slacken.
    pub fn remove_distancers<E: Engine>(
        &mut self,
        fabric: &mut Fabric<E>,
    ) -> Result<usize, GrowthError> {
        let mut removed = 0;
        while let Some(&distancer) = self.distancers.last() {
            fabric.remove_radial_pull(&distancer)?;
            self.distancers.pop();
            removed += 1;
        }
        Ok(removed)
    }

    /// All buds spent, marks handled and connectors merged.
    pub fn is_complete(&self) -> bool {
        self.buds.is_empty() && self.connectors.is_empty() && self.strategies_done
    }

    pub fn buds(&self) -> &[Bud] {
        &self.buds
    }

    pub fn connectors(&self) -> &[RadialPull] {
        &self.connectors
    }

    pub fn distancers(&self) -> &[RadialPull] {
        &self.distancers
    }

    /// Ticks in which buds were executed.
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// Bricks grown, not counting the seed.
    pub fn bricks(&self) -> usize {
        self.bricks
    }

    /// Distinct marks found on faces when growth finished.
    pub fn mark_groups(&self) -> usize {
        self.mark_groups
    }

    pub fn tenscript(&self) -> &Tenscript {
        &self.tenscript
    }
}

/// Move the structure so the faces' centroid is at the origin with their
/// averaged normal pointing down.
fn base<E: Engine>(fabric: &mut Fabric<E>, faces: &[FaceKey]) -> Result<(), GrowthError> {
    let mut centroids = Vec::with_capacity(faces.len());
    let mut normal = Vector3::new(0.0, 0.0, 0.0);
    for &face in faces {
        centroids.push(fabric.face_centroid(face)?);
        normal += fabric.face_normal(face)?;
    }
    if normal.magnitude2() < f32::EPSILON {
        warn!("base faces cancel out, leaving orientation unchanged");
        normal = -Vector3::unit_y();
    }
    let rotation = Quaternion::from_arc(
        normal.normalize(),
        -Vector3::unit_y(),
        Some(Vector3::unit_x()),
    );
    let center = Point3::centroid(&centroids);
    let matrix = Matrix4::from(rotation) * Matrix4::from_translation(-center.to_vec());
    fabric.apply_matrix(&matrix);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::ScalarEngine;
    use crate::schema::{FabricConfig, PhysicsConfig};
    use proptest::prelude::*;

    fn fabric() -> Fabric<ScalarEngine> {
        Fabric::new(
            ScalarEngine::new(PhysicsConfig::default()),
            FabricConfig::default(),
        )
    }

    fn grow(tenscript: Tenscript, config: GrowthConfig) -> (Fabric<ScalarEngine>, Growth) {
        let mut fabric = fabric();
        let growth = Growth::new(tenscript, config, &mut fabric).unwrap();
        (fabric, growth)
    }

    fn seed_join(marks: [FaceName; 2]) -> Tenscript {
        let tree = TenscriptNode::new(0).mark(marks[0], 1).mark(marks[1], 1);
        Tenscript::new("join", tree).with_mark(1, MarkAction::Join)
    }

    #[test]
    fn test_straight_chain() {
        let (mut fabric, mut growth) =
            grow(Tenscript::new("pillar", TenscriptNode::new(2)), GrowthConfig::default());
        growth.step(&mut fabric).unwrap();
        assert!(!growth.is_complete());
        growth.step(&mut fabric).unwrap();
        assert!(growth.is_complete());
        assert_eq!(growth.ticks(), 2);
        assert_eq!(growth.bricks(), 2);
        assert_eq!(growth.mark_groups(), 0);
        assert_eq!(fabric.joint_count(), 36);
        assert_eq!(fabric.face_count(), 8 + 6 + 6);
    }

    #[test]
    fn test_branches_inherit_scale() {
        let tree = TenscriptNode::new(1)
            .branch(FaceName::B, TenscriptNode::new(1).scaled(50.0))
            .branch(FaceName::LowerC, TenscriptNode::new(2));
        let (mut fabric, mut growth) =
            grow(Tenscript::new("fork", tree), GrowthConfig::default());
        growth.step(&mut fabric).unwrap();
        assert_eq!(growth.buds().len(), 2);
        let scales: Vec<f32> = growth.buds().iter().map(|bud| bud.scale).collect();
        assert_eq!(scales, vec![0.5, 1.0]);
        growth.step(&mut fabric).unwrap();
        assert_eq!(growth.buds().len(), 1);
        growth.step(&mut fabric).unwrap();
        assert!(growth.is_complete());
        assert_eq!(growth.bricks(), 4);
    }

    #[test]
    fn test_invalid_tenscript_builds_nothing() {
        let mut fabric = fabric();
        let tree = TenscriptNode::new(1).branch(FaceName::B, TenscriptNode::new(0));
        let result = Growth::new(
            Tenscript::new("bad", tree),
            GrowthConfig::default(),
            &mut fabric,
        );
        assert!(matches!(result, Err(GrowthError::Tenscript(_))));
        assert_eq!(fabric.joint_count(), 0);
    }

    #[test]
    fn test_join_opposite_spin_is_direct() {
        let (mut fabric, mut growth) =
            grow(seed_join([FaceName::A, FaceName::LowerA]), GrowthConfig::default());
        growth.step(&mut fabric).unwrap();
        assert_eq!(growth.mark_groups(), 1);
        assert_eq!(growth.connectors().len(), 1);
        assert_eq!(growth.bricks(), 0);
        assert_eq!(fabric.face_count(), 8);
        assert!(!growth.is_complete());
    }

    #[test]
    fn test_join_same_spin_goes_through_brick() {
        let (mut fabric, mut growth) =
            grow(seed_join([FaceName::A, FaceName::B]), GrowthConfig::default());
        growth.step(&mut fabric).unwrap();
        assert_eq!(growth.connectors().len(), 2);
        assert_eq!(growth.bricks(), 1);
        assert_eq!(fabric.face_count(), 16);
        let partners: Vec<FaceKey> = growth.connectors().iter().map(|c| c.omega).collect();
        assert_ne!(partners[0], partners[1]);
        for connector in growth.connectors() {
            let alpha = fabric.face(connector.alpha).unwrap().spin;
            let omega = fabric.face(connector.omega).unwrap().spin;
            assert_eq!(alpha, omega.opposite());
        }
    }

    #[test]
    fn test_connector_merges_once_close_enough() {
        let config = GrowthConfig {
            connector_length: 10.0,
            ..Default::default()
        };
        let (mut fabric, mut growth) = grow(seed_join([FaceName::A, FaceName::LowerA]), config);
        growth.step(&mut fabric).unwrap();
        assert!(growth.connectors().is_empty());
        assert!(growth.is_complete());
        assert_eq!(fabric.face_count(), 6);
        assert_eq!(fabric.joint_count(), 12);
    }

    #[test]
    fn test_connector_waits_while_far() {
        let (mut fabric, mut growth) =
            grow(seed_join([FaceName::A, FaceName::LowerA]), GrowthConfig::default());
        growth.step(&mut fabric).unwrap();
        let connector = growth.connectors()[0];
        let length = fabric.radial_length(&connector).unwrap();
        assert!(length > GrowthConfig::default().connector_length);
        growth.step(&mut fabric).unwrap();
        assert_eq!(growth.connectors().len(), 1);
    }

    #[test]
    fn test_distancers_removed_on_demand() {
        let tree = TenscriptNode::new(0)
            .mark(FaceName::A, 2)
            .mark(FaceName::B, 2)
            .mark(FaceName::C, 2);
        let tenscript = Tenscript::new("spread", tree)
            .with_mark(2, MarkAction::Distance { scale: None });
        let (mut fabric, mut growth) = grow(tenscript, GrowthConfig::default());
        let intervals = fabric.interval_count();
        growth.step(&mut fabric).unwrap();
        assert_eq!(growth.distancers().len(), 3);
        assert!(growth.is_complete());
        assert_eq!(growth.remove_distancers(&mut fabric).unwrap(), 3);
        assert_eq!(fabric.interval_count(), intervals);
        assert_eq!(fabric.joint_count(), 12);
    }

    #[test]
    fn test_failed_removal_keeps_remaining_distancers() {
        let tree = TenscriptNode::new(0)
            .mark(FaceName::A, 2)
            .mark(FaceName::B, 2)
            .mark(FaceName::C, 2);
        let tenscript = Tenscript::new("spread", tree)
            .with_mark(2, MarkAction::Distance { scale: None });
        let (mut fabric, mut growth) = grow(tenscript, GrowthConfig::default());
        growth.step(&mut fabric).unwrap();
        let broken = growth.distancers()[0];
        fabric.remove_interval(broken.axis).unwrap();

        assert!(growth.remove_distancers(&mut fabric).is_err());
        assert_eq!(growth.distancers(), &[broken]);
    }

    #[test]
    fn test_failed_settlement_keeps_connectors() {
        let tree = TenscriptNode::new(0)
            .mark(FaceName::A, 1)
            .mark(FaceName::LowerA, 1)
            .mark(FaceName::B, 2)
            .mark(FaceName::LowerB, 2);
        let tenscript = Tenscript::new("double", tree)
            .with_mark(1, MarkAction::Join)
            .with_mark(2, MarkAction::Join);
        let (mut fabric, mut growth) = grow(tenscript, GrowthConfig::default());
        growth.step(&mut fabric).unwrap();
        assert_eq!(growth.connectors().len(), 2);
        fabric.remove_interval(growth.connectors()[0].axis).unwrap();

        assert!(growth.step(&mut fabric).is_err());
        assert_eq!(growth.connectors().len(), 2);
    }

    #[test]
    fn test_base_points_faces_down() {
        let tree = TenscriptNode::new(0).mark(FaceName::B, 3);
        let tenscript = Tenscript::new("tilted", tree).with_mark(3, MarkAction::Base);
        let (mut fabric, mut growth) = grow(tenscript, GrowthConfig::default());
        growth.step(&mut fabric).unwrap();
        let face = fabric
            .faces()
            .find(|(_, face)| face.name == FaceName::B)
            .map(|(key, _)| key)
            .unwrap();
        assert!(fabric.face_normal(face).unwrap().y < -0.99);
        assert!(fabric.face_centroid(face).unwrap().to_vec().magnitude() < 1e-4);
    }

    fn tree_strategy() -> impl Strategy<Value = TenscriptNode> {
        let leaf = (1u32..3).prop_map(TenscriptNode::new);
        leaf.prop_recursive(2, 6, 2, |inner| {
            (
                1u32..3,
                proptest::collection::btree_map(
                    prop_oneof![
                        Just(FaceName::A),
                        Just(FaceName::B),
                        Just(FaceName::LowerC),
                        Just(FaceName::D),
                    ],
                    inner,
                    0..3,
                ),
            )
                .prop_map(|(steps, branches)| TenscriptNode {
                    steps,
                    branches,
                    ..Default::default()
                })
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn property_buds_run_out_within_total_steps(tree in tree_strategy()) {
            let total = tree.total_steps() as usize;
            let (mut fabric, mut growth) =
                grow(Tenscript::new("random", tree), GrowthConfig::default());
            let mut ticks = 0;
            while !growth.buds().is_empty() {
                growth.step(&mut fabric).unwrap();
                ticks += 1;
                prop_assert!(ticks <= total);
            }
            prop_assert_eq!(growth.ticks(), ticks);
        }
    }
}
