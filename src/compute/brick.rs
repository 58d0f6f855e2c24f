//! Bricks: the unit of growth.
//!
//! A brick is an expanded octahedron. Six pushes run in parallel pairs along
//! the three axes and their twelve ends sit on the vertices of an
//! icosahedron. Eight triangular faces, one per octant, hold them together
//! with twenty-four triangle pulls. The faces alternate in spin.
//!
//! A brick grows from its base `a`, which faces the parent, and continues
//! through its antipode `A`.

use std::collections::BTreeMap;

use cgmath::{
    EuclideanSpace, InnerSpace, Point3, Quaternion, Rad, Rotation, Rotation3, Vector3,
};
use log::debug;

use super::engine::Engine;
use super::fabric::{Fabric, FabricError, FaceKey, IntervalKey, IntervalRole, Spin};
use crate::schema::{FaceName, PHI};

/// Octant of each face of an unmirrored brick.
const OCTANTS: [(FaceName, [f32; 3]); 8] = [
    (FaceName::A, [1.0, 1.0, 1.0]),
    (FaceName::B, [1.0, -1.0, -1.0]),
    (FaceName::C, [-1.0, 1.0, -1.0]),
    (FaceName::D, [-1.0, -1.0, 1.0]),
    (FaceName::LowerA, [-1.0, -1.0, -1.0]),
    (FaceName::LowerB, [-1.0, 1.0, 1.0]),
    (FaceName::LowerC, [1.0, -1.0, 1.0]),
    (FaceName::LowerD, [1.0, 1.0, -1.0]),
];

/// Push ends of the unit brick. Consecutive pairs are pushes.
fn template_joints() -> [Vector3<f32>; 12] {
    [
        Vector3::new(0.0, 1.0, PHI),
        Vector3::new(0.0, 1.0, -PHI),
        Vector3::new(0.0, -1.0, PHI),
        Vector3::new(0.0, -1.0, -PHI),
        Vector3::new(PHI, 0.0, 1.0),
        Vector3::new(-PHI, 0.0, 1.0),
        Vector3::new(PHI, 0.0, -1.0),
        Vector3::new(-PHI, 0.0, -1.0),
        Vector3::new(1.0, PHI, 0.0),
        Vector3::new(1.0, -PHI, 0.0),
        Vector3::new(-1.0, PHI, 0.0),
        Vector3::new(-1.0, -PHI, 0.0),
    ]
}

fn template_index(joints: &[Vector3<f32>; 12], target: Vector3<f32>) -> usize {
    joints
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (**a - target)
                .magnitude2()
                .total_cmp(&(**b - target).magnitude2())
        })
        .map_or(0, |(index, _)| index)
}

/// Template joint indices of the face in an octant.
fn octant_triangle(joints: &[Vector3<f32>; 12], [x, y, z]: [f32; 3]) -> [usize; 3] {
    [
        template_index(joints, Vector3::new(0.0, y, z * PHI)),
        template_index(joints, Vector3::new(x * PHI, 0.0, z)),
        template_index(joints, Vector3::new(x, y * PHI, 0.0)),
    ]
}

/// The push partner of a template joint.
fn partner(index: usize) -> usize {
    index ^ 1
}

/// Spin of a face from its ends and the far ends of their pushes.
pub fn spin_of(ends: [Point3<f32>; 3], far: [Point3<f32>; 3]) -> Spin {
    let twist: f32 = (0..3)
        .map(|i| (far[i] - ends[i]).dot(ends[(i + 1) % 3] - ends[(i + 2) % 3]))
        .sum();
    if twist < 0.0 { Spin::Left } else { Spin::Right }
}

/// Where and how to build a brick.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    /// Location of the brick's center.
    pub center: Point3<f32>,
    /// Rotation taking the template axis `a -> A` to the growth direction.
    pub rotation: Quaternion<f32>,
    /// Reflect the template, flipping every face's spin.
    pub mirrored: bool,
    /// Size relative to a unit brick.
    pub scale: f32,
}

/// Direction from the center of an unmirrored brick to its `A` face.
pub fn template_axis() -> Vector3<f32> {
    Vector3::new(1.0, 1.0, 1.0).normalize()
}

/// The faces of a brick that are still part of the fabric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Brick {
    pub faces: BTreeMap<FaceName, FaceKey>,
}

impl Brick {
    pub fn face(&self, name: FaceName) -> Option<FaceKey> {
        self.faces.get(&name).copied()
    }
}

/// Local joint positions of a brick with push length `push_length`.
fn local_joints(push_length: f32, placement: &Placement) -> [Vector3<f32>; 12] {
    let size = push_length * placement.scale / (2.0 * PHI);
    template_joints().map(|joint| {
        let joint = if placement.mirrored {
            Vector3::new(joint.y, joint.x, joint.z)
        } else {
            joint
        };
        joint * size
    })
}

/// Build a complete brick.
pub fn create_brick<E: Engine>(
    fabric: &mut Fabric<E>,
    placement: &Placement,
) -> Result<Brick, FabricError> {
    let template = template_joints();
    let local = local_joints(fabric.config().push_length, placement);
    let world = local.map(|offset| placement.center + placement.rotation.rotate_vector(offset));
    let joints = world.map(|location| fabric.create_joint(location));
    for pair in 0..6 {
        fabric.create_interval(
            joints[pair * 2],
            joints[pair * 2 + 1],
            IntervalRole::Push,
            placement.scale,
        )?;
    }

    let mut brick = Brick::default();
    for (name, octant) in OCTANTS {
        let preimage = if placement.mirrored {
            [octant[1], octant[0], octant[2]]
        } else {
            octant
        };
        let mut triangle = octant_triangle(&template, preimage);
        let [p0, p1, p2] = triangle.map(|index| world[index]);
        let outward = Point3::centroid(&[p0, p1, p2]) - placement.center;
        if (p1 - p0).cross(p2 - p0).dot(outward) < 0.0 {
            triangle.swap(1, 2);
        }
        let ends = triangle.map(|index| joints[index]);
        let spin = spin_of(
            triangle.map(|index| world[index]),
            triangle.map(|index| world[partner(index)]),
        );
        let mut pulls = [IntervalKey::default(); 3];
        for (i, pull) in pulls.iter_mut().enumerate() {
            *pull = fabric.create_interval(
                ends[i],
                ends[(i + 1) % 3],
                IntervalRole::Triangle,
                placement.scale,
            )?;
        }
        let face = fabric.create_face(ends, pulls, spin, placement.scale, name)?;
        brick.faces.insert(name, face);
    }
    Ok(brick)
}

/// The first brick, standing on its base at the origin with `A` up.
pub fn seed_brick<E: Engine>(fabric: &mut Fabric<E>, scale: f32) -> Result<Brick, FabricError> {
    let rotation = Quaternion::from_arc(template_axis(), Vector3::unit_y(), None);
    let placement = Placement {
        center: Point3::origin(),
        rotation,
        mirrored: false,
        scale,
    };
    let base_depth = base_depth(fabric.config().push_length, &placement);
    let placement = Placement {
        center: Point3::new(0.0, base_depth, 0.0),
        ..placement
    };
    create_brick(fabric, &placement)
}

/// Distance from a brick's center to the centroid of one of its faces.
fn base_depth(push_length: f32, placement: &Placement) -> f32 {
    let local = local_joints(push_length, placement);
    let triangle = octant_triangle(&template_joints(), [-1.0, -1.0, -1.0]);
    let centroid = triangle
        .iter()
        .fold(Vector3::new(0.0, 0.0, 0.0), |sum, &index| sum + local[index])
        / 3.0;
    centroid.magnitude()
}

/// Work out how a brick of `scale` grows from `face`, its base `gap` away.
pub fn placement_on_face<E: Engine>(
    fabric: &Fabric<E>,
    face: FaceKey,
    scale: f32,
    gap: f32,
) -> Result<Placement, FabricError> {
    let normal = fabric.face_normal(face)?;
    let centroid = fabric.face_centroid(face)?;
    let mirrored = fabric.face(face)?.spin == Spin::Right;
    let fallback = Vector3::new(1.0, -1.0, 0.0).normalize();
    let arc = Quaternion::from_arc(template_axis(), normal, Some(fallback));
    let untwisted = Placement {
        center: Point3::origin(),
        rotation: arc,
        mirrored,
        scale,
    };

    // Turn the base about the normal so its ends sit between the face's ends.
    let push_length = fabric.config().push_length;
    let local = local_joints(push_length, &untwisted);
    let base = octant_triangle(&template_joints(), [-1.0, -1.0, -1.0]);
    let base_centroid = base
        .iter()
        .fold(Vector3::new(0.0, 0.0, 0.0), |sum, &index| sum + local[index])
        / 3.0;
    let base_end = arc.rotate_vector(local[base[0]] - base_centroid);
    let face_end = fabric.location(fabric.face(face)?.ends[0])? - centroid;
    let across = (face_end - normal * face_end.dot(normal)).normalize();
    let beside = normal.cross(across);
    let base_angle = base_end.dot(beside).atan2(base_end.dot(across));
    let twist = Quaternion::from_axis_angle(
        normal,
        Rad(std::f32::consts::FRAC_PI_3 - base_angle),
    );

    let depth = base_centroid.magnitude();
    Ok(Placement {
        center: centroid + normal * (depth + gap * scale),
        rotation: twist * arc,
        mirrored,
        scale,
    })
}

/// Grow a brick on `face` and merge its base into it. The returned brick
/// no longer contains its base.
pub fn brick_on_face<E: Engine>(
    fabric: &mut Fabric<E>,
    face: FaceKey,
    scale: f32,
    gap: f32,
) -> Result<Brick, FabricError> {
    let placement = placement_on_face(fabric, face, scale, gap)?;
    let mut brick = create_brick(fabric, &placement)?;
    let base = brick
        .faces
        .remove(&FaceName::LowerA)
        .ok_or(FabricError::MissingFace(face))?;
    debug!(
        "brick on face {:?}, mirrored={}, scale={:.3}",
        fabric.face(face)?.name,
        placement.mirrored,
        scale
    );
    fabric.connect(base, face)?;
    Ok(brick)
}
