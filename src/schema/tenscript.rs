//! Tenscript: the declarative growth program of a tensegrity.
//!
//! A tenscript is a tree. Every node grows a chain of `steps` bricks, then
//! branches from named faces of the last brick in the chain and tags other
//! faces with integer marks. Each mark is bound to a [`MarkAction`] that runs
//! once growth has finished.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of one of the eight faces of a brick.
///
/// `a` is the base a brick grows from and `A` its antipode, so a chain of
/// bricks extends through `A`. Every lowercase face is the antipode of its
/// uppercase partner and has the opposite chirality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FaceName {
    A,
    B,
    C,
    D,
    #[serde(rename = "a")]
    LowerA,
    #[serde(rename = "b")]
    LowerB,
    #[serde(rename = "c")]
    LowerC,
    #[serde(rename = "d")]
    LowerD,
}

impl FaceName {
    /// All faces, uppercase first.
    pub const ALL: [FaceName; 8] = [
        FaceName::A,
        FaceName::B,
        FaceName::C,
        FaceName::D,
        FaceName::LowerA,
        FaceName::LowerB,
        FaceName::LowerC,
        FaceName::LowerD,
    ];

    /// Whether this is one of the forward (uppercase) faces.
    pub fn is_forward(self) -> bool {
        matches!(self, FaceName::A | FaceName::B | FaceName::C | FaceName::D)
    }

    /// The face on the opposite side of the brick.
    pub fn antipode(self) -> FaceName {
        match self {
            FaceName::A => FaceName::LowerA,
            FaceName::B => FaceName::LowerB,
            FaceName::C => FaceName::LowerC,
            FaceName::D => FaceName::LowerD,
            FaceName::LowerA => FaceName::A,
            FaceName::LowerB => FaceName::B,
            FaceName::LowerC => FaceName::C,
            FaceName::LowerD => FaceName::D,
        }
    }
}

impl fmt::Display for FaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaceName::A => "A",
            FaceName::B => "B",
            FaceName::C => "C",
            FaceName::D => "D",
            FaceName::LowerA => "a",
            FaceName::LowerB => "b",
            FaceName::LowerC => "c",
            FaceName::LowerD => "d",
        };
        f.write_str(name)
    }
}

/// One node of the growth tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenscriptNode {
    /// Number of bricks grown in a straight chain.
    #[serde(default)]
    pub steps: u32,
    /// Size of this node's bricks as a percentage of its parent's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f32>,
    /// Sub-trees grown from faces of the last brick.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub branches: BTreeMap<FaceName, TenscriptNode>,
    /// Marks attached to faces of the last brick.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub marks: BTreeMap<FaceName, u32>,
}

impl TenscriptNode {
    /// Create a node growing `steps` bricks.
    pub fn new(steps: u32) -> Self {
        Self {
            steps,
            ..Default::default()
        }
    }

    /// Set the scale percentage.
    pub fn scaled(mut self, percent: f32) -> Self {
        self.scale = Some(percent);
        self
    }

    /// Add a branch on a face of the last brick.
    pub fn branch(mut self, face: FaceName, node: TenscriptNode) -> Self {
        self.branches.insert(face, node);
        self
    }

    /// Mark a face of the last brick.
    pub fn mark(mut self, face: FaceName, mark: u32) -> Self {
        self.marks.insert(face, mark);
        self
    }

    /// Scale multiplier relative to the parent node.
    pub fn scale_factor(&self) -> f32 {
        self.scale.map_or(1.0, |percent| percent / 100.0)
    }

    /// Total steps in this node and all of its descendants.
    pub fn total_steps(&self) -> u32 {
        self.steps
            + self
                .branches
                .values()
                .map(TenscriptNode::total_steps)
                .sum::<u32>()
    }
}

fn default_program_name() -> String {
    "unnamed".to_string()
}

/// What happens to the faces sharing a mark once growth is done.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum MarkAction {
    /// Reorient the structure so the marked faces rest on the floor.
    Base,
    /// Pull two or three faces together and merge them.
    Join,
    /// Push faces apart with distancers until the structure is slackened.
    Distance {
        /// Fraction of its initial length a distancer axis grows by. Uses
        /// the growth configuration's factor when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scale: Option<f32>,
    },
    /// Reserved for attaching the structure to the ground.
    Anchor,
    /// Mark without an action.
    #[serde(rename = "None")]
    NoOp,
}

/// A complete growth program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenscript {
    #[serde(default = "default_program_name")]
    pub name: String,
    pub tree: TenscriptNode,
    /// Actions bound to the marks used in the tree.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub marks: BTreeMap<u32, MarkAction>,
}

impl Default for Tenscript {
    fn default() -> Self {
        Self {
            name: "column".to_string(),
            tree: TenscriptNode::new(3),
            marks: BTreeMap::new(),
        }
    }
}

impl Tenscript {
    /// Create a program with no mark actions.
    pub fn new(name: impl Into<String>, tree: TenscriptNode) -> Self {
        Self {
            name: name.into(),
            tree,
            marks: BTreeMap::new(),
        }
    }

    /// Bind an action to a mark.
    pub fn with_mark(mut self, mark: u32, action: MarkAction) -> Self {
        self.marks.insert(mark, action);
        self
    }

    /// The action bound to a mark, if any.
    pub fn action(&self, mark: u32) -> Option<MarkAction> {
        self.marks.get(&mark).copied()
    }

    /// Reject trees that cannot be grown.
    ///
    /// The root may have zero steps, in which case its branches and marks
    /// apply to the seed brick and may use every face. Any other node must
    /// grow at least one brick, and the base `a` of a grown brick is
    /// consumed by the merge with its parent.
    pub fn validate(&self) -> Result<(), TenscriptError> {
        for (mark, action) in &self.marks {
            if let MarkAction::Distance { scale: Some(scale) } = action
                && (*scale <= 0.0 || !scale.is_finite())
            {
                return Err(TenscriptError::InvalidScale {
                    path: format!("mark {mark}"),
                    scale: *scale,
                });
            }
        }
        self.validate_node(&self.tree, "root".to_string(), true)
    }

    fn validate_node(
        &self,
        node: &TenscriptNode,
        path: String,
        root: bool,
    ) -> Result<(), TenscriptError> {
        if !root && node.steps == 0 {
            return Err(TenscriptError::ZeroSteps { path });
        }
        if let Some(scale) = node.scale
            && (scale <= 0.0 || !scale.is_finite())
        {
            return Err(TenscriptError::InvalidScale { path, scale });
        }
        let grown = node.steps > 0;
        for face in node.branches.keys().chain(node.marks.keys()) {
            if grown && *face == FaceName::LowerA {
                return Err(TenscriptError::BaseFaceInUse { path });
            }
        }
        for (face, mark) in &node.marks {
            if node.branches.contains_key(face) {
                return Err(TenscriptError::FaceConflict { path, face: *face });
            }
            if !self.marks.contains_key(mark) {
                return Err(TenscriptError::UnknownMark { path, mark: *mark });
            }
        }
        for (face, child) in &node.branches {
            let child_path = if root {
                face.to_string()
            } else {
                format!("{path}.{face}")
            };
            self.validate_node(child, child_path, false)?;
        }
        Ok(())
    }
}

/// Malformed growth programs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TenscriptError {
    #[error("Node {path} grows zero bricks")]
    ZeroSteps { path: String },
    #[error("Node {path} has invalid scale {scale}")]
    InvalidScale { path: String, scale: f32 },
    #[error("Node {path} uses base face a, which is consumed by its parent")]
    BaseFaceInUse { path: String },
    #[error("Node {path} both branches from and marks face {face}")]
    FaceConflict { path: String, face: FaceName },
    #[error("Node {path} uses mark {mark}, which has no action")]
    UnknownMark { path: String, mark: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tripod() -> Tenscript {
        let tree = TenscriptNode::new(0)
            .branch(FaceName::A, TenscriptNode::new(2).mark(FaceName::A, 1))
            .branch(FaceName::B, TenscriptNode::new(2).mark(FaceName::A, 1))
            .branch(FaceName::C, TenscriptNode::new(2).scaled(80.0));
        Tenscript::new("tripod", tree).with_mark(1, MarkAction::Join)
    }

    #[test]
    fn test_valid_tree() {
        assert!(tripod().validate().is_ok());
        assert_eq!(tripod().tree.total_steps(), 6);
    }

    #[test]
    fn test_zero_step_child_rejected() {
        let tree = TenscriptNode::new(1).branch(
            FaceName::B,
            TenscriptNode::new(2).branch(FaceName::LowerC, TenscriptNode::new(0)),
        );
        let err = Tenscript::new("bad", tree).validate().unwrap_err();
        assert_eq!(
            err,
            TenscriptError::ZeroSteps {
                path: "B.c".to_string()
            }
        );
    }

    #[test]
    fn test_base_face_only_on_seed() {
        let seed = TenscriptNode::new(0).branch(FaceName::LowerA, TenscriptNode::new(1));
        assert!(Tenscript::new("down", seed).validate().is_ok());

        let grown = TenscriptNode::new(1).branch(FaceName::LowerA, TenscriptNode::new(1));
        assert!(matches!(
            Tenscript::new("down", grown).validate(),
            Err(TenscriptError::BaseFaceInUse { .. })
        ));
    }

    #[test]
    fn test_unknown_mark() {
        let tree = TenscriptNode::new(1).mark(FaceName::B, 7);
        assert!(matches!(
            Tenscript::new("unbound", tree).validate(),
            Err(TenscriptError::UnknownMark { mark: 7, .. })
        ));
    }

    #[test]
    fn test_invalid_scale() {
        let tree = TenscriptNode::new(1).scaled(-5.0);
        assert!(matches!(
            Tenscript::new("shrunk", tree).validate(),
            Err(TenscriptError::InvalidScale { .. })
        ));
    }

    #[test]
    fn test_distance_spread_must_be_positive() {
        let tree = TenscriptNode::new(0)
            .mark(FaceName::A, 4)
            .mark(FaceName::B, 4);
        let script =
            Tenscript::new("inward", tree).with_mark(4, MarkAction::Distance { scale: Some(0.0) });
        assert_eq!(
            script.validate(),
            Err(TenscriptError::InvalidScale {
                path: "mark 4".to_string(),
                scale: 0.0,
            })
        );
    }

    #[test]
    fn test_serialization() {
        let script = tripod().with_mark(2, MarkAction::Distance { scale: Some(0.5) });
        let json = serde_json::to_string(&script).unwrap();
        assert!(json.contains(r#""action":"Join""#));
        let parsed: Tenscript = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, script);
    }

    #[test]
    fn test_lowercase_face_keys() {
        let json = r#"{
            "name": "hook",
            "tree": { "steps": 1, "branches": { "b": { "steps": 2 } } },
            "marks": { "3": { "action": "None" } }
        }"#;
        let script: Tenscript = serde_json::from_str(json).unwrap();
        assert!(script.tree.branches.contains_key(&FaceName::LowerB));
        assert_eq!(script.action(3), Some(MarkAction::NoOp));
    }
}
