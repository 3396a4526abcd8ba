//! Joint chains extracted from a bone hierarchy.
//!
//! Index 0 is the end-effector, the last index is the base. Every joint keeps
//! `end = start + length * (global_rotation * FORWARD_AXIS)` and the start of
//! a joint equals the end of the joint one step toward the base.

use cervid_core::{CervidError, Result};
use glam::{Quat, Vec3};

use crate::hierarchy::BoneHierarchy;

/// Direction a bone points along in its own frame.
pub const FORWARD_AXIS: Vec3 = Vec3::Y;

const MIN_BONE_LENGTH: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    /// Processed bone name, used to find the matching skeleton slot.
    pub name: String,
    pub length: f32,
    pub start: Vec3,
    pub end: Vec3,
    /// Rest orientation relative to the next joint toward the base. For the
    /// base joint this is its model-space rest orientation.
    pub rest_rotation: Quat,
    /// Solver-driven rotation on top of the rest orientation.
    pub local_rotation: Quat,
    pub global_rotation: Quat,
    /// Rotation from the skeleton node frame to this joint's frame, where
    /// the joint frame points [`FORWARD_AXIS`] along the bone.
    pub bind_alignment: Quat,
}

impl Joint {
    pub fn direction(&self) -> Vec3 {
        self.global_rotation * FORWARD_AXIS
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    joints: Vec<Joint>,
    rest_tip: Vec3,
}

/// One bone segment in base-first order, before frames are derived.
struct Segment {
    name: String,
    start: Vec3,
    end: Vec3,
    node_rotation: Quat,
}

impl Chain {
    /// Extracts the joints from the node named `start` down to the node named
    /// `end` and places them in their rest pose.
    ///
    /// A joint ends where the next joint of the chain begins. The
    /// end-effector ends at its first child node, or continues the direction
    /// and length of its parent joint when it has no children.
    pub fn from_hierarchy(hierarchy: &BoneHierarchy, start: &str, end: &str) -> Result<Self> {
        let indices = hierarchy
            .find_chain(start, end)
            .ok_or_else(|| CervidError::ChainNotFound {
                start: start.to_string(),
                end: end.to_string(),
            })?;

        let world = hierarchy.world_transforms();
        let origin = |i: usize| world[i].transform_point3(Vec3::ZERO);

        // find_chain is tip-first; segments are built base-first.
        let base_first: Vec<usize> = indices.iter().rev().copied().collect();
        let mut segments: Vec<Segment> = Vec::with_capacity(base_first.len());

        for (k, &node_index) in base_first.iter().enumerate() {
            let node = &hierarchy.nodes()[node_index];
            let start = origin(node_index);
            let (_, node_rotation, _) = world[node_index].to_scale_rotation_translation();

            let end = match base_first.get(k + 1) {
                Some(&next) => origin(next),
                None => match node.children.first() {
                    Some(&child) => origin(child),
                    None => match segments.last() {
                        Some(parent) => start + (parent.end - parent.start),
                        None => start,
                    },
                },
            };

            segments.push(Segment {
                name: node.bone_name().to_string(),
                start,
                end,
                node_rotation: node_rotation.normalize(),
            });
        }

        log::debug!(
            "Extracted chain {} -> {} with {} joints",
            start,
            end,
            segments.len()
        );
        Ok(Self::from_segments(segments))
    }

    /// Builds a chain through `points`, listed from the base start to the
    /// end-effector end. Joint `i` of the result is named `joint{i}`
    /// (so `joint0` is the end-effector).
    pub fn from_points(points: &[Vec3]) -> Self {
        let count = points.len().saturating_sub(1);
        let segments = points
            .windows(2)
            .enumerate()
            .map(|(k, pair)| Segment {
                name: format!("joint{}", count - 1 - k),
                start: pair[0],
                end: pair[1],
                node_rotation: Quat::IDENTITY,
            })
            .collect();
        Self::from_segments(segments)
    }

    fn from_segments(segments: Vec<Segment>) -> Self {
        let mut joints: Vec<Joint> = Vec::with_capacity(segments.len());
        let mut parent_frame = Quat::IDENTITY;

        for segment in segments {
            let offset = segment.end - segment.start;
            let length = offset.length();
            let frame = if length > MIN_BONE_LENGTH {
                Quat::from_rotation_arc(FORWARD_AXIS, offset / length)
            } else {
                parent_frame
            };

            joints.push(Joint {
                name: segment.name,
                length,
                start: segment.start,
                end: segment.end,
                rest_rotation: (parent_frame.inverse() * frame).normalize(),
                local_rotation: Quat::IDENTITY,
                global_rotation: frame,
                bind_alignment: (segment.node_rotation.inverse() * frame).normalize(),
            });
            parent_frame = frame;
        }

        joints.reverse();
        let mut chain = Self {
            joints,
            rest_tip: Vec3::ZERO,
        };
        chain.reset();
        chain.rest_tip = chain.tip_end();
        chain
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn joint(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn base_index(&self) -> Option<usize> {
        self.joints.len().checked_sub(1)
    }

    /// Current end point of the end-effector.
    pub fn tip_end(&self) -> Vec3 {
        self.joints.first().map(|j| j.end).unwrap_or(Vec3::ZERO)
    }

    /// End-effector end point in the rest pose.
    pub fn rest_tip_end(&self) -> Vec3 {
        self.rest_tip
    }

    /// Start point of the base joint; it never moves.
    pub fn base_start(&self) -> Vec3 {
        self.joints.last().map(|j| j.start).unwrap_or(Vec3::ZERO)
    }

    pub fn total_length(&self) -> f32 {
        self.joints.iter().map(|j| j.length).sum()
    }

    /// Returns every joint to its rest pose.
    pub fn reset(&mut self) {
        for joint in &mut self.joints {
            joint.local_rotation = Quat::IDENTITY;
        }
        if let Some(base) = self.base_index() {
            self.update_positions(base);
        }
    }

    /// Applies `rotation` in the joint's own frame and moves every joint
    /// between it and the end-effector accordingly.
    pub fn rotate_joint(&mut self, index: usize, rotation: Quat) {
        let Some(joint) = self.joints.get_mut(index) else {
            return;
        };
        joint.local_rotation = (joint.local_rotation * rotation).normalize();
        joint.global_rotation = (joint.global_rotation * rotation).normalize();
        self.update_positions(index);
    }

    /// Recomputes global rotations and endpoints from `from_index` down to the
    /// end-effector. The base joint keeps its start point.
    pub fn update_positions(&mut self, from_index: usize) {
        let Some(base) = self.base_index() else {
            return;
        };

        for i in (0..=from_index.min(base)).rev() {
            let (parent_rotation, parent_end) = match self.joints.get(i + 1) {
                Some(parent) => (parent.global_rotation, Some(parent.end)),
                None => (Quat::IDENTITY, None),
            };

            let joint = &mut self.joints[i];
            if let Some(end) = parent_end {
                joint.start = end;
            }
            joint.global_rotation =
                (parent_rotation * joint.rest_rotation * joint.local_rotation).normalize();
            joint.end = joint.start + joint.length * (joint.global_rotation * FORWARD_AXIS);
        }
    }

    /// Largest positional error of the chain invariants, for diagnostics.
    pub fn max_drift(&self) -> f32 {
        let mut drift: f32 = 0.0;
        for (i, joint) in self.joints.iter().enumerate() {
            let expected_end = joint.start + joint.length * joint.direction();
            drift = drift.max(expected_end.distance(joint.end));
            if let Some(parent) = self.joints.get(i + 1) {
                drift = drift.max(parent.end.distance(joint.start));
            }
        }
        drift
    }
}
