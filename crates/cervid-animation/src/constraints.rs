//! Per-joint rotation limits consulted by the CCD solver.
//!
//! Angles are in degrees. Yaw turns about X, roll about Y and pitch about Z;
//! a rotation is split into those three angles with [`EULER_ORDER`].

use cervid_core::{CervidError, Result};
use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Decomposition order used for every constraint check.
///
/// The split is not unique once roll leaves (-90°, 90°); wide roll limits can
/// therefore be reported through an equivalent triple outside the bounds.
pub const EULER_ORDER: EulerRot = EulerRot::XYZ;

/// Splits a rotation into `(yaw, roll, pitch)` degrees stored as `(x, y, z)`.
pub fn euler_degrees(rotation: Quat) -> Vec3 {
    let (x, y, z) = rotation.to_euler(EULER_ORDER);
    Vec3::new(x, y, z) * (180.0 / std::f32::consts::PI)
}

pub fn quat_from_euler_degrees(angles: Vec3) -> Quat {
    let r = angles * (std::f32::consts::PI / 180.0);
    Quat::from_euler(EULER_ORDER, r.x, r.y, r.z)
}

/// Folds an angle difference into [-180, 180].
fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && angle > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Enable flag and bounds for one rotation axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AxisLimit {
    pub enabled: bool,
    /// Minimum cumulative angle in degrees.
    pub min: f32,
    /// Maximum cumulative angle in degrees.
    pub max: f32,
}

impl Default for AxisLimit {
    fn default() -> Self {
        Self {
            enabled: true,
            min: -180.0,
            max: 180.0,
        }
    }
}

impl AxisLimit {
    pub fn new(min: f32, max: f32) -> Self {
        Self {
            enabled: true,
            min,
            max,
        }
    }

    /// An axis that may not rotate at all.
    pub fn locked() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn midpoint(&self) -> f32 {
        (self.min + self.max) * 0.5
    }

    pub fn validate(&self, axis: &str) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(CervidError::InvalidConstraint(format!(
                "{axis} bounds must be finite"
            )));
        }
        if self.min > self.max {
            return Err(CervidError::InvalidConstraint(format!(
                "{axis} min {} exceeds max {}",
                self.min, self.max
            )));
        }
        Ok(())
    }

    /// Limits `delta` so that `current + delta` stays inside `[min, max]`.
    /// A disabled axis never moves.
    pub fn clamp_delta(&self, current: f32, delta: f32) -> f32 {
        if !self.enabled {
            return 0.0;
        }
        delta.max(self.min - current).min(self.max - current)
    }
}

/// Limits for the three rotation axes of one chain joint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JointConstraint {
    /// Rotation about X.
    pub yaw: AxisLimit,
    /// Rotation about Z.
    pub pitch: AxisLimit,
    /// Rotation about Y.
    pub roll: AxisLimit,
}

impl JointConstraint {
    pub fn new(yaw: AxisLimit, pitch: AxisLimit, roll: AxisLimit) -> Self {
        Self { yaw, pitch, roll }
    }

    pub fn validate(&self) -> Result<()> {
        self.yaw.validate("yaw")?;
        self.pitch.validate("pitch")?;
        self.roll.validate("roll")
    }

    /// Midpoint of every axis as `(yaw, roll, pitch)`.
    pub fn midpoint(&self) -> Vec3 {
        Vec3::new(self.yaw.midpoint(), self.roll.midpoint(), self.pitch.midpoint())
    }

    /// Restricts a candidate increment `rotation` for a joint whose
    /// accumulated rotation is `local`, returning the increment to apply.
    ///
    /// With `seed` set, every axis is driven to the middle of its range
    /// instead of following the candidate.
    pub fn constrain(&self, local: Quat, rotation: Quat, seed: bool) -> Quat {
        let current = euler_degrees(local);
        let delta = if seed {
            self.midpoint() - current
        } else {
            let candidate = euler_degrees(local * rotation);
            Vec3::new(
                wrap_degrees(candidate.x - current.x),
                wrap_degrees(candidate.y - current.y),
                wrap_degrees(candidate.z - current.z),
            )
        };

        let next = Vec3::new(
            current.x + self.yaw.clamp_delta(current.x, delta.x),
            current.y + self.roll.clamp_delta(current.y, delta.y),
            current.z + self.pitch.clamp_delta(current.z, delta.z),
        );

        (local.inverse() * quat_from_euler_degrees(next)).normalize()
    }

    /// Whether `local` decomposes to angles inside every enabled bound and
    /// zero on every disabled axis, within `tolerance` degrees.
    pub fn admits(&self, local: Quat, tolerance: f32) -> bool {
        let angles = euler_degrees(local);
        let inside = |limit: &AxisLimit, angle: f32| {
            if limit.enabled {
                angle >= limit.min - tolerance && angle <= limit.max + tolerance
            } else {
                angle.abs() <= tolerance
            }
        };
        inside(&self.yaw, angles.x) && inside(&self.roll, angles.y) && inside(&self.pitch, angles.z)
    }
}

/// Constraint records indexed by chain position (0 = end-effector).
///
/// Positions without an explicit record are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintTable {
    joints: Vec<JointConstraint>,
}

impl ConstraintTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_joints(joints: Vec<JointConstraint>) -> Self {
        Self { joints }
    }

    pub fn get(&self, index: usize) -> JointConstraint {
        self.joints.get(index).copied().unwrap_or_default()
    }

    pub fn set(&mut self, index: usize, constraint: JointConstraint) {
        if index >= self.joints.len() {
            self.joints.resize(index + 1, JointConstraint::default());
        }
        self.joints[index] = constraint;
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JointConstraint> {
        self.joints.iter()
    }

    pub fn validate(&self) -> Result<()> {
        for (index, joint) in self.joints.iter().enumerate() {
            joint.validate().map_err(|e| match e {
                CervidError::InvalidConstraint(msg) => {
                    CervidError::InvalidConstraint(format!("joint {index}: {msg}"))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}
