//! Cyclic Coordinate Descent over a [`Chain`].

use cervid_core::{CervidError, Result};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::chain::{Chain, FORWARD_AXIS};
use crate::constraints::ConstraintTable;

/// A joint is skipped when turning it would move the end-effector by less
/// than this fraction of `epsilon`.
const MIN_TIP_TRAVEL: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IkSettings {
    pub max_iterations: u32,
    /// Convergence distance, also the smallest tip movement worth a rotation.
    pub epsilon: f32,
    /// Largest rotation applied to one joint per visit, in radians.
    pub angle_limit: f32,
    pub constraints_enabled: bool,
}

impl Default for IkSettings {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            epsilon: 1e-3,
            angle_limit: std::f32::consts::PI / 6.0,
            constraints_enabled: false,
        }
    }
}

impl IkSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(CervidError::InvalidConfiguration(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(CervidError::InvalidConfiguration(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        if !(self.angle_limit.is_finite() && self.angle_limit > 0.0) {
            return Err(CervidError::InvalidConfiguration(format!(
                "angle_limit must be positive, got {}",
                self.angle_limit
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveState {
    /// Nothing has been solved.
    Idle,
    /// The end-effector reached the target within `epsilon`.
    Converged,
    /// The iteration budget ran out; the pose is the best effort so far.
    IterationLimitReached,
}

impl SolveState {
    pub fn is_converged(self) -> bool {
        self == SolveState::Converged
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveOutcome {
    pub state: SolveState,
    /// Sweeps started, including the one that converged.
    pub iterations: u32,
    /// Final end-effector to target distance.
    pub distance: f32,
}

#[derive(Debug, Clone, Default)]
pub struct CcdSolver {
    pub settings: IkSettings,
    pub constraints: ConstraintTable,
}

impl CcdSolver {
    pub fn new(settings: IkSettings) -> Self {
        Self {
            settings,
            constraints: ConstraintTable::default(),
        }
    }

    pub fn with_constraints(mut self, constraints: ConstraintTable) -> Self {
        self.constraints = constraints;
        self
    }

    /// Resets `chain` to its rest pose and drives its end-effector toward
    /// `target`, visiting joints from the end-effector to the base.
    pub fn solve(&self, chain: &mut Chain, target: Vec3) -> SolveOutcome {
        chain.reset();

        if chain.is_empty() {
            return SolveOutcome {
                state: SolveState::Idle,
                iterations: 0,
                distance: f32::INFINITY,
            };
        }

        let epsilon = self.settings.epsilon;
        let distance = chain.tip_end().distance(target);
        if distance < epsilon {
            return self.finish(SolveState::Converged, 0, distance);
        }

        let reach = chain.total_length();

        for iteration in 0..self.settings.max_iterations {
            let mut stalled = true;

            for index in 0..chain.len() {
                let Some(rotation) = self.joint_rotation(chain, index, target) else {
                    continue;
                };
                stalled = false;

                let rotation = self.constrain(chain, index, rotation, iteration == 0);
                chain.rotate_joint(index, rotation);

                let distance = chain.tip_end().distance(target);
                if distance < epsilon {
                    return self.finish(SolveState::Converged, iteration + 1, distance);
                }
            }

            if stalled && chain.base_start().distance(target) < reach {
                self.unfold(chain);
            }
        }

        let distance = chain.tip_end().distance(target);
        self.finish(
            SolveState::IterationLimitReached,
            self.settings.max_iterations,
            distance,
        )
    }

    /// Rotation, in the joint's own frame, that swings the end-effector
    /// toward `target` about joint `index`, limited to `angle_limit`.
    ///
    /// `None` when the directions are degenerate or the joint is already
    /// aligned closely enough.
    pub fn joint_rotation(&self, chain: &Chain, index: usize, target: Vec3) -> Option<Quat> {
        let joint = chain.joint(index)?;
        let inverse = joint.global_rotation.inverse();

        let to_tip = inverse * (chain.tip_end() - joint.start);
        let to_target = inverse * (target - joint.start);
        let tip_dir = to_tip.try_normalize()?;
        let target_dir = to_target.try_normalize()?;

        let cross = tip_dir.cross(target_dir);
        let angle = cross.length().atan2(tip_dir.dot(target_dir));
        if !angle.is_finite() || angle * to_tip.length() < self.settings.epsilon * MIN_TIP_TRAVEL {
            return None;
        }

        // Opposite directions have no unique axis; any perpendicular one works.
        let axis = cross
            .try_normalize()
            .unwrap_or_else(|| tip_dir.any_orthonormal_vector());
        Some(Quat::from_axis_angle(
            axis,
            angle.min(self.settings.angle_limit),
        ))
    }

    fn constrain(&self, chain: &Chain, index: usize, rotation: Quat, seed: bool) -> Quat {
        if !self.settings.constraints_enabled {
            return rotation;
        }
        match chain.joint(index) {
            Some(joint) => self
                .constraints
                .get(index)
                .constrain(joint.local_rotation, rotation, seed),
            None => rotation,
        }
    }

    /// A straight chain pointing exactly at a nearer target gives every joint
    /// a zero angle. Bending the joint above the end-effector breaks the tie.
    fn unfold(&self, chain: &mut Chain) {
        let index = chain.len().min(2) - 1;
        let bend = Quat::from_axis_angle(
            FORWARD_AXIS.any_orthonormal_vector(),
            self.settings.angle_limit,
        );
        let bend = self.constrain(chain, index, bend, false);
        log::trace!("Chain stalled, bending joint {}", index);
        chain.rotate_joint(index, bend);
    }

    fn finish(&self, state: SolveState, iterations: u32, distance: f32) -> SolveOutcome {
        log::debug!(
            "CCD solve finished: {:?} after {} iterations, distance {:.5}",
            state,
            iterations,
            distance
        );
        SolveOutcome {
            state,
            iterations,
            distance,
        }
    }
}
