//! Cervid - skeletal inverse kinematics for four-legged character rigs
//!
//! Cervid extracts bone chains from a model's node hierarchy, solves them
//! toward a target with cyclic coordinate descent and writes the result back
//! into the skinned bone table.

pub use cervid_animation as animation;
pub use cervid_core as core;

pub mod prelude {
    pub use crate::core::{CervidError, Result, Transform};
    pub use crate::animation::{
        apply_chain, BoneHierarchy, CcdSolver, Chain, ConstraintTable, EndEffector, IkRig,
        IkSettings, JointConstraint, AxisLimit, RigConfig, Skeleton, SolveOutcome, SolveState,
    };
    pub use glam;
}
