//! Writes solved chain rotations back into a [`Skeleton`].

use glam::Quat;

use crate::chain::{Chain, Joint};
use crate::skeleton::Skeleton;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseReport {
    pub applied: usize,
    /// Chain joints with no slot in the skeleton.
    pub skipped: Vec<String>,
}

/// The joint's solved rotation expressed in its skeleton node frame.
pub fn node_rotation(joint: &Joint) -> Quat {
    (joint.bind_alignment * joint.local_rotation * joint.bind_alignment.inverse()).normalize()
}

/// Overwrites the rotation of every skeleton bone named in `chain`.
///
/// Translation and scale of those slots are reset to identity and bones
/// outside the chain are untouched. Joints without a matching bone are
/// skipped individually.
pub fn apply_chain(chain: &Chain, skeleton: &mut Skeleton) -> PoseReport {
    let mut report = PoseReport::default();

    for joint in chain.joints() {
        match skeleton.set_local_rotation(&joint.name, node_rotation(joint)) {
            Ok(()) => report.applied += 1,
            Err(e) => {
                log::warn!("Skipping IK joint: {}", e);
                report.skipped.push(joint.name.clone());
            }
        }
    }

    report
}
