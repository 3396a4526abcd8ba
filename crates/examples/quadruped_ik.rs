//! Solves every end-effector of a small deer rig and prints the result.
//!
//! Usage:
//!   quadruped_ik [rig.json]
//!
//! Set `RUST_LOG=debug` to see per-solve iteration counts.

use cervid::animation::palette_bytes;
use cervid::prelude::*;
use glam::{Mat4, Vec3};

fn main() {
    env_logger::init();
    log::info!("Starting Cervid quadruped IK example");

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => RigConfig::load(path)?,
        None => RigConfig::default(),
    };

    let hierarchy = deer()?;
    let names: Vec<&str> = hierarchy
        .nodes()
        .iter()
        .skip(1)
        .map(|n| n.bone_name())
        .filter(|name| !name.ends_with("_end"))
        .collect();
    let mut skeleton = Skeleton::from_hierarchy(&hierarchy, &names)?;
    log::info!("Skeleton has {} bones", skeleton.bones.len());
    for line in skeleton.hierarchy_outline(&hierarchy) {
        log::info!("{}", line);
    }

    let mut rig = IkRig::new(config);
    rig.show_result = true;

    for effector in EndEffector::ALL {
        if rig.select(&hierarchy, effector).is_err() {
            continue;
        }
        rig.offset = offset_for(effector);

        let Some(outcome) = rig.solve() else {
            continue;
        };
        log::info!(
            "{:?}: {:?} after {} iterations, {:.4} from target",
            effector,
            outcome.state,
            outcome.iterations,
            outcome.distance
        );

        if let Some(report) = rig.apply(&mut skeleton) {
            for name in &report.skipped {
                log::warn!("{:?}: bone {} is not skinned", effector, name);
            }
        }
    }

    skeleton.update_final_transforms(&hierarchy);
    let palette = skeleton.bone_matrices();
    log::info!(
        "Skinning palette: {} matrices, {} bytes",
        palette.len(),
        palette_bytes(&palette).len()
    );
    Ok(())
}

/// Where each end-effector is pushed from its rest position.
fn offset_for(effector: EndEffector) -> Vec3 {
    match effector {
        EndEffector::Head => Vec3::new(0.3, -0.4, 0.1),
        EndEffector::LeftForeFoot => Vec3::new(0.25, 0.2, 0.0),
        EndEffector::RightForeFoot => Vec3::new(0.0, 0.05, 0.0),
        EndEffector::LeftRearFoot => Vec3::new(-0.2, 0.15, 0.05),
        EndEffector::RightRearFoot => Vec3::new(0.1, 0.3, -0.1),
    }
}

/// A deer-like rig: spine, neck and head up front, three bones per leg.
/// Raw names carry the exporter's `Deer_` prefix.
fn deer() -> Result<BoneHierarchy> {
    let mut h = BoneHierarchy::new();
    let root = h.add_node("Scene", None, Mat4::IDENTITY)?;
    let spine = h.add_node("Deer_spine", Some(root), translation(0.0, 1.2, 0.0))?;

    let neck = h.add_node("Deer_neck", Some(spine), translation(0.55, 0.15, 0.0))?;
    let head = h.add_node("Deer_head", Some(neck), translation(0.2, 0.45, 0.0))?;
    h.add_node("Deer_head_end", Some(head), translation(0.25, 0.05, 0.0))?;

    for (side, z) in [("left", 0.18), ("right", -0.18)] {
        for (end, x) in [("fore", 0.5), ("rear", -0.5)] {
            let thigh = h.add_node(
                format!("Deer_{side}_{end}_thigh"),
                Some(spine),
                translation(x, -0.05, z),
            )?;
            let shin = h.add_node(
                format!("Deer_{side}_{end}_shin"),
                Some(thigh),
                translation(0.0, -0.45, 0.0),
            )?;
            let foot = h.add_node(
                format!("Deer_{side}_{end}_foot"),
                Some(shin),
                translation(0.0, -0.45, 0.0),
            )?;
            h.add_node(
                format!("Deer_{side}_{end}_foot_end"),
                Some(foot),
                translation(0.05, -0.2, 0.0),
            )?;
        }
    }

    Ok(h)
}

fn translation(x: f32, y: f32, z: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(x, y, z))
}
