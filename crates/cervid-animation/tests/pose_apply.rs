use cervid_animation::{
    apply_chain, BoneHierarchy, CcdSolver, Chain, ChainDefinition, EndEffector, IkRig, RigConfig,
    Skeleton,
};
use glam::{Mat4, Quat, Vec3};

/// A hind leg whose hip node is turned so its local +X points down.
fn leg() -> BoneHierarchy {
    let mut h = BoneHierarchy::new();
    let root = h.add_node("Scene", None, Mat4::IDENTITY).unwrap();
    let hip = h
        .add_node(
            "Rig_hip",
            Some(root),
            Mat4::from_rotation_translation(
                Quat::from_rotation_z(-std::f32::consts::FRAC_PI_2),
                Vec3::new(0.0, 2.0, 0.0),
            ),
        )
        .unwrap();
    let knee = h
        .add_node("Rig_knee", Some(hip), Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)))
        .unwrap();
    let foot = h
        .add_node("Rig_foot", Some(knee), Mat4::from_translation(Vec3::new(1.0, 0.0, 0.5)))
        .unwrap();
    h.add_node("Rig_toe", Some(foot), Mat4::from_translation(Vec3::new(0.5, 0.0, 0.0)))
        .unwrap();
    h
}

fn origin(h: &BoneHierarchy, name: &str) -> Vec3 {
    h.world_transforms()[h.find(name).unwrap()].transform_point3(Vec3::ZERO)
}

#[test]
fn skinning_follows_solved_chain() {
    let h = leg();
    let mut skeleton = Skeleton::from_hierarchy(&h, &["hip", "knee", "foot"]).unwrap();
    let mut chain = Chain::from_hierarchy(&h, "hip", "foot").unwrap();

    assert!(chain.base_start().abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-5));
    assert!(chain
        .rest_tip_end()
        .abs_diff_eq(Vec3::new(0.0, -0.5, 0.5), 1e-5));

    let target = chain.rest_tip_end() + Vec3::new(0.4, 0.3, -0.2);
    CcdSolver::default().solve(&mut chain, target);

    let report = apply_chain(&chain, &mut skeleton);
    assert_eq!(report.applied, 3);
    skeleton.update_final_transforms(&h);

    let posed = |bone: &str, point: Vec3| {
        skeleton
            .bone(bone)
            .unwrap()
            .final_transformation
            .transform_point3(point)
    };

    let knee = posed("hip", origin(&h, "knee"));
    let ankle = posed("knee", origin(&h, "foot"));
    let toe = posed("foot", origin(&h, "toe"));

    assert!(knee.distance(chain.joint(1).unwrap().start) < 1e-4, "{knee:?}");
    assert!(ankle.distance(chain.joint(0).unwrap().start) < 1e-4, "{ankle:?}");
    assert!(toe.distance(chain.tip_end()) < 1e-4, "{toe:?}");
}

#[test]
fn non_chain_bones_keep_their_pose() {
    let h = leg();
    let mut skeleton = Skeleton::from_hierarchy(&h, &["hip", "knee", "foot", "toe"]).unwrap();
    skeleton.apply_rotation_y("toe", 20.0).unwrap();
    let before = skeleton.bone("toe").unwrap().local_transformation;

    let mut config = RigConfig::default();
    config
        .chains
        .insert(EndEffector::LeftRearFoot, ChainDefinition::new("hip", "foot"));
    let mut rig = IkRig::new(config);
    rig.select(&h, EndEffector::LeftRearFoot).unwrap();
    rig.offset = Vec3::new(0.0, 0.5, 0.5);
    rig.show_result = true;
    rig.solve().unwrap();

    let report = rig.apply(&mut skeleton).unwrap();
    assert_eq!(report.applied, 3);
    assert_eq!(skeleton.bone("toe").unwrap().local_transformation, before);
}
