use cervid_animation::{
    AxisLimit, CcdSolver, Chain, ConstraintTable, IkSettings, JointConstraint, SolveState,
};
use glam::Vec3;

/// `n` unit bones stacked along +Y from the origin.
fn straight_chain(n: usize) -> Chain {
    let points: Vec<Vec3> = (0..=n).map(|i| Vec3::new(0.0, i as f32, 0.0)).collect();
    Chain::from_points(&points)
}

fn assert_consistent(chain: &Chain) {
    for (i, joint) in chain.joints().iter().enumerate() {
        let expected = joint.start + joint.length * joint.direction();
        assert!(
            expected.distance(joint.end) < 1e-4,
            "joint {i} end drifted: {:?} vs {:?}",
            joint.end,
            expected
        );
        if let Some(parent) = chain.joint(i + 1) {
            assert!(parent.end.distance(joint.start) < 1e-4, "joint {i} detached");
        }
    }
    assert!(chain.base_start().abs_diff_eq(Vec3::ZERO, 1e-6));
}

#[test]
fn colinear_reachable_target_converges() {
    let mut chain = straight_chain(3);
    let target = Vec3::new(0.0, 2.5, 0.0);
    let outcome = CcdSolver::default().solve(&mut chain, target);

    assert_eq!(outcome.state, SolveState::Converged);
    assert!(outcome.iterations <= 20);
    assert!(outcome.distance < 1e-3);
    assert!(chain.tip_end().distance(target) < 1e-3);
    assert_consistent(&chain);
}

#[test]
fn colinear_unreachable_target_stays_extended() {
    let mut chain = straight_chain(3);
    let outcome = CcdSolver::default().solve(&mut chain, Vec3::new(0.0, 10.0, 0.0));

    assert_eq!(outcome.state, SolveState::IterationLimitReached);
    assert_eq!(outcome.iterations, 20);
    assert!((outcome.distance - 7.0).abs() < 1e-3);
    assert!(chain.tip_end().abs_diff_eq(Vec3::new(0.0, 3.0, 0.0), 1e-4));
}

#[test]
fn unreachable_target_straightens_toward_it() {
    for target in [Vec3::new(10.0, 0.0, 0.0), Vec3::new(6.0, 6.0, 0.0)] {
        let mut chain = straight_chain(3);
        let outcome = CcdSolver::default().solve(&mut chain, target);

        assert_eq!(outcome.state, SolveState::IterationLimitReached);
        let fully_extended = target.length() - chain.total_length();
        assert!(
            (outcome.distance - fully_extended).abs() < 0.01,
            "target {target:?}: distance {} vs {}",
            outcome.distance,
            fully_extended
        );
        // Every bone points at the target.
        let toward = target.normalize();
        for joint in chain.joints() {
            assert!(joint.direction().dot(toward) > 0.999);
        }
        assert_consistent(&chain);
    }
}

#[test]
fn representative_chains_converge() {
    let cases = [
        (2, Vec3::new(0.5, 1.2, 0.3)),
        (2, Vec3::new(1.2, 0.8, 0.0)),
        (3, Vec3::new(1.0, 1.0, 0.0)),
        (3, Vec3::new(-1.0, 1.0, 0.0)),
        (3, Vec3::new(1.5, 0.0, 1.0)),
        (3, Vec3::new(0.0, 1.0, 0.0)),
        (4, Vec3::new(1.0, 2.0, 0.0)),
        (4, Vec3::new(0.5, 1.2, 0.3)),
    ];

    for (joints, target) in cases {
        let mut chain = straight_chain(joints);
        let outcome = CcdSolver::default().solve(&mut chain, target);
        assert_eq!(
            outcome.state,
            SolveState::Converged,
            "{joints} joints toward {target:?} stopped at {}",
            outcome.distance
        );
        assert!(chain.tip_end().distance(target) < 1e-3);
        assert_consistent(&chain);
    }
}

#[test]
fn repeated_solves_are_identical() {
    let solver = CcdSolver::default();
    let mut chain = straight_chain(3);
    let target = Vec3::new(0.7, 1.6, -0.4);

    let first = solver.solve(&mut chain, target);
    let pose = chain.clone();
    let second = solver.solve(&mut chain, target);

    assert_eq!(first, second);
    assert_eq!(pose, chain);
}

#[test]
fn constrained_joints_stay_inside_bounds() {
    let constraint = JointConstraint::new(
        AxisLimit::new(-25.0, 25.0),
        AxisLimit::new(-10.0, 40.0),
        AxisLimit::locked(),
    );
    let table = ConstraintTable::from_joints(vec![constraint; 3]);
    let settings = IkSettings {
        constraints_enabled: true,
        ..IkSettings::default()
    };
    let solver = CcdSolver::new(settings).with_constraints(table.clone());

    for target in [
        Vec3::new(1.0, 1.5, 0.5),
        Vec3::new(-2.0, 0.5, 0.0),
        Vec3::new(0.0, -2.0, 1.0),
    ] {
        let mut chain = straight_chain(3);
        solver.solve(&mut chain, target);

        for (i, joint) in chain.joints().iter().enumerate() {
            assert!(
                table.get(i).admits(joint.local_rotation, 0.05),
                "joint {i} toward {target:?} left its bounds"
            );
        }
        assert_consistent(&chain);
    }
}

#[test]
fn disabled_constraints_are_ignored() {
    let locked = JointConstraint::new(AxisLimit::locked(), AxisLimit::locked(), AxisLimit::locked());
    let solver = CcdSolver::default().with_constraints(ConstraintTable::from_joints(vec![locked; 3]));

    let mut chain = straight_chain(3);
    let outcome = solver.solve(&mut chain, Vec3::new(1.0, 1.0, 0.0));
    assert_eq!(outcome.state, SolveState::Converged);
}

#[test]
fn iteration_budget_is_respected() {
    let settings = IkSettings {
        max_iterations: 2,
        ..IkSettings::default()
    };
    let mut chain = straight_chain(3);
    let outcome = CcdSolver::new(settings).solve(&mut chain, Vec3::new(0.0, 2.5, 0.0));
    assert_eq!(outcome.state, SolveState::IterationLimitReached);
    assert_eq!(outcome.iterations, 2);
    assert_consistent(&chain);
}
