//! Property-based tests for ramps, gain adjustment, and the wrench law.

use nalgebra::{Rotation3, Unit, Vector3};
use opengrasp_coupling::{
    CouplingGains, GainParam, GainRamp, Pose, VirtualCoupling, axis_angle, constants,
};
use proptest::prelude::*;

fn arb_param() -> impl Strategy<Value = GainParam> {
    prop_oneof![
        Just(GainParam::LinearHaptic),
        Just(GainParam::AngularHaptic),
        Just(GainParam::LinearStiffness),
        Just(GainParam::AngularStiffness),
        Just(GainParam::LinearDamping),
        Just(GainParam::AngularDamping),
    ]
}

proptest! {
    /// A ramp never decreases and never exceeds its target, for any
    /// sequence of tick durations.
    #[test]
    fn ramp_is_monotone_and_bounded(
        target in 0.0f64..1000.0,
        climb in 0.0f64..10.0,
        dts in prop::collection::vec(0.0f64..0.1, 1..200),
    ) {
        let mut ramp = GainRamp::new(target, climb);
        let mut prev = ramp.value();
        for dt in dts {
            ramp.advance(dt);
            prop_assert!(ramp.value() >= prev);
            prop_assert!(ramp.value() <= ramp.target());
            prev = ramp.value();
        }
    }

    /// Gains stay non-negative under any adjustment sequence.
    #[test]
    fn gains_never_go_negative(
        adjustments in prop::collection::vec((arb_param(), -100.0f64..100.0), 0..50),
    ) {
        let mut gains = CouplingGains::default();
        for (param, offset) in adjustments {
            let value = gains.adjust(param, offset);
            prop_assert!(value >= 0.0);
            prop_assert!(gains.get(param) >= 0.0);
        }
    }

    /// +x then −x restores a gain unless the clamp at zero intervened;
    /// starting at zero, −x then +x lands on x.
    #[test]
    fn adjust_round_trip(param in arb_param(), x in 0.001f64..50.0) {
        let mut gains = CouplingGains::default();
        let before = gains.get(param);
        gains.adjust(param, x);
        let after = gains.adjust(param, -x);
        if before > 0.0 {
            prop_assert!((after - before).abs() < 1e-9);
        }

        let mut gains = CouplingGains::default();
        while gains.get(param) > 0.0 {
            gains.adjust(param, -gains.get(param) - 1.0);
        }
        gains.adjust(param, -x);
        prop_assert_eq!(gains.get(param), 0.0);
        let restored = gains.adjust(param, x);
        prop_assert!((restored - x).abs() < 1e-12);
    }

    /// Torque is exactly zero whenever the rotational error angle is
    /// exactly zero, regardless of the shared orientation or positions.
    #[test]
    fn zero_angle_zero_torque(
        axis in (-1.0f64..1.0, -1.0f64..1.0, -1.0f64..1.0),
        angle in 0.0f64..3.0,
        target_pos in (-5.0f64..5.0, -5.0f64..5.0, -5.0f64..5.0),
        body_pos in (-5.0f64..5.0, -5.0f64..5.0, -5.0f64..5.0),
    ) {
        let axis = Vector3::new(axis.0, axis.1, axis.2);
        prop_assume!(axis.norm() > 1e-6);
        let shared_rot = Rotation3::from_axis_angle(&Unit::new_normalize(axis), angle);

        let mut coupling = VirtualCoupling::body_side();
        coupling.settle_ramps();
        let gains = CouplingGains::default();
        let target = Pose::new(Vector3::new(target_pos.0, target_pos.1, target_pos.2), shared_rot);
        let body = Pose::new(Vector3::new(body_pos.0, body_pos.1, body_pos.2), shared_rot);

        let w = coupling.wrench(&gains, &target, &body, 0.001);
        prop_assert_eq!(w.torque, Vector3::zeros());
    }

    /// Axis-angle decomposition and reconstruction agree.
    #[test]
    fn axis_angle_round_trip(
        axis in (-1.0f64..1.0, -1.0f64..1.0, -1.0f64..1.0),
        angle in 0.01f64..3.0,
    ) {
        let axis = Vector3::new(axis.0, axis.1, axis.2);
        prop_assume!(axis.norm() > 1e-6);
        let rot = Rotation3::from_axis_angle(&Unit::new_normalize(axis), angle);
        let (a, theta) = axis_angle(&rot);
        let rebuilt = Rotation3::from_axis_angle(&Unit::new_normalize(a), theta);
        prop_assert!(rot.angle_to(&rebuilt) < 1e-9);
    }
}

#[test]
fn ramp_reaches_device_gain_in_expected_time() {
    // At 0.1 · target per second the device ramp takes ten seconds of
    // simulated time to settle, independent of the target magnitude.
    let gains = CouplingGains::default();
    let mut ramp = GainRamp::new(gains.linear_haptic, constants::DEVICE_RAMP_CLIMB);
    let mut elapsed = 0.0;
    while !ramp.is_settled() {
        ramp.advance(0.001);
        elapsed += 0.001;
        assert!(elapsed < 11.0, "ramp failed to settle");
    }
    assert!((9.9..=10.1).contains(&elapsed), "settled after {elapsed}s");
}
