//! The spring-damper wrench law.
//!
//! Both loop kinds evaluate the same law against the same reference pose,
//! each with its own finite-difference history: the physics loop at the
//! physics rate (body side, authoritative), each haptics loop at the
//! device rate (device side, what the operator feels).

use crate::{CouplingGains, GainRamp, Pose, constants};
use nalgebra::{Rotation3, Vector3};

/// A force/torque pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wrench {
    /// Linear force
    pub force: Vector3<f64>,
    /// Torque
    pub torque: Vector3<f64>,
}

impl Wrench {
    /// The zero wrench.
    pub fn zero() -> Self {
        Self {
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
        }
    }

    /// Whether both components are exactly zero.
    pub fn is_zero(&self) -> bool {
        self.force == Vector3::zeros() && self.torque == Vector3::zeros()
    }
}

impl Default for Wrench {
    fn default() -> Self {
        Self::zero()
    }
}

/// Axis-angle decomposition of a rotation, with the degenerate case
/// resolved deterministically.
///
/// At zero rotation the axis is mathematically undefined; this returns the
/// zero vector so that any `angle · axis` product downstream evaluates to
/// exactly zero torque.
pub fn axis_angle(rotation: &Rotation3<f64>) -> (Vector3<f64>, f64) {
    match rotation.axis_angle() {
        Some((axis, angle)) => (axis.into_inner(), angle),
        None => (Vector3::zeros(), 0.0),
    }
}

/// Current-tick error terms produced by [`SpringDamperState::update`].
#[derive(Debug, Clone, Copy)]
pub struct CouplingErrors {
    /// Positional error `target − actual`
    pub pos_err: Vector3<f64>,
    /// Finite-difference rate of the positional error
    pub pos_err_rate: Vector3<f64>,
    /// Rotational error axis (zero vector when the angle is zero)
    pub axis: Vector3<f64>,
    /// Rotational error angle in `[0, π]`
    pub angle: f64,
    /// Axis of the rotational error's tick-to-tick delta
    pub rate_axis: Vector3<f64>,
    /// Angle of the rotational error's tick-to-tick delta
    pub rate_angle: f64,
}

/// Finite-difference history for one evaluation site of the coupling law.
#[derive(Debug, Clone)]
pub struct SpringDamperState {
    pos_err: Vector3<f64>,
    rot_err: Rotation3<f64>,
}

impl Default for SpringDamperState {
    fn default() -> Self {
        Self::new()
    }
}

impl SpringDamperState {
    /// Fresh state with zero positional error and identity rotation error.
    pub fn new() -> Self {
        Self {
            pos_err: Vector3::zeros(),
            rot_err: Rotation3::identity(),
        }
    }

    /// Compute this tick's errors and roll the history forward.
    ///
    /// With `dt <= 0` the positional error rate is zero rather than
    /// undefined.
    pub fn update(&mut self, target: &Pose, actual: &Pose, dt: f64) -> CouplingErrors {
        let pos_err = target.position - actual.position;
        let pos_err_rate = if dt > 0.0 {
            (pos_err - self.pos_err) / dt
        } else {
            Vector3::zeros()
        };

        let rot_err = actual.rotation.inverse() * target.rotation;
        let rot_err_delta = rot_err.inverse() * self.rot_err;

        self.pos_err = pos_err;
        self.rot_err = rot_err;

        let (axis, angle) = axis_angle(&rot_err);
        let (rate_axis, rate_angle) = axis_angle(&rot_err_delta);

        CouplingErrors {
            pos_err,
            pos_err_rate,
            axis,
            angle,
            rate_axis,
            rate_angle,
        }
    }
}

/// Which site of the coupling this instance evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Body,
    Device,
}

/// One evaluation site of the virtual coupling: spring-damper history plus
/// the two activation ramps for that site.
///
/// The body side pulls the simulated body toward the reference pose and
/// ramps its gains toward full activation (`1.0`). The device side pushes
/// the operator's hand back toward where the body actually is: the same
/// inner law, negated, under ramps that converge to the haptic gains
/// `K_lh`/`K_ah`.
///
/// Angular damping (`B_ac`) is intentionally not applied on either side;
/// see the crate README.
#[derive(Debug, Clone)]
pub struct VirtualCoupling {
    side: Side,
    spring: SpringDamperState,
    linear_ramp: GainRamp,
    angular_ramp: GainRamp,
}

impl VirtualCoupling {
    /// Body-side coupling: ramps climb to full activation.
    pub fn body_side() -> Self {
        Self {
            side: Side::Body,
            spring: SpringDamperState::new(),
            linear_ramp: GainRamp::new(1.0, constants::BODY_RAMP_CLIMB),
            angular_ramp: GainRamp::new(1.0, constants::BODY_RAMP_CLIMB),
        }
    }

    /// Device-side coupling: ramps climb to the haptic gains.
    pub fn device_side(gains: &CouplingGains) -> Self {
        Self {
            side: Side::Device,
            spring: SpringDamperState::new(),
            linear_ramp: GainRamp::new(gains.linear_haptic, constants::DEVICE_RAMP_CLIMB),
            angular_ramp: GainRamp::new(gains.angular_haptic, constants::DEVICE_RAMP_CLIMB),
        }
    }

    /// Evaluate the wrench for this tick.
    ///
    /// Body side: `F = K_lc_ramp · (K_lc·e_p + B_lc·ė_p)` and
    /// `τ = K_ac_ramp · K_ac · θ · axis` rotated into the world frame.
    /// Device side: the same inner expression under the device ramps,
    /// negated, in the device frame.
    pub fn wrench(&mut self, gains: &CouplingGains, target: &Pose, body: &Pose, dt: f64) -> Wrench {
        if self.side == Side::Device {
            // Haptic gains are adjustable mid-session; the ramps follow.
            self.linear_ramp.retarget(gains.linear_haptic);
            self.angular_ramp.retarget(gains.angular_haptic);
        }

        let e = self.spring.update(target, body, dt);
        let linear = gains.linear_stiffness * e.pos_err + gains.linear_damping * e.pos_err_rate;
        let angular = gains.angular_stiffness * e.angle * e.axis;

        match self.side {
            Side::Body => Wrench {
                force: self.linear_ramp.value() * linear,
                torque: body.rotation * (self.angular_ramp.value() * angular),
            },
            Side::Device => Wrench {
                force: -self.linear_ramp.value() * linear,
                torque: -self.angular_ramp.value() * angular,
            },
        }
    }

    /// Advance both ramps by `dt` seconds. Called after the wrench has
    /// been applied, so the ramp-in is visible one tick later.
    pub fn advance_ramps(&mut self, dt: f64) {
        self.linear_ramp.advance(dt);
        self.angular_ramp.advance(dt);
    }

    /// Jump both ramps to their targets (used by tests and scenarios that
    /// start mid-session).
    pub fn settle_ramps(&mut self) {
        self.linear_ramp.settle();
        self.angular_ramp.settle();
    }

    /// Current `(linear, angular)` ramp values.
    pub fn ramp_values(&self) -> (f64, f64) {
        (self.linear_ramp.value(), self.angular_ramp.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Unit;

    fn settled_body_coupling() -> VirtualCoupling {
        let mut coupling = VirtualCoupling::body_side();
        coupling.settle_ramps();
        coupling
    }

    #[test]
    fn test_axis_angle_identity_is_zero_vector() {
        let (axis, angle) = axis_angle(&Rotation3::identity());
        assert_eq!(axis, Vector3::zeros());
        assert_eq!(angle, 0.0);
    }

    #[test]
    fn test_axis_angle_recovers_rotation() {
        let axis = Unit::new_normalize(Vector3::new(0.0, 0.0, 1.0));
        let rot = Rotation3::from_axis_angle(&axis, 0.7);
        let (a, angle) = axis_angle(&rot);
        assert_relative_eq!(angle, 0.7, epsilon = 1e-12);
        assert_relative_eq!(a, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_identity_poses_produce_zero_wrench() {
        let mut coupling = settled_body_coupling();
        let gains = CouplingGains::default();
        let target = Pose::identity();
        let body = Pose::identity();

        let w = coupling.wrench(&gains, &target, &body, 0.001);
        assert!(w.is_zero());
    }

    #[test]
    fn test_unit_offset_body_force() {
        // Body displaced to (1,0,0) from a target at the origin, K_lc=200,
        // B_lc=0, ramp settled: force pulls the body back with (-200,0,0).
        let mut coupling = settled_body_coupling();
        let gains = CouplingGains {
            linear_stiffness: 200.0,
            linear_damping: 0.0,
            ..CouplingGains::default()
        };
        let target = Pose::identity();
        let body = Pose::new(Vector3::new(1.0, 0.0, 0.0), Rotation3::identity());

        let w = coupling.wrench(&gains, &target, &body, 0.001);
        assert_relative_eq!(w.force, Vector3::new(-200.0, 0.0, 0.0), epsilon = 1e-9);
        assert_eq!(w.torque, Vector3::zeros());
    }

    #[test]
    fn test_zero_angle_means_zero_torque_for_any_positions() {
        let mut coupling = settled_body_coupling();
        let gains = CouplingGains::default();
        let target = Pose::new(Vector3::new(0.3, -2.0, 5.0), Rotation3::identity());
        let body = Pose::new(Vector3::new(-4.0, 1.0, 0.25), Rotation3::identity());

        let w = coupling.wrench(&gains, &target, &body, 0.001);
        assert_eq!(w.torque, Vector3::zeros());
        assert!(w.force.norm() > 0.0);
    }

    #[test]
    fn test_body_torque_is_rotated_into_world_frame() {
        let mut coupling = settled_body_coupling();
        let gains = CouplingGains {
            linear_stiffness: 0.0,
            linear_damping: 0.0,
            angular_stiffness: 1.0,
            ..CouplingGains::default()
        };
        let body_rot = Rotation3::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2);
        let target_rot =
            body_rot * Rotation3::from_axis_angle(&Vector3::z_axis(), 0.5);
        let target = Pose::new(Vector3::zeros(), target_rot);
        let body = Pose::new(Vector3::zeros(), body_rot);

        let w = coupling.wrench(&gains, &target, &body, 0.001);
        // Error is 0.5 rad about body-frame z; world torque is that axis
        // carried through the body rotation.
        let expected = body_rot * Vector3::new(0.0, 0.0, 0.5);
        assert_relative_eq!(w.torque, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_device_wrench_is_negated_and_ramped() {
        let gains = CouplingGains::default();
        let mut coupling = VirtualCoupling::device_side(&gains);
        let target = Pose::new(Vector3::new(1.0, 0.0, 0.0), Rotation3::identity());
        let body = Pose::identity();

        // Ramps start at zero: no force yet.
        let w = coupling.wrench(&gains, &target, &body, 0.001);
        assert!(w.is_zero());

        // After settling, the force opposes the positional error.
        for _ in 0..20_000 {
            coupling.advance_ramps(0.01);
        }
        let mut state_reset = coupling.clone();
        // Re-evaluate with zero damping contribution by repeating the pose.
        let w = state_reset.wrench(&gains, &target, &body, 0.001);
        assert!(w.force.x < 0.0);
        assert_relative_eq!(
            w.force.x,
            -gains.linear_haptic * gains.linear_stiffness * 1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_damping_term_uses_error_rate() {
        let mut coupling = settled_body_coupling();
        let gains = CouplingGains {
            linear_stiffness: 0.0,
            linear_damping: 2.0,
            ..CouplingGains::default()
        };
        let target = Pose::identity();
        let body = Pose::identity();

        // First tick establishes history with zero error.
        coupling.wrench(&gains, &target, &body, 0.1);

        // Error jumps to (1,0,0) over 0.1s: rate is (10,0,0).
        let moved_target = Pose::new(Vector3::new(1.0, 0.0, 0.0), Rotation3::identity());
        let w = coupling.wrench(&gains, &moved_target, &body, 0.1);
        assert_relative_eq!(w.force, Vector3::new(20.0, 0.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_angular_damping_is_not_applied() {
        // B_ac huge; torque must not change.
        let gains_no_damp = CouplingGains {
            angular_damping: 0.0,
            ..CouplingGains::default()
        };
        let gains_damp = CouplingGains {
            angular_damping: 1e6,
            ..CouplingGains::default()
        };
        let target = Pose::new(
            Vector3::zeros(),
            Rotation3::from_axis_angle(&Vector3::x_axis(), 0.3),
        );
        let body = Pose::identity();

        let mut a = settled_body_coupling();
        let mut b = settled_body_coupling();
        let wa = a.wrench(&gains_no_damp, &target, &body, 0.001);
        let wb = b.wrench(&gains_damp, &target, &body, 0.001);
        assert_eq!(wa.torque, wb.torque);
    }

    #[test]
    fn test_device_ramp_follows_adjusted_gain() {
        let mut gains = CouplingGains::default();
        let mut coupling = VirtualCoupling::device_side(&gains);
        for _ in 0..20_000 {
            coupling.advance_ramps(0.01);
        }
        let (linear, _) = coupling.ramp_values();
        assert_relative_eq!(linear, gains.linear_haptic, epsilon = 1e-12);

        // Raising K_lh re-opens the ramp; it climbs from its current
        // value, not from zero.
        gains.linear_haptic = 0.04;
        coupling.wrench(&gains, &Pose::identity(), &Pose::identity(), 0.001);
        let (linear, _) = coupling.ramp_values();
        assert!(linear >= 0.02);
        coupling.advance_ramps(0.5);
        let (climbing, _) = coupling.ramp_values();
        assert!(climbing > linear);
        assert!(climbing < 0.04);
    }
}
