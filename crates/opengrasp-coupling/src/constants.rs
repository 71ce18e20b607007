//! Default gains, ramp rates, and adjustment step sizes.

/// Device-to-simulation position scale applied to device motion.
pub const DEFAULT_WORKSPACE_SCALE: f64 = 30.0;

/// Default linear haptic (device-side) gain, `K_lh`.
pub const DEFAULT_LINEAR_HAPTIC_GAIN: f64 = 0.02;

/// Default angular haptic (device-side) gain, `K_ah`.
pub const DEFAULT_ANGULAR_HAPTIC_GAIN: f64 = 0.03;

/// Default linear controller stiffness, `K_lc`.
pub const DEFAULT_LINEAR_STIFFNESS: f64 = 200.0;

/// Default angular controller stiffness, `K_ac`.
pub const DEFAULT_ANGULAR_STIFFNESS: f64 = 30.0;

/// Default linear controller damping, `B_lc`.
pub const DEFAULT_LINEAR_DAMPING: f64 = 5.0;

/// Default angular controller damping, `B_ac`.
pub const DEFAULT_ANGULAR_DAMPING: f64 = 3.0;

/// Body-side ramps climb at this fraction of their target per second.
pub const BODY_RAMP_CLIMB: f64 = 0.5;

/// Device-side ramps climb at this fraction of their target per second,
/// giving a multi-second force ramp-in after (re)connection.
pub const DEVICE_RAMP_CLIMB: f64 = 0.1;

/// Default jaw actuator angle, normalized.
pub const DEFAULT_JAW_ANGLE: f64 = 0.5;

/// Jaw actuator offset per button edge.
pub const JAW_STEP: f64 = 0.1;

/// Adjustment step sizes for the button- and key-driven gain controls.
pub mod steps {
    /// Linear stiffness step on a device button edge.
    pub const BTN_LINEAR_STIFFNESS: f64 = 10.0;
    /// Angular stiffness step on a device button edge.
    pub const BTN_ANGULAR_STIFFNESS: f64 = 1.0;
    /// Linear damping step on a device button edge.
    pub const BTN_LINEAR_DAMPING: f64 = 1.0;
    /// Angular damping step on a device button edge.
    pub const BTN_ANGULAR_DAMPING: f64 = 1.0;
    /// Linear haptic gain step on a device button edge.
    pub const BTN_LINEAR_HAPTIC: f64 = 5.0;
    /// Angular haptic gain step on a device button edge.
    pub const BTN_ANGULAR_HAPTIC: f64 = 1.0;

    /// Linear haptic gain step from the host control surface.
    pub const KEY_LINEAR_HAPTIC: f64 = 0.05;
    /// Angular haptic gain step from the host control surface.
    pub const KEY_ANGULAR_HAPTIC: f64 = 0.05;
    /// Linear stiffness step from the host control surface.
    pub const KEY_LINEAR_STIFFNESS: f64 = 50.0;
    /// Angular stiffness step from the host control surface.
    pub const KEY_ANGULAR_STIFFNESS: f64 = 1.0;
    /// Linear damping step from the host control surface.
    pub const KEY_LINEAR_DAMPING: f64 = 1.0;
    /// Angular damping step from the host control surface.
    pub const KEY_ANGULAR_DAMPING: f64 = 1.0;
}
