//! Haptic device model identification and per-model tuning.
//!
//! Device models differ in workspace size, button layout, and how much
//! force they tolerate. The model is parsed once from the driver-reported
//! model name at pairing time; everything downstream works from the
//! resulting [`DeviceTuning`], never from string matching.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

/// Maximum buttons tracked per device.
pub const MAX_BUTTONS: usize = 10;

/// Maximum devices a session will pair.
pub const MAX_DEVICES: usize = 10;

/// Specification reported by the device driver at enumeration time.
#[derive(Debug, Clone)]
pub struct DeviceSpec {
    /// Driver-reported model name
    pub model_name: String,
    /// Maximum stable spring stiffness the device can render, N/m
    pub max_linear_stiffness: f64,
    /// Maximum continuous force, N
    pub max_force: f64,
    /// Whether the device senses a gripper/pinch angle
    pub sensed_gripper: bool,
}

/// Recognized device models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceModel {
    /// Geomagic/SensAble PHANTOM Omni
    PhantomOmni,
    /// Novint Falcon
    Falcon,
    /// da Vinci master tool manipulator, left
    MtmLeft,
    /// da Vinci master tool manipulator, right
    MtmRight,
    /// Razer Hydra motion controller
    RazerHydra,
    /// Anything else: generic defaults
    Generic,
}

impl DeviceModel {
    /// Parse a driver-reported model name.
    ///
    /// Matching is exact on the strings the supported drivers report,
    /// including the hyphenated and un-hyphenated MTM spellings.
    pub fn from_model_name(name: &str) -> Self {
        match name {
            "PHANTOM Omni" => DeviceModel::PhantomOmni,
            "Falcon" => DeviceModel::Falcon,
            "MTM-L" | "MTML" => DeviceModel::MtmLeft,
            "MTM-R" | "MTMR" => DeviceModel::MtmRight,
            "Razer Hydra" => DeviceModel::RazerHydra,
            _ => DeviceModel::Generic,
        }
    }

    /// Whether this is either MTM arm.
    pub fn is_mtm(&self) -> bool {
        matches!(self, DeviceModel::MtmLeft | DeviceModel::MtmRight)
    }
}

/// Which buttons drive which behaviors for a device model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonMap {
    /// Primary action (workspace-recenter clutch, decrement in gain modes)
    pub primary: usize,
    /// Secondary action (camera clutch, increment in gain modes)
    pub secondary: usize,
    /// Advance to the next interaction mode
    pub mode_next: usize,
    /// Return to the previous interaction mode
    pub mode_prev: usize,
    /// Pinch button that enables force feedback, if the model has one
    pub pinch: Option<usize>,
}

impl Default for ButtonMap {
    fn default() -> Self {
        Self {
            primary: 0,
            secondary: 1,
            mode_next: 2,
            mode_prev: 3,
            pinch: None,
        }
    }
}

/// Per-model tuning applied at pairing time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceTuning {
    /// Device-to-simulation position scale
    pub workspace_scale: f64,
    /// Override for the linear haptic gain, if the model needs one
    pub linear_haptic_gain: Option<f64>,
    /// Override for the angular haptic gain, if the model needs one
    pub angular_haptic_gain: Option<f64>,
    /// Button layout
    pub buttons: ButtonMap,
    /// Whether force feedback starts enabled for this model
    pub force_feedback_on_start: bool,
    /// Seconds to keep the clutched pose pinned to the live device pose
    /// after session start
    pub settle_time_s: f64,
}

impl Default for DeviceTuning {
    fn default() -> Self {
        Self {
            workspace_scale: 30.0,
            linear_haptic_gain: None,
            angular_haptic_gain: None,
            buttons: ButtonMap::default(),
            force_feedback_on_start: true,
            settle_time_s: 1.0,
        }
    }
}

/// Look up the tuning for a device model.
pub fn tuning_for(model: DeviceModel) -> DeviceTuning {
    match model {
        DeviceModel::PhantomOmni => DeviceTuning {
            linear_haptic_gain: Some(0.01),
            angular_haptic_gain: Some(0.0),
            ..DeviceTuning::default()
        },
        DeviceModel::Falcon => DeviceTuning {
            linear_haptic_gain: Some(0.05),
            angular_haptic_gain: Some(0.0),
            buttons: ButtonMap {
                primary: 0,
                secondary: 2,
                mode_next: 3,
                mode_prev: 1,
                pinch: None,
            },
            ..DeviceTuning::default()
        },
        DeviceModel::MtmLeft | DeviceModel::MtmRight => DeviceTuning {
            workspace_scale: 10.0,
            linear_haptic_gain: Some(0.04),
            angular_haptic_gain: Some(0.0),
            buttons: ButtonMap {
                primary: 1,
                secondary: 2,
                mode_next: 3,
                mode_prev: 4,
                pinch: Some(0),
            },
            // MTMs render force only once the operator pinches in.
            force_feedback_on_start: false,
            ..DeviceTuning::default()
        },
        DeviceModel::RazerHydra => DeviceTuning {
            workspace_scale: 10.0,
            // Hydra pose estimates drift badly for the first seconds.
            settle_time_s: 5.0,
            ..DeviceTuning::default()
        },
        DeviceModel::Generic => DeviceTuning::default(),
    }
}
