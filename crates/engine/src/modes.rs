//! The shared interaction-mode state machine.
//!
//! One machine per session. Device buttons cycle it forward and backward;
//! every haptics tick dispatches on the current mode to decide what the
//! action buttons mean (clutching, jaw offsets, or gain adjustment).

/// The interaction modes, in cycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    /// Action buttons gate the camera and workspace clutches
    CameraClutch,
    /// Action buttons open/close the gripper jaw
    GripperJaw,
    /// Action buttons adjust linear controller stiffness (`K_lc`)
    LinearStiffness,
    /// Action buttons adjust angular controller stiffness (`K_ac`)
    AngularStiffness,
    /// Action buttons adjust linear controller damping (`B_lc`)
    LinearDamping,
    /// Action buttons adjust angular controller damping (`B_ac`)
    AngularDamping,
    /// Action buttons adjust the linear device gain (`K_lh`)
    LinearDeviceGain,
    /// Action buttons adjust the angular device gain (`K_ah`)
    AngularDeviceGain,
}

impl InteractionMode {
    /// All modes in their default cycle order.
    pub const ALL: [InteractionMode; 8] = [
        InteractionMode::CameraClutch,
        InteractionMode::GripperJaw,
        InteractionMode::LinearStiffness,
        InteractionMode::AngularStiffness,
        InteractionMode::LinearDamping,
        InteractionMode::AngularDamping,
        InteractionMode::LinearDeviceGain,
        InteractionMode::AngularDeviceGain,
    ];

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            InteractionMode::CameraClutch => "CAM_CLUTCH_CONTROL",
            InteractionMode::GripperJaw => "GRIPPER_JAW_CONTROL",
            InteractionMode::LinearStiffness => "CHANGE_CONT_LIN_GAIN",
            InteractionMode::AngularStiffness => "CHANGE_CONT_ANG_GAIN",
            InteractionMode::LinearDamping => "CHANGE_CONT_LIN_DAMP",
            InteractionMode::AngularDamping => "CHANGE_CONT_ANG_DAMP",
            InteractionMode::LinearDeviceGain => "CHANGE_DEV_LIN_GAIN",
            InteractionMode::AngularDeviceGain => "CHANGE_DEV_ANG_GAIN",
        }
    }
}

/// Ordered cyclic mode list with the transient status display state.
///
/// `next`/`previous` wrap modulo the mode count in both directions and
/// clear the status string and the latched clutch display flags, so stale
/// UI state never leaks across a mode change.
#[derive(Debug, Clone)]
pub struct InteractionModeMachine {
    modes: Vec<InteractionMode>,
    index: usize,
    status: String,
    camera_display: bool,
    clutch_display: bool,
}

impl Default for InteractionModeMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionModeMachine {
    /// Machine over the default eight modes.
    pub fn new() -> Self {
        Self::with_modes(InteractionMode::ALL.to_vec())
    }

    /// Machine over a custom mode list. An empty list falls back to the
    /// default set; the machine always has at least one mode.
    pub fn with_modes(modes: Vec<InteractionMode>) -> Self {
        let modes = if modes.is_empty() {
            InteractionMode::ALL.to_vec()
        } else {
            modes
        };
        Self {
            modes,
            index: 0,
            status: String::new(),
            camera_display: false,
            clutch_display: false,
        }
    }

    /// Current mode.
    pub fn current(&self) -> InteractionMode {
        self.modes[self.index.min(self.modes.len() - 1)]
    }

    /// Current mode index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of modes in the cycle.
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    /// Whether the cycle is empty (never true by construction).
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Advance to the next mode, wrapping at the end.
    pub fn next(&mut self) -> InteractionMode {
        self.index = (self.index + 1) % self.modes.len();
        self.reset_transient();
        self.current()
    }

    /// Return to the previous mode, wrapping below zero.
    pub fn previous(&mut self) -> InteractionMode {
        self.index = (self.index + self.modes.len() - 1) % self.modes.len();
        self.reset_transient();
        self.current()
    }

    /// Transient status line describing the last button action.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Set the status line.
    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Clear the status line.
    pub fn clear_status(&mut self) {
        self.status.clear();
    }

    /// Latch the camera-clutch display flag.
    pub fn set_camera_display(&mut self, held: bool) {
        self.camera_display = held;
    }

    /// Latch the workspace-clutch display flag.
    pub fn set_clutch_display(&mut self, held: bool) {
        self.clutch_display = held;
    }

    /// Latched camera-clutch display flag.
    pub fn camera_display(&self) -> bool {
        self.camera_display
    }

    /// Latched workspace-clutch display flag.
    pub fn clutch_display(&self) -> bool {
        self.clutch_display
    }

    fn reset_transient(&mut self) {
        self.status.clear();
        self.camera_display = false;
        self.clutch_display = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_cycle_has_eight_modes() {
        let machine = InteractionModeMachine::new();
        assert_eq!(machine.len(), 8);
        assert_eq!(machine.current(), InteractionMode::CameraClutch);
    }

    #[test]
    fn test_next_wraps_at_end() {
        let mut machine = InteractionModeMachine::new();
        for _ in 0..7 {
            machine.next();
        }
        assert_eq!(machine.current(), InteractionMode::AngularDeviceGain);
        assert_eq!(machine.next(), InteractionMode::CameraClutch);
        assert_eq!(machine.index(), 0);
    }

    #[test]
    fn test_previous_from_zero_wraps_to_last() {
        let mut machine = InteractionModeMachine::new();
        assert_eq!(machine.index(), 0);
        machine.previous();
        assert_eq!(machine.index(), 7);
        assert_eq!(machine.current(), InteractionMode::AngularDeviceGain);
    }

    #[test]
    fn test_single_mode_cycle() {
        let mut machine =
            InteractionModeMachine::with_modes(vec![InteractionMode::GripperJaw]);
        assert_eq!(machine.next(), InteractionMode::GripperJaw);
        assert_eq!(machine.previous(), InteractionMode::GripperJaw);
        assert_eq!(machine.index(), 0);
    }

    #[test]
    fn test_empty_mode_list_falls_back_to_default() {
        let machine = InteractionModeMachine::with_modes(Vec::new());
        assert_eq!(machine.len(), 8);
    }

    #[test]
    fn test_transition_clears_transient_state() {
        let mut machine = InteractionModeMachine::new();
        machine.set_status("Clutch Pressed");
        machine.set_camera_display(true);
        machine.set_clutch_display(true);

        machine.next();
        assert_eq!(machine.status(), "");
        assert!(!machine.camera_display());
        assert!(!machine.clutch_display());

        machine.set_status("K_lc = 210.0");
        machine.previous();
        assert_eq!(machine.status(), "");
    }

    proptest! {
        /// next then previous (and vice versa) restores the index, for
        /// any starting index and any mode count >= 1.
        #[test]
        fn next_previous_round_trip(count in 1usize..8, start in 0usize..64, steps in 0usize..16) {
            let modes: Vec<InteractionMode> = InteractionMode::ALL[..count].to_vec();
            let mut machine = InteractionModeMachine::with_modes(modes);
            for _ in 0..start {
                machine.next();
            }
            let origin = machine.index();

            for _ in 0..steps {
                machine.next();
            }
            for _ in 0..steps {
                machine.previous();
            }
            prop_assert_eq!(machine.index(), origin);

            machine.previous();
            machine.next();
            prop_assert_eq!(machine.index(), origin);
        }
    }
}
