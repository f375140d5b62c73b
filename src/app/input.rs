//! Gamepad snapshots handed to behaviors each tick.

/// Face and shoulder buttons as bits in [`GamepadState::buttons`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Button {
    A = 1 << 0,
    B = 1 << 1,
    X = 1 << 2,
    Y = 1 << 3,
    LeftBumper = 1 << 4,
    RightBumper = 1 << 5,
    Back = 1 << 6,
    Start = 1 << 7,
}

impl Button {
    pub const fn mask(self) -> u16 {
        self as u16
    }
}

/// One controller's axes (each in [-1, 1], triggers in [0, 1]) and buttons.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GamepadState {
    pub left_x: f64,
    pub left_y: f64,
    pub right_x: f64,
    pub right_y: f64,
    pub left_trigger: f64,
    pub right_trigger: f64,
    pub buttons: u16,
}

impl GamepadState {
    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons & button.mask() != 0
    }

    #[must_use]
    pub fn with_button(mut self, button: Button) -> Self {
        self.buttons |= button.mask();
        self
    }
}

/// Both driver-station controllers at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSnapshot {
    pub driver: GamepadState,
    pub operator: GamepadState,
}

/// Zero inside `band`, rescaled so the output still spans [-1, 1].
pub fn apply_deadband(value: f64, band: f64) -> f64 {
    if value.abs() <= band {
        0.0
    } else {
        let scaled = (value.abs() - band) / (1.0 - band);
        scaled.min(1.0).copysign(value)
    }
}
