//! Preset recipes.
//!
//! Each [`Preset`] selects one immutable [`MotorRecipe`]: which register
//! overrides to apply on top of [`DEFAULTS`], and which closed-loop gain
//! table to load.  Nothing here is computed at runtime; the one derived
//! value (drivebase velocity conversion) lives in the engine.

use core::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::app::ports::IdleMode;

/// Motor RPM → wheel surface speed, per metre of wheel radius.
pub const RPM_TO_MPS: f64 = 2.0 * PI / 60.0;

/// Actuator class selecting a configuration recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Preset {
    None,
    Drivebase,
    DiggingBelt,
    DiggingLeadscrew,
    DiggingActuator,
    Dumping,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Self::None,
        Self::Drivebase,
        Self::DiggingBelt,
        Self::DiggingLeadscrew,
        Self::DiggingActuator,
        Self::Dumping,
    ];

    pub const fn recipe(self) -> &'static MotorRecipe {
        match self {
            Self::None => &NONE,
            Self::Drivebase => &DRIVEBASE,
            Self::DiggingBelt => &DIGGING_BELT,
            Self::DiggingLeadscrew => &DIGGING_LEADSCREW,
            Self::DiggingActuator => &DIGGING_ACTUATOR,
            Self::Dumping => &DUMPING,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Recipe records
// ═══════════════════════════════════════════════════════════════

/// Smart current limit pair (amps).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentLimit {
    pub stall_amps: u16,
    pub free_amps: u16,
}

/// Settings written to every controller right after the factory reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseSettings {
    pub ramp_rate_secs: f64,
    pub idle_mode: IdleMode,
    pub current_limit: CurrentLimit,
    pub secondary_current_limit_amps: f64,
}

pub const DEFAULTS: BaseSettings = BaseSettings {
    ramp_rate_secs: 0.1,
    idle_mode: IdleMode::Coast,
    current_limit: CurrentLimit {
        stall_amps: 40,
        free_amps: 40,
    },
    secondary_current_limit_amps: 60.0,
};

/// Smart Motion profile limits (slot 0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmartMotion {
    pub max_velocity: f64,
    pub max_accel: f64,
    pub min_output_velocity: f64,
    pub allowed_error: f64,
}

/// Closed-loop gain table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub smart_motion: Option<SmartMotion>,
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub izone: f64,
    pub ff: f64,
    pub output_min: f64,
    pub output_max: f64,
}

/// Per-preset overrides.  `None` fields keep the [`DEFAULTS`] value.
///
/// Overrides are applied in field order: current limit, secondary current
/// limit, ramp rate, idle mode, inversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorRecipe {
    pub current_limit: Option<CurrentLimit>,
    pub secondary_current_limit_amps: Option<f64>,
    pub ramp_rate_secs: Option<f64>,
    pub idle_mode: Option<IdleMode>,
    pub inverted: Option<bool>,
    /// Encoder gets the RPM → m/s conversion when the feature flag is on.
    pub velocity_scalar: bool,
    pub gains: Option<PidGains>,
}

impl MotorRecipe {
    pub const fn has_overrides(&self) -> bool {
        self.current_limit.is_some()
            || self.secondary_current_limit_amps.is_some()
            || self.ramp_rate_secs.is_some()
            || self.idle_mode.is_some()
            || self.inverted.is_some()
    }
}

const NONE: MotorRecipe = MotorRecipe {
    current_limit: None,
    secondary_current_limit_amps: None,
    ramp_rate_secs: None,
    idle_mode: None,
    inverted: None,
    velocity_scalar: false,
    gains: None,
};

const DRIVEBASE: MotorRecipe = MotorRecipe {
    current_limit: Some(CurrentLimit {
        stall_amps: 60,
        free_amps: 40,
    }),
    secondary_current_limit_amps: Some(80.0),
    ramp_rate_secs: Some(0.25),
    idle_mode: Some(IdleMode::Brake),
    inverted: None,
    velocity_scalar: true,
    gains: Some(PidGains {
        // m/s and m/s² once the velocity scalar is applied
        smart_motion: Some(SmartMotion {
            max_velocity: 2.0,
            max_accel: 1.5,
            min_output_velocity: 0.0,
            allowed_error: 0.02,
        }),
        p: 6e-5,
        i: 1e-6,
        d: 0.0,
        izone: 0.0,
        ff: 1.8e-4,
        output_min: -1.0,
        output_max: 1.0,
    }),
};

const DIGGING_BELT: MotorRecipe = MotorRecipe {
    current_limit: Some(CurrentLimit {
        stall_amps: 40,
        free_amps: 30,
    }),
    secondary_current_limit_amps: Some(55.0),
    ramp_rate_secs: None,
    idle_mode: None,
    inverted: Some(true),
    velocity_scalar: false,
    gains: Some(PidGains {
        smart_motion: Some(SmartMotion {
            max_velocity: 3000.0,
            max_accel: 2000.0,
            min_output_velocity: 0.0,
            allowed_error: 10.0,
        }),
        p: 1e-4,
        i: 0.0,
        d: 0.0,
        izone: 0.0,
        ff: 1.9e-4,
        output_min: -1.0,
        output_max: 1.0,
    }),
};

const DIGGING_LEADSCREW: MotorRecipe = MotorRecipe {
    current_limit: Some(CurrentLimit {
        stall_amps: 30,
        free_amps: 20,
    }),
    secondary_current_limit_amps: Some(40.0),
    ramp_rate_secs: None,
    idle_mode: Some(IdleMode::Brake),
    inverted: Some(false),
    velocity_scalar: false,
    gains: Some(PidGains {
        smart_motion: Some(SmartMotion {
            max_velocity: 4000.0,
            max_accel: 3000.0,
            min_output_velocity: 0.0,
            allowed_error: 0.5,
        }),
        p: 5e-5,
        i: 0.0,
        d: 0.0,
        izone: 0.0,
        ff: 1.6e-4,
        output_min: -0.8,
        output_max: 0.8,
    }),
};

const DIGGING_ACTUATOR: MotorRecipe = MotorRecipe {
    gains: Some(PidGains {
        smart_motion: None,
        p: 1.2,
        i: 0.0,
        d: 0.1,
        izone: 0.0,
        ff: 0.0,
        output_min: -1.0,
        output_max: 1.0,
    }),
    ..NONE
};

const DUMPING: MotorRecipe = NONE;
