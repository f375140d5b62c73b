//! Robot configuration parameters
//!
//! Wiring (CAN addresses), drivebase geometry, behavior timing and the
//! autonomous selection.  Per-preset tuning tables are deliberately *not*
//! here: they are fixed recipes in [`crate::motor::preset`].

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::motor::{ActuatorId, CanId};

/// CAN address of every actuator role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanIdMap {
    pub drive_left: CanId,
    pub drive_left_follower: CanId,
    pub drive_right: CanId,
    pub drive_right_follower: CanId,
    pub digging_belt: CanId,
    pub leadscrew: CanId,
    pub digging_actuator: CanId,
    pub dumping_actuator: CanId,
    pub dumping_gate: CanId,
}

impl CanIdMap {
    pub fn get(&self, role: ActuatorId) -> CanId {
        match role {
            ActuatorId::DriveLeft => self.drive_left,
            ActuatorId::DriveLeftFollower => self.drive_left_follower,
            ActuatorId::DriveRight => self.drive_right,
            ActuatorId::DriveRightFollower => self.drive_right_follower,
            ActuatorId::DiggingBelt => self.digging_belt,
            ActuatorId::Leadscrew => self.leadscrew,
            ActuatorId::DiggingActuator => self.digging_actuator,
            ActuatorId::DumpingActuator => self.dumping_actuator,
            ActuatorId::DumpingGate => self.dumping_gate,
        }
    }
}

impl Default for CanIdMap {
    fn default() -> Self {
        // Ids are in 1..=62; `CanId::from_raw_unchecked` is only used for these literals.
        Self {
            drive_left: CanId::from_raw_unchecked(1),
            drive_left_follower: CanId::from_raw_unchecked(2),
            drive_right: CanId::from_raw_unchecked(3),
            drive_right_follower: CanId::from_raw_unchecked(4),
            digging_belt: CanId::from_raw_unchecked(5),
            leadscrew: CanId::from_raw_unchecked(6),
            digging_actuator: CanId::from_raw_unchecked(7),
            dumping_actuator: CanId::from_raw_unchecked(8),
            dumping_gate: CanId::from_raw_unchecked(9),
        }
    }
}

/// Drivebase geometry and the velocity-scalar feature flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrivebaseConfig {
    /// Apply the RPM → m/s conversion factor to drivebase encoders.
    pub apply_velocity_scalar: bool,
    /// Drive wheel radius in metres.
    pub wheel_radius_m: f64,
    /// Motor revolutions per wheel revolution.
    pub gearbox_ratio: f64,
    /// Follower controllers spin opposite to their leader.
    pub invert_followers: bool,
    /// Negate the right-side command (mirrored gearbox mounting).
    pub invert_right: bool,
}

impl Default for DrivebaseConfig {
    fn default() -> Self {
        Self {
            apply_velocity_scalar: true,
            wheel_radius_m: 0.1524, // 6 in
            gearbox_ratio: 10.71,
            invert_followers: false,
            invert_right: true,
        }
    }
}

/// A fixed-duration open-loop motion: `output` for `ticks` scheduler ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedMotion {
    /// Duty cycle in [-1, 1].
    pub output: f64,
    /// Duration in scheduler ticks.
    pub ticks: u32,
}

impl TimedMotion {
    fn validate(&self, what: &'static str) -> Result<()> {
        if self.ticks == 0 {
            warn!("config: {} has zero duration", what);
            return Err(Error::Config("timed motion duration must be non-zero"));
        }
        if !(-1.0..=1.0).contains(&self.output) {
            warn!("config: {} output {} outside [-1, 1]", what, self.output);
            return Err(Error::Config("timed motion output outside [-1, 1]"));
        }
        Ok(())
    }
}

/// Homing / initialization routines run once per process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingConfig {
    pub leadscrew: TimedMotion,
    pub dumping_actuator: TimedMotion,
    pub digging_actuator: TimedMotion,
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            // 250 ticks at 20 ms is 5 s.
            leadscrew: TimedMotion { output: -0.3, ticks: 250 },
            dumping_actuator: TimedMotion { output: -0.5, ticks: 200 },
            digging_actuator: TimedMotion { output: -0.5, ticks: 200 },
        }
    }
}

/// What to run on autonomous entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AutonomousChoice {
    #[default]
    DoNothing,
    OpenDumpingGate,
}

/// Top-level robot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Scheduler tick period in milliseconds (the external timer's period).
    pub tick_period_ms: u32,
    pub can_ids: CanIdMap,
    pub drivebase: DrivebaseConfig,
    pub homing: HomingConfig,
    /// Gate-open motion (gear servo clockwise).
    pub dumping_gate: TimedMotion,
    /// Stick/trigger deadband applied to gamepad axes.
    pub input_deadband: f64,
    /// Scale applied to the operator's belt trigger command.
    pub belt_scale: f64,
    pub autonomous: AutonomousChoice,
    /// Publish the diagnostics report every N ticks (0 = never).
    pub diagnostics_period_ticks: u32,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 20, // 50 Hz
            can_ids: CanIdMap::default(),
            drivebase: DrivebaseConfig::default(),
            homing: HomingConfig::default(),
            dumping_gate: TimedMotion { output: 1.0, ticks: 250 },
            input_deadband: 0.08,
            belt_scale: 0.8,
            autonomous: AutonomousChoice::DoNothing,
            diagnostics_period_ticks: 50,
        }
    }
}

impl RobotConfig {
    /// Parse from JSON and validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            warn!("config: JSON parse failed: {}", e);
            Error::Config("malformed config JSON")
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Compact binary encoding of the config blob.
    pub fn to_postcard(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|_| Error::Config("config encode failed"))
    }

    pub fn from_postcard(bytes: &[u8]) -> Result<Self> {
        let config: Self =
            postcard::from_bytes(bytes).map_err(|_| Error::Config("config blob corrupted"))?;
        config.validate()?;
        Ok(config)
    }

    /// Tick period in seconds.
    pub fn tick_secs(&self) -> f64 {
        f64::from(self.tick_period_ms) / 1000.0
    }

    /// Reject values that would make the control loop unsafe or the wiring ambiguous.
    pub fn validate(&self) -> Result<()> {
        if self.tick_period_ms == 0 {
            return Err(Error::Config("tick period must be non-zero"));
        }
        if self.drivebase.wheel_radius_m <= 0.0 || self.drivebase.gearbox_ratio <= 0.0 {
            return Err(Error::Config("drivebase geometry must be positive"));
        }
        if !(0.0..1.0).contains(&self.input_deadband) {
            return Err(Error::Config("input deadband must be in [0, 1)"));
        }
        if !(0.0..=1.0).contains(&self.belt_scale) {
            return Err(Error::Config("belt scale must be in [0, 1]"));
        }
        self.homing.leadscrew.validate("homing.leadscrew")?;
        self.homing.dumping_actuator.validate("homing.dumping_actuator")?;
        self.homing.digging_actuator.validate("homing.digging_actuator")?;
        self.dumping_gate.validate("dumping_gate")?;

        for (i, a) in ActuatorId::ALL.iter().enumerate() {
            for b in &ActuatorId::ALL[i + 1..] {
                let id = self.can_ids.get(*a);
                if id == self.can_ids.get(*b) {
                    return Err(Error::AddressCollision {
                        can_id: id,
                        existing: *a,
                        incoming: *b,
                    });
                }
            }
        }
        Ok(())
    }
}
