//! Port traits: the hexagonal boundary between the control core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ RobotService (domain)
//! ```
//!
//! The CAN transport implements [`CanTransport`] / [`MotorController`] and
//! the sub-resource handles; the driver station side implements
//! [`InputPort`] and [`ModeSource`]; the dashboard implements
//! [`TelemetrySink`].  Every motor-controller call returns a
//! [`Status`]; the core never assumes a write landed.

use serde::{Deserialize, Serialize};

use crate::error::{Status, TransportFault};
use crate::motor::CanId;

use super::events::RobotEvent;
use super::input::InputSnapshot;
use super::mode::OperatingMode;

// ───────────────────────────────────────────────────────────────
// Device parameter types
// ───────────────────────────────────────────────────────────────

/// What the controller does with zero output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdleMode {
    Coast,
    Brake,
}

/// How the analog input is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogMode {
    Absolute,
    /// Position counts from the reading at the time the handle was opened.
    Relative,
}

/// Closed-loop parameter addressed by [`ClosedLoopPort::set_param`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PidParam {
    SmartMotionMaxVelocity,
    SmartMotionMaxAccel,
    SmartMotionMinOutputVelocity,
    SmartMotionAllowedError,
    P,
    I,
    D,
    IZone,
    FeedForward,
}

// ───────────────────────────────────────────────────────────────
// Motor controller (driven adapter: domain → CAN)
// ───────────────────────────────────────────────────────────────

/// Raw register-level access to one motor controller.
pub trait MotorController {
    type Encoder: EncoderPort;
    type ClosedLoop: ClosedLoopPort;
    type Analog: AnalogPort;

    /// Bus address this handle talks to.
    fn can_id(&self) -> CanId;

    fn restore_factory_defaults(&mut self) -> Status;

    /// Open-loop duty cycle in [-1, 1].
    fn set_output(&mut self, value: f64) -> Status;

    fn set_idle_mode(&mut self, mode: IdleMode) -> Status;

    /// Open-loop ramp: seconds from neutral to full output.
    fn set_ramp_rate(&mut self, secs: f64) -> Status;

    /// Smart current limit (stall / free-speed amps).
    fn set_current_limit(&mut self, stall_amps: u16, free_amps: u16) -> Status;

    /// Instantaneous hard current limit.
    fn set_secondary_current_limit(&mut self, amps: f64) -> Status;

    fn set_inverted(&mut self, inverted: bool) -> Status;

    /// Obtain the integrated encoder handle.
    fn encoder(&mut self) -> Self::Encoder;

    /// Obtain the on-board closed-loop controller handle.
    fn closed_loop(&mut self) -> Self::ClosedLoop;

    /// Obtain the analog input handle.
    fn analog(&mut self, mode: AnalogMode) -> Self::Analog;

    /// Mirror the output of the controller at `leader`.
    fn follow(&mut self, leader: CanId, invert: bool) -> Status;
}

pub trait EncoderPort {
    fn set_velocity_conversion_factor(&mut self, factor: f64) -> Status;
    fn velocity_conversion_factor(&mut self) -> Result<f64, TransportFault>;
    fn set_position(&mut self, position: f64) -> Status;
    fn position(&mut self) -> Result<f64, TransportFault>;
    fn velocity(&mut self) -> Result<f64, TransportFault>;
}

pub trait ClosedLoopPort {
    fn set_param(&mut self, param: PidParam, value: f64, slot: u8) -> Status;
    fn set_output_range(&mut self, min: f64, max: f64, slot: u8) -> Status;
}

pub trait AnalogPort {
    fn voltage(&mut self) -> Result<f64, TransportFault>;
    fn position(&mut self) -> Result<f64, TransportFault>;
}

/// Opens motor-controller handles on a bus.
pub trait CanTransport {
    type Device: MotorController;

    fn open(&mut self, can_id: CanId) -> Self::Device;
}

// ───────────────────────────────────────────────────────────────
// Driver station (driving adapters: outside → domain)
// ───────────────────────────────────────────────────────────────

/// Human input devices, sampled once per tick.
pub trait InputPort {
    fn poll(&mut self) -> InputSnapshot;
}

/// Authoritative operating mode from field / operator control.
pub trait ModeSource {
    fn current_mode(&mut self) -> OperatingMode;
}

/// Monotonic clock.  Used for telemetry only; control timing is tick-counted.
pub trait TimePort {
    fn timestamp_secs(&self) -> f64;
}

// ───────────────────────────────────────────────────────────────
// Outputs (driven adapters: domain → dashboard / log)
// ───────────────────────────────────────────────────────────────

/// Fire-and-forget dashboard values.  Implementations swallow their own failures.
pub trait TelemetrySink {
    fn publish_number(&mut self, key: &'static str, value: f64);

    fn publish_text(&mut self, key: &'static str, value: &str) {
        let _ = (key, value);
    }
}

/// Structured [`RobotEvent`]s; adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &RobotEvent);
}
