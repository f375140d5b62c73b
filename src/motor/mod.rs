//! Motor-controller facades.
//!
//! ```text
//!   Behavior ──▶ Motor (role, init flag, runtime faults)
//!                  │
//!                  ▼
//!              PresetEngine (recipe writes, cached encoder/PID/analog)
//!                  │
//!                  ▼
//!              MotorController port (CAN transport)
//! ```
//!
//! A [`Motor`] is built once per physical controller.  Construction runs the
//! preset configuration sequence; the returned facade is what behaviors
//! command.  The set of facades lives in [`registry::Actuators`], which
//! guarantees bus addresses are unique.

pub mod engine;
pub mod preset;
pub mod registry;

use core::fmt;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::MotorController;
use crate::config::DrivebaseConfig;
use crate::error::{Error, Result, Status, TransportFault};

use engine::{ConfiguredState, PresetEngine};
use preset::Preset;

pub use registry::Actuators;

// ---------------------------------------------------------------------------
// Bus address
// ---------------------------------------------------------------------------

/// CAN bus address of one motor controller (SPARK MAX range 1..=62).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CanId(u8);

impl CanId {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 62;

    pub fn new(raw: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&raw) {
            Ok(Self(raw))
        } else {
            Err(Error::InvalidCanId(raw))
        }
    }

    /// For compile-time literals known to be in range.
    pub(crate) const fn from_raw_unchecked(raw: u8) -> Self {
        debug_assert!(raw >= Self::MIN && raw <= Self::MAX);
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for CanId {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self> {
        Self::new(raw)
    }
}

impl From<CanId> for u8 {
    fn from(id: CanId) -> Self {
        id.0
    }
}

impl fmt::Display for CanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Actuator roles
// ---------------------------------------------------------------------------

/// Logical role of a motor controller on the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActuatorId {
    DriveLeft = 0,
    DriveLeftFollower = 1,
    DriveRight = 2,
    DriveRightFollower = 3,
    DiggingBelt = 4,
    Leadscrew = 5,
    DiggingActuator = 6,
    DumpingActuator = 7,
    DumpingGate = 8,
}

impl ActuatorId {
    /// Total number of roles; sizes the registry array.
    pub const COUNT: usize = 9;

    pub const ALL: [ActuatorId; Self::COUNT] = [
        Self::DriveLeft,
        Self::DriveLeftFollower,
        Self::DriveRight,
        Self::DriveRightFollower,
        Self::DiggingBelt,
        Self::Leadscrew,
        Self::DiggingActuator,
        Self::DumpingActuator,
        Self::DumpingGate,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bit used in [`crate::behavior::Requirements`].
    pub const fn mask(self) -> u16 {
        1 << (self as u8)
    }

    /// Preset each role is wired with.
    pub const fn preset(self) -> Preset {
        match self {
            Self::DriveLeft
            | Self::DriveLeftFollower
            | Self::DriveRight
            | Self::DriveRightFollower => Preset::Drivebase,
            Self::DiggingBelt => Preset::DiggingBelt,
            Self::Leadscrew => Preset::DiggingLeadscrew,
            Self::DiggingActuator => Preset::DiggingActuator,
            Self::DumpingActuator | Self::DumpingGate => Preset::Dumping,
        }
    }
}

// ---------------------------------------------------------------------------
// Motor facade
// ---------------------------------------------------------------------------

/// Role-aware facade over one configured motor controller.
pub struct Motor<D: MotorController> {
    role: ActuatorId,
    engine: PresetEngine<D>,
    /// Set once by the role's initialization behavior; never cleared.
    initialized: bool,
    fault_count: u32,
    last_fault: Option<TransportFault>,
}

impl<D: MotorController> Motor<D> {
    /// Build the facade and run the preset configuration sequence.
    ///
    /// Transport faults during configuration do not fail construction;
    /// inspect [`Motor::configured_state`] for what did not apply.
    pub fn new(role: ActuatorId, device: D, preset: Preset, drivebase: DrivebaseConfig) -> Self {
        let mut engine = PresetEngine::new(device, preset, drivebase);
        let state = engine.configure();
        if state.is_clean() {
            info!("{:?}: configured as {:?} on CAN {}", role, preset, state.can_id);
        } else {
            warn!(
                "{:?}: configured as {:?} on CAN {} with {} failed write(s)",
                role,
                preset,
                state.can_id,
                state.failure_count()
            );
        }
        Self {
            role,
            engine,
            initialized: false,
            fault_count: 0,
            last_fault: None,
        }
    }

    pub fn role(&self) -> ActuatorId {
        self.role
    }

    pub fn can_id(&self) -> CanId {
        self.engine.can_id()
    }

    pub fn preset(&self) -> Preset {
        self.engine.preset()
    }

    /// Outcome of the most recent configuration pass.
    pub fn configured_state(&self) -> &ConfiguredState {
        self.engine.state()
    }

    /// Re-run the register writes; cached sub-resources are not rebuilt.
    pub fn reconfigure(&mut self) -> &ConfiguredState {
        self.engine.configure()
    }

    /// Command open-loop duty cycle, clamped to [-1, 1].
    pub fn set(&mut self, output: f64) {
        let status = self.engine.set_output(output);
        self.record(status);
    }

    pub fn stop(&mut self) {
        self.set(0.0);
    }

    /// Last commanded duty cycle (whether or not the write landed).
    pub fn commanded_output(&self) -> f64 {
        self.engine.commanded_output()
    }

    /// Follow `leader`; the follower is zeroed before the follow frame is sent.
    pub fn follow(&mut self, leader: CanId, invert: bool) -> Status {
        let status = self.engine.follow(leader, invert);
        self.record(status);
        status
    }

    pub fn encoder(&mut self) -> &mut D::Encoder {
        self.engine.encoder()
    }

    pub fn closed_loop(&mut self) -> &mut D::ClosedLoop {
        self.engine.closed_loop()
    }

    /// Absolute-mode analog sensor input.
    pub fn analog_sensor(&mut self) -> &mut D::Analog {
        self.engine.analog()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Latch the initialization flag.  Returns `true` if this call set it.
    pub fn mark_initialized(&mut self) -> bool {
        if self.initialized {
            return false;
        }
        self.initialized = true;
        info!("{:?}: initialized", self.role);
        true
    }

    /// Runtime (post-configuration) transport faults seen so far.
    pub fn fault_count(&self) -> u32 {
        self.fault_count
    }

    pub fn last_fault(&self) -> Option<TransportFault> {
        self.last_fault
    }

    fn record(&mut self, status: Status) {
        if let Err(fault) = status {
            self.fault_count = self.fault_count.saturating_add(1);
            if self.last_fault != Some(fault) {
                warn!("{:?}: CAN {} write failed: {}", self.role, self.can_id(), fault);
            }
            self.last_fault = Some(fault);
        }
    }
}
