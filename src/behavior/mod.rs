//! Behavior units: resumable control routines run by the scheduler.
//!
//! ```text
//!   Idle ──schedule──▶ Active ──is_finished──▶ stop(false) ──▶ Finished
//!                        │
//!                        └──preempt / cancel──▶ stop(true) ──▶ Finished
//! ```
//!
//! A unit declares the actuators it needs exclusively as [`Requirements`].
//! The scheduler hands it a [`Claim`] limited to those actuators, so a unit
//! cannot command a motor it does not hold.

pub mod drive;
pub mod dumping;
pub mod homing;

use log::warn;

use crate::app::input::InputSnapshot;
use crate::app::ports::MotorController;
use crate::motor::{ActuatorId, Actuators, Motor};

pub use drive::{DriveControl, OperatorControl};
pub use dumping::OpenDumpingGate;
pub use homing::HomeActuator;

/// Index of a registered unit in the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BehaviorId(pub(crate) usize);

impl BehaviorId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Registered, never scheduled.
    Idle,
    Active,
    /// Retired by completion, preemption or cancellation.
    Finished,
}

// ---------------------------------------------------------------------------
// Requirements
// ---------------------------------------------------------------------------

/// Set of actuators, one bit per [`ActuatorId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Requirements(u16);

impl Requirements {
    pub const NONE: Self = Self(0);

    pub const fn of(roles: &[ActuatorId]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < roles.len() {
            bits |= roles[i].mask();
            i += 1;
        }
        Self(bits)
    }

    #[must_use]
    pub const fn with(self, role: ActuatorId) -> Self {
        Self(self.0 | role.mask())
    }

    pub const fn contains(self, role: ActuatorId) -> bool {
        self.0 & role.mask() != 0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub fn iter(self) -> impl Iterator<Item = ActuatorId> {
        ActuatorId::ALL.into_iter().filter(move |r| self.contains(*r))
    }
}

// ---------------------------------------------------------------------------
// Execution context
// ---------------------------------------------------------------------------

/// Mutable access to the actuators a unit holds, and nothing else.
pub struct Claim<'a, D: MotorController> {
    actuators: &'a mut Actuators<D>,
    held: Requirements,
}

impl<'a, D: MotorController> Claim<'a, D> {
    pub(crate) fn new(actuators: &'a mut Actuators<D>, held: Requirements) -> Self {
        Self { actuators, held }
    }

    pub fn held(&self) -> Requirements {
        self.held
    }

    /// The facade for `role`, if held and attached.
    pub fn motor(&mut self, role: ActuatorId) -> Option<&mut Motor<D>> {
        if !self.held.contains(role) {
            warn!("{:?} used without holding it", role);
            return None;
        }
        self.actuators.get_mut(role)
    }

    /// Command `role` if it is held; otherwise a no-op.
    pub fn set(&mut self, role: ActuatorId, output: f64) {
        if let Some(motor) = self.motor(role) {
            motor.set(output);
        }
    }

    /// Zero every held actuator.
    pub fn stop_all(&mut self) {
        for role in self.held.iter() {
            if let Some(motor) = self.actuators.get_mut(role) {
                motor.stop();
            }
        }
    }
}

/// What a unit sees during `step`.
pub struct BehaviorContext<'a, D: MotorController> {
    pub claim: Claim<'a, D>,
    pub input: &'a InputSnapshot,
}

// ---------------------------------------------------------------------------
// Behavior trait
// ---------------------------------------------------------------------------

/// Four-phase lifecycle driven by [`crate::scheduler::BehaviorScheduler`].
///
/// `step` must not block.  `stop` must leave every held actuator safe and
/// be callable more than once.
pub trait Behavior<D: MotorController> {
    fn name(&self) -> &'static str;

    /// Actuators held exclusively while active.
    fn requirements(&self) -> Requirements;

    /// Actuators whose initialization flag is latched on normal completion.
    fn initializes(&self) -> Requirements {
        Requirements::NONE
    }

    /// Reset progress.  Called on every activation.
    fn start(&mut self, claim: &mut Claim<'_, D>);

    fn step(&mut self, ctx: &mut BehaviorContext<'_, D>);

    /// Pure predicate over progress.
    fn is_finished(&self) -> bool;

    fn stop(&mut self, claim: &mut Claim<'_, D>, interrupted: bool);
}
