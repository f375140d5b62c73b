//! Outbound application events.
//!
//! The [`RobotService`](super::service::RobotService) and the
//! [`BehaviorScheduler`](crate::scheduler::BehaviorScheduler) emit these
//! through the [`EventSink`](super::ports::EventSink) port.

use crate::motor::ActuatorId;

use super::mode::OperatingMode;

#[derive(Debug, Clone, PartialEq)]
pub enum RobotEvent {
    /// The service has started (always in Disabled).
    Started,

    /// A mode-entry transition ran.
    ModeEntered {
        from: OperatingMode,
        to: OperatingMode,
    },

    /// A behavior was accepted and its `start` ran.
    BehaviorStarted(&'static str),

    /// A behavior was stopped because another one claimed its actuators.
    BehaviorPreempted {
        name: &'static str,
        by: &'static str,
    },

    /// A behavior was cancelled by mode entry or an explicit cancel.
    BehaviorCancelled(&'static str),

    /// A behavior completed normally and was retired.
    BehaviorFinished(&'static str),

    /// An actuator's initialization flag was latched.
    ActuatorInitialized(ActuatorId),

    /// Configuration of an actuator left some settings unapplied.
    ConfigFaults { actuator: ActuatorId, count: usize },
}
