//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade.  A dashboard or network adapter would implement the
//! same trait.

use log::{info, warn};

use crate::app::events::RobotEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`RobotEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &RobotEvent) {
        match event {
            RobotEvent::Started => info!("START | mode=Disabled"),
            RobotEvent::ModeEntered { from, to } => {
                info!("MODE | {:?} -> {:?}", from, to);
            }
            RobotEvent::BehaviorStarted(name) => info!("BEHAVIOR | {} started", name),
            RobotEvent::BehaviorPreempted { name, by } => {
                warn!("BEHAVIOR | {} preempted by {}", name, by);
            }
            RobotEvent::BehaviorCancelled(name) => info!("BEHAVIOR | {} cancelled", name),
            RobotEvent::BehaviorFinished(name) => info!("BEHAVIOR | {} finished", name),
            RobotEvent::ActuatorInitialized(role) => info!("INIT | {:?} initialized", role),
            RobotEvent::ConfigFaults { actuator, count } => {
                warn!("CONFIG | {:?}: {} setting(s) not applied", actuator, count);
            }
        }
    }
}
