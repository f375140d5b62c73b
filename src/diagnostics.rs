//! Runtime diagnostics.
//!
//! A [`DiagnosticsReport`] is a point-in-time view of every attached
//! actuator: which configuration writes did not land, how many runtime
//! writes have failed, and whether the role has been initialized.  The
//! service publishes it as JSON through the telemetry sink; nothing here
//! touches the bus.

use serde::Serialize;

use crate::app::mode::OperatingMode;
use crate::app::ports::MotorController;
use crate::error::{Error, Result, TransportFault};
use crate::motor::engine::ConfigStep;
use crate::motor::preset::Preset;
use crate::motor::{ActuatorId, Actuators, CanId};

/// Configuration steps listed per actuator; the total is always reported.
const MAX_LISTED_FAILURES: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct ActuatorDiagnostics {
    pub role: ActuatorId,
    pub can_id: CanId,
    pub preset: Preset,
    pub initialized: bool,
    pub commanded_output: f64,
    /// Failed configuration writes, including overflowed ones.
    pub config_failures: usize,
    pub failed_steps: heapless::Vec<ConfigStep, MAX_LISTED_FAILURES>,
    pub runtime_faults: u32,
    pub last_fault: Option<TransportFault>,
}

impl ActuatorDiagnostics {
    pub fn is_healthy(&self) -> bool {
        self.config_failures == 0 && self.runtime_faults == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    pub tick: u64,
    pub mode: OperatingMode,
    pub active_behaviors: usize,
    pub actuators: heapless::Vec<ActuatorDiagnostics, { ActuatorId::COUNT }>,
}

impl DiagnosticsReport {
    pub fn collect<D: MotorController>(
        tick: u64,
        mode: OperatingMode,
        active_behaviors: usize,
        actuators: &Actuators<D>,
    ) -> Self {
        let mut report = Self {
            tick,
            mode,
            active_behaviors,
            actuators: heapless::Vec::new(),
        };
        for motor in actuators.iter() {
            let state = motor.configured_state();
            let mut failed_steps = heapless::Vec::new();
            for failure in state.failures() {
                if failed_steps.push(failure.step).is_err() {
                    break;
                }
            }
            // One entry per role, so the table cannot overflow.
            let _ = report.actuators.push(ActuatorDiagnostics {
                role: motor.role(),
                can_id: motor.can_id(),
                preset: motor.preset(),
                initialized: motor.is_initialized(),
                commanded_output: motor.commanded_output(),
                config_failures: state.failure_count(),
                failed_steps,
                runtime_faults: motor.fault_count(),
                last_fault: motor.last_fault(),
            });
        }
        report
    }

    /// Actuators with any configuration or runtime failure.
    pub fn unhealthy(&self) -> impl Iterator<Item = &ActuatorDiagnostics> {
        self.actuators.iter().filter(|a| !a.is_healthy())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|_| Error::Config("diagnostics encode failed"))
    }
}
