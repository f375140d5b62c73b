//! Application service: the mode-gated core.
//!
//! [`RobotService`] owns the actuator set, the behavior scheduler and the
//! registered units.  Mode entry decides which units run; every tick polls
//! input, applies button bindings, advances the scheduler and publishes
//! telemetry.  All I/O flows through port traits injected at call sites.
//!
//! ```text
//!  ModeSource ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!   InputPort ──▶ │       RobotService        │ ──▶ TelemetrySink
//!                 │  mode gate · scheduler    │
//!                 └────────────┬─────────────┘
//!                              ▼
//!                     Actuators (CAN transport)
//! ```

use log::{debug, info, warn};

use crate::behavior::{
    BehaviorId, DriveControl, HomeActuator, OpenDumpingGate, OperatorControl,
};
use crate::config::{AutonomousChoice, RobotConfig};
use crate::diagnostics::DiagnosticsReport;
use crate::error::{Error, Result};
use crate::motor::{ActuatorId, Actuators};
use crate::scheduler::BehaviorScheduler;

use super::events::RobotEvent;
use super::input::Button;
use super::mode::OperatingMode;
use super::ports::{
    CanTransport, EventSink, InputPort, ModeSource, MotorController, TelemetrySink, TimePort,
};

/// Round `value` to `places` decimal places.
pub fn round_to_place(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Open every role's controller on `bus`, configure it with the role's
/// preset, and bind the drivebase followers.
///
/// A follower that fails to bind is logged and left free-running at zero.
pub fn wire_actuators<T: CanTransport>(
    bus: &mut T,
    config: &RobotConfig,
) -> Result<Actuators<T::Device>> {
    config.validate()?;
    let mut actuators = Actuators::new();
    for role in ActuatorId::ALL {
        let device = bus.open(config.can_ids.get(role));
        actuators.attach(role, device, role.preset(), config.drivebase)?;
    }

    let invert = config.drivebase.invert_followers;
    for (follower, leader) in [
        (ActuatorId::DriveLeftFollower, ActuatorId::DriveLeft),
        (ActuatorId::DriveRightFollower, ActuatorId::DriveRight),
    ] {
        match actuators.bind_follower(follower, leader, invert) {
            Ok(()) => {}
            Err(Error::Transport(fault)) => {
                warn!("{:?}: follow {:?} failed: {}", follower, leader, fault);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(actuators)
}

/// Ids of the units the service registers at construction.
#[derive(Debug, Clone, Copy)]
pub struct BehaviorIds {
    pub drive: BehaviorId,
    pub operator: BehaviorId,
    pub init_leadscrew: BehaviorId,
    pub init_dumping_actuator: BehaviorId,
    pub init_digging_actuator: BehaviorId,
    pub open_dumping_gate: BehaviorId,
}

// ───────────────────────────────────────────────────────────────
// RobotService
// ───────────────────────────────────────────────────────────────

pub struct RobotService<D: MotorController> {
    config: RobotConfig,
    actuators: Actuators<D>,
    scheduler: BehaviorScheduler<D>,
    ids: BehaviorIds,
    autonomous: Option<BehaviorId>,
    mode: OperatingMode,
    /// Dashboard live-tuning feedback; switched off on Test entry.
    live_feedback: bool,
    tick_count: u64,
    /// Operator buttons seen on the previous tick, for edge detection.
    last_operator_buttons: u16,
}

impl<D: MotorController + 'static> RobotService<D> {
    /// Register the robot's behavior units over an already-wired actuator set.
    ///
    /// Fails if the config is invalid or a unit requires a role that is
    /// not attached.  Starts in Disabled; call [`start`](Self::start) next.
    pub fn new(config: RobotConfig, actuators: Actuators<D>) -> Result<Self> {
        config.validate()?;
        let mut scheduler = BehaviorScheduler::new();

        let ids = BehaviorIds {
            drive: scheduler.register(Box::new(DriveControl::new(
                config.input_deadband,
                config.drivebase.invert_right,
            )))?,
            operator: scheduler.register(Box::new(OperatorControl::new(
                config.input_deadband,
                config.belt_scale,
            )))?,
            init_leadscrew: scheduler
                .register(Box::new(HomeActuator::leadscrew(config.homing.leadscrew)))?,
            init_dumping_actuator: scheduler.register(Box::new(
                HomeActuator::dumping_actuator(config.homing.dumping_actuator),
            ))?,
            init_digging_actuator: scheduler.register(Box::new(
                HomeActuator::digging_actuator(config.homing.digging_actuator),
            ))?,
            open_dumping_gate: scheduler
                .register(Box::new(OpenDumpingGate::new(config.dumping_gate)))?,
        };

        for id in scheduler.ids() {
            for role in scheduler.requirements(id).into_iter().flat_map(|r| r.iter()) {
                actuators.require(role)?;
            }
        }

        let autonomous = match config.autonomous {
            AutonomousChoice::DoNothing => None,
            AutonomousChoice::OpenDumpingGate => Some(ids.open_dumping_gate),
        };

        Ok(Self {
            config,
            actuators,
            scheduler,
            ids,
            autonomous,
            mode: OperatingMode::Disabled,
            live_feedback: true,
            tick_count: 0,
            last_operator_buttons: 0,
        })
    }

    /// Open and configure every role on `bus`, then build the service.
    pub fn from_transport<T>(config: RobotConfig, bus: &mut T) -> Result<Self>
    where
        T: CanTransport<Device = D>,
    {
        let actuators = wire_actuators(bus, &config)?;
        Self::new(config, actuators)
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Announce startup and any actuators whose configuration was partial.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&RobotEvent::Started);
        for motor in self.actuators.iter() {
            let state = motor.configured_state();
            if !state.is_clean() {
                sink.emit(&RobotEvent::ConfigFaults {
                    actuator: motor.role(),
                    count: state.failure_count(),
                });
            }
        }
        info!(
            "RobotService started in {:?} with {} actuators",
            self.mode,
            self.actuators.len()
        );
    }

    // ── Mode gating ───────────────────────────────────────────

    /// Switch to `mode` and run its entry actions.
    ///
    /// Returns `false` (and does nothing) if `mode` is already current.
    pub fn set_mode(&mut self, mode: OperatingMode, sink: &mut impl EventSink) -> bool {
        if mode == self.mode {
            return false;
        }
        let from = self.mode;
        self.mode = mode;
        info!("Mode {:?} -> {:?}", from, mode);

        match mode {
            OperatingMode::Disabled => self.enter_disabled(sink),
            OperatingMode::Autonomous => self.enter_autonomous(sink),
            OperatingMode::Teleoperated => self.enter_teleoperated(sink),
            OperatingMode::Test => self.enter_test(sink),
        }
        sink.emit(&RobotEvent::ModeEntered { from, to: mode });
        true
    }

    /// Sample the authoritative mode and enter it if it changed.
    pub fn poll_mode(&mut self, source: &mut impl ModeSource, sink: &mut impl EventSink) -> bool {
        let mode = source.current_mode();
        self.set_mode(mode, sink)
    }

    fn enter_disabled(&mut self, sink: &mut impl EventSink) {
        self.scheduler.cancel_all(&mut self.actuators, sink);
        self.actuators.stop_all();
    }

    fn enter_autonomous(&mut self, sink: &mut impl EventSink) {
        match self.autonomous {
            Some(id) => {
                self.scheduler.schedule(id, &mut self.actuators, sink);
            }
            None => info!("Autonomous: no routine selected"),
        }
    }

    fn enter_teleoperated(&mut self, sink: &mut impl EventSink) {
        self.scheduler.cancel_all(&mut self.actuators, sink);
        self.scheduler
            .schedule(self.ids.drive, &mut self.actuators, sink);
        self.scheduler
            .schedule(self.ids.operator, &mut self.actuators, sink);
        for (id, role) in [
            (self.ids.init_leadscrew, ActuatorId::Leadscrew),
            (self.ids.init_dumping_actuator, ActuatorId::DumpingActuator),
            (self.ids.init_digging_actuator, ActuatorId::DiggingActuator),
        ] {
            self.schedule_init(id, role, sink);
        }
    }

    fn enter_test(&mut self, sink: &mut impl EventSink) {
        self.scheduler.cancel_all(&mut self.actuators, sink);
        self.live_feedback = false;
        self.schedule_init(self.ids.init_leadscrew, ActuatorId::Leadscrew, sink);
    }

    fn schedule_init(&mut self, id: BehaviorId, role: ActuatorId, sink: &mut impl EventSink) {
        if self.actuators.is_initialized(role) {
            debug!("{:?} already initialized, skipping", role);
            return;
        }
        self.scheduler.schedule(id, &mut self.actuators, sink);
    }

    // ── Scheduling passthrough ────────────────────────────────

    pub fn schedule(&mut self, id: BehaviorId, sink: &mut impl EventSink) -> bool {
        self.scheduler.schedule(id, &mut self.actuators, sink)
    }

    pub fn cancel(&mut self, id: BehaviorId, sink: &mut impl EventSink) -> bool {
        self.scheduler.cancel(id, &mut self.actuators, sink)
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle: input → bindings → scheduler → telemetry.
    ///
    /// `io` satisfies all three driver-station ports so a single adapter
    /// can own the gamepads, the clock and the dashboard connection.
    pub fn tick(
        &mut self,
        io: &mut (impl InputPort + TimePort + TelemetrySink),
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        let input = io.poll();

        let buttons = input.operator.buttons;
        let rising = buttons & !self.last_operator_buttons;
        self.last_operator_buttons = buttons;
        if self.mode == OperatingMode::Teleoperated && rising & Button::A.mask() != 0 {
            self.scheduler
                .schedule(self.ids.open_dumping_gate, &mut self.actuators, sink);
        }

        self.scheduler.run(&mut self.actuators, &input, sink);

        let now = io.timestamp_secs();
        io.publish_number("FPGA Time", round_to_place(now, 2));
        io.publish_text("Mode", self.mode.name());
        io.publish_number("Active Behaviors", self.scheduler.active_count() as f64);
        io.publish_number("LiveWindow", if self.live_feedback { 1.0 } else { 0.0 });

        let period = u64::from(self.config.diagnostics_period_ticks);
        if period != 0 && self.tick_count % period == 0 {
            match self.diagnostics().to_json() {
                Ok(json) => io.publish_text("Diagnostics", &json),
                Err(e) => warn!("diagnostics: {}", e),
            }
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn actuators(&self) -> &Actuators<D> {
        &self.actuators
    }

    pub fn scheduler(&self) -> &BehaviorScheduler<D> {
        &self.scheduler
    }

    pub fn behavior_ids(&self) -> BehaviorIds {
        self.ids
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn live_feedback(&self) -> bool {
        self.live_feedback
    }

    pub fn diagnostics(&self) -> DiagnosticsReport {
        DiagnosticsReport::collect(
            self.tick_count,
            self.mode,
            self.scheduler.active_count(),
            &self.actuators,
        )
    }
}
