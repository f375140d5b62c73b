//! Mode-entry gating, one-shot initialization and button bindings.

use lunabot::adapters::sim_can::BusOp;
use lunabot::app::events::RobotEvent;
use lunabot::app::input::{Button, GamepadState};
use lunabot::app::mode::OperatingMode;
use lunabot::behavior::Phase;
use lunabot::config::{AutonomousChoice, RobotConfig};
use lunabot::motor::ActuatorId;

use crate::mock_hw::{FixedMode, ScriptIo, rig, rig_with, run_ticks};

// ── Teleoperated entry ────────────────────────────────────────

#[test]
fn teleop_entry_schedules_control_and_pending_inits() {
    let (_bus, mut service, mut sink) = rig();
    let ids = service.behavior_ids();

    assert!(service.set_mode(OperatingMode::Teleoperated, &mut sink));

    let sched = service.scheduler();
    for id in [
        ids.drive,
        ids.operator,
        ids.init_leadscrew,
        ids.init_dumping_actuator,
        ids.init_digging_actuator,
    ] {
        assert!(sched.is_active(id), "{:?} should be active", sched.name(id));
    }
    assert!(!sched.is_active(ids.open_dumping_gate));
    assert_eq!(sched.active_count(), 5);
    assert!(sink.events.contains(&RobotEvent::ModeEntered {
        from: OperatingMode::Disabled,
        to: OperatingMode::Teleoperated,
    }));
}

#[test]
fn leadscrew_homes_once_per_process() {
    let (bus, mut service, mut sink) = rig();
    let ids = service.behavior_ids();
    let leadscrew = service.config().can_ids.leadscrew;
    let mut io = ScriptIo::new();

    service.set_mode(OperatingMode::Teleoperated, &mut sink);
    assert!(service.scheduler().is_active(ids.init_leadscrew));

    run_ticks(&mut service, &mut io, &mut sink, 249);
    assert!(service.scheduler().is_active(ids.init_leadscrew));
    assert!(!service.actuators().is_initialized(ActuatorId::Leadscrew));
    assert!((bus.device_state(leadscrew).output + 0.3).abs() < 1e-12);

    bus.set_encoder_position(leadscrew, 42.0);
    run_ticks(&mut service, &mut io, &mut sink, 1);
    assert_eq!(service.scheduler().phase(ids.init_leadscrew), Some(Phase::Finished));
    assert!(service.actuators().is_initialized(ActuatorId::Leadscrew));
    assert_eq!(bus.device_state(leadscrew).output, 0.0);
    assert_eq!(bus.device_state(leadscrew).position, 0.0);
    assert!(sink
        .events
        .contains(&RobotEvent::ActuatorInitialized(ActuatorId::Leadscrew)));

    // Shorter homing runs of the other two actuators have finished as well.
    assert!(service.actuators().is_initialized(ActuatorId::DumpingActuator));
    assert!(service.actuators().is_initialized(ActuatorId::DiggingActuator));

    service.set_mode(OperatingMode::Disabled, &mut sink);
    sink.clear();
    service.set_mode(OperatingMode::Teleoperated, &mut sink);
    assert!(!service.scheduler().is_active(ids.init_leadscrew));
    assert_eq!(sink.started("InitializeLeadscrew"), 0);
    assert_eq!(service.scheduler().active_count(), 2);
}

#[test]
fn interrupted_homing_is_rescheduled_on_next_entry() {
    let (bus, mut service, mut sink) = rig();
    let ids = service.behavior_ids();
    let leadscrew = service.config().can_ids.leadscrew;
    let mut io = ScriptIo::new();

    service.set_mode(OperatingMode::Teleoperated, &mut sink);
    run_ticks(&mut service, &mut io, &mut sink, 100);
    bus.set_encoder_position(leadscrew, 7.5);
    bus.clear_log();
    service.set_mode(OperatingMode::Disabled, &mut sink);
    assert!(!service.actuators().is_initialized(ActuatorId::Leadscrew));
    // Not at the end stop, so the encoder keeps its reading.
    assert_eq!(bus.device_state(leadscrew).position, 7.5);
    assert!(!bus
        .calls_for(leadscrew)
        .iter()
        .any(|c| c.op() == BusOp::EncoderWrite));
    assert_eq!(bus.device_state(leadscrew).output, 0.0);

    service.set_mode(OperatingMode::Teleoperated, &mut sink);
    assert!(service.scheduler().is_active(ids.init_leadscrew));
    assert_eq!(sink.started("InitializeLeadscrew"), 2);
}

// ── Test entry ────────────────────────────────────────────────

#[test]
fn test_mode_runs_only_leadscrew_init() {
    let (_bus, mut service, mut sink) = rig();
    let ids = service.behavior_ids();
    let mut io = ScriptIo::new();
    assert!(service.live_feedback());

    service.set_mode(OperatingMode::Test, &mut sink);
    assert!(!service.live_feedback());
    assert_eq!(service.scheduler().active_count(), 1);
    assert!(service.scheduler().is_active(ids.init_leadscrew));

    service.tick(&mut io, &mut sink);
    assert_eq!(io.last_number("LiveWindow"), Some(0.0));
    assert_eq!(io.last_text("Mode"), Some("Test"));
}

#[test]
fn test_mode_skips_initialized_leadscrew() {
    let (_bus, mut service, mut sink) = rig();
    let mut io = ScriptIo::new();

    service.set_mode(OperatingMode::Test, &mut sink);
    run_ticks(&mut service, &mut io, &mut sink, 250);
    assert!(service.actuators().is_initialized(ActuatorId::Leadscrew));

    service.set_mode(OperatingMode::Disabled, &mut sink);
    service.set_mode(OperatingMode::Test, &mut sink);
    assert_eq!(service.scheduler().active_count(), 0);
}

#[test]
fn test_entry_cancels_teleop_units() {
    let (_bus, mut service, mut sink) = rig();
    let ids = service.behavior_ids();

    service.set_mode(OperatingMode::Teleoperated, &mut sink);
    sink.clear();
    service.set_mode(OperatingMode::Test, &mut sink);

    assert!(!service.scheduler().is_active(ids.drive));
    assert!(!service.scheduler().is_active(ids.operator));
    assert_eq!(
        sink.count(|e| matches!(e, RobotEvent::BehaviorCancelled(_))),
        5
    );
    // Leadscrew homing was cancelled and started again from zero.
    assert!(service.scheduler().is_active(ids.init_leadscrew));
}

// ── Autonomous / Disabled ─────────────────────────────────────

#[test]
fn autonomous_without_routine_is_noop() {
    let (_bus, mut service, mut sink) = rig();
    assert!(service.set_mode(OperatingMode::Autonomous, &mut sink));
    assert_eq!(service.scheduler().active_count(), 0);
}

#[test]
fn autonomous_gate_routine_runs_ungated() {
    let config = RobotConfig {
        autonomous: AutonomousChoice::OpenDumpingGate,
        ..RobotConfig::default()
    };
    let (bus, mut service, mut sink) = rig_with(config);
    let ids = service.behavior_ids();
    let gate = service.config().can_ids.dumping_gate;
    let mut io = ScriptIo::new();

    service.set_mode(OperatingMode::Autonomous, &mut sink);
    assert!(service.scheduler().is_active(ids.open_dumping_gate));

    run_ticks(&mut service, &mut io, &mut sink, 10);
    assert_eq!(bus.device_state(gate).output, 1.0);

    run_ticks(&mut service, &mut io, &mut sink, 240);
    assert_eq!(service.scheduler().active_count(), 0);
    assert_eq!(bus.device_state(gate).output, 0.0);
    assert!(sink
        .events
        .contains(&RobotEvent::BehaviorFinished("OpenDumpingGate")));
}

#[test]
fn disabled_entry_stops_everything() {
    let (bus, mut service, mut sink) = rig();
    let mut io = ScriptIo::new();
    io.input.driver.left_y = -1.0;

    service.set_mode(OperatingMode::Teleoperated, &mut sink);
    run_ticks(&mut service, &mut io, &mut sink, 5);
    service.set_mode(OperatingMode::Disabled, &mut sink);

    assert_eq!(service.scheduler().active_count(), 0);
    for role in ActuatorId::ALL {
        let id = service.config().can_ids.get(role);
        assert_eq!(bus.device_state(id).output, 0.0, "{role:?}");
    }
}

#[test]
fn repeated_mode_is_ignored() {
    let (_bus, mut service, mut sink) = rig();
    assert!(!service.set_mode(OperatingMode::Disabled, &mut sink));

    let mut source = FixedMode(OperatingMode::Teleoperated);
    assert!(service.poll_mode(&mut source, &mut sink));
    assert!(!service.poll_mode(&mut source, &mut sink));
    assert_eq!(sink.started("DriveControl"), 1);
}

// ── Per-tick behavior ─────────────────────────────────────────

#[test]
fn driver_sticks_reach_drivebase_and_followers() {
    let (bus, mut service, mut sink) = rig();
    let ids = service.config().can_ids;
    let mut io = ScriptIo::new();
    io.input.driver.left_y = -1.0;

    service.set_mode(OperatingMode::Teleoperated, &mut sink);
    service.tick(&mut io, &mut sink);

    assert_eq!(bus.device_state(ids.drive_left).output, 1.0);
    // Right side is mounted mirrored.
    assert_eq!(bus.device_state(ids.drive_right).output, -1.0);
    assert_eq!(bus.effective_output(ids.drive_left_follower), 1.0);
    assert_eq!(bus.effective_output(ids.drive_right_follower), -1.0);
}

#[test]
fn operator_triggers_drive_belt() {
    let (bus, mut service, mut sink) = rig();
    let belt = service.config().can_ids.digging_belt;
    let scale = service.config().belt_scale;
    let mut io = ScriptIo::new();
    io.input.operator.right_trigger = 1.0;

    service.set_mode(OperatingMode::Teleoperated, &mut sink);
    service.tick(&mut io, &mut sink);
    assert!((bus.device_state(belt).output - scale).abs() < 1e-12);

    io.input.operator = GamepadState {
        left_trigger: 1.0,
        ..GamepadState::default()
    };
    service.tick(&mut io, &mut sink);
    assert!((bus.device_state(belt).output + scale).abs() < 1e-12);
}

#[test]
fn operator_a_opens_gate_on_rising_edge_only() {
    let (_bus, mut service, mut sink) = rig();
    let ids = service.behavior_ids();
    let mut io = ScriptIo::new();

    service.set_mode(OperatingMode::Teleoperated, &mut sink);
    io.input.operator = GamepadState::default().with_button(Button::A);
    run_ticks(&mut service, &mut io, &mut sink, 20);
    assert!(service.scheduler().is_active(ids.open_dumping_gate));
    assert_eq!(sink.started("OpenDumpingGate"), 1);

    io.input.operator = GamepadState::default();
    run_ticks(&mut service, &mut io, &mut sink, 250);
    assert!(!service.scheduler().is_active(ids.open_dumping_gate));

    io.input.operator = GamepadState::default().with_button(Button::A);
    service.tick(&mut io, &mut sink);
    assert_eq!(sink.started("OpenDumpingGate"), 2);
}

#[test]
fn gate_button_ignored_outside_teleop() {
    let (_bus, mut service, mut sink) = rig();
    let ids = service.behavior_ids();
    let mut io = ScriptIo::new();
    io.input.operator = GamepadState::default().with_button(Button::A);

    service.set_mode(OperatingMode::Test, &mut sink);
    run_ticks(&mut service, &mut io, &mut sink, 3);
    assert!(!service.scheduler().is_active(ids.open_dumping_gate));
}

#[test]
fn telemetry_publishes_rounded_timestamp() {
    let (_bus, mut service, mut sink) = rig();
    let mut io = ScriptIo::new();
    io.now_secs = 12.3456;

    service.set_mode(OperatingMode::Teleoperated, &mut sink);
    service.tick(&mut io, &mut sink);

    assert_eq!(io.last_number("FPGA Time"), Some(12.35));
    assert_eq!(io.last_text("Mode"), Some("Teleoperated"));
    assert_eq!(io.last_number("Active Behaviors"), Some(5.0));
}

#[test]
fn diagnostics_published_on_period() {
    let config = RobotConfig {
        diagnostics_period_ticks: 3,
        ..RobotConfig::default()
    };
    let (_bus, mut service, mut sink) = rig_with(config);
    let mut io = ScriptIo::new();

    run_ticks(&mut service, &mut io, &mut sink, 2);
    assert!(io.last_text("Diagnostics").is_none());
    service.tick(&mut io, &mut sink);
    let json = io.last_text("Diagnostics").unwrap();
    assert!(json.contains("\"tick\":3"));
    assert!(json.contains("\"DumpingGate\""));
}
