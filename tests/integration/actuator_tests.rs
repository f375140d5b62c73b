//! Robot wiring over the simulated bus: follower binding, address
//! collisions and transport-fault tolerance.

use lunabot::adapters::sim_can::{BusCall, BusOp, SimCanBus, SimMotorController};
use lunabot::app::events::RobotEvent;
use lunabot::app::mode::OperatingMode;
use lunabot::app::ports::CanTransport;
use lunabot::app::service::wire_actuators;
use lunabot::config::{DrivebaseConfig, RobotConfig};
use lunabot::error::{Error, TransportFault};
use lunabot::motor::{ActuatorId, Actuators, CanId};

use crate::mock_hw::{RecordingSink, ScriptIo, Service, rig, run_ticks};

#[test]
fn followers_zeroed_before_follow_frame() {
    let config = RobotConfig::default();
    let ids = config.can_ids;
    let mut bus = SimCanBus::new();
    let _actuators = wire_actuators(&mut bus, &config).unwrap();

    for (follower, leader) in [
        (ids.drive_left_follower, ids.drive_left),
        (ids.drive_right_follower, ids.drive_right),
    ] {
        let calls = bus.calls_for(follower);
        assert_eq!(
            calls[calls.len() - 2..],
            [
                BusCall::SetOutput(follower, 0.0),
                BusCall::Follow {
                    follower,
                    leader,
                    invert: false,
                },
            ]
        );
        assert_eq!(bus.device_state(follower).following, Some((leader, false)));
    }
}

#[test]
fn every_role_configured_and_left_at_zero() {
    let (bus, service, _sink) = rig();
    assert_eq!(service.actuators().len(), ActuatorId::COUNT);
    for role in ActuatorId::ALL {
        let motor = service.actuators().require(role).unwrap();
        assert_eq!(motor.preset(), role.preset());
        assert!(motor.configured_state().is_clean(), "{role:?}");
        assert_eq!(bus.device_state(motor.can_id()).output, 0.0);
    }
}

#[test]
fn duplicate_address_fails_before_bus_traffic() {
    let mut config = RobotConfig::default();
    config.can_ids.leadscrew = config.can_ids.digging_belt;
    let mut bus = SimCanBus::new();

    let err = Service::from_transport(config, &mut bus).err();
    assert_eq!(
        err,
        Some(Error::AddressCollision {
            can_id: CanId::new(5).unwrap(),
            existing: ActuatorId::DiggingBelt,
            incoming: ActuatorId::Leadscrew,
        })
    );
    assert!(bus.calls().is_empty());
}

#[test]
fn missing_role_rejected_at_construction() {
    let mut bus = SimCanBus::new();
    let mut actuators: Actuators<SimMotorController> = Actuators::new();
    let device = bus.open(CanId::new(5).unwrap());
    actuators
        .attach(
            ActuatorId::DiggingBelt,
            device,
            ActuatorId::DiggingBelt.preset(),
            DrivebaseConfig::default(),
        )
        .unwrap();

    let err = Service::new(RobotConfig::default(), actuators).err();
    assert_eq!(err, Some(Error::MissingActuator(ActuatorId::DriveLeft)));
}

#[test]
fn config_faults_reported_not_fatal() {
    let config = RobotConfig::default();
    let left = config.can_ids.drive_left;
    let mut bus = SimCanBus::new();
    bus.inject_fault(left, BusOp::SetCurrentLimit, TransportFault::Timeout);

    let mut service = Service::from_transport(config, &mut bus).unwrap();
    let mut sink = RecordingSink::new();
    service.start(&mut sink);

    // Default and override current-limit writes both failed.
    assert!(sink.events.contains(&RobotEvent::ConfigFaults {
        actuator: ActuatorId::DriveLeft,
        count: 2,
    }));
    assert_eq!(bus.device_state(left).current_limit, None);
    assert_eq!(bus.device_state(left).output, 0.0);

    let report = service.diagnostics();
    let bad: Vec<_> = report.unhealthy().map(|a| a.role).collect();
    assert_eq!(bad, vec![ActuatorId::DriveLeft]);
}

#[test]
fn follow_failure_leaves_robot_usable() {
    let config = RobotConfig::default();
    let follower = config.can_ids.drive_left_follower;
    let mut bus = SimCanBus::new();
    bus.inject_fault(follower, BusOp::Follow, TransportFault::FollowerConfigFailed);

    let service = Service::from_transport(config, &mut bus).unwrap();
    assert_eq!(bus.device_state(follower).following, None);
    assert_eq!(bus.device_state(follower).output, 0.0);
    let motor = service
        .actuators()
        .require(ActuatorId::DriveLeftFollower)
        .unwrap();
    assert_eq!(motor.last_fault(), Some(TransportFault::FollowerConfigFailed));
}

#[test]
fn runtime_write_faults_do_not_halt_scheduler() {
    let (bus, mut service, mut sink) = rig();
    let left = service.config().can_ids.drive_left;
    let right = service.config().can_ids.drive_right;
    let mut io = ScriptIo::new();
    io.input.driver.left_y = -0.5;

    service.set_mode(OperatingMode::Teleoperated, &mut sink);
    bus.inject_fault(left, BusOp::SetOutput, TransportFault::CanTxFull);
    run_ticks(&mut service, &mut io, &mut sink, 10);

    assert_eq!(service.tick_count(), 10);
    let motor = service.actuators().require(ActuatorId::DriveLeft).unwrap();
    assert_eq!(motor.fault_count(), 10);
    assert_eq!(motor.last_fault(), Some(TransportFault::CanTxFull));
    // The other side keeps driving.
    assert!(bus.device_state(right).output < 0.0);

    bus.clear_faults();
    service.tick(&mut io, &mut sink);
    assert!(bus.device_state(left).output > 0.0);
}

#[test]
fn velocity_conversion_applied_to_drive_encoders_only() {
    let (bus, _service, _sink) = rig();
    let config = RobotConfig::default();
    let with_factor: Vec<_> = bus
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            BusCall::SetVelocityConversion(id, _) => Some(id),
            _ => None,
        })
        .collect();
    let ids = config.can_ids;
    assert_eq!(
        with_factor,
        vec![
            ids.drive_left,
            ids.drive_left_follower,
            ids.drive_right,
            ids.drive_right_follower,
        ]
    );
}
