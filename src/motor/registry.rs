//! The set of live motor facades, indexed by role.
//!
//! [`Actuators`] enforces that a role is attached at most once and that no
//! two facades share a bus address.  Both checks run before the new
//! device is configured, so a rejected attach issues no bus traffic.

use log::{info, warn};

use crate::app::ports::MotorController;
use crate::config::DrivebaseConfig;
use crate::error::{Error, Result};

use super::preset::Preset;
use super::{ActuatorId, CanId, Motor};

pub struct Actuators<D: MotorController> {
    slots: [Option<Motor<D>>; ActuatorId::COUNT],
}

impl<D: MotorController> Default for Actuators<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: MotorController> Actuators<D> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Configure `device` with `preset` and register it under `role`.
    pub fn attach(
        &mut self,
        role: ActuatorId,
        device: D,
        preset: Preset,
        drivebase: DrivebaseConfig,
    ) -> Result<&mut Motor<D>> {
        if self.slots[role.index()].is_some() {
            return Err(Error::DuplicateRole(role));
        }
        let can_id = device.can_id();
        if let Some(existing) = self.iter().find(|m| m.can_id() == can_id) {
            return Err(Error::AddressCollision {
                can_id,
                existing: existing.role(),
                incoming: role,
            });
        }
        let motor = Motor::new(role, device, preset, drivebase);
        Ok(self.slots[role.index()].insert(motor))
    }

    pub fn get(&self, role: ActuatorId) -> Option<&Motor<D>> {
        self.slots[role.index()].as_ref()
    }

    pub fn get_mut(&mut self, role: ActuatorId) -> Option<&mut Motor<D>> {
        self.slots[role.index()].as_mut()
    }

    pub fn require(&self, role: ActuatorId) -> Result<&Motor<D>> {
        self.get(role).ok_or(Error::MissingActuator(role))
    }

    pub fn require_mut(&mut self, role: ActuatorId) -> Result<&mut Motor<D>> {
        self.get_mut(role).ok_or(Error::MissingActuator(role))
    }

    pub fn contains(&self, role: ActuatorId) -> bool {
        self.slots[role.index()].is_some()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make `follower` mirror `leader`.  The follower is zeroed first.
    pub fn bind_follower(
        &mut self,
        follower: ActuatorId,
        leader: ActuatorId,
        invert: bool,
    ) -> Result<()> {
        let leader_id: CanId = self.require(leader)?.can_id();
        let motor = self.require_mut(follower)?;
        motor.follow(leader_id, invert)?;
        info!("{:?} following {:?} (invert={})", follower, leader, invert);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Motor<D>> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Motor<D>> {
        self.slots.iter_mut().flatten()
    }

    /// Zero every attached controller.
    pub fn stop_all(&mut self) {
        for motor in self.iter_mut() {
            motor.stop();
        }
    }

    /// Latch `role`'s initialization flag.  Returns `true` if newly set.
    pub fn mark_initialized(&mut self, role: ActuatorId) -> bool {
        match self.get_mut(role) {
            Some(motor) => motor.mark_initialized(),
            None => {
                warn!("{:?}: cannot mark initialized, not attached", role);
                false
            }
        }
    }

    /// `false` for roles that are not attached.
    pub fn is_initialized(&self, role: ActuatorId) -> bool {
        self.get(role).is_some_and(Motor::is_initialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sim_can::{BusCall, BusOp, SimCanBus, SimMotorController};
    use crate::app::ports::CanTransport;
    use crate::error::TransportFault;

    fn attach(
        actuators: &mut Actuators<SimMotorController>,
        bus: &mut SimCanBus,
        role: ActuatorId,
        raw: u8,
    ) -> Result<CanId> {
        let device = bus.open(CanId::new(raw)?);
        actuators
            .attach(role, device, role.preset(), DrivebaseConfig::default())
            .map(|m| m.can_id())
    }

    #[test]
    fn collision_rejected_before_configuration() {
        let mut bus = SimCanBus::new();
        let mut act = Actuators::new();
        attach(&mut act, &mut bus, ActuatorId::Leadscrew, 7).unwrap();
        bus.clear_log();

        let err = attach(&mut act, &mut bus, ActuatorId::DiggingBelt, 7).unwrap_err();
        assert_eq!(
            err,
            Error::AddressCollision {
                can_id: CanId::new(7).unwrap(),
                existing: ActuatorId::Leadscrew,
                incoming: ActuatorId::DiggingBelt,
            }
        );
        assert!(bus.calls().is_empty());
        assert!(!act.contains(ActuatorId::DiggingBelt));
    }

    #[test]
    fn duplicate_role_rejected() {
        let mut bus = SimCanBus::new();
        let mut act = Actuators::new();
        attach(&mut act, &mut bus, ActuatorId::Leadscrew, 7).unwrap();
        assert_eq!(
            attach(&mut act, &mut bus, ActuatorId::Leadscrew, 8),
            Err(Error::DuplicateRole(ActuatorId::Leadscrew))
        );
    }

    #[test]
    fn missing_role_is_reported() {
        let act: Actuators<SimMotorController> = Actuators::new();
        assert!(act.is_empty());
        assert_eq!(
            act.require(ActuatorId::DumpingGate).err(),
            Some(Error::MissingActuator(ActuatorId::DumpingGate))
        );
        assert!(!act.is_initialized(ActuatorId::DumpingGate));
    }

    #[test]
    fn bind_follower_zeroes_then_follows() {
        let mut bus = SimCanBus::new();
        let mut act = Actuators::new();
        let leader = attach(&mut act, &mut bus, ActuatorId::DriveLeft, 1).unwrap();
        let follower = attach(&mut act, &mut bus, ActuatorId::DriveLeftFollower, 2).unwrap();
        bus.clear_log();

        act.bind_follower(ActuatorId::DriveLeftFollower, ActuatorId::DriveLeft, false)
            .unwrap();
        let ops: Vec<_> = bus.calls_for(follower).iter().map(BusCall::op).collect();
        assert_eq!(ops, vec![BusOp::SetOutput, BusOp::Follow]);
        assert_eq!(bus.device_state(follower).following, Some((leader, false)));
    }

    #[test]
    fn bind_follower_surfaces_transport_fault() {
        let mut bus = SimCanBus::new();
        let mut act = Actuators::new();
        attach(&mut act, &mut bus, ActuatorId::DriveRight, 3).unwrap();
        let follower = attach(&mut act, &mut bus, ActuatorId::DriveRightFollower, 4).unwrap();
        bus.inject_fault(follower, BusOp::Follow, TransportFault::FollowerConfigFailed);

        let err = act
            .bind_follower(ActuatorId::DriveRightFollower, ActuatorId::DriveRight, false)
            .unwrap_err();
        assert_eq!(err, Error::Transport(TransportFault::FollowerConfigFailed));
    }

    #[test]
    fn stop_all_zeroes_every_output() {
        let mut bus = SimCanBus::new();
        let mut act = Actuators::new();
        let a = attach(&mut act, &mut bus, ActuatorId::DiggingBelt, 5).unwrap();
        let b = attach(&mut act, &mut bus, ActuatorId::DumpingGate, 9).unwrap();
        act.require_mut(ActuatorId::DiggingBelt).unwrap().set(0.6);
        act.require_mut(ActuatorId::DumpingGate).unwrap().set(-0.3);

        act.stop_all();
        assert_eq!(bus.device_state(a).output, 0.0);
        assert_eq!(bus.device_state(b).output, 0.0);
        assert_eq!(act.len(), 2);
    }
}
