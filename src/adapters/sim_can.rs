//! Simulated CAN bus and motor controllers.
//!
//! Every handle opened from a [`SimCanBus`] shares one [`BusState`]: a
//! call log, per-device register state, and a fault-injection table.  The
//! host binary drives the robot over this bus, and tests assert on the log.
//!
//! A call is always logged, even when an injected fault makes it fail.
//! A failed write leaves the device register untouched.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::app::ports::{
    AnalogMode, AnalogPort, CanTransport, ClosedLoopPort, EncoderPort, IdleMode, MotorController,
    PidParam,
};
use crate::error::{Status, TransportFault};
use crate::motor::CanId;

// ── Call log ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum BusCall {
    RestoreDefaults(CanId),
    SetOutput(CanId, f64),
    SetIdleMode(CanId, IdleMode),
    SetRampRate(CanId, f64),
    SetCurrentLimit {
        can_id: CanId,
        stall_amps: u16,
        free_amps: u16,
    },
    SetSecondaryCurrentLimit(CanId, f64),
    SetInverted(CanId, bool),
    Follow {
        follower: CanId,
        leader: CanId,
        invert: bool,
    },
    OpenEncoder(CanId),
    OpenClosedLoop(CanId),
    OpenAnalog(CanId, AnalogMode),
    SetVelocityConversion(CanId, f64),
    SetEncoderPosition(CanId, f64),
    EncoderRead(CanId),
    SetClosedLoopParam {
        can_id: CanId,
        param: PidParam,
        value: f64,
    },
    SetOutputRange {
        can_id: CanId,
        min: f64,
        max: f64,
    },
    AnalogRead(CanId),
}

/// Payload-free discriminant of a [`BusCall`], used for fault injection
/// and order assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    RestoreDefaults,
    SetOutput,
    SetIdleMode,
    SetRampRate,
    SetCurrentLimit,
    SetSecondaryCurrentLimit,
    SetInverted,
    Follow,
    OpenEncoder,
    OpenClosedLoop,
    OpenAnalog,
    EncoderWrite,
    EncoderRead,
    ClosedLoopWrite,
    AnalogRead,
}

impl BusCall {
    pub fn op(&self) -> BusOp {
        match self {
            Self::RestoreDefaults(_) => BusOp::RestoreDefaults,
            Self::SetOutput(..) => BusOp::SetOutput,
            Self::SetIdleMode(..) => BusOp::SetIdleMode,
            Self::SetRampRate(..) => BusOp::SetRampRate,
            Self::SetCurrentLimit { .. } => BusOp::SetCurrentLimit,
            Self::SetSecondaryCurrentLimit(..) => BusOp::SetSecondaryCurrentLimit,
            Self::SetInverted(..) => BusOp::SetInverted,
            Self::Follow { .. } => BusOp::Follow,
            Self::OpenEncoder(_) => BusOp::OpenEncoder,
            Self::OpenClosedLoop(_) => BusOp::OpenClosedLoop,
            Self::OpenAnalog(..) => BusOp::OpenAnalog,
            Self::SetVelocityConversion(..) | Self::SetEncoderPosition(..) => BusOp::EncoderWrite,
            Self::EncoderRead(_) => BusOp::EncoderRead,
            Self::SetClosedLoopParam { .. } | Self::SetOutputRange { .. } => BusOp::ClosedLoopWrite,
            Self::AnalogRead(_) => BusOp::AnalogRead,
        }
    }

    /// Device the call was addressed to.
    pub fn can_id(&self) -> CanId {
        match *self {
            Self::RestoreDefaults(id)
            | Self::SetOutput(id, _)
            | Self::SetIdleMode(id, _)
            | Self::SetRampRate(id, _)
            | Self::SetSecondaryCurrentLimit(id, _)
            | Self::SetInverted(id, _)
            | Self::OpenEncoder(id)
            | Self::OpenClosedLoop(id)
            | Self::OpenAnalog(id, _)
            | Self::SetVelocityConversion(id, _)
            | Self::SetEncoderPosition(id, _)
            | Self::EncoderRead(id)
            | Self::AnalogRead(id) => id,
            Self::SetCurrentLimit { can_id, .. }
            | Self::SetClosedLoopParam { can_id, .. }
            | Self::SetOutputRange { can_id, .. } => can_id,
            Self::Follow { follower, .. } => follower,
        }
    }
}

// ── Device registers ──────────────────────────────────────────

/// Register image of one simulated controller.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub output: f64,
    pub idle_mode: Option<IdleMode>,
    pub ramp_rate_secs: f64,
    pub current_limit: Option<(u16, u16)>,
    pub secondary_current_limit_amps: Option<f64>,
    pub inverted: bool,
    /// Leader address and invert flag.
    pub following: Option<(CanId, bool)>,
    pub velocity_conversion_factor: f64,
    pub position: f64,
    pub velocity: f64,
    pub pid: Vec<(PidParam, f64)>,
    pub output_range: Option<(f64, f64)>,
    pub analog_voltage: f64,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            output: 0.0,
            idle_mode: None,
            ramp_rate_secs: 0.0,
            current_limit: None,
            secondary_current_limit_amps: None,
            inverted: false,
            following: None,
            velocity_conversion_factor: 1.0,
            position: 0.0,
            velocity: 0.0,
            pid: Vec::new(),
            output_range: None,
            analog_voltage: 0.0,
        }
    }
}

impl DeviceState {
    /// Factory reset keeps the sensor readings.
    fn restore(&mut self) {
        *self = Self {
            position: self.position,
            velocity: self.velocity,
            analog_voltage: self.analog_voltage,
            ..Self::default()
        };
    }
}

// ── Shared bus ────────────────────────────────────────────────

struct InjectedFault {
    can_id: CanId,
    op: BusOp,
    fault: TransportFault,
    once: bool,
}

#[derive(Default)]
struct BusState {
    log: Vec<BusCall>,
    faults: Vec<InjectedFault>,
    devices: BTreeMap<CanId, DeviceState>,
    next_handle: u32,
}

impl BusState {
    fn injected(&mut self, can_id: CanId, op: BusOp) -> Option<TransportFault> {
        let pos = self
            .faults
            .iter()
            .position(|f| f.can_id == can_id && f.op == op)?;
        let fault = self.faults[pos].fault;
        if self.faults[pos].once {
            self.faults.remove(pos);
        }
        Some(fault)
    }

    fn write(&mut self, call: BusCall, apply: impl FnOnce(&mut DeviceState)) -> Status {
        let (can_id, op) = (call.can_id(), call.op());
        self.log.push(call);
        if let Some(fault) = self.injected(can_id, op) {
            return Err(fault);
        }
        apply(self.devices.entry(can_id).or_default());
        Ok(())
    }

    fn read(
        &mut self,
        call: BusCall,
        get: impl FnOnce(&DeviceState) -> f64,
    ) -> Result<f64, TransportFault> {
        let (can_id, op) = (call.can_id(), call.op());
        self.log.push(call);
        if let Some(fault) = self.injected(can_id, op) {
            return Err(fault);
        }
        Ok(get(self.devices.entry(can_id).or_default()))
    }

    fn open(&mut self, call: BusCall) -> u32 {
        self.devices.entry(call.can_id()).or_default();
        self.log.push(call);
        self.next_handle += 1;
        self.next_handle
    }
}

/// In-process CAN bus.  Clones share the same state.
#[derive(Clone, Default)]
pub struct SimCanBus {
    state: Rc<RefCell<BusState>>,
}

impl SimCanBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every call so far, oldest first.
    pub fn calls(&self) -> Vec<BusCall> {
        self.state.borrow().log.clone()
    }

    pub fn calls_for(&self, can_id: CanId) -> Vec<BusCall> {
        self.state
            .borrow()
            .log
            .iter()
            .filter(|c| c.can_id() == can_id)
            .cloned()
            .collect()
    }

    pub fn clear_log(&self) {
        self.state.borrow_mut().log.clear();
    }

    /// Make every `op` on `can_id` fail until [`clear_faults`](Self::clear_faults).
    pub fn inject_fault(&self, can_id: CanId, op: BusOp, fault: TransportFault) {
        self.push_fault(can_id, op, fault, false);
    }

    /// Make the next `op` on `can_id` fail.
    pub fn inject_fault_once(&self, can_id: CanId, op: BusOp, fault: TransportFault) {
        self.push_fault(can_id, op, fault, true);
    }

    pub fn clear_faults(&self) {
        self.state.borrow_mut().faults.clear();
    }

    /// Register image of `can_id` (defaults if it was never opened).
    pub fn device_state(&self, can_id: CanId) -> DeviceState {
        self.state
            .borrow()
            .devices
            .get(&can_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Output the device actually drives, resolving one level of following.
    pub fn effective_output(&self, can_id: CanId) -> f64 {
        let state = self.state.borrow();
        let Some(dev) = state.devices.get(&can_id) else {
            return 0.0;
        };
        match dev.following {
            Some((leader, invert)) => {
                let out = state.devices.get(&leader).map_or(0.0, |l| l.output);
                if invert { -out } else { out }
            }
            None => dev.output,
        }
    }

    pub fn set_analog_voltage(&self, can_id: CanId, volts: f64) {
        self.state
            .borrow_mut()
            .devices
            .entry(can_id)
            .or_default()
            .analog_voltage = volts;
    }

    pub fn set_encoder_position(&self, can_id: CanId, position: f64) {
        self.state
            .borrow_mut()
            .devices
            .entry(can_id)
            .or_default()
            .position = position;
    }

    fn push_fault(&self, can_id: CanId, op: BusOp, fault: TransportFault, once: bool) {
        self.state.borrow_mut().faults.push(InjectedFault {
            can_id,
            op,
            fault,
            once,
        });
    }
}

impl CanTransport for SimCanBus {
    type Device = SimMotorController;

    fn open(&mut self, can_id: CanId) -> SimMotorController {
        SimMotorController {
            can_id,
            bus: Rc::clone(&self.state),
        }
    }
}

// ── Controller and sub-resource handles ───────────────────────

pub struct SimMotorController {
    can_id: CanId,
    bus: Rc<RefCell<BusState>>,
}

impl MotorController for SimMotorController {
    type Encoder = SimEncoder;
    type ClosedLoop = SimClosedLoop;
    type Analog = SimAnalog;

    fn can_id(&self) -> CanId {
        self.can_id
    }

    fn restore_factory_defaults(&mut self) -> Status {
        self.bus
            .borrow_mut()
            .write(BusCall::RestoreDefaults(self.can_id), DeviceState::restore)
    }

    fn set_output(&mut self, value: f64) -> Status {
        self.bus
            .borrow_mut()
            .write(BusCall::SetOutput(self.can_id, value), |d| d.output = value)
    }

    fn set_idle_mode(&mut self, mode: IdleMode) -> Status {
        self.bus
            .borrow_mut()
            .write(BusCall::SetIdleMode(self.can_id, mode), |d| {
                d.idle_mode = Some(mode)
            })
    }

    fn set_ramp_rate(&mut self, secs: f64) -> Status {
        self.bus
            .borrow_mut()
            .write(BusCall::SetRampRate(self.can_id, secs), |d| {
                d.ramp_rate_secs = secs
            })
    }

    fn set_current_limit(&mut self, stall_amps: u16, free_amps: u16) -> Status {
        let call = BusCall::SetCurrentLimit {
            can_id: self.can_id,
            stall_amps,
            free_amps,
        };
        self.bus.borrow_mut().write(call, |d| {
            d.current_limit = Some((stall_amps, free_amps))
        })
    }

    fn set_secondary_current_limit(&mut self, amps: f64) -> Status {
        self.bus
            .borrow_mut()
            .write(BusCall::SetSecondaryCurrentLimit(self.can_id, amps), |d| {
                d.secondary_current_limit_amps = Some(amps)
            })
    }

    fn set_inverted(&mut self, inverted: bool) -> Status {
        self.bus
            .borrow_mut()
            .write(BusCall::SetInverted(self.can_id, inverted), |d| {
                d.inverted = inverted
            })
    }

    fn encoder(&mut self) -> SimEncoder {
        let handle = self.bus.borrow_mut().open(BusCall::OpenEncoder(self.can_id));
        SimEncoder {
            can_id: self.can_id,
            handle,
            bus: Rc::clone(&self.bus),
        }
    }

    fn closed_loop(&mut self) -> SimClosedLoop {
        let handle = self
            .bus
            .borrow_mut()
            .open(BusCall::OpenClosedLoop(self.can_id));
        SimClosedLoop {
            can_id: self.can_id,
            handle,
            bus: Rc::clone(&self.bus),
        }
    }

    fn analog(&mut self, mode: AnalogMode) -> SimAnalog {
        let handle = self
            .bus
            .borrow_mut()
            .open(BusCall::OpenAnalog(self.can_id, mode));
        let origin = match mode {
            AnalogMode::Absolute => 0.0,
            AnalogMode::Relative => self
                .bus
                .borrow()
                .devices
                .get(&self.can_id)
                .map_or(0.0, |d| d.analog_voltage),
        };
        SimAnalog {
            can_id: self.can_id,
            handle,
            origin,
            bus: Rc::clone(&self.bus),
        }
    }

    fn follow(&mut self, leader: CanId, invert: bool) -> Status {
        let call = BusCall::Follow {
            follower: self.can_id,
            leader,
            invert,
        };
        self.bus
            .borrow_mut()
            .write(call, |d| d.following = Some((leader, invert)))
    }
}

pub struct SimEncoder {
    can_id: CanId,
    handle: u32,
    bus: Rc<RefCell<BusState>>,
}

impl SimEncoder {
    /// Bus-unique identity of this handle.
    pub fn handle(&self) -> u32 {
        self.handle
    }
}

impl EncoderPort for SimEncoder {
    fn set_velocity_conversion_factor(&mut self, factor: f64) -> Status {
        self.bus
            .borrow_mut()
            .write(BusCall::SetVelocityConversion(self.can_id, factor), |d| {
                d.velocity_conversion_factor = factor
            })
    }

    fn velocity_conversion_factor(&mut self) -> Result<f64, TransportFault> {
        self.bus
            .borrow_mut()
            .read(BusCall::EncoderRead(self.can_id), |d| {
                d.velocity_conversion_factor
            })
    }

    fn set_position(&mut self, position: f64) -> Status {
        self.bus
            .borrow_mut()
            .write(BusCall::SetEncoderPosition(self.can_id, position), |d| {
                d.position = position
            })
    }

    fn position(&mut self) -> Result<f64, TransportFault> {
        self.bus
            .borrow_mut()
            .read(BusCall::EncoderRead(self.can_id), |d| d.position)
    }

    fn velocity(&mut self) -> Result<f64, TransportFault> {
        self.bus
            .borrow_mut()
            .read(BusCall::EncoderRead(self.can_id), |d| {
                d.velocity * d.velocity_conversion_factor
            })
    }
}

pub struct SimClosedLoop {
    can_id: CanId,
    handle: u32,
    bus: Rc<RefCell<BusState>>,
}

impl SimClosedLoop {
    pub fn handle(&self) -> u32 {
        self.handle
    }
}

impl ClosedLoopPort for SimClosedLoop {
    fn set_param(&mut self, param: PidParam, value: f64, _slot: u8) -> Status {
        let call = BusCall::SetClosedLoopParam {
            can_id: self.can_id,
            param,
            value,
        };
        self.bus.borrow_mut().write(call, |d| {
            d.pid.retain(|(p, _)| *p != param);
            d.pid.push((param, value));
        })
    }

    fn set_output_range(&mut self, min: f64, max: f64, _slot: u8) -> Status {
        let call = BusCall::SetOutputRange {
            can_id: self.can_id,
            min,
            max,
        };
        self.bus
            .borrow_mut()
            .write(call, |d| d.output_range = Some((min, max)))
    }
}

pub struct SimAnalog {
    can_id: CanId,
    handle: u32,
    /// Voltage subtracted from position reads (non-zero in relative mode).
    origin: f64,
    bus: Rc<RefCell<BusState>>,
}

impl SimAnalog {
    pub fn handle(&self) -> u32 {
        self.handle
    }
}

/// Full-scale voltage of the simulated analog input.
const ANALOG_FULL_SCALE_V: f64 = 3.3;

impl AnalogPort for SimAnalog {
    fn voltage(&mut self) -> Result<f64, TransportFault> {
        self.bus
            .borrow_mut()
            .read(BusCall::AnalogRead(self.can_id), |d| d.analog_voltage)
    }

    fn position(&mut self) -> Result<f64, TransportFault> {
        let origin = self.origin;
        self.bus
            .borrow_mut()
            .read(BusCall::AnalogRead(self.can_id), |d| {
                (d.analog_voltage - origin) / ANALOG_FULL_SCALE_V
            })
    }
}
