//! Unified error types for the rover control core.
//!
//! Two layers: [`TransportFault`] is the status code every motor-controller
//! call can return, and [`Error`] is what construction-time and wiring
//! code reports.  Transport faults during configuration are *collected*
//! rather than propagated (see [`crate::motor::engine::ConfiguredState`]);
//! only programming-time invariant violations surface as [`Error`].

use core::fmt;

use serde::Serialize;

use crate::motor::{ActuatorId, CanId};

// ---------------------------------------------------------------------------
// Transport faults
// ---------------------------------------------------------------------------

/// Status code returned by a failed CAN write or read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransportFault {
    /// No response within the CAN timeout.
    Timeout,
    /// The transmit buffer was full; frame dropped.
    CanTxFull,
    /// The controller rejected the parameter value.
    InvalidParameter,
    /// The follower frame was not acknowledged.
    FollowerConfigFailed,
    /// No device answered at this address.
    DeviceNotFound,
    /// Vendor HAL error code without a named mapping.
    Hal(i32),
}

impl fmt::Display for TransportFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "CAN timeout"),
            Self::CanTxFull => write!(f, "CAN tx buffer full"),
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::FollowerConfigFailed => write!(f, "follower config failed"),
            Self::DeviceNotFound => write!(f, "device not found"),
            Self::Hal(code) => write!(f, "HAL error {code}"),
        }
    }
}

/// Result of a single motor-controller call.
pub type Status = core::result::Result<(), TransportFault>;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Construction-time and wiring errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A transport call failed where the caller cannot continue best-effort.
    Transport(TransportFault),
    /// CAN id outside the addressable range.
    InvalidCanId(u8),
    /// Two facades claimed the same bus address.
    AddressCollision {
        can_id: CanId,
        existing: ActuatorId,
        incoming: ActuatorId,
    },
    /// A role was attached twice.
    DuplicateRole(ActuatorId),
    /// A role was used before a facade was attached for it.
    MissingActuator(ActuatorId),
    /// The behavior table has no free slot.
    SchedulerFull,
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::InvalidCanId(id) => write!(f, "CAN id {id} out of range"),
            Self::AddressCollision {
                can_id,
                existing,
                incoming,
            } => write!(
                f,
                "CAN id {can_id} already owned by {existing:?}, requested by {incoming:?}"
            ),
            Self::DuplicateRole(role) => write!(f, "{role:?} attached twice"),
            Self::MissingActuator(role) => write!(f, "{role:?} has no attached controller"),
            Self::SchedulerFull => write!(f, "behavior table full"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

impl From<TransportFault> for Error {
    fn from(e: TransportFault) -> Self {
        Self::Transport(e)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
