//! Application core: mode gating and robot wiring, no direct I/O.
//!
//! The rules for which behaviors run in which operating mode live in
//! [`service`].  All interaction with hardware and the driver station
//! happens through the **port traits** in [`ports`], so this layer is
//! fully testable over the simulated bus.

pub mod events;
pub mod input;
pub mod mode;
pub mod ports;
pub mod service;
