//! Lunabot rover control core.
//!
//! Preset-driven motor-controller configuration plus a mode-gated,
//! tick-driven behavior scheduler.  The hardware transport, gamepads,
//! dashboard and the periodic timer are external collaborators reached
//! through the port traits in [`app::ports`]; the `adapters` module holds
//! the host-side implementations used by the simulator binary and tests.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod behavior;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod motor;
pub mod scheduler;
