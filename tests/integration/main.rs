//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises the service end to end
//! over the simulated CAN bus.  No real hardware is required.

mod actuator_tests;
mod mock_hw;
mod mode_gating_tests;
