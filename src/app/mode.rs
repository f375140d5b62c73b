//! Robot operating mode.

use serde::{Deserialize, Serialize};

/// Top-level state driven by field / operator control.  Exactly one is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperatingMode {
    #[default]
    Disabled = 0,
    Autonomous = 1,
    Teleoperated = 2,
    Test = 3,
}

impl OperatingMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::Disabled => "Disabled",
            Self::Autonomous => "Autonomous",
            Self::Teleoperated => "Teleoperated",
            Self::Test => "Test",
        }
    }
}
