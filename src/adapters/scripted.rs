//! Scripted driver station for the host runner.
//!
//! A [`ScriptedMatch`] is a list of segments, each holding one operating
//! mode and one gamepad snapshot for a number of ticks.  It stands in for
//! field control and the two gamepads.  [`DriverStation`] bundles it with
//! a clock and a telemetry sink so one value satisfies every port the
//! service's tick needs.

use crate::app::input::{Button, GamepadState, InputSnapshot};
use crate::app::mode::OperatingMode;
use crate::app::ports::{InputPort, ModeSource, TelemetrySink, TimePort};
use crate::config::RobotConfig;

use super::telemetry::LogTelemetry;
use super::time::HostClock;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub mode: OperatingMode,
    pub ticks: u32,
    pub input: InputSnapshot,
}

impl Segment {
    pub fn idle(mode: OperatingMode, ticks: u32) -> Self {
        Self {
            mode,
            ticks,
            input: InputSnapshot::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedMatch {
    segments: Vec<Segment>,
    index: usize,
    elapsed: u32,
}

impl ScriptedMatch {
    pub fn new(segments: Vec<Segment>) -> Self {
        let mut script = Self {
            segments,
            index: 0,
            elapsed: 0,
        };
        script.skip_empty();
        script
    }

    /// Disabled → autonomous → teleop (drive, dig, open the gate) → test → disabled.
    pub fn practice_match(config: &RobotConfig) -> Self {
        let per_sec = (1000 / config.tick_period_ms.max(1)).max(1);
        let driving = InputSnapshot {
            driver: GamepadState {
                left_y: -0.6,
                right_x: 0.2,
                ..GamepadState::default()
            },
            operator: GamepadState {
                right_trigger: 0.9,
                ..GamepadState::default()
            },
        };
        let gate = InputSnapshot {
            operator: GamepadState::default().with_button(Button::A),
            ..driving
        };
        Self::new(vec![
            Segment::idle(OperatingMode::Disabled, per_sec),
            Segment::idle(OperatingMode::Autonomous, 3 * per_sec),
            Segment::idle(OperatingMode::Disabled, per_sec),
            Segment {
                mode: OperatingMode::Teleoperated,
                ticks: 6 * per_sec,
                input: driving,
            },
            Segment {
                mode: OperatingMode::Teleoperated,
                ticks: per_sec / 5 + 1,
                input: gate,
            },
            Segment {
                mode: OperatingMode::Teleoperated,
                ticks: 6 * per_sec,
                input: driving,
            },
            Segment::idle(OperatingMode::Test, 2 * per_sec),
            Segment::idle(OperatingMode::Disabled, per_sec),
        ])
    }

    pub fn current(&self) -> Option<&Segment> {
        self.segments.get(self.index)
    }

    /// Move one tick forward.
    pub fn advance(&mut self) {
        let Some(segment) = self.segments.get(self.index) else {
            return;
        };
        self.elapsed += 1;
        if self.elapsed >= segment.ticks {
            self.index += 1;
            self.elapsed = 0;
            self.skip_empty();
        }
    }

    pub fn is_done(&self) -> bool {
        self.index >= self.segments.len()
    }

    /// Total ticks in the script.
    pub fn len_ticks(&self) -> u64 {
        self.segments.iter().map(|s| u64::from(s.ticks)).sum()
    }

    fn skip_empty(&mut self) {
        while self.segments.get(self.index).is_some_and(|s| s.ticks == 0) {
            self.index += 1;
        }
    }
}

/// Disabled once the script has run out.
impl ModeSource for ScriptedMatch {
    fn current_mode(&mut self) -> OperatingMode {
        self.current().map_or(OperatingMode::Disabled, |s| s.mode)
    }
}

impl InputPort for ScriptedMatch {
    fn poll(&mut self) -> InputSnapshot {
        self.current().map(|s| s.input).unwrap_or_default()
    }
}

/// Scripted match, host clock and telemetry behind one value.
pub struct DriverStation {
    pub script: ScriptedMatch,
    pub clock: HostClock,
    pub telemetry: LogTelemetry,
}

impl DriverStation {
    pub fn new(script: ScriptedMatch) -> Self {
        Self {
            script,
            clock: HostClock::new(),
            telemetry: LogTelemetry::new(),
        }
    }
}

impl ModeSource for DriverStation {
    fn current_mode(&mut self) -> OperatingMode {
        self.script.current_mode()
    }
}

impl InputPort for DriverStation {
    fn poll(&mut self) -> InputSnapshot {
        self.script.poll()
    }
}

impl TimePort for DriverStation {
    fn timestamp_secs(&self) -> f64 {
        self.clock.timestamp_secs()
    }
}

impl TelemetrySink for DriverStation {
    fn publish_number(&mut self, key: &'static str, value: f64) {
        self.telemetry.publish_number(key, value);
    }

    fn publish_text(&mut self, key: &'static str, value: &str) {
        self.telemetry.publish_text(key, value);
    }
}
