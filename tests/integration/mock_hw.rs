//! Recording adapters for integration tests.
//!
//! The service is driven over a real [`SimCanBus`]; these stand in for the
//! driver station and the event log so tests can assert on everything the
//! service emitted or published.

use lunabot::adapters::sim_can::{SimCanBus, SimMotorController};
use lunabot::app::events::RobotEvent;
use lunabot::app::input::InputSnapshot;
use lunabot::app::mode::OperatingMode;
use lunabot::app::ports::{EventSink, InputPort, ModeSource, TelemetrySink, TimePort};
use lunabot::app::service::RobotService;
use lunabot::config::RobotConfig;

pub type Service = RobotService<SimMotorController>;

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<RobotEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&RobotEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn started(&self, name: &str) -> usize {
        self.count(|e| matches!(e, RobotEvent::BehaviorStarted(n) if *n == name))
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &RobotEvent) {
        self.events.push(event.clone());
    }
}

// ── Driver station stand-in ───────────────────────────────────

/// Fixed input and clock; records every telemetry publish.
#[derive(Default)]
pub struct ScriptIo {
    pub input: InputSnapshot,
    pub now_secs: f64,
    pub numbers: Vec<(&'static str, f64)>,
    pub texts: Vec<(&'static str, String)>,
}

#[allow(dead_code)]
impl ScriptIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_number(&self, key: &str) -> Option<f64> {
        self.numbers
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    pub fn last_text(&self, key: &str) -> Option<&str> {
        self.texts
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl InputPort for ScriptIo {
    fn poll(&mut self) -> InputSnapshot {
        self.input
    }
}

impl TimePort for ScriptIo {
    fn timestamp_secs(&self) -> f64 {
        self.now_secs
    }
}

impl TelemetrySink for ScriptIo {
    fn publish_number(&mut self, key: &'static str, value: f64) {
        self.numbers.push((key, value));
    }

    fn publish_text(&mut self, key: &'static str, value: &str) {
        self.texts.push((key, value.to_owned()));
    }
}

/// Mode source that always reports one mode.
#[allow(dead_code)]
pub struct FixedMode(pub OperatingMode);

impl ModeSource for FixedMode {
    fn current_mode(&mut self) -> OperatingMode {
        self.0
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// Wire the full robot on a fresh bus and start the service.
#[allow(dead_code)]
pub fn rig_with(config: RobotConfig) -> (SimCanBus, Service, RecordingSink) {
    let mut bus = SimCanBus::new();
    let mut service = Service::from_transport(config, &mut bus).unwrap();
    let mut sink = RecordingSink::new();
    service.start(&mut sink);
    (bus, service, sink)
}

#[allow(dead_code)]
pub fn rig() -> (SimCanBus, Service, RecordingSink) {
    rig_with(RobotConfig::default())
}

/// Tick `n` times with the same input.
#[allow(dead_code)]
pub fn run_ticks(service: &mut Service, io: &mut ScriptIo, sink: &mut RecordingSink, n: u32) {
    for _ in 0..n {
        service.tick(io, sink);
    }
}
