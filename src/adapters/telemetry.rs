//! Telemetry sink that keeps the latest value per key and mirrors
//! changes to the log at `debug`.

use heapless::FnvIndexMap;
use log::{debug, warn};

use crate::app::ports::TelemetrySink;

/// Distinct keys retained; later keys are logged once and dropped.
pub const MAX_KEYS: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Default)]
pub struct LogTelemetry {
    latest: FnvIndexMap<&'static str, TelemetryValue, MAX_KEYS>,
    overflowed: bool,
}

impl LogTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.latest.get(key)? {
            TelemetryValue::Number(v) => Some(*v),
            TelemetryValue::Text(_) => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.latest.get(key)? {
            TelemetryValue::Text(s) => Some(s.as_str()),
            TelemetryValue::Number(_) => None,
        }
    }

    fn store(&mut self, key: &'static str, value: TelemetryValue) {
        if self.latest.get(key) == Some(&value) {
            return;
        }
        debug!("TELEM | {} = {:?}", key, value);
        if self.latest.insert(key, value).is_err() && !self.overflowed {
            self.overflowed = true;
            warn!("TELEM | key table full, dropping '{}'", key);
        }
    }
}

impl TelemetrySink for LogTelemetry {
    fn publish_number(&mut self, key: &'static str, value: f64) {
        self.store(key, TelemetryValue::Number(value));
    }

    fn publish_text(&mut self, key: &'static str, value: &str) {
        self.store(key, TelemetryValue::Text(value.to_owned()));
    }
}
