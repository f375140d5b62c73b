//! Lunabot host runner.
//!
//! Drives the control core over the simulated CAN bus through a scripted
//! practice match, at the configured tick period.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │  SimCanBus          DriverStation           LogEventSink     │
//! │  (CanTransport)     (Mode+Input+Time+Telem) (EventSink)      │
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ──────────────────      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │          RobotService (mode gate · scheduler)          │  │
//! │  │          Actuators (preset engine per motor)           │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `lunabot [config.json]`.  Without a path the built-in defaults
//! are used.  Log level follows `RUST_LOG` (default `info`).

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{info, warn};

use lunabot::adapters::log_sink::LogEventSink;
use lunabot::adapters::scripted::{DriverStation, ScriptedMatch};
use lunabot::adapters::sim_can::SimCanBus;
use lunabot::app::service::RobotService;
use lunabot::config::RobotConfig;

fn load_config() -> Result<RobotConfig> {
    let Some(path) = std::env::args().nth(1) else {
        info!("Config: built-in defaults");
        return Ok(RobotConfig::default());
    };
    let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let config = RobotConfig::from_json(&json).with_context(|| format!("parsing {path}"))?;
    info!("Config: loaded from {}", path);
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Lunabot v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let period = Duration::from_millis(u64::from(config.tick_period_ms));

    let mut bus = SimCanBus::new();
    let mut service =
        RobotService::from_transport(config.clone(), &mut bus).context("wiring actuators")?;
    let mut sink = LogEventSink::new();
    let mut station = DriverStation::new(ScriptedMatch::practice_match(&config));

    service.start(&mut sink);
    info!(
        "Running {} ticks at {} ms",
        station.script.len_ticks(),
        config.tick_period_ms
    );

    let mut next = Instant::now();
    while !station.script.is_done() {
        service.poll_mode(&mut station, &mut sink);
        service.tick(&mut station, &mut sink);
        station.script.advance();

        next += period;
        match next.checked_duration_since(Instant::now()) {
            Some(wait) => thread::sleep(wait),
            None => {
                warn!("Tick {} overran its period", service.tick_count());
                next = Instant::now();
            }
        }
    }
    service.poll_mode(&mut station, &mut sink);

    let report = service.diagnostics();
    match report.to_json() {
        Ok(json) => info!("Diagnostics: {}", json),
        Err(e) => warn!("Diagnostics: {}", e),
    }
    for failed in report.unhealthy() {
        warn!(
            "{:?} (CAN {}): {} config failure(s), {} runtime fault(s)",
            failed.role, failed.can_id, failed.config_failures, failed.runtime_faults
        );
    }
    info!("Match complete after {} ticks", service.tick_count());
    Ok(())
}
