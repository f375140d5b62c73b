//! Preset configuration engine.
//!
//! Owns one [`MotorController`] and turns a [`Preset`] into the fixed,
//! ordered write sequence below.  Every write may fail independently; a
//! failure is recorded in [`ConfiguredState`] and the sequence continues.
//!
//! ```text
//!  1. restore factory defaults
//!  2. defaults: ramp rate → idle mode → current limit → secondary limit
//!  3. overrides: current limit → secondary limit → ramp rate → idle → invert
//!  4. encoder      (cached; drivebase velocity conversion applied here)
//!  5. closed loop  (cached; preset gain table applied here)
//!  6. output = 0
//! ```
//!
//! Sub-resources live in [`Cached`] slots that can be filled once and never
//! emptied, so their configuration writes are issued at most once per
//! facade no matter how often the accessors or [`PresetEngine::configure`]
//! run.

use log::{debug, warn};
use serde::Serialize;

use crate::app::ports::{AnalogMode, ClosedLoopPort, EncoderPort, MotorController, PidParam};
use crate::config::DrivebaseConfig;
use crate::error::{Status, TransportFault};

use super::CanId;
use super::preset::{BaseSettings, DEFAULTS, MotorRecipe, PidGains, Preset, RPM_TO_MPS};

/// Upper bound on recorded failures per configuration pass.
pub const MAX_CONFIG_FAILURES: usize = 32;

// ═══════════════════════════════════════════════════════════════
//  Configuration outcome
// ═══════════════════════════════════════════════════════════════

/// Which write a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfigStep {
    RestoreDefaults,
    RampRate,
    IdleMode,
    CurrentLimit,
    SecondaryCurrentLimit,
    Inverted,
    VelocityConversion,
    ClosedLoop(PidParam),
    OutputRange,
    ZeroOutput,
}

impl ConfigStep {
    /// Written once when a cached sub-resource is first obtained, so a
    /// later configuration pass never repeats it.
    pub fn is_sub_resource(self) -> bool {
        matches!(
            self,
            Self::VelocityConversion | Self::ClosedLoop(_) | Self::OutputRange
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigFailure {
    pub step: ConfigStep,
    pub fault: TransportFault,
}

/// Result of a configuration pass, including late sub-resource writes.
#[derive(Debug, Clone)]
pub struct ConfiguredState {
    pub can_id: CanId,
    pub preset: Preset,
    failures: heapless::Vec<ConfigFailure, MAX_CONFIG_FAILURES>,
    /// Failures that did not fit in `failures`.
    dropped: usize,
    /// Share of `dropped` from sub-resource writes; survives `clear`.
    dropped_sub_resource: usize,
}

impl ConfiguredState {
    fn new(can_id: CanId, preset: Preset) -> Self {
        Self {
            can_id,
            preset,
            failures: heapless::Vec::new(),
            dropped: 0,
            dropped_sub_resource: 0,
        }
    }

    /// True if every write in the pass was acknowledged.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.dropped == 0
    }

    pub fn failures(&self) -> &[ConfigFailure] {
        &self.failures
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Recorded plus dropped failures.
    pub fn failure_count(&self) -> usize {
        self.failures.len() + self.dropped
    }

    pub fn failed(&self, step: ConfigStep) -> bool {
        self.failures.iter().any(|f| f.step == step)
    }

    /// Start a new pass.  Sub-resource failures are kept: their writes
    /// are not re-issued, so the settings are still missing.
    fn clear(&mut self) {
        self.failures.retain(|f| f.step.is_sub_resource());
        self.dropped = self.dropped_sub_resource;
    }

    fn record(&mut self, step: ConfigStep, status: Status) {
        let Err(fault) = status else {
            return;
        };
        warn!("CAN {}: {:?} failed: {}", self.can_id, step, fault);
        if self.failures.push(ConfigFailure { step, fault }).is_err() {
            self.dropped += 1;
            if step.is_sub_resource() {
                self.dropped_sub_resource += 1;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Fill-once slot
// ═══════════════════════════════════════════════════════════════

/// A slot that is populated at most once and never cleared or replaced.
#[derive(Debug)]
pub struct Cached<T>(Option<T>);

impl<T> Cached<T> {
    pub const fn empty() -> Self {
        Self(None)
    }

    /// Return the cached value, building it with `init` on first use only.
    pub fn get_or_init(&mut self, init: impl FnOnce() -> T) -> &mut T {
        self.0.get_or_insert_with(init)
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    pub fn is_populated(&self) -> bool {
        self.0.is_some()
    }
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self::empty()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Engine
// ═══════════════════════════════════════════════════════════════

/// Velocity conversion for `preset`'s encoder, if one applies.
pub fn velocity_conversion_factor(preset: Preset, drivebase: &DrivebaseConfig) -> Option<f64> {
    if preset.recipe().velocity_scalar && drivebase.apply_velocity_scalar {
        Some(RPM_TO_MPS * drivebase.wheel_radius_m / drivebase.gearbox_ratio)
    } else {
        None
    }
}

pub struct PresetEngine<D: MotorController> {
    device: D,
    preset: Preset,
    recipe: &'static MotorRecipe,
    drivebase: DrivebaseConfig,
    encoder: Cached<D::Encoder>,
    closed_loop: Cached<D::ClosedLoop>,
    analog: Cached<D::Analog>,
    state: ConfiguredState,
    commanded: f64,
}

impl<D: MotorController> PresetEngine<D> {
    /// Wrap `device` without touching it; call [`configure`](Self::configure) next.
    pub fn new(device: D, preset: Preset, drivebase: DrivebaseConfig) -> Self {
        let can_id = device.can_id();
        Self {
            device,
            preset,
            recipe: preset.recipe(),
            drivebase,
            encoder: Cached::empty(),
            closed_loop: Cached::empty(),
            analog: Cached::empty(),
            state: ConfiguredState::new(can_id, preset),
            commanded: 0.0,
        }
    }

    pub fn can_id(&self) -> CanId {
        self.state.can_id
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn state(&self) -> &ConfiguredState {
        &self.state
    }

    pub fn commanded_output(&self) -> f64 {
        self.commanded
    }

    /// Run the full configuration sequence, best-effort.
    pub fn configure(&mut self) -> &ConfiguredState {
        self.state.clear();
        debug!("CAN {}: configuring {:?}", self.state.can_id, self.preset);

        let status = self.device.restore_factory_defaults();
        self.state.record(ConfigStep::RestoreDefaults, status);

        self.write_defaults(&DEFAULTS);
        self.write_overrides();

        // TODO: stagger status frame periods per CAN id once bus utilisation
        // under full load has been measured.

        self.encoder();
        self.closed_loop();

        let status = self.set_output(0.0);
        self.state.record(ConfigStep::ZeroOutput, status);

        &self.state
    }

    /// Open-loop duty cycle, clamped to [-1, 1]; NaN commands zero.
    pub fn set_output(&mut self, value: f64) -> Status {
        let value = if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) };
        self.commanded = value;
        self.device.set_output(value)
    }

    /// Zero this controller's own output, then start following `leader`.
    ///
    /// The follow frame is sent even if the zero write fails; the first
    /// fault (if any) is returned.
    pub fn follow(&mut self, leader: CanId, invert: bool) -> Status {
        let zeroed = self.set_output(0.0);
        let followed = self.device.follow(leader, invert);
        debug!(
            "CAN {}: following CAN {} (invert={})",
            self.state.can_id, leader, invert
        );
        zeroed.and(followed)
    }

    pub fn encoder(&mut self) -> &mut D::Encoder {
        let Self {
            device,
            preset,
            drivebase,
            encoder,
            state,
            ..
        } = self;
        encoder.get_or_init(|| {
            let mut handle = device.encoder();
            if let Some(factor) = velocity_conversion_factor(*preset, drivebase) {
                debug!("CAN {}: velocity conversion {:.6}", state.can_id, factor);
                state.record(
                    ConfigStep::VelocityConversion,
                    handle.set_velocity_conversion_factor(factor),
                );
            }
            handle
        })
    }

    pub fn closed_loop(&mut self) -> &mut D::ClosedLoop {
        let Self {
            device,
            recipe,
            closed_loop,
            state,
            ..
        } = self;
        closed_loop.get_or_init(|| {
            let mut handle = device.closed_loop();
            if let Some(gains) = &recipe.gains {
                apply_gains(&mut handle, gains, state);
            }
            handle
        })
    }

    pub fn analog(&mut self) -> &mut D::Analog {
        let Self { device, analog, .. } = self;
        analog.get_or_init(|| device.analog(AnalogMode::Absolute))
    }

    /// Whether each sub-resource has been obtained: (encoder, closed loop, analog).
    pub fn cached(&self) -> (bool, bool, bool) {
        (
            self.encoder.is_populated(),
            self.closed_loop.is_populated(),
            self.analog.is_populated(),
        )
    }

    fn write_defaults(&mut self, base: &BaseSettings) {
        let status = self.device.set_ramp_rate(base.ramp_rate_secs);
        self.state.record(ConfigStep::RampRate, status);
        let status = self.device.set_idle_mode(base.idle_mode);
        self.state.record(ConfigStep::IdleMode, status);
        let status = self
            .device
            .set_current_limit(base.current_limit.stall_amps, base.current_limit.free_amps);
        self.state.record(ConfigStep::CurrentLimit, status);
        let status = self
            .device
            .set_secondary_current_limit(base.secondary_current_limit_amps);
        self.state.record(ConfigStep::SecondaryCurrentLimit, status);
    }

    fn write_overrides(&mut self) {
        let recipe = self.recipe;
        if let Some(limit) = recipe.current_limit {
            let status = self
                .device
                .set_current_limit(limit.stall_amps, limit.free_amps);
            self.state.record(ConfigStep::CurrentLimit, status);
        }
        if let Some(amps) = recipe.secondary_current_limit_amps {
            let status = self.device.set_secondary_current_limit(amps);
            self.state.record(ConfigStep::SecondaryCurrentLimit, status);
        }
        if let Some(secs) = recipe.ramp_rate_secs {
            let status = self.device.set_ramp_rate(secs);
            self.state.record(ConfigStep::RampRate, status);
        }
        if let Some(mode) = recipe.idle_mode {
            let status = self.device.set_idle_mode(mode);
            self.state.record(ConfigStep::IdleMode, status);
        }
        if let Some(inverted) = recipe.inverted {
            let status = self.device.set_inverted(inverted);
            self.state.record(ConfigStep::Inverted, status);
        }
    }
}

fn apply_gains(pid: &mut impl ClosedLoopPort, gains: &PidGains, state: &mut ConfiguredState) {
    const SLOT: u8 = 0;

    if let Some(sm) = gains.smart_motion {
        for (param, value) in [
            (PidParam::SmartMotionMaxVelocity, sm.max_velocity),
            (PidParam::SmartMotionMaxAccel, sm.max_accel),
            (PidParam::SmartMotionMinOutputVelocity, sm.min_output_velocity),
            (PidParam::SmartMotionAllowedError, sm.allowed_error),
        ] {
            state.record(ConfigStep::ClosedLoop(param), pid.set_param(param, value, SLOT));
        }
    }
    for (param, value) in [
        (PidParam::P, gains.p),
        (PidParam::I, gains.i),
        (PidParam::D, gains.d),
        (PidParam::IZone, gains.izone),
        (PidParam::FeedForward, gains.ff),
    ] {
        state.record(ConfigStep::ClosedLoop(param), pid.set_param(param, value, SLOT));
    }
    state.record(
        ConfigStep::OutputRange,
        pid.set_output_range(gains.output_min, gains.output_max, SLOT),
    );
}
