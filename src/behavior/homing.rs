//! One-shot homing: drive an actuator against its end stop for a fixed
//! number of ticks, then zero its encoder.

use log::{info, warn};

use crate::app::ports::{EncoderPort, MotorController};
use crate::config::TimedMotion;
use crate::motor::ActuatorId;

use super::{Behavior, BehaviorContext, Claim, Requirements};

pub struct HomeActuator {
    name: &'static str,
    target: ActuatorId,
    motion: TimedMotion,
    elapsed: u32,
}

impl HomeActuator {
    pub fn new(name: &'static str, target: ActuatorId, motion: TimedMotion) -> Self {
        Self {
            name,
            target,
            motion,
            elapsed: 0,
        }
    }

    pub fn leadscrew(motion: TimedMotion) -> Self {
        Self::new("InitializeLeadscrew", ActuatorId::Leadscrew, motion)
    }

    pub fn dumping_actuator(motion: TimedMotion) -> Self {
        Self::new("InitializeDumpingActuator", ActuatorId::DumpingActuator, motion)
    }

    pub fn digging_actuator(motion: TimedMotion) -> Self {
        Self::new("InitializeDiggingActuator", ActuatorId::DiggingActuator, motion)
    }

    pub fn target(&self) -> ActuatorId {
        self.target
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }
}

impl<D: MotorController> Behavior<D> for HomeActuator {
    fn name(&self) -> &'static str {
        self.name
    }

    fn requirements(&self) -> Requirements {
        Requirements::NONE.with(self.target)
    }

    fn initializes(&self) -> Requirements {
        Requirements::NONE.with(self.target)
    }

    fn start(&mut self, _claim: &mut Claim<'_, D>) {
        self.elapsed = 0;
        info!("{}: homing {:?} for {} ticks", self.name, self.target, self.motion.ticks);
    }

    fn step(&mut self, ctx: &mut BehaviorContext<'_, D>) {
        if self.elapsed < self.motion.ticks {
            ctx.claim.set(self.target, self.motion.output);
        }
        self.elapsed = self.elapsed.saturating_add(1);
    }

    fn is_finished(&self) -> bool {
        self.elapsed >= self.motion.ticks
    }

    fn stop(&mut self, claim: &mut Claim<'_, D>, interrupted: bool) {
        let Some(motor) = claim.motor(self.target) else {
            return;
        };
        motor.stop();
        if interrupted {
            return;
        }
        // At the end stop: this is the zero reference.
        if let Err(fault) = motor.encoder().set_position(0.0) {
            warn!("{}: encoder zero failed: {}", self.name, fault);
        }
    }
}
