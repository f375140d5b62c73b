//! Continuous teleoperated control from the two gamepads.

use crate::app::input::apply_deadband;
use crate::app::ports::MotorController;
use crate::motor::ActuatorId;

use super::{Behavior, BehaviorContext, Claim, Requirements};

/// Split throttle and rotation into (left, right) duty cycles.
///
/// Positive rotation turns counter-clockwise.  Outputs are scaled down
/// together so neither side exceeds 1.
pub fn arcade(throttle: f64, rotation: f64) -> (f64, f64) {
    let throttle = throttle.clamp(-1.0, 1.0);
    let rotation = rotation.clamp(-1.0, 1.0);
    let left = throttle - rotation;
    let right = throttle + rotation;

    let greater = throttle.abs().max(rotation.abs());
    if greater == 0.0 {
        return (0.0, 0.0);
    }
    let lesser = throttle.abs().min(rotation.abs());
    let saturated = (greater + lesser) / greater;
    (left / saturated, right / saturated)
}

/// Arcade drive: left stick Y is throttle, right stick X is rotation.
pub struct DriveControl {
    deadband: f64,
    invert_right: bool,
}

impl DriveControl {
    pub const REQUIREMENTS: Requirements = Requirements::of(&[
        ActuatorId::DriveLeft,
        ActuatorId::DriveLeftFollower,
        ActuatorId::DriveRight,
        ActuatorId::DriveRightFollower,
    ]);

    pub fn new(deadband: f64, invert_right: bool) -> Self {
        Self {
            deadband,
            invert_right,
        }
    }
}

impl<D: MotorController> Behavior<D> for DriveControl {
    fn name(&self) -> &'static str {
        "DriveControl"
    }

    fn requirements(&self) -> Requirements {
        Self::REQUIREMENTS
    }

    fn start(&mut self, _claim: &mut Claim<'_, D>) {}

    fn step(&mut self, ctx: &mut BehaviorContext<'_, D>) {
        let pad = ctx.input.driver;
        // Stick Y is negative when pushed forward.
        let throttle = apply_deadband(-pad.left_y, self.deadband);
        let rotation = apply_deadband(-pad.right_x, self.deadband);
        let (left, right) = arcade(throttle, rotation);
        let right = if self.invert_right { -right } else { right };

        ctx.claim.set(ActuatorId::DriveLeft, left);
        ctx.claim.set(ActuatorId::DriveRight, right);
    }

    /// Runs until cancelled.
    fn is_finished(&self) -> bool {
        false
    }

    fn stop(&mut self, claim: &mut Claim<'_, D>, _interrupted: bool) {
        claim.set(ActuatorId::DriveLeft, 0.0);
        claim.set(ActuatorId::DriveRight, 0.0);
    }
}

/// Digging belt on the operator triggers: right forward, left reverse.
pub struct OperatorControl {
    deadband: f64,
    belt_scale: f64,
}

impl OperatorControl {
    pub const REQUIREMENTS: Requirements = Requirements::of(&[ActuatorId::DiggingBelt]);

    pub fn new(deadband: f64, belt_scale: f64) -> Self {
        Self {
            deadband,
            belt_scale,
        }
    }
}

impl<D: MotorController> Behavior<D> for OperatorControl {
    fn name(&self) -> &'static str {
        "OperatorControl"
    }

    fn requirements(&self) -> Requirements {
        Self::REQUIREMENTS
    }

    fn start(&mut self, _claim: &mut Claim<'_, D>) {}

    fn step(&mut self, ctx: &mut BehaviorContext<'_, D>) {
        let pad = ctx.input.operator;
        let command = apply_deadband(pad.right_trigger - pad.left_trigger, self.deadband);
        ctx.claim
            .set(ActuatorId::DiggingBelt, command * self.belt_scale);
    }

    fn is_finished(&self) -> bool {
        false
    }

    fn stop(&mut self, claim: &mut Claim<'_, D>, _interrupted: bool) {
        claim.set(ActuatorId::DiggingBelt, 0.0);
    }
}
