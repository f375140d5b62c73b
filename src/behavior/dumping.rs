//! Open the dumping gate by running its servo motor for a fixed time.

use crate::app::ports::MotorController;
use crate::config::TimedMotion;
use crate::motor::ActuatorId;

use super::{Behavior, BehaviorContext, Claim, Requirements};

pub struct OpenDumpingGate {
    motion: TimedMotion,
    elapsed: u32,
}

impl OpenDumpingGate {
    pub const REQUIREMENTS: Requirements = Requirements::of(&[ActuatorId::DumpingGate]);

    pub fn new(motion: TimedMotion) -> Self {
        Self { motion, elapsed: 0 }
    }
}

impl<D: MotorController> Behavior<D> for OpenDumpingGate {
    fn name(&self) -> &'static str {
        "OpenDumpingGate"
    }

    fn requirements(&self) -> Requirements {
        Self::REQUIREMENTS
    }

    fn start(&mut self, _claim: &mut Claim<'_, D>) {
        self.elapsed = 0;
    }

    fn step(&mut self, ctx: &mut BehaviorContext<'_, D>) {
        if self.elapsed < self.motion.ticks {
            ctx.claim.set(ActuatorId::DumpingGate, self.motion.output);
        }
        self.elapsed = self.elapsed.saturating_add(1);
    }

    fn is_finished(&self) -> bool {
        self.elapsed >= self.motion.ticks
    }

    fn stop(&mut self, claim: &mut Claim<'_, D>, _interrupted: bool) {
        claim.set(ActuatorId::DumpingGate, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sim_can::{BusCall, SimCanBus, SimMotorController};
    use crate::app::input::InputSnapshot;
    use crate::app::ports::CanTransport;
    use crate::config::DrivebaseConfig;
    use crate::motor::{Actuators, CanId};

    #[test]
    fn commands_only_until_threshold_then_ceases() {
        let mut bus = SimCanBus::new();
        let mut act: Actuators<SimMotorController> = Actuators::new();
        let id = CanId::new(9).unwrap();
        let device = bus.open(id);
        act.attach(
            ActuatorId::DumpingGate,
            device,
            ActuatorId::DumpingGate.preset(),
            DrivebaseConfig::default(),
        )
        .unwrap();
        bus.clear_log();

        let mut gate = OpenDumpingGate::new(TimedMotion { output: 1.0, ticks: 3 });
        let input = InputSnapshot::default();
        let held = <OpenDumpingGate as Behavior<SimMotorController>>::requirements(&gate);
        Behavior::<SimMotorController>::start(&mut gate, &mut Claim::new(&mut act, held));

        let mut ticks = 0;
        while !Behavior::<SimMotorController>::is_finished(&gate) {
            let mut ctx = BehaviorContext {
                claim: Claim::new(&mut act, held),
                input: &input,
            };
            gate.step(&mut ctx);
            ticks += 1;
        }
        assert_eq!(ticks, 3);
        assert_eq!(bus.device_state(id).output, 1.0);

        Behavior::<SimMotorController>::stop(&mut gate, &mut Claim::new(&mut act, held), false);
        assert_eq!(bus.calls().last(), Some(&BusCall::SetOutput(id, 0.0)));
        assert_eq!(
            bus.calls()
                .iter()
                .filter(|c| **c == BusCall::SetOutput(id, 1.0))
                .count(),
            3
        );
    }
}
