//! Cooperative behavior scheduler.
//!
//! Units are registered once and then scheduled, cancelled and
//! re-scheduled by id.  Each tick, [`BehaviorScheduler::run`] advances
//! every active unit in registration order and retires the ones whose
//! completion predicate holds.
//!
//! ```text
//!  schedule(B) ──▶ holders of B's requirements? ──yes──▶ stop(true) each
//!                              │                               │
//!                              no ◀────────────────────────────┘
//!                              ▼
//!                          B.start()  ──▶  Active
//!
//!  run() ──▶ for each Active: step ─▶ finished? ─▶ stop(false)
//!                                                  ─▶ latch init flags
//!                                                  ─▶ Finished
//! ```
//!
//! At most one active unit holds any actuator.  A preempted unit's
//! `stop` always completes before the new unit's `start` runs.

use log::{info, warn};

use crate::app::events::RobotEvent;
use crate::app::input::InputSnapshot;
use crate::app::ports::{EventSink, MotorController};
use crate::behavior::{Behavior, BehaviorContext, BehaviorId, Claim, Phase, Requirements};
use crate::error::{Error, Result};
use crate::motor::{ActuatorId, Actuators};

/// Maximum number of registered units (stack-allocated table).
pub const MAX_BEHAVIORS: usize = 16;

struct Slot<D: MotorController> {
    unit: Box<dyn Behavior<D>>,
    phase: Phase,
}

pub struct BehaviorScheduler<D: MotorController> {
    slots: heapless::Vec<Slot<D>, MAX_BEHAVIORS>,
}

impl<D: MotorController> Default for BehaviorScheduler<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: MotorController> BehaviorScheduler<D> {
    pub fn new() -> Self {
        Self {
            slots: heapless::Vec::new(),
        }
    }

    /// Add a unit in the Idle phase.
    pub fn register(&mut self, unit: Box<dyn Behavior<D>>) -> Result<BehaviorId> {
        let id = BehaviorId(self.slots.len());
        let name = unit.name();
        self.slots
            .push(Slot {
                unit,
                phase: Phase::Idle,
            })
            .map_err(|_| Error::SchedulerFull)?;
        info!("Scheduler: registered '{}' as #{}", name, id.0);
        Ok(id)
    }

    /// Activate `id`, first stopping (interrupted) every active unit that
    /// holds one of its requirements.
    ///
    /// Returns `false` if `id` is unknown or already active.
    pub fn schedule(
        &mut self,
        id: BehaviorId,
        actuators: &mut Actuators<D>,
        sink: &mut impl EventSink,
    ) -> bool {
        let Some(slot) = self.slots.get(id.0) else {
            warn!("Scheduler: unknown behavior #{}", id.0);
            return false;
        };
        if slot.phase == Phase::Active {
            return false;
        }
        let requirements = slot.unit.requirements();
        let by = slot.unit.name();

        for (i, other) in self.slots.iter_mut().enumerate() {
            if i == id.0 || other.phase != Phase::Active {
                continue;
            }
            let held = other.unit.requirements();
            if !held.intersects(requirements) {
                continue;
            }
            let name = other.unit.name();
            warn!("Scheduler: '{}' preempted by '{}'", name, by);
            other.unit.stop(&mut Claim::new(actuators, held), true);
            other.phase = Phase::Finished;
            sink.emit(&RobotEvent::BehaviorPreempted { name, by });
        }

        let slot = &mut self.slots[id.0];
        slot.unit.start(&mut Claim::new(actuators, requirements));
        slot.phase = Phase::Active;
        info!("Scheduler: started '{}'", by);
        sink.emit(&RobotEvent::BehaviorStarted(by));
        true
    }

    /// Stop `id` (interrupted) if it is active.  Returns whether it was.
    pub fn cancel(
        &mut self,
        id: BehaviorId,
        actuators: &mut Actuators<D>,
        sink: &mut impl EventSink,
    ) -> bool {
        let Some(slot) = self.slots.get_mut(id.0) else {
            return false;
        };
        if slot.phase != Phase::Active {
            return false;
        }
        Self::interrupt(slot, actuators, sink);
        true
    }

    /// Stop every active unit (interrupted), in registration order.
    pub fn cancel_all(&mut self, actuators: &mut Actuators<D>, sink: &mut impl EventSink) {
        for slot in self.slots.iter_mut().filter(|s| s.phase == Phase::Active) {
            Self::interrupt(slot, actuators, sink);
        }
    }

    /// Advance every active unit by one step and retire finished ones.
    pub fn run(
        &mut self,
        actuators: &mut Actuators<D>,
        input: &InputSnapshot,
        sink: &mut impl EventSink,
    ) {
        for slot in self.slots.iter_mut().filter(|s| s.phase == Phase::Active) {
            let held = slot.unit.requirements();
            let mut ctx = BehaviorContext {
                claim: Claim::new(actuators, held),
                input,
            };
            slot.unit.step(&mut ctx);

            if !slot.unit.is_finished() {
                continue;
            }
            let name = slot.unit.name();
            slot.unit.stop(&mut Claim::new(actuators, held), false);
            slot.phase = Phase::Finished;
            for role in slot.unit.initializes().iter() {
                if actuators.mark_initialized(role) {
                    sink.emit(&RobotEvent::ActuatorInitialized(role));
                }
            }
            info!("Scheduler: '{}' finished", name);
            sink.emit(&RobotEvent::BehaviorFinished(name));
        }
    }

    pub fn phase(&self, id: BehaviorId) -> Option<Phase> {
        self.slots.get(id.0).map(|s| s.phase)
    }

    pub fn is_active(&self, id: BehaviorId) -> bool {
        self.phase(id) == Some(Phase::Active)
    }

    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.phase == Phase::Active)
            .count()
    }

    pub fn name(&self, id: BehaviorId) -> Option<&'static str> {
        self.slots.get(id.0).map(|s| s.unit.name())
    }

    pub fn requirements(&self, id: BehaviorId) -> Option<Requirements> {
        self.slots.get(id.0).map(|s| s.unit.requirements())
    }

    /// Active unit currently holding `role`.
    pub fn holder_of(&self, role: ActuatorId) -> Option<BehaviorId> {
        self.slots
            .iter()
            .position(|s| s.phase == Phase::Active && s.unit.requirements().contains(role))
            .map(BehaviorId)
    }

    /// Every registered id, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = BehaviorId> + use<D> {
        (0..self.slots.len()).map(BehaviorId)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn interrupt(slot: &mut Slot<D>, actuators: &mut Actuators<D>, sink: &mut impl EventSink) {
        let name = slot.unit.name();
        let held = slot.unit.requirements();
        slot.unit.stop(&mut Claim::new(actuators, held), true);
        slot.phase = Phase::Finished;
        info!("Scheduler: '{}' cancelled", name);
        sink.emit(&RobotEvent::BehaviorCancelled(name));
    }
}
