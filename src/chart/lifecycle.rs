use tracing::debug;

use super::layout::{LayoutEngine, SimulationFrame};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    ReleaseLevelPins,
    SearchDebounce,
    ResizeDebounce,
}

#[derive(Clone, Copy, Debug)]
struct Timer {
    kind: TimerKind,
    due_at: f64,
}

/// Named one-shot timers plus the pending frame request. Time is seconds on
/// the host clock; nothing fires on its own, `take_due` has to be polled.
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: Vec<Timer>,
    frame_requested: bool,
}

impl Scheduler {
    /// Re-scheduling a kind replaces its previous deadline.
    pub fn schedule(&mut self, kind: TimerKind, now: f64, delay_secs: f64) {
        self.cancel(kind);
        self.timers.push(Timer {
            kind,
            due_at: now + delay_secs,
        });
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.timers.retain(|timer| timer.kind != kind);
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.timers.iter().any(|timer| timer.kind == kind)
    }

    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }

    /// Removes and returns every timer due at `now`, earliest first.
    pub fn take_due(&mut self, now: f64) -> Vec<TimerKind> {
        let mut due = Vec::new();
        self.timers.retain(|timer| {
            if timer.due_at <= now {
                due.push(*timer);
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.due_at.total_cmp(&b.due_at));
        due.into_iter().map(|timer| timer.kind).collect()
    }

    pub fn request_frame(&mut self) {
        self.frame_requested = true;
    }

    pub fn take_frame_request(&mut self) -> bool {
        std::mem::take(&mut self.frame_requested)
    }

    pub fn frame_requested(&self) -> bool {
        self.frame_requested
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
        self.frame_requested = false;
    }
}

/// Owns the running engine and every deferred callback that can touch it.
#[derive(Default)]
pub struct SimulationLifecycle {
    engine: Option<LayoutEngine>,
    scheduler: Scheduler,
    stopped: bool,
}

impl SimulationLifecycle {
    /// Swaps in a freshly built engine: levels pinned now, released later.
    pub fn start(&mut self, mut engine: LayoutEngine, now: f64) {
        if self.stopped {
            debug!("ignoring simulation start after teardown");
            return;
        }

        if let Some(previous) = self.engine.as_mut() {
            previous.stop();
        }

        engine.pin_levels();
        let release_after = engine.config().level_pin_release_secs;
        self.engine = Some(engine);
        self.scheduler
            .schedule(TimerKind::ReleaseLevelPins, now, release_after);
        self.scheduler.request_frame();
    }

    /// Fires due timers. Level-pin release is handled here; the remaining
    /// kinds are handed back to the owner.
    pub fn fire_due(&mut self, now: f64) -> Vec<TimerKind> {
        if self.stopped {
            return Vec::new();
        }

        let mut rest = Vec::new();
        for kind in self.scheduler.take_due(now) {
            match kind {
                TimerKind::ReleaseLevelPins => {
                    if let Some(engine) = self.engine.as_mut() {
                        engine.release_level_pins();
                    }
                }
                other => rest.push(other),
            }
        }
        rest
    }

    /// Advances one tick; `None` once stopped or before the first start.
    pub fn tick(&mut self) -> Option<SimulationFrame> {
        if self.stopped {
            return None;
        }
        let engine = self.engine.as_mut()?;
        if !engine.tick() {
            return None;
        }
        self.scheduler.request_frame();
        Some(engine.frame())
    }

    /// Single teardown path: stops the engine and drops every timer and
    /// frame request. Idempotent.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(engine) = self.engine.as_mut() {
            engine.stop();
        }
        self.scheduler.cancel_all();
        debug!("simulation lifecycle stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn engine(&self) -> Option<&LayoutEngine> {
        self.engine.as_ref()
    }

    /// Mutable access for intents; `None` after teardown.
    pub fn engine_mut(&mut self) -> Option<&mut LayoutEngine> {
        if self.stopped {
            return None;
        }
        self.engine.as_mut()
    }

    pub fn schedule(&mut self, kind: TimerKind, now: f64, delay_secs: f64) {
        if !self.stopped {
            self.scheduler.schedule(kind, now, delay_secs);
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use eframe::egui::vec2;

    use super::*;
    use crate::chart::layout::LayoutConfig;
    use crate::org::derive_active_subset;
    use crate::org::fixtures::small_catalog;

    fn engine() -> LayoutEngine {
        let catalog = small_catalog();
        let subset = derive_active_subset(&catalog, "", &BTreeSet::new());
        LayoutEngine::build(
            &subset,
            vec2(800.0, 600.0),
            catalog.departments(),
            LayoutConfig::default(),
            None,
        )
    }

    #[test]
    fn rescheduling_replaces_the_deadline() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(TimerKind::SearchDebounce, 0.0, 0.3);
        scheduler.schedule(TimerKind::SearchDebounce, 0.2, 0.3);
        assert!(scheduler.take_due(0.4).is_empty());
        assert_eq!(scheduler.take_due(0.5), vec![TimerKind::SearchDebounce]);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn due_timers_fire_in_deadline_order() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(TimerKind::ResizeDebounce, 0.0, 0.25);
        scheduler.schedule(TimerKind::SearchDebounce, 0.0, 0.1);
        assert_eq!(
            scheduler.take_due(1.0),
            vec![TimerKind::SearchDebounce, TimerKind::ResizeDebounce]
        );
    }

    #[test]
    fn level_pins_release_after_the_grace_period() {
        let mut lifecycle = SimulationLifecycle::default();
        lifecycle.start(engine(), 10.0);

        assert!(lifecycle.fire_due(10.5).is_empty());
        assert!(lifecycle.engine().unwrap().node_state("engineer1").unwrap().fy.is_some());

        lifecycle.fire_due(11.0);
        let engine = lifecycle.engine().unwrap();
        assert_eq!(engine.node_state("engineer1").unwrap().fy, None);
        assert!(engine.node_state("grp-engineering").unwrap().fy.is_some());
    }

    #[test]
    fn stop_cancels_everything_and_freezes_positions() {
        let mut lifecycle = SimulationLifecycle::default();
        lifecycle.start(engine(), 0.0);
        lifecycle.schedule(TimerKind::SearchDebounce, 0.0, 0.3);
        assert!(lifecycle.tick().is_some());
        let before = lifecycle.engine().unwrap().node_state("cto").unwrap();

        lifecycle.stop();
        assert!(lifecycle.is_stopped());
        assert_eq!(lifecycle.scheduler().pending_count(), 0);
        assert!(!lifecycle.scheduler().frame_requested());

        assert!(lifecycle.fire_due(100.0).is_empty());
        assert!(lifecycle.tick().is_none());
        assert!(lifecycle.engine_mut().is_none());
        lifecycle.schedule(TimerKind::ResizeDebounce, 0.0, 0.1);
        assert_eq!(lifecycle.scheduler().pending_count(), 0);
        assert_eq!(lifecycle.engine().unwrap().node_state("cto").unwrap(), before);

        lifecycle.start(engine(), 1.0);
        assert!(lifecycle.tick().is_none());
    }

    #[test]
    fn restarting_stops_the_previous_engine() {
        let mut lifecycle = SimulationLifecycle::default();
        lifecycle.start(engine(), 0.0);
        lifecycle.start(engine(), 0.5);
        assert!(lifecycle.engine().unwrap().is_running());
        assert_eq!(lifecycle.scheduler().pending_count(), 1);
    }
}
