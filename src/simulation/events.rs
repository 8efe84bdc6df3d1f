//! Fire-and-forget notifications from the simulation to audio/UI listeners.

use std::sync::{Arc, Mutex};

/// Listener for simulation events. Every method defaults to a no-op.
pub trait GameEventHandler: Send + Sync {
    fn on_point_combustion_begin(&self) {}

    fn on_point_combustion_end(&self) {}

    fn on_combustion_smothered(&self) {}

    /// Points of `material` were destroyed.
    fn on_destroy(&self, _material: &str, _is_underwater: bool, _count: usize) {}

    /// Springs of `material` broke under stress.
    fn on_break(&self, _material: &str, _is_underwater: bool, _count: usize) {}

    fn on_spring_repaired(&self, _material: &str, _count: usize) {}

    fn on_sinking_begin(&self, _ship_id: usize) {}

    fn on_light_flicker(&self, _is_underwater: bool) {}

    fn on_air_bubble_surfaced(&self, _count: usize) {}

    fn on_water_taken(&self, _quantity: f32) {}
}

/// Handler that ignores everything.
#[derive(Debug, Default)]
pub struct NullEventHandler;

impl GameEventHandler for NullEventHandler {}

/// One recorded notification.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    CombustionBegin,
    CombustionEnd,
    CombustionSmothered,
    Destroy {
        material: String,
        is_underwater: bool,
        count: usize,
    },
    Break {
        material: String,
        is_underwater: bool,
        count: usize,
    },
    SpringRepaired {
        material: String,
        count: usize,
    },
    SinkingBegin {
        ship_id: usize,
    },
    LightFlicker {
        is_underwater: bool,
    },
    AirBubbleSurfaced {
        count: usize,
    },
}

/// Handler that buffers events until drained.
///
/// Water intake is too frequent to record one event per step; it is summed instead.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<GameEvent>>,
    water_taken: Mutex<f32>,
}

impl EventRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, event: GameEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// Take all events recorded so far.
    pub fn drain(&self) -> Vec<GameEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }

    /// Take the water intake accumulated so far.
    pub fn drain_water_taken(&self) -> f32 {
        self.water_taken
            .lock()
            .map(|mut total| std::mem::take(&mut *total))
            .unwrap_or_default()
    }

    pub fn count(&self, predicate: impl Fn(&GameEvent) -> bool) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| predicate(e)).count())
            .unwrap_or_default()
    }
}

impl GameEventHandler for EventRecorder {
    fn on_point_combustion_begin(&self) {
        self.push(GameEvent::CombustionBegin);
    }

    fn on_point_combustion_end(&self) {
        self.push(GameEvent::CombustionEnd);
    }

    fn on_combustion_smothered(&self) {
        self.push(GameEvent::CombustionSmothered);
    }

    fn on_destroy(&self, material: &str, is_underwater: bool, count: usize) {
        self.push(GameEvent::Destroy {
            material: material.to_string(),
            is_underwater,
            count,
        });
    }

    fn on_break(&self, material: &str, is_underwater: bool, count: usize) {
        self.push(GameEvent::Break {
            material: material.to_string(),
            is_underwater,
            count,
        });
    }

    fn on_spring_repaired(&self, material: &str, count: usize) {
        self.push(GameEvent::SpringRepaired {
            material: material.to_string(),
            count,
        });
    }

    fn on_sinking_begin(&self, ship_id: usize) {
        self.push(GameEvent::SinkingBegin { ship_id });
    }

    fn on_light_flicker(&self, is_underwater: bool) {
        self.push(GameEvent::LightFlicker { is_underwater });
    }

    fn on_air_bubble_surfaced(&self, count: usize) {
        self.push(GameEvent::AirBubbleSurfaced { count });
    }

    fn on_water_taken(&self, quantity: f32) {
        if let Ok(mut total) = self.water_taken.lock() {
            *total += quantity;
        }
    }
}

/// Shared handle the simulation fires events through.
pub type SharedEventHandler = Arc<dyn GameEventHandler>;
