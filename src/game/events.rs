//! Named in-process events between input sources and the match

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

use super::observer::{Observers, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    pub const BOTH: [PlayerSlot; 2] = [PlayerSlot::One, PlayerSlot::Two];

    pub fn index(self) -> usize {
        match self {
            PlayerSlot::One => 0,
            PlayerSlot::Two => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            PlayerSlot::One => PlayerSlot::Two,
            PlayerSlot::Two => PlayerSlot::One,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    MoveLeft,
    MoveRight,
    Jump,
    Kick,
    Fire,
    Throw,
    /// A combatant was struck
    Kicked,
}

impl EventName {
    /// Names an input source may publish
    pub const INTENTS: [EventName; 6] = [
        EventName::MoveLeft,
        EventName::MoveRight,
        EventName::Jump,
        EventName::Kick,
        EventName::Fire,
        EventName::Throw,
    ];

    /// Intents throttled at the input layer
    pub fn is_attack(self) -> bool {
        matches!(self, EventName::Kick | EventName::Fire | EventName::Throw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPayload {
    Intent(PlayerSlot),
    Kicked { source: Uuid, target: Uuid },
}

pub type EventHandler<P> = dyn Fn(&P) + Send + Sync;

/// Synchronous publish/subscribe keyed by event name
pub struct EventBus<K = EventName, P = EventPayload> {
    subs: DashMap<K, Observers<EventHandler<P>>>,
}

impl<K, P> EventBus<K, P>
where
    K: Copy + Eq + Hash + Debug,
    P: 'static,
{
    pub fn new() -> Self {
        Self {
            subs: DashMap::new(),
        }
    }

    /// Subscribing the same handler twice under one name is a no-op
    pub fn subscribe(&self, name: K, handler: Arc<EventHandler<P>>) -> Subscription {
        self.subs.entry(name).or_default().subscribe(handler)
    }

    /// Run every handler for `name` in subscription order
    pub fn publish(&self, name: K, payload: &P) {
        // clone out of the map so handlers may subscribe or publish
        let observers = self.subs.get(&name).map(|entry| entry.value().clone());
        let Some(observers) = observers else {
            trace!(event = ?name, "no subscribers");
            return;
        };
        for handler in observers.snapshot() {
            handler(payload);
        }
    }

    pub fn subscriber_count(&self, name: K) -> usize {
        self.subs.get(&name).map_or(0, |entry| entry.len())
    }

    pub fn clear(&self) {
        for entry in self.subs.iter() {
            entry.value().clear();
        }
    }
}

impl<K, P> Default for EventBus<K, P>
where
    K: Copy + Eq + Hash + Debug,
    P: 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
