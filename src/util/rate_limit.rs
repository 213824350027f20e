//! Rate limiting utilities

use std::hash::Hash;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{
    clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter,
};

use crate::game::events::{EventName, PlayerSlot};

/// Keyed rate limiter type alias
pub type KeyedLimiter<K> = RateLimiter<K, DefaultKeyedStateStore<K>, DefaultClock>;

/// Create a keyed rate limiter allowing `per_second` hits per key
pub fn create_keyed_limiter<K>(per_second: u32) -> Arc<KeyedLimiter<K>>
where
    K: Clone + Hash + Eq,
{
    let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::keyed(quota))
}

/// Input-layer guard against attack spam, per player and per attack
#[derive(Clone)]
pub struct IntentThrottle {
    limiter: Arc<KeyedLimiter<(PlayerSlot, EventName)>>,
}

impl IntentThrottle {
    pub fn new(attacks_per_second: u32) -> Self {
        Self {
            limiter: create_keyed_limiter(attacks_per_second),
        }
    }

    /// Check if an intent may be published (movement is never throttled)
    pub fn allow(&self, slot: PlayerSlot, intent: EventName) -> bool {
        if !intent.is_attack() {
            return true;
        }
        self.limiter.check_key(&(slot, intent)).is_ok()
    }
}
