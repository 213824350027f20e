//! Input adapter: key codes and JSON intents into bus events

pub mod protocol;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::game::events::{EventBus, EventName, EventPayload, PlayerSlot};
use crate::util::rate_limit::IntentThrottle;

use self::protocol::IntentMsg;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("no binding for key code {0:?}")]
    UnknownKey(String),

    #[error("malformed intent message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("{0:?} cannot be sent as an intent")]
    NotAnIntent(EventName),
}

/// Key code to (player, intent) table
#[derive(Debug, Clone)]
pub struct KeyBindings {
    keys: HashMap<String, (PlayerSlot, EventName)>,
}

impl KeyBindings {
    pub fn standard() -> Self {
        use EventName::*;
        use PlayerSlot::*;

        let table = [
            ("ArrowLeft", One, MoveLeft),
            ("ArrowRight", One, MoveRight),
            ("ArrowUp", One, Jump),
            ("Space", One, Kick),
            ("Enter", One, Fire),
            ("ShiftRight", One, Throw),
            ("KeyA", Two, MoveLeft),
            ("KeyD", Two, MoveRight),
            ("KeyW", Two, Jump),
            ("KeyF", Two, Kick),
            ("KeyR", Two, Fire),
            ("KeyG", Two, Throw),
        ];
        Self {
            keys: table
                .into_iter()
                .map(|(code, slot, intent)| (code.to_string(), (slot, intent)))
                .collect(),
        }
    }

    pub fn resolve(&self, code: &str) -> Option<(PlayerSlot, EventName)> {
        self.keys.get(code).copied()
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::standard()
    }
}

/// Parse one input line: a JSON intent message or a bare key code
pub fn parse_line(
    bindings: &KeyBindings,
    line: &str,
) -> Result<(PlayerSlot, EventName), InputError> {
    let line = line.trim();
    if line.starts_with('{') {
        let msg: IntentMsg = serde_json::from_str(line)?;
        if !EventName::INTENTS.contains(&msg.intent) {
            return Err(InputError::NotAnIntent(msg.intent));
        }
        return Ok((msg.player, msg.intent));
    }
    bindings
        .resolve(line)
        .ok_or_else(|| InputError::UnknownKey(line.to_string()))
}

/// Feeds intents from a line stream into the bus
pub struct InputSource {
    bindings: KeyBindings,
    throttle: IntentThrottle,
    bus: Arc<EventBus>,
}

impl InputSource {
    pub fn new(bindings: KeyBindings, throttle: IntentThrottle, bus: Arc<EventBus>) -> Self {
        Self {
            bindings,
            throttle,
            bus,
        }
    }

    /// Returns whether an intent was published. Blank and throttled lines
    /// publish nothing.
    pub fn handle_line(&self, line: &str) -> Result<bool, InputError> {
        if line.trim().is_empty() {
            return Ok(false);
        }
        let (slot, intent) = parse_line(&self.bindings, line)?;
        if !self.throttle.allow(slot, intent) {
            warn!(player = ?slot, ?intent, "Rate limited intent");
            return Ok(false);
        }
        debug!(player = ?slot, ?intent, "intent");
        self.bus.publish(intent, &EventPayload::Intent(slot));
        Ok(true)
    }

    /// Read lines until the stream ends
    pub async fn run<R>(&self, reader: R) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if let Err(err) = self.handle_line(&line) {
                warn!(error = %err, "Ignoring input line");
            }
        }
        debug!("input stream closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::EventHandler;
    use crate::game::observer::Subscription;
    use parking_lot::Mutex;

    type Seen = Arc<Mutex<Vec<(EventName, PlayerSlot)>>>;

    fn recording_bus() -> (Arc<EventBus>, Seen, Vec<Subscription>) {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subs = EventName::INTENTS
            .into_iter()
            .map(|name| {
                let log = seen.clone();
                let handler: Arc<EventHandler<EventPayload>> =
                    Arc::new(move |payload: &EventPayload| {
                        if let EventPayload::Intent(slot) = payload {
                            log.lock().push((name, *slot));
                        }
                    });
                bus.subscribe(name, handler)
            })
            .collect();
        (bus, seen, subs)
    }

    #[test]
    fn standard_bindings_cover_both_players() {
        let keys = KeyBindings::standard();
        assert_eq!(keys.resolve("Space"), Some((PlayerSlot::One, EventName::Kick)));
        assert_eq!(keys.resolve("KeyW"), Some((PlayerSlot::Two, EventName::Jump)));
        assert_eq!(keys.resolve("KeyQ"), None);
    }

    #[test]
    fn lines_parse_as_keys_or_json() {
        let keys = KeyBindings::standard();
        assert_eq!(
            parse_line(&keys, "  ArrowLeft \n").unwrap(),
            (PlayerSlot::One, EventName::MoveLeft)
        );
        assert_eq!(
            parse_line(&keys, r#"{"player":"two","intent":"throw"}"#).unwrap(),
            (PlayerSlot::Two, EventName::Throw)
        );
        assert!(matches!(
            parse_line(&keys, "KeyZ"),
            Err(InputError::UnknownKey(code)) if code == "KeyZ"
        ));
        assert!(matches!(
            parse_line(&keys, r#"{"player":"one""#),
            Err(InputError::Malformed(_))
        ));
        assert!(matches!(
            parse_line(&keys, r#"{"player":"one","intent":"kicked"}"#),
            Err(InputError::NotAnIntent(EventName::Kicked))
        ));
    }

    #[test]
    fn repeated_kicks_are_throttled_before_the_bus() {
        let (bus, seen, _subs) = recording_bus();
        let source = InputSource::new(KeyBindings::standard(), IntentThrottle::new(1), bus);

        assert!(source.handle_line("Space").unwrap());
        assert!(!source.handle_line("Space").unwrap());
        assert!(source.handle_line("ArrowRight").unwrap());
        assert!(!source.handle_line("").unwrap());

        assert_eq!(
            *seen.lock(),
            vec![
                (EventName::Kick, PlayerSlot::One),
                (EventName::MoveRight, PlayerSlot::One)
            ]
        );
    }

    #[tokio::test]
    async fn run_skips_bad_lines_and_stops_at_eof() {
        let (bus, seen, _subs) = recording_bus();
        let source = InputSource::new(KeyBindings::standard(), IntentThrottle::new(5), bus);

        let input: &[u8] = b"KeyA\nnonsense\n{\"player\":\"two\",\"intent\":\"fire\"}\n";
        source.run(input).await.unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                (EventName::MoveLeft, PlayerSlot::Two),
                (EventName::Fire, PlayerSlot::Two)
            ]
        );
    }
}
