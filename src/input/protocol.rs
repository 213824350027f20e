//! Line protocol message definitions
//! JSON intents accepted on the input stream next to raw key codes

use serde::{Deserialize, Serialize};

use crate::game::events::{EventName, PlayerSlot};

/// One intent addressed to a player, e.g. `{"player":"one","intent":"kick"}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentMsg {
    /// Which combatant the intent targets
    pub player: PlayerSlot,
    /// The action requested
    pub intent: EventName,
}
