//! Game core: grid, motion, commands and match wiring

pub mod command;
pub mod events;
pub mod executor;
pub mod grid;
pub mod r#match;
pub mod movement;
pub mod observer;
pub mod reactive;
pub mod state;
pub mod tasks;
pub mod view;

pub use command::{Arena, Command, CommandKind, CommandOutcome, Timing};
pub use events::{EventBus, EventName, EventPayload, PlayerSlot};
pub use executor::CommandExecutor;
pub use grid::{Cell, Direction, Grid};
pub use movement::{Movement, StopCause};
pub use r#match::{GameMatch, MatchEvent, RoundResult};
pub use view::{AudioSink, EntityView, Renderer};
