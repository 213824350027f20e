//! Match wiring: combatants, grid side effects, intents and the win condition

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::util::time::Timer;

use super::command::{Arena, Command, CommandKind};
use super::events::{EventBus, EventName, EventPayload, PlayerSlot};
use super::executor::CommandExecutor;
use super::grid::{rect, Direction, Grid, Interaction};
use super::observer::Subscription;
use super::reactive::Change;
use super::state::{CombatantField, CombatantState, CombatantValue, Flag};
use super::view::{AudioSink, EntityView, Panel, Renderer, ScoreBoard, ScoreLine, ViewKind};

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundResult {
    pub winner: String,
    pub loser: String,
    pub duration_ms: u64,
}

/// Broadcast to whoever watches the match
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    Struck { target: String, health: u32 },
    RoundOver(RoundResult),
}

/// Capitalised display name for a character identity
pub fn display_name(character: &str) -> String {
    let mut chars = character.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One match: owns the grid, both combatants and their command queues
pub struct GameMatch {
    id: Uuid,
    arena: Arena,
    bus: Arc<EventBus>,
    renderer: Arc<dyn Renderer>,
    combatants: [Arc<EntityView>; 2],
    executors: [CommandExecutor; 2],
    score: Arc<EntityView>,
    events_tx: broadcast::Sender<MatchEvent>,
    subscriptions: Mutex<Vec<Subscription>>,
    round_over: AtomicBool,
    result: Mutex<Option<RoundResult>>,
    timer: Timer,
}

impl GameMatch {
    /// Create a match and wire its listeners. Must be called inside a tokio
    /// runtime since the command executors are spawned here.
    pub fn new(
        config: &Config,
        renderer: Arc<dyn Renderer>,
        audio: Arc<dyn AudioSink>,
    ) -> Result<Arc<Self>, MatchError> {
        let id = Uuid::new_v4();
        let grid = Grid::new(config.arena_width, config.arena_height);

        let (w, h) = (config.character_width, config.character_height);
        let one_cells = rect(config.spawn_offset, 0, w, h);
        let two_cells = rect(config.arena_width - w - config.spawn_offset, 0, w, h);
        if grid.is_out_of_view(&one_cells) || grid.is_out_of_view(&two_cells) {
            return Err(MatchError::InvalidLayout(format!(
                "{w}x{h} combatants do not fit a {}x{} arena",
                config.arena_width, config.arena_height
            )));
        }
        if one_cells.iter().any(|c| two_cells.contains(c)) {
            return Err(MatchError::InvalidLayout(
                "starting footprints overlap".to_string(),
            ));
        }

        let one = EntityView::combatant(
            CombatantState::new(display_name(&config.player_one), &config.player_one, true),
            one_cells,
            renderer.clone(),
        );
        let two = EntityView::combatant(
            CombatantState::new(display_name(&config.player_two), &config.player_two, false),
            two_cells,
            renderer.clone(),
        );
        grid.add_entity_view(one.clone());
        grid.add_entity_view(two.clone());

        let lines = [&one, &two]
            .iter()
            .filter_map(|view| view.combatant_state())
            .map(|state| ScoreLine {
                name: state.name(),
                health: state.health(),
            })
            .collect();
        let score = EntityView::panel(Panel::Score(ScoreBoard::new(lines)), renderer.clone());
        grid.add_entity_view(score.clone());

        let executors = [
            CommandExecutor::spawn(display_name(&config.player_one)),
            CommandExecutor::spawn(display_name(&config.player_two)),
        ];
        let (events_tx, _) = broadcast::channel(64);

        let game = Arc::new(Self {
            id,
            arena: Arena::new(grid, config.timing(), audio),
            bus: Arc::new(EventBus::new()),
            renderer,
            combatants: [one, two],
            executors,
            score,
            events_tx,
            subscriptions: Mutex::new(Vec::new()),
            round_over: AtomicBool::new(false),
            result: Mutex::new(None),
            timer: Timer::new(),
        });
        game.wire();

        info!(
            match_id = %id,
            one = %config.player_one,
            two = %config.player_two,
            width = config.arena_width,
            height = config.arena_height,
            "Match started"
        );
        Ok(game)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn grid(&self) -> &Arc<Grid> {
        &self.arena.grid
    }

    /// Bus that input sources publish intents on
    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    pub fn combatant(&self, slot: PlayerSlot) -> &Arc<EntityView> {
        &self.combatants[slot.index()]
    }

    pub fn executor(&self, slot: PlayerSlot) -> &CommandExecutor {
        &self.executors[slot.index()]
    }

    pub fn score(&self) -> &Arc<EntityView> {
        &self.score
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<MatchEvent> {
        self.events_tx.subscribe()
    }

    pub fn is_over(&self) -> bool {
        self.round_over.load(Ordering::SeqCst)
    }

    pub fn result(&self) -> Option<RoundResult> {
        self.result.lock().clone()
    }

    pub fn publish_intent(&self, slot: PlayerSlot, intent: EventName) {
        self.bus.publish(intent, &EventPayload::Intent(slot));
    }

    /// Drop every listener and abort background flights and timers
    pub fn shutdown(&self) {
        self.release_listeners();
        self.bus.clear();
        self.arena.tasks.abort_all();
        info!(match_id = %self.id, "Match shut down");
    }

    fn wire(self: &Arc<Self>) {
        let mut subs = Vec::new();
        let grid = &self.arena.grid;

        let game = Arc::downgrade(self);
        subs.push(grid.subscribe_on_move(Arc::new(move |_: &Arc<EntityView>| {
            if let Some(game) = game.upgrade() {
                game.on_moved();
            }
        })));

        let bus = Arc::downgrade(&self.bus);
        subs.push(grid.subscribe_on_interaction(Arc::new(move |i: &Interaction| {
            if let Some(bus) = bus.upgrade() {
                let payload = EventPayload::Kicked {
                    source: i.source.id(),
                    target: i.target.id(),
                };
                bus.publish(EventName::Kicked, &payload);
            }
        })));

        let game = Arc::downgrade(self);
        subs.push(self.bus.subscribe(
            EventName::Kicked,
            Arc::new(move |payload: &EventPayload| {
                if let (Some(game), EventPayload::Kicked { target, .. }) = (game.upgrade(), payload)
                {
                    game.on_kicked(*target);
                }
            }),
        ));

        for intent in EventName::INTENTS {
            let game = Arc::downgrade(self);
            subs.push(self.bus.subscribe(
                intent,
                Arc::new(move |payload: &EventPayload| {
                    if let (Some(game), EventPayload::Intent(slot)) = (game.upgrade(), payload) {
                        game.on_intent(intent, *slot);
                    }
                }),
            ));
        }

        for slot in PlayerSlot::BOTH {
            subs.extend(self.watch_combatant(slot));
        }

        self.subscriptions.lock().extend(subs);
    }

    /// Score refresh and audio cues driven by one combatant's state
    fn watch_combatant(&self, slot: PlayerSlot) -> Vec<Subscription> {
        let Some(state) = self.combatant(slot).combatant_state() else {
            return Vec::new();
        };
        let character = state.read(|s| s.character.clone());
        let mut subs = Vec::new();

        let score = Arc::downgrade(&self.score);
        subs.push(state.on_field_change(
            CombatantField::Health,
            Arc::new(move |change: &Change<'_, CombatantState>| {
                let (Some(score), CombatantValue::Health(health)) = (score.upgrade(), &change.new)
                else {
                    return;
                };
                if let ViewKind::Panel(Panel::Score(board)) = score.kind() {
                    board.set_health(slot.index(), *health);
                    score.render();
                }
            }),
        ));

        let cues = [
            (Flag::Kicking, format!("{character}/kicking")),
            (Flag::Jumping, format!("{character}/jumping")),
            (Flag::Kicked, "kicked".to_string()),
        ];
        for (flag, cue) in cues {
            let audio = self.arena.audio.clone();
            subs.push(state.on_field_change(
                CombatantField::Flag(flag),
                Arc::new(move |change: &Change<'_, CombatantState>| {
                    if change.new == CombatantValue::Flag(true) {
                        audio.play(&cue);
                    }
                }),
            ));
        }
        subs
    }

    fn release_listeners(&self) {
        let subs: Vec<Subscription> = self.subscriptions.lock().drain(..).collect();
        for sub in subs {
            sub.unsubscribe();
        }
    }

    fn submit(&self, slot: PlayerSlot, kind: CommandKind) {
        let name = kind.name();
        let command = Command::new(kind, self.combatant(slot).clone(), self.arena.clone());
        if let Err(err) = self.executor(slot).submit(command) {
            warn!(match_id = %self.id, player = ?slot, command = name, %err, "Dropped command");
        }
    }

    fn on_intent(&self, intent: EventName, slot: PlayerSlot) {
        let kind = match intent {
            EventName::MoveLeft => CommandKind::MoveOnce(Direction::Left),
            EventName::MoveRight => CommandKind::MoveOnce(Direction::Right),
            EventName::Jump => CommandKind::Jump,
            EventName::Kick => CommandKind::Kick,
            EventName::Fire => CommandKind::Fire,
            EventName::Throw => CommandKind::Throw,
            EventName::Kicked => return,
        };
        self.submit(slot, kind);
    }

    /// Per-move pass over both combatants: passive landing and facing
    fn on_moved(&self) {
        for slot in PlayerSlot::BOTH {
            let me = self.combatant(slot);
            let other = self.combatant(slot.other());
            let Some(state) = me.combatant_state() else {
                continue;
            };

            let snapshot = state.get_all();
            let held_up = snapshot.is_jumping || snapshot.is_landing || snapshot.is_thrown;
            if !held_up && self.arena.grid.can_move(me, Direction::Down.delta()) {
                self.submit(slot, CommandKind::TryLand);
            }

            let (Some(mine), Some(theirs)) = (me.bounds(), other.bounds()) else {
                continue;
            };
            let right = snapshot.is_directed_right;
            // equal x keeps the current facing
            let flip = if right {
                mine.min_x > theirs.min_x
            } else {
                mine.min_x < theirs.min_x
            };
            if flip {
                debug!(match_id = %self.id, player = ?slot, right = !right, "facing flipped");
                if let Err(err) = state.set_flag(Flag::DirectedRight, !right) {
                    warn!(match_id = %self.id, %err, "Failed to flip facing");
                }
            }
        }
    }

    fn on_kicked(&self, target: Uuid) {
        if self.is_over() {
            return;
        }
        let Some(slot) = PlayerSlot::BOTH
            .into_iter()
            .find(|slot| self.combatant(*slot).id() == target)
        else {
            return;
        };
        let Some(state) = self.combatant(slot).combatant_state() else {
            return;
        };

        let health = state.health().saturating_sub(1);
        if let Err(err) = state.set_health(health) {
            warn!(match_id = %self.id, %err, "Failed to update health");
            return;
        }
        let name = state.name();
        info!(match_id = %self.id, target = %name, health, "Combatant struck");
        let _ = self.events_tx.send(MatchEvent::Struck {
            target: name,
            health,
        });

        if health == 0 {
            self.finish_round(slot.other());
        }
    }

    fn finish_round(&self, winner: PlayerSlot) {
        if self.round_over.swap(true, Ordering::SeqCst) {
            return;
        }
        self.release_listeners();

        let name_of = |slot: PlayerSlot| {
            self.combatant(slot)
                .combatant_state()
                .map(|state| state.name())
                .unwrap_or_default()
        };
        let result = RoundResult {
            winner: name_of(winner),
            loser: name_of(winner.other()),
            duration_ms: self.timer.elapsed_ms(),
        };

        let panel = EntityView::panel(
            Panel::RoundOver {
                winner: result.winner.clone(),
            },
            self.renderer.clone(),
        );
        self.arena.grid.add_entity_view(panel);

        info!(
            match_id = %self.id,
            winner = %result.winner,
            loser = %result.loser,
            duration_ms = result.duration_ms,
            "Round over"
        );
        *self.result.lock() = Some(result.clone());
        let _ = self.events_tx.send(MatchEvent::RoundOver(result));
    }
}

impl Drop for GameMatch {
    fn drop(&mut self) {
        self.arena.tasks.abort_all();
    }
}
