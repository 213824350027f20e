//! Combatant actions
//!
//! Each [`Command`] is a short async routine over the motion engine. Commands
//! are queued per combatant by the executor; anything that must outlive the
//! queue slot (projectile flights, throws, flag timers) is spawned onto the
//! arena's [`BackgroundTasks`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};
use uuid::Uuid;

use super::grid::{Cell, Direction, Grid, Interaction, InteractionKind};
use super::movement::{
    constant, Blocking, MotionError, MovePolicy, Movement, StepRule, StopCause, UNBOUNDED,
};
use super::reactive::{Reactive, StateError};
use super::state::{CombatantState, Flag};
use super::tasks::BackgroundTasks;
use super::view::{AudioSink, EntityView};

pub const FIRE_CUE: &str = "fire";

/// Rows above the footprint's bottom edge where a projectile spawns
const PROJECTILE_LIFT: i32 = 2;

/// Durations and step counts for timed actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub jump_height: u32,
    pub jump_step: Duration,
    pub fire_step: Duration,
    pub kick_duration: Duration,
    pub hit_duration: Duration,
    /// Rising half of the throw arc; the full arc is twice this
    pub throw_height: u32,
    pub throw_step: Duration,
    pub throw_release: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            jump_height: 10,
            jump_step: Duration::from_millis(100),
            fire_step: Duration::from_millis(100),
            kick_duration: Duration::from_millis(1000),
            hit_duration: Duration::from_millis(1000),
            throw_height: 4,
            throw_step: Duration::from_millis(80),
            throw_release: Duration::from_millis(300),
        }
    }
}

/// Everything a command touches besides its actor
#[derive(Clone)]
pub struct Arena {
    pub grid: Arc<Grid>,
    pub timing: Timing,
    pub audio: Arc<dyn AudioSink>,
    pub tasks: Arc<BackgroundTasks>,
}

impl Arena {
    pub fn new(grid: Arc<Grid>, timing: Timing, audio: Arc<dyn AudioSink>) -> Self {
        Self {
            grid,
            timing,
            audio,
            tasks: Arc::new(BackgroundTasks::new()),
        }
    }

    /// Reset `flag` on `view` once `after` has elapsed
    fn clear_flag_later(&self, view: Arc<EntityView>, flag: Flag, after: Duration) {
        self.tasks.spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(state) = view.combatant_state() {
                if let Err(err) = state.set_flag(flag, false) {
                    warn!(view_id = %view.id(), ?flag, %err, "failed to clear flag");
                }
            }
        });
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Motion(#[from] MotionError),

    #[error(transparent)]
    State(#[from] StateError),
}

#[derive(Clone)]
pub enum CommandKind {
    MoveOnce(Direction),
    Rise,
    Fall,
    Jump,
    TryLand,
    Kick,
    /// The actor is the one being hit
    Hit { source: Arc<EntityView> },
    Fire,
    Throw,
}

impl CommandKind {
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::MoveOnce(_) => "move_once",
            CommandKind::Rise => "rise",
            CommandKind::Fall => "fall",
            CommandKind::Jump => "jump",
            CommandKind::TryLand => "try_land",
            CommandKind::Kick => "kick",
            CommandKind::Hit { .. } => "hit",
            CommandKind::Fire => "fire",
            CommandKind::Throw => "throw",
        }
    }
}

/// What a finished command did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A precondition failed; nothing changed
    Skipped,
    Moved(StopCause),
    Struck { target: Uuid },
    /// A kick or throw found nobody in front
    Missed,
    Launched { projectile: Uuid },
    Thrown { target: Uuid },
}

#[derive(Clone)]
pub struct Command {
    kind: CommandKind,
    actor: Arc<EntityView>,
    arena: Arena,
}

impl Command {
    pub fn new(kind: CommandKind, actor: Arc<EntityView>, arena: Arena) -> Self {
        Self { kind, actor, arena }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn actor(&self) -> &Arc<EntityView> {
        &self.actor
    }

    pub async fn execute(&self) -> Result<CommandOutcome, CommandError> {
        debug!(command = self.name(), actor = %self.actor.id(), "executing");
        let arena = &self.arena;
        let actor = &self.actor;
        match &self.kind {
            CommandKind::MoveOnce(direction) => move_once(arena, actor, *direction).await,
            CommandKind::Rise => rise(arena, actor).await,
            CommandKind::Fall => fall(arena, actor).await,
            CommandKind::Jump => jump(arena, actor).await,
            CommandKind::TryLand => try_land(arena, actor).await,
            CommandKind::Kick => kick(arena, actor).await,
            CommandKind::Hit { source } => hit(arena, actor, source),
            CommandKind::Fire => fire(arena, actor),
            CommandKind::Throw => throw(arena, actor).await,
        }
    }
}

/// Raises a flag when the run commits its first step and lowers it on
/// [`FlagWhileMoving::release`]. Refuses to leave the grid or overlap.
struct FlagWhileMoving<'a> {
    state: &'a Reactive<CombatantState>,
    flag: Flag,
    raised: bool,
    error: Option<StateError>,
}

impl<'a> FlagWhileMoving<'a> {
    fn new(state: &'a Reactive<CombatantState>, flag: Flag) -> Self {
        Self {
            state,
            flag,
            raised: false,
            error: None,
        }
    }

    fn release(self) -> Result<(), StateError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.raised {
            self.state.set_flag(self.flag, false)?;
        }
        Ok(())
    }
}

impl MovePolicy for FlagWhileMoving<'_> {
    fn on_started(&mut self) {
        match self.state.set_flag(self.flag, true) {
            Ok(()) => self.raised = true,
            Err(err) => self.error = Some(err),
        }
    }

    fn on_will_be_out_of_view(&mut self) -> bool {
        false
    }

    fn on_will_intersect(&mut self, _other: &Arc<EntityView>) -> bool {
        false
    }
}

/// Captures a combatant directly in front, without moving. Every view in the
/// cells ahead is checked, so a projectile sharing the cell does not hide it.
struct Probe {
    grid: Arc<Grid>,
    actor: Arc<EntityView>,
    ahead: Vec<Cell>,
    found: Option<Arc<EntityView>>,
}

impl Probe {
    fn new(grid: Arc<Grid>, actor: Arc<EntityView>, direction: Direction) -> Self {
        let delta = direction.delta();
        let ahead = actor.cells().into_iter().map(|c| c.offset(delta)).collect();
        Self {
            grid,
            actor,
            ahead,
            found: None,
        }
    }
}

impl MovePolicy for Probe {
    fn on_will_intersect(&mut self, other: &Arc<EntityView>) -> bool {
        self.found = if other.is_combatant() {
            Some(other.clone())
        } else {
            self.grid
                .intersected_views(&self.actor, &self.ahead)
                .into_iter()
                .find(|view| view.is_combatant())
        };
        self.found.is_none()
    }
}

/// Projectile flight: stops at the edge or on the first combatant that is not
/// the shooter
struct Flight {
    shooter: Uuid,
    struck: Option<Arc<EntityView>>,
}

impl Flight {
    fn strikes(&mut self, other: &Arc<EntityView>) -> bool {
        if other.is_combatant() && other.id() != self.shooter {
            self.struck = Some(other.clone());
            return true;
        }
        false
    }
}

impl MovePolicy for Flight {
    fn on_is_out_of_view(&mut self) -> bool {
        false
    }

    fn on_intersect(&mut self, other: &Arc<EntityView>) -> bool {
        !self.strikes(other)
    }

    fn on_will_be_out_of_view(&mut self) -> bool {
        false
    }

    fn on_will_intersect(&mut self, other: &Arc<EntityView>) -> bool {
        !self.strikes(other)
    }
}

async fn move_once(
    arena: &Arena,
    actor: &Arc<EntityView>,
    direction: Direction,
) -> Result<CommandOutcome, CommandError> {
    let cause = Movement::new(arena.grid.clone(), actor.clone(), constant(direction))
        .run(&mut Blocking)
        .await?;
    Ok(CommandOutcome::Moved(cause))
}

async fn rise(arena: &Arena, actor: &Arc<EntityView>) -> Result<CommandOutcome, CommandError> {
    let Some(state) = actor.combatant_state() else {
        return Ok(CommandOutcome::Skipped);
    };
    if state.read(CombatantState::is_airborne) {
        return Ok(CommandOutcome::Skipped);
    }

    let mut policy = FlagWhileMoving::new(state, Flag::Jumping);
    let cause = Movement::new(arena.grid.clone(), actor.clone(), constant(Direction::Up))
        .steps(arena.timing.jump_height)
        .interval(arena.timing.jump_step)
        .run(&mut policy)
        .await;
    policy.release()?;
    Ok(CommandOutcome::Moved(cause?))
}

async fn fall(arena: &Arena, actor: &Arc<EntityView>) -> Result<CommandOutcome, CommandError> {
    let Some(state) = actor.combatant_state() else {
        return Ok(CommandOutcome::Skipped);
    };
    if state.read(CombatantState::is_airborne) {
        return Ok(CommandOutcome::Skipped);
    }

    let mut policy = FlagWhileMoving::new(state, Flag::Landing);
    let cause = Movement::new(arena.grid.clone(), actor.clone(), constant(Direction::Down))
        .steps(UNBOUNDED)
        .interval(arena.timing.jump_step)
        .run(&mut policy)
        .await;
    policy.release()?;
    Ok(CommandOutcome::Moved(cause?))
}

async fn jump(arena: &Arena, actor: &Arc<EntityView>) -> Result<CommandOutcome, CommandError> {
    let airborne = actor
        .combatant_state()
        .map_or(true, |state| state.read(CombatantState::is_airborne));
    if airborne {
        return Ok(CommandOutcome::Skipped);
    }
    rise(arena, actor).await?;
    fall(arena, actor).await
}

/// Fall only when nothing holds the actor up
async fn try_land(arena: &Arena, actor: &Arc<EntityView>) -> Result<CommandOutcome, CommandError> {
    let busy = actor.combatant_state().map_or(true, |state| {
        state.read(|s| s.is_airborne() || s.is_thrown)
    });
    if busy || !arena.grid.can_move(actor, Direction::Down.delta()) {
        return Ok(CommandOutcome::Skipped);
    }
    fall(arena, actor).await
}

async fn probe(
    arena: &Arena,
    actor: &Arc<EntityView>,
    direction: Direction,
) -> Result<Option<Arc<EntityView>>, MotionError> {
    let mut policy = Probe::new(arena.grid.clone(), actor.clone(), direction);
    Movement::new(arena.grid.clone(), actor.clone(), constant(direction))
        .simulate()
        .run(&mut policy)
        .await?;
    Ok(policy.found)
}

async fn kick(arena: &Arena, actor: &Arc<EntityView>) -> Result<CommandOutcome, CommandError> {
    let Some(state) = actor.combatant_state() else {
        return Ok(CommandOutcome::Skipped);
    };
    state.set_flag(Flag::Kicking, true)?;
    arena.clear_flag_later(actor.clone(), Flag::Kicking, arena.timing.kick_duration);

    let facing = Direction::facing(state.flag(Flag::DirectedRight));
    match probe(arena, actor, facing).await? {
        Some(target) => hit(arena, &target, actor),
        None => Ok(CommandOutcome::Missed),
    }
}

fn hit(
    arena: &Arena,
    target: &Arc<EntityView>,
    source: &Arc<EntityView>,
) -> Result<CommandOutcome, CommandError> {
    let Some(state) = target.combatant_state() else {
        return Ok(CommandOutcome::Skipped);
    };
    state.set_flag(Flag::Kicked, true)?;
    arena.clear_flag_later(target.clone(), Flag::Kicked, arena.timing.hit_duration);

    debug!(source = %source.id(), target = %target.id(), "hit");
    arena.grid.notify_interaction(&Interaction {
        source: source.clone(),
        target: target.clone(),
        kind: InteractionKind::Kicked,
    });
    Ok(CommandOutcome::Struck { target: target.id() })
}

fn fire(arena: &Arena, actor: &Arc<EntityView>) -> Result<CommandOutcome, CommandError> {
    let Some(state) = actor.combatant_state() else {
        return Ok(CommandOutcome::Skipped);
    };
    if state.read(CombatantState::is_airborne) {
        return Ok(CommandOutcome::Skipped);
    }
    let Some(bounds) = actor.bounds() else {
        return Ok(CommandOutcome::Skipped);
    };

    let directed_right = state.flag(Flag::DirectedRight);
    let x = if directed_right {
        bounds.max_x + 1
    } else {
        bounds.min_x - 1
    };
    let y = bounds.min_y + PROJECTILE_LIFT.min(bounds.height() - 1);
    let projectile = EntityView::projectile(
        actor.id(),
        directed_right,
        vec![Cell::new(x, y)],
        actor.renderer(),
    );
    arena.grid.add_entity_view(projectile.clone());
    arena.audio.play(FIRE_CUE);

    let id = projectile.id();
    let flight_arena = arena.clone();
    let shooter = actor.clone();
    arena.tasks.spawn(async move {
        if let Err(err) = fly(&flight_arena, &shooter, &projectile, directed_right).await {
            error!(projectile = %projectile.id(), %err, "projectile flight failed");
        }
    });
    Ok(CommandOutcome::Launched { projectile: id })
}

async fn fly(
    arena: &Arena,
    shooter: &Arc<EntityView>,
    projectile: &Arc<EntityView>,
    directed_right: bool,
) -> Result<(), CommandError> {
    let mut policy = Flight {
        shooter: shooter.id(),
        struck: None,
    };
    let run = Movement::new(
        arena.grid.clone(),
        projectile.clone(),
        constant(Direction::facing(directed_right)),
    )
    .steps(UNBOUNDED)
    .interval(arena.timing.fire_step)
    .run(&mut policy)
    .await;
    arena.grid.remove_entity_view(projectile);

    let cause = run?;
    debug!(projectile = %projectile.id(), ?cause, "projectile spent");
    if let Some(target) = policy.struck {
        hit(arena, &target, shooter)?;
    }
    Ok(())
}

async fn throw(arena: &Arena, actor: &Arc<EntityView>) -> Result<CommandOutcome, CommandError> {
    let Some(state) = actor.combatant_state() else {
        return Ok(CommandOutcome::Skipped);
    };
    if state.read(CombatantState::is_engaged) {
        return Ok(CommandOutcome::Skipped);
    }

    let directed_right = state.flag(Flag::DirectedRight);
    let Some(target) = probe(arena, actor, Direction::facing(directed_right)).await? else {
        return Ok(CommandOutcome::Missed);
    };
    let Some(target_state) = target.combatant_state() else {
        return Ok(CommandOutcome::Missed);
    };
    if target_state.read(CombatantState::is_engaged) {
        return Ok(CommandOutcome::Skipped);
    }

    state.set_flag(Flag::Throwing, true)?;
    target_state.set_flag(Flag::Thrown, true)?;

    let id = target.id();
    let toss_arena = arena.clone();
    let thrower = actor.clone();
    arena.tasks.spawn(async move {
        if let Err(err) = toss(&toss_arena, &thrower, &target, directed_right).await {
            error!(thrower = %thrower.id(), target = %target.id(), %err, "throw failed");
        }
    });
    Ok(CommandOutcome::Thrown { target: id })
}

/// Carry the target over the thrower's facing side in an arc, strike it and
/// let go after the release delay
async fn toss(
    arena: &Arena,
    thrower: &Arc<EntityView>,
    target: &Arc<EntityView>,
    directed_right: bool,
) -> Result<(), CommandError> {
    let half = arena.timing.throw_height;
    let dx = if directed_right { 1 } else { -1 };
    let rule: StepRule = Arc::new(move |step: u32| (dx, if step < half { 1 } else { -1 }));

    let arc = Movement::new(arena.grid.clone(), target.clone(), rule)
        .steps(half.saturating_mul(2))
        .interval(arena.timing.throw_step)
        .run(&mut Blocking)
        .await;
    let struck = hit(arena, target, thrower);

    tokio::time::sleep(arena.timing.throw_release).await;
    for (view, flag) in [(thrower, Flag::Throwing), (target, Flag::Thrown)] {
        if let Some(state) = view.combatant_state() {
            state.set_flag(flag, false)?;
        }
    }

    let cause = arc?;
    struck?;
    debug!(target = %target.id(), ?cause, "throw released");
    try_land(arena, target).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game::grid::tests::fighter;
    use crate::game::observer::Subscription;
    use crate::game::reactive::Change;
    use crate::game::state::{CombatantField, CombatantValue};
    use parking_lot::Mutex;
    use tokio::time::Instant;

    #[derive(Default)]
    pub(crate) struct RecordingAudio {
        pub cues: Mutex<Vec<String>>,
    }

    impl AudioSink for RecordingAudio {
        fn play(&self, cue: &str) {
            self.cues.lock().push(cue.to_string());
        }
    }

    pub(crate) fn test_timing() -> Timing {
        Timing {
            jump_height: 3,
            jump_step: Duration::from_millis(100),
            fire_step: Duration::from_millis(100),
            kick_duration: Duration::from_millis(1000),
            hit_duration: Duration::from_millis(1000),
            throw_height: 3,
            throw_step: Duration::from_millis(100),
            throw_release: Duration::from_millis(300),
        }
    }

    fn arena(width: i32, height: i32) -> (Arena, Arc<RecordingAudio>) {
        let audio = Arc::new(RecordingAudio::default());
        let arena = Arena::new(Grid::new(width, height), test_timing(), audio.clone());
        (arena, audio)
    }

    fn place(arena: &Arena, name: &str, cell: Cell, directed_right: bool) -> Arc<EntityView> {
        let view = fighter(name, vec![cell], directed_right);
        arena.grid.add_entity_view(view.clone());
        view
    }

    async fn run(arena: &Arena, actor: &Arc<EntityView>, kind: CommandKind) -> CommandOutcome {
        Command::new(kind, actor.clone(), arena.clone())
            .execute()
            .await
            .unwrap()
    }

    fn record_interactions(grid: &Grid) -> (Arc<Mutex<Vec<(Uuid, Uuid)>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let sub = grid.subscribe_on_interaction(Arc::new(move |i: &Interaction| {
            log.lock().push((i.source.id(), i.target.id()));
        }));
        (seen, sub)
    }

    fn flag(view: &EntityView, flag: Flag) -> bool {
        view.combatant_state().unwrap().flag(flag)
    }

    #[tokio::test(start_paused = true)]
    async fn walking_stops_at_the_right_wall() {
        let (arena, _) = arena(10, 10);
        let a = place(&arena, "A", Cell::new(0, 0), true);
        // off the walking lane, so it never blocks
        place(&arena, "B", Cell::new(5, 3), false);

        for _ in 0..9 {
            let outcome = run(&arena, &a, CommandKind::MoveOnce(Direction::Right)).await;
            assert_eq!(outcome, CommandOutcome::Moved(StopCause::Finished));
        }
        assert_eq!(a.cells(), vec![Cell::new(9, 0)]);

        let outcome = run(&arena, &a, CommandKind::MoveOnce(Direction::Right)).await;
        assert_eq!(outcome, CommandOutcome::Moved(StopCause::WillBeOutOfView));
        assert_eq!(a.cells(), vec![Cell::new(9, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn walking_into_a_neighbour_is_refused() {
        let (arena, _) = arena(10, 10);
        let a = place(&arena, "A", Cell::new(1, 0), true);
        place(&arena, "B", Cell::new(2, 0), false);

        let outcome = run(&arena, &a, CommandKind::MoveOnce(Direction::Right)).await;
        assert_eq!(outcome, CommandOutcome::Moved(StopCause::WillIntersect));
        assert_eq!(a.cells(), vec![Cell::new(1, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn jump_rises_then_falls_back_to_the_floor() {
        let (arena, _) = arena(10, 20);
        let a = place(&arena, "A", Cell::new(0, 0), true);
        let state = a.combatant_state().unwrap();

        let transitions = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Vec::new();
        for watched in [Flag::Jumping, Flag::Landing] {
            let log = transitions.clone();
            subs.push(state.on_field_change(
                CombatantField::Flag(watched),
                Arc::new(move |change: &Change<'_, CombatantState>| {
                    log.lock().push((watched, change.new.clone()))
                }),
            ));
        }

        let start = Instant::now();
        let outcome = run(&arena, &a, CommandKind::Jump).await;

        assert_eq!(outcome, CommandOutcome::Moved(StopCause::WillBeOutOfView));
        assert_eq!(a.cells(), vec![Cell::new(0, 0)]);
        // three rise steps at 0/100/200, fall steps at 200/300/400, floor at 500
        assert_eq!(start.elapsed(), Duration::from_millis(500));
        assert_eq!(
            *transitions.lock(),
            vec![
                (Flag::Jumping, CombatantValue::Flag(true)),
                (Flag::Jumping, CombatantValue::Flag(false)),
                (Flag::Landing, CombatantValue::Flag(true)),
                (Flag::Landing, CombatantValue::Flag(false)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn jump_while_landing_is_skipped() {
        let (arena, _) = arena(10, 20);
        let a = place(&arena, "A", Cell::new(0, 4), true);
        a.combatant_state()
            .unwrap()
            .set_flag(Flag::Landing, true)
            .unwrap();

        assert_eq!(run(&arena, &a, CommandKind::Jump).await, CommandOutcome::Skipped);
        assert_eq!(run(&arena, &a, CommandKind::Rise).await, CommandOutcome::Skipped);
        assert_eq!(a.cells(), vec![Cell::new(0, 4)]);
    }

    #[tokio::test(start_paused = true)]
    async fn rise_blocked_on_its_first_step_never_raises_the_flag() {
        let (arena, _) = arena(10, 20);
        let a = place(&arena, "A", Cell::new(0, 0), true);
        place(&arena, "B", Cell::new(0, 1), false);

        let raised = Arc::new(Mutex::new(0));
        let counter = raised.clone();
        let _sub = a.combatant_state().unwrap().on_field_change(
            CombatantField::Flag(Flag::Jumping),
            Arc::new(move |_: &Change<'_, CombatantState>| *counter.lock() += 1),
        );

        let outcome = run(&arena, &a, CommandKind::Rise).await;
        assert_eq!(outcome, CommandOutcome::Moved(StopCause::WillIntersect));
        assert_eq!(*raised.lock(), 0);
        assert!(!flag(&a, Flag::Jumping));
    }

    #[tokio::test(start_paused = true)]
    async fn try_land_only_falls_when_unsupported() {
        let (arena, _) = arena(10, 20);
        let grounded = place(&arena, "A", Cell::new(0, 0), true);
        assert_eq!(
            run(&arena, &grounded, CommandKind::TryLand).await,
            CommandOutcome::Skipped
        );

        let floating = place(&arena, "B", Cell::new(5, 3), false);
        let outcome = run(&arena, &floating, CommandKind::TryLand).await;
        assert_eq!(outcome, CommandOutcome::Moved(StopCause::WillBeOutOfView));
        assert_eq!(floating.cells(), vec![Cell::new(5, 0)]);

        let thrown = place(&arena, "C", Cell::new(8, 3), false);
        thrown
            .combatant_state()
            .unwrap()
            .set_flag(Flag::Thrown, true)
            .unwrap();
        assert_eq!(
            run(&arena, &thrown, CommandKind::TryLand).await,
            CommandOutcome::Skipped
        );
        assert_eq!(thrown.cells(), vec![Cell::new(8, 3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn kick_strikes_an_adjacent_opponent() {
        let (arena, _) = arena(10, 10);
        let a = place(&arena, "A", Cell::new(1, 0), true);
        let b = place(&arena, "B", Cell::new(2, 0), false);
        let (seen, _sub) = record_interactions(&arena.grid);

        let outcome = run(&arena, &a, CommandKind::Kick).await;

        assert_eq!(outcome, CommandOutcome::Struck { target: b.id() });
        assert_eq!(*seen.lock(), vec![(a.id(), b.id())]);
        assert!(flag(&a, Flag::Kicking));
        assert!(flag(&b, Flag::Kicked));
        assert_eq!(a.cells(), vec![Cell::new(1, 0)]);

        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert!(!flag(&a, Flag::Kicking));
        assert!(!flag(&b, Flag::Kicked));
    }

    #[tokio::test(start_paused = true)]
    async fn kick_into_empty_space_misses() {
        let (arena, _) = arena(10, 10);
        let a = place(&arena, "A", Cell::new(1, 0), false);
        let b = place(&arena, "B", Cell::new(2, 0), false);
        let (seen, _sub) = record_interactions(&arena.grid);

        // facing left, away from B
        assert_eq!(run(&arena, &a, CommandKind::Kick).await, CommandOutcome::Missed);
        assert!(seen.lock().is_empty());
        assert!(flag(&a, Flag::Kicking));
        assert!(!flag(&b, Flag::Kicked));
    }

    #[tokio::test(start_paused = true)]
    async fn kick_finds_an_opponent_behind_a_projectile_in_the_same_cell() {
        let (arena, _) = arena(10, 10);
        let a = place(&arena, "A", Cell::new(1, 0), true);
        let bolt = EntityView::projectile(a.id(), true, vec![Cell::new(2, 0)], a.renderer());
        arena.grid.add_entity_view(bolt);
        let b = place(&arena, "B", Cell::new(2, 0), false);

        let outcome = run(&arena, &a, CommandKind::Kick).await;
        assert_eq!(outcome, CommandOutcome::Struck { target: b.id() });
        assert!(flag(&b, Flag::Kicked));
    }

    #[tokio::test(start_paused = true)]
    async fn hit_ignores_non_combatants() {
        let (arena, _) = arena(10, 10);
        let a = place(&arena, "A", Cell::new(1, 0), true);
        let bolt = EntityView::projectile(a.id(), true, vec![Cell::new(3, 0)], a.renderer());
        arena.grid.add_entity_view(bolt.clone());

        let outcome = run(&arena, &bolt, CommandKind::Hit { source: a.clone() }).await;
        assert_eq!(outcome, CommandOutcome::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn projectile_flies_until_it_meets_the_opponent() {
        let (arena, audio) = arena(10, 10);
        let a = place(&arena, "A", Cell::new(1, 0), true);
        let b = place(&arena, "B", Cell::new(6, 0), false);
        let (seen, _sub) = record_interactions(&arena.grid);

        let CommandOutcome::Launched { projectile } = run(&arena, &a, CommandKind::Fire).await
        else {
            panic!("fire did not launch");
        };
        assert!(arena.grid.contains(projectile));
        assert_eq!(*audio.cues.lock(), vec![FIRE_CUE.to_string()]);
        let bolt = arena
            .grid
            .views()
            .into_iter()
            .find(|v| v.id() == projectile)
            .unwrap();
        assert_eq!(bolt.cells(), vec![Cell::new(2, 0)]);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(bolt.cells(), vec![Cell::new(5, 0)]);
        assert!(seen.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*seen.lock(), vec![(a.id(), b.id())]);
        assert!(flag(&b, Flag::Kicked));
        assert!(!arena.grid.contains(projectile));
        assert!(!bolt.projectile_state().unwrap().get_all().alive);
    }

    #[tokio::test(start_paused = true)]
    async fn projectile_leaving_the_grid_is_removed_without_a_hit() {
        let (arena, _) = arena(10, 10);
        let a = place(&arena, "A", Cell::new(8, 0), true);
        let (seen, _sub) = record_interactions(&arena.grid);

        let CommandOutcome::Launched { projectile } = run(&arena, &a, CommandKind::Fire).await
        else {
            panic!("fire did not launch");
        };
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(!arena.grid.contains(projectile));
        assert!(seen.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn projectile_spawns_beside_a_tall_shooter() {
        let (arena, _) = arena(20, 20);
        let a = fighter("A", crate::game::grid::rect(10, 0, 2, 4), false);
        arena.grid.add_entity_view(a.clone());

        let CommandOutcome::Launched { projectile } = run(&arena, &a, CommandKind::Fire).await
        else {
            panic!("fire did not launch");
        };
        let bolt = arena
            .grid
            .views()
            .into_iter()
            .find(|v| v.id() == projectile)
            .unwrap();
        assert_eq!(bolt.cells(), vec![Cell::new(9, 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn fire_while_jumping_is_skipped() {
        let (arena, audio) = arena(10, 10);
        let a = place(&arena, "A", Cell::new(1, 3), true);
        a.combatant_state()
            .unwrap()
            .set_flag(Flag::Jumping, true)
            .unwrap();

        assert_eq!(run(&arena, &a, CommandKind::Fire).await, CommandOutcome::Skipped);
        assert_eq!(arena.grid.views().len(), 1);
        assert!(audio.cues.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn throw_carries_the_target_over_and_strikes_once() {
        let (arena, _) = arena(12, 10);
        let a = place(&arena, "A", Cell::new(1, 0), true);
        let b = place(&arena, "B", Cell::new(2, 0), false);
        let (seen, _sub) = record_interactions(&arena.grid);

        let outcome = run(&arena, &a, CommandKind::Throw).await;
        assert_eq!(outcome, CommandOutcome::Thrown { target: b.id() });
        assert!(flag(&a, Flag::Throwing));
        assert!(flag(&b, Flag::Thrown));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(b.cells(), vec![Cell::new(5, 3)]);
        assert!(seen.lock().is_empty());

        // six arc steps end at 500 ms, then the strike
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(b.cells(), vec![Cell::new(8, 0)]);
        assert_eq!(seen.lock().len(), 1);
        assert!(flag(&b, Flag::Thrown));

        // released 300 ms after the strike
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!flag(&a, Flag::Throwing));
        assert!(!flag(&b, Flag::Thrown));
        assert_eq!(*seen.lock(), vec![(a.id(), b.id())]);
    }

    #[tokio::test(start_paused = true)]
    async fn throw_needs_a_grounded_target_in_front() {
        let (arena, _) = arena(12, 10);
        let a = place(&arena, "A", Cell::new(1, 0), true);
        assert_eq!(run(&arena, &a, CommandKind::Throw).await, CommandOutcome::Missed);

        let b = place(&arena, "B", Cell::new(2, 0), false);
        b.combatant_state()
            .unwrap()
            .set_flag(Flag::Landing, true)
            .unwrap();
        assert_eq!(run(&arena, &a, CommandKind::Throw).await, CommandOutcome::Skipped);
        assert!(!flag(&a, Flag::Throwing));
        assert!(!flag(&b, Flag::Thrown));
    }
}
