//! Entity views: everything the grid can hold

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use super::grid::{Bounds, Cell, Grid};
use super::reactive::Reactive;
use super::state::{CombatantState, ProjectileField, ProjectileState};

/// Draws views. The core only hands over cells; mapping them to pixels is up
/// to the implementation.
pub trait Renderer: Send + Sync {
    fn render(&self, view: &EntityView);

    /// Release whatever the renderer holds for a view leaving the grid
    fn detach(&self, _view: &EntityView) {}
}

/// Fire-and-forget sound playback
pub trait AudioSink: Send + Sync {
    fn play(&self, cue: &str);
}

/// Variant payload of an [`EntityView`]
pub enum ViewKind {
    Combatant(Reactive<CombatantState>),
    Projectile {
        owner: Uuid,
        state: Reactive<ProjectileState>,
    },
    Panel(Panel),
}

/// Informational panels. They take no cells.
pub enum Panel {
    Score(ScoreBoard),
    RoundOver { winner: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreLine {
    pub name: String,
    pub health: u32,
}

#[derive(Debug, Default)]
pub struct ScoreBoard {
    lines: RwLock<Vec<ScoreLine>>,
}

impl ScoreBoard {
    pub fn new(lines: Vec<ScoreLine>) -> Self {
        Self {
            lines: RwLock::new(lines),
        }
    }

    pub fn lines(&self) -> Vec<ScoreLine> {
        self.lines.read().clone()
    }

    pub fn set_health(&self, index: usize, health: u32) {
        if let Some(line) = self.lines.write().get_mut(index) {
            line.health = health;
        }
    }
}

pub struct EntityView {
    id: Uuid,
    kind: ViewKind,
    cells: RwLock<Vec<Cell>>,
    grid: RwLock<Weak<Grid>>,
    renderer: Arc<dyn Renderer>,
}

impl EntityView {
    fn build(kind: ViewKind, cells: Vec<Cell>, renderer: Arc<dyn Renderer>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            kind,
            cells: RwLock::new(cells),
            grid: RwLock::new(Weak::new()),
            renderer,
        })
    }

    pub fn combatant(
        state: CombatantState,
        cells: Vec<Cell>,
        renderer: Arc<dyn Renderer>,
    ) -> Arc<Self> {
        Self::build(ViewKind::Combatant(Reactive::new(state)), cells, renderer)
    }

    pub fn projectile(
        owner: Uuid,
        directed_right: bool,
        cells: Vec<Cell>,
        renderer: Arc<dyn Renderer>,
    ) -> Arc<Self> {
        let state = ProjectileState {
            is_directed_right: directed_right,
            alive: true,
        };
        Self::build(
            ViewKind::Projectile {
                owner,
                state: Reactive::new(state),
            },
            cells,
            renderer,
        )
    }

    pub fn panel(panel: Panel, renderer: Arc<dyn Renderer>) -> Arc<Self> {
        Self::build(ViewKind::Panel(panel), Vec::new(), renderer)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &ViewKind {
        &self.kind
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            ViewKind::Combatant(_) => "combatant",
            ViewKind::Projectile { .. } => "projectile",
            ViewKind::Panel(Panel::Score(_)) => "score_panel",
            ViewKind::Panel(Panel::RoundOver { .. }) => "round_over_panel",
        }
    }

    pub fn combatant_state(&self) -> Option<&Reactive<CombatantState>> {
        match &self.kind {
            ViewKind::Combatant(state) => Some(state),
            _ => None,
        }
    }

    pub fn projectile_state(&self) -> Option<&Reactive<ProjectileState>> {
        match &self.kind {
            ViewKind::Projectile { state, .. } => Some(state),
            _ => None,
        }
    }

    pub fn is_combatant(&self) -> bool {
        matches!(self.kind, ViewKind::Combatant(_))
    }

    pub fn cells(&self) -> Vec<Cell> {
        self.cells.read().clone()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::of(&self.cells.read())
    }

    /// Replace the footprint and redraw. Only [`Grid::move_to_cells`] calls
    /// this, so every position change is seen by move subscribers.
    pub(super) fn set_cells(&self, cells: Vec<Cell>) {
        *self.cells.write() = cells;
        self.render();
    }

    pub(super) fn attach(&self, grid: &Arc<Grid>) {
        *self.grid.write() = Arc::downgrade(grid);
    }

    /// The grid this view lives on, if it is still alive
    pub fn grid(&self) -> Option<Arc<Grid>> {
        self.grid.read().upgrade()
    }

    pub fn renderer(&self) -> Arc<dyn Renderer> {
        self.renderer.clone()
    }

    pub fn render(&self) {
        self.renderer.render(self);
    }

    pub(super) fn detach(&self) {
        if let Some(state) = self.projectile_state() {
            let _ = state.set_field(ProjectileField::Alive, false);
        }
        self.renderer.detach(self);
        *self.grid.write() = Weak::new();
    }
}

impl fmt::Debug for EntityView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityView")
            .field("id", &self.id)
            .field("kind", &self.label())
            .field("cells", &*self.cells.read())
            .finish()
    }
}
