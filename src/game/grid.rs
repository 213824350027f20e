//! Spatial grid: bounds, overlap queries and the single move entry point

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

use super::movement::MotionError;
use super::observer::{Observers, Subscription};
use super::view::EntityView;

/// One grid coordinate. `y` grows upwards from the floor row 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, delta: Delta) -> Self {
        Self {
            x: self.x + delta.dx,
            y: self.y + delta.dy,
        }
    }
}

/// Row-major rectangle footprint starting at `(x_offset, y_offset)`
pub fn rect(x_offset: i32, y_offset: i32, width: i32, height: i32) -> Vec<Cell> {
    let mut cells = Vec::with_capacity((width.max(0) * height.max(0)) as usize);
    for y in y_offset..y_offset + height {
        for x in x_offset..x_offset + width {
            cells.push(Cell::new(x, y));
        }
    }
    cells
}

/// Inclusive extent of a footprint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Bounds {
    pub fn of(cells: &[Cell]) -> Option<Self> {
        let first = cells.first()?;
        let init = Self {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
        };
        Some(cells.iter().fold(init, |b, c| Self {
            min_x: b.min_x.min(c.x),
            max_x: b.max_x.max(c.x),
            min_y: b.min_y.min(c.y),
            max_y: b.max_y.max(c.y),
        }))
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y + 1
    }
}

/// Single-step displacement, each axis one of -1, 0, +1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delta {
    pub dx: i32,
    pub dy: i32,
}

impl Delta {
    pub fn new(dx: i32, dy: i32) -> Result<Self, MotionError> {
        if !(-1..=1).contains(&dx) || !(-1..=1).contains(&dy) {
            return Err(MotionError::InvalidDisplacement { step: None, dx, dy });
        }
        Ok(Self { dx, dy })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub fn delta(self) -> Delta {
        match self {
            Direction::Left => Delta { dx: -1, dy: 0 },
            Direction::Right => Delta { dx: 1, dy: 0 },
            Direction::Up => Delta { dx: 0, dy: 1 },
            Direction::Down => Delta { dx: 0, dy: -1 },
        }
    }

    pub fn facing(directed_right: bool) -> Self {
        if directed_right {
            Direction::Right
        } else {
            Direction::Left
        }
    }
}

impl FromStr for Direction {
    type Err = MotionError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(MotionError::UnknownDirection(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Kicked,
}

/// One view acting on another
#[derive(Clone)]
pub struct Interaction {
    pub source: Arc<EntityView>,
    pub target: Arc<EntityView>,
    pub kind: InteractionKind,
}

impl fmt::Debug for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interaction")
            .field("source", &self.source.id())
            .field("target", &self.target.id())
            .field("kind", &self.kind)
            .finish()
    }
}

pub type MoveHandler = dyn Fn(&Arc<EntityView>) + Send + Sync;
pub type InteractionHandler = dyn Fn(&Interaction) + Send + Sync;

/// The playing field
///
/// Occupancy is never stored here: it is read from each live view's current
/// cells whenever a query runs.
pub struct Grid {
    width: i32,
    height: i32,
    views: RwLock<Vec<Arc<EntityView>>>,
    on_move: Observers<MoveHandler>,
    on_interaction: Observers<InteractionHandler>,
}

impl Grid {
    pub fn new(width: i32, height: i32) -> Arc<Self> {
        Arc::new(Self {
            width,
            height,
            views: RwLock::new(Vec::new()),
            on_move: Observers::new(),
            on_interaction: Observers::new(),
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn is_out_of_view(&self, cells: &[Cell]) -> bool {
        let max_x = self.width - 1;
        let max_y = self.height - 1;
        cells
            .iter()
            .any(|c| c.x < 0 || c.x > max_x || c.y < 0 || c.y > max_y)
    }

    /// First live view, other than `excluding`, that shares a cell with
    /// `candidate`. Views are scanned in insertion order.
    pub fn intersected_view(
        &self,
        excluding: &EntityView,
        candidate: &[Cell],
    ) -> Option<Arc<EntityView>> {
        self.intersected_views(excluding, candidate).into_iter().next()
    }

    /// Every live view, other than `excluding`, that shares a cell with
    /// `candidate`, in insertion order
    pub fn intersected_views(
        &self,
        excluding: &EntityView,
        candidate: &[Cell],
    ) -> Vec<Arc<EntityView>> {
        let views = self.views.read();
        views
            .iter()
            .filter(|view| view.id() != excluding.id())
            .filter(|view| {
                let cells = view.cells();
                cells.iter().any(|c| candidate.contains(c))
            })
            .cloned()
            .collect()
    }

    /// Whether `view` shifted by `delta` stays in bounds without overlapping
    /// anything
    pub fn can_move(&self, view: &EntityView, delta: Delta) -> bool {
        let next: Vec<Cell> = view.cells().into_iter().map(|c| c.offset(delta)).collect();
        !self.is_out_of_view(&next) && self.intersected_view(view, &next).is_none()
    }

    pub fn add_entity_view(self: &Arc<Self>, view: Arc<EntityView>) {
        {
            let mut views = self.views.write();
            if views.iter().any(|v| v.id() == view.id()) {
                return;
            }
            views.push(view.clone());
        }
        view.attach(self);
        view.render();
    }

    /// Returns false when the view was not on the grid
    pub fn remove_entity_view(&self, view: &EntityView) -> bool {
        let removed = {
            let mut views = self.views.write();
            match views.iter().position(|v| v.id() == view.id()) {
                Some(pos) => {
                    views.remove(pos);
                    true
                }
                None => false,
            }
        };
        if removed {
            view.detach();
        }
        removed
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.views.read().iter().any(|v| v.id() == id)
    }

    pub fn views(&self) -> Vec<Arc<EntityView>> {
        self.views.read().clone()
    }

    pub fn combatants(&self) -> Vec<Arc<EntityView>> {
        self.views
            .read()
            .iter()
            .filter(|v| v.is_combatant())
            .cloned()
            .collect()
    }

    /// Commit a new footprint and tell every move subscriber which view moved
    pub fn move_to_cells(&self, view: &Arc<EntityView>, cells: Vec<Cell>) {
        trace!(view_id = %view.id(), kind = view.label(), ?cells, "move");
        view.set_cells(cells);
        for handler in self.on_move.snapshot() {
            handler(view);
        }
    }

    pub fn subscribe_on_move(&self, handler: Arc<MoveHandler>) -> Subscription {
        self.on_move.subscribe(handler)
    }

    pub fn subscribe_on_interaction(&self, handler: Arc<InteractionHandler>) -> Subscription {
        self.on_interaction.subscribe(handler)
    }

    pub fn notify_interaction(&self, interaction: &Interaction) {
        for handler in self.on_interaction.snapshot() {
            handler(interaction);
        }
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("views", &self.views.read().len())
            .finish()
    }
}
