//! Log-backed renderer and audio sink used by the binary

use tracing::{debug, info, trace};

use crate::game::grid::Bounds;
use crate::game::view::{AudioSink, EntityView, Panel, Renderer, ViewKind};

/// Pixel offset of a footprint's top-left corner. Screen rows grow downward
/// while grid rows grow up from the floor.
pub fn pixel_origin(grid_height: i32, bounds: Bounds, cell_size: u32) -> (i64, i64) {
    let size = i64::from(cell_size);
    let left = i64::from(bounds.min_x) * size;
    let top = i64::from(grid_height - 1 - bounds.max_y) * size;
    (left, top)
}

/// Renders by logging each view's pixel placement
#[derive(Debug, Clone, Copy)]
pub struct TraceRenderer {
    cell_size: u32,
}

impl TraceRenderer {
    pub fn new(cell_size: u32) -> Self {
        Self { cell_size }
    }
}

impl Renderer for TraceRenderer {
    fn render(&self, view: &EntityView) {
        let placement = view
            .grid()
            .zip(view.bounds())
            .map(|(grid, bounds)| pixel_origin(grid.height(), bounds, self.cell_size));

        match view.kind() {
            ViewKind::Combatant(state) => {
                let snapshot = state.get_all();
                trace!(
                    view_id = %view.id(),
                    name = %snapshot.name,
                    health = snapshot.health,
                    right = snapshot.is_directed_right,
                    ?placement,
                    "render combatant"
                );
            }
            ViewKind::Projectile { owner, .. } => {
                trace!(view_id = %view.id(), %owner, ?placement, "render projectile");
            }
            ViewKind::Panel(Panel::Score(board)) => {
                let lines: Vec<String> = board
                    .lines()
                    .iter()
                    .map(|line| format!("{} {}", line.name, line.health))
                    .collect();
                debug!(score = ?lines, "render score");
            }
            ViewKind::Panel(Panel::RoundOver { winner }) => {
                info!(%winner, "Round over");
            }
        }
    }

    fn detach(&self, view: &EntityView) {
        trace!(view_id = %view.id(), kind = view.label(), "detach");
    }
}

/// Logs cues instead of playing them
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceAudio;

impl AudioSink for TraceAudio {
    fn play(&self, cue: &str) {
        debug!(cue, "play");
    }
}
