//! Stepped motion engine
//!
//! A run advances one view a cell at a time. Before each step it checks the
//! view's present cells (already out of bounds, already overlapping) and then
//! the candidate cells (would leave bounds, would overlap). Each check goes
//! through a [`MovePolicy`] hook which decides whether the run goes on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use super::grid::{Cell, Delta, Direction, Grid};
use super::view::EntityView;

/// Step count for runs that only end when something blocks them
pub const UNBOUNDED: u32 = u32::MAX;

#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    #[error("displacement ({dx}, {dy}) at step {step:?} is not a unit step")]
    InvalidDisplacement {
        step: Option<u32>,
        dx: i32,
        dy: i32,
    },

    #[error("unknown direction tag: {0}")]
    UnknownDirection(String),
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    Finished,
    ClientStopped,
    IsOutOfView,
    Intersected,
    WillIntersect,
    WillBeOutOfView,
}

/// Displacement for a given step index, as raw `(dx, dy)`
pub type StepRule = Arc<dyn Fn(u32) -> (i32, i32) + Send + Sync>;

pub fn constant(direction: Direction) -> StepRule {
    let delta = direction.delta();
    Arc::new(move |_| (delta.dx, delta.dy))
}

/// Hooks consulted during a run. The defaults let the run proceed.
pub trait MovePolicy: Send {
    /// Fires before the first committed step
    fn on_started(&mut self) {}

    /// Present cells are already out of bounds
    fn on_is_out_of_view(&mut self) -> bool {
        true
    }

    /// Present cells already overlap `other`
    fn on_intersect(&mut self, _other: &Arc<EntityView>) -> bool {
        true
    }

    /// Candidate cells would leave the grid
    fn on_will_be_out_of_view(&mut self) -> bool {
        true
    }

    /// Candidate cells would overlap `other`
    fn on_will_intersect(&mut self, _other: &Arc<EntityView>) -> bool {
        true
    }

    fn on_finished(&mut self) {}

    /// Fires once for every run, after `on_finished` when the run completed
    fn on_stopped(&mut self, _cause: StopCause) {}
}

/// Policy that proceeds through everything
pub struct FreeMotion;

impl MovePolicy for FreeMotion {}

/// Policy that refuses to leave the grid or overlap anything
pub struct Blocking;

impl MovePolicy for Blocking {
    fn on_will_be_out_of_view(&mut self) -> bool {
        false
    }

    fn on_will_intersect(&mut self, _other: &Arc<EntityView>) -> bool {
        false
    }
}

/// Cooperative stop request, honoured at the next step boundary
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One configured run
pub struct Movement {
    grid: Arc<Grid>,
    view: Arc<EntityView>,
    rule: StepRule,
    interval: Duration,
    steps: u32,
    simulate: bool,
    stop: StopHandle,
}

impl Movement {
    /// A single immediate step; adjust with the builder methods
    pub fn new(grid: Arc<Grid>, view: Arc<EntityView>, rule: StepRule) -> Self {
        Self {
            grid,
            view,
            rule,
            interval: Duration::ZERO,
            steps: 1,
            simulate: false,
            stop: StopHandle::default(),
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    /// Evaluate hooks without committing any step
    pub fn simulate(mut self) -> Self {
        self.simulate = true;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub async fn run<P: MovePolicy>(self, policy: &mut P) -> Result<StopCause, MotionError> {
        for step in 0..self.steps {
            if step > 0 {
                if self.interval.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(self.interval).await;
                }
            }

            if self.stop.is_stopped() {
                return Ok(self.halt(policy, StopCause::ClientStopped));
            }

            let current = self.view.cells();
            if self.grid.is_out_of_view(&current) && !policy.on_is_out_of_view() {
                return Ok(self.halt(policy, StopCause::IsOutOfView));
            }
            if let Some(other) = self.grid.intersected_view(&self.view, &current) {
                if !policy.on_intersect(&other) {
                    return Ok(self.halt(policy, StopCause::Intersected));
                }
            }

            let (dx, dy) = (self.rule)(step);
            let delta = Delta::new(dx, dy).map_err(|_| MotionError::InvalidDisplacement {
                step: Some(step),
                dx,
                dy,
            })?;
            let next: Vec<Cell> = current.iter().map(|c| c.offset(delta)).collect();

            if let Some(other) = self.grid.intersected_view(&self.view, &next) {
                if !policy.on_will_intersect(&other) {
                    return Ok(self.halt(policy, StopCause::WillIntersect));
                }
            }
            if self.grid.is_out_of_view(&next) && !policy.on_will_be_out_of_view() {
                return Ok(self.halt(policy, StopCause::WillBeOutOfView));
            }

            if step == 0 {
                policy.on_started();
            }
            if !self.simulate {
                trace!(view_id = %self.view.id(), step, "step");
                self.grid.move_to_cells(&self.view, next);
            }
        }

        policy.on_finished();
        Ok(self.halt(policy, StopCause::Finished))
    }

    fn halt<P: MovePolicy>(&self, policy: &mut P, cause: StopCause) -> StopCause {
        debug!(view_id = %self.view.id(), kind = self.view.label(), ?cause, "movement stopped");
        policy.on_stopped(cause);
        cause
    }
}
