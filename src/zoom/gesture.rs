//! Pointer gesture interpretation
//!
//! [`GestureController`] turns raw pointer events into [`TransformState`]
//! operations. One drag is tracked at a time; pinch runs alongside it.
//! Layout changes (viewport and content size) and scale changes are
//! followed by a bounds refresh before the next event is interpreted.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::bounds::{PanBounds, pan_bounds};
use super::geometry::{Offset, Size, Transform};
use super::motion::AnimationSpec;
use super::state::TransformState;

/// Double-tap zooms back out once scale exceeds this multiple of `min_scale`
pub const DOUBLE_TAP_RESET_FACTOR: f32 = 3.0;
/// Double-tap zoom-in multiplier
pub const DOUBLE_TAP_ZOOM_STEP: f32 = 2.0;

/// Raw input delivered by the platform
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointerEvent {
    Down {
        id: u64,
        position: Offset,
        time_ms: u64,
    },
    Move {
        id: u64,
        position: Offset,
        time_ms: u64,
    },
    Up {
        id: u64,
        position: Offset,
        time_ms: u64,
    },
    /// The input system took the gesture away (e.g. an outer scroller)
    Cancel,
    PinchStart {
        first: Offset,
        second: Offset,
    },
    PinchUpdate {
        first: Offset,
        second: Offset,
    },
    PinchEnd,
    DoubleTap {
        position: Offset,
    },
}

/// Whether the controller kept an event or left it for enclosing handlers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Consumed,
    PassThrough,
}

/// Tuning knobs for gesture interpretation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureConfig {
    /// Movement (px) before a press becomes a drag
    pub touch_slop: f32,
    /// Cap on each fling velocity component (px/s)
    pub max_fling_velocity: f32,
    /// Curve used for double-tap zoom
    pub double_tap_animation: AnimationSpec,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            touch_slop: 8.0,
            max_fling_velocity: 8000.0,
            double_tap_animation: AnimationSpec::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum DragPhase {
    Idle,
    /// Pointer down, not yet past the touch slop
    Pressed { id: u64, origin: Offset },
    Dragging { id: u64, last: Offset },
}

/// Drives a [`TransformState`] from pointer input and layout changes
#[derive(Debug)]
pub struct GestureController {
    state: TransformState,
    config: GestureConfig,
    phase: DragPhase,
    pinch_distance: Option<f32>,
    viewport: Option<Size>,
    content: Option<Size>,
    /// Scale the current bounds were computed for
    bounds_scale: Option<f32>,
}

impl GestureController {
    #[must_use]
    pub fn new(state: TransformState, config: GestureConfig) -> Self {
        Self {
            state,
            config,
            phase: DragPhase::Idle,
            pinch_distance: None,
            viewport: None,
            content: None,
            bounds_scale: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> &TransformState {
        &self.state
    }

    /// Mutable access for programmatic zoom requests. Bounds are refreshed
    /// on the next event or tick.
    pub fn state_mut(&mut self) -> &mut TransformState {
        self.bounds_scale = None;
        &mut self.state
    }

    #[must_use]
    pub fn transform(&self) -> Transform {
        self.state.transform()
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, DragPhase::Dragging { .. })
    }

    #[must_use]
    pub fn is_pinching(&self) -> bool {
        self.pinch_distance.is_some()
    }

    /// The display layer settled on a new viewport size
    pub fn set_viewport(&mut self, viewport: Size) {
        if self.viewport != Some(viewport) {
            self.viewport = Some(viewport);
            self.refresh_bounds(true);
        }
    }

    /// The unscaled on-screen size of the surface changed
    pub fn set_content_size(&mut self, content: Size) {
        if self.content != Some(content) {
            self.content = Some(content);
            self.refresh_bounds(true);
        }
    }

    /// Pan bounds for the current layout and scale
    #[must_use]
    pub fn current_bounds(&self) -> Option<PanBounds> {
        Some(pan_bounds(self.content?, self.viewport?, self.state.scale()))
    }

    /// Interpret one pointer event
    pub fn handle(&mut self, event: PointerEvent) -> Disposition {
        self.refresh_bounds(false);
        let disposition = match event {
            PointerEvent::Down { id, position, .. } => self.on_down(id, position),
            PointerEvent::Move {
                id,
                position,
                time_ms,
            } => self.on_move(id, position, time_ms),
            PointerEvent::Up { id, .. } => self.on_up(id),
            PointerEvent::Cancel => self.on_cancel(),
            PointerEvent::PinchStart { first, second } => {
                self.pinch_distance = Some((first - second).distance());
                Disposition::Consumed
            }
            PointerEvent::PinchUpdate { first, second } => self.on_pinch(first, second),
            PointerEvent::PinchEnd => {
                self.pinch_distance = None;
                Disposition::Consumed
            }
            PointerEvent::DoubleTap { .. } => {
                self.on_double_tap();
                Disposition::Consumed
            }
        };
        self.refresh_bounds(false);
        disposition
    }

    /// Advance animations by one frame. Returns true while anything moves.
    pub fn tick(&mut self, dt: Duration) -> bool {
        self.refresh_bounds(false);
        let scaling = self.state.tick_scale(dt);
        // Translation must step against bounds for the new scale
        self.refresh_bounds(false);
        let panning = self.state.tick_translation(dt);
        scaling || panning
    }

    fn on_down(&mut self, id: u64, position: Offset) -> Disposition {
        if let DragPhase::Idle = self.phase {
            self.state.reset_tracking();
            self.phase = DragPhase::Pressed {
                id,
                origin: position,
            };
        }
        Disposition::PassThrough
    }

    fn on_move(&mut self, id: u64, position: Offset, time_ms: u64) -> Disposition {
        match self.phase {
            DragPhase::Pressed { id: active, origin } if active == id => {
                let travel = position - origin;
                let distance = travel.distance();
                if distance <= self.config.touch_slop {
                    return Disposition::PassThrough;
                }
                self.phase = DragPhase::Dragging { id, last: position };
                // Only the movement past the slop counts as drag
                let over_slop = travel * ((distance - self.config.touch_slop) / distance);
                log::trace!("GestureController: drag started at {position:?}");
                self.apply_drag(over_slop, position, time_ms)
            }
            DragPhase::Dragging { id: active, last } if active == id => {
                self.phase = DragPhase::Dragging { id, last: position };
                self.apply_drag(position - last, position, time_ms)
            }
            _ => Disposition::PassThrough,
        }
    }

    fn apply_drag(&mut self, delta: Offset, position: Offset, time_ms: u64) -> Disposition {
        if delta == Offset::ZERO {
            return Disposition::PassThrough;
        }

        let disposition = if self
            .state
            .is_drag_boundary_reached(delta * self.state.scale())
        {
            Disposition::PassThrough
        } else {
            Disposition::Consumed
        };

        if self.state.zooming() {
            self.state.drag(delta);
            self.state.add_position(time_ms, position);
        }
        disposition
    }

    fn on_up(&mut self, id: u64) -> Disposition {
        match self.phase {
            DragPhase::Dragging { id: active, .. } if active == id => {
                self.phase = DragPhase::Idle;
                if self.state.zooming() {
                    let velocity = self.state.drag_end(self.config.max_fling_velocity);
                    log::trace!("GestureController: fling at {velocity:?}");
                } else {
                    self.state.reset_tracking();
                }
                Disposition::Consumed
            }
            DragPhase::Pressed { id: active, .. } if active == id => {
                self.phase = DragPhase::Idle;
                Disposition::PassThrough
            }
            _ => Disposition::PassThrough,
        }
    }

    fn on_cancel(&mut self) -> Disposition {
        self.phase = DragPhase::Idle;
        self.pinch_distance = None;
        self.state.reset_tracking();
        Disposition::PassThrough
    }

    fn on_pinch(&mut self, first: Offset, second: Offset) -> Disposition {
        let distance = (first - second).distance();
        match self.pinch_distance.replace(distance) {
            Some(previous) if previous > 0.0 && distance > 0.0 => {
                self.state.on_zoom_change(distance / previous);
            }
            _ => {}
        }
        Disposition::Consumed
    }

    fn on_double_tap(&mut self) {
        let scale = self.state.scale();
        let min_scale = self.state.min_scale();
        let target = if scale > min_scale * DOUBLE_TAP_RESET_FACTOR {
            min_scale
        } else {
            scale * DOUBLE_TAP_ZOOM_STEP
        };
        log::debug!("GestureController: double tap {scale} -> {target}");
        self.state
            .animate_scale_to(target, self.config.double_tap_animation);
    }

    /// Recompute pan bounds when layout changed (`force`) or when the scale
    /// moved since the last computation.
    fn refresh_bounds(&mut self, force: bool) {
        let scale = self.state.scale();
        if !force && self.bounds_scale == Some(scale) {
            return;
        }
        if let Some(bounds) = self.current_bounds() {
            self.state.update_bounds(bounds.max_x, bounds.max_y);
            self.bounds_scale = Some(scale);
        }
    }
}
