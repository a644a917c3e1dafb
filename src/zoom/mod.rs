//! Scale and pan control for the composited document surface

mod bounds;
mod gesture;
mod geometry;
mod motion;
mod state;
mod velocity;

pub use bounds::{PanBounds, pan_bounds};
pub use gesture::{
    DOUBLE_TAP_RESET_FACTOR, DOUBLE_TAP_ZOOM_STEP, Disposition, GestureConfig, GestureController,
    PointerEvent,
};
pub use geometry::{Offset, Size, Transform};
pub use motion::{AnimatedValue, AnimationSpec, DecaySpec, Easing};
pub use state::{ConfigurationError, SavedTransform, TransformState, validate_scale_range};
pub use velocity::VelocityTracker;
