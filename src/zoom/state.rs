//! Scale and pan state for the continuous document surface
//!
//! Scale, horizontal and vertical translation are three independent
//! [`AnimatedValue`]s. Translation is clamped to symmetric bounds supplied
//! through [`TransformState::update_bounds`]; until the first call the
//! translation axes are unbounded.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::geometry::{Offset, Transform};
use super::motion::{AnimatedValue, AnimationSpec, DecaySpec};
use super::velocity::VelocityTracker;

/// Invalid scale limits or fling physics
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("min_scale must be < max_scale (got {min_scale} >= {max_scale})")]
    InvertedScaleRange { min_scale: f32, max_scale: f32 },

    #[error("scale limits must be finite and non-negative (got {min_scale}..{max_scale})")]
    InvalidScaleLimit { min_scale: f32, max_scale: f32 },

    #[error("fling friction must be finite and positive (got {friction})")]
    InvalidFriction { friction: f32 },
}

/// Check a `[min_scale, max_scale]` pair
pub fn validate_scale_range(min_scale: f32, max_scale: f32) -> Result<(), ConfigurationError> {
    if !min_scale.is_finite() || !max_scale.is_finite() || min_scale < 0.0 {
        return Err(ConfigurationError::InvalidScaleLimit {
            min_scale,
            max_scale,
        });
    }
    if min_scale >= max_scale {
        return Err(ConfigurationError::InvertedScaleRange {
            min_scale,
            max_scale,
        });
    }
    Ok(())
}

/// The persisted part of a [`TransformState`]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedTransform {
    pub translate_x: f32,
    pub translate_y: f32,
    pub scale: f32,
    pub min_scale: f32,
    pub max_scale: f32,
}

impl SavedTransform {
    /// `(translate_x, translate_y, scale, min_scale, max_scale)`
    #[must_use]
    pub fn as_tuple(self) -> (f32, f32, f32, f32, f32) {
        (
            self.translate_x,
            self.translate_y,
            self.scale,
            self.min_scale,
            self.max_scale,
        )
    }
}

/// Scale and pan offsets of the displayed surface
#[derive(Debug)]
pub struct TransformState {
    min_scale: f32,
    max_scale: f32,
    scale: AnimatedValue,
    translate_x: AnimatedValue,
    translate_y: AnimatedValue,
    velocity_tracker: VelocityTracker,
    decay: DecaySpec,
}

impl TransformState {
    /// Create a state at `min_scale` with no translation
    pub fn new(min_scale: f32, max_scale: f32) -> Result<Self, ConfigurationError> {
        Self::with_initial(min_scale, max_scale, 0.0, 0.0, min_scale)
    }

    /// Create a state with explicit initial values. The initial scale is
    /// clamped into the limits.
    pub fn with_initial(
        min_scale: f32,
        max_scale: f32,
        translate_x: f32,
        translate_y: f32,
        scale: f32,
    ) -> Result<Self, ConfigurationError> {
        validate_scale_range(min_scale, max_scale)?;
        let scale = if scale.is_finite() {
            scale.clamp(min_scale, max_scale)
        } else {
            min_scale
        };
        let mut scale = AnimatedValue::new(scale);
        scale.update_bounds(min_scale, max_scale);
        Ok(Self {
            min_scale,
            max_scale,
            scale,
            translate_x: AnimatedValue::new(finite_or_zero(translate_x)),
            translate_y: AnimatedValue::new(finite_or_zero(translate_y)),
            velocity_tracker: VelocityTracker::new(),
            decay: DecaySpec::default(),
        })
    }

    /// Rebuild a state from its saved tuple
    pub fn restore(saved: SavedTransform) -> Result<Self, ConfigurationError> {
        Self::with_initial(
            saved.min_scale,
            saved.max_scale,
            saved.translate_x,
            saved.translate_y,
            saved.scale,
        )
    }

    #[must_use]
    pub fn save(&self) -> SavedTransform {
        SavedTransform {
            translate_x: self.translate_x(),
            translate_y: self.translate_y(),
            scale: self.scale(),
            min_scale: self.min_scale,
            max_scale: self.max_scale,
        }
    }

    /// Override the fling physics
    pub fn set_decay(&mut self, decay: DecaySpec) -> Result<(), ConfigurationError> {
        if !decay.is_valid() {
            return Err(ConfigurationError::InvalidFriction {
                friction: decay.friction,
            });
        }
        self.decay = decay;
        Ok(())
    }

    #[must_use]
    pub fn min_scale(&self) -> f32 {
        self.min_scale
    }

    #[must_use]
    pub fn max_scale(&self) -> f32 {
        self.max_scale
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale.value()
    }

    #[must_use]
    pub fn translate_x(&self) -> f32 {
        self.translate_x.value()
    }

    #[must_use]
    pub fn translate_y(&self) -> f32 {
        self.translate_y.value()
    }

    #[must_use]
    pub fn transform(&self) -> Transform {
        Transform {
            scale: self.scale(),
            translate_x: self.translate_x(),
            translate_y: self.translate_y(),
        }
    }

    /// Zoomed past the minimum, so there may be something to pan
    #[must_use]
    pub fn zooming(&self) -> bool {
        self.scale() > self.min_scale
    }

    /// Set the scale immediately, cancelling any scale animation
    pub fn snap_scale(&mut self, target: f32) {
        if !target.is_finite() {
            log::warn!("TransformState: ignoring non-finite scale {target}");
            return;
        }
        self.scale
            .snap_to(target.clamp(self.min_scale, self.max_scale));
    }

    /// Move the scale smoothly to `target`
    pub fn animate_scale_to(&mut self, target: f32, spec: AnimationSpec) {
        if !target.is_finite() {
            log::warn!("TransformState: ignoring non-finite scale target {target}");
            return;
        }
        self.scale
            .animate_to(target.clamp(self.min_scale, self.max_scale), spec);
    }

    /// Multiply the current scale; one call per pinch update
    pub fn on_zoom_change(&mut self, multiplier: f32) {
        self.snap_scale(self.scale() * multiplier);
    }

    /// Shift the translation by `delta`, clamped into the current bounds.
    /// Cancels any running fling on both axes.
    pub fn drag(&mut self, delta: Offset) {
        if !delta.is_finite() {
            log::warn!("TransformState: ignoring non-finite drag {delta:?}");
            return;
        }
        self.translate_x.snap_to(self.translate_x() + delta.x);
        self.translate_y.snap_to(self.translate_y() + delta.y);
    }

    /// Coast both axes independently from `velocity` (px/s)
    pub fn fling_decay(&mut self, velocity: Offset) {
        if !velocity.is_finite() {
            log::warn!("TransformState: ignoring non-finite fling {velocity:?}");
            return;
        }
        self.translate_x.animate_decay(velocity.x, self.decay);
        self.translate_y.animate_decay(velocity.y, self.decay);
    }

    /// Set the pan intervals to `[-max_x, max_x]` and `[-max_y, max_y]`
    pub fn update_bounds(&mut self, max_x: f32, max_y: f32) {
        debug_assert!(
            max_x >= 0.0 && max_y >= 0.0,
            "pan bounds must be non-negative: ({max_x}, {max_y})"
        );
        let max_x = finite_or_zero(max_x).max(0.0);
        let max_y = finite_or_zero(max_y).max(0.0);
        self.translate_x.update_bounds(-max_x, max_x);
        self.translate_y.update_bounds(-max_y, max_y);
    }

    /// Current horizontal interval, if bounds were set
    #[must_use]
    pub fn horizontal_bounds(&self) -> Option<(f32, f32)> {
        self.translate_x.bounds()
    }

    /// Current vertical interval, if bounds were set
    #[must_use]
    pub fn vertical_bounds(&self) -> Option<(f32, f32)> {
        self.translate_y.bounds()
    }

    /// True when a horizontal drag by `delta` cannot move the surface: the
    /// horizontal interval is `[0, 0]`, or `translate_x + delta.x` reaches
    /// or crosses an end of it.
    #[must_use]
    pub fn is_drag_boundary_reached(&self, delta: Offset) -> bool {
        let Some((lower, upper)) = self.translate_x.bounds() else {
            return false;
        };
        if lower == 0.0 && upper == 0.0 {
            return true;
        }

        let next = self.translate_x() + delta.x;
        next <= lower || next >= upper
    }

    pub fn add_position(&mut self, time_ms: u64, position: Offset) {
        self.velocity_tracker.add_position(time_ms, position);
    }

    pub fn reset_tracking(&mut self) {
        self.velocity_tracker.reset_tracking();
    }

    /// Consume the tracked drag history and fling with its velocity,
    /// each component limited to `max_speed`.
    pub fn drag_end(&mut self, max_speed: f32) -> Offset {
        let velocity = self.velocity_tracker.calculate_velocity();
        let max_speed = if max_speed.is_finite() {
            max_speed.abs()
        } else {
            f32::MAX
        };
        let velocity = Offset::new(
            velocity.x.clamp(-max_speed, max_speed),
            velocity.y.clamp(-max_speed, max_speed),
        );
        self.fling_decay(velocity);
        velocity
    }

    /// Advance all running animations by one frame. Returns true while any
    /// of them is still running.
    pub fn tick(&mut self, dt: Duration) -> bool {
        let scale = self.tick_scale(dt);
        let translation = self.tick_translation(dt);
        scale || translation
    }

    /// Advance only the scale animation
    pub fn tick_scale(&mut self, dt: Duration) -> bool {
        self.scale.tick(dt)
    }

    /// Advance only the translation animations; the axes move independently
    pub fn tick_translation(&mut self, dt: Duration) -> bool {
        let x = self.translate_x.tick(dt);
        let y = self.translate_y.tick(dt);
        x || y
    }

    /// No animation is running on any value
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.scale.is_running() && !self.translate_x.is_running() && !self.translate_y.is_running()
    }

    #[must_use]
    pub fn is_scale_animating(&self) -> bool {
        self.scale.is_running()
    }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}
