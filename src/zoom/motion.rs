//! Interruptible per-axis animations
//!
//! An [`AnimatedValue`] holds one scalar plus at most one running motion
//! (tween, spring or exponential decay). Motions are advanced cooperatively
//! by [`AnimatedValue::tick`] once per frame; starting a new motion or
//! snapping replaces the running one before anything else happens.

use std::time::Duration;

/// Springs settle once both distance and speed drop below this
const SPRING_VISIBILITY_THRESHOLD: f32 = 0.01;

/// Easing curves for tweens, expressed as cubic béziers through (0,0) and (1,1)
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Easing {
    Linear,
    /// Material standard curve (0.4, 0.0, 0.2, 1.0)
    FastOutSlowIn,
    /// (0.33, 1.0, 0.68, 1.0)
    EaseOutCubic,
    CubicBezier(f32, f32, f32, f32),
}

impl Easing {
    /// Map linear progress in `[0, 1]` to eased progress
    #[must_use]
    pub fn transform(self, fraction: f32) -> f32 {
        let fraction = fraction.clamp(0.0, 1.0);
        let (x1, y1, x2, y2) = match self {
            Self::Linear => return fraction,
            Self::FastOutSlowIn => (0.4, 0.0, 0.2, 1.0),
            Self::EaseOutCubic => (0.33, 1.0, 0.68, 1.0),
            Self::CubicBezier(x1, y1, x2, y2) => (x1, y1, x2, y2),
        };
        if fraction == 0.0 || fraction == 1.0 {
            return fraction;
        }

        // Find the curve parameter whose x matches the fraction, then read y.
        let mut lo = 0.0_f32;
        let mut hi = 1.0_f32;
        let mut t = fraction;
        for _ in 0..32 {
            let x = bezier(t, x1, x2);
            if (x - fraction).abs() < 1e-5 {
                break;
            }
            if x < fraction {
                lo = t;
            } else {
                hi = t;
            }
            t = (lo + hi) / 2.0;
        }
        bezier(t, y1, y2)
    }
}

fn bezier(t: f32, p1: f32, p2: f32) -> f32 {
    let u = 1.0 - t;
    3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t
}

/// How a value travels to an explicit target
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AnimationSpec {
    Tween { duration: Duration, easing: Easing },
    Spring { damping_ratio: f32, stiffness: f32 },
}

impl AnimationSpec {
    pub const STIFFNESS_MEDIUM: f32 = 1500.0;

    #[must_use]
    pub fn tween(duration: Duration) -> Self {
        Self::Tween {
            duration,
            easing: Easing::FastOutSlowIn,
        }
    }
}

impl Default for AnimationSpec {
    /// Critically damped spring of medium stiffness
    fn default() -> Self {
        Self::Spring {
            damping_ratio: 1.0,
            stiffness: Self::STIFFNESS_MEDIUM,
        }
    }
}

/// Exponential velocity decay used for flings
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecaySpec {
    /// Decay rate per second; velocity at `t` is `v0 * exp(-friction * t)`
    pub friction: f32,
    /// Motion ends once speed falls below this (px/s)
    pub velocity_threshold: f32,
}

impl DecaySpec {
    /// Friction must be finite and positive for the decay to converge
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.friction.is_finite() && self.friction > 0.0
    }
}

impl Default for DecaySpec {
    fn default() -> Self {
        Self {
            friction: 4.2,
            velocity_threshold: 0.1,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Motion {
    Tween {
        from: f32,
        to: f32,
        duration: Duration,
        easing: Easing,
    },
    Spring {
        target: f32,
        initial_offset: f32,
        initial_velocity: f32,
        damping_ratio: f32,
        stiffness: f32,
    },
    Decay {
        from: f32,
        initial_velocity: f32,
        spec: DecaySpec,
    },
}

/// One animatable scalar with optional clamp bounds
#[derive(Debug)]
pub struct AnimatedValue {
    value: f32,
    velocity: f32,
    bounds: Option<(f32, f32)>,
    motion: Option<Motion>,
    elapsed: Duration,
}

impl AnimatedValue {
    #[must_use]
    pub fn new(value: f32) -> Self {
        Self {
            value,
            velocity: 0.0,
            bounds: None,
            motion: None,
            elapsed: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Instantaneous velocity of the running motion, 0 when idle
    #[must_use]
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    #[must_use]
    pub fn bounds(&self) -> Option<(f32, f32)> {
        self.bounds
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.motion.is_some()
    }

    /// Cancel any motion and jump to `value` (clamped to the bounds)
    pub fn snap_to(&mut self, value: f32) {
        self.stop();
        self.value = self.clamp(value);
    }

    /// Cancel any motion and start moving toward `target`, keeping the
    /// current velocity as the spring's initial velocity.
    pub fn animate_to(&mut self, target: f32, spec: AnimationSpec) {
        let target = self.clamp(target);
        let initial_velocity = self.velocity;
        self.stop();

        if target == self.value && initial_velocity == 0.0 {
            return;
        }

        self.motion = Some(match spec {
            AnimationSpec::Tween { duration, easing } => {
                if duration.is_zero() {
                    self.value = target;
                    return;
                }
                Motion::Tween {
                    from: self.value,
                    to: target,
                    duration,
                    easing,
                }
            }
            AnimationSpec::Spring {
                damping_ratio,
                stiffness,
            } => Motion::Spring {
                target,
                initial_offset: self.value - target,
                initial_velocity,
                damping_ratio: damping_ratio.max(0.0),
                stiffness: stiffness.max(f32::EPSILON),
            },
        });
        self.velocity = initial_velocity;
    }

    /// Cancel any motion and coast from the current value with `velocity`
    pub fn animate_decay(&mut self, velocity: f32, spec: DecaySpec) {
        self.stop();
        if !spec.is_valid() {
            log::warn!("Ignoring fling with friction {}", spec.friction);
            return;
        }
        if !velocity.is_finite() || velocity.abs() <= spec.velocity_threshold {
            return;
        }
        self.motion = Some(Motion::Decay {
            from: self.value,
            initial_velocity: velocity,
            spec,
        });
        self.velocity = velocity;
    }

    /// Replace the clamp interval. An idle value outside the new interval
    /// is pulled back into it immediately; a running motion is clamped on
    /// its next tick.
    pub fn update_bounds(&mut self, lower: f32, upper: f32) {
        debug_assert!(lower <= upper, "inverted bounds [{lower}, {upper}]");
        self.bounds = Some((lower, upper));
        if self.motion.is_none() {
            self.value = self.clamp(self.value);
        }
    }

    /// Cancel the running motion, leaving the value where it is
    pub fn stop(&mut self) {
        self.motion = None;
        self.velocity = 0.0;
        self.elapsed = Duration::ZERO;
    }

    /// Advance the running motion by `dt`. Returns true while still running.
    pub fn tick(&mut self, dt: Duration) -> bool {
        let Some(motion) = self.motion else {
            return false;
        };
        self.elapsed += dt;
        let t = self.elapsed.as_secs_f32();

        let (value, velocity, finished) = match motion {
            Motion::Tween {
                from,
                to,
                duration,
                easing,
            } => {
                let fraction = (t / duration.as_secs_f32()).min(1.0);
                let value = from + (to - from) * easing.transform(fraction);
                let finished = fraction >= 1.0;
                let velocity = if finished || t <= 0.0 {
                    0.0
                } else {
                    (value - self.value) / dt.as_secs_f32().max(f32::EPSILON)
                };
                (if finished { to } else { value }, velocity, finished)
            }
            Motion::Spring {
                target,
                initial_offset,
                initial_velocity,
                damping_ratio,
                stiffness,
            } => {
                let (offset, velocity) =
                    spring_state(initial_offset, initial_velocity, damping_ratio, stiffness, t);
                let settled = offset.abs() < SPRING_VISIBILITY_THRESHOLD
                    && velocity.abs() < SPRING_VISIBILITY_THRESHOLD * 10.0;
                if settled {
                    (target, 0.0, true)
                } else {
                    (target + offset, velocity, false)
                }
            }
            Motion::Decay {
                from,
                initial_velocity,
                spec,
            } => {
                let decay = (-spec.friction * t).exp();
                let velocity = initial_velocity * decay;
                let value = from + initial_velocity / spec.friction * (1.0 - decay);
                (value, velocity, velocity.abs() <= spec.velocity_threshold)
            }
        };

        let clamped = self.clamp(value);
        let hit_bound = clamped != value;
        self.value = clamped;
        self.velocity = velocity;

        if finished || hit_bound {
            self.stop();
            false
        } else {
            true
        }
    }

    fn clamp(&self, value: f32) -> f32 {
        match self.bounds {
            Some((lower, upper)) => value.clamp(lower, upper),
            None => value,
        }
    }
}

/// Displacement from target and velocity of a damped spring after `t` seconds
fn spring_state(x0: f32, v0: f32, zeta: f32, stiffness: f32, t: f32) -> (f32, f32) {
    let omega = stiffness.sqrt();

    if (zeta - 1.0).abs() < 1e-4 {
        let c1 = x0;
        let c2 = v0 + omega * x0;
        let decay = (-omega * t).exp();
        let x = (c1 + c2 * t) * decay;
        let v = (c2 - omega * (c1 + c2 * t)) * decay;
        (x, v)
    } else if zeta < 1.0 {
        let omega_d = omega * (1.0 - zeta * zeta).sqrt();
        let c1 = x0;
        let c2 = (v0 + zeta * omega * x0) / omega_d;
        let decay = (-zeta * omega * t).exp();
        let (sin, cos) = (omega_d * t).sin_cos();
        let x = decay * (c1 * cos + c2 * sin);
        let v = decay
            * (-zeta * omega * (c1 * cos + c2 * sin) + omega_d * (c2 * cos - c1 * sin));
        (x, v)
    } else {
        let root = (zeta * zeta - 1.0).sqrt();
        let r1 = -omega * (zeta - root);
        let r2 = -omega * (zeta + root);
        let c2 = (v0 - r1 * x0) / (r2 - r1);
        let c1 = x0 - c2;
        let (e1, e2) = ((r1 * t).exp(), (r2 * t).exp());
        (c1 * e1 + c2 * e2, c1 * r1 * e1 + c2 * r2 * e2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    fn run_to_rest(value: &mut AnimatedValue) -> usize {
        let mut frames = 0;
        while value.tick(FRAME) {
            frames += 1;
            assert!(frames < 10_000, "animation never settled");
        }
        frames
    }

    #[test]
    fn easing_endpoints_are_fixed() {
        for easing in [
            Easing::Linear,
            Easing::FastOutSlowIn,
            Easing::EaseOutCubic,
            Easing::CubicBezier(0.1, 0.7, 0.1, 1.0),
        ] {
            assert_eq!(easing.transform(0.0), 0.0);
            assert_eq!(easing.transform(1.0), 1.0);
        }
    }

    #[test]
    fn fast_out_slow_in_leads_linear_midway() {
        assert!(Easing::FastOutSlowIn.transform(0.5) > 0.5);
    }

    #[test]
    fn tween_reaches_target_exactly() {
        let mut value = AnimatedValue::new(1.0);
        value.animate_to(3.0, AnimationSpec::tween(Duration::from_millis(160)));
        assert!(value.is_running());
        let frames = run_to_rest(&mut value);
        assert_eq!(value.value(), 3.0);
        assert!((9..=10).contains(&frames));
    }

    #[test]
    fn spring_settles_on_target() {
        let mut value = AnimatedValue::new(1.0);
        value.animate_to(2.0, AnimationSpec::default());
        run_to_rest(&mut value);
        assert_eq!(value.value(), 2.0);
        assert_eq!(value.velocity(), 0.0);
    }

    #[test]
    fn bouncy_spring_settles_on_target() {
        let mut value = AnimatedValue::new(0.0);
        value.animate_to(
            100.0,
            AnimationSpec::Spring {
                damping_ratio: 0.5,
                stiffness: 400.0,
            },
        );
        run_to_rest(&mut value);
        assert_eq!(value.value(), 100.0);
    }

    #[test]
    fn overdamped_spring_settles_on_target() {
        let mut value = AnimatedValue::new(0.0);
        value.animate_to(
            -40.0,
            AnimationSpec::Spring {
                damping_ratio: 2.0,
                stiffness: 800.0,
            },
        );
        run_to_rest(&mut value);
        assert_eq!(value.value(), -40.0);
    }

    #[test]
    fn snap_cancels_running_animation() {
        let mut value = AnimatedValue::new(0.0);
        value.animate_to(10.0, AnimationSpec::default());
        value.tick(FRAME);
        value.snap_to(4.0);
        assert!(!value.is_running());
        assert!(!value.tick(FRAME));
        assert_eq!(value.value(), 4.0);
    }

    #[test]
    fn decay_travels_velocity_over_friction() {
        let mut value = AnimatedValue::new(0.0);
        let spec = DecaySpec::default();
        value.animate_decay(420.0, spec);
        run_to_rest(&mut value);
        // Total distance of v0 / friction, minus the tail below threshold
        assert!((value.value() - 100.0).abs() < 0.1, "{}", value.value());
    }

    #[test]
    fn decay_stops_at_bound() {
        let mut value = AnimatedValue::new(0.0);
        value.update_bounds(-30.0, 30.0);
        value.animate_decay(5000.0, DecaySpec::default());
        run_to_rest(&mut value);
        assert_eq!(value.value(), 30.0);
        assert!(!value.is_running());
    }

    #[test]
    fn frictionless_fling_is_ignored() {
        for friction in [0.0, -1.0, f32::NAN] {
            let mut value = AnimatedValue::new(5.0);
            value.animate_decay(
                500.0,
                DecaySpec {
                    friction,
                    ..DecaySpec::default()
                },
            );
            assert!(!value.is_running());
            value.tick(FRAME);
            assert_eq!(value.value(), 5.0);
        }
    }

    #[test]
    fn negligible_fling_does_not_start() {
        let mut value = AnimatedValue::new(5.0);
        value.animate_decay(0.05, DecaySpec::default());
        assert!(!value.is_running());
    }

    #[test]
    fn update_bounds_clamps_idle_value() {
        let mut value = AnimatedValue::new(50.0);
        value.update_bounds(-20.0, 20.0);
        assert_eq!(value.value(), 20.0);
        value.update_bounds(-20.0, 20.0);
        assert_eq!(value.value(), 20.0);
    }

    #[test]
    fn animate_target_is_clamped_to_bounds() {
        let mut value = AnimatedValue::new(0.0);
        value.update_bounds(-1.0, 1.0);
        value.animate_to(10.0, AnimationSpec::tween(Duration::from_millis(32)));
        run_to_rest(&mut value);
        assert_eq!(value.value(), 1.0);
    }
}
