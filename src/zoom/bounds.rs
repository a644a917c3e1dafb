//! Pan clamp interval for a scaled surface inside a viewport

use super::geometry::Size;

/// Half-extents of the symmetric pan intervals `[-max_x, max_x]` and
/// `[-max_y, max_y]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PanBounds {
    pub max_x: f32,
    pub max_y: f32,
}

impl PanBounds {
    /// Content fits the viewport on both axes
    #[must_use]
    pub fn is_collapsed(self) -> bool {
        self.max_x == 0.0 && self.max_y == 0.0
    }
}

/// Overflow of `content * scale` past `viewport`, split evenly per side.
///
/// The surface is centered in the viewport, so each side may slide by half
/// of the overflow. Non-positive overflow collapses the axis to zero.
#[must_use]
pub fn pan_bounds(content: Size, viewport: Size, scale: f32) -> PanBounds {
    PanBounds {
        max_x: axis_bound(content.width, viewport.width, scale),
        max_y: axis_bound(content.height, viewport.height, scale),
    }
}

fn axis_bound(content: f32, viewport: f32, scale: f32) -> f32 {
    let overflow = content * scale - viewport;
    if overflow.is_finite() && overflow > 0.0 {
        overflow / 2.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_content_overflowing_viewport() {
        let bounds = pan_bounds(Size::new(800.0, 3000.0), Size::new(1000.0, 1000.0), 2.0);
        assert_eq!(
            bounds,
            PanBounds {
                max_x: 300.0,
                max_y: 2500.0
            }
        );
    }

    #[test]
    fn content_that_fits_collapses_to_zero() {
        let bounds = pan_bounds(Size::new(800.0, 600.0), Size::new(1000.0, 1000.0), 1.0);
        assert!(bounds.is_collapsed());
    }

    #[test]
    fn exact_fit_is_zero_not_negative() {
        let bounds = pan_bounds(Size::new(500.0, 500.0), Size::new(1000.0, 1000.0), 2.0);
        assert_eq!(bounds.max_x, 0.0);
        assert_eq!(bounds.max_y, 0.0);
    }

    #[test]
    fn bound_is_never_negative() {
        for scale in [0.0, 0.25, 1.0, 3.0, 10.0] {
            for content in [0.0, 10.0, 999.0, 1000.0, 5000.0] {
                let bounds = pan_bounds(Size::new(content, content), Size::new(1000.0, 400.0), scale);
                assert!(bounds.max_x >= 0.0);
                assert!(bounds.max_y >= 0.0);
                assert_eq!(bounds.max_x == 0.0, content * scale <= 1000.0);
                assert_eq!(bounds.max_y == 0.0, content * scale <= 400.0);
            }
        }
    }
}
