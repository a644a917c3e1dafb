//! Scripted pointer sessions fed through a [`GestureController`]
//!
//! A script is JSON:
//!
//! ```json
//! {
//!   "viewport": { "width": 1080.0, "height": 1920.0 },
//!   "content": { "width": 1080.0, "height": 14000.0 },
//!   "initial_scale": 2.0,
//!   "steps": [
//!     { "step": "pointer", "event": { "type": "down", "id": 1, "position": { "x": 500.0, "y": 900.0 }, "time_ms": 0 } },
//!     { "step": "frames", "count": 30 }
//!   ]
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::zoom::{Disposition, GestureController, PointerEvent, Size, Transform};

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("reading replay script: {0}")]
    Read(#[from] std::io::Error),

    #[error("parsing replay script: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ReplayStep {
    Pointer { event: PointerEvent },
    Viewport { size: Size },
    Content { size: Size },
    /// Advance animations by `count` frames
    Frames { count: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    pub viewport: Size,
    pub content: Size,
    #[serde(default)]
    pub initial_scale: Option<f32>,
    #[serde(default)]
    pub steps: Vec<ReplayStep>,
}

impl ReplayScript {
    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

/// Transform observed after one step
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ReplayRecord {
    pub step: usize,
    /// Whether the controller consumed the event; absent for non-pointer steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed: Option<bool>,
    /// Frames still animating after a `frames` step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animating: Option<bool>,
    pub transform: Transform,
}

/// Run `script` against `controller`, one record per step
pub fn replay(
    script: &ReplayScript,
    controller: &mut GestureController,
    frame: Duration,
) -> Vec<ReplayRecord> {
    controller.set_viewport(script.viewport);
    controller.set_content_size(script.content);
    if let Some(scale) = script.initial_scale {
        controller.state_mut().snap_scale(scale);
    }

    script
        .steps
        .iter()
        .enumerate()
        .map(|(step, action)| {
            let mut record = ReplayRecord {
                step,
                consumed: None,
                animating: None,
                transform: controller.transform(),
            };
            match action {
                ReplayStep::Pointer { event } => {
                    record.consumed = Some(controller.handle(*event) == Disposition::Consumed);
                }
                ReplayStep::Viewport { size } => controller.set_viewport(*size),
                ReplayStep::Content { size } => controller.set_content_size(*size),
                ReplayStep::Frames { count } => {
                    let mut running = false;
                    for _ in 0..*count {
                        running = controller.tick(frame);
                    }
                    record.animating = Some(running);
                }
            }
            record.transform = controller.transform();
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zoom::{GestureConfig, TransformState};

    const SCRIPT: &str = r#"{
        "viewport": { "width": 1000.0, "height": 1000.0 },
        "content": { "width": 1000.0, "height": 1000.0 },
        "initial_scale": 2.0,
        "steps": [
            { "step": "pointer", "event": { "type": "down", "id": 1, "position": { "x": 500.0, "y": 500.0 }, "time_ms": 0 } },
            { "step": "pointer", "event": { "type": "move", "id": 1, "position": { "x": 400.0, "y": 500.0 }, "time_ms": 16 } },
            { "step": "pointer", "event": { "type": "up", "id": 1, "position": { "x": 400.0, "y": 500.0 }, "time_ms": 32 } },
            { "step": "frames", "count": 120 }
        ]
    }"#;

    fn controller() -> GestureController {
        GestureController::new(
            TransformState::new(1.0, 5.0).unwrap(),
            GestureConfig::default(),
        )
    }

    #[test]
    fn drag_script_pans_surface() {
        let script = ReplayScript::from_json(SCRIPT).unwrap();
        let records = replay(&script, &mut controller(), Duration::from_millis(16));

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].consumed, Some(false));
        assert_eq!(records[1].consumed, Some(true));
        // 100 px of travel minus the 8 px slop
        assert!((records[1].transform.translate_x + 92.0).abs() < 1e-3);
        assert_eq!(records[1].transform.scale, 2.0);

        let last = records[3];
        assert_eq!(last.animating, Some(false));
        assert!(last.transform.translate_x.abs() <= 500.0);
    }

    #[test]
    fn unknown_step_is_a_parse_error() {
        let json = r#"{
            "viewport": { "width": 1.0, "height": 1.0 },
            "content": { "width": 1.0, "height": 1.0 },
            "steps": [ { "step": "teleport" } ]
        }"#;
        assert!(matches!(
            ReplayScript::from_json(json),
            Err(ReplayError::Parse(_))
        ));
    }

    #[test]
    fn layout_steps_rebound_translation() {
        let script = ReplayScript {
            viewport: Size::new(1000.0, 1000.0),
            content: Size::new(1000.0, 1000.0),
            initial_scale: Some(3.0),
            steps: vec![ReplayStep::Viewport {
                size: Size::new(2000.0, 2000.0),
            }],
        };
        let mut controller = controller();
        let _ = replay(&script, &mut controller, Duration::from_millis(16));
        let bounds = controller.current_bounds().unwrap();
        assert_eq!(bounds.max_x, 500.0);
    }
}
