//! Continuous vertical document viewing: every page of a document stacked
//! onto one surface, with scale and pan driven by touch gestures.

pub mod render;
pub mod replay;
pub mod settings;
pub mod zoom;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use render::{AssemblyError, AssemblyService, MemoryTieredAssembler, RenderedDocument};
pub use settings::Settings;
pub use zoom::{GestureController, TransformState};
