//! Document assembly: page rasterization, vertical compositing and memory tiering
//!
//! Pages are rendered one at a time at twice their natural size and stacked
//! onto a single surface. On memory-constrained devices the surface is
//! spilled to a compressed temporary file and reloaded at half resolution.

pub mod assembler;
pub mod codec;
pub mod compositor;
#[cfg(feature = "pdf")]
pub mod pdf;
pub mod rasterizer;
pub mod request;
pub mod service;
pub mod source;
pub mod types;
pub mod worker;

pub use assembler::{MemoryTier, MemoryTieredAssembler};
pub use codec::{ImageCodec, SpillFormat, SurfaceCodec};
pub use compositor::Compositor;
#[cfg(feature = "pdf")]
pub use pdf::MupdfDocument;
pub use rasterizer::PageRasterizer;
pub use request::{AssemblyError, CancelToken, CodecError, PageDecodeError, RequestId};
pub use service::{AssemblyEvent, AssemblyService};
pub use source::{ImageDirDocument, PageSource, open_document};
pub use types::{
    BACKGROUND, CompositeSurface, Fidelity, PageBuffer, PageLayout, PageSize, RenderedDocument,
};
pub use worker::DocumentOpener;

/// Pages are rasterized at this multiple of their natural size
pub const RASTER_SCALE: u32 = 2;

/// Linear downsampling applied when reloading a spilled surface
pub const LOW_MEMORY_SUBSAMPLE: u32 = 2;

/// Spill files use the encoder's best quality
pub const SPILL_JPEG_QUALITY: u8 = 100;

/// Largest width or height a baseline JPEG can describe
pub const JPEG_MAX_DIMENSION: u32 = 65_535;
