//! Core pixel types for document assembly

use image::{Rgb, RgbImage};

/// Background tone of the composite surface
pub const BACKGROUND: Rgb<u8> = Rgb([0xFF, 0xFF, 0xFF]);

/// Pixel dimensions of a page
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

impl PageSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub const fn scaled(self, factor: u32) -> Self {
        Self {
            width: self.width.saturating_mul(factor),
            height: self.height.saturating_mul(factor),
        }
    }
}

/// One rasterized page, owned by the compositor until it is blitted
pub struct PageBuffer {
    /// Page number (0-indexed)
    pub page: usize,
    /// RGB pixels at render resolution
    pub pixels: RgbImage,
}

impl PageBuffer {
    #[must_use]
    pub fn size(&self) -> PageSize {
        PageSize::new(self.pixels.width(), self.pixels.height())
    }
}

impl std::fmt::Debug for PageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageBuffer")
            .field("page", &self.page)
            .field("width", &self.pixels.width())
            .field("height", &self.pixels.height())
            .finish_non_exhaustive()
    }
}

/// Vertical placement of every page inside a stacked surface
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageLayout {
    offsets: Vec<u32>,
    heights: Vec<u32>,
    width: u32,
}

impl PageLayout {
    /// Stack pages top to bottom in document order. `None` when the total
    /// height does not fit in a `u32`.
    #[must_use]
    pub fn stack(sizes: &[PageSize]) -> Option<Self> {
        let mut offsets = Vec::with_capacity(sizes.len());
        let mut heights = Vec::with_capacity(sizes.len());
        let mut running = 0u32;
        for size in sizes {
            offsets.push(running);
            heights.push(size.height);
            running = running.checked_add(size.height)?;
        }
        Some(Self {
            offsets,
            heights,
            width: sizes.iter().map(|s| s.width).max().unwrap_or(0),
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        match (self.offsets.last(), self.heights.last()) {
            (Some(offset), Some(height)) => offset.saturating_add(*height),
            _ => 0,
        }
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.offsets.len()
    }

    /// Top edge of `page`
    #[must_use]
    pub fn offset(&self, page: usize) -> Option<u32> {
        self.offsets.get(page).copied()
    }

    #[must_use]
    pub fn page_height(&self, page: usize) -> Option<u32> {
        self.heights.get(page).copied()
    }

    #[must_use]
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// Page whose band contains row `y`
    #[must_use]
    pub fn page_at(&self, y: u32) -> Option<usize> {
        if y >= self.height() {
            return None;
        }
        match self.offsets.binary_search(&y) {
            Ok(mut page) => {
                // Zero-height pages share an offset with their successor
                while self.heights[page] == 0 && page + 1 < self.offsets.len() {
                    page += 1;
                }
                Some(page)
            }
            Err(insert) => Some(insert.saturating_sub(1)),
        }
    }

    /// The same layout in a surface shrunk by `factor`
    #[must_use]
    pub fn subsampled(&self, factor: u32) -> Self {
        let factor = factor.max(1);
        Self {
            offsets: self.offsets.iter().map(|o| o / factor).collect(),
            heights: self
                .offsets
                .iter()
                .zip(&self.heights)
                .map(|(o, h)| (o + h) / factor - o / factor)
                .collect(),
            width: self.width / factor,
        }
    }
}

/// All pages stacked vertically on a white, alpha-free surface
pub struct CompositeSurface {
    pub(crate) pixels: RgbImage,
    pub(crate) layout: PageLayout,
}

impl CompositeSurface {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[must_use]
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    #[must_use]
    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    #[must_use]
    pub fn into_parts(self) -> (RgbImage, PageLayout) {
        (self.pixels, self.layout)
    }
}

impl std::fmt::Debug for CompositeSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeSurface")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("pages", &self.layout.page_count())
            .finish_non_exhaustive()
    }
}

/// How faithfully a rendered document reproduces the rasterized pages
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fidelity {
    /// The composite itself
    Full,
    /// Re-decoded from lossy storage at `1 / factor` linear resolution
    Subsampled { factor: u32 },
}

/// Final surface handed to the display layer
pub struct RenderedDocument {
    surface: RgbImage,
    layout: PageLayout,
    fidelity: Fidelity,
}

impl RenderedDocument {
    #[must_use]
    pub fn resident(composite: CompositeSurface) -> Self {
        let (surface, layout) = composite.into_parts();
        Self {
            surface,
            layout,
            fidelity: Fidelity::Full,
        }
    }

    #[must_use]
    pub fn subsampled(surface: RgbImage, layout: PageLayout, factor: u32) -> Self {
        Self {
            surface,
            layout,
            fidelity: Fidelity::Subsampled { factor },
        }
    }

    #[must_use]
    pub fn surface(&self) -> &RgbImage {
        &self.surface
    }

    #[must_use]
    pub fn into_surface(self) -> RgbImage {
        self.surface
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    #[must_use]
    pub fn fidelity(&self) -> Fidelity {
        self.fidelity
    }

    /// Page placement in this surface's own pixel space
    #[must_use]
    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.layout.page_count()
    }

    #[must_use]
    pub fn page_offset(&self, page: usize) -> Option<u32> {
        self.layout.offset(page)
    }

    #[must_use]
    pub fn page_at(&self, y: u32) -> Option<usize> {
        self.layout.page_at(y)
    }
}

impl std::fmt::Debug for RenderedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedDocument")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("pages", &self.page_count())
            .field("fidelity", &self.fidelity)
            .finish_non_exhaustive()
    }
}
