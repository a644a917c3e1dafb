//! Deterministic page sources and codecs for exercising the assembly pipeline

use std::cell::Cell;
use std::io::{BufRead, Seek, Write};

use image::{Rgb, RgbImage};

use crate::render::{
    CodecError, ImageCodec, PageDecodeError, PageSize, PageSource, SpillFormat, SurfaceCodec,
};

/// In-memory document whose pages are solid colors
#[derive(Debug, Default)]
pub struct FakeDocument {
    sizes: Vec<PageSize>,
    failing_page: Option<usize>,
    overdraw: Option<(usize, u32)>,
    renders: Cell<usize>,
}

impl FakeDocument {
    /// Pages with the given natural (width, height)
    pub fn new(sizes: &[(u32, u32)]) -> Self {
        Self {
            sizes: sizes.iter().map(|&(w, h)| PageSize::new(w, h)).collect(),
            ..Self::default()
        }
    }

    /// Rendering `page` fails
    pub fn failing_at(mut self, page: usize) -> Self {
        self.failing_page = Some(page);
        self
    }

    /// `page` renders `extra` rows taller than requested
    pub fn overdrawing_at(mut self, page: usize, extra: u32) -> Self {
        self.overdraw = Some((page, extra));
        self
    }

    /// Fill color of `page`
    pub fn page_color(page: usize) -> Rgb<u8> {
        const PALETTE: [[u8; 3]; 4] = [[200, 40, 40], [40, 160, 40], [40, 40, 200], [20, 20, 20]];
        Rgb(PALETTE[page % PALETTE.len()])
    }

    /// Number of pages rendered successfully
    pub fn render_count(&self) -> usize {
        self.renders.get()
    }
}

impl PageSource for FakeDocument {
    fn page_count(&self) -> usize {
        self.sizes.len()
    }

    fn page_size(&self, page: usize) -> Result<PageSize, PageDecodeError> {
        self.sizes
            .get(page)
            .copied()
            .ok_or(PageDecodeError::OutOfRange {
                page,
                page_count: self.sizes.len(),
            })
    }

    fn render_page(&self, page: usize, target: PageSize) -> Result<RgbImage, PageDecodeError> {
        if self.failing_page == Some(page) {
            return Err(PageDecodeError::page(page, "injected failure"));
        }
        let extra = match self.overdraw {
            Some((p, extra)) if p == page => extra,
            _ => 0,
        };
        self.renders.set(self.renders.get() + 1);
        Ok(RgbImage::from_pixel(
            target.width,
            target.height + extra,
            Self::page_color(page),
        ))
    }
}

/// Which half of the spill round trip a [`FailingCodec`] breaks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecStage {
    Encode,
    Decode,
}

/// PNG codec that fails on purpose at one stage
#[derive(Clone, Copy, Debug)]
pub struct FailingCodec {
    stage: CodecStage,
    inner: ImageCodec,
}

impl FailingCodec {
    pub fn new(stage: CodecStage) -> Self {
        Self {
            stage,
            inner: ImageCodec::new(SpillFormat::Png),
        }
    }
}

impl SurfaceCodec for FailingCodec {
    fn extension(&self, width: u32, height: u32) -> &'static str {
        self.inner.extension(width, height)
    }

    fn encode<W: Write>(&self, surface: &RgbImage, mut out: W) -> Result<(), CodecError> {
        if self.stage == CodecStage::Encode {
            // Leave a partial file behind
            out.write_all(b"partial")?;
            return Err("injected encode failure".into());
        }
        self.inner.encode(surface, out)
    }

    fn decode_subsampled<R: BufRead + Seek>(
        &self,
        input: R,
        factor: u32,
    ) -> Result<RgbImage, CodecError> {
        if self.stage == CodecStage::Decode {
            return Err("injected decode failure".into());
        }
        self.inner.decode_subsampled(input, factor)
    }
}
