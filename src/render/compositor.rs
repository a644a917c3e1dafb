use image::{RgbImage, imageops};

use super::rasterizer::PageRasterizer;
use super::request::{AssemblyError, CancelToken, PageDecodeError};
use super::source::PageSource;
use super::types::{BACKGROUND, CompositeSurface, PageBuffer, PageLayout, PageSize};

/// Stacks every page of a document onto one tall surface.
///
/// At most one page buffer is alive at a time: each is rendered, copied into
/// its band and dropped before the next page is requested.
#[derive(Clone, Copy, Debug, Default)]
pub struct Compositor {
    rasterizer: PageRasterizer,
}

impl Compositor {
    #[must_use]
    pub fn new(rasterizer: PageRasterizer) -> Self {
        Self { rasterizer }
    }

    pub fn composite<D: PageSource + ?Sized>(
        &self,
        document: &D,
    ) -> Result<CompositeSurface, AssemblyError> {
        self.composite_until(document, &CancelToken::never())
    }

    /// Like [`Self::composite`], giving up between pages once `cancel` fires
    pub fn composite_until<D: PageSource + ?Sized>(
        &self,
        document: &D,
        cancel: &CancelToken,
    ) -> Result<CompositeSurface, AssemblyError> {
        let page_count = document.page_count();
        if page_count == 0 {
            return Err(PageDecodeError::NoPages.into());
        }

        let sizes = (0..page_count)
            .map(|page| self.rasterizer.target_size(document, page))
            .collect::<Result<Vec<PageSize>, _>>()?;
        let layout =
            PageLayout::stack(&sizes).ok_or_else(|| AssemblyError::SurfaceTooLarge {
                width: sizes.iter().map(|s| s.width).max().unwrap_or(0),
                height: sizes.iter().map(|s| u64::from(s.height)).sum(),
            })?;
        let mut pixels = allocate(layout.width(), layout.height())?;
        log::debug!(
            "Compositing {page_count} pages onto {}x{} surface",
            layout.width(),
            layout.height()
        );

        for page in 0..page_count {
            if cancel.is_cancelled() {
                log::debug!("Composite cancelled before page {page}");
                return Err(AssemblyError::Superseded);
            }
            let buffer = self.rasterizer.rasterize(document, page)?;
            blit(&mut pixels, &layout, buffer);
            log::trace!("Released page {page} buffer");
        }

        Ok(CompositeSurface { pixels, layout })
    }
}

fn allocate(width: u32, height: u32) -> Result<RgbImage, AssemblyError> {
    let fits = (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(3))
        .is_some_and(|bytes| bytes <= isize::MAX as usize);
    if !fits {
        return Err(AssemblyError::SurfaceTooLarge {
            width,
            height: u64::from(height),
        });
    }
    Ok(RgbImage::from_pixel(width, height, BACKGROUND))
}

/// Copy a page into its band, clipped to the planned slot. Consumes the buffer.
fn blit(surface: &mut RgbImage, layout: &PageLayout, buffer: PageBuffer) {
    let (Some(top), Some(slot_height)) = (
        layout.offset(buffer.page),
        layout.page_height(buffer.page),
    ) else {
        log::warn!("Page {} has no slot in the layout", buffer.page);
        return;
    };
    let width = buffer.pixels.width().min(surface.width());
    let height = buffer.pixels.height().min(slot_height);
    let visible = imageops::crop_imm(&buffer.pixels, 0, 0, width, height);
    imageops::replace(surface, &*visible, 0, i64::from(top));
}
