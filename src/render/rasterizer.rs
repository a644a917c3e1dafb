use super::RASTER_SCALE;
use super::request::PageDecodeError;
use super::source::PageSource;
use super::types::{PageBuffer, PageSize};

/// Renders single pages at a fixed multiple of their natural size
#[derive(Clone, Copy, Debug)]
pub struct PageRasterizer {
    scale: u32,
}

impl Default for PageRasterizer {
    fn default() -> Self {
        Self {
            scale: RASTER_SCALE,
        }
    }
}

impl PageRasterizer {
    #[must_use]
    pub fn with_scale(scale: u32) -> Self {
        Self {
            scale: scale.max(1),
        }
    }

    #[must_use]
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Size the rasterized page will have
    pub fn target_size<D: PageSource + ?Sized>(
        &self,
        document: &D,
        page: usize,
    ) -> Result<PageSize, PageDecodeError> {
        check_range(document, page)?;
        Ok(document.page_size(page)?.scaled(self.scale))
    }

    /// Render `page` into a freshly owned buffer
    pub fn rasterize<D: PageSource + ?Sized>(
        &self,
        document: &D,
        page: usize,
    ) -> Result<PageBuffer, PageDecodeError> {
        let target = self.target_size(document, page)?;
        let pixels = document.render_page(page, target)?;
        if pixels.dimensions() != (target.width, target.height) {
            log::debug!(
                "Page {page} rendered at {}x{}, planned {}x{}",
                pixels.width(),
                pixels.height(),
                target.width,
                target.height
            );
        }
        Ok(PageBuffer { page, pixels })
    }
}

fn check_range<D: PageSource + ?Sized>(document: &D, page: usize) -> Result<(), PageDecodeError> {
    let page_count = document.page_count();
    if page >= page_count {
        return Err(PageDecodeError::OutOfRange { page, page_count });
    }
    Ok(())
}
