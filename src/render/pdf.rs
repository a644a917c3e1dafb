use std::path::Path;

use image::RgbImage;
use mupdf::{Colorspace, Document, Matrix, Pixmap};

use super::request::PageDecodeError;
use super::source::PageSource;
use super::types::PageSize;

/// PDF page decoder backed by MuPDF.
///
/// MuPDF documents are not `Send`; open one on the thread that renders it.
pub struct MupdfDocument {
    doc: Document,
    page_count: usize,
}

impl MupdfDocument {
    pub fn open(path: &Path) -> Result<Self, PageDecodeError> {
        let open_error = |detail: String| PageDecodeError::Open {
            path: path.to_path_buf(),
            detail,
        };
        let path_str = path
            .to_str()
            .ok_or_else(|| open_error("path is not valid UTF-8".to_string()))?;
        let doc = Document::open(path_str).map_err(|e| open_error(e.to_string()))?;
        let page_count = doc
            .page_count()
            .map_err(|e| open_error(e.to_string()))?
            .max(0) as usize;
        log::debug!("Opened PDF {} with {page_count} pages", path.display());
        Ok(Self { doc, page_count })
    }

    fn load(&self, page: usize) -> Result<mupdf::Page, PageDecodeError> {
        if page >= self.page_count {
            return Err(PageDecodeError::OutOfRange {
                page,
                page_count: self.page_count,
            });
        }
        self.doc
            .load_page(page as i32)
            .map_err(|e| PageDecodeError::page(page, e.to_string()))
    }
}

impl PageSource for MupdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, page: usize) -> Result<PageSize, PageDecodeError> {
        let bounds = self
            .load(page)?
            .bounds()
            .map_err(|e| PageDecodeError::page(page, e.to_string()))?;
        let width = (bounds.x1 - bounds.x0).round().max(1.0) as u32;
        let height = (bounds.y1 - bounds.y0).round().max(1.0) as u32;
        Ok(PageSize::new(width, height))
    }

    fn render_page(&self, page: usize, target: PageSize) -> Result<RgbImage, PageDecodeError> {
        let natural = self.page_size(page)?;
        let scale_x = target.width as f32 / natural.width as f32;
        let scale_y = target.height as f32 / natural.height as f32;

        let pixmap = self
            .load(page)?
            .to_pixmap(
                &Matrix::new_scale(scale_x, scale_y),
                &Colorspace::device_rgb(),
                false,
                false,
            )
            .map_err(|e| PageDecodeError::page(page, e.to_string()))?;

        let (width, height) = (pixmap.width() as u32, pixmap.height() as u32);
        let rgb = pixmap_to_rgb(&pixmap).map_err(|detail| PageDecodeError::page(page, detail))?;
        let pixels = RgbImage::from_raw(width, height, rgb)
            .ok_or_else(|| PageDecodeError::page(page, "pixmap size mismatch"))?;

        if pixels.dimensions() == (target.width, target.height) {
            return Ok(pixels);
        }
        // MuPDF rounds the page box; pad or crop onto the planned slot
        let mut slot = RgbImage::from_pixel(target.width, target.height, super::BACKGROUND);
        image::imageops::replace(&mut slot, &pixels, 0, 0);
        Ok(slot)
    }
}

fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<Vec<u8>, String> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(format!("unsupported pixmap format: {n} channels"));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err("pixmap buffer size mismatch".to_string());
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for row in samples.chunks(stride).take(height) {
        let row = &row[..row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }
    Ok(out)
}
