//! Page decoders that feed the rasterizer

use std::path::{Path, PathBuf};

use fast_image_resize as fr;
use image::RgbImage;

use super::codec::resize_rgb;
use super::request::PageDecodeError;
use super::types::PageSize;

/// A paged document that can draw any page at a requested pixel size.
///
/// Implementations are used from a single worker thread and need not be `Send`.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Natural page size in pixels
    fn page_size(&self, page: usize) -> Result<PageSize, PageDecodeError>;

    /// Draw `page` onto an opaque RGB buffer of `target` size
    fn render_page(&self, page: usize, target: PageSize) -> Result<RgbImage, PageDecodeError>;
}

impl<T: PageSource + ?Sized> PageSource for Box<T> {
    fn page_count(&self) -> usize {
        (**self).page_count()
    }

    fn page_size(&self, page: usize) -> Result<PageSize, PageDecodeError> {
        (**self).page_size(page)
    }

    fn render_page(&self, page: usize, target: PageSize) -> Result<RgbImage, PageDecodeError> {
        (**self).render_page(page, target)
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// A directory of page images, ordered by file name
#[derive(Debug, Clone)]
pub struct ImageDirDocument {
    pages: Vec<PathBuf>,
}

impl ImageDirDocument {
    pub fn open(dir: &Path) -> Result<Self, PageDecodeError> {
        let entries = std::fs::read_dir(dir).map_err(|e| PageDecodeError::Open {
            path: dir.to_path_buf(),
            detail: e.to_string(),
        })?;

        let mut pages: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_page_image(path))
            .collect();
        pages.sort();

        log::debug!(
            "Opened image directory {} with {} pages",
            dir.display(),
            pages.len()
        );
        Ok(Self { pages })
    }

    #[must_use]
    pub fn pages(&self) -> &[PathBuf] {
        &self.pages
    }

    fn path(&self, page: usize) -> Result<&Path, PageDecodeError> {
        self.pages
            .get(page)
            .map(PathBuf::as_path)
            .ok_or(PageDecodeError::OutOfRange {
                page,
                page_count: self.pages.len(),
            })
    }
}

fn is_page_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

impl PageSource for ImageDirDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, page: usize) -> Result<PageSize, PageDecodeError> {
        let path = self.path(page)?;
        let (width, height) = image::image_dimensions(path)
            .map_err(|e| PageDecodeError::page(page, e.to_string()))?;
        Ok(PageSize::new(width, height))
    }

    fn render_page(&self, page: usize, target: PageSize) -> Result<RgbImage, PageDecodeError> {
        let path = self.path(page)?;
        let pixels = image::open(path)
            .map_err(|e| PageDecodeError::page(page, e.to_string()))?
            .into_rgb8();
        resize_rgb(pixels, target.width, target.height, fr::FilterType::Lanczos3)
            .map_err(|e| PageDecodeError::page(page, e.to_string()))
    }
}

/// Open a document by path: directories of page images, or PDFs with the `pdf` feature
pub fn open_document(path: &Path) -> Result<Box<dyn PageSource>, PageDecodeError> {
    if path.is_dir() {
        return Ok(Box::new(ImageDirDocument::open(path)?));
    }
    open_file(path)
}

#[cfg(feature = "pdf")]
fn open_file(path: &Path) -> Result<Box<dyn PageSource>, PageDecodeError> {
    Ok(Box::new(super::pdf::MupdfDocument::open(path)?))
}

#[cfg(not(feature = "pdf"))]
fn open_file(path: &Path) -> Result<Box<dyn PageSource>, PageDecodeError> {
    Err(PageDecodeError::Open {
        path: path.to_path_buf(),
        detail: "not a directory of page images (built without PDF support)".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::TempDir;

    fn write_page(dir: &Path, name: &str, width: u32, height: u32, color: [u8; 3]) {
        RgbImage::from_pixel(width, height, Rgb(color))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn pages_are_sorted_by_name() {
        let dir = TempDir::new().unwrap();
        write_page(dir.path(), "b.png", 4, 6, [0, 0, 0]);
        write_page(dir.path(), "a.png", 2, 3, [0, 0, 0]);
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let doc = ImageDirDocument::open(dir.path()).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page_size(0).unwrap(), PageSize::new(2, 3));
        assert_eq!(doc.page_size(1).unwrap(), PageSize::new(4, 6));
    }

    #[test]
    fn render_scales_to_target() {
        let dir = TempDir::new().unwrap();
        write_page(dir.path(), "page.PNG", 5, 7, [10, 200, 30]);

        let doc = ImageDirDocument::open(dir.path()).unwrap();
        let pixels = doc.render_page(0, PageSize::new(10, 14)).unwrap();
        assert_eq!(pixels.dimensions(), (10, 14));
        let center = pixels.get_pixel(5, 7);
        for (got, want) in center.0.iter().zip([10u8, 200, 30]) {
            assert!(got.abs_diff(want) <= 2, "{center:?}");
        }
    }

    #[test]
    fn corrupt_page_reports_index() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("0.png"), b"not a png").unwrap();

        let doc = ImageDirDocument::open(dir.path()).unwrap();
        match doc.page_size(0) {
            Err(PageDecodeError::Page { page, .. }) => assert_eq!(page, 0),
            other => panic!("expected page error, got {other:?}"),
        }
    }

    #[test]
    fn missing_directory_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            ImageDirDocument::open(&missing),
            Err(PageDecodeError::Open { .. })
        ));
    }

    #[test]
    fn out_of_range_page() {
        let dir = TempDir::new().unwrap();
        let doc = ImageDirDocument::open(dir.path()).unwrap();
        assert!(matches!(
            doc.page_size(0),
            Err(PageDecodeError::OutOfRange { page: 0, page_count: 0 })
        ));
    }
}
