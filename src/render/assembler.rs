use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;

use super::LOW_MEMORY_SUBSAMPLE;
use super::codec::{ImageCodec, SurfaceCodec};
use super::compositor::Compositor;
use super::request::{AssemblyError, CancelToken};
use super::source::PageSource;
use super::types::{CompositeSurface, RenderedDocument};

/// Where the finished composite lives
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryTier {
    /// Keep the full-resolution composite in memory
    Resident,
    /// Round-trip through compressed temporary storage at reduced resolution
    Spill,
}

impl MemoryTier {
    #[must_use]
    pub fn select(low_memory: bool, full_resolution_decoder: bool) -> Self {
        if low_memory || !full_resolution_decoder {
            Self::Spill
        } else {
            Self::Resident
        }
    }
}

/// Composites a document and then keeps or spills the result by memory tier
#[derive(Debug)]
pub struct MemoryTieredAssembler<C = ImageCodec> {
    compositor: Compositor,
    codec: C,
    spill_dir: Option<PathBuf>,
    full_resolution_decoder: bool,
}

impl MemoryTieredAssembler<ImageCodec> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_codec(ImageCodec::default())
    }
}

impl Default for MemoryTieredAssembler<ImageCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: SurfaceCodec> MemoryTieredAssembler<C> {
    #[must_use]
    pub fn with_codec(codec: C) -> Self {
        Self {
            compositor: Compositor::default(),
            codec,
            spill_dir: None,
            full_resolution_decoder: true,
        }
    }

    /// Directory for spill files; the system temp dir when unset
    #[must_use]
    pub fn spill_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.spill_dir = dir;
        self
    }

    /// Mark the decoder as unable to hold full-resolution surfaces
    #[must_use]
    pub fn legacy_decoder(mut self, legacy: bool) -> Self {
        self.full_resolution_decoder = !legacy;
        self
    }

    #[must_use]
    pub fn tier_for(&self, low_memory: bool) -> MemoryTier {
        MemoryTier::select(low_memory, self.full_resolution_decoder)
    }

    pub fn assemble<D: PageSource + ?Sized>(
        &self,
        document: &D,
        low_memory: bool,
    ) -> Result<RenderedDocument, AssemblyError> {
        self.assemble_until(document, self.tier_for(low_memory), &CancelToken::never())
    }

    pub fn assemble_until<D: PageSource + ?Sized>(
        &self,
        document: &D,
        tier: MemoryTier,
        cancel: &CancelToken,
    ) -> Result<RenderedDocument, AssemblyError> {
        log::debug!("Assembling {} pages, tier {tier:?}", document.page_count());
        let composite = self.compositor.composite_until(document, cancel)?;
        let rendered = match tier {
            MemoryTier::Resident => RenderedDocument::resident(composite),
            MemoryTier::Spill => self.spill_and_reload(composite)?,
        };
        log::info!(
            "Assembled {} pages into {}x{} surface ({:?})",
            rendered.page_count(),
            rendered.width(),
            rendered.height(),
            rendered.fidelity()
        );
        Ok(rendered)
    }

    fn spill_and_reload(
        &self,
        composite: CompositeSurface,
    ) -> Result<RenderedDocument, AssemblyError> {
        let (pixels, layout) = composite.into_parts();
        let (width, height) = pixels.dimensions();
        // Removed on drop, whichever way this function exits
        let mut spill = self.spill_file(self.codec.extension(width, height))?;
        log::debug!("Spilling {width}x{height} surface to {}", spill.path().display());

        {
            let mut writer = BufWriter::new(spill.as_file_mut());
            self.codec
                .encode(&pixels, &mut writer)
                .map_err(AssemblyError::Encode)?;
            writer.flush()?;
        }
        drop(pixels);

        spill.as_file_mut().seek(SeekFrom::Start(0))?;
        let surface = self
            .codec
            .decode_subsampled(BufReader::new(spill.as_file_mut()), LOW_MEMORY_SUBSAMPLE)
            .map_err(AssemblyError::Decode)?;
        spill.close()?;

        Ok(RenderedDocument::subsampled(
            surface,
            layout.subsampled(LOW_MEMORY_SUBSAMPLE),
            LOW_MEMORY_SUBSAMPLE,
        ))
    }

    fn spill_file(&self, extension: &str) -> std::io::Result<NamedTempFile> {
        let suffix = format!(".{extension}");
        let mut builder = tempfile::Builder::new();
        builder.prefix("pagescroll-spill-").suffix(&suffix);
        match self.spill_dir.as_deref() {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }
}
