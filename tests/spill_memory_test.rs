use std::alloc::{GlobalAlloc, Layout, System};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use image::RgbImage;
use pagescroll::render::{ImageCodec, MemoryTieredAssembler, SpillFormat, SurfaceCodec};
use pagescroll::test_utils::FakeDocument;
use tempfile::TempDir;

/// Tracks live heap bytes and their high-water mark
struct PeakAllocator;

static LIVE: AtomicUsize = AtomicUsize::new(0);
static PEAK: AtomicUsize = AtomicUsize::new(0);

fn grew(bytes: usize) {
    let live = LIVE.fetch_add(bytes, Ordering::SeqCst) + bytes;
    PEAK.fetch_max(live, Ordering::SeqCst);
}

unsafe impl GlobalAlloc for PeakAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            grew(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            grew(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        LIVE.fetch_sub(layout.size(), Ordering::SeqCst);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let moved = unsafe { System.realloc(ptr, layout, new_size) };
        if !moved.is_null() {
            if new_size >= layout.size() {
                grew(new_size - layout.size());
            } else {
                LIVE.fetch_sub(layout.size() - new_size, Ordering::SeqCst);
            }
        }
        moved
    }
}

#[global_allocator]
static ALLOCATOR: PeakAllocator = PeakAllocator;

/// Measurements share the global counters, so run them one at a time
static SERIAL: Mutex<()> = Mutex::new(());

/// Heap growth above the starting level at the worst point of `work`
fn peak_during<T>(work: impl FnOnce() -> T) -> (T, usize) {
    let baseline = LIVE.load(Ordering::SeqCst);
    PEAK.store(baseline, Ordering::SeqCst);
    let result = work();
    (result, PEAK.load(Ordering::SeqCst) - baseline)
}

/// Six 500x700 pages: a 1000x8400 composite of 25.2 MB
fn tall_document() -> FakeDocument {
    FakeDocument::new(&[(500, 700); 6])
}

const COMPOSITE_BYTES: usize = 1000 * 8400 * 3;

#[test]
fn test_spill_path_never_peaks_above_resident_path() {
    let _serial = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
    let doc = tall_document();

    let (resident, resident_peak) =
        peak_during(|| MemoryTieredAssembler::new().assemble(&doc, false).unwrap());
    assert_eq!((resident.width(), resident.height()), (1000, 8400));
    drop(resident);
    assert!(resident_peak >= COMPOSITE_BYTES);

    for format in [SpillFormat::Jpeg, SpillFormat::Png] {
        let spill = TempDir::new().unwrap();
        let assembler = MemoryTieredAssembler::with_codec(ImageCodec::new(format))
            .spill_dir(Some(spill.path().to_path_buf()));
        let (reduced, spill_peak) = peak_during(|| assembler.assemble(&doc, true).unwrap());

        assert_eq!((reduced.width(), reduced.height()), (500, 4200));
        assert!(
            spill_peak <= resident_peak + resident_peak / 20,
            "{format:?}: spill peak {spill_peak} above resident peak {resident_peak}"
        );
    }
}

#[test]
fn test_reload_never_materializes_full_surface() {
    let _serial = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);

    for format in [SpillFormat::Jpeg, SpillFormat::Png] {
        let codec = ImageCodec::new(format);
        let mut encoded = Vec::new();
        {
            let surface = RgbImage::from_fn(1000, 8400, |_, y| {
                FakeDocument::page_color((y / 1400) as usize)
            });
            codec.encode(&surface, &mut encoded).unwrap();
        }

        let (reduced, reload_peak) =
            peak_during(|| codec.decode_subsampled(Cursor::new(&encoded), 2).unwrap());

        assert_eq!(reduced.dimensions(), (500, 4200));
        assert!(
            reload_peak < COMPOSITE_BYTES * 3 / 4,
            "{format:?}: reload peak {reload_peak} reaches full surface size {COMPOSITE_BYTES}"
        );
    }
}
