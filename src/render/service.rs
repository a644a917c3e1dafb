//! Assembly service - owns the worker thread and the last good document

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};

use super::assembler::{MemoryTier, MemoryTieredAssembler};
use super::codec::SurfaceCodec;
use super::request::{AssemblyError, AssemblyRequest, AssemblyResponse, RequestId};
use super::source::open_document;
use super::types::RenderedDocument;
use super::worker::{DocumentOpener, assembly_worker};

/// Outcome of a load, reported by [`AssemblyService::poll`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblyEvent {
    Ready(RequestId),
    Failed(RequestId),
}

/// Assembles documents off the caller's thread.
///
/// Only the most recent load can replace the current document; a failed load
/// leaves the previous one in place.
pub struct AssemblyService {
    request_tx: Sender<AssemblyRequest>,
    response_rx: Receiver<AssemblyResponse>,
    latest: Arc<AtomicU64>,
    next_request_id: u64,
    pending: Option<RequestId>,
    current: Option<Arc<RenderedDocument>>,
    last_error: Option<AssemblyError>,
    full_resolution_decoder: bool,
    worker: Option<JoinHandle<()>>,
}

impl AssemblyService {
    /// Service that opens PDFs (with the `pdf` feature) and image directories
    #[must_use]
    pub fn new<C: SurfaceCodec + Send + 'static>(assembler: MemoryTieredAssembler<C>) -> Self {
        Self::with_opener(Arc::new(open_document), assembler)
    }

    #[must_use]
    pub fn with_opener<C: SurfaceCodec + Send + 'static>(
        opener: DocumentOpener,
        assembler: MemoryTieredAssembler<C>,
    ) -> Self {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();
        let latest = Arc::new(AtomicU64::new(0));
        let full_resolution_decoder = assembler.tier_for(false) == MemoryTier::Resident;

        let worker_latest = Arc::clone(&latest);
        let worker = std::thread::Builder::new()
            .name("pagescroll-assembly".to_string())
            .spawn(move || {
                assembly_worker(opener, assembler, request_rx, response_tx, worker_latest);
            })
            .map_err(|e| log::error!("Failed to spawn assembly worker: {e}"))
            .ok();

        Self {
            request_tx,
            response_rx,
            latest,
            next_request_id: 1,
            pending: None,
            current: None,
            last_error: None,
            full_resolution_decoder,
            worker,
        }
    }

    /// Start assembling `path`, superseding any load still in flight
    pub fn load(&mut self, path: impl Into<PathBuf>, low_memory: bool) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        self.latest.store(id.0, Ordering::Release);

        let tier = MemoryTier::select(low_memory, self.full_resolution_decoder);
        let path = path.into();
        log::debug!("Load {id:?}: {} ({tier:?})", path.display());
        if self
            .request_tx
            .send(AssemblyRequest::Load { id, path, tier })
            .is_err()
        {
            log::error!("Assembly worker is gone; load {id:?} dropped");
            self.last_error = Some(AssemblyError::WorkerUnavailable);
            self.pending = None;
            return id;
        }
        self.pending = Some(id);
        id
    }

    /// Apply finished loads without blocking
    pub fn poll(&mut self) -> Vec<AssemblyEvent> {
        let mut events = Vec::new();
        while let Ok(response) = self.response_rx.try_recv() {
            if let Some(event) = self.apply(response) {
                events.push(event);
            }
        }
        events
    }

    /// Block until the pending load finishes or `timeout` elapses
    pub fn wait(&mut self, timeout: Duration) -> Option<AssemblyEvent> {
        // No representable deadline means wait indefinitely
        let deadline = Instant::now().checked_add(timeout);
        while self.pending.is_some() {
            let response = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    self.response_rx.recv_timeout(remaining).ok()?
                }
                None => self.response_rx.recv().ok()?,
            };
            if let Some(event) = self.apply(response) {
                return Some(event);
            }
        }
        None
    }

    fn apply(&mut self, response: AssemblyResponse) -> Option<AssemblyEvent> {
        let id = response.id();
        if self.pending != Some(id) {
            log::trace!("Dropping stale response for {id:?}");
            return None;
        }
        self.pending = None;
        match response {
            AssemblyResponse::Ready { document, .. } => {
                self.current = Some(document);
                self.last_error = None;
                Some(AssemblyEvent::Ready(id))
            }
            AssemblyResponse::Failed { error, .. } => {
                self.last_error = Some(error);
                Some(AssemblyEvent::Failed(id))
            }
        }
    }

    /// Last successfully assembled document
    #[must_use]
    pub fn current(&self) -> Option<Arc<RenderedDocument>> {
        self.current.clone()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&AssemblyError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Cancel any in-flight load and stop the worker
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.latest.store(u64::MAX, Ordering::Release);
        self.pending = None;
        let _ = self.request_tx.send(AssemblyRequest::Shutdown);
        if worker.join().is_err() {
            log::error!("Assembly worker panicked");
        }
    }
}

impl Drop for AssemblyService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Fidelity, PageDecodeError, PageSource};
    use crate::test_utils::FakeDocument;
    use std::path::Path;

    const TIMEOUT: Duration = Duration::from_secs(10);

    /// Opener keyed on file name: "good*" opens, "bad*" fails page 0
    fn fake_opener() -> DocumentOpener {
        Arc::new(|path: &Path| {
            let name = path.to_string_lossy();
            if name.starts_with("bad") {
                Ok(Box::new(FakeDocument::new(&[(10, 10)]).failing_at(0)) as Box<dyn PageSource>)
            } else if name.starts_with("missing") {
                Err(PageDecodeError::Open {
                    path: path.to_path_buf(),
                    detail: "no such file".to_string(),
                })
            } else {
                Ok(Box::new(FakeDocument::new(&[(10, 10), (10, 20)])) as Box<dyn PageSource>)
            }
        })
    }

    #[test]
    fn load_publishes_document() {
        let mut service = AssemblyService::with_opener(fake_opener(), MemoryTieredAssembler::new());
        let id = service.load("good.pdf", false);
        assert!(service.is_loading());
        assert_eq!(service.wait(TIMEOUT), Some(AssemblyEvent::Ready(id)));

        let doc = service.current().unwrap();
        assert_eq!(doc.fidelity(), Fidelity::Full);
        assert_eq!((doc.width(), doc.height()), (20, 60));
        assert!(!service.is_loading());
        assert!(service.last_error().is_none());
    }

    #[test]
    fn unbounded_wait_blocks_until_ready() {
        let mut service = AssemblyService::with_opener(fake_opener(), MemoryTieredAssembler::new());
        let id = service.load("good.pdf", false);
        assert_eq!(service.wait(Duration::MAX), Some(AssemblyEvent::Ready(id)));
        assert_eq!(service.wait(Duration::MAX), None);
    }

    #[test]
    fn failure_keeps_previous_document() {
        let mut service = AssemblyService::with_opener(fake_opener(), MemoryTieredAssembler::new());
        let first = service.load("good.pdf", false);
        assert_eq!(service.wait(TIMEOUT), Some(AssemblyEvent::Ready(first)));
        let before = service.current().unwrap();

        let second = service.load("bad.pdf", false);
        assert_eq!(service.wait(TIMEOUT), Some(AssemblyEvent::Failed(second)));
        assert!(Arc::ptr_eq(&before, &service.current().unwrap()));
        assert!(matches!(
            service.last_error(),
            Some(AssemblyError::PageDecode(PageDecodeError::Page { page: 0, .. }))
        ));
    }

    #[test]
    fn open_failure_is_reported() {
        let mut service = AssemblyService::with_opener(fake_opener(), MemoryTieredAssembler::new());
        let id = service.load("missing.pdf", false);
        assert_eq!(service.wait(TIMEOUT), Some(AssemblyEvent::Failed(id)));
        assert!(service.current().is_none());
        assert!(matches!(
            service.last_error(),
            Some(AssemblyError::PageDecode(PageDecodeError::Open { .. }))
        ));
    }

    #[test]
    fn newer_load_supersedes_older() {
        let (gate_tx, gate_rx) = flume::bounded::<()>(1);
        let opener: DocumentOpener = Arc::new(move |path: &Path| {
            if path.to_string_lossy().starts_with("slow") {
                let _ = gate_rx.recv();
                Ok(Box::new(FakeDocument::new(&[(10, 10)])) as Box<dyn PageSource>)
            } else {
                Ok(Box::new(FakeDocument::new(&[(30, 30)])) as Box<dyn PageSource>)
            }
        });
        let mut service = AssemblyService::with_opener(opener, MemoryTieredAssembler::new());

        let _slow = service.load("slow.pdf", false);
        let fast = service.load("fast.pdf", false);
        let _ = gate_tx.send(());

        assert_eq!(service.wait(TIMEOUT), Some(AssemblyEvent::Ready(fast)));
        assert_eq!(service.current().unwrap().width(), 60);
        assert!(service.poll().is_empty());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut service = AssemblyService::with_opener(fake_opener(), MemoryTieredAssembler::new());
        service.shutdown();
        service.shutdown();
        assert!(!service.is_loading());
    }
}
