//! Assembly worker thread

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use flume::{Receiver, Sender};

use super::assembler::{MemoryTier, MemoryTieredAssembler};
use super::codec::SurfaceCodec;
use super::request::{
    AssemblyError, AssemblyRequest, AssemblyResponse, CancelToken, PageDecodeError, RequestId,
};
use super::source::PageSource;

/// Opens a document on the worker thread
pub type DocumentOpener =
    Arc<dyn Fn(&Path) -> Result<Box<dyn PageSource>, PageDecodeError> + Send + Sync>;

/// Main worker function - runs in a dedicated thread
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub fn assembly_worker<C: SurfaceCodec>(
    opener: DocumentOpener,
    assembler: MemoryTieredAssembler<C>,
    requests: Receiver<AssemblyRequest>,
    responses: Sender<AssemblyResponse>,
    latest: Arc<AtomicU64>,
) {
    while let Ok(mut request) = requests.recv() {
        // Only the newest queued load matters
        while let Ok(next) = requests.try_recv() {
            if let AssemblyRequest::Load { id, .. } = request {
                let _ = responses.send(AssemblyResponse::Failed {
                    id,
                    error: AssemblyError::Superseded,
                });
            }
            request = next;
            if matches!(request, AssemblyRequest::Shutdown) {
                break;
            }
        }

        match request {
            AssemblyRequest::Load { id, path, tier } => {
                let cancel = CancelToken::new(id, Arc::clone(&latest));
                let response = handle_load(&opener, &assembler, id, &path, tier, &cancel);
                let _ = responses.send(response);
            }
            AssemblyRequest::Shutdown => break,
        }
    }
    log::debug!("Assembly worker stopped");
}

fn handle_load<C: SurfaceCodec>(
    opener: &DocumentOpener,
    assembler: &MemoryTieredAssembler<C>,
    id: RequestId,
    path: &Path,
    tier: MemoryTier,
    cancel: &CancelToken,
) -> AssemblyResponse {
    let result = opener(path)
        .map_err(AssemblyError::from)
        .and_then(|document| assembler.assemble_until(&document, tier, cancel));
    match result {
        Ok(document) => AssemblyResponse::Ready {
            id,
            document: Arc::new(document),
        },
        Err(AssemblyError::Superseded) => {
            log::debug!("Load {id:?} of {} superseded", path.display());
            AssemblyResponse::Failed {
                id,
                error: AssemblyError::Superseded,
            }
        }
        Err(error) => {
            log::warn!("Assembly of {} failed: {error}", path.display());
            AssemblyResponse::Failed { id, error }
        }
    }
}
