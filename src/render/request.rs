//! Assembly request/response types and errors

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::assembler::MemoryTier;
use super::types::RenderedDocument;

/// Boxed error from an image codec
pub type CodecError = Box<dyn std::error::Error + Send + Sync>;

/// Unique identifier for load requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// A page could not be produced by the page decoder
#[derive(Debug, thiserror::Error)]
pub enum PageDecodeError {
    #[error("document has no pages")]
    NoPages,

    #[error("page {page} is out of range (document has {page_count} pages)")]
    OutOfRange { page: usize, page_count: usize },

    #[error("page {page}: {detail}")]
    Page { page: usize, detail: String },

    #[error("cannot open {}: {detail}", path.display())]
    Open { path: PathBuf, detail: String },
}

impl PageDecodeError {
    pub fn page(page: usize, detail: impl Into<String>) -> Self {
        Self::Page {
            page,
            detail: detail.into(),
        }
    }
}

/// Assembly of a document failed; nothing was produced
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error(transparent)]
    PageDecode(#[from] PageDecodeError),

    #[error("composite surface {width}x{height} exceeds addressable memory")]
    SurfaceTooLarge { width: u32, height: u64 },

    #[error("spill storage: {0}")]
    Spill(#[from] std::io::Error),

    #[error("encoding composite surface: {0}")]
    Encode(#[source] CodecError),

    #[error("decoding spilled surface: {0}")]
    Decode(#[source] CodecError),

    #[error("superseded by a newer load request")]
    Superseded,

    #[error("assembly worker is not running")]
    WorkerUnavailable,
}

/// Cooperative cancellation shared between the service and its worker.
///
/// A request is cancelled once the service has issued a newer request id.
#[derive(Clone, Debug)]
pub struct CancelToken {
    id: RequestId,
    latest: Option<Arc<AtomicU64>>,
}

impl CancelToken {
    #[must_use]
    pub fn new(id: RequestId, latest: Arc<AtomicU64>) -> Self {
        Self {
            id,
            latest: Some(latest),
        }
    }

    /// A token that is never cancelled
    #[must_use]
    pub fn never() -> Self {
        Self {
            id: RequestId::new(0),
            latest: None,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.latest
            .as_ref()
            .is_some_and(|latest| latest.load(Ordering::Acquire) != self.id.0)
    }
}

/// Request sent to the assembly worker
#[derive(Debug)]
pub enum AssemblyRequest {
    /// Assemble a document from scratch
    Load {
        id: RequestId,
        path: PathBuf,
        tier: MemoryTier,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Response from the assembly worker
#[derive(Debug)]
pub enum AssemblyResponse {
    Ready {
        id: RequestId,
        document: Arc<RenderedDocument>,
    },

    Failed {
        id: RequestId,
        error: AssemblyError,
    },
}

impl AssemblyResponse {
    #[must_use]
    pub fn id(&self) -> RequestId {
        match self {
            Self::Ready { id, .. } | Self::Failed { id, .. } => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_cancels_once_newer_request_issued() {
        let latest = Arc::new(AtomicU64::new(3));
        let token = CancelToken::new(RequestId::new(3), Arc::clone(&latest));
        assert!(!token.is_cancelled());
        latest.store(4, Ordering::Release);
        assert!(token.is_cancelled());
    }

    #[test]
    fn never_token_is_never_cancelled() {
        assert!(!CancelToken::never().is_cancelled());
    }

    #[test]
    fn page_errors_surface_through_assembly_errors() {
        let err: AssemblyError = PageDecodeError::page(2, "bad xref").into();
        assert_eq!(err.to_string(), "page 2: bad xref");
    }
}
