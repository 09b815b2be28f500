//! scene_paging - Asynchronous scene paging with deferred GPU uploads
//!
//! This crate coordinates three concurrency domains a real-time renderer has
//! to keep apart: background threads producing scene content, an optional
//! GPU-context compiler making that content resident, and the one update
//! pass per frame where mutating the scene graph is safe.
//!
//! # Features
//!
//! - **Paged regions**: scene nodes whose subtree loads lazily and stays
//!   invisible to traversals until spliced in
//! - **Ordered merging**: splices happen in admission order, never in GPU
//!   completion order, with the whole schedule under a single lock
//! - **Deferred compilation**: payloads pass through a host-owned compiler
//!   first when one is discovered, and merge directly when none is
//! - **No blocking anywhere**: loaders admit, the GPU services, and the
//!   update pass drains, all without waiting on each other
//!
//! # Example
//!
//! ```ignore
//! use scene_paging::{PagedRegion, PagingCoordinator, Traversal};
//!
//! let coordinator = Arc::new(PagingCoordinator::new());
//! let loader = BackgroundLoader::new();
//!
//! let region = PagedRegion::new(coordinator.handle(), || load_tile());
//! coordinator.add_child(Arc::clone(&region) as Arc<dyn SceneNode>);
//! region.request_load(&loader);
//!
//! // Per frame:
//! coordinator.traverse(&mut Traversal::cull());
//! coordinator.traverse(&mut Traversal::update());
//! ```

pub mod scene;
pub use scene::{Group, SceneNode};

// Traversal classification and the host-service context
pub mod traversal;
pub use traversal::{Traversal, TraversalContext, TraversalKind};

// Background payload production
pub mod loader;
pub use loader::{BackgroundLoader, InlineLoader, LoadResult, LoadScheduler};

// GPU resource preparation seams and the queued reference compiler
pub mod compile;
pub use compile::{
  queued_compiler, CompileJob, PendingUpload, QueuedCompiler, ResourceCompiler, UploadOutcome,
  UploadQueue,
};

// Lazily loaded regions
pub mod region;
pub use region::{MergeState, PagedRegion};

// Merge scheduling across the frame
pub mod coordinator;
pub use coordinator::{PagingConfig, PagingCoordinator, PagingHandle, PagingStats};
