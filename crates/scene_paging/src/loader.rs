//! Background payload production.
//!
//! Loads are fire-and-forget closures handed to a [`LoadScheduler`]. The
//! scheduler only promises to run the closure exactly once, on some thread;
//! completion is reported back through `PagedRegion::on_load_complete`, which
//! is safe to call from any thread.
//!
//! # Usage
//!
//! ```ignore
//! let loader = BackgroundLoader::new();
//! region.request_load(&loader);
//!
//! // Per frame, at the safe mutation point:
//! root.traverse(&mut Traversal::update());
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::scene::SceneNode;

/// Outcome of one completed load.
///
/// An empty result is a first-class value: it models a load that was
/// canceled or legitimately produced nothing, and flows through admission
/// and merge as a no-op.
pub struct LoadResult {
	content: Option<Arc<dyn SceneNode>>,
}

impl LoadResult {
	/// A result carrying content to splice in.
	pub fn new(content: Arc<dyn SceneNode>) -> Self {
		Self {
			content: Some(content),
		}
	}

	/// A result carrying nothing.
	pub fn empty() -> Self {
		Self { content: None }
	}

	/// True when the load produced no content.
	pub fn is_empty(&self) -> bool {
		self.content.is_none()
	}

	/// Borrow the content, if any.
	pub fn content(&self) -> Option<&Arc<dyn SceneNode>> {
		self.content.as_ref()
	}

	pub(crate) fn into_content(self) -> Option<Arc<dyn SceneNode>> {
		self.content
	}
}

/// Schedules load work off the render thread.
pub trait LoadScheduler: Send + Sync {
	/// Run `work` exactly once, on any thread, without blocking the caller.
	fn spawn_load(&self, work: Box<dyn FnOnce() + Send + 'static>);
}

/// Rayon-backed scheduler.
///
/// Clones share one in-flight gauge, so a loader can be handed to many
/// regions and still report a single queue depth.
pub struct BackgroundLoader {
	in_flight: Arc<AtomicUsize>,
}

impl BackgroundLoader {
	/// Create a scheduler on rayon's global pool.
	pub fn new() -> Self {
		Self {
			in_flight: Arc::new(AtomicUsize::new(0)),
		}
	}

	/// Number of loads spawned but not yet finished.
	pub fn in_flight(&self) -> usize {
		self.in_flight.load(Ordering::SeqCst)
	}
}

impl Default for BackgroundLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl Clone for BackgroundLoader {
	fn clone(&self) -> Self {
		Self {
			in_flight: Arc::clone(&self.in_flight),
		}
	}
}

impl LoadScheduler for BackgroundLoader {
	fn spawn_load(&self, work: Box<dyn FnOnce() + Send + 'static>) {
		self.in_flight.fetch_add(1, Ordering::SeqCst);
		let in_flight = Arc::clone(&self.in_flight);

		rayon::spawn(move || {
			work();
			in_flight.fetch_sub(1, Ordering::SeqCst);
		});
	}
}

/// Runs load work on the calling thread.
///
/// For tests and single-threaded hosts; completion happens before
/// `spawn_load` returns.
pub struct InlineLoader;

impl LoadScheduler for InlineLoader {
	fn spawn_load(&self, work: Box<dyn FnOnce() + Send + 'static>) {
		work();
	}
}

// =============================================================================
// Tests
// =============================================================================
