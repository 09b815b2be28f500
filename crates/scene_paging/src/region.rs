//! Lazily loaded scene subtree.
//!
//! A [`PagedRegion`] stands in the scene graph where content will appear
//! once it has been produced and, optionally, made GPU-resident. Until the
//! update pass splices that content in, traversals pass over the region
//! without descending.
//!
//! # Lifecycle
//!
//! ```text
//!            request_load          on_load_complete       update pass
//! Unloaded ───────────────► Loading ──────────────► ... ────────────► Merged
//!     ▲                        │    (admission, and the merge
//!     │        unload          │     queue wait in between)
//!     └────────────────────────┴──────────────── any state
//! ```
//!
//! `AwaitingMerge` is the window between admission to the direct merge queue
//! and the splice. Content routed through a compiler stays `Loading` while
//! its job is pending; an abandoned job therefore leaves the region in
//! `Loading`, and re-requesting is the caller's policy.

use std::sync::{Arc, Mutex, RwLock};

use crate::coordinator::PagingHandle;
use crate::loader::{LoadResult, LoadScheduler};
use crate::scene::SceneNode;
use crate::traversal::Traversal;

/// Where a region is in its load-and-splice lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeState {
	/// No content and no outstanding request.
	Unloaded,
	/// A load (or compile) is outstanding.
	Loading,
	/// Admitted to the merge queue; splice happens next update pass.
	AwaitingMerge,
	/// Content is part of the scene graph.
	Merged,
}

struct RegionState {
	merge_state: MergeState,
	/// Completed load waiting for the update pass. Set while a request is
	/// outstanding, cleared exactly once by the merge.
	pending: Option<LoadResult>,
}

/// A scene node whose content is produced asynchronously and spliced in
/// during the update pass.
///
/// Regions are shared as `Arc<PagedRegion>`; the paging coordinator only
/// keeps weak references, so dropping the last owning handle silently
/// cancels any queued splice.
pub struct PagedRegion {
	paging: PagingHandle,
	load: Box<dyn Fn() -> LoadResult + Send + Sync>,
	state: Mutex<RegionState>,
	children: RwLock<Vec<Arc<dyn SceneNode>>>,
}

impl PagedRegion {
	/// Create a region whose content comes from `load`.
	///
	/// `load` runs on whatever thread the [`LoadScheduler`] provides; it may
	/// be invoked again after an [`unload`](Self::unload) + re-request.
	pub fn new<F>(paging: PagingHandle, load: F) -> Arc<Self>
	where
		F: Fn() -> LoadResult + Send + Sync + 'static,
	{
		Arc::new(Self {
			paging,
			load: Box::new(load),
			state: Mutex::new(RegionState {
				merge_state: MergeState::Unloaded,
				pending: None,
			}),
			children: RwLock::new(Vec::new()),
		})
	}

	/// Current lifecycle state.
	pub fn merge_state(&self) -> MergeState {
		self.state.lock().unwrap().merge_state
	}

	/// True once content has been spliced in.
	pub fn is_merged(&self) -> bool {
		self.merge_state() == MergeState::Merged
	}

	/// Number of spliced-in children.
	pub fn child_count(&self) -> usize {
		self.children.read().unwrap().len()
	}

	/// Schedule this region's load.
	///
	/// Returns `true` if the load was scheduled, `false` when a request is
	/// already outstanding or content is already merged.
	pub fn request_load(self: &Arc<Self>, scheduler: &dyn LoadScheduler) -> bool {
		{
			let mut state = self.state.lock().unwrap();
			if state.merge_state != MergeState::Unloaded {
				return false;
			}
			state.merge_state = MergeState::Loading;
		}

		let region = Arc::downgrade(self);
		scheduler.spawn_load(Box::new(move || {
			// A region dropped while queued just skips its load.
			if let Some(region) = region.upgrade() {
				let result = (region.load)();
				region.on_load_complete(result);
			}
		}));

		true
	}

	/// Deliver a completed load. Callable from any thread.
	///
	/// Accepted only while a request is outstanding; late or replayed
	/// completions (after a merge, an unload, or a prior admission) are
	/// dropped.
	pub fn on_load_complete(self: &Arc<Self>, result: LoadResult) {
		{
			let mut state = self.state.lock().unwrap();
			if state.merge_state != MergeState::Loading {
				return;
			}
			state.pending = Some(result);
		}
		// Admission takes the paging queue lock; the region lock above is
		// released first so the two never nest.
		self.paging.merge(self);
	}

	/// Drop any content and return to `Unloaded` so a load may be
	/// re-requested. A splice already queued for this region resolves as a
	/// no-op.
	pub fn unload(&self) {
		let mut state = self.state.lock().unwrap();
		state.merge_state = MergeState::Unloaded;
		state.pending = None;
		self.children.write().unwrap().clear();
	}

	/// Peek at the pending payload, if any. Used at admission to decide
	/// whether there is anything to compile.
	pub(crate) fn pending_content(&self) -> Option<Arc<dyn SceneNode>> {
		let state = self.state.lock().unwrap();
		state
			.pending
			.as_ref()
			.and_then(|result| result.content().cloned())
	}

	pub(crate) fn mark_awaiting_merge(&self) {
		let mut state = self.state.lock().unwrap();
		if state.merge_state == MergeState::Loading {
			state.merge_state = MergeState::AwaitingMerge;
		}
	}

	/// Splice the pending content in. Runs during the update pass, outside
	/// the paging queue lock. Returns `true` when content was attached.
	pub(crate) fn merge(&self) -> bool {
		let mut state = self.state.lock().unwrap();
		let pending = match state.pending.take() {
			Some(result) => result,
			None => return false,
		};

		match pending.into_content() {
			Some(content) => {
				self.children.write().unwrap().push(content);
				state.merge_state = MergeState::Merged;
				true
			}
			// Empty result: consumed as a no-op, the region stays unmerged.
			None => false,
		}
	}
}

impl SceneNode for PagedRegion {
	fn traverse(&self, traversal: &mut Traversal) {
		// Not-yet-merged content is invisible to every pass.
		if !self.is_merged() {
			return;
		}
		let children = self.children.read().unwrap().clone();
		for child in &children {
			child.traverse(traversal);
		}
	}
}

// =============================================================================
// Tests
// =============================================================================
