//! Merge scheduling across the frame's concurrency domains.
//!
//! One [`PagingCoordinator`] serves one scene. Loader threads admit finished
//! regions through its [`PagingHandle`]; the update pass drains what is ready
//! and splices it into the graph at the one point where mutation is safe.
//!
//! # Flow
//!
//! ```text
//! loader threads                 queue lock                  update pass
//! ──────────────                 ──────────                  ───────────
//! on_load_complete ─► admit ─┬─► compile_queue ─► promote ─► merge_queue
//!                            │    (FIFO, jobs)    in order       │
//!        no compiler or      │                                   │ drain all
//!        empty payload       └─► merge_queue ◄───────────────────┘
//!                                                     splice each region,
//!                                                     outside the lock
//! ```
//!
//! Both queues live under a single mutex together with the compiler-presence
//! flag, so the admission decision and the resolved presence can never
//! disagree. Promotion stops at the first unfinished job: an operation
//! admitted earlier is always spliced no later than one admitted after it,
//! whatever order the GPU finishes them in.
//!
//! # Usage
//!
//! ```ignore
//! let coordinator = Arc::new(PagingCoordinator::new());
//! let region = PagedRegion::new(coordinator.handle(), || load_tile());
//! coordinator.add_child(Arc::clone(&region) as Arc<dyn SceneNode>);
//!
//! // Per frame:
//! let compiler: Arc<dyn ResourceCompiler> = Arc::new(my_compiler);
//! coordinator.traverse(&mut Traversal::cull().with(compiler));
//! coordinator.traverse(&mut Traversal::update());
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock, Weak};

use smallvec::SmallVec;
use web_time::Instant;

use crate::compile::{CompileJob, ResourceCompiler};
use crate::region::PagedRegion;
use crate::scene::SceneNode;
use crate::traversal::{Traversal, TraversalKind};

/// Paging pipeline tuning.
#[derive(Debug, Clone, Copy)]
pub struct PagingConfig {
  /// Queue-depth threshold that increments `soft_cap_hits` (and warns when
  /// the `tracing` feature is on). `0` disables the check; admissions are
  /// never refused either way.
  pub soft_queue_cap: usize,
}

impl PagingConfig {
  /// Count admissions once queues back up past 1024 operations.
  pub const DEFAULT: Self = Self {
    soft_queue_cap: 1024,
  };

  /// No queue-depth accounting.
  pub const UNLIMITED: Self = Self { soft_queue_cap: 0 };
}

impl Default for PagingConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// Cumulative pipeline counters plus current queue depths.
#[derive(Debug, Clone, Copy, Default)]
pub struct PagingStats {
  /// Completed loads admitted for merging.
  pub admitted: u64,
  /// Splices that attached content to a live region.
  pub merged: u64,
  /// Compile jobs promoted to the merge queue.
  pub promoted: u64,
  /// Compile jobs dropped because the compiler gave up on them.
  pub abandoned: u64,
  /// Queued splices dropped because the region was already gone.
  pub discarded: u64,
  /// Admissions that found the queues over the soft cap.
  pub soft_cap_hits: u64,
  /// Operations currently waiting on a compile job.
  pub pending_compile: usize,
  /// Operations currently waiting for the next update pass.
  pub pending_merge: usize,
  /// Duration of the most recent update-pass drain, in microseconds.
  pub last_update_us: u64,
}

/// GPU-compiler discovery, fixed after the first cull pass.
enum CompilerPresence {
  /// No cull pass seen yet; admissions take the direct path.
  Unknown,
  /// The host supplied a compiler; payloads compile before merging.
  Present(Arc<dyn ResourceCompiler>),
  /// The first cull pass carried no compiler; merges stay direct forever.
  Absent,
}

/// One admitted region on its way to a splice.
struct PagingOp {
  /// The coordinator never keeps a region alive on its own.
  region: Weak<PagedRegion>,
  /// Set while the op sits in the compile queue, dropped at promotion.
  job: Option<Box<dyn CompileJob>>,
}

struct PagingState {
  compile_queue: VecDeque<PagingOp>,
  merge_queue: VecDeque<PagingOp>,
  compiler: CompilerPresence,
  stats: PagingStats,
  config: PagingConfig,
}

struct PagingShared {
  state: Mutex<PagingState>,
}

/// Admission handle shared by every region a coordinator serves.
///
/// Cheap to clone and safe to call from any number of loader threads at
/// once.
#[derive(Clone)]
pub struct PagingHandle {
  shared: Arc<PagingShared>,
}

impl PagingHandle {
  /// Admit a region whose load has completed.
  ///
  /// With a resolved compiler and a payload to prepare, the payload is
  /// submitted and the operation queues behind every earlier compile.
  /// Otherwise (no compiler yet, none at all, or an empty payload) the
  /// operation goes straight onto the merge queue.
  pub fn merge(&self, region: &Arc<PagedRegion>) {
    // Peek the payload before taking the queue lock; the region's own lock
    // and the queue lock never nest.
    let content = region.pending_content();

    let direct = {
      let mut state = self.shared.state.lock().unwrap();
      state.stats.admitted += 1;

      let cap = state.config.soft_queue_cap;
      if cap != 0 && state.compile_queue.len() + state.merge_queue.len() >= cap {
        state.stats.soft_cap_hits += 1;
        #[cfg(feature = "tracing")]
        tracing::warn!(
          cap,
          queued = state.compile_queue.len() + state.merge_queue.len(),
          "paging queues over soft cap"
        );
      }

      let compiler = match &state.compiler {
        CompilerPresence::Present(compiler) => Some(Arc::clone(compiler)),
        _ => None,
      };

      match (compiler, content) {
        (Some(compiler), Some(content)) => {
          let job = compiler.submit(&content);
          state.compile_queue.push_back(PagingOp {
            region: Arc::downgrade(region),
            job: Some(job),
          });
          false
        }
        _ => {
          state.merge_queue.push_back(PagingOp {
            region: Arc::downgrade(region),
            job: None,
          });
          true
        }
      }
    };

    // Direct admissions skip the compile wait, so the region is already in
    // its pre-splice state. Compiled admissions stay Loading until their
    // job finishes.
    if direct {
      region.mark_awaiting_merge();
    }
  }
}

/// Scene-graph decorator that runs the paging queues.
///
/// Place it above the paged portion of the graph: it does its queue work on
/// cull and update passes, then forwards every pass to its children like a
/// plain group. The compiler is discovered on the first cull pass and fixed
/// permanently, so a host that never exposes one in cull context pins the
/// coordinator to the direct merge path.
pub struct PagingCoordinator {
  shared: Arc<PagingShared>,
  children: RwLock<Vec<Arc<dyn SceneNode>>>,
}

impl PagingCoordinator {
  /// Create a coordinator with [`PagingConfig::DEFAULT`].
  pub fn new() -> Self {
    Self::with_config(PagingConfig::DEFAULT)
  }

  /// Create a coordinator with explicit tuning.
  pub fn with_config(config: PagingConfig) -> Self {
    Self {
      shared: Arc::new(PagingShared {
        state: Mutex::new(PagingState {
          compile_queue: VecDeque::new(),
          merge_queue: VecDeque::new(),
          compiler: CompilerPresence::Unknown,
          stats: PagingStats::default(),
          config,
        }),
      }),
      children: RwLock::new(Vec::new()),
    }
  }

  /// Admission handle to hand to regions and loaders.
  pub fn handle(&self) -> PagingHandle {
    PagingHandle {
      shared: Arc::clone(&self.shared),
    }
  }

  /// Admit a region directly; same as going through [`Self::handle`].
  pub fn merge(&self, region: &Arc<PagedRegion>) {
    self.handle().merge(region);
  }

  /// Snapshot of counters and queue depths.
  pub fn stats(&self) -> PagingStats {
    let state = self.shared.state.lock().unwrap();
    let mut stats = state.stats;
    stats.pending_compile = state.compile_queue.len();
    stats.pending_merge = state.merge_queue.len();
    stats
  }

  /// True when no operation is queued.
  pub fn is_idle(&self) -> bool {
    let state = self.shared.state.lock().unwrap();
    state.compile_queue.is_empty() && state.merge_queue.is_empty()
  }

  /// Replace the tuning at runtime.
  pub fn set_config(&self, config: PagingConfig) {
    self.shared.state.lock().unwrap().config = config;
  }

  /// Append a child.
  pub fn add_child(&self, child: Arc<dyn SceneNode>) {
    self.children.write().unwrap().push(child);
  }

  /// Remove a child by identity. Returns `true` if it was present.
  pub fn remove_child(&self, child: &Arc<dyn SceneNode>) -> bool {
    let mut children = self.children.write().unwrap();
    let before = children.len();
    children.retain(|existing| !Arc::ptr_eq(existing, child));
    children.len() != before
  }

  /// Number of children.
  pub fn child_count(&self) -> usize {
    self.children.read().unwrap().len()
  }

  /// Snapshot of the current children.
  pub fn children(&self) -> Vec<Arc<dyn SceneNode>> {
    self.children.read().unwrap().clone()
  }

  /// One-shot compiler discovery, run on cull passes until it sticks.
  fn resolve_compiler(&self, traversal: &Traversal) {
    let mut state = self.shared.state.lock().unwrap();
    if !matches!(state.compiler, CompilerPresence::Unknown) {
      return;
    }
    state.compiler = match traversal.context.get::<Arc<dyn ResourceCompiler>>() {
      Some(compiler) => CompilerPresence::Present(Arc::clone(compiler)),
      None => CompilerPresence::Absent,
    };
  }

  /// Update-pass drain: promote finished compiles, then splice everything
  /// on the merge queue.
  #[cfg_attr(
    feature = "tracing",
    tracing::instrument(skip_all, name = "paging::drain_merges")
  )]
  fn drain_merges(&self) {
    let start = Instant::now();

    let mut batch: SmallVec<[PagingOp; 8]> = SmallVec::new();
    let mut promoted = 0u64;
    let mut abandoned = 0u64;

    {
      let mut state = self.shared.state.lock().unwrap();

      // Walk finished compile jobs from the front. The first job still
      // pending ends the walk: later arrivals must not overtake it.
      loop {
        let (job_available, job_abandoned) = match state.compile_queue.front() {
          Some(op) => match &op.job {
            Some(job) => (job.is_available(), job.is_abandoned()),
            None => (true, false),
          },
          None => break,
        };

        if job_available {
          if let Some(mut op) = state.compile_queue.pop_front() {
            op.job = None;
            state.merge_queue.push_back(op);
            promoted += 1;
          }
        } else if job_abandoned {
          // Drop the op, job handle and all; the region stays Loading.
          state.compile_queue.pop_front();
          abandoned += 1;
        } else {
          break;
        }
      }

      batch.extend(state.merge_queue.drain(..));
      state.stats.promoted += promoted;
      state.stats.abandoned += abandoned;
    }

    // Splices run outside the queue lock so loader threads keep admitting
    // while the scene graph mutates.
    let mut merged = 0u64;
    let mut discarded = 0u64;
    for op in batch {
      match op.region.upgrade() {
        Some(region) => {
          if region.merge() {
            merged += 1;
          }
        }
        None => discarded += 1,
      }
    }

    let elapsed_us = start.elapsed().as_micros() as u64;
    let mut state = self.shared.state.lock().unwrap();
    state.stats.merged += merged;
    state.stats.discarded += discarded;
    state.stats.last_update_us = elapsed_us;
  }
}

impl Default for PagingCoordinator {
  fn default() -> Self {
    Self::new()
  }
}

impl SceneNode for PagingCoordinator {
  fn traverse(&self, traversal: &mut Traversal) {
    match traversal.kind {
      TraversalKind::Cull => self.resolve_compiler(traversal),
      TraversalKind::Update => self.drain_merges(),
      TraversalKind::Event => {}
    }

    // Decorator: children see every pass, whatever its kind.
    let children = self.children();
    for child in &children {
      child.traverse(traversal);
    }
  }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod coordinator_test;
