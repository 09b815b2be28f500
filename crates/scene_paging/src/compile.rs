//! GPU resource preparation.
//!
//! The render host may own a compiler bound to the GPU context (upload
//! queues, incremental compile slots). The paging layer only ever talks to it
//! through two non-blocking seams: [`ResourceCompiler::submit`] hands a
//! payload over, and the returned [`CompileJob`] answers "done yet?" from the
//! update pass.
//!
//! [`queued_compiler`] is the bundled implementation for hosts that service
//! uploads from their own GPU-context thread:
//!
//! ```text
//! loader thread                GPU-context thread          update pass
//! ─────────────                ──────────────────          ───────────
//! submit(payload) ──channel──► service(budget, |p| ...)
//!   returns job                  resolve: flip job state
//!                                                          job.is_available()
//!                                                          → promote & merge
//! ```
//!
//! Every submitted job reaches exactly one terminal state. Dropping the
//! [`UploadQueue`], or an unserviced [`PendingUpload`], abandons the job
//! rather than leaving it pending forever.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crossbeam_channel::{self as channel, Receiver, Sender};

use crate::scene::SceneNode;

/// Handle to one submitted compile. Both queries are non-blocking and may be
/// polled from any thread; `is_available` and `is_abandoned` never both
/// return `true`.
pub trait CompileJob: Send + Sync {
  /// True once the payload's resources are GPU-resident.
  fn is_available(&self) -> bool;

  /// True once the compiler has given up on this payload.
  fn is_abandoned(&self) -> bool;
}

/// GPU-context resource compiler owned by the render host.
pub trait ResourceCompiler: Send + Sync {
  /// Register `payload` for preparation and return its job handle.
  /// Must not block; called under the paging queue lock.
  fn submit(&self, payload: &Arc<dyn SceneNode>) -> Box<dyn CompileJob>;
}

// =============================================================================
// Queued reference implementation
// =============================================================================

// Job lifecycle states, stored in an AtomicU8 shared between the job handle
// and the pending upload.
const PENDING: u8 = 0;
const AVAILABLE: u8 = 1;
const ABANDONED: u8 = 2;

/// Shared job state. Only the first terminal transition sticks.
struct JobState {
  state: AtomicU8,
}

impl JobState {
  fn new() -> Self {
    Self {
      state: AtomicU8::new(PENDING),
    }
  }

  fn mark_available(&self) {
    let _ = self
      .state
      .compare_exchange(PENDING, AVAILABLE, Ordering::AcqRel, Ordering::Acquire);
  }

  fn mark_abandoned(&self) {
    let _ = self
      .state
      .compare_exchange(PENDING, ABANDONED, Ordering::AcqRel, Ordering::Acquire);
  }

  fn load(&self) -> u8 {
    self.state.load(Ordering::Acquire)
  }
}

struct QueuedJob {
  state: Arc<JobState>,
}

impl CompileJob for QueuedJob {
  fn is_available(&self) -> bool {
    self.state.load() == AVAILABLE
  }

  fn is_abandoned(&self) -> bool {
    self.state.load() == ABANDONED
  }
}

/// Verdict returned by the service handler for one upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
  /// Resources are GPU-resident; the job becomes available.
  Uploaded,
  /// The host declined this payload; the job becomes abandoned.
  Abandoned,
}

/// One payload waiting for GPU service.
///
/// Dropping an upload without resolving it abandons the job, so handler
/// panics and queue teardown cannot strand a region.
pub struct PendingUpload {
  payload: Arc<dyn SceneNode>,
  state: Arc<JobState>,
}

impl PendingUpload {
  /// The payload to make GPU-resident.
  pub fn payload(&self) -> &Arc<dyn SceneNode> {
    &self.payload
  }

  /// Report the upload's outcome, flipping the job to its terminal state.
  pub fn resolve(self, outcome: UploadOutcome) {
    match outcome {
      UploadOutcome::Uploaded => self.state.mark_available(),
      UploadOutcome::Abandoned => self.state.mark_abandoned(),
    }
  }
}

impl Drop for PendingUpload {
  fn drop(&mut self) {
    self.state.mark_abandoned();
  }
}

/// Submission half of the queued compiler. Cheap to clone.
#[derive(Clone)]
pub struct QueuedCompiler {
  sender: Sender<PendingUpload>,
}

impl ResourceCompiler for QueuedCompiler {
  fn submit(&self, payload: &Arc<dyn SceneNode>) -> Box<dyn CompileJob> {
    let state = Arc::new(JobState::new());
    let upload = PendingUpload {
      payload: Arc::clone(payload),
      state: Arc::clone(&state),
    };

    // If the service side is gone the upload drops here, which abandons the
    // job immediately instead of leaving it pending forever.
    let _ = self.sender.send(upload);

    Box::new(QueuedJob { state })
  }
}

/// Service half of the queued compiler; drain it from the GPU-context thread.
pub struct UploadQueue {
  receiver: Receiver<PendingUpload>,
}

impl UploadQueue {
  /// Pop the next pending upload, if any (non-blocking).
  pub fn try_next(&self) -> Option<PendingUpload> {
    self.receiver.try_recv().ok()
  }

  /// Drain up to `max_uploads` pending uploads through `handler`
  /// (`0` = unlimited). Returns the number serviced.
  pub fn service<F>(&self, max_uploads: usize, mut handler: F) -> usize
  where
    F: FnMut(&Arc<dyn SceneNode>) -> UploadOutcome,
  {
    let mut serviced = 0;
    while max_uploads == 0 || serviced < max_uploads {
      match self.try_next() {
        Some(upload) => {
          let outcome = handler(upload.payload());
          upload.resolve(outcome);
          serviced += 1;
        }
        None => break,
      }
    }
    serviced
  }

  /// Number of uploads waiting for service.
  pub fn pending(&self) -> usize {
    self.receiver.len()
  }
}

/// Create a connected compiler/queue pair over an unbounded channel.
pub fn queued_compiler() -> (QueuedCompiler, UploadQueue) {
  let (sender, receiver) = channel::unbounded();
  (QueuedCompiler { sender }, UploadQueue { receiver })
}

// =============================================================================
// Tests
// =============================================================================
