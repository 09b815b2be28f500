//! Traversal classification and context.
//!
//! A [`Traversal`] is the per-pass token handed down the scene graph. Nodes
//! dispatch on its [`TraversalKind`] (cull, update, or anything else) and can
//! read host services out of its [`TraversalContext`], a type-keyed map the
//! host seeds before starting the pass.
//!
//! # Usage
//!
//! ```ignore
//! // Host side: expose the GPU compiler to the cull pass.
//! let compiler: Arc<dyn ResourceCompiler> = Arc::new(my_compiler);
//! let mut cull = Traversal::cull().with(compiler);
//! root.traverse(&mut cull);
//!
//! // Once per frame, at the safe mutation point:
//! root.traverse(&mut Traversal::update());
//! ```
//!
//! Context values are keyed by their concrete type. Store trait objects under
//! an annotated `Arc<dyn Trait>` binding so readers and writers agree on the
//! key.

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Classification of a scene-graph pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TraversalKind {
  /// Visibility pass. May run concurrently with rendering, never mutates.
  Cull,
  /// The one pass per frame where scene-graph mutation is safe.
  Update,
  /// Any other pass (events, intersection, etc.); forwarded unchanged.
  Event,
}

/// Type-keyed bag of host services visible to nodes during a pass.
#[derive(Default)]
pub struct TraversalContext {
  values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl TraversalContext {
  /// Create an empty context.
  pub fn new() -> Self {
    Self::default()
  }

  /// Store a value, replacing any previous value of the same type.
  pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
    self.values.insert(TypeId::of::<T>(), Box::new(value));
  }

  /// Borrow the stored value of type `T`, if any.
  pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
    self
      .values
      .get(&TypeId::of::<T>())
      .and_then(|boxed| boxed.downcast_ref::<T>())
  }

  /// Remove and return the stored value of type `T`, if any.
  pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
    self
      .values
      .remove(&TypeId::of::<T>())
      .and_then(|boxed| boxed.downcast::<T>().ok())
      .map(|boxed| *boxed)
  }

  /// Number of stored values.
  pub fn len(&self) -> usize {
    self.values.len()
  }

  /// True when nothing is stored.
  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

/// One pass over the scene graph: a kind plus host-provided context.
pub struct Traversal {
  /// What this pass is; nodes dispatch on it.
  pub kind: TraversalKind,
  /// Host services visible to nodes during this pass.
  pub context: TraversalContext,
}

impl Traversal {
  /// Create a traversal of the given kind with an empty context.
  pub fn new(kind: TraversalKind) -> Self {
    Self {
      kind,
      context: TraversalContext::new(),
    }
  }

  /// Shorthand for a cull pass.
  pub fn cull() -> Self {
    Self::new(TraversalKind::Cull)
  }

  /// Shorthand for an update pass.
  pub fn update() -> Self {
    Self::new(TraversalKind::Update)
  }

  /// Shorthand for a pass the paging layer ignores.
  pub fn event() -> Self {
    Self::new(TraversalKind::Event)
  }

  /// Seed a context value (builder style).
  pub fn with<T: Send + Sync + 'static>(mut self, value: T) -> Self {
    self.context.insert(value);
    self
  }
}

// =============================================================================
// Tests
// =============================================================================
