//! Scene-graph seam: the node trait and a minimal group container.
//!
//! The paging pipeline never interprets content. Everything it loads, compiles
//! and splices is an opaque `Arc<dyn SceneNode>`; the only structural
//! assumption is that nodes forward traversals to whatever they contain.

use std::sync::{Arc, RwLock};

use crate::traversal::Traversal;

/// A node in the scene graph.
///
/// Implementations must be shareable across threads: loads complete on worker
/// threads and uploads run on the GPU-context thread, both holding references
/// to the same payload the update pass later splices in.
pub trait SceneNode: Send + Sync {
  /// Handle one pass. Leaves ignore it; containers forward to children.
  fn traverse(&self, traversal: &mut Traversal) {
    let _ = traversal;
  }
}

/// Minimal container node with interior-mutable children.
#[derive(Default)]
pub struct Group {
  children: RwLock<Vec<Arc<dyn SceneNode>>>,
}

impl Group {
  /// Create an empty group.
  pub fn new() -> Self {
    Self::default()
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
}

impl SceneNode for Group {
  fn traverse(&self, traversal: &mut Traversal) {
    // Snapshot first so children may mutate this group mid-pass.
    let children = self.children();
    for child in &children {
      child.traverse(traversal);
    }
  }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  struct CountingLeaf {
    visits: AtomicUsize,
  }

  impl CountingLeaf {
    fn new() -> Arc<Self> {
      Arc::new(Self {
        visits: AtomicUsize::new(0),
      })
    }

    fn visits(&self) -> usize {
      self.visits.load(Ordering::SeqCst)
    }
  }

  impl SceneNode for CountingLeaf {
    fn traverse(&self, _traversal: &mut Traversal) {
      self.visits.fetch_add(1, Ordering::SeqCst);
    }
  }

  #[test]
  fn test_add_and_count() {
    let group = Group::new();
    assert_eq!(group.child_count(), 0);

    group.add_child(CountingLeaf::new());
    group.add_child(CountingLeaf::new());
    assert_eq!(group.child_count(), 2);
  }

  #[test]
  fn test_remove_by_identity() {
    let group = Group::new();
    let kept = CountingLeaf::new();
    let removed = CountingLeaf::new();

    let kept_node: Arc<dyn SceneNode> = kept;
    let removed_node: Arc<dyn SceneNode> = removed;
    group.add_child(Arc::clone(&kept_node));
    group.add_child(Arc::clone(&removed_node));

    assert!(group.remove_child(&removed_node));
    assert!(!group.remove_child(&removed_node));
    assert_eq!(group.child_count(), 1);
  }

  #[test]
  fn test_traverse_visits_nested_children() {
    let leaf = CountingLeaf::new();
    let inner = Group::new();
    inner.add_child(Arc::clone(&leaf) as Arc<dyn SceneNode>);

    let outer = Group::new();
    outer.add_child(Arc::new(inner));

    outer.traverse(&mut Traversal::update());
    outer.traverse(&mut Traversal::cull());

    assert_eq!(leaf.visits(), 2);
  }

  #[test]
  fn test_default_traverse_is_noop() {
    struct Leaf;
    impl SceneNode for Leaf {}

    let leaf = Leaf;
    leaf.traverse(&mut Traversal::event());
  }
}
