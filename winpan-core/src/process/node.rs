use std::cell::Cell;
use std::fmt;
use std::ptr;

use super::Pid;

type Link<'a> = Cell<Option<&'a AncestryNode<'a>>>;

/// One process in a per-query ancestry forest.
///
/// Children form an intrusive singly-linked list; new children are prepended.
pub struct AncestryNode<'a> {
    pid: Pid,
    parent: Link<'a>,
    first_child: Link<'a>,
    next_sibling: Link<'a>,
}

impl<'a> AncestryNode<'a> {
    pub(crate) fn new(pid: Pid) -> Self {
        Self {
            pid,
            parent: Cell::new(None),
            first_child: Cell::new(None),
            next_sibling: Cell::new(None),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn parent(&self) -> Option<&'a AncestryNode<'a>> {
        self.parent.get()
    }

    /// Children, most recently linked first.
    pub fn children(&self) -> Children<'a> {
        Children {
            next: self.first_child.get(),
        }
    }

    /// True if `other` is this node or one of its ancestors.
    pub fn descends_from(&self, other: &AncestryNode<'a>) -> bool {
        if ptr::eq(self, other) {
            return true;
        }
        let mut cursor = self.parent.get();
        while let Some(node) = cursor {
            if ptr::eq(node, other) {
                return true;
            }
            cursor = node.parent.get();
        }
        false
    }

    /// Moves `self` under `parent`, detaching it from any previous parent.
    ///
    /// Returns `false` without linking if that would create a cycle.
    pub(crate) fn attach_to(&'a self, parent: &'a AncestryNode<'a>) -> bool {
        if parent.descends_from(self) {
            return false;
        }
        if let Some(previous) = self.parent.get() {
            previous.detach_child(self);
        }
        self.next_sibling.set(parent.first_child.get());
        parent.first_child.set(Some(self));
        self.parent.set(Some(parent));
        true
    }

    fn detach_child(&self, child: &'a AncestryNode<'a>) {
        let mut link = &self.first_child;
        while let Some(node) = link.get() {
            if ptr::eq(node, child) {
                link.set(child.next_sibling.get());
                child.next_sibling.set(None);
                child.parent.set(None);
                return;
            }
            link = &node.next_sibling;
        }
    }
}

impl fmt::Debug for AncestryNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AncestryNode")
            .field("pid", &self.pid)
            .field("parent", &self.parent.get().map(|p| p.pid))
            .field(
                "children",
                &self.children().map(|c| c.pid).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Iterator over a node's child list.
#[derive(Clone)]
pub struct Children<'a> {
    next: Option<&'a AncestryNode<'a>>,
}

impl<'a> Iterator for Children<'a> {
    type Item = &'a AncestryNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.next_sibling.get();
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::Arena;

    fn pids<'a>(children: Children<'a>) -> Vec<Pid> {
        children.map(AncestryNode::pid).collect()
    }

    #[test]
    fn test_children_are_prepended() {
        let arena = Arena::with_capacity(1024);
        let parent: &AncestryNode = arena.alloc(AncestryNode::new(1)).unwrap();
        let a: &AncestryNode = arena.alloc(AncestryNode::new(2)).unwrap();
        let b: &AncestryNode = arena.alloc(AncestryNode::new(3)).unwrap();

        assert!(a.attach_to(parent));
        assert!(b.attach_to(parent));
        assert_eq!(pids(parent.children()), vec![3, 2]);
        assert_eq!(a.parent().unwrap().pid(), 1);
    }

    #[test]
    fn test_reattach_moves_node() {
        let arena = Arena::with_capacity(1024);
        let old: &AncestryNode = arena.alloc(AncestryNode::new(1)).unwrap();
        let new: &AncestryNode = arena.alloc(AncestryNode::new(2)).unwrap();
        let a: &AncestryNode = arena.alloc(AncestryNode::new(3)).unwrap();
        let b: &AncestryNode = arena.alloc(AncestryNode::new(4)).unwrap();

        a.attach_to(old);
        b.attach_to(old);
        a.attach_to(new);

        assert_eq!(pids(old.children()), vec![4]);
        assert_eq!(pids(new.children()), vec![3]);
        assert_eq!(a.parent().unwrap().pid(), 2);
    }

    #[test]
    fn test_cycle_is_refused() {
        let arena = Arena::with_capacity(1024);
        let a: &AncestryNode = arena.alloc(AncestryNode::new(1)).unwrap();
        let b: &AncestryNode = arena.alloc(AncestryNode::new(2)).unwrap();

        assert!(b.attach_to(a));
        assert!(!a.attach_to(b));
        assert!(!a.attach_to(a));
        assert!(a.parent().is_none());
        assert!(b.descends_from(a));
        assert!(!a.descends_from(b));
    }
}
