//! Depth-first descendant collection.

use super::node::AncestryNode;
use super::Pid;

/// Writes `root` and every node reachable from it into `out`, pre-order,
/// visiting children most-recently-linked first. Returns the number written.
///
/// # Panics
/// If `out` cannot hold every reachable node. Size it from the number of
/// nodes in the index the tree was built with.
pub fn collect_into(root: &AncestryNode<'_>, out: &mut [Pid]) -> usize {
    let mut count = 0;
    let mut push = |pid: Pid| {
        assert!(
            count < out.len(),
            "descendant buffer too small ({} slots)",
            out.len()
        );
        out[count] = pid;
        count += 1;
    };

    // One sibling cursor per open level, so depth costs heap rather than stack.
    push(root.pid());
    let mut pending = vec![root.children()];
    while let Some(siblings) = pending.last_mut() {
        match siblings.next() {
            Some(child) => {
                push(child.pid());
                pending.push(child.children());
            }
            None => {
                pending.pop();
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::Arena;
    use crate::process::ProcessTree;

    #[test]
    fn test_leaf_yields_only_itself() {
        let arena = Arena::with_capacity(64 * 1024);
        let tree = ProcessTree::from_pairs(&arena, 8, [(5, 1)]).unwrap();
        let node = tree.node(5).unwrap();

        let mut out = [0; 4];
        assert_eq!(collect_into(node, &mut out), 1);
        assert_eq!(out[0], 5);
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        const DEPTH: Pid = 100_000;
        let arena = Arena::with_capacity(8 * 1024 * 1024);
        // Deepest link first keeps each cycle check O(1).
        let pairs = (1..=DEPTH).rev().map(|pid| (pid, pid - 1));
        let tree = ProcessTree::from_pairs(&arena, 18, pairs).unwrap();

        let collected = tree.descendants(0).unwrap();
        assert_eq!(collected.len(), DEPTH as usize + 1);
        assert!(collected.iter().copied().eq(0..=DEPTH));
    }

    #[test]
    #[should_panic(expected = "descendant buffer too small")]
    fn test_undersized_buffer_is_fatal() {
        let arena = Arena::with_capacity(64 * 1024);
        let tree = ProcessTree::from_pairs(&arena, 8, [(2, 1), (3, 1), (4, 1)]).unwrap();
        let root = tree.node(1).unwrap();

        let mut out = [0; 2];
        collect_into(root, &mut out);
    }
}
