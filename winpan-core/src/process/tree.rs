//! Building an ancestry forest from a process-information source.

use std::fmt::Write;

use tracing::{debug, trace};

use super::collect::collect_into;
use super::index::ProcessIndex;
use super::node::AncestryNode;
use super::source::{parse_stat, ProcessSource};
use super::Pid;
use crate::alloc::Arena;
use crate::error::ProcessError;

/// A point-in-time ancestry forest, entirely allocated from one arena.
pub struct ProcessTree<'a> {
    index: ProcessIndex<'a>,
    count: usize,
}

impl<'a> ProcessTree<'a> {
    /// An empty tree with a `2^exponent`-slot index.
    pub fn new(arena: &'a Arena, exponent: u32) -> Result<Self, ProcessError> {
        Ok(Self {
            index: ProcessIndex::with_exponent(arena, exponent)?,
            count: 0,
        })
    }

    /// Scans `source` once and links every readable process under its parent.
    ///
    /// Processes that disappear between listing and reading are skipped.
    pub fn scan<S>(arena: &'a Arena, source: &S, exponent: u32) -> Result<Self, ProcessError>
    where
        S: ProcessSource + ?Sized,
    {
        let mut tree = Self::new(arena, exponent)?;
        for pid in source.pids()? {
            let line = match source.stat_line(pid) {
                Ok(line) => line,
                Err(err) => {
                    trace!(pid, %err, "process exited before its stat was read");
                    continue;
                }
            };
            match parse_stat(&line) {
                Ok(fields) => tree.insert(pid, fields.ppid)?,
                Err(err) => trace!(pid, %err, "skipping unparsable stat line"),
            }
        }
        debug!(
            pairs = tree.count,
            nodes = tree.index.len(),
            arena_used = arena.used(),
            arena_peak = arena.stats().peak_utilisation(arena.capacity()),
            "process tree scanned"
        );
        Ok(tree)
    }

    /// Builds a tree from `(pid, ppid)` pairs in the given order.
    pub fn from_pairs<I>(arena: &'a Arena, exponent: u32, pairs: I) -> Result<Self, ProcessError>
    where
        I: IntoIterator<Item = (Pid, Pid)>,
    {
        let mut tree = Self::new(arena, exponent)?;
        for (pid, ppid) in pairs {
            tree.insert(pid, ppid)?;
        }
        Ok(tree)
    }

    /// Links `pid` under `ppid`, creating either node as needed.
    ///
    /// A pid seen twice ends up under the parent from its latest record. A
    /// pair that would close a cycle (pid reuse mid-scan) is dropped.
    pub fn insert(&mut self, pid: Pid, ppid: Pid) -> Result<(), ProcessError> {
        let node = self.index.get_or_create(pid)?;
        let parent = self.index.get_or_create(ppid)?;
        if node.attach_to(parent) {
            self.count += 1;
        } else {
            debug!(pid, ppid, "ignoring parent link that would form a cycle");
        }
        Ok(())
    }

    /// Number of `(pid, ppid)` pairs linked.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of distinct nodes, including parents never observed directly.
    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    pub fn index(&self) -> &ProcessIndex<'a> {
        &self.index
    }

    pub fn node(&self, pid: Pid) -> Option<&'a AncestryNode<'a>> {
        self.index.get(pid)
    }

    /// `pid` followed by all of its descendants, pre-order.
    ///
    /// A pid missing from the scan yields just itself. The output buffer is
    /// allocated from the tree's arena, one entry per node.
    pub fn descendants(&self, pid: Pid) -> Result<&'a [Pid], ProcessError> {
        let root = self.index.get_or_create(pid)?;
        let nodes = self.index.len();
        let out = self
            .index
            .arena()
            .try_alloc_zeroed_slice::<Pid>(nodes)
            .ok_or(ProcessError::DescendantBuffer { nodes })?;
        let written = collect_into(root, out);
        let out: &'a [Pid] = out;
        Ok(&out[..written])
    }

    /// Nodes without a parent, ordered by pid.
    pub fn roots(&self) -> Vec<&'a AncestryNode<'a>> {
        let mut roots: Vec<_> = self
            .index
            .nodes()
            .filter(|node| node.parent().is_none())
            .collect();
        roots.sort_unstable_by_key(|node| node.pid());
        roots
    }

    /// Indented dump of the subtree under `pid`, or of the whole forest.
    pub fn render(&self, pid: Option<Pid>) -> String {
        let mut out = String::new();
        match pid {
            Some(pid) => match self.node(pid) {
                Some(node) => render_node(&mut out, node, 0),
                None => {
                    let _ = writeln!(out, "Process({pid}) not found");
                }
            },
            None => {
                for root in self.roots() {
                    render_node(&mut out, root, 0);
                }
            }
        }
        out
    }
}

fn render_node(out: &mut String, node: &AncestryNode<'_>, depth: usize) {
    let line = |out: &mut String, pid: Pid, depth: usize| {
        let _ = writeln!(out, "{:indent$}Process({pid})", "", indent = depth * 2);
    };

    line(out, node.pid(), depth);
    let mut pending = vec![node.children()];
    while let Some(siblings) = pending.last_mut() {
        match siblings.next() {
            Some(child) => {
                line(out, child.pid(), depth + pending.len());
                pending.push(child.children());
            }
            None => {
                pending.pop();
            }
        }
    }
}

/// Scans `source` into `arena` and returns `pid` plus its descendants.
pub fn descendants_of<'a, S>(
    arena: &'a Arena,
    source: &S,
    exponent: u32,
    pid: Pid,
) -> Result<&'a [Pid], ProcessError>
where
    S: ProcessSource + ?Sized,
{
    ProcessTree::scan(arena, source, exponent)?.descendants(pid)
}
