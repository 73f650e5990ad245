use std::ops;

use generational_arena::{Arena, Index};
use tracing::instrument;

/// Tree node in the arena-based hierarchy structure.
#[derive(Debug)]
pub struct TreeNode<T> {
    /// Payload carried by this node
    pub data: T,
    /// Index of parent node in the arena, None for the root
    pub parent: Option<Index>,
    /// Indices of child nodes in the arena, in insertion order
    pub children: Vec<Index>,
}

/// Arena-based tree with parent back-references.
///
/// Nodes are owned by the arena; parents and children refer to each other by
/// `Index`, so a child's `parent` is always the inverse of its parent's
/// `children` entry. The first node inserted without a parent becomes the root.
#[derive(Debug)]
pub struct TreeArena<T> {
    arena: Arena<TreeNode<T>>,
    root: Option<Index>,
}

impl<T> Default for TreeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TreeArena<T> {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
        }
    }

    #[instrument(level = "trace", skip(self, data))]
    pub fn insert_node(&mut self, data: T, parent: Option<Index>) -> Index {
        let node = TreeNode {
            data,
            parent,
            children: Vec::new(),
        };
        let node_idx = self.arena.insert(node);

        if let Some(parent_idx) = parent {
            if let Some(parent) = self.arena.get_mut(parent_idx) {
                parent.children.push(node_idx);
            }
        } else if self.root.is_none() {
            self.root = Some(node_idx);
        }

        node_idx
    }

    #[instrument(level = "trace", skip(self))]
    pub fn get_node(&self, idx: Index) -> Option<&TreeNode<T>> {
        self.arena.get(idx)
    }

    #[instrument(level = "trace", skip(self))]
    pub fn root(&self) -> Option<Index> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn parent(&self, idx: Index) -> Option<Index> {
        self.get_node(idx).and_then(|n| n.parent)
    }

    pub fn children(&self, idx: Index) -> &[Index] {
        self.get_node(idx)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    /// Walks parent links up to the top of the hierarchy containing `idx`.
    #[instrument(level = "trace", skip(self))]
    pub fn root_of(&self, idx: Index) -> Index {
        let mut current = idx;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Ancestors of `idx`, nearest first, excluding `idx` itself.
    pub fn ancestors(&self, idx: Index) -> Ancestors<'_, T> {
        Ancestors {
            arena: self,
            current: self.parent(idx),
        }
    }

    /// Pre-order traversal of the whole tree.
    #[instrument(level = "trace", skip(self))]
    pub fn iter(&self) -> TreeIterator<'_, T> {
        TreeIterator::new(self, self.root.map(|r| vec![r]).unwrap_or_default())
    }

    /// Pre-order traversal of the subtree below `idx`, excluding `idx`.
    pub fn descendants(&self, idx: Index) -> TreeIterator<'_, T> {
        let start = self.children(idx).iter().rev().copied().collect();
        TreeIterator::new(self, start)
    }

    /// Searches below `idx`: direct children first, then each child's subtree in order.
    #[instrument(level = "trace", skip(self, pred))]
    pub fn find_descendant<P>(&self, idx: Index, pred: &P) -> Option<Index>
    where
        P: Fn(&T) -> bool,
    {
        let children = self.children(idx);
        if let Some(found) = children
            .iter()
            .copied()
            .find(|&c| self.get_node(c).is_some_and(|n| pred(&n.data)))
        {
            return Some(found);
        }
        children
            .iter()
            .find_map(|&child| self.find_descendant(child, pred))
    }

    /// Collects every node below `idx` whose payload satisfies `pred`, in pre-order.
    pub fn collect_down<P>(&self, idx: Index, pred: P) -> Vec<Index>
    where
        P: Fn(&T) -> bool,
    {
        self.descendants(idx)
            .filter(|(_, node)| pred(&node.data))
            .map(|(i, _)| i)
            .collect()
    }
}

impl<T> ops::Index<Index> for TreeArena<T> {
    type Output = TreeNode<T>;

    /// Panics on a stale index, like slice indexing.
    fn index(&self, idx: Index) -> &Self::Output {
        &self.arena[idx]
    }
}

pub struct Ancestors<'a, T> {
    arena: &'a TreeArena<T>,
    current: Option<Index>,
}

impl<'a, T> Iterator for Ancestors<'a, T> {
    type Item = (Index, &'a TreeNode<T>);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.current?;
        let node = self.arena.get_node(idx)?;
        self.current = node.parent;
        Some((idx, node))
    }
}

pub struct TreeIterator<'a, T> {
    arena: &'a TreeArena<T>,
    stack: Vec<Index>,
}

impl<'a, T> TreeIterator<'a, T> {
    fn new(arena: &'a TreeArena<T>, stack: Vec<Index>) -> Self {
        Self { arena, stack }
    }
}

impl<'a, T> Iterator for TreeIterator<'a, T> {
    type Item = (Index, &'a TreeNode<T>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.arena.get_node(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}
