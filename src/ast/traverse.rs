//! Deep find and bottom-up rewrite over explicit work-lists.
//!
//! None of these recurse, so AST depth is bounded by memory only. Each node
//! reachable from the root is visited once even when shared or cyclic.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::QueryResult;

use super::node::{ElementType, Node};
use super::{NodeId, SqlTree};

impl SqlTree {
    /// Immediate ownership children of a node.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.node(id).children(&mut out);
        out
    }

    /// Descendants of `root` whose type is in `types`, each parent before its children.
    pub fn find_parent_first(&self, root: NodeId, types: &[ElementType]) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut seen = HashSet::from([root]);
        let mut stack = self.children(root);
        stack.reverse();

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if types.contains(&self.element_type(id)) {
                found.push(id);
            }
            let start = stack.len();
            self.node(id).children(&mut stack);
            stack[start..].reverse();
        }
        found
    }

    /// Descendants of `root` whose type is in `types`, children before parents.
    pub fn find_parent_last(&self, root: NodeId, types: &[ElementType]) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut seen = HashSet::from([root]);
        let mut queue: VecDeque<NodeId> = self.children(root).into();
        let mut scratch = Vec::new();

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            scratch.clear();
            self.node(id).children(&mut scratch);
            queue.extend(scratch.iter().copied());
        }

        order
            .into_iter()
            .rev()
            .filter(|&id| types.contains(&self.element_type(id)))
            .collect()
    }

    /// Parent-first search that does not descend into a node once it matches.
    pub fn find_down_to(&self, root: NodeId, types: &[ElementType]) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut seen = HashSet::from([root]);
        let mut stack = self.children(root);
        stack.reverse();

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if types.contains(&self.element_type(id)) {
                found.push(id);
                continue;
            }
            let start = stack.len();
            self.node(id).children(&mut stack);
            stack[start..].reverse();
        }
        found
    }

    /// Bottom-up rewrite from `root`.
    ///
    /// `rewrite` sees every reachable node after its children were rewritten and
    /// returns the node that should replace it (itself to keep it). Parents
    /// whose children were replaced have their edges updated in place. With
    /// `skip_columns`, a column whose expression is itself a column is not
    /// descended. Returns the replacement for `root`.
    pub fn walk<F>(&mut self, root: NodeId, skip_columns: bool, mut rewrite: F) -> QueryResult<NodeId>
    where
        F: FnMut(&mut SqlTree, NodeId) -> QueryResult<NodeId>,
    {
        let mut done: HashMap<NodeId, NodeId> = HashMap::new();
        let mut in_progress: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![(root, false)];

        while let Some((id, expanded)) = stack.pop() {
            if !expanded {
                if done.contains_key(&id) || !in_progress.insert(id) {
                    continue;
                }
                stack.push((id, true));
                for child in self.walk_children(id, skip_columns).into_iter().rev() {
                    if !done.contains_key(&child) && !in_progress.contains(&child) {
                        stack.push((child, false));
                    }
                }
                continue;
            }

            let replaced: HashMap<NodeId, NodeId> = self
                .walk_children(id, skip_columns)
                .into_iter()
                .filter_map(|child| done.get(&child).filter(|&&new| new != child).map(|&new| (child, new)))
                .collect();
            if !replaced.is_empty() {
                self.node_mut(id)
                    .remap_children(|child| replaced.get(&child).copied().unwrap_or(child));
            }

            let result = rewrite(self, id)?;
            in_progress.remove(&id);
            done.insert(id, result);
        }

        Ok(done.get(&root).copied().unwrap_or(root))
    }

    fn walk_children(&self, id: NodeId, skip_columns: bool) -> Vec<NodeId> {
        match self.node(id) {
            Node::Column(c) if skip_columns && matches!(self.node(c.expr), Node::Column(_)) => {
                Vec::new()
            }
            node => {
                let mut out = Vec::new();
                node.children(&mut out);
                out
            }
        }
    }
}
