//! Deep clone through an identity map.

use std::collections::HashMap;

use super::node::Node;
use super::{NodeId, SourceId, SqlTree};

impl SqlTree {
    /// Deep-clone everything reachable from `root`.
    pub fn clone_node(&mut self, root: NodeId) -> NodeId {
        self.clone_with(root, &mut HashMap::new(), |_, _| true)
    }

    /// Deep-clone `root` using `map` from original to clone.
    ///
    /// Nodes already in `map` are reused, which keeps shared sub-structure
    /// shared in the copy and terminates cycles. Nodes for which
    /// `should_clone` returns false are referenced as-is from the copy.
    /// Navigation edges are redirected to clones when their target was
    /// cloned and left pointing at the original otherwise. Cloned tables and
    /// queries get fresh source ids.
    pub fn clone_with<F>(&mut self, root: NodeId, map: &mut HashMap<NodeId, NodeId>, should_clone: F) -> NodeId
    where
        F: Fn(&SqlTree, NodeId) -> bool,
    {
        let mut created = Vec::new();
        let mut stack = vec![root];
        let mut children = Vec::new();

        while let Some(id) = stack.pop() {
            if map.contains_key(&id) || !should_clone(self, id) {
                continue;
            }
            let node = self.node(id).clone();
            let copy = self.add(node);
            map.insert(id, copy);
            created.push(copy);

            children.clear();
            self.node(id).children(&mut children);
            stack.extend(children.iter().rev());
        }

        for copy in created {
            let node = self.node_mut(copy);
            node.remap_children(|id| map.get(&id).copied().unwrap_or(id));
            node.remap_navigation(|id| map.get(&id).copied().unwrap_or(id));
            match node {
                Node::Query(q) => q.source_id = SourceId::next(),
                Node::Table(t) => t.source_id = SourceId::next(),
                _ => {}
            }
        }

        map.get(&root).copied().unwrap_or(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ElementType, OrderByItem};
    use crate::mapping::{ColumnDescriptor, DataType, EntityDescriptor};

    fn people_query(tree: &mut SqlTree) -> (NodeId, NodeId) {
        let person = EntityDescriptor::new("Person")
            .with_column(ColumnDescriptor::new("Id", DataType::Int32).key(1))
            .with_column(ColumnDescriptor::new("Name", DataType::NVarChar));
        let query = tree.new_query();
        let table = tree.table_from_entity(&person);
        tree.add_from(query, table, None).unwrap();
        let name = tree.table_field(table, "Name").unwrap();
        tree.select_add(query, name).unwrap();
        tree.order_by_add(query, name, false).unwrap();
        (query, name)
    }

    #[test]
    fn test_clone_preserves_sharing() {
        let mut tree = SqlTree::new();
        let (query, name) = people_query(&mut tree);

        let copy = tree.clone_node(query);
        let q = tree.query(copy).unwrap();
        let column = tree.column(q.select.columns[0]).unwrap();
        let OrderByItem { expr: ordered, .. } = q.order_by[0];

        assert_ne!(column.expr, name);
        assert_eq!(column.expr, ordered);
        assert_eq!(column.parent, copy);
        assert_ne!(q.source_id, tree.query(query).unwrap().source_id);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut tree = SqlTree::new();
        let (query, _) = people_query(&mut tree);
        let copy = tree.clone_node(query);

        tree.query_mut(copy).unwrap().order_by.clear();
        assert_eq!(tree.query(query).unwrap().order_by.len(), 1);
    }

    #[test]
    fn test_should_clone_keeps_shared_leaves() {
        let mut tree = SqlTree::new();
        let (query, name) = people_query(&mut tree);
        let copy = tree.clone_with(query, &mut HashMap::new(), |tree, id| {
            tree.element_type(id) != ElementType::SqlField
        });
        let q = tree.query(copy).unwrap();
        assert_eq!(tree.column(q.select.columns[0]).unwrap().expr, name);
    }

    #[test]
    fn test_parent_select_redirected_only_when_cloned() {
        let mut tree = SqlTree::new();
        let outer = tree.new_query();
        let inner = tree.new_sub_query(outer);

        let detached = tree.clone_node(inner);
        assert_eq!(tree.query(detached).unwrap().parent_select, Some(outer));

        let value = tree.value(1);
        let pred = tree.add(crate::ast::InSubQuery {
            expr: value,
            is_not: false,
            sub_query: inner,
        });
        tree.where_add(outer, pred).unwrap();
        let mut map = HashMap::new();
        let outer_copy = tree.clone_with(outer, &mut map, |_, _| true);
        let inner_copy = map[&inner];
        assert_eq!(tree.query(inner_copy).unwrap().parent_select, Some(outer_copy));
    }
}
