use std::collections::{HashMap, HashSet};

use types::phase0::{
    consts::GENESIS_EPOCH,
    primitives::{Epoch, Gwei, Slot, H256},
};

use crate::error::Error;

/// One node per viable block.
#[derive(Clone, Debug)]
pub struct ProtoNode {
    pub root: H256,
    pub parent: Option<usize>,
    pub slot: Slot,
    /// The justified epoch of the state the block produced.
    pub justified_epoch: Epoch,
    /// The finalized epoch of the state the block produced.
    pub finalized_epoch: Epoch,
    /// Sum of the balances of validators whose latest vote is for this block
    /// or one of its descendants.
    pub weight: Gwei,
}

/// The block DAG, stored as a flat array in insertion order.
///
/// Blocks are only inserted after their parent, so the array order is also a
/// topological order.
#[derive(Default)]
pub struct ProtoArray {
    nodes: Vec<ProtoNode>,
    indices: HashMap<H256, usize>,
    children: Vec<Vec<usize>>,
}

impl ProtoArray {
    pub fn insert_anchor(&mut self, root: H256, slot: Slot, justified_epoch: Epoch, finalized_epoch: Epoch) {
        assert!(self.nodes.is_empty());

        self.indices.insert(root, 0);
        self.children.push(vec![]);
        self.nodes.push(ProtoNode {
            root,
            parent: None,
            slot,
            justified_epoch,
            finalized_epoch,
            weight: 0,
        });
    }

    pub fn insert_block(
        &mut self,
        root: H256,
        parent_root: H256,
        slot: Slot,
        justified_epoch: Epoch,
        finalized_epoch: Epoch,
    ) -> Result<(), Error> {
        if self.indices.contains_key(&root) {
            return Ok(());
        }

        let parent = *self
            .indices
            .get(&parent_root)
            .ok_or(Error::UnknownParent { root, parent_root })?;

        let index = self.nodes.len();

        self.indices.insert(root, index);
        self.children.push(vec![]);
        self.children[parent].push(index);
        self.nodes.push(ProtoNode {
            root,
            parent: Some(parent),
            slot,
            justified_epoch,
            finalized_epoch,
            weight: 0,
        });

        Ok(())
    }

    #[must_use]
    pub fn contains(&self, root: H256) -> bool {
        self.indices.contains_key(&root)
    }

    #[must_use]
    pub fn node(&self, root: H256) -> Option<&ProtoNode> {
        self.indices.get(&root).map(|index| &self.nodes[*index])
    }

    pub fn add_weight(&mut self, root: H256, balance: Gwei) {
        self.for_each_ancestor(root, |node| {
            node.weight = node.weight.saturating_add(balance);
        });
    }

    pub fn remove_weight(&mut self, root: H256, balance: Gwei) {
        self.for_each_ancestor(root, |node| {
            node.weight = node.weight.saturating_sub(balance);
        });
    }

    pub fn zero_weights(&mut self) {
        for node in &mut self.nodes {
            node.weight = 0;
        }
    }

    /// LMD-GHOST: walk down from the justified root, following the heaviest
    /// viable child, ties broken by the lexicographically greater root.
    #[must_use]
    pub fn head(&self, justified_root: H256, justified_epoch: Epoch, finalized_epoch: Epoch) -> H256 {
        let Some(mut current) = self.indices.get(&justified_root).copied() else {
            return justified_root;
        };

        loop {
            let best_child = self.children[current]
                .iter()
                .copied()
                .filter(|child| self.viable(&self.nodes[*child], justified_epoch, finalized_epoch))
                .max_by_key(|child| {
                    let node = &self.nodes[*child];
                    (node.weight, node.root)
                });

            match best_child {
                Some(child) => current = child,
                None => break self.nodes[current].root,
            }
        }
    }

    /// The ancestor of `root` at `slot`, or `root` itself if it is not later
    /// than `slot`.
    #[must_use]
    pub fn ancestor_at_slot(&self, root: H256, slot: Slot) -> Option<H256> {
        let mut index = *self.indices.get(&root)?;

        while self.nodes[index].slot > slot {
            index = self.nodes[index].parent?;
        }

        Some(self.nodes[index].root)
    }

    /// Drops every node that does not descend from `new_anchor`, which
    /// becomes the new root of the array.
    pub fn prune_to_descendants_of(&mut self, new_anchor: H256) -> Vec<H256> {
        let Some(anchor_index) = self.indices.get(&new_anchor).copied() else {
            return vec![];
        };

        let mut kept = HashSet::from([anchor_index]);

        // Children always come after their parent, so one pass suffices.
        for (index, node) in self.nodes.iter().enumerate() {
            if let Some(parent) = node.parent {
                if kept.contains(&parent) {
                    kept.insert(index);
                }
            }
        }

        let mut remapped = HashMap::new();
        let mut nodes = vec![];
        let mut removed = vec![];

        for (index, node) in self.nodes.iter().enumerate() {
            if !kept.contains(&index) {
                removed.push(node.root);
                continue;
            }

            let new_index = nodes.len();
            remapped.insert(index, new_index);

            let mut node = node.clone();

            node.parent = if index == anchor_index {
                None
            } else {
                node.parent.and_then(|parent| remapped.get(&parent).copied())
            };

            nodes.push(node);
        }

        self.indices = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.root, index))
            .collect();

        self.children = vec![vec![]; nodes.len()];

        for (index, node) in nodes.iter().enumerate() {
            if let Some(parent) = node.parent {
                self.children[parent].push(index);
            }
        }

        self.nodes = nodes;

        removed
    }

    fn viable(&self, node: &ProtoNode, justified_epoch: Epoch, finalized_epoch: Epoch) -> bool {
        let justified_ok =
            node.justified_epoch == justified_epoch || justified_epoch == GENESIS_EPOCH;
        let finalized_ok =
            node.finalized_epoch == finalized_epoch || finalized_epoch == GENESIS_EPOCH;

        justified_ok && finalized_ok
    }

    fn for_each_ancestor(&mut self, root: H256, mut apply: impl FnMut(&mut ProtoNode)) {
        let Some(mut index) = self.indices.get(&root).copied() else {
            return;
        };

        loop {
            apply(&mut self.nodes[index]);

            match self.nodes[index].parent {
                Some(parent) => index = parent,
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(byte: u8) -> H256 {
        H256::repeat_byte(byte)
    }

    fn array_with_two_branches() -> ProtoArray {
        // 0 ── 1 ── 2
        //      └─── 3
        let mut array = ProtoArray::default();
        array.insert_anchor(root(0), 0, 0, 0);
        array.insert_block(root(1), root(0), 1, 0, 0).expect("parent is known");
        array.insert_block(root(2), root(1), 2, 0, 0).expect("parent is known");
        array.insert_block(root(3), root(1), 2, 0, 0).expect("parent is known");
        array
    }

    #[test]
    fn heaviest_branch_wins() {
        let mut array = array_with_two_branches();

        array.add_weight(root(2), 10);
        array.add_weight(root(3), 20);

        assert_eq!(array.head(root(0), 0, 0), root(3));

        array.add_weight(root(2), 20);

        assert_eq!(array.head(root(0), 0, 0), root(2));
    }

    #[test]
    fn equal_weights_break_toward_the_greater_root() {
        let mut array = array_with_two_branches();

        array.add_weight(root(2), 10);
        array.add_weight(root(3), 10);

        assert_eq!(array.head(root(0), 0, 0), root(3));
    }

    #[test]
    fn weights_propagate_to_ancestors() {
        let mut array = array_with_two_branches();

        array.add_weight(root(2), 10);

        assert_eq!(array.node(root(1)).expect("node exists").weight, 10);
        assert_eq!(array.node(root(0)).expect("node exists").weight, 10);

        array.remove_weight(root(2), 10);

        assert_eq!(array.node(root(1)).expect("node exists").weight, 0);
    }

    #[test]
    fn unknown_parents_are_rejected() {
        let mut array = array_with_two_branches();

        assert_eq!(
            array.insert_block(root(9), root(8), 3, 0, 0),
            Err(Error::UnknownParent {
                root: root(9),
                parent_root: root(8),
            }),
        );
    }

    #[test]
    fn pruning_keeps_only_descendants() {
        let mut array = array_with_two_branches();

        let removed = array.prune_to_descendants_of(root(1));

        assert_eq!(removed, [root(0)]);
        assert!(array.contains(root(1)));
        assert!(array.contains(root(2)));
        assert!(array.contains(root(3)));
        assert_eq!(array.head(root(1), 0, 0), root(3));
    }

    #[test]
    fn ancestors_are_resolved_by_slot() {
        let array = array_with_two_branches();

        assert_eq!(array.ancestor_at_slot(root(2), 1), Some(root(1)));
        assert_eq!(array.ancestor_at_slot(root(2), 0), Some(root(0)));
        assert_eq!(array.ancestor_at_slot(root(2), 2), Some(root(2)));
        assert_eq!(array.ancestor_at_slot(root(9), 0), None);
    }
}
