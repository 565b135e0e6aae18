//! Merkle tree over a block's transactions.
//!
//! Leaves hash each transaction's canonical encoding. Levels are folded
//! pairwise left to right; when a level has odd length its last node is
//! carried up unchanged rather than duplicated.

use log::debug;

use super::crypto::{calculate_hash, hash_concat};
use super::transaction::Transaction;

/// A node in the Merkle tree. Each parent exclusively owns its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleNode {
    left: Option<Box<MerkleNode>>,
    right: Option<Box<MerkleNode>>,
    data: String,
}

impl MerkleNode {
    fn leaf(transaction: &Transaction) -> Self {
        MerkleNode {
            left: None,
            right: None,
            data: calculate_hash(transaction.canonical_encoding()),
        }
    }

    fn parent(left: MerkleNode, right: MerkleNode) -> Self {
        let data = hash_concat(&left.data, &right.data);

        MerkleNode {
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
            data,
        }
    }

    /// The digest held by this node
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Left child, absent on leaves
    pub fn left(&self) -> Option<&MerkleNode> {
        self.left.as_deref()
    }

    /// Right child, absent on leaves
    pub fn right(&self) -> Option<&MerkleNode> {
        self.right.as_deref()
    }

    /// Returns true if the node has no children
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            return 1;
        }

        let left = self.left().map_or(0, MerkleNode::leaf_count);
        let right = self.right().map_or(0, MerkleNode::leaf_count);

        left + right
    }

    fn depth(&self) -> usize {
        let left = self.left().map_or(0, MerkleNode::depth);
        let right = self.right().map_or(0, MerkleNode::depth);

        1 + left.max(right)
    }
}

/// A Merkle tree summarising an ordered transaction batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerkleTree {
    root: Option<MerkleNode>,
}

impl MerkleTree {
    /// Builds a Merkle tree from the given transactions
    ///
    /// # Arguments
    ///
    /// * `transactions` - The ordered transaction batch
    ///
    /// # Returns
    ///
    /// A tree whose root is `None` only when `transactions` is empty
    pub fn build(transactions: &[Transaction]) -> Self {
        let mut level: Vec<MerkleNode> = transactions.iter().map(MerkleNode::leaf).collect();

        if level.is_empty() {
            return MerkleTree { root: None };
        }

        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            let mut nodes = level.into_iter();

            while let Some(left) = nodes.next() {
                match nodes.next() {
                    Some(right) => next.push(MerkleNode::parent(left, right)),
                    None => next.push(left),
                }
            }

            level = next;
        }

        let root = level.pop();
        debug!("Built merkle tree over {} transactions", transactions.len());

        MerkleTree { root }
    }

    /// The root node, or `None` for an empty batch
    pub fn root(&self) -> Option<&MerkleNode> {
        self.root.as_ref()
    }

    /// The root digest, or `None` for an empty batch
    pub fn root_hash(&self) -> Option<&str> {
        self.root.as_ref().map(MerkleNode::data)
    }

    /// Number of transactions the tree was built from
    pub fn leaf_count(&self) -> usize {
        self.root.as_ref().map_or(0, MerkleNode::leaf_count)
    }

    /// Number of levels from the root down to the deepest leaf
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, MerkleNode::depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_hash(transaction: &Transaction) -> String {
        calculate_hash(transaction.canonical_encoding())
    }

    fn a() -> Transaction {
        Transaction::new("Alice", "Bob", 1.5).unwrap()
    }

    fn b() -> Transaction {
        Transaction::new("Charlie", "Alice", 2.0).unwrap()
    }

    fn c() -> Transaction {
        Transaction::new("Bob", "Charlie", 0.5).unwrap()
    }

    #[test]
    fn test_empty_tree_has_no_root() {
        let tree = MerkleTree::build(&[]);

        assert!(tree.root().is_none());
        assert!(tree.root_hash().is_none());
        assert_eq!(tree.leaf_count(), 0);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_single_transaction_root_is_leaf() {
        let tree = MerkleTree::build(&[a()]);
        let root = tree.root().unwrap();

        assert!(root.is_leaf());
        assert_eq!(root.data(), leaf_hash(&a()));
        assert_eq!(root.data(), calculate_hash("Alice,Bob,1.500000"));
    }

    #[test]
    fn test_two_transactions() {
        let tree = MerkleTree::build(&[a(), b()]);
        let root = tree.root().unwrap();

        assert_eq!(root.data(), hash_concat(&leaf_hash(&a()), &leaf_hash(&b())));
        assert_eq!(root.left().unwrap().data(), leaf_hash(&a()));
        assert_eq!(root.right().unwrap().data(), leaf_hash(&b()));
    }

    #[test]
    fn test_deterministic() {
        let first = MerkleTree::build(&[a(), b()]);
        let second = MerkleTree::build(&[a(), b()]);

        assert_eq!(first.root_hash(), second.root_hash());
    }

    #[test]
    fn test_order_matters() {
        let forward = MerkleTree::build(&[a(), b()]);
        let reversed = MerkleTree::build(&[b(), a()]);

        assert_ne!(forward.root_hash(), reversed.root_hash());
    }

    #[test]
    fn test_odd_level_carries_last_node() {
        let tree = MerkleTree::build(&[a(), b(), c()]);

        let pair = calculate_hash(format!("{}{}", leaf_hash(&a()), leaf_hash(&b())));
        let expected = calculate_hash(format!("{}{}", pair, leaf_hash(&c())));

        assert_eq!(tree.root_hash(), Some(expected.as_str()));

        // the carried leaf is not re-hashed
        let root = tree.root().unwrap();
        assert!(root.right().unwrap().is_leaf());
        assert_eq!(root.right().unwrap().data(), leaf_hash(&c()));
    }

    #[test]
    fn test_shape() {
        let transactions: Vec<Transaction> = (0..5)
            .map(|i| Transaction::new("Alice", "Bob", i as f64).unwrap())
            .collect();
        let tree = MerkleTree::build(&transactions);

        assert_eq!(tree.leaf_count(), 5);
        assert_eq!(tree.depth(), 4);
    }
}
