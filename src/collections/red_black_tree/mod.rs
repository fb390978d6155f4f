use bytemuck::Pod;
use solana_program::msg;
use std::cmp::Ordering;

use crate::{error::RedBlackTreeError, ZeroCopy};

mod node;

use self::node::{node, Allocator, Field, Node, Register, SENTINEL};

pub use self::node::MAX_CAPACITY;

/// Red-black tree struct, which is a self-balancing binary search tree keyed by
/// `u128`. Nodes live in a flat arena of slots addressed by 1-based index, with
/// `0` meaning "no node". The arena is append-only: a node keeps its index
/// for the lifetime of the tree.
///
/// This type can be used to reference a read-only tree.
pub struct RedBlackTree<'a, V: Pod> {
    /// Node allocator.
    allocator: &'a Allocator,

    /// Array of nodes to store the tree.
    nodes: &'a [Node<V>],
}

/// Red-black tree struct, which is a self-balancing binary search tree keyed by
/// `u128`. Nodes live in a flat arena of slots addressed by 1-based index, with
/// `0` meaning "no node". The arena is append-only: a node keeps its index
/// for the lifetime of the tree.
///
/// This type can be used to reference a writable tree.
pub struct RedBlackTreeMut<'a, V: Pod> {
    /// Node allocator.
    allocator: &'a mut Allocator,

    /// Array of nodes to store the tree.
    nodes: &'a mut [Node<V>],
}

// Read operations shared by both views.
macro_rules! red_black_tree_read {
    ( $name:ident ) => {
        impl<'a, V: Pod> $name<'a, V> {
            /// Returns the required data length (in bytes) to store a tree with the specified capacity.
            pub const fn data_len(capacity: usize) -> usize {
                std::mem::size_of::<Allocator>() + (capacity * std::mem::size_of::<Node<V>>())
            }

            /// Returns the capacity of the tree.
            ///
            /// This is never more than the number of node slots in the byte
            /// array, even if the array was shrunk after the tree was initialized.
            pub fn capacity(&self) -> usize {
                (self.allocator.get_field(Field::Capacity) as usize).min(self.nodes.len())
            }

            /// Returns the number of nodes in the tree.
            pub fn len(&self) -> usize {
                self.allocator.get_field(Field::Size) as usize
            }

            /// Indicates whether the tree is full or not.
            pub fn is_full(&self) -> bool {
                self.len() >= self.capacity()
            }

            /// Indicates whether the tree is empty or not.
            pub fn is_empty(&self) -> bool {
                self.allocator.get_field(Field::Size) == 0
            }

            /// Index of the root node, `0` when the tree is empty.
            pub fn root(&self) -> u32 {
                self.allocator.get_field(Field::Root)
            }

            /// Index of the node holding the lowest key, `0` when the tree is empty.
            pub fn leftmost(&self) -> u32 {
                self.allocator.get_field(Field::Leftmost)
            }

            /// Returns the index of the node holding `key`, if one is found.
            ///
            /// # Arguments
            ///
            /// * `key` - key to look up.
            pub fn find(&self, key: u128) -> Option<u32> {
                let mut reference_node = self.allocator.get_field(Field::Root);

                while reference_node != SENTINEL {
                    let node = &node!(self.nodes, reference_node);

                    reference_node = match key.cmp(&node.key()) {
                        Ordering::Less => node.left(),
                        Ordering::Greater => node.right(),
                        Ordering::Equal => return Some(reference_node),
                    };
                }

                None
            }

            /// Checks whether a key is present in the tree or not.
            ///
            /// # Arguments
            ///
            /// * `key` - the key of the node.
            pub fn contains(&self, key: u128) -> bool {
                self.find(key).is_some()
            }

            /// Return the value under the specified key, if one is found.
            ///
            /// # Arguments
            ///
            /// * `key` - key to look up the value.
            pub fn get(&self, key: u128) -> Option<&V> {
                self.find(key)
                    .map(|node_index| node!(self.nodes, node_index).value())
            }

            /// Returns the lowest entry in constant time.
            pub fn lowest(&self) -> Option<(u128, &V)> {
                let leftmost = self.allocator.get_field(Field::Leftmost);

                if leftmost == SENTINEL {
                    return None;
                }

                let node = &node!(self.nodes, leftmost);
                Some((node.key(), node.value()))
            }

            /// Returns the key of the node at `index`, or `None` if the slot is not in use.
            pub fn key_at(&self, index: u32) -> Option<u128> {
                self.in_use(index).then(|| node!(self.nodes, index).key())
            }

            /// Returns the value of the node at `index`, or `None` if the slot is not in use.
            pub fn value_at(&self, index: u32) -> Option<&V> {
                if self.in_use(index) {
                    Some(node!(self.nodes, index).value())
                } else {
                    None
                }
            }

            /// An iterator visiting all entries in ascending key order.
            pub fn iter(&self) -> RedBlackTreeIterator<'_, V> {
                RedBlackTreeIterator {
                    nodes: &self.nodes[..],
                    node: self.allocator.get_field(Field::Leftmost),
                }
            }

            #[inline]
            fn in_use(&self, index: u32) -> bool {
                index != SENTINEL
                    && index <= self.allocator.get_field(Field::Size)
                    && index as usize <= self.nodes.len()
            }
        }
    };
}

red_black_tree_read!(RedBlackTree);
red_black_tree_read!(RedBlackTreeMut);

impl<'a, V: Pod> RedBlackTree<'a, V> {
    /// Loads a tree from a byte array.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than the 16-byte allocator header or is
    /// not aligned for the header and the nodes.
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Node::<V>::PADDING_FREE;

        let (allocator, nodes) = bytes.split_at(std::mem::size_of::<Allocator>());
        let length = nodes.len() - (nodes.len() % std::mem::size_of::<Node<V>>());

        let allocator = Allocator::load(allocator);
        let nodes = bytemuck::cast_slice(&nodes[..length]);

        Self { allocator, nodes }
    }
}

impl<'a, V: Pod> RedBlackTreeMut<'a, V> {
    /// Loads a tree from a byte array.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than the 16-byte allocator header or is
    /// not aligned for the header and the nodes.
    pub fn from_bytes_mut(bytes: &'a mut [u8]) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Node::<V>::PADDING_FREE;

        let (allocator, nodes) = bytes.split_at_mut(std::mem::size_of::<Allocator>());
        let length = nodes.len() - (nodes.len() % std::mem::size_of::<Node<V>>());

        let allocator = Allocator::load_mut(allocator);
        let nodes = bytemuck::cast_slice_mut(&mut nodes[..length]);

        Self { allocator, nodes }
    }

    /// Creates an empty tree over a byte array.
    ///
    /// The capacity is the number of whole nodes that fit in the array after
    /// the allocator header. A byte array with room for the header only gives
    /// a tree with capacity 0.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than the 16-byte allocator header.
    pub fn empty(bytes: &'a mut [u8]) -> Self {
        let mut tree = Self::from_bytes_mut(bytes);
        tree.initialize(u32::MAX);
        tree
    }

    /// Creates a tree over a byte array holding a single (black) node.
    ///
    /// # Arguments
    ///
    /// * `key` - the key of the node.
    /// * `value` - the value of the node.
    ///
    /// Returns [`RedBlackTreeError::InsertFull`] when the byte array has no
    /// room for a node.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than the 16-byte allocator header.
    pub fn singleton(
        bytes: &'a mut [u8],
        key: u128,
        value: V,
    ) -> Result<Self, RedBlackTreeError> {
        let mut tree = Self::empty(bytes);
        tree.insert(key, value)?;
        Ok(tree)
    }

    /// Initializes the tree with the specified capacity.
    ///
    /// The capacity is limited by the number of nodes that fit in the byte
    /// array and by [`MAX_CAPACITY`]. This function should be called once when
    /// the tree is created.
    pub fn initialize(&mut self, capacity: u32) {
        let available = u32::try_from(self.nodes.len()).unwrap_or(u32::MAX);
        self.allocator
            .initialize(capacity.min(available).min(MAX_CAPACITY))
    }

    /// Return a mutable reference to the value under the specified key, if one is found.
    ///
    /// # Arguments
    ///
    /// * `key` - key to look up the value.
    pub fn get_mut(&mut self, key: u128) -> Option<&mut V> {
        self.find(key)
            .map(|node_index| node!(self.nodes, node_index).value_mut())
    }

    /// Insert a value on the tree at the specified key, returning the index
    /// of the new node.
    ///
    /// The tree is left untouched when the key is already present or when
    /// there is no free slot left.
    ///
    /// # Arguments
    ///
    /// * `key` - the key of the node.
    /// * `value` - the value of the node.
    pub fn insert(&mut self, key: u128, value: V) -> Result<u32, RedBlackTreeError> {
        if self.is_full() {
            msg!("red-black tree is full ({} nodes)", self.len());
            return Err(RedBlackTreeError::InsertFull);
        }

        let mut reference_node = self.allocator.get_field(Field::Root);

        if reference_node == SENTINEL {
            let root = self.add(false, key, value);
            self.allocator.set_field(Field::Root, root);
            self.allocator.set_field(Field::Leftmost, root);
            return Ok(root);
        }

        // the new node is the lowest key only if the descent never goes right
        let mut leftmost = true;

        let (parent, branch) = loop {
            let node = &node!(self.nodes, reference_node);

            let (branch, child) = match key.cmp(&node.key()) {
                Ordering::Less => (Register::Left, node.left()),
                Ordering::Greater => {
                    leftmost = false;
                    (Register::Right, node.right())
                }
                Ordering::Equal => {
                    msg!("duplicate key {} rejected", key);
                    return Err(RedBlackTreeError::DuplicateKey);
                }
            };

            if child == SENTINEL {
                break (reference_node, branch);
            }

            reference_node = child;
        };

        let index = self.add(true, key, value);
        node!(self.nodes, parent).set_register(branch, index);
        node!(self.nodes, index).set_parent(parent);

        if leftmost {
            self.allocator.set_field(Field::Leftmost, index);
        }

        self.rebalance(index);

        Ok(index)
    }

    /// Appends a node to the arena, returning its index.
    ///
    /// Callers must check that the tree is not full.
    fn add(&mut self, is_red: bool, key: u128, value: V) -> u32 {
        let index = self.allocator.get_field(Field::Size) + 1;

        node!(self.nodes, index) = Node::new(is_red, key, value);
        self.allocator.set_field(Field::Size, index);

        index
    }

    /// Restores the red-black rules after inserting the red node at `index`.
    ///
    /// Recoloring moves a red-red violation up the tree two levels at a time;
    /// at most two rotations end the loop.
    fn rebalance(&mut self, mut index: u32) {
        loop {
            let mut parent = node!(self.nodes, index).parent();

            if self.is_black(parent) {
                break;
            }

            // a red node is never the root, so the grandparent exists
            let grandparent = node!(self.nodes, parent).parent();

            if parent == node!(self.nodes, grandparent).left() {
                let uncle = node!(self.nodes, grandparent).right();

                if self.is_red(uncle) {
                    node!(self.nodes, grandparent).set_red();
                    node!(self.nodes, parent).set_black();
                    node!(self.nodes, uncle).set_black();
                    index = grandparent;
                } else {
                    if index == node!(self.nodes, parent).right() {
                        self.rotate_left(parent);
                        std::mem::swap(&mut index, &mut parent);
                    }

                    node!(self.nodes, parent).set_black();
                    node!(self.nodes, grandparent).set_red();
                    self.rotate_right(grandparent);
                }
            } else {
                let uncle = node!(self.nodes, grandparent).left();

                if self.is_red(uncle) {
                    node!(self.nodes, grandparent).set_red();
                    node!(self.nodes, parent).set_black();
                    node!(self.nodes, uncle).set_black();
                    index = grandparent;
                } else {
                    if index == node!(self.nodes, parent).left() {
                        self.rotate_right(parent);
                        std::mem::swap(&mut index, &mut parent);
                    }

                    node!(self.nodes, parent).set_black();
                    node!(self.nodes, grandparent).set_red();
                    self.rotate_left(grandparent);
                }
            }
        }

        let root = self.allocator.get_field(Field::Root);
        node!(self.nodes, root).set_black();
    }

    #[inline]
    fn is_red(&self, index: u32) -> bool {
        index != SENTINEL && node!(self.nodes, index).is_red()
    }

    /// Null links count as black.
    #[inline]
    fn is_black(&self, index: u32) -> bool {
        index == SENTINEL || node!(self.nodes, index).is_black()
    }

    /// Perform a left rotation: the right child of `index` takes its place and
    /// `index` becomes that child's left child.
    ///
    /// # Arguments
    ///
    /// * `index` - index of the node to rotate; must have a right child.
    fn rotate_left(&mut self, index: u32) {
        let right = node!(self.nodes, index).right();
        let right_left = node!(self.nodes, right).left();

        node!(self.nodes, index).set_right(right_left);

        if right_left != SENTINEL {
            node!(self.nodes, right_left).set_parent(index);
        }

        self.replace_child(index, right);

        node!(self.nodes, right).set_left(index);
        node!(self.nodes, index).set_parent(right);
    }

    /// Perform a right rotation: the left child of `index` takes its place and
    /// `index` becomes that child's right child.
    ///
    /// # Arguments
    ///
    /// * `index` - index of the node to rotate; must have a left child.
    fn rotate_right(&mut self, index: u32) {
        let left = node!(self.nodes, index).left();
        let left_right = node!(self.nodes, left).right();

        node!(self.nodes, index).set_left(left_right);

        if left_right != SENTINEL {
            node!(self.nodes, left_right).set_parent(index);
        }

        self.replace_child(index, left);

        node!(self.nodes, left).set_right(index);
        node!(self.nodes, index).set_parent(left);
    }

    /// Links `replacement` where `index` hangs from its parent, updating the
    /// root when `index` has no parent.
    fn replace_child(&mut self, index: u32, replacement: u32) {
        let parent = node!(self.nodes, index).parent();

        node!(self.nodes, replacement).set_parent(parent);

        if parent == SENTINEL {
            self.allocator.set_field(Field::Root, replacement);
        } else if node!(self.nodes, parent).left() == index {
            node!(self.nodes, parent).set_left(replacement);
        } else {
            node!(self.nodes, parent).set_right(replacement);
        }
    }
}

/// In-order iterator over the entries of a tree.
///
/// Walks from the leftmost node through successor links, climbing parent
/// links when a subtree is exhausted.
pub struct RedBlackTreeIterator<'a, V: Pod> {
    nodes: &'a [Node<V>],
    node: u32,
}

impl<'a, V: Pod> Iterator for RedBlackTreeIterator<'a, V> {
    type Item = (u128, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.node == SENTINEL {
            return None;
        }

        let current = &node!(self.nodes, self.node);
        let right = current.right();

        self.node = if right != SENTINEL {
            let mut successor = right;

            while node!(self.nodes, successor).left() != SENTINEL {
                successor = node!(self.nodes, successor).left();
            }

            successor
        } else {
            let mut child = self.node;
            let mut parent = current.parent();

            while parent != SENTINEL && node!(self.nodes, parent).right() == child {
                child = parent;
                parent = node!(self.nodes, parent).parent();
            }

            parent
        };

        Some((current.key(), current.value()))
    }
}

#[cfg(test)]
impl<V: Pod> RedBlackTreeMut<'_, V> {
    /// Asserts every red-black and ordering rule, returning the black height.
    fn verify(&self) -> u32 {
        let root = self.root();

        if root == SENTINEL {
            assert_eq!(self.leftmost(), SENTINEL, "empty tree has no leftmost");
            assert!(self.is_empty());
            return 0;
        }

        assert!(node!(self.nodes, root).is_black(), "root must be black");
        assert_eq!(node!(self.nodes, root).parent(), SENTINEL);

        let (count, black_height) = self.verify_subtree(root, None, None);
        assert_eq!(count, self.len(), "every node must be reachable");

        let mut lowest = root;
        while node!(self.nodes, lowest).left() != SENTINEL {
            lowest = node!(self.nodes, lowest).left();
        }
        assert_eq!(self.leftmost(), lowest, "leftmost must hold the lowest key");

        black_height
    }

    fn verify_subtree(
        &self,
        index: u32,
        min: Option<u128>,
        max: Option<u128>,
    ) -> (usize, u32) {
        if index == SENTINEL {
            return (0, 1);
        }

        let node = &node!(self.nodes, index);
        let key = node.key();

        assert!(min.map_or(true, |min| key > min), "key {key} out of order");
        assert!(max.map_or(true, |max| key < max), "key {key} out of order");

        for child in [node.left(), node.right()] {
            if child != SENTINEL {
                assert_eq!(node!(self.nodes, child).parent(), index);
                assert!(
                    node.is_black() || node!(self.nodes, child).is_black(),
                    "red node {index} has a red child"
                );
            }
        }

        let (left_count, left_height) = self.verify_subtree(node.left(), min, Some(key));
        let (right_count, right_height) = self.verify_subtree(node.right(), Some(key), max);

        assert_eq!(left_height, right_height, "black height differs below {index}");

        (
            left_count + right_count + 1,
            left_height + u32::from(node.is_black()),
        )
    }

    /// Number of nodes on the longest root-to-leaf path.
    fn height(&self) -> usize {
        fn depth<V: Pod>(nodes: &[Node<V>], index: u32) -> usize {
            if index == SENTINEL {
                0
            } else {
                let node = &node!(nodes, index);
                1 + depth(nodes, node.left()).max(depth(nodes, node.right()))
            }
        }

        depth(&self.nodes[..], self.root())
    }
}

#[cfg(test)]
mod proptests;
