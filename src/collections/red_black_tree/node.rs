use bytemuck::{Pod, Zeroable};

use crate::ZeroCopy;

/// Constant to represent an empty link.
pub(crate) const SENTINEL: u32 = 0;

/// Largest number of nodes a tree can address (31-bit indices).
pub const MAX_CAPACITY: u32 = i32::MAX as u32;

// Color values stored in the `Color` register. A zeroed node is black.
const BLACK: u32 = 0;
const RED: u32 = 1;

/// Macro to access a node by its 1-based index.
macro_rules! node {
    ( $array:expr, $index:expr ) => {
        $array[($index - 1) as usize]
    };
}

pub(crate) use node;

// Enum representing the fields of a node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Register {
    Parent,
    Left,
    Right,
    Color,
}

// Enum representing the fields of the allocator.
#[derive(Copy, Clone)]
pub(crate) enum Field {
    Root,
    Leftmost,
    Size,
    Capacity,
}

/// The allocator keeps track of the status of the tree.
///
/// Nodes are never freed, so the next free slot is always `size + 1` and
/// the arena only grows towards `capacity`.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct Allocator {
    /// Allocator fields:
    ///   [0] - root
    ///   [1] - leftmost
    ///   [2] - size
    ///   [3] - capacity
    fields: [u32; 4],
}

impl ZeroCopy<'_, Allocator> for Allocator {}

impl Allocator {
    pub fn initialize(&mut self, capacity: u32) {
        self.fields = [SENTINEL, SENTINEL, 0, capacity];
    }

    #[inline(always)]
    pub(crate) fn get_field(&self, field: Field) -> u32 {
        self.fields[field as usize]
    }

    #[inline(always)]
    pub(crate) fn set_field(&mut self, field: Field, value: u32) {
        self.fields[field as usize] = value;
    }
}

/// A node of the tree.
///
/// A node does not store its own index: every operation addresses nodes by
/// index and carries that index alongside the node.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Node<V: Pod> {
    /// Registers for a node. This is fixed to include:
    ///   [0] - parent
    ///   [1] - left child
    ///   [2] - right child
    ///   [3] - color
    ///
    /// Registers and key are little-endian bytes so the node has the alignment
    /// of `V` and no padding.
    registers: [[u8; 4]; 4],
    /// Key of the node.
    key: [u8; 16],
    /// The value associated with the node.
    value: V,
}

impl<V: Pod> Node<V> {
    /// Fails to compile for a value type that would add padding to the node.
    pub(crate) const PADDING_FREE: () = assert!(
        std::mem::size_of::<Self>() == 32 + std::mem::size_of::<V>(),
        "node layout must not contain padding"
    );

    pub(crate) fn new(is_red: bool, key: u128, value: V) -> Self {
        Self {
            registers: [
                SENTINEL.to_le_bytes(),
                SENTINEL.to_le_bytes(),
                SENTINEL.to_le_bytes(),
                (if is_red { RED } else { BLACK }).to_le_bytes(),
            ],
            key: key.to_le_bytes(),
            value,
        }
    }

    #[inline(always)]
    pub(crate) fn key(&self) -> u128 {
        u128::from_le_bytes(self.key)
    }

    #[inline(always)]
    pub(crate) fn value(&self) -> &V {
        &self.value
    }

    #[inline(always)]
    pub(crate) fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    #[inline(always)]
    pub(crate) fn get_register(&self, register: Register) -> u32 {
        u32::from_le_bytes(self.registers[register as usize])
    }

    #[inline(always)]
    pub(crate) fn set_register(&mut self, register: Register, value: u32) {
        self.registers[register as usize] = value.to_le_bytes();
    }

    #[inline(always)]
    pub(crate) fn parent(&self) -> u32 {
        self.get_register(Register::Parent)
    }

    #[inline(always)]
    pub(crate) fn left(&self) -> u32 {
        self.get_register(Register::Left)
    }

    #[inline(always)]
    pub(crate) fn right(&self) -> u32 {
        self.get_register(Register::Right)
    }

    #[inline(always)]
    pub(crate) fn set_parent(&mut self, index: u32) {
        self.set_register(Register::Parent, index);
    }

    #[inline(always)]
    pub(crate) fn set_left(&mut self, index: u32) {
        self.set_register(Register::Left, index);
    }

    #[inline(always)]
    pub(crate) fn set_right(&mut self, index: u32) {
        self.set_register(Register::Right, index);
    }

    #[inline(always)]
    pub(crate) fn is_red(&self) -> bool {
        self.get_register(Register::Color) == RED
    }

    #[inline(always)]
    pub(crate) fn is_black(&self) -> bool {
        !self.is_red()
    }

    #[inline(always)]
    pub(crate) fn set_red(&mut self) {
        self.set_register(Register::Color, RED);
    }

    #[inline(always)]
    pub(crate) fn set_black(&mut self) {
        self.set_register(Register::Color, BLACK);
    }
}

unsafe impl<V: Pod> Zeroable for Node<V> {}

unsafe impl<V: Pod> Pod for Node<V> {}
