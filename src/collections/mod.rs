pub mod red_black_tree;

pub use red_black_tree::RedBlackTree;
pub use red_black_tree::RedBlackTreeIterator;
pub use red_black_tree::RedBlackTreeMut;
