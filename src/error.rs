use solana_program::program_error::ProgramError;
use thiserror::Error;

/// Errors returned when inserting into a red-black tree.
///
/// Both errors are detected before the tree is touched, so a failed insert
/// never leaves a partial mutation behind.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RedBlackTreeError {
    /// The key is already present in the tree.
    #[error("key already present in the tree")]
    DuplicateKey,

    /// The node arena has no free slot left.
    #[error("tree is at full capacity")]
    InsertFull,
}

impl From<RedBlackTreeError> for ProgramError {
    fn from(error: RedBlackTreeError) -> Self {
        ProgramError::Custom(error as u32)
    }
}
