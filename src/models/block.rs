//! Block ids and block splitting for block blob uploads.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;

/// Most blocks one block blob can be committed from.
pub const MAX_BLOCK_COUNT: usize = 50_000;

/// Width of the zero-padded block index encoded into a block id. Wide enough for every
/// index below [`MAX_BLOCK_COUNT`].
const BLOCK_INDEX_WIDTH: usize = 6;

/// Base64 block id.
///
/// All ids of one blob must have the same length, so the index is zero-padded to a
/// fixed width before encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(String);

impl BlockId {
    /// Creates the id of the block at `index`.
    pub fn new(index: usize) -> Self {
        let raw = format!("{:0width$}", index, width = BLOCK_INDEX_WIDTH);
        Self(BASE64.encode(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A block ready to be staged.
#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    pub data: Bytes,
}

/// Splits `data` into consecutive blocks of at most `block_size` bytes.
///
/// Empty input yields no blocks; committing an empty block list creates an empty blob.
pub fn split_blocks(data: Bytes, block_size: usize) -> Vec<Block> {
    let block_size = block_size.max(1);
    let mut blocks = Vec::with_capacity(data.len().div_ceil(block_size));
    let mut offset = 0;
    while offset < data.len() {
        let end = (offset + block_size).min(data.len());
        blocks.push(Block {
            id: BlockId::new(blocks.len()),
            data: data.slice(offset..end),
        });
        offset = end;
    }
    blocks
}
