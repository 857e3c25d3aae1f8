//! Fixed-width block layout and the codec between blocks and chain bytes.
//!
//! A serialized block is `data ++ digest` with no framing, and a chain is
//! the plain concatenation of serialized blocks.

use crate::crypto::HashAlgorithm;
use crate::error::{ChainError, Result};
use rand::RngCore;

pub const DEFAULT_DATA_SIZE: usize = 128;
pub const GENESIS_LABEL: &str = "genesis";
pub const GENESIS_FILL: u8 = b'#';

/// Sizes shared by every block of one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    pub data_size: usize,
    pub algorithm: HashAlgorithm,
}

impl Default for BlockLayout {
    fn default() -> Self {
        Self {
            data_size: DEFAULT_DATA_SIZE,
            algorithm: HashAlgorithm::default(),
        }
    }
}

impl BlockLayout {
    pub fn new(data_size: usize, algorithm: HashAlgorithm) -> Result<Self> {
        if data_size == 0 {
            return Err(ChainError::Config(
                "Block data size must be greater than zero".to_string(),
            ));
        }
        if data_size.checked_add(algorithm.digest_size()).is_none() {
            return Err(ChainError::Config(format!(
                "Block data size {} plus a {}-byte {} digest overflows usize",
                data_size,
                algorithm.digest_size(),
                algorithm
            )));
        }
        Ok(Self {
            data_size,
            algorithm,
        })
    }

    pub fn digest_size(&self) -> usize {
        self.algorithm.digest_size()
    }

    pub fn block_size(&self) -> usize {
        self.data_size + self.digest_size()
    }

    /// Splits a buffer length into complete blocks and leftover bytes.
    pub fn split_len(&self, len: usize) -> (usize, usize) {
        let block_size = self.block_size();
        (len / block_size, len % block_size)
    }

    /// Byte length of a chain holding `blocks` blocks.
    pub fn chain_len(&self, blocks: usize) -> Result<usize> {
        blocks.checked_mul(self.block_size()).ok_or_else(|| {
            ChainError::MalformedInput(format!("A chain of {} blocks overflows usize", blocks))
        })
    }

    pub fn check_data(&self, data: &[u8]) -> Result<()> {
        if data.len() != self.data_size {
            return Err(ChainError::MalformedInput(format!(
                "Block data must be exactly {} bytes, got {}",
                self.data_size,
                data.len()
            )));
        }
        Ok(())
    }

    pub fn check_digest(&self, digest: &[u8]) -> Result<()> {
        if digest.len() != self.digest_size() {
            return Err(ChainError::MalformedInput(format!(
                "Block digest must be exactly {} bytes ({}), got {}",
                self.digest_size(),
                self.algorithm,
                digest.len()
            )));
        }
        Ok(())
    }
}

/// An owned, immutable block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    data: Vec<u8>,
    digest: Vec<u8>,
}

impl Block {
    /// Builds a block, checking both fields against `layout`.
    pub fn new(layout: &BlockLayout, data: Vec<u8>, digest: Vec<u8>) -> Result<Self> {
        layout.check_data(&data)?;
        layout.check_digest(&digest)?;
        Ok(Self { data, digest })
    }

    /// Lengths are the caller's responsibility.
    pub(crate) fn from_parts(data: Vec<u8>, digest: Vec<u8>) -> Self {
        Self { data, digest }
    }

    /// Genesis whose data is `label` padded with `#` and whose digest is
    /// drawn from `rng`.
    pub fn labelled_genesis<R: RngCore + ?Sized>(
        layout: &BlockLayout,
        label: &str,
        rng: &mut R,
    ) -> Result<Self> {
        let mut digest = layout.algorithm.zero_digest();
        rng.try_fill_bytes(&mut digest)
            .map_err(|e| ChainError::CryptoError(format!("Failed to draw genesis digest: {}", e)))?;
        Self::new(layout, genesis_data(layout, label)?, digest)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.data, self.digest)
    }

    pub fn encoded_len(&self) -> usize {
        self.data.len() + self.digest.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }

    /// Appends `data ++ digest` to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.data);
        out.extend_from_slice(&self.digest);
    }

    pub fn as_view(&self) -> BlockView<'_> {
        BlockView {
            data: &self.data,
            digest: &self.digest,
        }
    }
}

/// `label` followed by `#` up to the layout's data size.
pub fn genesis_data(layout: &BlockLayout, label: &str) -> Result<Vec<u8>> {
    let label = label.as_bytes();
    if label.len() > layout.data_size {
        return Err(ChainError::MalformedInput(format!(
            "Genesis label is {} bytes but blocks only hold {}",
            label.len(),
            layout.data_size
        )));
    }
    let mut data = Vec::with_capacity(layout.data_size);
    data.extend_from_slice(label);
    data.resize(layout.data_size, GENESIS_FILL);
    Ok(data)
}

/// A block borrowed out of a chain buffer.
///
/// Views hold a shared borrow on the buffer, so the buffer cannot be
/// mutated while any view into it is alive. Use [`BlockView::to_block`]
/// when a block has to outlive the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockView<'a> {
    pub data: &'a [u8],
    pub digest: &'a [u8],
}

impl BlockView<'_> {
    pub fn to_block(&self) -> Block {
        Block::from_parts(self.data.to_vec(), self.digest.to_vec())
    }
}

impl PartialEq<Block> for BlockView<'_> {
    fn eq(&self, other: &Block) -> bool {
        self.data == other.data() && self.digest == other.digest()
    }
}

/// Decodes the block starting at `offset`.
pub fn decode<'a>(buffer: &'a [u8], offset: usize, layout: &BlockLayout) -> Result<BlockView<'a>> {
    let block_size = layout.block_size();
    if offset % block_size != 0 {
        return Err(ChainError::MalformedInput(format!(
            "Offset {} is not aligned to the {}-byte block size",
            offset, block_size
        )));
    }
    let end = offset
        .checked_add(block_size)
        .filter(|end| *end <= buffer.len())
        .ok_or_else(|| {
            ChainError::MalformedInput(format!(
                "Block at offset {} runs past the end of a {}-byte buffer",
                offset,
                buffer.len()
            ))
        })?;
    let (data, digest) = buffer[offset..end].split_at(layout.data_size);
    Ok(BlockView { data, digest })
}

/// Decodes block number `index`.
pub fn decode_index<'a>(buffer: &'a [u8], index: usize, layout: &BlockLayout) -> Result<BlockView<'a>> {
    decode(buffer, layout.chain_len(index)?, layout)
}

/// Iterates the complete blocks of `buffer`; trailing bytes are not visited.
pub fn blocks<'a>(buffer: &'a [u8], layout: &BlockLayout) -> Blocks<'a> {
    Blocks {
        chunks: buffer.chunks_exact(layout.block_size()),
        data_size: layout.data_size,
    }
}

pub struct Blocks<'a> {
    chunks: std::slice::ChunksExact<'a, u8>,
    data_size: usize,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = BlockView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (data, digest) = self.chunks.next()?.split_at(self.data_size);
        Some(BlockView { data, digest })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Blocks<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_layout() -> BlockLayout {
        BlockLayout::new(8, HashAlgorithm::Sha256).unwrap()
    }

    #[test]
    fn test_default_layout_sizes() {
        let layout = BlockLayout::default();
        assert_eq!(layout.data_size, 128);
        assert_eq!(layout.digest_size(), 64);
        assert_eq!(layout.block_size(), 192);
    }

    #[test]
    fn test_zero_data_size_rejected() {
        let result = BlockLayout::new(0, HashAlgorithm::Sha512);
        assert!(matches!(result, Err(ChainError::Config(_))));
    }

    #[test]
    fn test_oversized_data_size_rejected() {
        let result = BlockLayout::new(usize::MAX, HashAlgorithm::Sha256);
        assert!(result.unwrap_err().to_string().contains("overflows usize"));

        let largest = usize::MAX - HashAlgorithm::Sha512.digest_size();
        let layout = BlockLayout::new(largest, HashAlgorithm::Sha512).unwrap();
        assert_eq!(layout.block_size(), usize::MAX);
        assert_eq!(layout.split_len(10), (0, 10));
    }

    #[test]
    fn test_new_block_checks_lengths() {
        let layout = small_layout();
        assert!(Block::new(&layout, vec![0; 8], vec![0; 32]).is_ok());

        let result = Block::new(&layout, vec![0; 7], vec![0; 32]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Block data must be exactly 8 bytes, got 7"));

        let result = Block::new(&layout, vec![0; 8], vec![0; 64]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Block digest must be exactly 32 bytes"));
    }

    #[test]
    fn test_encode_is_plain_concatenation() {
        let layout = small_layout();
        let block = Block::new(&layout, vec![1; 8], vec![2; 32]).unwrap();
        let encoded = block.encode();

        assert_eq!(encoded.len(), layout.block_size());
        assert!(encoded[..8].iter().all(|b| *b == 1));
        assert!(encoded[8..].iter().all(|b| *b == 2));
    }

    #[test]
    fn test_decode_returns_the_encoded_block() {
        let layout = small_layout();
        let block = Block::new(&layout, (0..8).collect(), (100..132).collect()).unwrap();

        let mut buffer = vec![0xEE; layout.block_size()];
        block.encode_into(&mut buffer);

        let view = decode(&buffer, layout.block_size(), &layout).unwrap();
        assert_eq!(view, block);
        assert_eq!(view.to_block(), block);
        assert_eq!(decode_index(&buffer, 1, &layout).unwrap(), view);
    }

    #[test]
    fn test_decode_bounds_and_alignment() {
        let layout = small_layout();
        let buffer = vec![0u8; layout.block_size() * 2 + 3];

        assert!(decode(&buffer, layout.block_size(), &layout).is_ok());
        assert!(decode(&buffer, 1, &layout)
            .unwrap_err()
            .to_string()
            .contains("not aligned"));
        assert!(decode(&buffer, layout.block_size() * 2, &layout)
            .unwrap_err()
            .to_string()
            .contains("runs past the end"));
    }

    #[test]
    fn test_blocks_iterator_skips_trailing_bytes() {
        let layout = small_layout();
        let mut buffer = Vec::new();
        for i in 0..3u8 {
            Block::new(&layout, vec![i; 8], vec![i; 32])
                .unwrap()
                .encode_into(&mut buffer);
        }
        buffer.extend_from_slice(&[9, 9, 9]);

        let views: Vec<_> = blocks(&buffer, &layout).collect();
        assert_eq!(views.len(), 3);
        assert_eq!(views[2].data, &[2u8; 8][..]);
        assert_eq!(layout.split_len(buffer.len()), (3, 3));
    }

    #[test]
    fn test_labelled_genesis() {
        let layout = BlockLayout::default();
        let mut rng = StdRng::seed_from_u64(7);
        let genesis = Block::labelled_genesis(&layout, GENESIS_LABEL, &mut rng).unwrap();

        assert!(genesis.data().starts_with(b"genesis"));
        assert!(genesis.data()[7..].iter().all(|b| *b == b'#'));
        assert_eq!(genesis.data().len(), 128);
        assert_eq!(genesis.digest().len(), 64);
    }

    #[test]
    fn test_genesis_label_too_long() {
        let layout = BlockLayout::new(4, HashAlgorithm::Sha256).unwrap();
        assert!(genesis_data(&layout, GENESIS_LABEL).is_err());
    }
}
