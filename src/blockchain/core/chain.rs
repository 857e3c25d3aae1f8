use crate::blockchain::core::block::{decode_index, Block, BlockLayout, BlockView};
use crate::error::{ChainError, Result};
use crate::payload::PayloadSource;
use tracing::{debug, info};

/// Builds and extends flat chain buffers for one [`BlockLayout`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainEngine {
    layout: BlockLayout,
}

impl ChainEngine {
    pub fn new(layout: BlockLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    /// Derives the block that follows `previous`, committing to `data` and
    /// to the previous digest. `previous` is left untouched.
    pub fn derive_block(&self, previous: &Block, data: Vec<u8>) -> Result<Block> {
        self.derive_from_digest(previous.digest(), data)
    }

    fn derive_from_digest(&self, previous_digest: &[u8], data: Vec<u8>) -> Result<Block> {
        self.layout.check_data(&data)?;
        let digest = self.layout.algorithm.chain_digest(&data, previous_digest);
        Ok(Block::from_parts(data, digest))
    }

    /// Encodes `genesis` followed by `count` derived blocks whose payloads
    /// come from `source`.
    pub fn build_chain<S>(&self, genesis: &Block, count: usize, source: &mut S) -> Result<Vec<u8>>
    where
        S: PayloadSource + ?Sized,
    {
        self.build_chain_with_progress(genesis, count, source, |_| {})
    }

    /// Same as [`ChainEngine::build_chain`], calling `on_block` with the
    /// index of every derived block once it has been appended.
    pub fn build_chain_with_progress<S, F>(
        &self,
        genesis: &Block,
        count: usize,
        source: &mut S,
        mut on_block: F,
    ) -> Result<Vec<u8>>
    where
        S: PayloadSource + ?Sized,
        F: FnMut(usize),
    {
        self.layout.check_data(genesis.data())?;
        self.layout.check_digest(genesis.digest())?;

        let total = count.checked_add(1).ok_or_else(|| {
            ChainError::MalformedInput(format!("Cannot build a chain of {} blocks", count))
        })?;
        let mut chain = Vec::with_capacity(self.layout.chain_len(total)?);
        genesis.encode_into(&mut chain);

        info!(
            "Building chain: {} blocks after genesis, {} ({} bytes per block)",
            count,
            self.layout.algorithm,
            self.layout.block_size()
        );

        let mut tail_digest = genesis.digest().to_vec();
        for index in 1..=count {
            let mut data = vec![0u8; self.layout.data_size];
            source.fill(&mut data)?;
            let block = self.derive_from_digest(&tail_digest, data)?;
            block.encode_into(&mut chain);
            tail_digest = block.into_parts().1;
            on_block(index);
        }

        debug!("Chain built: {} blocks, {} bytes", total, chain.len());
        Ok(chain)
    }

    /// Boundary form of chain construction: genesis given as raw bytes.
    pub fn build_from_seed<S>(
        &self,
        seed_data: &[u8],
        seed_digest: &[u8],
        count: usize,
        source: &mut S,
    ) -> Result<Vec<u8>>
    where
        S: PayloadSource + ?Sized,
    {
        let genesis = Block::new(&self.layout, seed_data.to_vec(), seed_digest.to_vec())?;
        self.build_chain(&genesis, count, source)
    }

    /// Last block of an existing chain.
    pub fn tail<'a>(&self, chain: &'a [u8]) -> Result<BlockView<'a>> {
        let (blocks, trailing) = self.layout.split_len(chain.len());
        if trailing != 0 {
            return Err(ChainError::MalformedInput(format!(
                "Chain length {} is not a multiple of the {}-byte block size",
                chain.len(),
                self.layout.block_size()
            )));
        }
        if blocks == 0 {
            return Err(ChainError::MalformedInput(
                "Chain holds no blocks".to_string(),
            ));
        }
        decode_index(chain, blocks - 1, &self.layout)
    }

    /// Appends one block derived from the current tail and returns its index.
    pub fn append(&self, chain: &mut Vec<u8>, data: Vec<u8>) -> Result<usize> {
        let block = {
            let tail = self.tail(chain)?;
            self.derive_from_digest(tail.digest, data)?
        };
        block.encode_into(chain);
        Ok(chain.len() / self.layout.block_size() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::HashAlgorithm;
    use crate::payload::{FixedPayloads, RandomPayloads, RepeatedPayload};

    fn genesis(layout: &BlockLayout) -> Block {
        Block::new(layout, vec![b'#'; layout.data_size], layout.algorithm.zero_digest()).unwrap()
    }

    #[test]
    fn test_derive_block_commits_to_previous_digest() {
        let engine = ChainEngine::default();
        let genesis = genesis(engine.layout());
        let data = vec![b'A'; 128];

        let block = engine.derive_block(&genesis, data.clone()).unwrap();
        assert_eq!(block.data(), &data[..]);
        assert_eq!(
            block.digest(),
            &HashAlgorithm::Sha512.chain_digest(&data, &[0u8; 64])[..]
        );
        assert_eq!(genesis.digest(), &[0u8; 64][..]);
    }

    #[test]
    fn test_derive_block_rejects_wrong_payload_length() {
        let engine = ChainEngine::default();
        let genesis = genesis(engine.layout());
        let result = engine.derive_block(&genesis, vec![0; 127]);
        assert!(matches!(result, Err(ChainError::MalformedInput(_))));
    }

    #[test]
    fn test_build_chain_length() {
        let engine = ChainEngine::default();
        let genesis = genesis(engine.layout());
        let chain = engine
            .build_chain(&genesis, 5, &mut RandomPayloads::seeded(1))
            .unwrap();
        assert_eq!(chain.len(), 6 * 192);
        assert_eq!(&chain[..192], &genesis.encode()[..]);
    }

    #[test]
    fn test_zero_count_is_genesis_only() {
        let engine = ChainEngine::default();
        let genesis = genesis(engine.layout());
        let chain = engine
            .build_chain(&genesis, 0, &mut RepeatedPayload::new(0))
            .unwrap();
        assert_eq!(chain, genesis.encode());
    }

    #[test]
    fn test_progress_reports_every_block() {
        let engine = ChainEngine::default();
        let genesis = genesis(engine.layout());
        let mut seen = Vec::new();
        engine
            .build_chain_with_progress(&genesis, 3, &mut RepeatedPayload::new(1), |i| seen.push(i))
            .unwrap();
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_build_from_seed_checks_lengths() {
        let engine = ChainEngine::default();
        let result = engine.build_from_seed(&[0; 128], &[0; 32], 1, &mut RepeatedPayload::new(0));
        assert!(matches!(result, Err(ChainError::MalformedInput(_))));
    }

    #[test]
    fn test_source_errors_propagate() {
        let engine = ChainEngine::default();
        let genesis = genesis(engine.layout());
        let mut source = FixedPayloads::new(vec![vec![1; 128]]);
        let result = engine.build_chain(&genesis, 2, &mut source);
        assert!(result.unwrap_err().to_string().contains("exhausted"));
    }

    #[test]
    fn test_append_extends_from_tail() {
        let layout = BlockLayout::new(16, HashAlgorithm::Sha256).unwrap();
        let engine = ChainEngine::new(layout);
        let genesis = genesis(&layout);
        let mut chain = engine
            .build_chain(&genesis, 1, &mut RepeatedPayload::new(3))
            .unwrap();
        let previous_tail = engine.tail(&chain).unwrap().to_block();

        let index = engine.append(&mut chain, vec![9; 16]).unwrap();
        assert_eq!(index, 2);

        let tail = engine.tail(&chain).unwrap();
        assert_eq!(tail.data, &[9u8; 16][..]);
        assert_eq!(tail.digest, &layout.algorithm.chain_digest(&[9; 16], previous_tail.digest())[..]);
    }

    #[test]
    fn test_append_rejects_ragged_chain() {
        let engine = ChainEngine::default();
        let mut chain = vec![0u8; 200];
        let result = engine.append(&mut chain, vec![0; 128]);
        assert!(result.unwrap_err().to_string().contains("not a multiple"));

        let mut empty = Vec::new();
        assert!(engine.append(&mut empty, vec![0; 128]).is_err());
    }
}
