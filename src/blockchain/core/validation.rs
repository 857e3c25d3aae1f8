use crate::blockchain::core::block::{blocks, decode_index, BlockLayout, BlockView};
use crate::error::{ChainError, IntegrityViolation, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::ops::Range;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationPolicy {
    /// Skip checking the genesis digest. When false the genesis must carry
    /// `Hash(data || zero digest)`, see [`genesis_digest`].
    pub trust_genesis: bool,
    /// Reject buffers with bytes left over after the last complete block.
    pub strict_length: bool,
    /// Worker count; 1 means a sequential scan on the calling thread.
    pub threads: usize,
    pub min_blocks_per_worker: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            trust_genesis: true,
            strict_length: true,
            threads: 1,
            min_blocks_per_worker: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub blocks: usize,
    pub bytes: usize,
    pub trailing_bytes: usize,
}

/// Digest a self-consistent genesis must carry when genesis is not trusted.
pub fn genesis_digest(layout: &BlockLayout, data: &[u8]) -> Vec<u8> {
    layout
        .algorithm
        .chain_digest(data, &layout.algorithm.zero_digest())
}

/// Validates `chain` with the default policy.
pub fn validate_chain(chain: &[u8], layout: &BlockLayout) -> Result<ValidationReport> {
    ChainValidator::new(*layout, ValidationPolicy::default())?.validate(chain)
}

/// Fail-fast verifier for flat chain buffers.
///
/// The scan only reads the buffer. Each link check hashes
/// `block[i].data || block[i - 1].digest` and compares it to `block[i].digest`;
/// the first mismatch (lowest index) is reported as
/// [`ChainError::Integrity`].
pub struct ChainValidator {
    layout: BlockLayout,
    policy: ValidationPolicy,
    pool: Option<ThreadPool>,
}

impl ChainValidator {
    pub fn new(layout: BlockLayout, policy: ValidationPolicy) -> Result<Self> {
        if policy.threads == 0 {
            return Err(ChainError::Config(
                "Verification needs at least one thread".to_string(),
            ));
        }
        if policy.min_blocks_per_worker == 0 {
            return Err(ChainError::Config(
                "min_blocks_per_worker must be greater than zero".to_string(),
            ));
        }

        let pool = if policy.threads > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(policy.threads)
                .thread_name(|i| format!("hashchain-verify-{}", i))
                .build()
                .map_err(|e| ChainError::Config(format!("Failed to start verifier pool: {}", e)))?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            layout,
            policy,
            pool,
        })
    }

    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    pub fn validate(&self, chain: &[u8]) -> Result<ValidationReport> {
        let (block_count, trailing_bytes) = self.layout.split_len(chain.len());

        if trailing_bytes != 0 {
            if self.policy.strict_length {
                return Err(ChainError::MalformedInput(format!(
                    "Chain length {} is not a multiple of the {}-byte block size ({} trailing bytes)",
                    chain.len(),
                    self.layout.block_size(),
                    trailing_bytes
                )));
            }
            warn!("Ignoring {} trailing bytes after the last complete block", trailing_bytes);
        }

        if block_count == 0 {
            if self.policy.strict_length {
                return Err(ChainError::MalformedInput(
                    "Chain holds no complete block".to_string(),
                ));
            }
            return Ok(ValidationReport {
                blocks: 0,
                bytes: chain.len(),
                trailing_bytes,
            });
        }

        self.check_genesis(chain)?;

        match &self.pool {
            Some(pool) if block_count > self.policy.min_blocks_per_worker => {
                self.scan_parallel(pool, chain, block_count)?
            }
            _ => self.scan_sequential(chain)?,
        }

        info!("Chain valid: {} blocks, {} bytes", block_count, chain.len());
        Ok(ValidationReport {
            blocks: block_count,
            bytes: chain.len(),
            trailing_bytes,
        })
    }

    fn check_genesis(&self, chain: &[u8]) -> Result<()> {
        if self.policy.trust_genesis {
            debug!("Genesis block trusted without a digest check");
            return Ok(());
        }
        let genesis = decode_index(chain, 0, &self.layout)?;
        let expected = genesis_digest(&self.layout, genesis.data);
        if expected != genesis.digest {
            return Err(violation(0, expected, genesis.digest));
        }
        Ok(())
    }

    fn scan_sequential(&self, chain: &[u8]) -> Result<()> {
        let mut views = blocks(chain, &self.layout);
        let Some(mut previous) = views.next() else {
            return Ok(());
        };
        for (offset, block) in views.enumerate() {
            self.check_link(offset + 1, &previous, &block)?;
            previous = block;
        }
        Ok(())
    }

    /// Every range re-checks its own links using the stored digest of the
    /// block just before it, so ranges are independent. `find_first` keeps
    /// the verdict identical to the sequential scan.
    fn scan_parallel(&self, pool: &ThreadPool, chain: &[u8], block_count: usize) -> Result<()> {
        let ranges = split_ranges(block_count, self.policy.threads, self.policy.min_blocks_per_worker);
        debug!(
            "Verifying {} blocks across {} ranges on {} threads",
            block_count,
            ranges.len(),
            self.policy.threads
        );

        let failure = pool.install(|| {
            ranges
                .par_iter()
                .map(|range| self.scan_range(chain, range.clone()))
                .find_first(|result| result.is_err())
        });

        match failure {
            Some(result) => result,
            None => Ok(()),
        }
    }

    /// Checks the links ending at each index in `range`; index 0 is skipped.
    fn scan_range(&self, chain: &[u8], range: Range<usize>) -> Result<()> {
        let start = range.start.max(1);
        if start >= range.end {
            return Ok(());
        }
        let mut previous = decode_index(chain, start - 1, &self.layout)?;
        for index in start..range.end {
            let block = decode_index(chain, index, &self.layout)?;
            self.check_link(index, &previous, &block)?;
            previous = block;
        }
        Ok(())
    }

    fn check_link(&self, index: usize, previous: &BlockView<'_>, block: &BlockView<'_>) -> Result<()> {
        let expected = self.layout.algorithm.chain_digest(block.data, previous.digest);
        if expected != block.digest {
            return Err(violation(index, expected, block.digest));
        }
        Ok(())
    }
}

fn violation(index: usize, expected: Vec<u8>, actual: &[u8]) -> ChainError {
    warn!("Block {} failed its digest check", index);
    ChainError::Integrity(IntegrityViolation {
        index,
        expected,
        actual: actual.to_vec(),
    })
}

/// Contiguous ranges covering `0..block_count`, at most one per thread and
/// none shorter than `min_len` (except when the whole chain is shorter).
fn split_ranges(block_count: usize, threads: usize, min_len: usize) -> Vec<Range<usize>> {
    let workers = (block_count / min_len).clamp(1, threads);
    let base = block_count / workers;
    let extra = block_count % workers;

    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for worker in 0..workers {
        let len = base + usize::from(worker < extra);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}
