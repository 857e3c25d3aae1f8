//! Payload sources feeding new blocks during chain construction
//!
//! The source is always passed in explicitly. [`RandomPayloads::os`] draws
//! from the operating system CSPRNG; [`RandomPayloads::seeded`] is a
//! reproducible generator meant for benchmarks and synthetic data only.

use crate::error::{ChainError, Result};
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use std::collections::VecDeque;

pub trait PayloadSource {
    /// Fills `buf` with the next payload. `buf.len()` is the block data size.
    fn fill(&mut self, buf: &mut [u8]) -> Result<()>;
}

pub struct RandomPayloads<R> {
    rng: R,
}

impl<R: RngCore> RandomPayloads<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomPayloads<OsRng> {
    pub fn os() -> Self {
        Self::new(OsRng)
    }
}

impl RandomPayloads<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: RngCore> PayloadSource for RandomPayloads<R> {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        self.rng
            .try_fill_bytes(buf)
            .map_err(|e| ChainError::CryptoError(format!("Random payload generation failed: {}", e)))
    }
}

/// Replays a fixed list of payloads in order.
#[derive(Debug, Clone, Default)]
pub struct FixedPayloads {
    payloads: VecDeque<Vec<u8>>,
}

impl FixedPayloads {
    pub fn new<I>(payloads: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        Self {
            payloads: payloads.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.payloads.len()
    }
}

impl PayloadSource for FixedPayloads {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let payload = self.payloads.pop_front().ok_or_else(|| {
            ChainError::MalformedInput("Fixed payload source is exhausted".to_string())
        })?;
        if payload.len() != buf.len() {
            return Err(ChainError::MalformedInput(format!(
                "Payload must be exactly {} bytes, got {}",
                buf.len(),
                payload.len()
            )));
        }
        buf.copy_from_slice(&payload);
        Ok(())
    }
}

/// Every payload is the same byte repeated.
#[derive(Debug, Clone, Copy)]
pub struct RepeatedPayload {
    byte: u8,
}

impl RepeatedPayload {
    pub fn new(byte: u8) -> Self {
        Self { byte }
    }
}

impl PayloadSource for RepeatedPayload {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        buf.fill(self.byte);
        Ok(())
    }
}
