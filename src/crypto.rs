//! Digest primitives for hashchain

use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;

/// Hash function used to link blocks together.
///
/// Every call to [`HashAlgorithm::chain_digest`] builds a fresh hasher, so a
/// single value can be shared freely between threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    #[default]
    Sha512,
}

impl HashAlgorithm {
    /// Length in bytes of the digests this algorithm produces.
    pub const fn digest_size(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Computes `Hash(data || previous_digest)`.
    pub fn chain_digest(self, data: &[u8], previous_digest: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha256 => digest_pair::<Sha256>(data, previous_digest),
            HashAlgorithm::Sha384 => digest_pair::<Sha384>(data, previous_digest),
            HashAlgorithm::Sha512 => digest_pair::<Sha512>(data, previous_digest),
        }
    }

    /// All-zero digest of the right width.
    pub fn zero_digest(self) -> Vec<u8> {
        vec![0u8; self.digest_size()]
    }
}

fn digest_pair<D: Digest>(data: &[u8], previous_digest: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(data);
    hasher.update(previous_digest);
    hasher.finalize().to_vec()
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            _ => Err(ChainError::Config(format!("Unknown hash algorithm: {}", s))),
        }
    }
}

impl TryFrom<String> for HashAlgorithm {
    type Error = ChainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HashAlgorithm> for String {
    fn from(algorithm: HashAlgorithm) -> Self {
        algorithm.name().to_string()
    }
}
