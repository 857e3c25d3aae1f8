//! hashchain - hash-chained fixed-size blocks
//!
//! Every block is `data ++ digest`, where the digest of block *i* is
//! `Hash(data_i || digest_{i-1})`. A chain is the flat concatenation of its
//! serialized blocks, starting with a genesis block whose digest is arbitrary.
//!
//! # Architecture
//!
//! ## Chain
//! - [`blockchain`] - Block codec, chain construction and verification
//! - [`payload`] - Injectable payload sources for new blocks
//!
//! ## Cryptography
//! - [`crypto`] - Hash algorithm selection and the chaining digest
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`cli`] - Bench and demo drivers used by the `hashchain` binary

#![forbid(unsafe_code)]

// ============================================================================
// Chain
// ============================================================================
pub mod blockchain;
pub mod payload;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod cli;
pub mod config;
pub mod error;
