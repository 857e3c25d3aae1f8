//! Shared logic behind the `hashchain` command-line tool.

use crate::blockchain::{
    decode_index, genesis_data, Block, BlockLayout, ChainEngine, ChainValidator, ValidationPolicy,
    GENESIS_LABEL,
};
use crate::config::Config;
use crate::error::{ChainError, IntegrityViolation, Result};
use crate::payload::{PayloadSource, RandomPayloads, RepeatedPayload};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::info;

const PROGRESS_STEP: usize = 4096;

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub algorithm: String,
    pub blocks: usize,
    pub bytes: usize,
    pub block_size: usize,
    pub seeded: bool,
    pub verify_threads: usize,
    #[serde(with = "duration_ms")]
    pub build_time: Duration,
    #[serde(with = "duration_ms")]
    pub validate_time: Duration,
    pub tail_digest: String,
}

impl BenchReport {
    pub fn build_throughput(&self) -> f64 {
        per_second(self.blocks, self.build_time)
    }

    pub fn validate_throughput(&self) -> f64 {
        per_second(self.blocks, self.validate_time)
    }
}

fn per_second(blocks: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs == 0.0 {
        0.0
    } else {
        blocks as f64 / secs
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
    }
}

/// Builds `config.bench.blocks` blocks after a `genesis###...` block, then
/// validates the whole buffer.
pub fn run_bench(config: &Config, show_progress: bool) -> Result<BenchReport> {
    config.validate()?;
    let layout = config.layout()?;
    let engine = ChainEngine::new(layout);
    let validator = ChainValidator::new(layout, config.policy())?;

    let mut source: Box<dyn PayloadSource> = match config.bench.seed {
        Some(seed) => Box::new(RandomPayloads::seeded(seed)),
        None => Box::new(RandomPayloads::os()),
    };

    let mut genesis_digest = layout.algorithm.zero_digest();
    source.fill(&mut genesis_digest)?;
    let genesis = Block::new(&layout, genesis_data(&layout, GENESIS_LABEL)?, genesis_digest)?;

    let count = config.bench.blocks;
    let progress = progress_bar(count, show_progress);

    let started = Instant::now();
    let chain = engine.build_chain_with_progress(&genesis, count, source.as_mut(), |index| {
        if index % PROGRESS_STEP == 0 || index == count {
            progress.set_position(index as u64);
        }
    })?;
    let build_time = started.elapsed();
    progress.finish_and_clear();

    let started = Instant::now();
    let report = validator.validate(&chain)?;
    let validate_time = started.elapsed();

    let tail = decode_index(&chain, report.blocks - 1, &layout)?;
    info!(
        "Bench finished: {} blocks built in {}, validated in {}",
        report.blocks,
        humantime::format_duration(build_time),
        humantime::format_duration(validate_time)
    );

    Ok(BenchReport {
        algorithm: layout.algorithm.to_string(),
        blocks: report.blocks,
        bytes: report.bytes,
        block_size: layout.block_size(),
        seeded: config.bench.seed.is_some(),
        verify_threads: config.verify.threads,
        build_time,
        validate_time,
        tail_digest: hex::encode(tail.digest),
    })
}

fn progress_bar(count: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(count as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} blocks ({per_sec})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

/// Renders a bench report as a table.
pub fn render_report(report: &BenchReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![Cell::new("Metric"), Cell::new("Value")]);

    let rows = [
        ("Hash", report.algorithm.clone()),
        ("Blocks (incl. genesis)", report.blocks.to_string()),
        ("Block size", format!("{} bytes", report.block_size)),
        ("Chain size", format!("{} bytes", report.bytes)),
        (
            "Payload source",
            if report.seeded { "seeded StdRng" } else { "OS RNG" }.to_string(),
        ),
        ("Verify threads", report.verify_threads.to_string()),
        ("Build time", humantime::format_duration(report.build_time).to_string()),
        ("Build rate", format!("{:.0} blocks/s", report.build_throughput())),
        ("Validate time", humantime::format_duration(report.validate_time).to_string()),
        ("Validate rate", format!("{:.0} blocks/s", report.validate_throughput())),
        ("Tail digest", report.tail_digest.clone()),
    ];
    for (metric, value) in rows {
        table.add_row(vec![Cell::new(metric), Cell::new(value)]);
    }
    table
}

#[derive(Debug, Clone)]
pub struct DemoOutcome {
    pub genesis_digest: Vec<u8>,
    pub block_digest: Vec<u8>,
    pub tampered_offset: usize,
    /// `None` means the tampered chain was accepted, which is a bug.
    pub violation: Option<IntegrityViolation>,
}

/// Two-block walkthrough: a `genesis###...` block with a zero digest, one
/// block of `A`s, then a single flipped byte in the second block's data.
pub fn run_demo() -> Result<DemoOutcome> {
    let layout = BlockLayout::default();
    let engine = ChainEngine::new(layout);
    let validator = ChainValidator::new(layout, ValidationPolicy::default())?;

    let genesis = Block::new(
        &layout,
        genesis_data(&layout, GENESIS_LABEL)?,
        layout.algorithm.zero_digest(),
    )?;
    let mut chain = engine.build_chain(&genesis, 1, &mut RepeatedPayload::new(b'A'))?;
    validator.validate(&chain)?;

    let block_digest = decode_index(&chain, 1, &layout)?.digest.to_vec();

    let tampered_offset = layout.block_size() + layout.data_size / 2;
    chain[tampered_offset] ^= 0x01;

    let violation = match validator.validate(&chain) {
        Ok(_) => None,
        Err(ChainError::Integrity(violation)) => Some(violation),
        Err(e) => return Err(e),
    };

    Ok(DemoOutcome {
        genesis_digest: genesis.digest().to_vec(),
        block_digest,
        tampered_offset,
        violation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::HashAlgorithm;

    fn small_bench(seed: Option<u64>) -> Config {
        let mut config = Config::default();
        config.bench.blocks = 50;
        config.bench.seed = seed;
        config
    }

    #[test]
    fn test_bench_report() {
        let report = run_bench(&small_bench(Some(1)), false).unwrap();
        assert_eq!(report.blocks, 51);
        assert_eq!(report.bytes, 51 * 192);
        assert_eq!(report.algorithm, "sha512");
        assert_eq!(report.tail_digest.len(), 128);
        assert!(report.seeded);
    }

    #[test]
    fn test_seeded_bench_is_reproducible() {
        let a = run_bench(&small_bench(Some(99)), false).unwrap();
        let b = run_bench(&small_bench(Some(99)), false).unwrap();
        assert_eq!(a.tail_digest, b.tail_digest);

        let c = run_bench(&small_bench(Some(100)), false).unwrap();
        assert_ne!(a.tail_digest, c.tail_digest);
    }

    #[test]
    fn test_bench_with_os_rng_and_parallel_verify() {
        let mut config = small_bench(None);
        config.chain.hash = HashAlgorithm::Sha256;
        config.verify.threads = 3;
        config.verify.min_blocks_per_worker = 4;

        let report = run_bench(&config, false).unwrap();
        assert_eq!(report.blocks, 51);
        assert_eq!(report.block_size, 128 + 32);
        assert!(!report.seeded);
    }

    #[test]
    fn test_report_serializes_durations_as_ms() {
        let report = run_bench(&small_bench(Some(1)), false).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["build_time"].is_f64());
        assert_eq!(json["blocks"], 51);

        let rendered = render_report(&report).to_string();
        assert!(rendered.contains("Tail digest"));
    }

    #[test]
    fn test_demo_detects_tampering() {
        let outcome = run_demo().unwrap();
        assert_eq!(outcome.genesis_digest, vec![0u8; 64]);

        let mut payload = vec![b'A'; 128];
        assert_eq!(
            outcome.block_digest,
            HashAlgorithm::Sha512.chain_digest(&payload, &[0u8; 64])
        );

        let violation = outcome.violation.unwrap();
        assert_eq!(violation.index, 1);
        assert_eq!(violation.actual, outcome.block_digest);
        payload[64] ^= 0x01;
        assert_eq!(
            violation.expected,
            HashAlgorithm::Sha512.chain_digest(&payload, &[0u8; 64])
        );
    }
}
