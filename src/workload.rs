use rand::{distributions::Uniform, rngs::StdRng, Rng, SeedableRng};

use crate::error::BenchError;

/// Key stored at `index` of the key space.
pub fn key_for(index: usize) -> String {
    format!("keykeykey{}", index)
}

/// Value written for `index` while populating the store.
pub fn population_value(index: usize) -> String {
    format!("this is a test value {}", index)
}

/// Value written by the `ordinal`-th workload operation.
pub fn workload_value(ordinal: u64) -> String {
    format!("this is a test string {}", ordinal)
}

/// Kind of a generated operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Read,
    Write,
}

/// A single generated operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OpKind,
    pub key: String,
    /// Set for writes only.
    pub value: Option<String>,
}

/// Per-worker operation generator.
///
/// The operation selector and the key index come from two separately
/// seeded streams, so the two draws are independent. Each worker owns its
/// generator; nothing is shared between workers.
pub struct WorkloadGenerator {
    read_prob: u32,
    op_rng: StdRng,
    key_rng: StdRng,
    op_dist: Uniform<u32>,
    key_dist: Uniform<usize>,
}

impl WorkloadGenerator {
    /// Create a generator seeded from OS entropy.
    pub fn new(key_space: usize, read_prob: u32) -> Result<Self, BenchError> {
        Self::build(
            key_space,
            read_prob,
            StdRng::from_entropy(),
            StdRng::from_entropy(),
        )
    }

    /// Create a generator with a reproducible sequence.
    pub fn with_seed(key_space: usize, read_prob: u32, seed: u64) -> Result<Self, BenchError> {
        Self::build(
            key_space,
            read_prob,
            StdRng::seed_from_u64(seed),
            StdRng::seed_from_u64(seed.rotate_left(32) ^ 0x9e37_79b9_7f4a_7c15),
        )
    }

    fn build(
        key_space: usize,
        read_prob: u32,
        op_rng: StdRng,
        key_rng: StdRng,
    ) -> Result<Self, BenchError> {
        if key_space < 2 {
            return Err(BenchError::InvalidArgument(format!(
                "key space must hold at least 2 keys, got {}",
                key_space
            )));
        }
        if read_prob > 100 {
            return Err(BenchError::InvalidArgument(format!(
                "read probability must be within 0..=100, got {}",
                read_prob
            )));
        }
        Ok(Self {
            read_prob,
            op_rng,
            key_rng,
            op_dist: Uniform::new(0, 100),
            // Index 0 is populated but never addressed by the workload.
            key_dist: Uniform::new_inclusive(1, key_space - 1),
        })
    }

    /// Draw the next operation. `ordinal` is folded into write values.
    pub fn next_operation(&mut self, ordinal: u64) -> Operation {
        let selector = self.op_rng.sample(&self.op_dist);
        let index = self.key_rng.sample(&self.key_dist);
        let key = key_for(index);

        if selector < self.read_prob {
            Operation {
                kind: OpKind::Read,
                key,
                value: None,
            }
        } else {
            Operation {
                kind: OpKind::Write,
                key,
                value: Some(workload_value(ordinal)),
            }
        }
    }
}
