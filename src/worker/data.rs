//! Data plumbing for a worker
//!
//! The worker pulls one input vector per round from a [`DataSource`] and
//! pushes the aggregate to a [`DataSink`]. Both are injected trait objects;
//! the shipped implementations cover the reference launcher and tests.

use crate::errors::{NodeError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::info;

/// One round's input vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllReduceInput {
    pub data: Vec<f32>,
}

/// One round's aggregate as delivered to the sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllReduceOutput {
    /// Elementwise sum over the contributing peers
    pub data: Vec<f32>,
    /// Per-element number of peer contributions folded into `data`; 0 for
    /// positions whose reduced block never arrived
    pub count: Vec<u32>,
    /// Round this aggregate belongs to
    pub iteration: i64,
}

/// Supplies the input vector for each round. Must return exactly the
/// group-configured vector length; anything else is a fatal configuration
/// error on the worker.
pub trait DataSource: Send {
    fn fetch(&mut self, iteration: i64) -> Result<AllReduceInput>;
}

/// Receives the aggregate once per completed round.
pub trait DataSink: Send {
    fn deliver(&mut self, output: AllReduceOutput) -> Result<()>;
}

/// Returns the same vector every round.
#[derive(Debug, Clone)]
pub struct VectorSource {
    data: Vec<f32>,
}

impl VectorSource {
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }
}

impl DataSource for VectorSource {
    fn fetch(&mut self, _iteration: i64) -> Result<AllReduceInput> {
        Ok(AllReduceInput {
            data: self.data.clone(),
        })
    }
}

/// Gradient-like random vectors for the reference launcher.
pub struct RandomSource {
    len: usize,
    scale: f32,
    rng: StdRng,
}

impl RandomSource {
    pub fn new(len: usize, scale: f32) -> Self {
        Self {
            len,
            scale,
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded variant for reproducible runs.
    pub fn seeded(len: usize, scale: f32, seed: u64) -> Self {
        Self {
            len,
            scale,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DataSource for RandomSource {
    fn fetch(&mut self, _iteration: i64) -> Result<AllReduceInput> {
        let data = (0..self.len)
            .map(|_| self.rng.gen_range(-self.scale..self.scale))
            .collect();
        Ok(AllReduceInput { data })
    }
}

/// Traces a short preview of each aggregate. Reference sink for the CLI.
#[derive(Debug, Default)]
pub struct LoggingSink;

impl DataSink for LoggingSink {
    fn deliver(&mut self, output: AllReduceOutput) -> Result<()> {
        let preview: Vec<f32> = output.data.iter().take(3).copied().collect();
        let full = output.count.iter().filter(|&&c| c > 0).count();
        info!(
            iteration = output.iteration,
            len = output.data.len(),
            contributed_positions = full,
            preview = ?preview,
            "aggregate ready"
        );
        Ok(())
    }
}

/// Collects every delivered aggregate; handles stay readable after the
/// worker takes ownership of the sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    outputs: Arc<Mutex<Vec<AllReduceOutput>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far.
    pub fn outputs(&self) -> Vec<AllReduceOutput> {
        self.outputs
            .lock()
            .expect("memory sink poisoned")
            .clone()
    }
}

impl DataSink for MemorySink {
    fn deliver(&mut self, output: AllReduceOutput) -> Result<()> {
        self.outputs
            .lock()
            .map_err(|_| NodeError::Sink("memory sink poisoned".to_string()))?
            .push(output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_source_repeats() {
        let mut source = VectorSource::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(source.fetch(0).unwrap().data, vec![1.0, 2.0, 3.0]);
        assert_eq!(source.fetch(7).unwrap().data, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_random_source_length_and_scale() {
        let mut source = RandomSource::seeded(32, 0.5, 42);
        let input = source.fetch(0).unwrap();
        assert_eq!(input.data.len(), 32);
        assert!(input.data.iter().all(|v| v.abs() <= 0.5));
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        let mut handle = sink.clone();
        handle
            .deliver(AllReduceOutput {
                data: vec![1.0],
                count: vec![2],
                iteration: 0,
            })
            .unwrap();

        let outputs = sink.outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].iteration, 0);
        assert_eq!(outputs[0].count, vec![2]);
    }

    #[test]
    fn test_output_cbor_roundtrip() {
        let output = AllReduceOutput {
            data: vec![1.0, 2.0],
            count: vec![2, 2],
            iteration: 3,
        };

        let mut buf = Vec::new();
        ciborium::into_writer(&output, &mut buf).unwrap();
        let decoded: AllReduceOutput = ciborium::from_reader(&buf[..]).unwrap();
        assert_eq!(output, decoded);
    }
}
