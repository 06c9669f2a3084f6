//! Wire protocol for the all-reduce group
//!
//! All messages exchanged between the master and the workers are variants of
//! [`Message`], serialized as CBOR and framed with a length prefix by the
//! [`codec`] module. Block payloads carry `f32` chunks of at most
//! `max_chunk_size` elements; the trailing chunk of a block keeps its actual
//! (shorter) length end-to-end.

pub mod codec;

use crate::errors::{NodeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use uuid::Uuid;

/// Registration handshake sent by a worker to the master when it comes up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Register {
    /// Stable node identity, independent of the dense worker id
    pub node: Uuid,
    /// Address the worker listens on for group traffic
    pub addr: SocketAddr,
}

/// Group initialization, broadcast by the master once the membership quorum
/// is reached. Fixes the peer set and all tuning parameters for the lifetime
/// of the worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitWorkers {
    /// Dense worker id -> address, includes the receiver itself
    pub peers: BTreeMap<usize, SocketAddr>,
    /// Address of the master pacing the rounds
    pub master: SocketAddr,
    /// The receiver's own id within `peers`
    pub dest_id: usize,
    /// Fraction of peers whose scatters trigger a chunk reduction
    pub th_reduce: f64,
    /// Fraction of peers whose reduced chunks trigger round completion
    pub th_complete: f64,
    /// Number of rounds a worker may lag behind the newest started round
    pub max_lag: usize,
    /// Length of the full data vector
    pub data_size: usize,
    /// Maximum number of elements per wire chunk
    pub max_chunk_size: usize,
}

/// Round kickoff, broadcast by the master.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartAllreduce {
    pub round: i64,
}

/// One chunk of the sender's input block for the receiver's owned block
/// index, sent during the scatter phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScatterBlock {
    /// Chunk values, at most `max_chunk_size` elements
    pub value: Vec<f32>,
    pub src_id: usize,
    pub dest_id: usize,
    pub chunk_id: usize,
    pub round: i64,
}

/// One reduced chunk of the sender's owned block, broadcast to every peer
/// during the gather phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReduceBlock {
    /// Reduced chunk values, at most `max_chunk_size` elements
    pub value: Vec<f32>,
    pub src_id: usize,
    pub dest_id: usize,
    pub chunk_id: usize,
    pub round: i64,
    /// Number of distinct scatter contributions folded into `value`
    pub reduce_count: usize,
}

/// Round completion notice, sent by a worker to the master.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompleteAllreduce {
    pub src_id: usize,
    pub round: i64,
}

/// Every message that can cross the wire between group members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Message {
    Register(Register),
    InitWorkers(InitWorkers),
    StartAllreduce(StartAllreduce),
    ScatterBlock(ScatterBlock),
    ReduceBlock(ReduceBlock),
    CompleteAllreduce(CompleteAllreduce),
}

impl Message {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Register(_) => "Register",
            Message::InitWorkers(_) => "InitWorkers",
            Message::StartAllreduce(_) => "StartAllreduce",
            Message::ScatterBlock(_) => "ScatterBlock",
            Message::ReduceBlock(_) => "ReduceBlock",
            Message::CompleteAllreduce(_) => "CompleteAllreduce",
        }
    }

    /// Serialize to CBOR bytes
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| NodeError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| NodeError::Serialization(e.to_string()))
    }
}
