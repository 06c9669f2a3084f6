//! Worker node state machine
//!
//! Each worker runs a single-threaded event loop over its mailbox. Handlers
//! run to completion; the only awaits are transport sends. Per round the
//! worker:
//!
//! 1. fetches its input vector and scatters it, one block per peer, in
//!    chunks of at most `max_chunk_size` elements;
//! 2. reduces its own block as soon as the scatter quorum (`th_reduce`) is
//!    reached for a chunk, and broadcasts the reduced chunk to every peer;
//! 3. completes the round once every chunk of the reduce buffer meets the
//!    completion quorum (`th_complete`), delivering the assembled aggregate
//!    to the sink and notifying the master.
//!
//! ```text
//! Mailbox -> Worker -> scatter/reduce buffers -> Transport
//!    ^                                              |
//!    +------------- self-redelivery ----------------+
//! ```
//!
//! Messages for rounds that are not startable yet are re-enqueued behind a
//! synthesized `StartAllreduce`, and everything received before
//! `InitWorkers` is re-enqueued untouched; the mailbox order guarantees a
//! deferred message is only seen again after its trigger.

use crate::buffer::ChunkedRoundBuffer;
use crate::errors::{NodeError, Result};
use crate::protocol::{
    CompleteAllreduce, InitWorkers, Message, ReduceBlock, Register, ScatterBlock, StartAllreduce,
};
use crate::transport::{NodeEvent, Transport};
use crate::worker::data::{AllReduceOutput, DataSink, DataSource};
use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::ops::Range;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Elementwise combination strategy for scattered chunks.
///
/// Contributions are the chunks that actually arrived; absent peers
/// contribute the identity element.
pub trait Reducer: Send + Sync {
    fn combine(&self, len: usize, contributions: &[&[f32]]) -> Vec<f32>;
}

/// Elementwise sum, the reduction the protocol is built around.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumReducer;

impl Reducer for SumReducer {
    fn combine(&self, len: usize, contributions: &[&[f32]]) -> Vec<f32> {
        let mut out = vec![0.0; len];
        for chunk in contributions {
            for (acc, v) in out.iter_mut().zip(chunk.iter()) {
                *acc += v;
            }
        }
        out
    }
}

/// Half-open element range of block `idx` in a vector of `data_size`.
fn block_range(data_size: usize, step_size: usize, idx: usize) -> Range<usize> {
    let start = (idx * step_size).min(data_size);
    let end = ((idx + 1) * step_size).min(data_size);
    start..end
}

/// Number of chunks a block of `len` elements splits into.
fn chunks_in(len: usize, max_chunk_size: usize) -> usize {
    len.div_ceil(max_chunk_size)
}

/// Half-open element range of chunk `k` within a block of `len` elements.
fn chunk_span(len: usize, max_chunk_size: usize, k: usize) -> Range<usize> {
    let start = (k * max_chunk_size).min(len);
    let end = ((k + 1) * max_chunk_size).min(len);
    start..end
}

/// Side effects available to the round state machine: the transport, the
/// data callbacks, the reducer, and the own mailbox for re-enqueueing.
struct WorkerCtx<'a> {
    transport: &'a dyn Transport,
    source: &'a mut dyn DataSource,
    sink: &'a mut dyn DataSink,
    reducer: &'a dyn Reducer,
    inbox: &'a mpsc::UnboundedSender<NodeEvent>,
}

impl WorkerCtx<'_> {
    /// Best-effort send: delivery failures are survivable by design, the
    /// quorum machinery absorbs the loss.
    async fn send(&self, to: SocketAddr, message: Message) {
        if let Err(e) = self.transport.send(to, message).await {
            warn!(peer = %to, error = %e, "Send failed; continuing without the peer");
        }
    }

    /// Re-enqueue a message behind everything already in the mailbox.
    fn redeliver(&self, message: Message) {
        let _ = self.inbox.send(NodeEvent::Message(message));
    }
}

/// Everything fixed or evolving per group membership, created by
/// `InitWorkers`. `None` on the worker means uninitialized.
struct RoundState {
    id: usize,
    peers: BTreeMap<usize, SocketAddr>,
    master: SocketAddr,
    max_lag: usize,
    data_size: usize,
    max_chunk_size: usize,
    step_size: usize,
    /// Input vector of the most recently scattered round
    data: Vec<f32>,
    /// Oldest round not yet completed
    round: i64,
    /// Largest round seen in any StartAllreduce
    max_round: i64,
    /// Largest round already scattered
    max_scattered: i64,
    /// Rounds completed since `round` last advanced
    completed: HashSet<i64>,
    /// Scatters received for the block this worker owns
    scatter_buf: ChunkedRoundBuffer,
    /// Reduced chunks received from every block owner
    reduce_buf: ChunkedRoundBuffer,
}

impl RoundState {
    fn new(local_addr: SocketAddr, init: InitWorkers) -> Result<Self> {
        let n = init.peers.len();
        if n == 0 {
            return Err(NodeError::Config("empty peer set in InitWorkers".to_string()));
        }
        if init.max_chunk_size == 0 {
            return Err(NodeError::Config("max_chunk_size must be positive".to_string()));
        }
        for (name, th) in [("th_reduce", init.th_reduce), ("th_complete", init.th_complete)] {
            if !(th > 0.0 && th <= 1.0) {
                return Err(NodeError::Config(format!(
                    "{} must be in (0, 1], got {}",
                    name, th
                )));
            }
        }
        match init.peers.get(&init.dest_id) {
            Some(own) if *own == local_addr => {}
            Some(own) => {
                // Address forms can differ across transports; trust the id
                debug!(advertised = %own, local = %local_addr, "Init address differs from local");
            }
            None => {
                return Err(NodeError::Config(format!(
                    "own id {} missing from peer map",
                    init.dest_id
                )));
            }
        }

        let step_size = init.data_size.div_ceil(n);
        let my_block_size = block_range(init.data_size, step_size, init.dest_id).len();
        let max_block_size = block_range(init.data_size, step_size, 0).len();
        let max_num_chunks = chunks_in(max_block_size, init.max_chunk_size);

        // Shorter blocks never produce the high chunk ids of the widest
        // block; clamp the completion quorum per chunk to the block owners
        // that actually have that chunk.
        let expected: Vec<usize> = (0..max_num_chunks)
            .map(|k| {
                (0..n)
                    .filter(|&j| {
                        let len = block_range(init.data_size, step_size, j).len();
                        chunks_in(len, init.max_chunk_size) > k
                    })
                    .count()
            })
            .collect();

        let depth = init.max_lag + 1;
        let scatter_buf =
            ChunkedRoundBuffer::new(my_block_size, n, depth, init.th_reduce, init.max_chunk_size);
        let reduce_buf =
            ChunkedRoundBuffer::new(max_block_size, n, depth, init.th_complete, init.max_chunk_size)
                .with_expected_contributors(expected);

        Ok(Self {
            id: init.dest_id,
            peers: init.peers,
            master: init.master,
            max_lag: init.max_lag,
            data_size: init.data_size,
            max_chunk_size: init.max_chunk_size,
            step_size,
            data: vec![0.0; init.data_size],
            round: 0,
            max_round: -1,
            max_scattered: -1,
            completed: HashSet::new(),
            scatter_buf,
            reduce_buf,
        })
    }

    fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Length of the block owned by peer `idx`.
    fn block_len(&self, idx: usize) -> usize {
        block_range(self.data_size, self.step_size, idx).len()
    }

    async fn handle_start(&mut self, round: i64, ctx: &mut WorkerCtx<'_>) -> Result<()> {
        debug!(round, current = self.round, "Round start received");
        if round > self.max_round {
            self.max_round = round;
        }

        // Catch-up: force-complete rounds about to fall out of the lag
        // window, from whatever arrived, so the group keeps moving even if
        // quorums were never met.
        while self.round < self.max_round - self.max_lag as i64 {
            let stale = self.round;
            warn!(
                round = stale,
                max_round = self.max_round,
                "Force-completing round leaving the lag window"
            );
            for chunk in 0..self.scatter_buf.num_chunks() {
                let (reduced, count) = self.reduce_chunk(0, chunk, ctx.reducer);
                self.broadcast(reduced, chunk, stale, count, ctx).await;
            }
            self.complete(stale, ctx).await?;
        }

        // Scatter every round started but not yet scattered
        while self.max_scattered < self.max_round {
            let next = self.max_scattered + 1;
            let input = ctx.source.fetch(next)?;
            if input.data.len() != self.data_size {
                return Err(NodeError::Config(format!(
                    "data source returned {} elements for round {}, expected {}",
                    input.data.len(),
                    next,
                    self.data_size
                )));
            }
            self.data = input.data;
            self.scatter(next, ctx).await;
            self.max_scattered = next;
        }

        // Completions older than the window origin are no longer reachable
        let horizon = self.round;
        self.completed.retain(|&r| r >= horizon);
        Ok(())
    }

    async fn handle_scatter(&mut self, msg: ScatterBlock, ctx: &mut WorkerCtx<'_>) -> Result<()> {
        if msg.dest_id != self.id {
            return Err(NodeError::Protocol(format!(
                "scatter for worker {} delivered to worker {}",
                msg.dest_id, self.id
            )));
        }
        if msg.round < self.round || self.completed.contains(&msg.round) {
            warn!(
                round = msg.round,
                src = msg.src_id,
                chunk = msg.chunk_id,
                current = self.round,
                "Dropping outdated scatter"
            );
            return Ok(());
        }
        if msg.round > self.max_round {
            // Round not started here yet; trigger the start, then revisit
            debug!(round = msg.round, src = msg.src_id, "Deferring future scatter");
            ctx.redeliver(Message::StartAllreduce(StartAllreduce { round: msg.round }));
            ctx.redeliver(Message::ScatterBlock(msg));
            return Ok(());
        }
        if msg.src_id >= self.peer_count() {
            return Err(NodeError::Protocol(format!(
                "scatter from unknown worker {} in a group of {}",
                msg.src_id,
                self.peer_count()
            )));
        }
        if msg.chunk_id >= self.scatter_buf.num_chunks() {
            return Err(NodeError::Protocol(format!(
                "scatter chunk {} out of range for a block of {} chunks",
                msg.chunk_id,
                self.scatter_buf.num_chunks()
            )));
        }

        let Some(row) = self.scatter_buf.row_of(msg.round) else {
            warn!(round = msg.round, "Scatter outside the lag window; dropping");
            return Ok(());
        };
        self.scatter_buf.store(row, msg.src_id, msg.chunk_id, &msg.value, 1);

        // Every arrival at or past the quorum re-reduces; receivers
        // overwrite the slot without recounting, so late contributions
        // refine the aggregate idempotently.
        if self.scatter_buf.meets_threshold(row, msg.chunk_id) {
            let (reduced, count) = self.reduce_chunk(row, msg.chunk_id, ctx.reducer);
            self.broadcast(reduced, msg.chunk_id, msg.round, count, ctx).await;
        }
        Ok(())
    }

    async fn handle_reduce(&mut self, msg: ReduceBlock, ctx: &mut WorkerCtx<'_>) -> Result<()> {
        if msg.dest_id != self.id {
            return Err(NodeError::Protocol(format!(
                "reduced block for worker {} delivered to worker {}",
                msg.dest_id, self.id
            )));
        }
        if msg.value.len() > self.max_chunk_size {
            return Err(NodeError::Protocol(format!(
                "reduced chunk of {} elements exceeds max chunk size {}",
                msg.value.len(),
                self.max_chunk_size
            )));
        }
        if msg.round < self.round || self.completed.contains(&msg.round) {
            warn!(
                round = msg.round,
                src = msg.src_id,
                chunk = msg.chunk_id,
                current = self.round,
                "Dropping outdated reduced block"
            );
            return Ok(());
        }
        if msg.round > self.max_round {
            debug!(round = msg.round, src = msg.src_id, "Deferring future reduced block");
            ctx.redeliver(Message::StartAllreduce(StartAllreduce { round: msg.round }));
            ctx.redeliver(Message::ReduceBlock(msg));
            return Ok(());
        }
        if msg.src_id >= self.peer_count() {
            return Err(NodeError::Protocol(format!(
                "reduced block from unknown worker {} in a group of {}",
                msg.src_id,
                self.peer_count()
            )));
        }
        if msg.chunk_id >= self.reduce_buf.num_chunks() {
            return Err(NodeError::Protocol(format!(
                "reduced chunk {} out of range for blocks of {} chunks",
                msg.chunk_id,
                self.reduce_buf.num_chunks()
            )));
        }

        let Some(row) = self.reduce_buf.row_of(msg.round) else {
            warn!(round = msg.round, "Reduced block outside the lag window; dropping");
            return Ok(());
        };
        self.reduce_buf
            .store(row, msg.src_id, msg.chunk_id, &msg.value, msg.reduce_count);

        if self.reduce_buf.row_meets_threshold(row) {
            self.complete(msg.round, ctx).await?;
        }
        Ok(())
    }

    /// Elementwise reduction of the scatters received for one chunk of the
    /// owned block. Returns the reduced chunk and the contribution count.
    fn reduce_chunk(&self, row: usize, chunk: usize, reducer: &dyn Reducer) -> (Vec<f32>, usize) {
        let len = self.scatter_buf.chunk_len(chunk);
        let contributions: Vec<&[f32]> = self
            .scatter_buf
            .slots_for_chunk(row, chunk)
            .map(|s| s.values.as_slice())
            .collect();
        let reduced = reducer.combine(len, &contributions);
        (reduced, self.scatter_buf.count(row, chunk))
    }

    /// Fetch-free scatter of the current `data` vector for `round`: one
    /// block per peer, chunked by the destination block's own geometry.
    /// Destinations are staggered by the own id to avoid hotspots.
    async fn scatter(&mut self, round: i64, ctx: &mut WorkerCtx<'_>) {
        let n = self.peer_count();
        for i in 0..n {
            let dest = (i + self.id) % n;
            let Some(&addr) = self.peers.get(&dest) else {
                continue;
            };
            let block = &self.data[block_range(self.data_size, self.step_size, dest)];
            for chunk_id in 0..chunks_in(block.len(), self.max_chunk_size) {
                let span = chunk_span(block.len(), self.max_chunk_size, chunk_id);
                if span.is_empty() {
                    continue;
                }
                ctx.send(
                    addr,
                    Message::ScatterBlock(ScatterBlock {
                        value: block[span].to_vec(),
                        src_id: self.id,
                        dest_id: dest,
                        chunk_id,
                        round,
                    }),
                )
                .await;
            }
        }
        debug!(round, "Scatter sent to all peers");
    }

    /// Broadcast one reduced chunk of the owned block to every peer, with
    /// the same staggered ordering as scatter.
    async fn broadcast(
        &self,
        reduced: Vec<f32>,
        chunk_id: usize,
        round: i64,
        reduce_count: usize,
        ctx: &mut WorkerCtx<'_>,
    ) {
        let n = self.peer_count();
        for i in 0..n {
            let dest = (i + self.id) % n;
            let Some(&addr) = self.peers.get(&dest) else {
                continue;
            };
            ctx.send(
                addr,
                Message::ReduceBlock(ReduceBlock {
                    value: reduced.clone(),
                    src_id: self.id,
                    dest_id: dest,
                    chunk_id,
                    round,
                    reduce_count,
                }),
            )
            .await;
        }
    }

    /// Assemble the aggregate for a completed round, deliver it to the sink,
    /// notify the master, and advance the window past every contiguous
    /// completed round.
    async fn complete(&mut self, round: i64, ctx: &mut WorkerCtx<'_>) -> Result<()> {
        let Some(row) = self.reduce_buf.row_of(round) else {
            warn!(round, "Completion for a round outside the window; ignoring");
            return Ok(());
        };

        let (data, count) = self.assemble(row);
        let contributed = count.iter().filter(|&&c| c > 0).count();
        ctx.sink.deliver(AllReduceOutput {
            data,
            count,
            iteration: round,
        })?;
        ctx.send(
            self.master,
            Message::CompleteAllreduce(CompleteAllreduce {
                src_id: self.id,
                round,
            }),
        )
        .await;

        self.completed.insert(round);
        if round == self.round {
            // Collapse a run of out-of-order completions
            while self.completed.contains(&self.round) {
                self.round += 1;
                self.scatter_buf.advance();
                self.reduce_buf.advance();
            }
        }
        info!(
            round,
            contributed_positions = contributed,
            next_round = self.round,
            "Round completed"
        );
        Ok(())
    }

    /// Concatenate the reduced chunks src-major into the full vector, with
    /// zeros (and a zero count) where a reduced chunk never arrived.
    fn assemble(&self, row: usize) -> (Vec<f32>, Vec<u32>) {
        let mut data = Vec::with_capacity(self.data_size);
        let mut count = Vec::with_capacity(self.data_size);
        for src in 0..self.peer_count() {
            let block_len = self.block_len(src);
            for chunk in 0..chunks_in(block_len, self.max_chunk_size) {
                let len = chunk_span(block_len, self.max_chunk_size, chunk).len();
                match self.reduce_buf.slot(row, src, chunk) {
                    Some(stored) => {
                        for i in 0..len {
                            data.push(stored.values.get(i).copied().unwrap_or(0.0));
                            count.push(stored.contributors as u32);
                        }
                    }
                    None => {
                        data.extend(std::iter::repeat(0.0).take(len));
                        count.extend(std::iter::repeat(0).take(len));
                    }
                }
            }
        }
        data.truncate(self.data_size);
        count.truncate(self.data_size);
        data.resize(self.data_size, 0.0);
        count.resize(self.data_size, 0);
        (data, count)
    }
}

/// A worker node: mailbox shell around the round state machine.
pub struct Worker {
    addr: SocketAddr,
    node: Uuid,
    transport: Arc<dyn Transport>,
    self_tx: mpsc::UnboundedSender<NodeEvent>,
    source: Box<dyn DataSource>,
    sink: Box<dyn DataSink>,
    reducer: Box<dyn Reducer>,
    state: Option<RoundState>,
}

impl Worker {
    /// Create a worker. `self_tx` must be the sender side of the mailbox the
    /// worker is run with; it is used for self-redelivery.
    pub fn new(
        addr: SocketAddr,
        transport: Arc<dyn Transport>,
        self_tx: mpsc::UnboundedSender<NodeEvent>,
        source: Box<dyn DataSource>,
        sink: Box<dyn DataSink>,
    ) -> Self {
        Self {
            addr,
            node: Uuid::new_v4(),
            transport,
            self_tx,
            source,
            sink,
            reducer: Box::new(SumReducer),
            state: None,
        }
    }

    /// Replace the elementwise reduction strategy.
    pub fn with_reducer(mut self, reducer: Box<dyn Reducer>) -> Self {
        self.reducer = reducer;
        self
    }

    /// Stable node identity advertised at registration.
    pub fn node_id(&self) -> Uuid {
        self.node
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Dense worker id, once assigned by the master.
    pub fn worker_id(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.id)
    }

    /// Oldest round not yet completed, once initialized.
    pub fn round(&self) -> Option<i64> {
        self.state.as_ref().map(|s| s.round)
    }

    /// Announce this worker to the master.
    pub async fn register(&self, master: SocketAddr) -> Result<()> {
        info!(master = %master, addr = %self.addr, node = %self.node, "Registering with master");
        self.transport
            .send(
                master,
                Message::Register(Register {
                    node: self.node,
                    addr: self.addr,
                }),
            )
            .await
    }

    /// Run the event loop until the mailbox closes, Ctrl-C arrives, or a
    /// fatal protocol/configuration error surfaces.
    #[instrument(skip(self, mailbox), fields(addr = %self.addr))]
    pub async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<NodeEvent>) -> Result<()> {
        info!("Worker event loop started");

        loop {
            tokio::select! {
                event = mailbox.recv() => {
                    match event {
                        Some(event) => {
                            if let Err(e) = self.handle_event(event).await {
                                error!(error = %e, "Fatal error; stopping worker");
                                return Err(e);
                            }
                        }
                        None => {
                            warn!("Mailbox closed");
                            break;
                        }
                    }
                }

                _ = signal::ctrl_c() => {
                    info!("Received shutdown signal (Ctrl+C)");
                    break;
                }
            }
        }

        info!("Worker shut down");
        Ok(())
    }

    /// Handle one mailbox event. Errors are fatal; recoverable conditions
    /// are logged and absorbed inside the handlers.
    pub async fn handle_event(&mut self, event: NodeEvent) -> Result<()> {
        match event {
            NodeEvent::Message(message) => self.handle_message(message).await,
            NodeEvent::PeerGone(addr) => {
                // The group size is frozen at init; quorum arithmetic keeps
                // the full denominator and the catch-up path covers the
                // silent peer.
                warn!(peer = %addr, "Peer terminated; continuing with the fixed group");
                Ok(())
            }
        }
    }

    async fn handle_message(&mut self, message: Message) -> Result<()> {
        if let Message::InitWorkers(init) = message {
            return self.handle_init(init);
        }

        let Some(state) = self.state.as_mut() else {
            match &message {
                Message::StartAllreduce(_)
                | Message::ScatterBlock(_)
                | Message::ReduceBlock(_) => {
                    debug!(
                        message = message.name(),
                        "Not initialized yet; re-enqueueing"
                    );
                    let _ = self.self_tx.send(NodeEvent::Message(message));
                }
                other => {
                    warn!(message = other.name(), "Unexpected message on worker");
                }
            }
            return Ok(());
        };

        let mut ctx = WorkerCtx {
            transport: self.transport.as_ref(),
            source: self.source.as_mut(),
            sink: self.sink.as_mut(),
            reducer: self.reducer.as_ref(),
            inbox: &self.self_tx,
        };

        match message {
            Message::StartAllreduce(start) => state.handle_start(start.round, &mut ctx).await,
            Message::ScatterBlock(scatter) => state.handle_scatter(scatter, &mut ctx).await,
            Message::ReduceBlock(reduce) => state.handle_reduce(reduce, &mut ctx).await,
            other => {
                warn!(message = other.name(), "Unexpected message on worker");
                Ok(())
            }
        }
    }

    fn handle_init(&mut self, init: InitWorkers) -> Result<()> {
        if self.state.is_some() {
            warn!("Re-initialization received; resetting round state");
        }
        let state = RoundState::new(self.addr, init)?;
        info!(
            id = state.id,
            peers = state.peer_count(),
            data_size = state.data_size,
            max_chunk_size = state.max_chunk_size,
            max_lag = state.max_lag,
            "Worker initialized"
        );
        self.state = Some(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_partition_even() {
        // 4 elements over 2 peers: blocks of 2
        let step = 4usize.div_ceil(2);
        assert_eq!(block_range(4, step, 0), 0..2);
        assert_eq!(block_range(4, step, 1), 2..4);
    }

    #[test]
    fn test_block_partition_uneven() {
        // 5 elements over 2 peers: step ceil(5/2) = 3, blocks 3 and 2
        let step = 5usize.div_ceil(2);
        assert_eq!(block_range(5, step, 0), 0..3);
        assert_eq!(block_range(5, step, 1), 3..5);
    }

    #[test]
    fn test_block_partition_with_empty_tail() {
        // 2 elements over 3 peers: step 1, last block empty
        let step = 2usize.div_ceil(3);
        assert_eq!(block_range(2, step, 0), 0..1);
        assert_eq!(block_range(2, step, 1), 1..2);
        assert!(block_range(2, step, 2).is_empty());
    }

    #[test]
    fn test_blocks_partition_whole_vector() {
        for data_size in [1usize, 2, 5, 7, 10, 13] {
            for n in 1usize..=5 {
                let step = data_size.div_ceil(n);
                let total: usize = (0..n).map(|i| block_range(data_size, step, i).len()).sum();
                assert_eq!(total, data_size, "data_size={} n={}", data_size, n);
            }
        }
    }

    #[test]
    fn test_chunk_span_half_open() {
        // Block of 3, chunks of 2: spans [0,2) and [2,3), never clamped to
        // overlap
        assert_eq!(chunk_span(3, 2, 0), 0..2);
        assert_eq!(chunk_span(3, 2, 1), 2..3);
        assert!(chunk_span(3, 2, 2).is_empty());
        assert_eq!(chunks_in(3, 2), 2);
        assert_eq!(chunks_in(0, 2), 0);
    }

    #[test]
    fn test_sum_reducer_zero_fills_absent() {
        let reducer = SumReducer;
        let a = [1.0f32, 2.0];
        let b = [10.0f32, 20.0];
        assert_eq!(reducer.combine(2, &[&a, &b]), vec![11.0, 22.0]);
        // No contributions at all: the identity
        assert_eq!(reducer.combine(2, &[]), vec![0.0, 0.0]);
        // A short contribution only covers its prefix
        let short = [5.0f32];
        assert_eq!(reducer.combine(2, &[&a, &short]), vec![6.0, 2.0]);
    }
}
