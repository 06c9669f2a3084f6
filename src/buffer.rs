//! Chunked round buffer
//!
//! A ring of `depth` rows, one row per in-flight round, where each row holds
//! one slot per `(peer, chunk)` pair. Rows are addressed relative to a moving
//! `base_round`: logical round `r` maps to row `r - base_round`, valid only
//! while `0 <= r - base_round < depth`. Advancing the buffer evicts the
//! oldest row and appends a cleared one, which is how a worker tolerates
//! peers lagging by up to `depth - 1` rounds.
//!
//! Stores are idempotent on `(row, src, chunk)`: a re-delivered message
//! overwrites the slot values but never double-counts toward the quorum.

use std::collections::VecDeque;

/// Quorum size for a fractional threshold over `n` participants: at least
/// one, at most `n`.
pub fn quorum(threshold: f64, n: usize) -> usize {
    let q = (threshold * n as f64).ceil() as usize;
    q.clamp(1, n.max(1))
}

/// A stored chunk: the values as received plus the sender-reported number of
/// contributions folded into them (1 for raw scatters).
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub values: Vec<f32>,
    pub contributors: usize,
}

#[derive(Debug, Clone)]
struct Row {
    /// Slot index = src * num_chunks + chunk
    slots: Vec<Option<StoredChunk>>,
    /// Distinct-peer contribution count per chunk
    counts: Vec<usize>,
}

impl Row {
    fn empty(peer_size: usize, num_chunks: usize) -> Self {
        Self {
            slots: vec![None; peer_size * num_chunks],
            counts: vec![0; num_chunks],
        }
    }

    fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.counts.iter_mut().for_each(|c| *c = 0);
    }
}

/// Per-round, per-peer, per-chunk slot ring with fill counts and quorum
/// predicates. See the module docs for the addressing scheme.
#[derive(Debug, Clone)]
pub struct ChunkedRoundBuffer {
    block_size: usize,
    peer_size: usize,
    depth: usize,
    threshold: f64,
    max_chunk_size: usize,
    num_chunks: usize,
    /// Per-chunk number of peers that can ever contribute. Defaults to
    /// `peer_size`; shorter peer blocks have fewer chunks than the widest
    /// block, so their high chunk ids never arrive and the quorum must be
    /// clamped to the peers that actually own them.
    expected: Vec<usize>,
    base_round: i64,
    rows: VecDeque<Row>,
}

impl ChunkedRoundBuffer {
    pub fn new(
        block_size: usize,
        peer_size: usize,
        depth: usize,
        threshold: f64,
        max_chunk_size: usize,
    ) -> Self {
        debug_assert!(depth > 0, "buffer needs at least one row");
        debug_assert!(max_chunk_size > 0, "chunk size must be positive");
        let num_chunks = block_size.div_ceil(max_chunk_size);
        let rows = (0..depth)
            .map(|_| Row::empty(peer_size, num_chunks))
            .collect();
        Self {
            block_size,
            peer_size,
            depth,
            threshold,
            max_chunk_size,
            num_chunks,
            expected: vec![peer_size; num_chunks],
            base_round: 0,
            rows,
        }
    }

    /// Clamp each chunk's quorum to the number of peers that can ever send
    /// it. `expected` must have one entry per chunk.
    pub fn with_expected_contributors(mut self, expected: Vec<usize>) -> Self {
        debug_assert_eq!(expected.len(), self.num_chunks);
        self.expected = expected;
        self
    }

    pub fn base_round(&self) -> i64 {
        self.base_round
    }

    pub fn num_chunks(&self) -> usize {
        self.num_chunks
    }

    pub fn peer_size(&self) -> usize {
        self.peer_size
    }

    /// Row index for a logical round, if it falls inside the window.
    pub fn row_of(&self, round: i64) -> Option<usize> {
        let offset = round - self.base_round;
        if offset >= 0 && (offset as usize) < self.depth {
            Some(offset as usize)
        } else {
            None
        }
    }

    /// Actual length of chunk `chunk` within this buffer's block.
    pub fn chunk_len(&self, chunk: usize) -> usize {
        let start = chunk * self.max_chunk_size;
        let end = ((chunk + 1) * self.max_chunk_size).min(self.block_size);
        end.saturating_sub(start)
    }

    /// Store a chunk from `src`. Returns true if this `(row, src, chunk)`
    /// slot was previously empty; re-deliveries overwrite the slot but leave
    /// the count untouched.
    pub fn store(
        &mut self,
        row: usize,
        src: usize,
        chunk: usize,
        values: &[f32],
        contributors: usize,
    ) -> bool {
        debug_assert!(row < self.depth);
        debug_assert!(src < self.peer_size);
        debug_assert!(chunk < self.num_chunks);
        let slot_idx = src * self.num_chunks + chunk;
        let row = &mut self.rows[row];
        let first = row.slots[slot_idx].is_none();
        if first {
            row.counts[chunk] += 1;
        }
        row.slots[slot_idx] = Some(StoredChunk {
            values: values.to_vec(),
            contributors,
        });
        first
    }

    /// Number of distinct peers with a stored contribution for a chunk.
    pub fn count(&self, row: usize, chunk: usize) -> usize {
        self.rows[row].counts[chunk]
    }

    /// Whether a single chunk has reached its quorum.
    pub fn meets_threshold(&self, row: usize, chunk: usize) -> bool {
        let q = quorum(self.threshold, self.peer_size).min(self.expected[chunk].max(1));
        self.count(row, chunk) >= q
    }

    /// Whether every chunk in a row has reached its quorum.
    pub fn row_meets_threshold(&self, row: usize) -> bool {
        (0..self.num_chunks).all(|chunk| self.meets_threshold(row, chunk))
    }

    /// The stored chunk for `(row, src, chunk)`, if any.
    pub fn slot(&self, row: usize, src: usize, chunk: usize) -> Option<&StoredChunk> {
        self.rows[row].slots[src * self.num_chunks + chunk].as_ref()
    }

    /// All stored contributions for a chunk, in peer order. Absent peers are
    /// skipped; they contribute zero to any elementwise reduction.
    pub fn slots_for_chunk(
        &self,
        row: usize,
        chunk: usize,
    ) -> impl Iterator<Item = &StoredChunk> {
        let num_chunks = self.num_chunks;
        self.rows[row]
            .slots
            .iter()
            .skip(chunk)
            .step_by(num_chunks.max(1))
            .filter_map(|s| s.as_ref())
    }

    /// Evict the oldest row, append a cleared row, and move the temporal
    /// origin forward by one round.
    pub fn advance(&mut self) {
        if let Some(mut row) = self.rows.pop_front() {
            row.clear();
            self.rows.push_back(row);
        }
        self.base_round += 1;
    }
}
