//! Master node
//!
//! The master is the thin end of the protocol: it collects worker
//! registrations, assigns dense integer ids, pushes the group configuration
//! once the membership quorum is reached, and advances the global round
//! whenever enough workers report completion. It never touches block data
//! and never retries per-chunk delivery; if too few workers complete a
//! round, the round simply stalls.

use crate::buffer::quorum;
use crate::config::MasterConfig;
use crate::errors::Result;
use crate::protocol::{
    CompleteAllreduce, InitWorkers, Message, Register, StartAllreduce,
};
use crate::transport::{NodeEvent, Transport};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// How long a registration may wait for the worker's address to prove
/// reachable before the registration is discarded.
const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Round-pacing coordinator for one all-reduce group.
pub struct Master {
    addr: SocketAddr,
    transport: Arc<dyn Transport>,
    config: MasterConfig,
    /// Dense worker id -> address, in registration order
    workers: BTreeMap<usize, SocketAddr>,
    /// Ids are never re-packed after removals
    next_id: usize,
    /// -1 until the group is initialized
    round: i64,
    /// Completions reported for the current round
    num_complete: usize,
}

impl Master {
    pub fn new(addr: SocketAddr, transport: Arc<dyn Transport>, config: MasterConfig) -> Self {
        Self {
            addr,
            transport,
            config,
            workers: BTreeMap::new(),
            next_id: 0,
            round: -1,
            num_complete: 0,
        }
    }

    /// Current round; -1 until the group is initialized.
    pub fn round(&self) -> i64 {
        self.round
    }

    /// Number of registered workers.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Run the event loop until the mailbox closes or Ctrl-C arrives.
    #[instrument(skip(self, mailbox), fields(addr = %self.addr))]
    pub async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<NodeEvent>) -> Result<()> {
        info!(
            total_workers = self.config.total_workers,
            data_size = self.config.data_size,
            max_round = self.config.max_round,
            "Master event loop started"
        );

        loop {
            tokio::select! {
                event = mailbox.recv() => {
                    match event {
                        Some(event) => {
                            if let Err(e) = self.handle_event(event).await {
                                error!(error = %e, "Fatal error; stopping master");
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

        info!("Master shut down");
        Ok(())
    }

    /// Handle one mailbox event.
    pub async fn handle_event(&mut self, event: NodeEvent) -> Result<()> {
        match event {
            NodeEvent::Message(Message::Register(reg)) => self.handle_register(reg).await,
            NodeEvent::Message(Message::CompleteAllreduce(complete)) => {
                self.handle_complete(complete).await;
                Ok(())
            }
            NodeEvent::Message(other) => {
                warn!(message = other.name(), "Unexpected message on master");
                Ok(())
            }
            NodeEvent::PeerGone(addr) => {
                self.handle_peer_gone(addr);
                Ok(())
            }
        }
    }

    async fn handle_register(&mut self, reg: Register) -> Result<()> {
        if self.workers.values().any(|a| *a == reg.addr) {
            debug!(addr = %reg.addr, "Duplicate registration; ignoring");
            return Ok(());
        }

        // Admit only workers whose advertised address answers
        match tokio::time::timeout(REGISTRATION_TIMEOUT, self.transport.probe(reg.addr)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(addr = %reg.addr, error = %e, "Registration address unreachable; discarding");
                return Ok(());
            }
            Err(_) => {
                warn!(addr = %reg.addr, "Registration address resolution timed out; discarding");
                return Ok(());
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.workers.insert(id, reg.addr);
        info!(
            id,
            addr = %reg.addr,
            node = %reg.node,
            registered = self.workers.len(),
            total = self.config.total_workers,
            "Worker registered"
        );

        self.maybe_init_group().await;
        Ok(())
    }

    /// Initialize the group once the membership quorum is reached.
    async fn maybe_init_group(&mut self) {
        let needed = quorum(self.config.th_allreduce, self.config.total_workers);
        if self.round != -1 || self.workers.len() < needed {
            return;
        }

        info!(
            workers = self.workers.len(),
            quorum = needed,
            "Membership quorum reached; initializing workers"
        );

        for (&id, &addr) in &self.workers {
            let init = InitWorkers {
                peers: self.workers.clone(),
                master: self.addr,
                dest_id: id,
                th_reduce: self.config.th_reduce,
                th_complete: self.config.th_complete,
                max_lag: self.config.max_lag,
                data_size: self.config.data_size,
                max_chunk_size: self.config.max_chunk_size,
            };
            self.send(addr, Message::InitWorkers(init)).await;
        }

        self.round = 0;
        self.broadcast_start().await;
    }

    async fn handle_complete(&mut self, complete: CompleteAllreduce) {
        if complete.round != self.round {
            debug!(
                round = complete.round,
                src = complete.src_id,
                current = self.round,
                "Stale completion; ignoring"
            );
            return;
        }

        self.num_complete += 1;
        let needed = quorum(self.config.th_allreduce, self.config.total_workers);
        debug!(
            round = self.round,
            src = complete.src_id,
            complete = self.num_complete,
            quorum = needed,
            "Completion reported"
        );

        if self.num_complete < needed {
            return;
        }
        if self.round >= self.config.max_round {
            info!(round = self.round, "Final round complete; no further rounds");
            return;
        }

        self.round += 1;
        self.num_complete = 0;
        info!(round = self.round, "Completion quorum reached; advancing");
        self.broadcast_start().await;
    }

    fn handle_peer_gone(&mut self, addr: SocketAddr) {
        let before = self.workers.len();
        self.workers.retain(|_, a| *a != addr);
        if self.workers.len() < before {
            // Ids are not re-packed; the hole just reduces participation
            warn!(
                addr = %addr,
                remaining = self.workers.len(),
                "Worker terminated; removed from the group"
            );
        }
    }

    async fn broadcast_start(&self) {
        info!(round = self.round, workers = self.workers.len(), "Starting round");
        for &addr in self.workers.values() {
            self.send(
                addr,
                Message::StartAllreduce(StartAllreduce { round: self.round }),
            )
            .await;
        }
    }

    /// Best-effort send; the master never retries.
    async fn send(&self, to: SocketAddr, message: Message) {
        if let Err(e) = self.transport.send(to, message).await {
            warn!(peer = %to, error = %e, "Send failed");
        }
    }
}
