// In-memory transport for deterministic multi-node tests

use super::{NodeEvent, Transport};
use crate::errors::{NodeError, Result};
use crate::protocol::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Shared address -> mailbox registry. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    nodes: Arc<Mutex<HashMap<SocketAddr, mpsc::UnboundedSender<NodeEvent>>>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node's mailbox under `addr` and hand back its transport.
    pub fn attach(
        &self,
        addr: SocketAddr,
        mailbox: mpsc::UnboundedSender<NodeEvent>,
    ) -> LocalTransport {
        self.nodes
            .lock()
            .expect("local network registry poisoned")
            .insert(addr, mailbox);
        LocalTransport {
            addr,
            net: self.clone(),
        }
    }

    /// Remove a node and notify every remaining node that it is gone.
    pub fn disconnect(&self, addr: SocketAddr) {
        let remaining: Vec<_> = {
            let mut nodes = self
                .nodes
                .lock()
                .expect("local network registry poisoned");
            nodes.remove(&addr);
            nodes.values().cloned().collect()
        };
        for tx in remaining {
            let _ = tx.send(NodeEvent::PeerGone(addr));
        }
    }

    fn mailbox_of(&self, addr: SocketAddr) -> Option<mpsc::UnboundedSender<NodeEvent>> {
        self.nodes
            .lock()
            .expect("local network registry poisoned")
            .get(&addr)
            .cloned()
    }
}

/// Per-node handle into a [`LocalNetwork`].
#[derive(Clone)]
pub struct LocalTransport {
    addr: SocketAddr,
    net: LocalNetwork,
}

#[async_trait]
impl Transport for LocalTransport {
    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn send(&self, to: SocketAddr, message: Message) -> Result<()> {
        let tx = self
            .net
            .mailbox_of(to)
            .ok_or_else(|| NodeError::Transport(format!("no node at {}", to)))?;
        tx.send(NodeEvent::Message(message))
            .map_err(|_| NodeError::Transport(format!("mailbox of {} closed", to)))
    }

    async fn probe(&self, addr: SocketAddr) -> Result<()> {
        if self.net.mailbox_of(addr).is_some() {
            Ok(())
        } else {
            Err(NodeError::Transport(format!("no node at {}", addr)))
        }
    }
}
