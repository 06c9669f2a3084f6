//! Transport layer
//!
//! A node (worker or master) owns a single mailbox of [`NodeEvent`]s and a
//! [`Transport`] handle for addressable sends. Two implementations ship:
//! [`TcpTransport`] frames messages over TCP for deployment, and
//! [`LocalNetwork`] routes them in-memory for deterministic tests.
//!
//! Sends addressed to the local node short-circuit straight into the own
//! mailbox, which is also how self-redelivery works: a re-enqueued message
//! lands at the back of the queue, behind everything that arrived before it.

mod local;
mod tcp;

pub use local::{LocalNetwork, LocalTransport};
pub use tcp::TcpTransport;

use crate::errors::Result;
use crate::protocol::Message;
use async_trait::async_trait;
use std::net::SocketAddr;

/// Events delivered to a node's mailbox.
#[derive(Debug)]
pub enum NodeEvent {
    /// A protocol message, from the wire or re-enqueued by the node itself
    Message(Message),

    /// The transport observed a peer going away
    PeerGone(SocketAddr),
}

/// Addressable delivery of typed messages to peers.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Address this node receives on; peers address it by this value.
    fn local_addr(&self) -> SocketAddr;

    /// Send a message to a peer. Delivery is at-least-once and unordered
    /// across pairs; callers must tolerate loss, duplication and reordering.
    async fn send(&self, to: SocketAddr, message: Message) -> Result<()>;

    /// Check that a peer address is reachable. Used by the master before
    /// admitting a registration.
    async fn probe(&self, addr: SocketAddr) -> Result<()>;
}
