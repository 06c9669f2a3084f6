// TCP transport: length-prefixed CBOR frames, one outbound writer per peer

use super::{NodeEvent, Transport};
use crate::errors::{NodeError, Result};
use crate::protocol::codec;
use crate::protocol::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// On-wire envelope. Inbound connections arrive from ephemeral ports, so
/// every frame carries the sender's listen address; that is the identity
/// peers are addressed by and the one reported in `PeerGone`.
#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    from: SocketAddr,
    message: Message,
}

/// Peer-addressable message delivery over TCP.
///
/// Inbound frames are forwarded to the node mailbox. Outbound messages are
/// queued to a per-peer writer task; a failed write tears the writer down
/// and surfaces the peer as gone.
pub struct TcpTransport {
    local_addr: SocketAddr,
    inbox: mpsc::UnboundedSender<NodeEvent>,
    outbound: Mutex<HashMap<SocketAddr, mpsc::UnboundedSender<Message>>>,
}

impl TcpTransport {
    /// Bind a listener on `addr` and start accepting peer connections.
    /// Inbound events are delivered to `inbox`.
    pub async fn bind(
        addr: SocketAddr,
        inbox: mpsc::UnboundedSender<NodeEvent>,
    ) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let transport = Arc::new(Self {
            local_addr,
            inbox: inbox.clone(),
            outbound: Mutex::new(HashMap::new()),
        });

        tokio::spawn(accept_loop(listener, inbox));

        debug!(addr = %local_addr, "transport listening");
        Ok(transport)
    }

    /// Look up or establish the writer for a peer.
    async fn writer_for(&self, to: SocketAddr) -> Result<mpsc::UnboundedSender<Message>> {
        let mut outbound = self.outbound.lock().await;
        if let Some(tx) = outbound.get(&to) {
            return Ok(tx.clone());
        }

        let stream = TcpStream::connect(to)
            .await
            .map_err(|e| NodeError::Transport(format!("connect to {} failed: {}", to, e)))?;

        let (tx, rx) = mpsc::unbounded_channel();
        outbound.insert(to, tx.clone());
        tokio::spawn(write_loop(
            stream,
            rx,
            self.local_addr,
            to,
            self.inbox.clone(),
        ));
        Ok(tx)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn send(&self, to: SocketAddr, message: Message) -> Result<()> {
        // Self-sends bypass the network and land at the back of the mailbox
        if to == self.local_addr {
            return self
                .inbox
                .send(NodeEvent::Message(message))
                .map_err(|_| NodeError::Transport("own mailbox closed".to_string()));
        }

        let tx = self.writer_for(to).await?;
        match tx.send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendError(message)) => {
                // Writer task ended since we looked it up; retry on a fresh
                // connection once
                self.outbound.lock().await.remove(&to);
                let tx = self.writer_for(to).await?;
                tx.send(message)
                    .map_err(|_| NodeError::Transport(format!("writer for {} closed", to)))
            }
        }
    }

    async fn probe(&self, addr: SocketAddr) -> Result<()> {
        TcpStream::connect(addr)
            .await
            .map(|_| ())
            .map_err(|e| NodeError::Transport(format!("probe of {} failed: {}", addr, e)))
    }
}

async fn accept_loop(listener: TcpListener, inbox: mpsc::UnboundedSender<NodeEvent>) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                tokio::spawn(read_loop(stream, remote, inbox.clone()));
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    }
}

async fn read_loop(
    mut stream: TcpStream,
    remote: SocketAddr,
    inbox: mpsc::UnboundedSender<NodeEvent>,
) {
    // Learned from the first frame; the connection's remote port is ephemeral
    let mut advertised: Option<SocketAddr> = None;

    loop {
        match codec::read_frame::<_, Frame>(&mut stream).await {
            Ok(frame) => {
                advertised = Some(frame.from);
                if inbox.send(NodeEvent::Message(frame.message)).is_err() {
                    // Node shut down; stop reading
                    return;
                }
            }
            Err(e) => {
                if e.kind() != std::io::ErrorKind::UnexpectedEof {
                    warn!(remote = %remote, error = %e, "connection read failed");
                }
                break;
            }
        }
    }

    if let Some(peer) = advertised {
        debug!(peer = %peer, "peer connection closed");
        let _ = inbox.send(NodeEvent::PeerGone(peer));
    }
}

async fn write_loop(
    mut stream: TcpStream,
    mut queue: mpsc::UnboundedReceiver<Message>,
    from: SocketAddr,
    to: SocketAddr,
    inbox: mpsc::UnboundedSender<NodeEvent>,
) {
    while let Some(message) = queue.recv().await {
        let frame = Frame { from, message };
        if let Err(e) = codec::write_frame(&mut stream, &frame).await {
            warn!(peer = %to, error = %e, "write to peer failed");
            let _ = inbox.send(NodeEvent::PeerGone(to));
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StartAllreduce;

    fn any_addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = TcpTransport::bind(any_addr(), tx_a).await.unwrap();
        let b = TcpTransport::bind(any_addr(), tx_b).await.unwrap();

        a.send(
            b.local_addr(),
            Message::StartAllreduce(StartAllreduce { round: 9 }),
        )
        .await
        .unwrap();

        match rx_b.recv().await.unwrap() {
            NodeEvent::Message(Message::StartAllreduce(s)) => assert_eq!(s.round, 9),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_self_send_short_circuits() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let a = TcpTransport::bind(any_addr(), tx).await.unwrap();

        a.send(
            a.local_addr(),
            Message::StartAllreduce(StartAllreduce { round: 1 }),
        )
        .await
        .unwrap();

        match rx.recv().await.unwrap() {
            NodeEvent::Message(Message::StartAllreduce(s)) => assert_eq!(s.round, 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_peer_gone_on_disconnect() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let a = TcpTransport::bind(any_addr(), tx).await.unwrap();

        // Raw peer: send one frame, then hang up
        let peer_listen = SocketAddr::from(([127, 0, 0, 1], 45551));
        {
            let mut stream = TcpStream::connect(a.local_addr()).await.unwrap();
            let frame = Frame {
                from: peer_listen,
                message: Message::StartAllreduce(StartAllreduce { round: 0 }),
            };
            codec::write_frame(&mut stream, &frame).await.unwrap();
        }

        match rx.recv().await.unwrap() {
            NodeEvent::Message(Message::StartAllreduce(_)) => {}
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            NodeEvent::PeerGone(gone) => assert_eq!(gone, peer_listen),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_probe() {
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        let a = TcpTransport::bind(any_addr(), tx_a).await.unwrap();
        let b = TcpTransport::bind(any_addr(), tx_b).await.unwrap();

        assert!(a.probe(b.local_addr()).await.is_ok());

        // Nothing listens on this port
        let dead = SocketAddr::from(([127, 0, 0, 1], 1));
        assert!(a.probe(dead).await.is_err());
    }
}
