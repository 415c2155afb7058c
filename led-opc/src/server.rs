//! OPC server
//!
//! Accepts any number of producers and publishes their messages on one
//! inbound queue. Each connection is read on its own thread; a framing error
//! ends that connection only. Failing to listen or accept is fatal.

use crate::error::{OpcError, OpcResult};
use crate::wire::{read_message, OpcMessage, DEFAULT_PORT};
use crossbeam::channel::{self, Receiver, Sender};
use std::io::BufReader;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

/// Capacity of the inbound message queue created by [`launch`]
pub const INBOUND_QUEUE_DEPTH: usize = 16;

/// Listen on all interfaces, default OPC port
pub fn default_listen_addr() -> String {
    format!("0.0.0.0:{}", DEFAULT_PORT)
}

pub struct OpcServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl OpcServer {
    pub fn bind(addr: &str) -> OpcResult<Self> {
        let bind_err = |source| OpcError::Bind {
            addr: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        Ok(Self { listener, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the accept loop on a background thread
    pub fn spawn(self, inbound: Sender<OpcMessage>) -> OpcResult<JoinHandle<OpcResult<()>>> {
        let handle = thread::Builder::new()
            .name("led-opc-server".to_string())
            .spawn(move || self.run(inbound))?;
        Ok(handle)
    }

    /// Accept connections forever. Only returns on an accept failure.
    pub fn run(self, inbound: Sender<OpcMessage>) -> OpcResult<()> {
        log::info!("[opc-server] listening on {}", self.local_addr);

        for stream in self.listener.incoming() {
            let stream = stream.map_err(OpcError::Accept)?;
            let peer = match stream.peer_addr() {
                Ok(peer) => peer,
                Err(e) => {
                    log::warn!("[opc-server] dropping connection without peer address: {}", e);
                    continue;
                }
            };
            log::info!("[opc-server] connection from {}", peer);

            let tx = inbound.clone();
            let spawned = thread::Builder::new()
                .name(format!("led-opc-conn-{}", peer))
                .spawn(move || supervise_connection(peer, stream, tx));
            if let Err(e) = spawned {
                log::error!("[opc-server] could not start reader for {}: {}", peer, e);
            }
        }

        Ok(())
    }
}

/// Bind `addr` and start serving into a fresh inbound queue
pub fn launch(addr: &str) -> OpcResult<(Receiver<OpcMessage>, JoinHandle<OpcResult<()>>)> {
    let server = OpcServer::bind(addr)?;
    let (tx, rx) = channel::bounded(INBOUND_QUEUE_DEPTH);
    let handle = server.spawn(tx)?;
    Ok((rx, handle))
}

/// Read one connection to the end and log how it finished
fn supervise_connection(peer: SocketAddr, stream: TcpStream, inbound: Sender<OpcMessage>) {
    match handle_connection(stream, &inbound) {
        Ok(messages) => {
            log::info!("[opc-server] {} closed after {} messages", peer, messages);
        }
        Err(e) if e.is_protocol_violation() => {
            let e = OpcError::Connection {
                peer,
                source: Box::new(e),
            };
            log::error!("[opc-server] protocol violation, dropping connection: {}", e);
        }
        Err(e) => {
            log::warn!("[opc-server] {} read error: {}", peer, e);
        }
    }
}

/// Publish every message on `stream` until it closes. Returns the message count.
pub fn handle_connection(stream: TcpStream, inbound: &Sender<OpcMessage>) -> OpcResult<u64> {
    let mut reader = BufReader::new(stream);
    let mut messages = 0u64;

    while let Some(msg) = read_message(&mut reader)? {
        log::trace!(
            "[opc-server] channel {} command {} ({} bytes)",
            msg.channel,
            msg.command,
            msg.payload.len()
        );
        if inbound.send(msg).is_err() {
            log::debug!("[opc-server] inbound queue closed, dropping connection");
            break;
        }
        messages += 1;
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{OpcClientSink, RetryPolicy, TcpConnector};
    use std::io::Write;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn local_server() -> (SocketAddr, Receiver<OpcMessage>) {
        let server = OpcServer::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr();
        let (tx, rx) = channel::bounded(INBOUND_QUEUE_DEPTH);
        server.spawn(tx).unwrap();
        (addr, rx)
    }

    fn message(channel: u8, payload: Vec<u8>) -> OpcMessage {
        OpcMessage {
            channel,
            command: 0,
            payload,
        }
    }

    #[test]
    fn test_bind_failure_is_reported() {
        assert!(matches!(OpcServer::bind("not-an-address"), Err(OpcError::Bind { .. })));
    }

    #[test]
    fn test_default_listen_addr() {
        assert_eq!(default_listen_addr(), "0.0.0.0:7890");
    }

    #[test]
    fn test_messages_published_in_order() {
        let (addr, inbound) = local_server();
        let mut conn = TcpStream::connect(addr).unwrap();

        let first = message(0, vec![1, 2, 3]);
        let second = message(4, vec![9; 512]);
        conn.write_all(&first.encode().unwrap()).unwrap();
        conn.write_all(&second.encode().unwrap()).unwrap();

        assert_eq!(inbound.recv_timeout(WAIT).unwrap(), first);
        assert_eq!(inbound.recv_timeout(WAIT).unwrap(), second);
    }

    #[test]
    fn test_malformed_connection_is_isolated() {
        let (addr, inbound) = local_server();

        let mut good = TcpStream::connect(addr).unwrap();
        good.write_all(&message(1, vec![1; 6]).encode().unwrap()).unwrap();
        assert_eq!(inbound.recv_timeout(WAIT).unwrap(), message(1, vec![1; 6]));

        // Declares 10 bytes, sends 5, hangs up
        let mut bad = TcpStream::connect(addr).unwrap();
        bad.write_all(&[2, 0, 0, 10, 5, 5, 5, 5, 5]).unwrap();
        drop(bad);

        good.write_all(&message(1, vec![2; 6]).encode().unwrap()).unwrap();
        assert_eq!(inbound.recv_timeout(WAIT).unwrap(), message(1, vec![2; 6]));

        // New connections are still accepted
        let mut late = TcpStream::connect(addr).unwrap();
        late.write_all(&message(3, vec![3; 3]).encode().unwrap()).unwrap();
        assert_eq!(inbound.recv_timeout(WAIT).unwrap(), message(3, vec![3; 3]));

        assert!(inbound.try_recv().is_err(), "malformed connection published nothing");
    }

    #[test]
    fn test_client_sink_reaches_server() {
        let (addr, inbound) = local_server();
        let connector = TcpConnector::new(addr.to_string()).with_timeout(Some(WAIT));
        let mut sink = OpcClientSink::new(connector, RetryPolicy::default());

        let frame = vec![10, 20, 30, 40, 50, 60];
        assert!(sink.send_frame(&frame).is_delivered());
        assert!(sink.send_frame(&frame).is_delivered());

        for _ in 0..2 {
            assert_eq!(inbound.recv_timeout(WAIT).unwrap(), message(0, frame.clone()));
        }
        assert_eq!(sink.stats().connects(), 1);
    }

    #[test]
    fn test_handle_connection_counts_messages() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let writer = thread::spawn(move || {
            let mut conn = TcpStream::connect(addr).unwrap();
            for i in 0..3u8 {
                conn.write_all(&message(i, vec![i; 3]).encode().unwrap()).unwrap();
            }
        });

        let (stream, _) = listener.accept().unwrap();
        let (tx, rx) = channel::unbounded();
        writer.join().unwrap();

        assert_eq!(handle_connection(stream, &tx).unwrap(), 3);
        assert_eq!(rx.try_iter().count(), 3);
    }
}
