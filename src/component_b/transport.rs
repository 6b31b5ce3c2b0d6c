//! transport.rs
//! Network sink seen by the transmitter: `connect()` once per cycle, `send()`
//! any number of buffers, close on drop.
//!
//! - `TcpTransport`: stream socket with bounded connect and write times
//! - `MemoryTransport`: keeps every sent buffer; failures can be injected

use std::{
    io::{self, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    sync::Arc,
    time::{Duration, Instant},
};

use log::debug;
use parking_lot::Mutex;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::{
    config::TransportConfig,
    error::{TransportError, UplinkError, UplinkResult},
};

pub trait Transport: Send {
    type Connection: Connection;

    fn connect(&mut self) -> Result<Self::Connection, TransportError>;
}

pub trait Connection {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

#[derive(Debug, Clone)]
pub struct TcpTransport {
    addr: SocketAddr,
    connect_timeout: Duration,
    send_timeout: Duration,
}

impl TcpTransport {
    pub fn new(addr: SocketAddr, connect_timeout: Duration, send_timeout: Duration) -> Self {
        Self {
            addr,
            connect_timeout,
            send_timeout,
        }
    }

    /// Resolves `config.address` once, at startup.
    pub fn from_config(config: &TransportConfig) -> UplinkResult<Self> {
        let addr = config
            .address
            .to_socket_addrs()
            .map_err(|e| {
                UplinkError::Config(format!("transport.address '{}': {}", config.address, e))
            })?
            .next()
            .ok_or_else(|| {
                UplinkError::Config(format!("transport.address '{}' did not resolve", config.address))
            })?;
        Ok(Self::new(addr, config.connect_timeout(), config.send_timeout()))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;

    fn connect(&mut self) -> Result<TcpConnection, TransportError> {
        let connect_err = |source| TransportError::Connect {
            endpoint: self.addr.to_string(),
            source,
        };

        let socket = Socket::new(Domain::for_address(self.addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(connect_err)?;
        socket
            .connect_timeout(&SockAddr::from(self.addr), self.connect_timeout)
            .map_err(|e| match e.kind() {
                io::ErrorKind::TimedOut => TransportError::Timeout {
                    op: "connect",
                    after: self.connect_timeout,
                },
                _ => connect_err(e),
            })?;
        socket
            .set_write_timeout(Some(self.send_timeout))
            .map_err(connect_err)?;
        socket.set_nodelay(true).map_err(connect_err)?;

        debug!("[Transport] connected to {}", self.addr);
        Ok(TcpConnection {
            stream: TcpStream::from(socket),
            send_timeout: self.send_timeout,
        })
    }
}

pub struct TcpConnection {
    stream: TcpStream,
    send_timeout: Duration,
}

impl Connection for TcpConnection {
    /// `send_timeout` bounds the whole buffer, not each write: the socket
    /// write timeout is shrunk to what is left of the deadline before every
    /// partial write.
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let timeout = TransportError::Timeout {
            op: "send",
            after: self.send_timeout,
        };
        let deadline = Instant::now() + self.send_timeout;
        let mut rest = bytes;

        while !rest.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timeout);
            }
            self.stream
                .set_write_timeout(Some(remaining))
                .map_err(TransportError::Send)?;
            match self.stream.write(rest) {
                Ok(0) => {
                    return Err(TransportError::Send(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "peer stopped accepting bytes",
                    )));
                }
                Ok(n) => rest = &rest[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(TransportError::from_io("send", self.send_timeout, e)),
            }
        }
        self.stream.flush().map_err(TransportError::Send)
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    sends: Vec<Vec<u8>>,
    connects: usize,
    fail_connects: usize,
    fail_sends: usize,
}

/// In-process sink. Clones share the same record of sends.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` connect attempts fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.state.lock().fail_connects = n;
    }

    /// The next `n` sends fail.
    pub fn fail_next_sends(&self, n: usize) {
        self.state.lock().fail_sends = n;
    }

    pub fn sends(&self) -> Vec<Vec<u8>> {
        self.state.lock().sends.clone()
    }

    pub fn send_count(&self) -> usize {
        self.state.lock().sends.len()
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().connects
    }

    /// Every byte received, in order, across all sends.
    pub fn received(&self) -> Vec<u8> {
        self.state.lock().sends.concat()
    }
}

impl Transport for MemoryTransport {
    type Connection = MemoryConnection;

    fn connect(&mut self) -> Result<MemoryConnection, TransportError> {
        let mut state = self.state.lock();
        state.connects += 1;
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(TransportError::Rejected("connect refused".into()));
        }
        Ok(MemoryConnection {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
}

impl Connection for MemoryConnection {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.fail_sends > 0 {
            state.fail_sends -= 1;
            return Err(TransportError::Rejected("send refused".into()));
        }
        state.sends.push(bytes.to_vec());
        Ok(())
    }
}
