use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::TransportError;

pub const DEFAULT_PORT: u16 = 3000;

/// Datagram send/receive capability injected into the engine.
///
/// `receive` never blocks: no data and read errors both come back as `None`.
pub trait Transport {
    fn receive(&mut self, buf: &mut [u8]) -> Option<usize>;
    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn receive(&mut self, buf: &mut [u8]) -> Option<usize> {
        (**self).receive(buf)
    }

    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        (**self).send(buf)
    }
}

/// Non-blocking UDP socket broadcasting every send to a fixed destination.
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    destination: SocketAddr,
}

impl UdpTransport {
    pub fn bind<A: ToSocketAddrs>(addr: A, destination: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        socket.set_broadcast(true)?;

        let local_addr = socket.local_addr()?;
        log::debug!("udp transport bound on {} sending to {}", local_addr, destination);

        Ok(Self {
            socket,
            local_addr,
            destination,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }
}

impl Transport for UdpTransport {
    fn receive(&mut self, buf: &mut [u8]) -> Option<usize> {
        match self.socket.recv_from(buf) {
            Ok((size, _)) => Some(size),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                log::trace!("udp receive failed: {}", e);
                None
            }
        }
    }

    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        let sent = self.socket.send_to(buf, self.destination)?;
        if sent < buf.len() {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {} of {} bytes", sent, buf.len()),
            )));
        }
        Ok(())
    }
}

type Queue = Arc<Mutex<VecDeque<Vec<u8>>>>;

/// In-process datagram queue. Each end reads what the other end sends.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    inbox: Queue,
    outbox: Queue,
}

impl MemoryTransport {
    pub fn pair() -> (Self, Self) {
        let a_to_b = Queue::default();
        let b_to_a = Queue::default();
        (
            Self {
                inbox: b_to_a.clone(),
                outbox: a_to_b.clone(),
            },
            Self {
                inbox: a_to_b,
                outbox: b_to_a,
            },
        )
    }

    /// Queues a datagram as if the peer had sent it.
    pub fn inject(&self, datagram: impl Into<Vec<u8>>) {
        self.inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(datagram.into());
    }

    pub fn pending(&self) -> usize {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Transport for MemoryTransport {
    fn receive(&mut self, buf: &mut [u8]) -> Option<usize> {
        let datagram = self
            .inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()?;
        // oversize datagrams are truncated, as a real socket would
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Some(len)
    }

    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(buf.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_pair_is_crossed() {
        let (mut a, mut b) = MemoryTransport::pair();
        a.send(&[1, 2, 3]).unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(a.receive(&mut buf), None);
        assert_eq!(b.receive(&mut buf), Some(3));
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(b.receive(&mut buf), None);
    }

    #[test]
    fn memory_receive_truncates() {
        let (mut a, mut b) = MemoryTransport::pair();
        b.send(&[7; 10]).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(a.receive(&mut buf), Some(4));
    }

    #[test]
    fn udp_loopback() {
        let mut rx = UdpTransport::bind("127.0.0.1:0", "127.0.0.1:9".parse().unwrap()).unwrap();
        let mut tx = UdpTransport::bind("127.0.0.1:0", rx.local_addr()).unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(rx.receive(&mut buf), None);

        tx.send(b"pdu").unwrap();
        let mut received = None;
        for _ in 0..200 {
            received = rx.receive(&mut buf);
            if received.is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(received, Some(3));
        assert_eq!(&buf[..3], b"pdu");
    }
}
