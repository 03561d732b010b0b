use crate::net::address::Address;
use mio::net::UdpSocket;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};

static SOCKETS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Marks process-wide socket state as ready. The host program calls this
/// once at startup; components never initialize the socket layer themselves.
pub fn init_sockets() -> bool {
    SOCKETS_INITIALIZED.store(true, Ordering::SeqCst);
    true
}

pub fn shutdown_sockets() {
    SOCKETS_INITIALIZED.store(false, Ordering::SeqCst);
}

#[inline]
pub fn sockets_initialized() -> bool {
    SOCKETS_INITIALIZED.load(Ordering::SeqCst)
}

/// Non-blocking datagram socket bound to a local port.
pub struct Socket {
    socket: UdpSocket,
}

impl Socket {
    pub fn bind(port: u16) -> io::Result<Socket> {
        assert!(
            sockets_initialized(),
            "init_sockets must be called before binding"
        );
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        Ok(Socket {
            socket: UdpSocket::bind(addr)?,
        })
    }

    /// Fire-and-forget send. A false return means the datagram never left
    /// this host; callers treat it exactly like a lost packet.
    pub fn send(&self, to: Address, data: &[u8]) -> bool {
        if data.is_empty() {
            return false;
        }
        match self.socket.send_to(data, to.to_socket_addr()) {
            Ok(sent) => sent == data.len(),
            Err(_) => false,
        }
    }

    /// Receives a single pending datagram, if any.
    pub fn receive(&self, buffer: &mut [u8]) -> Option<(Address, usize)> {
        match self.socket.recv_from(buffer) {
            Ok((size, from)) => Some((Address::from(from), size)),
            // ICMP rejections surface as errors here; the protocol treats
            // them the same as silence
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_roundtrip() {
        init_sockets();

        let a = Socket::bind(40900).unwrap();
        let b = Socket::bind(40901).unwrap();

        assert!(a.send(Address::localhost(40901), b"over the loopback"));

        let mut buffer = [0u8; 64];
        let mut received = None;
        for _ in 0..1000 {
            if let Some(packet) = b.receive(&mut buffer) {
                received = Some(packet);
                break;
            }
            std::thread::yield_now();
        }

        let (from, size) = received.expect("datagram never arrived");
        assert_eq!(from.ip(), [127, 0, 0, 1]);
        assert_eq!(&buffer[..size], b"over the loopback");
    }

    #[test]
    fn test_receive_empty() {
        init_sockets();

        let socket = Socket::bind(40902).unwrap();
        let mut buffer = [0u8; 64];
        assert!(socket.receive(&mut buffer).is_none());
    }
}
