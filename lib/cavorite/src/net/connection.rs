use crate::net::address::Address;
use crate::net::error::Result;
use crate::net::socket::Socket;
use byteorder::{BigEndian, ByteOrder};
use flint::logging::{self, Logger};

/// Protocol id prefix on every datagram.
pub const HEADER_SIZE: usize = 4;

/// Largest datagram the transport will build or accept.
pub const MAX_PACKET_SIZE: usize = 2048;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Mode {
    None,
    Client,
    Server,
}

/// Session lifecycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum State {
    Disconnected,
    Listening,
    Connecting,
    ConnectFail,
    Connected,
}

/// Protocol-tagged datagram session. A listening endpoint latches the first
/// source that sends a valid-protocol packet; packets from any other source
/// are dropped until the session times out. Timeout is the only failure
/// surface once connected.
pub struct Connection {
    protocol_id: u32,
    timeout: f32,
    socket: Option<Socket>,
    mode: Mode,
    state: State,
    peer: Option<Address>,
    timeout_accumulator: f32,
    scratch: Vec<u8>,
    log: Logger,
}

impl Connection {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(
        protocol_id: u32,
        timeout: f32,
        log: L,
    ) -> Connection {
        let log = match log.into() {
            Some(log) => log.new(logging::o!()),
            None => Logger::root(logging::Discard, logging::o!()),
        };

        Connection {
            protocol_id,
            timeout,
            socket: None,
            mode: Mode::None,
            state: State::Disconnected,
            peer: None,
            timeout_accumulator: 0.0,
            scratch: vec![0; MAX_PACKET_SIZE],
            log,
        }
    }

    /// Binds the local port. The connection still needs `listen` or
    /// `connect` before it will exchange anything.
    pub fn start(&mut self, port: u16) -> Result<()> {
        assert!(self.socket.is_none(), "connection already started");
        self.socket = Some(Socket::bind(port)?);
        logging::debug!(self.log, "connection started"; "port" => port);
        Ok(())
    }

    pub fn stop(&mut self) {
        assert!(self.socket.is_some(), "connection not started");
        self.socket = None;
        self.clear();
        logging::debug!(self.log, "connection stopped");
    }

    fn clear(&mut self) {
        self.mode = Mode::None;
        self.state = State::Disconnected;
        self.peer = None;
        self.timeout_accumulator = 0.0;
    }

    /// Waits for the first peer to present the right protocol id.
    pub fn listen(&mut self) {
        logging::debug!(self.log, "listening");
        self.clear();
        self.mode = Mode::Server;
        self.state = State::Listening;
    }

    pub fn connect(&mut self, peer: Address) {
        logging::debug!(self.log, "connecting"; "peer" => %peer);
        self.clear();
        self.mode = Mode::Client;
        self.state = State::Connecting;
        self.peer = Some(peer);
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.socket.is_some()
    }

    #[inline]
    pub fn is_listening(&self) -> bool {
        self.state == State::Listening
    }

    #[inline]
    pub fn is_connecting(&self) -> bool {
        self.state == State::Connecting
    }

    #[inline]
    pub fn connect_failed(&self) -> bool {
        self.state == State::ConnectFail
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state == State::Connected
    }

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    #[inline]
    pub fn peer(&self) -> Option<Address> {
        self.peer
    }

    /// Advances the timeout clock.
    pub fn update(&mut self, dt: f32) {
        assert!(self.socket.is_some(), "update on a stopped connection");
        self.timeout_accumulator += dt;
        if self.timeout_accumulator <= self.timeout {
            return;
        }
        match self.state {
            State::Connecting => {
                logging::debug!(self.log, "connect timed out");
                self.clear();
                self.state = State::ConnectFail;
            }
            State::Connected => {
                logging::debug!(self.log, "connection timed out");
                let mode = self.mode;
                self.clear();
                if mode == Mode::Server {
                    // a server endpoint goes back to listening for the next peer
                    self.mode = Mode::Server;
                    self.state = State::Listening;
                }
            }
            _ => {}
        }
    }

    /// Sends one payload to the peer, prefixed with the protocol id. False
    /// when there is no one to send to.
    pub fn send_packet(&mut self, data: &[u8]) -> bool {
        let socket = match self.socket.as_ref() {
            Some(socket) => socket,
            None => return false,
        };
        let peer = match self.peer {
            Some(peer) => peer,
            None => return false,
        };
        let size = HEADER_SIZE + data.len();
        assert!(size <= MAX_PACKET_SIZE, "payload too large");
        BigEndian::write_u32(&mut self.scratch[..4], self.protocol_id);
        self.scratch[HEADER_SIZE..size].copy_from_slice(data);
        socket.send(peer, &self.scratch[..size])
    }

    /// Receives one datagram, stripping the protocol id. `None` when nothing
    /// valid is pending.
    pub fn receive_packet(&mut self, data: &mut [u8]) -> Option<usize> {
        let (from, size) = {
            let socket = self.socket.as_ref()?;
            socket.receive(&mut self.scratch)?
        };
        if size <= HEADER_SIZE {
            return None;
        }
        if BigEndian::read_u32(&self.scratch[..4]) != self.protocol_id {
            return None;
        }

        match self.state {
            State::Listening => {
                logging::debug!(self.log, "server accepts connection"; "peer" => %from);
                self.state = State::Connected;
                self.peer = Some(from);
            }
            _ if self.peer != Some(from) => return None,
            State::Connecting => {
                logging::debug!(self.log, "client completes connection"; "peer" => %from);
                self.state = State::Connected;
            }
            _ => {}
        }

        self.timeout_accumulator = 0.0;
        let payload = (size - HEADER_SIZE).min(data.len());
        data[..payload].copy_from_slice(&self.scratch[HEADER_SIZE..HEADER_SIZE + payload]);
        Some(payload)
    }
}
