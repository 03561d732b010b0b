use crate::net::address::Address;
use crate::net::error::Result;
use crate::net::mesh::{
    KIND_ADDRESS_TABLE, KIND_JOIN_REQUEST, KIND_JOIN_RESPONSE, KIND_NODE_PACKET, MESH_HEADER_SIZE,
    TABLE_ENTRY_SIZE,
};
use crate::net::socket::Socket;
use byteorder::{BigEndian, ByteOrder};
use flint::logging::{self, Logger};
use std::collections::VecDeque;

const MAX_PACKET_SIZE: usize = 2048;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum State {
    Disconnected,
    Joining,
    Connected,
}

/// Mesh peer. Joins the host, learns its node id and the address table, and
/// exchanges payloads with other nodes directly. Join requests keep flowing
/// after the handshake; they double as the heartbeat the host expects.
pub struct Node {
    protocol_id: u32,
    send_rate: f32,
    timeout: f32,
    socket: Option<Socket>,
    state: State,
    mesh_address: Option<Address>,
    local_node_id: Option<u8>,
    nodes: Vec<Option<Address>>,
    connect_failed: bool,
    send_accumulator: f32,
    timeout_accumulator: f32,
    received: VecDeque<(u8, Vec<u8>)>,
    scratch: Vec<u8>,
    log: Logger,
}

impl Node {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(
        protocol_id: u32,
        send_rate: f32,
        timeout: f32,
        log: L,
    ) -> Node {
        let log = match log.into() {
            Some(log) => log.new(logging::o!()),
            None => Logger::root(logging::Discard, logging::o!()),
        };

        Node {
            protocol_id,
            send_rate,
            timeout,
            socket: None,
            state: State::Disconnected,
            mesh_address: None,
            local_node_id: None,
            nodes: Vec::new(),
            connect_failed: false,
            send_accumulator: 0.0,
            timeout_accumulator: 0.0,
            received: VecDeque::new(),
            scratch: vec![0; MAX_PACKET_SIZE],
            log,
        }
    }

    pub fn start(&mut self, port: u16) -> Result<()> {
        assert!(self.socket.is_none(), "node already started");
        self.socket = Some(Socket::bind(port)?);
        logging::debug!(self.log, "node started"; "port" => port);
        Ok(())
    }

    pub fn stop(&mut self) {
        assert!(self.socket.is_some(), "node not started");
        self.socket = None;
        self.clear();
        logging::debug!(self.log, "node stopped");
    }

    fn clear(&mut self) {
        self.state = State::Disconnected;
        self.local_node_id = None;
        self.nodes.clear();
        self.received.clear();
        self.send_accumulator = 0.0;
        self.timeout_accumulator = 0.0;
    }

    pub fn connect(&mut self, mesh: Address) {
        logging::debug!(self.log, "joining mesh"; "mesh" => %mesh);
        self.clear();
        self.mesh_address = Some(mesh);
        self.state = State::Joining;
        self.connect_failed = false;
        // fire the first join request on the next update
        self.send_accumulator = self.send_rate;
    }

    #[inline]
    pub fn is_connecting(&self) -> bool {
        self.state == State::Joining
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state == State::Connected
    }

    #[inline]
    pub fn connect_failed(&self) -> bool {
        self.connect_failed
    }

    #[inline]
    pub fn local_node_id(&self) -> Option<u8> {
        self.local_node_id
    }

    pub fn is_node_connected(&self, node_id: u8) -> bool {
        self.nodes
            .get(node_id as usize)
            .map_or(false, |address| address.is_some())
    }

    pub fn node_address(&self, node_id: u8) -> Option<Address> {
        self.nodes.get(node_id as usize).copied().flatten()
    }

    pub fn update(&mut self, dt: f32) {
        assert!(self.socket.is_some(), "update on a stopped node");
        self.receive_packets();
        self.send_join_requests(dt);
        self.check_timeout(dt);
    }

    /// Sends a payload to another node by id. Silently dropped when the
    /// destination address is not yet in the table.
    pub fn send_packet(&mut self, to_node_id: u8, data: &[u8]) -> bool {
        if self.state != State::Connected || data.is_empty() {
            return false;
        }
        let local_node_id = match self.local_node_id {
            Some(id) => id,
            None => return false,
        };
        let to = match self.node_address(to_node_id) {
            Some(address) => address,
            None => return false,
        };
        let socket = match self.socket.as_ref() {
            Some(socket) => socket,
            None => return false,
        };

        let size = MESH_HEADER_SIZE + 1 + data.len();
        assert!(size <= MAX_PACKET_SIZE, "payload too large");
        let mut packet = vec![0u8; size];
        BigEndian::write_u32(&mut packet[..4], self.protocol_id);
        packet[4] = KIND_NODE_PACKET;
        packet[5] = local_node_id;
        packet[6..].copy_from_slice(data);
        socket.send(to, &packet)
    }

    /// Drains one buffered node-to-node payload: (source node id, size).
    pub fn receive_packet(&mut self, data: &mut [u8]) -> Option<(u8, usize)> {
        let (source, payload) = self.received.pop_front()?;
        let size = payload.len().min(data.len());
        data[..size].copy_from_slice(&payload[..size]);
        Some((source, size))
    }

    fn receive_packets(&mut self) {
        loop {
            let (from, size) = {
                let socket = match self.socket.as_ref() {
                    Some(socket) => socket,
                    None => return,
                };
                match socket.receive(&mut self.scratch) {
                    Some(packet) => packet,
                    None => return,
                }
            };
            if size < MESH_HEADER_SIZE {
                continue;
            }
            if BigEndian::read_u32(&self.scratch[..4]) != self.protocol_id {
                continue;
            }
            let kind = self.scratch[4];

            if Some(from) == self.mesh_address && self.state != State::Disconnected {
                self.timeout_accumulator = 0.0;
                match kind {
                    KIND_JOIN_RESPONSE if size >= MESH_HEADER_SIZE + 1 => {
                        let node_id = self.scratch[5];
                        if self.state == State::Joining {
                            logging::debug!(self.log, "joined mesh"; "node_id" => node_id);
                            self.state = State::Connected;
                        }
                        self.local_node_id = Some(node_id);
                    }
                    KIND_ADDRESS_TABLE if size >= MESH_HEADER_SIZE + 1 => {
                        self.read_address_table(size);
                    }
                    _ => {}
                }
            }

            if kind == KIND_NODE_PACKET && size > MESH_HEADER_SIZE + 1 {
                let source = self.scratch[5];
                self.received
                    .push_back((source, self.scratch[MESH_HEADER_SIZE + 1..size].to_vec()));
            }
        }
    }

    /// Rebuilds the peer table from a broadcast; the table is authoritative,
    /// so rows absent from the latest broadcast drop out.
    fn read_address_table(&mut self, size: usize) {
        let count = self.scratch[5] as usize;
        if size < MESH_HEADER_SIZE + 1 + count * TABLE_ENTRY_SIZE {
            return;
        }
        self.nodes.clear();
        for i in 0..count {
            let base = MESH_HEADER_SIZE + 1 + i * TABLE_ENTRY_SIZE;
            let slot = self.scratch[base] as usize;
            let ip = &self.scratch[base + 1..base + 5];
            let port = BigEndian::read_u16(&self.scratch[base + 5..base + 7]);
            if slot >= self.nodes.len() {
                self.nodes.resize(slot + 1, None);
            }
            self.nodes[slot] = Some(Address::new(ip[0], ip[1], ip[2], ip[3], port));
        }
    }

    fn send_join_requests(&mut self, dt: f32) {
        let mesh = match (self.state, self.mesh_address) {
            (State::Disconnected, _) | (_, None) => return,
            (_, Some(mesh)) => mesh,
        };
        self.send_accumulator += dt;
        while self.send_accumulator >= self.send_rate {
            self.send_accumulator -= self.send_rate;
            let mut packet = [0u8; MESH_HEADER_SIZE];
            BigEndian::write_u32(&mut packet[..4], self.protocol_id);
            packet[4] = KIND_JOIN_REQUEST;
            if let Some(socket) = self.socket.as_ref() {
                socket.send(mesh, &packet);
            }
        }
    }

    fn check_timeout(&mut self, dt: f32) {
        if self.state == State::Disconnected {
            return;
        }
        self.timeout_accumulator += dt;
        if self.timeout_accumulator <= self.timeout {
            return;
        }
        match self.state {
            State::Joining => {
                logging::debug!(self.log, "join timed out");
                self.clear();
                self.connect_failed = true;
            }
            State::Connected => {
                logging::debug!(self.log, "mesh timed out");
                self.clear();
            }
            State::Disconnected => {}
        }
    }
}
