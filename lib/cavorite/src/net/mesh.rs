use crate::net::address::Address;
use crate::net::error::Result;
use crate::net::socket::Socket;
use byteorder::{BigEndian, ByteOrder};
use flint::logging::{self, Logger};

/// Packet kinds exchanged between mesh and nodes, after the protocol id.
pub(crate) const KIND_ADDRESS_TABLE: u8 = 0x01;
pub(crate) const KIND_JOIN_REQUEST: u8 = 0x02;
pub(crate) const KIND_JOIN_RESPONSE: u8 = 0x03;
pub(crate) const KIND_NODE_PACKET: u8 = 0x04;

/// Protocol id plus kind byte.
pub(crate) const MESH_HEADER_SIZE: usize = 5;

/// Bytes per address table row: slot, ip, port.
pub(crate) const TABLE_ENTRY_SIZE: usize = 7;

const MAX_PACKET_SIZE: usize = 2048;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum SlotState {
    Free,
    /// Held for a known identity until its address shows up.
    Reserved,
    /// Assigned and announced, waiting for the node's next packet.
    AwaitingAck,
    Connected,
}

struct Slot {
    state: SlotState,
    address: Option<Address>,
    reserved_for: Option<Address>,
    timeout_accumulator: f32,
}

impl Slot {
    fn new() -> Slot {
        Slot {
            state: SlotState::Free,
            address: None,
            reserved_for: None,
            timeout_accumulator: 0.0,
        }
    }

    fn clear(&mut self) {
        *self = Slot::new();
    }

    fn occupied(&self) -> bool {
        self.state == SlotState::AwaitingAck || self.state == SlotState::Connected
    }
}

/// Star-topology host. Assigns small node ids from a fixed slot table and
/// broadcasts the address table at `send_rate` so peers can reach each
/// other directly. Any packet from a known address doubles as a heartbeat.
pub struct Mesh {
    protocol_id: u32,
    send_rate: f32,
    timeout: f32,
    socket: Option<Socket>,
    slots: Vec<Slot>,
    send_accumulator: f32,
    scratch: Vec<u8>,
    log: Logger,
}

impl Mesh {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(
        protocol_id: u32,
        max_nodes: u8,
        send_rate: f32,
        timeout: f32,
        log: L,
    ) -> Mesh {
        let log = match log.into() {
            Some(log) => log.new(logging::o!()),
            None => Logger::root(logging::Discard, logging::o!()),
        };

        Mesh {
            protocol_id,
            send_rate,
            timeout,
            socket: None,
            slots: (0..max_nodes).map(|_| Slot::new()).collect(),
            send_accumulator: 0.0,
            scratch: vec![0; MAX_PACKET_SIZE],
            log,
        }
    }

    pub fn start(&mut self, port: u16) -> Result<()> {
        assert!(self.socket.is_none(), "mesh already started");
        self.socket = Some(Socket::bind(port)?);
        self.send_accumulator = 0.0;
        logging::debug!(self.log, "mesh started"; "port" => port);
        Ok(())
    }

    pub fn stop(&mut self) {
        assert!(self.socket.is_some(), "mesh not started");
        self.socket = None;
        for slot in &mut self.slots {
            slot.clear();
        }
        logging::debug!(self.log, "mesh stopped");
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.socket.is_some()
    }

    #[inline]
    pub fn max_nodes(&self) -> u8 {
        self.slots.len() as u8
    }

    pub fn is_node_connected(&self, node_id: u8) -> bool {
        self.slots
            .get(node_id as usize)
            .map_or(false, |slot| slot.state == SlotState::Connected)
    }

    pub fn node_address(&self, node_id: u8) -> Option<Address> {
        self.slots
            .get(node_id as usize)
            .filter(|slot| slot.occupied())
            .and_then(|slot| slot.address)
    }

    /// Pins `slot` to a known future identity: only a join request from
    /// `address` may claim it. Unclaimed reservations age out.
    pub fn reserve(&mut self, slot: u8, address: Address) {
        let slot = &mut self.slots[slot as usize];
        assert!(slot.state == SlotState::Free, "reserving an occupied slot");
        slot.state = SlotState::Reserved;
        slot.reserved_for = Some(address);
        slot.timeout_accumulator = 0.0;
    }

    pub fn update(&mut self, dt: f32) {
        assert!(self.socket.is_some(), "update on a stopped mesh");
        self.receive_packets();
        self.send_broadcasts(dt);
        self.check_timeouts(dt);
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
            if self.scratch[4] == KIND_JOIN_REQUEST {
                self.handle_join_request(from);
            }
        }
    }

    fn handle_join_request(&mut self, from: Address) {
        // known peer: heartbeat, and the ack that completes the handshake
        if let Some(index) = self
            .slots
            .iter()
            .position(|slot| slot.occupied() && slot.address == Some(from))
        {
            let slot = &mut self.slots[index];
            slot.timeout_accumulator = 0.0;
            if slot.state == SlotState::AwaitingAck {
                slot.state = SlotState::Connected;
                logging::debug!(self.log, "node connected"; "node_id" => index, "peer" => %from);
            }
            self.send_join_response(index as u8, from);
            return;
        }

        // new peer: a matching reservation beats the free list
        let index = self
            .slots
            .iter()
            .position(|slot| slot.state == SlotState::Reserved && slot.reserved_for == Some(from))
            .or_else(|| {
                self.slots
                    .iter()
                    .position(|slot| slot.state == SlotState::Free)
            });
        let index = match index {
            Some(index) => index,
            // table full, the request goes unanswered
            None => return,
        };

        let slot = &mut self.slots[index];
        slot.state = SlotState::AwaitingAck;
        slot.address = Some(from);
        slot.timeout_accumulator = 0.0;
        logging::debug!(self.log, "node accepted"; "node_id" => index, "peer" => %from);
        self.send_join_response(index as u8, from);
    }

    fn send_join_response(&self, node_id: u8, to: Address) {
        let mut packet = [0u8; MESH_HEADER_SIZE + 1];
        BigEndian::write_u32(&mut packet[..4], self.protocol_id);
        packet[4] = KIND_JOIN_RESPONSE;
        packet[5] = node_id;
        if let Some(socket) = self.socket.as_ref() {
            socket.send(to, &packet);
        }
    }

    fn send_broadcasts(&mut self, dt: f32) {
        self.send_accumulator += dt;
        if self.send_accumulator < self.send_rate {
            return;
        }
        self.send_accumulator = 0.0;

        let mut packet = vec![0u8; MESH_HEADER_SIZE + 1];
        BigEndian::write_u32(&mut packet[..4], self.protocol_id);
        packet[4] = KIND_ADDRESS_TABLE;

        let mut count = 0u8;
        for (index, slot) in self.slots.iter().enumerate() {
            let address = match (slot.occupied(), slot.address) {
                (true, Some(address)) => address,
                _ => continue,
            };
            packet.push(index as u8);
            packet.extend_from_slice(&address.ip());
            let mut port = [0u8; 2];
            BigEndian::write_u16(&mut port, address.port());
            packet.extend_from_slice(&port);
            count += 1;
        }
        packet[5] = count;

        if let Some(socket) = self.socket.as_ref() {
            for slot in &self.slots {
                if let (true, Some(address)) = (slot.occupied(), slot.address) {
                    socket.send(address, &packet);
                }
            }
        }
    }

    fn check_timeouts(&mut self, dt: f32) {
        let timeout = self.timeout;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.state == SlotState::Free {
                continue;
            }
            slot.timeout_accumulator += dt;
            if slot.timeout_accumulator > timeout {
                logging::debug!(self.log, "slot timed out"; "node_id" => index);
                slot.clear();
            }
        }
    }
}
