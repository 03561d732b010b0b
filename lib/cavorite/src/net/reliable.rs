use crate::net::address::Address;
use crate::net::connection::{Connection, MAX_PACKET_SIZE};
use crate::net::error::Result;
use crate::net::reliability::ReliabilitySystem;
use byteorder::{BigEndian, ByteOrder};
use flint::logging::Logger;

/// Sequence, ack and ack bits, carried after the protocol id.
pub const RELIABLE_HEADER_SIZE: usize = 12;

/// Connection carrying a sliding-window ack header on every packet. Delivery
/// notifications surface through `reliability().acks()`; lost packets are
/// never retransmitted.
pub struct ReliableConnection {
    connection: Connection,
    reliability: ReliabilitySystem,
    packet_loss_mask: u32,
    was_connected: bool,
    scratch: Vec<u8>,
}

impl ReliableConnection {
    pub fn new<'a, L: Into<Option<&'a Logger>>>(
        protocol_id: u32,
        timeout: f32,
        log: L,
    ) -> ReliableConnection {
        Self::with_max_sequence(protocol_id, timeout, u32::MAX, log)
    }

    pub fn with_max_sequence<'a, L: Into<Option<&'a Logger>>>(
        protocol_id: u32,
        timeout: f32,
        max_sequence: u32,
        log: L,
    ) -> ReliableConnection {
        ReliableConnection {
            connection: Connection::new(protocol_id, timeout, log),
            reliability: ReliabilitySystem::new(max_sequence),
            packet_loss_mask: 0,
            was_connected: false,
            scratch: vec![0; MAX_PACKET_SIZE],
        }
    }

    /// Drops outgoing packets whose sequence intersects the mask. Test hook
    /// for exercising loss handling.
    pub fn set_packet_loss_mask(&mut self, mask: u32) {
        self.packet_loss_mask = mask;
    }

    #[inline]
    pub fn reliability(&self) -> &ReliabilitySystem {
        &self.reliability
    }

    pub fn start(&mut self, port: u16) -> Result<()> {
        self.connection.start(port)
    }

    pub fn stop(&mut self) {
        self.connection.stop();
        self.reliability.reset();
        self.was_connected = false;
    }

    pub fn listen(&mut self) {
        self.reliability.reset();
        self.was_connected = false;
        self.connection.listen();
    }

    pub fn connect(&mut self, peer: Address) {
        self.reliability.reset();
        self.was_connected = false;
        self.connection.connect(peer);
    }

    #[inline]
    pub fn is_connecting(&self) -> bool {
        self.connection.is_connecting()
    }

    #[inline]
    pub fn connect_failed(&self) -> bool {
        self.connection.connect_failed()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    #[inline]
    pub fn is_listening(&self) -> bool {
        self.connection.is_listening()
    }

    /// Sends a payload behind a sequence/ack/ack_bits header. Masked-out
    /// sequences are still recorded as sent so the drop shows up as loss.
    pub fn send_packet(&mut self, data: &[u8]) -> bool {
        let sequence = self.reliability.local_sequence();
        if self.packet_loss_mask != 0 && (sequence & self.packet_loss_mask) != 0 {
            self.reliability.packet_sent(data.len());
            return true;
        }

        let size = RELIABLE_HEADER_SIZE + data.len();
        assert!(size + 4 <= MAX_PACKET_SIZE, "payload too large");
        BigEndian::write_u32(&mut self.scratch[0..4], sequence);
        BigEndian::write_u32(&mut self.scratch[4..8], self.reliability.remote_sequence());
        BigEndian::write_u32(&mut self.scratch[8..12], self.reliability.ack_bits());
        self.scratch[RELIABLE_HEADER_SIZE..size].copy_from_slice(data);

        if !self.connection.send_packet(&self.scratch[..size]) {
            return false;
        }
        self.reliability.packet_sent(data.len());
        true
    }

    /// Receives a payload, feeding its header through the ack bookkeeping.
    pub fn receive_packet(&mut self, data: &mut [u8]) -> Option<usize> {
        let size = self.connection.receive_packet(&mut self.scratch)?;
        if size <= RELIABLE_HEADER_SIZE {
            return None;
        }
        let sequence = BigEndian::read_u32(&self.scratch[0..4]);
        let ack = BigEndian::read_u32(&self.scratch[4..8]);
        let ack_bits = BigEndian::read_u32(&self.scratch[8..12]);
        let payload = size - RELIABLE_HEADER_SIZE;

        self.reliability.packet_received(sequence, payload);
        self.reliability.process_ack(ack, ack_bits);

        let copy = payload.min(data.len());
        data[..copy].copy_from_slice(&self.scratch[RELIABLE_HEADER_SIZE..RELIABLE_HEADER_SIZE + copy]);
        Some(copy)
    }

    /// Advances timers; reliability state drops with the connection.
    pub fn update(&mut self, dt: f32) {
        self.connection.update(dt);
        self.reliability.update(dt);
        let connected = self.connection.is_connected();
        if self.was_connected && !connected {
            self.reliability.reset();
        }
        self.was_connected = connected;
    }
}
