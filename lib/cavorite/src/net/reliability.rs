use crate::net::queue::{sequence_more_recent, PacketData, PacketQueue};

/// Packets pending an ack longer than this are declared lost.
const RTT_MAXIMUM: f32 = 1.0;

/// EWMA gain for the round-trip estimate.
const RTT_GAIN: f32 = 0.1;

const EPSILON: f32 = 0.001;

/// Ack-bit position of `sequence` relative to `ack` on the ring: 0 is the
/// sequence immediately before `ack`.
pub fn bit_index_for_sequence(sequence: u32, ack: u32, max_sequence: u32) -> u32 {
    assert!(sequence != ack);
    assert!(!sequence_more_recent(sequence, ack, max_sequence));
    if sequence > ack {
        ack + (max_sequence - sequence)
    } else {
        ack - 1 - sequence
    }
}

/// Ack bits for `ack` given the queue of received sequences: bit i set means
/// sequence `ack - (i + 1)` (mod ring) was received.
pub fn generate_ack_bits(ack: u32, received_queue: &PacketQueue, max_sequence: u32) -> u32 {
    let mut ack_bits = 0u32;
    for entry in received_queue.iter() {
        if entry.sequence == ack || sequence_more_recent(entry.sequence, ack, max_sequence) {
            break;
        }
        let bit_index = bit_index_for_sequence(entry.sequence, ack, max_sequence);
        if bit_index <= 31 {
            ack_bits |= 1 << bit_index;
        }
    }
    ack_bits
}

/// Matches an incoming ack + ack_bits against the pending queue. Two passes:
/// collect the covered entries first, then drain them, so the queue is never
/// mutated mid-scan. Acked sequences append to `acks`; each acked packet
/// folds its age into the rtt estimate.
#[allow(clippy::too_many_arguments)]
pub fn process_ack(
    ack: u32,
    ack_bits: u32,
    pending_ack_queue: &mut PacketQueue,
    acked_queue: &mut PacketQueue,
    acks: &mut Vec<u32>,
    acked_packets: &mut u32,
    rtt: &mut f32,
    max_sequence: u32,
) {
    if pending_ack_queue.is_empty() {
        return;
    }

    let mut covered: Vec<PacketData> = Vec::new();
    for entry in pending_ack_queue.iter() {
        let acked = if entry.sequence == ack {
            true
        } else if !sequence_more_recent(entry.sequence, ack, max_sequence) {
            let bit_index = bit_index_for_sequence(entry.sequence, ack, max_sequence);
            bit_index <= 31 && (ack_bits >> bit_index) & 1 != 0
        } else {
            false
        };
        if acked {
            covered.push(*entry);
        }
    }

    for data in covered {
        *rtt += (data.time - *rtt) * RTT_GAIN;
        pending_ack_queue.retain(|entry| entry.sequence != data.sequence);
        acked_queue.insert_sorted(data, max_sequence);
        acks.push(data.sequence);
        *acked_packets += 1;
    }
}

/// Sequence-numbered ack bookkeeping over an unreliable channel: which of
/// our packets the peer has seen, which of the peer's packets we have seen,
/// and a smoothed round-trip estimate. Detection only, no retransmission.
pub struct ReliabilitySystem {
    max_sequence: u32,
    local_sequence: u32,
    remote_sequence: u32,

    sent_packets: u32,
    recv_packets: u32,
    lost_packets: u32,
    acked_packets: u32,

    sent_bandwidth: f32,
    acked_bandwidth: f32,
    rtt: f32,

    sent_queue: PacketQueue,
    pending_ack_queue: PacketQueue,
    received_queue: PacketQueue,
    acked_queue: PacketQueue,
    acks: Vec<u32>,
}

impl ReliabilitySystem {
    pub fn new(max_sequence: u32) -> ReliabilitySystem {
        assert!(max_sequence >= 31, "the ack window spans 33 sequences");
        ReliabilitySystem {
            max_sequence,
            local_sequence: 0,
            remote_sequence: 0,
            sent_packets: 0,
            recv_packets: 0,
            lost_packets: 0,
            acked_packets: 0,
            sent_bandwidth: 0.0,
            acked_bandwidth: 0.0,
            rtt: 0.0,
            sent_queue: PacketQueue::new(),
            pending_ack_queue: PacketQueue::new(),
            received_queue: PacketQueue::new(),
            acked_queue: PacketQueue::new(),
            acks: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.local_sequence = 0;
        self.remote_sequence = 0;
        self.sent_packets = 0;
        self.recv_packets = 0;
        self.lost_packets = 0;
        self.acked_packets = 0;
        self.sent_bandwidth = 0.0;
        self.acked_bandwidth = 0.0;
        self.rtt = 0.0;
        self.sent_queue.clear();
        self.pending_ack_queue.clear();
        self.received_queue.clear();
        self.acked_queue.clear();
        self.acks.clear();
    }

    #[inline]
    pub fn max_sequence(&self) -> u32 {
        self.max_sequence
    }

    #[inline]
    pub fn local_sequence(&self) -> u32 {
        self.local_sequence
    }

    #[inline]
    pub fn remote_sequence(&self) -> u32 {
        self.remote_sequence
    }

    #[inline]
    pub fn rtt(&self) -> f32 {
        self.rtt
    }

    #[inline]
    pub fn sent_packets(&self) -> u32 {
        self.sent_packets
    }

    #[inline]
    pub fn received_packets(&self) -> u32 {
        self.recv_packets
    }

    #[inline]
    pub fn lost_packets(&self) -> u32 {
        self.lost_packets
    }

    #[inline]
    pub fn acked_packets(&self) -> u32 {
        self.acked_packets
    }

    /// Kilobits per second currently leaving this endpoint.
    #[inline]
    pub fn sent_bandwidth(&self) -> f32 {
        self.sent_bandwidth
    }

    /// Kilobits per second confirmed delivered.
    #[inline]
    pub fn acked_bandwidth(&self) -> f32 {
        self.acked_bandwidth
    }

    /// Sequences newly acknowledged since the last `update`.
    #[inline]
    pub fn acks(&self) -> &[u32] {
        &self.acks
    }

    /// Records an outgoing packet under the next local sequence number.
    pub fn packet_sent(&mut self, size: usize) {
        debug_assert!(
            !self.pending_ack_queue.exists(self.local_sequence),
            "sequence ring lapped the pending queue"
        );
        let data = PacketData {
            sequence: self.local_sequence,
            time: 0.0,
            size,
        };
        self.sent_queue.insert_sorted(data, self.max_sequence);
        self.pending_ack_queue.insert_sorted(data, self.max_sequence);
        self.sent_packets += 1;
        self.local_sequence = if self.local_sequence == self.max_sequence {
            0
        } else {
            self.local_sequence + 1
        };
    }

    /// Records an incoming packet, advancing the remote sequence when it is
    /// the most recent seen.
    pub fn packet_received(&mut self, sequence: u32, size: usize) {
        self.recv_packets += 1;
        if self.received_queue.exists(sequence) {
            return;
        }
        let data = PacketData {
            sequence,
            time: 0.0,
            size,
        };
        self.received_queue.insert_sorted(data, self.max_sequence);
        if sequence_more_recent(sequence, self.remote_sequence, self.max_sequence) {
            self.remote_sequence = sequence;
        }
    }

    #[inline]
    pub fn ack_bits(&self) -> u32 {
        generate_ack_bits(self.remote_sequence, &self.received_queue, self.max_sequence)
    }

    pub fn process_ack(&mut self, ack: u32, ack_bits: u32) {
        process_ack(
            ack,
            ack_bits,
            &mut self.pending_ack_queue,
            &mut self.acked_queue,
            &mut self.acks,
            &mut self.acked_packets,
            &mut self.rtt,
            self.max_sequence,
        );
    }

    /// Ages the queues, drops pending packets past the rtt ceiling as lost,
    /// and clears the ack notifications surfaced last tick.
    pub fn update(&mut self, dt: f32) {
        self.acks.clear();
        self.advance_queue_time(dt);
        self.update_queues();
        self.update_stats();
    }

    /// Debug consistency check over all queues.
    pub fn validate(&self) {
        self.sent_queue.verify_sorted(self.max_sequence);
        self.pending_ack_queue.verify_sorted(self.max_sequence);
        self.received_queue.verify_sorted(self.max_sequence);
        self.acked_queue.verify_sorted(self.max_sequence);
    }

    fn advance_queue_time(&mut self, dt: f32) {
        for entry in self.sent_queue.iter_mut() {
            entry.time += dt;
        }
        for entry in self.pending_ack_queue.iter_mut() {
            entry.time += dt;
        }
        for entry in self.received_queue.iter_mut() {
            entry.time += dt;
        }
        for entry in self.acked_queue.iter_mut() {
            entry.time += dt;
        }
    }

    fn update_queues(&mut self) {
        while let Some(front) = self.sent_queue.front() {
            if front.time > RTT_MAXIMUM + EPSILON {
                self.sent_queue.pop_front();
            } else {
                break;
            }
        }

        // keep the ack pivot plus its 32 bit positions
        while self.received_queue.len() > 33 {
            self.received_queue.pop_front();
        }

        while let Some(front) = self.acked_queue.front() {
            if front.time > RTT_MAXIMUM * 2.0 + EPSILON {
                self.acked_queue.pop_front();
            } else {
                break;
            }
        }

        while let Some(front) = self.pending_ack_queue.front() {
            if front.time > RTT_MAXIMUM + EPSILON {
                self.pending_ack_queue.pop_front();
                self.lost_packets += 1;
            } else {
                break;
            }
        }
    }

    fn update_stats(&mut self) {
        let sent_bytes: usize = self.sent_queue.iter().map(|entry| entry.size).sum();
        let acked_bytes: usize = self
            .acked_queue
            .iter()
            .filter(|entry| entry.time >= RTT_MAXIMUM)
            .map(|entry| entry.size)
            .sum();
        self.sent_bandwidth = sent_bytes as f32 / RTT_MAXIMUM * (8.0 / 1000.0);
        self.acked_bandwidth = acked_bytes as f32 / RTT_MAXIMUM * (8.0 / 1000.0);
    }
}
