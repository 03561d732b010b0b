use std::collections::VecDeque;

/// Bookkeeping for one sent or received packet.
#[derive(Debug, Copy, Clone, Default)]
pub struct PacketData {
    pub sequence: u32,
    /// Seconds since the packet was sent or received.
    pub time: f32,
    pub size: usize,
}

/// True when `a` is the nearer-forward sequence relative to `b` on a ring of
/// size `max_sequence + 1`.
#[inline]
pub fn sequence_more_recent(a: u32, b: u32, max_sequence: u32) -> bool {
    (a > b && a - b <= max_sequence / 2) || (b > a && b - a > max_sequence / 2)
}

/// Packet records kept sorted by sequence on the wrap-around ring.
pub struct PacketQueue {
    entries: VecDeque<PacketData>,
}

impl PacketQueue {
    pub fn new() -> PacketQueue {
        PacketQueue {
            entries: VecDeque::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    pub fn exists(&self, sequence: u32) -> bool {
        self.entries.iter().any(|entry| entry.sequence == sequence)
    }

    #[inline]
    pub fn front(&self) -> Option<&PacketData> {
        self.entries.front()
    }

    #[inline]
    pub fn back(&self) -> Option<&PacketData> {
        self.entries.back()
    }

    #[inline]
    pub fn pop_front(&mut self) -> Option<PacketData> {
        self.entries.pop_front()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PacketData> {
        self.entries.iter()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PacketData> {
        self.entries.iter_mut()
    }

    #[inline]
    pub fn retain<F: FnMut(&PacketData) -> bool>(&mut self, keep: F) {
        self.entries.retain(keep);
    }

    /// Inserts keeping ring order.
    pub fn insert_sorted(&mut self, data: PacketData, max_sequence: u32) {
        if self.entries.is_empty() {
            self.entries.push_back(data);
            return;
        }

        let front = self.entries.front().expect("queue is non-empty").sequence;
        let back = self.entries.back().expect("queue is non-empty").sequence;

        if !sequence_more_recent(data.sequence, front, max_sequence) {
            self.entries.push_front(data);
        } else if sequence_more_recent(data.sequence, back, max_sequence) {
            self.entries.push_back(data);
        } else {
            let index = self
                .entries
                .iter()
                .position(|entry| sequence_more_recent(entry.sequence, data.sequence, max_sequence))
                .expect("ring order broken");
            self.entries.insert(index, data);
        }
    }

    /// Debug check that ring order holds. No-op in release builds.
    pub fn verify_sorted(&self, max_sequence: u32) {
        if !cfg!(debug_assertions) {
            return;
        }
        let mut previous: Option<u32> = None;
        for entry in &self.entries {
            assert!(entry.sequence <= max_sequence);
            if let Some(previous) = previous {
                assert!(
                    sequence_more_recent(entry.sequence, previous, max_sequence),
                    "queue out of order: {} before {}",
                    previous,
                    entry.sequence
                );
            }
            previous = Some(entry.sequence);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_SEQUENCE: u32 = 255;

    fn entry(sequence: u32) -> PacketData {
        PacketData {
            sequence,
            time: 0.0,
            size: 0,
        }
    }

    #[test]
    fn test_more_recent() {
        assert!(sequence_more_recent(1, 0, MAX_SEQUENCE));
        assert!(!sequence_more_recent(0, 1, MAX_SEQUENCE));
        assert!(sequence_more_recent(0, 255, MAX_SEQUENCE));
        assert!(!sequence_more_recent(255, 0, MAX_SEQUENCE));
        assert!(sequence_more_recent(100, 200, MAX_SEQUENCE));
    }

    #[test]
    fn test_insert_back() {
        let mut queue = PacketQueue::new();
        for i in 0..100 {
            queue.insert_sorted(entry(i), MAX_SEQUENCE);
            queue.verify_sorted(MAX_SEQUENCE);
        }
        assert_eq!(queue.len(), 100);
    }

    #[test]
    fn test_insert_front() {
        let mut queue = PacketQueue::new();
        for i in (0..100).rev() {
            queue.insert_sorted(entry(i), MAX_SEQUENCE);
            queue.verify_sorted(MAX_SEQUENCE);
        }
        assert_eq!(queue.front().unwrap().sequence, 0);
        assert_eq!(queue.back().unwrap().sequence, 99);
    }

    #[test]
    fn test_insert_random() {
        use rand::RngExt;

        let mut rng = rand::rng();
        let mut queue = PacketQueue::new();
        for _ in 0..100 {
            let sequence = rng.random_range(0..=MAX_SEQUENCE);
            if !queue.exists(sequence) {
                queue.insert_sorted(entry(sequence), MAX_SEQUENCE);
            }
            queue.verify_sorted(MAX_SEQUENCE);
        }
    }

    #[test]
    fn test_insert_wrap_around() {
        let mut queue = PacketQueue::new();
        for i in 200..=255 {
            queue.insert_sorted(entry(i), MAX_SEQUENCE);
            queue.verify_sorted(MAX_SEQUENCE);
        }
        for i in 0..=50 {
            queue.insert_sorted(entry(i), MAX_SEQUENCE);
            queue.verify_sorted(MAX_SEQUENCE);
        }
        assert_eq!(queue.len(), 56 + 51);
        assert_eq!(queue.front().unwrap().sequence, 200);
        assert_eq!(queue.back().unwrap().sequence, 50);
    }
}
