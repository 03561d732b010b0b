use crate::sim::ObjectId;
use indexmap::IndexMap;

/// A deferred per-object action.
pub trait Response {
    fn object_id(&self) -> ObjectId;
}

/// FIFO of pending responses with duplicate object ids suppressed. The
/// ordered map gives insertion order and the duplicate check in one
/// structure.
pub struct ResponseQueue<T> {
    pending: IndexMap<ObjectId, T>,
}

impl<T: Response> ResponseQueue<T> {
    pub fn new() -> ResponseQueue<T> {
        ResponseQueue {
            pending: IndexMap::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queues a response unless one for the same object is already waiting.
    pub fn queue_response(&mut self, response: T) -> bool {
        let id = response.object_id();
        if self.pending.contains_key(&id) {
            return false;
        }
        self.pending.insert(id, response);
        true
    }

    /// Pops the oldest pending response.
    pub fn pop_response(&mut self) -> Option<T> {
        self.pending
            .shift_remove_index(0)
            .map(|(_, response)| response)
    }

    #[inline]
    pub fn already_queued(&self, id: ObjectId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
