use crate::sim::ObjectId;
use hashbrown::HashMap;

/// Parallel id/priority arrays with an O(1) reverse index, sortable by
/// descending priority. Drives which objects make it into the next state
/// packet.
pub struct PrioritySet {
    objects: Vec<ObjectId>,
    priorities: Vec<f32>,
    index: HashMap<ObjectId, usize>,
}

impl PrioritySet {
    pub fn new() -> PrioritySet {
        PrioritySet {
            objects: Vec::new(),
            priorities: Vec::new(),
            index: HashMap::new(),
        }
    }

    #[inline]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.index.contains_key(&id)
    }

    #[inline]
    pub fn index_of(&self, id: ObjectId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Starts tracking an object at zero priority.
    pub fn add_object(&mut self, id: ObjectId) {
        assert!(!self.index.contains_key(&id), "object already tracked");
        self.index.insert(id, self.objects.len());
        self.objects.push(id);
        self.priorities.push(0.0);
    }

    /// Swap-removes an object, patching the reverse index for whichever
    /// entry took its slot.
    pub fn remove_object(&mut self, id: ObjectId) {
        let index = self
            .index
            .remove(&id)
            .expect("removing an untracked object");
        self.objects.swap_remove(index);
        self.priorities.swap_remove(index);
        if index < self.objects.len() {
            self.index.insert(self.objects[index], index);
        }
    }

    #[inline]
    pub fn priority_object(&self, index: usize) -> ObjectId {
        self.objects[index]
    }

    #[inline]
    pub fn priority_at_index(&self, index: usize) -> f32 {
        self.priorities[index]
    }

    #[inline]
    pub fn set_priority_at_index(&mut self, index: usize, priority: f32) {
        self.priorities[index] = priority;
    }

    /// Reorders both arrays so priorities are non-increasing and rebuilds
    /// the reverse index.
    pub fn sort_objects(&mut self) {
        let mut order: Vec<usize> = (0..self.objects.len()).collect();
        order.sort_by(|&a, &b| {
            self.priorities[b]
                .partial_cmp(&self.priorities[a])
                .expect("priority is NaN")
        });

        self.objects = order.iter().map(|&i| self.objects[i]).collect();
        self.priorities = order.iter().map(|&i| self.priorities[i]).collect();

        self.index.clear();
        for (index, &id) in self.objects.iter().enumerate() {
            self.index.insert(id, index);
        }
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.priorities.clear();
        self.index.clear();
    }
}
