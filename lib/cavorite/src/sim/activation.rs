use crate::sim::ObjectId;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EventKind {
    Activate,
    Deactivate,
}

/// One activation state change. Events buffer until `clear_events`.
#[derive(Debug, Copy, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub id: ObjectId,
}

/// Coordinates landed outside the configured grid. Out-of-world positions
/// are rejected rather than bent into edge cells.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OutOfGrid;

struct ObjectRecord {
    x: f32,
    y: f32,
    cell: usize,
    active_index: Option<usize>,
}

/// Maintains the set of objects within an activation radius of a moving
/// reference point over a uniform grid. Cells hold object ids only; the
/// records live in an arena indexed by id, so nothing in a cell outlives
/// the arena.
pub struct ActivationSystem {
    max_objects: usize,
    radius: f32,
    width: usize,
    height: usize,
    cell_size: f32,
    x: f32,
    y: f32,
    enabled: bool,
    cells: Vec<Vec<ObjectId>>,
    objects: Vec<Option<ObjectRecord>>,
    active: Vec<ObjectId>,
    events: Vec<Event>,
}

impl ActivationSystem {
    pub fn new(
        max_objects: usize,
        radius: f32,
        width: usize,
        height: usize,
        cell_size: f32,
        active_capacity: usize,
        event_capacity: usize,
    ) -> ActivationSystem {
        assert!(max_objects >= 1);
        assert!(width >= 1 && height >= 1);
        assert!(cell_size > 0.0 && radius > 0.0);

        ActivationSystem {
            max_objects,
            radius,
            width,
            height,
            cell_size,
            x: 0.0,
            y: 0.0,
            enabled: true,
            cells: vec![Vec::new(); width * height],
            objects: (0..=max_objects).map(|_| None).collect(),
            active: Vec::with_capacity(active_capacity),
            events: Vec::with_capacity(event_capacity),
        }
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// While disabled nothing activates; everything active drains out on the
    /// following updates.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    #[inline]
    pub fn active_ids(&self) -> &[ObjectId] {
        &self.active
    }

    pub fn is_active(&self, id: ObjectId) -> bool {
        self.objects
            .get(id as usize)
            .and_then(|record| record.as_ref())
            .map_or(false, |record| record.active_index.is_some())
    }

    #[inline]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn event(&self, index: usize) -> Event {
        self.events[index]
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    fn cell_coords(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        let half_width = self.width as f32 * self.cell_size * 0.5;
        let half_height = self.height as f32 * self.cell_size * 0.5;
        let cell_x = ((x + half_width) / self.cell_size).floor();
        let cell_y = ((y + half_height) / self.cell_size).floor();
        if cell_x < 0.0
            || cell_y < 0.0
            || cell_x >= self.width as f32
            || cell_y >= self.height as f32
        {
            return None;
        }
        Some((cell_x as usize, cell_y as usize))
    }

    #[inline]
    fn cell_index(&self, cell_x: usize, cell_y: usize) -> usize {
        cell_y * self.width + cell_x
    }

    /// Places an object in the grid. Nothing activates until the next
    /// update.
    pub fn insert_object(&mut self, id: ObjectId, x: f32, y: f32) -> Result<(), OutOfGrid> {
        assert!(
            id >= 1 && (id as usize) <= self.max_objects,
            "object id out of range"
        );
        assert!(
            self.objects[id as usize].is_none(),
            "object already inserted"
        );
        let (cell_x, cell_y) = self.cell_coords(x, y).ok_or(OutOfGrid)?;
        let cell = self.cell_index(cell_x, cell_y);
        self.cells[cell].push(id);
        self.objects[id as usize] = Some(ObjectRecord {
            x,
            y,
            cell,
            active_index: None,
        });
        Ok(())
    }

    /// Repositions an object, re-bucketing when it crosses a cell boundary.
    /// Never emits events directly; the next update does.
    pub fn move_object(&mut self, id: ObjectId, x: f32, y: f32) -> Result<(), OutOfGrid> {
        let (cell_x, cell_y) = self.cell_coords(x, y).ok_or(OutOfGrid)?;
        let cell = self.cell_index(cell_x, cell_y);

        let (old_cell, changed) = {
            let record = self
                .objects
                .get_mut(id as usize)
                .and_then(|record| record.as_mut())
                .expect("moving an unknown object");
            record.x = x;
            record.y = y;
            let old_cell = record.cell;
            if old_cell != cell {
                record.cell = cell;
            }
            (old_cell, old_cell != cell)
        };

        if changed {
            let slot = self.cells[old_cell]
                .iter()
                .position(|&entry| entry == id)
                .expect("cell membership broken");
            self.cells[old_cell].swap_remove(slot);
            self.cells[cell].push(id);
        }
        Ok(())
    }

    /// Recenters the activation disc. Takes effect on the next update.
    pub fn move_activation_point(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
    }

    /// Recomputes the active set against the current activation point.
    /// Activate and deactivate events each come out in ascending object id.
    pub fn update(&mut self, _dt: f32) {
        let radius_sq = self.radius * self.radius;

        let mut activate: Vec<ObjectId> = Vec::new();
        if self.enabled {
            self.collect_activations(radius_sq, &mut activate);
            activate.sort_unstable();
        }

        let mut deactivate: Vec<ObjectId> = Vec::new();
        for &id in &self.active {
            let record = self.objects[id as usize]
                .as_ref()
                .expect("active set names a missing object");
            let dx = record.x - self.x;
            let dy = record.y - self.y;
            if !self.enabled || dx * dx + dy * dy > radius_sq {
                deactivate.push(id);
            }
        }
        deactivate.sort_unstable();

        for id in activate {
            self.activate(id);
        }
        for id in deactivate {
            self.deactivate(id);
        }
    }

    fn collect_activations(&self, radius_sq: f32, activate: &mut Vec<ObjectId>) {
        let half_width = self.width as f32 * self.cell_size * 0.5;
        let half_height = self.height as f32 * self.cell_size * 0.5;

        // broad phase: cells under the disc's bounding square, clamped to
        // the grid
        let low_x = ((self.x - self.radius + half_width) / self.cell_size)
            .floor()
            .max(0.0);
        let low_y = ((self.y - self.radius + half_height) / self.cell_size)
            .floor()
            .max(0.0);
        let high_x = ((self.x + self.radius + half_width) / self.cell_size)
            .floor()
            .min(self.width as f32 - 1.0);
        let high_y = ((self.y + self.radius + half_height) / self.cell_size)
            .floor()
            .min(self.height as f32 - 1.0);
        if high_x < 0.0 || high_y < 0.0 || low_x > high_x || low_y > high_y {
            return;
        }

        for cell_y in low_y as usize..=high_y as usize {
            for cell_x in low_x as usize..=high_x as usize {
                // narrow phase: does the disc touch this cell at all
                let min_x = cell_x as f32 * self.cell_size - half_width;
                let min_y = cell_y as f32 * self.cell_size - half_height;
                let nearest_x = self.x.max(min_x).min(min_x + self.cell_size);
                let nearest_y = self.y.max(min_y).min(min_y + self.cell_size);
                let dx = self.x - nearest_x;
                let dy = self.y - nearest_y;
                if dx * dx + dy * dy > radius_sq {
                    continue;
                }

                for &id in &self.cells[self.cell_index(cell_x, cell_y)] {
                    let record = self.objects[id as usize]
                        .as_ref()
                        .expect("cell names a missing object");
                    if record.active_index.is_some() {
                        continue;
                    }
                    let dx = record.x - self.x;
                    let dy = record.y - self.y;
                    if dx * dx + dy * dy <= radius_sq {
                        activate.push(id);
                    }
                }
            }
        }
    }

    fn activate(&mut self, id: ObjectId) {
        let index = self.active.len();
        self.active.push(id);
        self.objects[id as usize]
            .as_mut()
            .expect("activating a missing object")
            .active_index = Some(index);
        self.events.push(Event {
            kind: EventKind::Activate,
            id,
        });
    }

    fn deactivate(&mut self, id: ObjectId) {
        let index = self.objects[id as usize]
            .as_mut()
            .expect("deactivating a missing object")
            .active_index
            .take()
            .expect("deactivating an inactive object");
        self.active.swap_remove(index);
        if index < self.active.len() {
            let moved = self.active[index];
            self.objects[moved as usize]
                .as_mut()
                .expect("active set names a missing object")
                .active_index = Some(index);
        }
        self.events.push(Event {
            kind: EventKind::Deactivate,
            id,
        });
    }

    /// O(N) structural cross-check of arena, cells and active set. Debug
    /// builds only; release is a no-op.
    pub fn validate(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        for (cell_index, cell) in self.cells.iter().enumerate() {
            for &id in cell {
                let record = self.objects[id as usize]
                    .as_ref()
                    .expect("cell names a missing object");
                assert_eq!(record.cell, cell_index);
                let coords = self
                    .cell_coords(record.x, record.y)
                    .expect("recorded position left the grid");
                assert_eq!(self.cell_index(coords.0, coords.1), cell_index);
            }
        }
        for (id, record) in self.objects.iter().enumerate() {
            if let Some(record) = record {
                assert!(self.cells[record.cell].contains(&(id as ObjectId)));
                if let Some(active_index) = record.active_index {
                    assert_eq!(self.active[active_index], id as ObjectId);
                }
            }
        }
        for (index, &id) in self.active.iter().enumerate() {
            let record = self.objects[id as usize]
                .as_ref()
                .expect("active set names a missing object");
            assert_eq!(record.active_index, Some(index));
        }
    }
}
