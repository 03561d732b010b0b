use crate::game::object::{ActiveObject, DatabaseObject};
use crate::math::Vec3;
use crate::net::stream::{self, bits_required, Stream};
use crate::sim::activation::{ActivationSystem, EventKind};
use crate::sim::authority::AuthorityManager;
use crate::sim::interaction::{InteractionManager, InteractionPair};
use crate::sim::priority::PrioritySet;
use crate::sim::response::{Response, ResponseQueue};
use crate::sim::{ObjectId, PlayerId};

/// Static world and session parameters.
#[derive(Debug, Copy, Clone)]
pub struct Config {
    pub max_players: PlayerId,
    pub max_objects: usize,
    pub cell_size: f32,
    pub cell_width: usize,
    pub cell_height: usize,
    pub activation_radius: f32,
    /// Seconds an unrefreshed authority claim survives.
    pub authority_timeout: f32,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            max_players: 2,
            max_objects: 1024,
            cell_size: 4.0,
            cell_width: 16,
            cell_height: 16,
            activation_radius: 16.0,
            authority_timeout: 1.0,
        }
    }
}

struct Player {
    joined: bool,
    focus: Option<ObjectId>,
}

/// A state update that failed its authority check on arrival, parked for
/// retry.
struct PendingUpdate<A> {
    id: ObjectId,
    state: A,
    player: PlayerId,
}

impl<A> Response for PendingUpdate<A> {
    fn object_id(&self) -> ObjectId {
        self.id
    }
}

/// One world of replicated objects. Owns the object database, the
/// activation system centered on the local player's focus object, per-object
/// authority and send priorities. The physics solver and the render loop
/// stay outside: contact pairs come in through `walk_authority`, state moves
/// through `set_object_state` and the packet builders.
pub struct Instance<DB: DatabaseObject> {
    config: Config,
    flags: u32,
    objects: Vec<DB>,
    active: Vec<DB::Active>,
    activation: ActivationSystem,
    authority: AuthorityManager,
    priorities: PrioritySet,
    interactions: InteractionManager,
    responses: ResponseQueue<PendingUpdate<DB::Active>>,
    players: Vec<Player>,
    local_player: Option<PlayerId>,
}

impl<DB: DatabaseObject> Instance<DB> {
    pub fn new(config: Config) -> Instance<DB> {
        Instance {
            config,
            flags: 0,
            objects: Vec::new(),
            active: Vec::new(),
            activation: ActivationSystem::new(
                config.max_objects,
                config.activation_radius,
                config.cell_width,
                config.cell_height,
                config.cell_size,
                64,
                64,
            ),
            authority: AuthorityManager::new(config.max_players),
            priorities: PrioritySet::new(),
            interactions: InteractionManager::new(),
            responses: ResponseQueue::new(),
            players: (0..config.max_players)
                .map(|_| Player {
                    joined: false,
                    focus: None,
                })
                .collect(),
            local_player: None,
        }
    }

    /// Drops the whole world and every session, keeping the configuration.
    pub fn shutdown(&mut self) {
        *self = Instance::new(self.config);
    }

    /// Adds a record to the database. Ids are assigned in insertion order
    /// starting at 1. The position must lie inside the configured world.
    pub fn add_object(&mut self, object: DB) -> ObjectId {
        assert!(
            self.objects.len() < self.config.max_objects,
            "object database full"
        );
        let id = self.objects.len() as ObjectId + 1;
        let position = object.position();
        self.objects.push(object);
        self.activation
            .insert_object(id, position.x, position.y)
            .expect("object placed outside the world");
        id
    }

    #[inline]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Database record, live or asleep.
    pub fn object(&self, id: ObjectId) -> &DB {
        &self.objects[id as usize - 1]
    }

    pub fn on_player_joined(&mut self, player: PlayerId) {
        let slot = &mut self.players[player as usize];
        assert!(!slot.joined, "player already joined");
        slot.joined = true;
    }

    pub fn on_player_left(&mut self, player: PlayerId) {
        let slot = &mut self.players[player as usize];
        slot.joined = false;
        slot.focus = None;
        if self.local_player == Some(player) {
            self.local_player = None;
        }
    }

    #[inline]
    pub fn is_player_joined(&self, player: PlayerId) -> bool {
        self.players[player as usize].joined
    }

    pub fn set_player_focus(&mut self, player: PlayerId, focus: ObjectId) {
        assert!(self.players[player as usize].joined, "player not in game");
        assert!(
            focus >= 1 && (focus as usize) <= self.objects.len(),
            "focus object does not exist"
        );
        self.players[player as usize].focus = Some(focus);
    }

    #[inline]
    pub fn player_focus(&self, player: PlayerId) -> Option<ObjectId> {
        self.players[player as usize].focus
    }

    pub fn set_local_player(&mut self, player: PlayerId) {
        assert!(self.players[player as usize].joined, "player not in game");
        self.local_player = Some(player);
    }

    #[inline]
    pub fn local_player(&self) -> Option<PlayerId> {
        self.local_player
    }

    #[inline]
    pub fn in_game(&self) -> bool {
        self.local_player.is_some()
    }

    #[inline]
    pub fn set_flag(&mut self, flag: u32) {
        self.flags |= flag;
    }

    #[inline]
    pub fn clear_flag(&mut self, flag: u32) {
        self.flags &= !flag;
    }

    #[inline]
    pub fn is_flag_set(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    #[inline]
    pub fn active_objects(&self) -> &[DB::Active] {
        &self.active
    }

    #[inline]
    pub fn active_object_count(&self) -> usize {
        self.active.len()
    }

    #[inline]
    pub fn is_object_active(&self, id: ObjectId) -> bool {
        self.activation.is_active(id)
    }

    #[inline]
    pub fn object_authority(&self, id: ObjectId) -> PlayerId {
        self.authority.authority(id)
    }

    /// Center of the activation disc.
    pub fn origin(&self) -> Vec3 {
        Vec3::new(self.activation.x(), self.activation.y(), 0.0)
    }

    /// One cooperative tick: follow the local focus object, run activation,
    /// retry parked updates, reassert player authority, age claims and
    /// accumulate send priorities.
    pub fn update(&mut self, dt: f32) {
        let focus_position = self
            .local_player
            .and_then(|player| self.players[player as usize].focus)
            .map(|focus| self.object_position(focus));
        match focus_position {
            Some(position) => {
                self.activation.set_enabled(true);
                self.activation.move_activation_point(position.x, position.y);
            }
            None => self.activation.set_enabled(false),
        }

        self.activation.update(dt);
        self.process_activation_events();
        self.retry_pending_updates();

        for player in 0..self.players.len() {
            let slot = &self.players[player];
            if !slot.joined {
                continue;
            }
            if let Some(focus) = slot.focus {
                if self.activation.is_active(focus) {
                    self.authority.set_authority(focus, player as PlayerId, true);
                }
            }
        }
        self.authority.update(dt, self.config.authority_timeout);

        for entry in &self.active {
            if let Some(index) = self.priorities.index_of(entry.id()) {
                let priority = self.priorities.priority_at_index(index);
                self.priorities
                    .set_priority_at_index(index, priority + entry.priority() * dt);
            }
        }
    }

    /// Replaces the replicated state of an object, re-bucketing the grid.
    /// Active objects update in place; sleeping objects update their
    /// database record. False when the new position is outside the world.
    pub fn set_object_state(&mut self, id: ObjectId, state: &DB::Active) -> bool {
        debug_assert_eq!(state.id(), id);
        assert!(id >= 1 && (id as usize) <= self.objects.len());

        let position = state.position();
        if self
            .activation
            .move_object(id, position.x, position.y)
            .is_err()
        {
            return false;
        }
        if let Some(index) = self.active.iter().position(|entry| entry.id() == id) {
            self.active[index] = state.clone();
        } else {
            self.objects[id as usize - 1].from_active(state);
        }
        true
    }

    /// Applies a remote state update if `player` may assert authority over
    /// the object; otherwise parks it in the response queue for retry.
    pub fn apply_object_state(&mut self, id: ObjectId, state: &DB::Active, player: PlayerId) -> bool {
        if self.authority.set_authority(id, player, false) {
            self.set_object_state(id, state)
        } else {
            self.responses.queue_response(PendingUpdate {
                id,
                state: state.clone(),
                player,
            });
            false
        }
    }

    fn retry_pending_updates(&mut self) {
        let mut still_pending = Vec::new();
        while let Some(pending) = self.responses.pop_response() {
            if self.authority.set_authority(pending.id, pending.player, false) {
                self.set_object_state(pending.id, &pending.state);
            } else {
                still_pending.push(pending);
            }
        }
        for pending in still_pending {
            self.responses.queue_response(pending);
        }
    }

    /// Propagates player authority across the contact graph: everything
    /// transitively touching a player's focus object falls under that
    /// player, except objects another player already owns.
    pub fn walk_authority(&mut self, pairs: &[InteractionPair]) {
        let max_players = self.config.max_players;
        self.interactions.prep_interactions(self.objects.len() + 1);

        for player in 0..self.players.len() {
            let player = player as PlayerId;
            let focus = match (
                self.players[player as usize].joined,
                self.players[player as usize].focus,
            ) {
                (true, Some(focus)) if self.activation.is_active(focus) => focus,
                _ => continue,
            };

            let ignores: Vec<bool> = (0..=self.objects.len() as ObjectId)
                .map(|id| {
                    let owner = self.authority.authority(id);
                    owner != max_players && owner != player
                })
                .collect();

            self.interactions.walk_interactions(focus, pairs, &ignores);

            for id in 1..=self.objects.len() as ObjectId {
                if self.interactions.is_interacting(id) && self.activation.is_active(id) {
                    self.authority.set_authority(id, player, false);
                }
            }
        }
    }

    /// Packs the highest-priority active objects into `stream` until the
    /// bit budget runs out. Sent objects drop back to zero priority.
    /// Returns how many objects were packed.
    pub fn build_state_packet(
        &mut self,
        stream: &mut Stream<'_>,
        max_bits: usize,
    ) -> stream::Result<usize> {
        self.priorities.sort_objects();

        // per entry: continue flag, id, owner, object payload
        let entry_bits = 1
            + bits_required(1, self.config.max_objects as u32) as usize
            + bits_required(0, self.config.max_players as u32) as usize
            + DB::Active::PACKED_BITS;

        let mut sent: Vec<usize> = Vec::new();
        for index in 0..self.priorities.object_count() {
            if stream.bits_processed() + entry_bits + 1 > max_bits {
                break;
            }
            let id = self.priorities.priority_object(index);
            let entry_index = match self.active.iter().position(|entry| entry.id() == id) {
                Some(entry_index) => entry_index,
                None => continue,
            };

            let mut more = true;
            stream.serialize_boolean(&mut more)?;
            let mut wire_id = id;
            stream.serialize_integer(&mut wire_id, 1, self.config.max_objects as u32)?;
            let mut owner = self.authority.authority(id) as u32;
            stream.serialize_integer(&mut owner, 0, self.config.max_players as u32)?;
            self.active[entry_index].pack(stream)?;
            sent.push(index);
        }

        let mut more = false;
        stream.serialize_boolean(&mut more)?;

        let packed = sent.len();
        for index in sent {
            self.priorities.set_priority_at_index(index, 0.0);
        }
        Ok(packed)
    }

    /// Unpacks a state packet built by a peer, filtering every entry through
    /// the authority rules for `from_player`. Returns how many entries
    /// applied immediately.
    pub fn process_state_packet(
        &mut self,
        stream: &mut Stream<'_>,
        from_player: PlayerId,
    ) -> stream::Result<usize> {
        let mut applied = 0;
        loop {
            let mut more = false;
            stream.serialize_boolean(&mut more)?;
            if !more {
                break;
            }

            let mut id = 0u32;
            stream.serialize_integer(&mut id, 1, self.config.max_objects as u32)?;
            let mut owner = 0u32;
            stream.serialize_integer(&mut owner, 0, self.config.max_players as u32)?;

            let mut state = DB::Active::default();
            state.set_id(id);
            state.unpack(stream)?;

            if self.apply_object_state(id, &state, from_player) {
                applied += 1;
            }
        }
        Ok(applied)
    }

    fn object_position(&self, id: ObjectId) -> Vec3 {
        match self.active.iter().find(|entry| entry.id() == id) {
            Some(entry) => entry.position(),
            None => self.objects[id as usize - 1].position(),
        }
    }

    fn process_activation_events(&mut self) {
        for index in 0..self.activation.event_count() {
            let event = self.activation.event(index);
            match event.kind {
                EventKind::Activate => {
                    let entry = self.objects[event.id as usize - 1].to_active(event.id);
                    self.active.push(entry);
                    self.priorities.add_object(event.id);
                }
                EventKind::Deactivate => {
                    let entry_index = self
                        .active
                        .iter()
                        .position(|entry| entry.id() == event.id)
                        .expect("deactivating an object with no live entry");
                    let entry = self.active.swap_remove(entry_index);
                    self.objects[event.id as usize - 1].from_active(&entry);
                    self.priorities.remove_object(event.id);
                }
            }
        }
        self.activation.clear_events();
    }
}
