use crate::sim::{ObjectId, PlayerId};
use hashbrown::HashMap;

struct Entry {
    owner: PlayerId,
    age: f32,
}

/// Tracks which player currently owns each object. `max_players` doubles as
/// the "no owner" sentinel. Contested claims go to the lower player id;
/// entries decay back to the sentinel unless reasserted.
pub struct AuthorityManager {
    max_players: PlayerId,
    entries: HashMap<ObjectId, Entry>,
}

impl AuthorityManager {
    pub fn new(max_players: PlayerId) -> AuthorityManager {
        assert!(max_players >= 1);
        AuthorityManager {
            max_players,
            entries: HashMap::new(),
        }
    }

    #[inline]
    pub fn max_players(&self) -> PlayerId {
        self.max_players
    }

    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Current owner, or the sentinel when nobody owns the object.
    pub fn authority(&self, id: ObjectId) -> PlayerId {
        self.entries
            .get(&id)
            .map_or(self.max_players, |entry| entry.owner)
    }

    /// Claims `id` for `player`. Succeeds when the object is unowned, when
    /// `player` already owns it (restarting the decay timer), when the
    /// current owner has a higher id, or when forced.
    pub fn set_authority(&mut self, id: ObjectId, player: PlayerId, force: bool) -> bool {
        assert!(player < self.max_players, "player id out of range");
        let current = self.authority(id);
        let granted = force || current == self.max_players || current == player || player < current;
        if granted {
            self.entries.insert(id, Entry { owner: player, age: 0.0 });
        }
        granted
    }

    /// Ages every entry; anything older than `timeout` reverts to no owner.
    pub fn update(&mut self, dt: f32, timeout: f32) {
        self.entries.retain(|_, entry| {
            entry.age += dt;
            entry.age <= timeout
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_PLAYERS: PlayerId = 2;

    #[test]
    fn test_initial_conditions() {
        let manager = AuthorityManager::new(MAX_PLAYERS);
        assert_eq!(manager.entry_count(), 0);
        for id in 1..=40 {
            assert_eq!(manager.authority(id), MAX_PLAYERS);
        }
    }

    #[test]
    fn test_set_authority() {
        let mut manager = AuthorityManager::new(MAX_PLAYERS);
        for id in 1..=40 {
            assert!(manager.set_authority(id, 0, false));
        }
        for id in 1..=40 {
            assert_eq!(manager.authority(id), 0);
        }
    }

    #[test]
    fn test_clear() {
        let mut manager = AuthorityManager::new(MAX_PLAYERS);
        for id in 1..=40 {
            assert!(manager.set_authority(id, 0, false));
        }

        manager.clear();

        assert_eq!(manager.entry_count(), 0);
        for id in 1..=40 {
            assert_eq!(manager.authority(id), MAX_PLAYERS);
        }
    }

    #[test]
    fn test_win_tie_break() {
        let mut manager = AuthorityManager::new(MAX_PLAYERS);
        for id in 1..=40 {
            assert!(manager.set_authority(id, 1, false));
        }
        for id in 1..=40 {
            assert!(manager.set_authority(id, 0, false));
        }
        for id in 1..=40 {
            assert_eq!(manager.authority(id), 0);
        }
    }

    #[test]
    fn test_lose_tie_break() {
        let mut manager = AuthorityManager::new(MAX_PLAYERS);
        for id in 1..=40 {
            assert!(manager.set_authority(id, 0, false));
        }
        for id in 1..=40 {
            assert!(!manager.set_authority(id, 1, false));
        }
        for id in 1..=40 {
            assert_eq!(manager.authority(id), 0);
        }
    }

    #[test]
    fn test_force_authority() {
        let mut manager = AuthorityManager::new(MAX_PLAYERS);
        for id in 1..=40 {
            assert!(manager.set_authority(id, 0, false));
        }
        for id in 1..=40 {
            assert!(manager.set_authority(id, 1, true));
        }
        for id in 1..=40 {
            assert_eq!(manager.authority(id), 1);
        }
    }

    #[test]
    fn test_entries_age_back_to_default() {
        let mut manager = AuthorityManager::new(MAX_PLAYERS);
        for id in 1..=40 {
            assert!(manager.set_authority(id, 1, false));
        }
        for _ in 0..100 {
            manager.update(1.0, 2.0);
        }
        assert_eq!(manager.entry_count(), 0);
        for id in 1..=40 {
            assert_eq!(manager.authority(id), MAX_PLAYERS);
        }
    }

    #[test]
    fn test_reassert_refreshes_timer() {
        let mut manager = AuthorityManager::new(MAX_PLAYERS);
        assert!(manager.set_authority(1, 0, false));
        for _ in 0..100 {
            manager.update(1.0, 2.0);
            // the owner keeps claiming the object, so it never decays
            assert!(manager.set_authority(1, 0, false));
        }
        assert_eq!(manager.authority(1), 0);
    }
}
