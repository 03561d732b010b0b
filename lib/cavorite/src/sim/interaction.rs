/// Unordered contact between two objects.
#[derive(Debug, Copy, Clone)]
pub struct InteractionPair {
    pub a: u32,
    pub b: u32,
}

/// Computes which objects are transitively in contact with a seed object.
/// The walk is a fixpoint scan over the pair list; small pair counts keep
/// the quadratic worst case harmless.
pub struct InteractionManager {
    interacting: Vec<bool>,
}

impl InteractionManager {
    pub fn new() -> InteractionManager {
        InteractionManager {
            interacting: Vec::new(),
        }
    }

    /// Sizes the flag table for `count` objects and clears every mark.
    pub fn prep_interactions(&mut self, count: usize) {
        self.interacting.clear();
        self.interacting.resize(count, false);
    }

    #[inline]
    pub fn is_interacting(&self, index: u32) -> bool {
        self.interacting
            .get(index as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Marks the connected component of `seed` in the contact graph. Nodes
    /// flagged in `ignores` terminate traversal through them.
    pub fn walk_interactions(&mut self, seed: u32, pairs: &[InteractionPair], ignores: &[bool]) {
        for flag in self.interacting.iter_mut() {
            *flag = false;
        }
        if (seed as usize) >= self.interacting.len() {
            return;
        }
        self.interacting[seed as usize] = true;

        loop {
            let mut marked = false;
            for pair in pairs {
                let a = pair.a as usize;
                let b = pair.b as usize;
                if a >= self.interacting.len() || b >= self.interacting.len() {
                    continue;
                }
                if self.interacting[a] == self.interacting[b] {
                    continue;
                }
                let target = if self.interacting[a] { b } else { a };
                if !ignores.get(target).copied().unwrap_or(false) {
                    self.interacting[target] = true;
                    marked = true;
                }
            }
            if !marked {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: u32, b: u32) -> InteractionPair {
        InteractionPair { a, b }
    }

    #[test]
    fn test_initial_conditions() {
        let mut manager = InteractionManager::new();
        manager.prep_interactions(100);
        for i in 0..100 {
            assert!(!manager.is_interacting(i));
        }
    }

    #[test]
    fn test_walk_interactions() {
        let mut manager = InteractionManager::new();
        manager.prep_interactions(200);

        // a, b, c, d form a touching ring
        let (a, b, c, d) = (10, 17, 100, 23);
        let pairs = [pair(a, b), pair(b, c), pair(c, d), pair(d, a)];

        let ignores = vec![false; 200];
        manager.walk_interactions(a, &pairs, &ignores);

        assert!(manager.is_interacting(a));
        assert!(manager.is_interacting(b));
        assert!(manager.is_interacting(c));
        assert!(manager.is_interacting(d));

        for i in 0..200 {
            if i == a || i == b || i == c || i == d {
                continue;
            }
            assert!(!manager.is_interacting(i));
        }
    }

    #[test]
    fn test_ignore_breaks_the_chain() {
        let mut manager = InteractionManager::new();
        manager.prep_interactions(200);

        let (a, b, c, d) = (10, 17, 100, 23);
        let pairs = [pair(a, b), pair(b, c), pair(c, d)];

        let mut ignores = vec![false; 200];
        ignores[c as usize] = true;

        manager.walk_interactions(a, &pairs, &ignores);

        assert!(manager.is_interacting(a));
        assert!(manager.is_interacting(b));
        assert!(!manager.is_interacting(c));
        assert!(!manager.is_interacting(d));
    }

    #[test]
    fn test_rewalk_clears_previous_marks() {
        let mut manager = InteractionManager::new();
        manager.prep_interactions(10);

        manager.walk_interactions(1, &[pair(1, 2)], &[false; 10]);
        assert!(manager.is_interacting(2));

        manager.walk_interactions(5, &[pair(5, 6)], &[false; 10]);
        assert!(manager.is_interacting(5));
        assert!(manager.is_interacting(6));
        assert!(!manager.is_interacting(1));
        assert!(!manager.is_interacting(2));
    }
}
