//! Generation-tagged mirror of an engine's positional arrays.
//!
//! The engine addresses joints, intervals and faces by position and fills a
//! removed position with its last element. A [`Mirror`] hands out stable
//! slotmap keys instead and tracks the engine position behind each key, so
//! a key to a removed element can never alias a live one.

use slotmap::{Key, SlotMap};

#[derive(Debug, Clone)]
struct Slot<T> {
    index: usize,
    value: T,
}

/// Keyed storage whose dense order matches an engine array.
#[derive(Debug, Clone)]
pub struct Mirror<K: Key, T> {
    slots: SlotMap<K, Slot<T>>,
    order: Vec<K>,
}

impl<K: Key, T> Default for Mirror<K, T> {
    fn default() -> Self {
        Self {
            slots: SlotMap::with_key(),
            order: Vec::new(),
        }
    }
}

impl<K: Key, T> Mirror<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value created at engine position `index`, which must be the
    /// end of the engine array.
    pub fn insert(&mut self, index: usize, value: T) -> K {
        debug_assert_eq!(index, self.order.len());
        let key = self.slots.insert(Slot { index, value });
        self.order.push(key);
        key
    }

    /// Remove a value. Returns its engine position and the value; the
    /// element that was last now lives at that position.
    pub fn remove(&mut self, key: K) -> Option<(usize, T)> {
        let slot = self.slots.remove(key)?;
        self.order.swap_remove(slot.index);
        if let Some(&moved) = self.order.get(slot.index)
            && let Some(moved_slot) = self.slots.get_mut(moved)
        {
            moved_slot.index = slot.index;
        }
        Some((slot.index, slot.value))
    }

    pub fn get(&self, key: K) -> Option<&T> {
        self.slots.get(key).map(|slot| &slot.value)
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.slots.get_mut(key).map(|slot| &mut slot.value)
    }

    /// Engine position of a key.
    pub fn index(&self, key: K) -> Option<usize> {
        self.slots.get(key).map(|slot| slot.index)
    }

    /// Key at an engine position.
    pub fn key_at(&self, index: usize) -> Option<K> {
        self.order.get(index).copied()
    }

    pub fn contains(&self, key: K) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys in engine order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.order.iter().copied()
    }

    /// Entries in engine order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> + '_ {
        self.order
            .iter()
            .filter_map(|&key| self.slots.get(key).map(|slot| (key, &slot.value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    slotmap::new_key_type! {
        struct TestKey;
    }

    #[test]
    fn test_remove_moves_last_into_hole() {
        let mut mirror: Mirror<TestKey, &str> = Mirror::new();
        let a = mirror.insert(0, "a");
        let b = mirror.insert(1, "b");
        let c = mirror.insert(2, "c");

        assert_eq!(mirror.remove(a), Some((0, "a")));
        assert_eq!(mirror.index(c), Some(0));
        assert_eq!(mirror.index(b), Some(1));
        assert_eq!(mirror.key_at(0), Some(c));
        assert_eq!(mirror.len(), 2);
    }

    #[test]
    fn test_stale_key_misses() {
        let mut mirror: Mirror<TestKey, u32> = Mirror::new();
        let first = mirror.insert(0, 1);
        mirror.remove(first);
        let second = mirror.insert(0, 2);
        assert!(!mirror.contains(first));
        assert_eq!(mirror.get(first), None);
        assert_eq!(mirror.get(second), Some(&2));
        assert_eq!(mirror.remove(first), None);
    }

    #[test]
    fn test_remove_last() {
        let mut mirror: Mirror<TestKey, u32> = Mirror::new();
        let a = mirror.insert(0, 1);
        let b = mirror.insert(1, 2);
        assert_eq!(mirror.remove(b), Some((1, 2)));
        assert_eq!(mirror.index(a), Some(0));
        let keys: Vec<_> = mirror.keys().collect();
        assert_eq!(keys, vec![a]);
    }
}
