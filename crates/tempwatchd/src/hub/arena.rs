//! Slot arena for push clients.
//!
//! Removed slots are recycled through a free list. Each slot carries a
//! generation counter so a stale [`ClientId`] never addresses a newer client
//! that reused its slot. Insert and remove are O(1).

use std::fmt;

/// Generation-tagged slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId {
    index: u32,
    generation: u32,
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}.{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug)]
pub struct ClientArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for ClientArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ClientArena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores `value`, reusing a free slot when one exists.
    pub fn insert(&mut self, value: T) -> ClientId {
        self.len += 1;

        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                slot.value = Some(value);
                return ClientId {
                    index,
                    generation: slot.generation,
                };
            }
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        ClientId {
            index,
            generation: 0,
        }
    }

    /// Removes the client. Returns `None` for unknown or stale ids.
    pub fn remove(&mut self, id: ClientId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, id: ClientId) -> Option<&T> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Live clients with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (ClientId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    ClientId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_remove() {
        let mut arena = ClientArena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.len(), 2);

        assert_eq!(arena.remove(a), Some("a"));
        assert_eq!(arena.remove(a), None);
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_stale_id_does_not_reach_reused_slot() {
        let mut arena = ClientArena::new();
        let old = arena.insert(1);
        arena.remove(old);
        let new = arena.insert(2);

        assert_ne!(old, new);
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.remove(old), None);
        assert_eq!(arena.get(new), Some(&2));
    }

    #[test]
    fn test_iter_skips_holes() {
        let mut arena = ClientArena::new();
        let ids: Vec<_> = (0..5).map(|i| arena.insert(i)).collect();
        arena.remove(ids[1]);
        arena.remove(ids[3]);

        let live: Vec<_> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(live, vec![0, 2, 4]);
        assert!(arena.iter().all(|(id, v)| arena.get(id) == Some(v)));
    }
}
