//! Generational slot arena backing the registry.
//!
//! Records live in a `Vec` of slots; vacated slots go on a free list for
//! reuse and each carries a generation counter so a stale [`SlotToken`]
//! can never resolve to a record that replaced the original. No unsafe
//! code; bounds checks and generation validation do the work.

use crate::token::SlotToken;

#[derive(Debug)]
enum Slot<T> {
    Occupied { value: T, generation: u32 },
    Vacant { next_free: Option<u32>, generation: u32 },
}

/// Slot arena with generation-checked access.
#[derive(Debug)]
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Arena<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a value and returns the token of the slot it occupies.
    pub(crate) fn insert(&mut self, value: T) -> SlotToken {
        let token = if let Some(free_index) = self.free_head {
            let slot = &mut self.slots[free_index as usize];
            match slot {
                Slot::Vacant {
                    next_free,
                    generation,
                } => {
                    let generation = *generation;
                    self.free_head = *next_free;
                    *slot = Slot::Occupied { value, generation };
                    SlotToken::new(free_index, generation)
                }
                Slot::Occupied { .. } => unreachable!("free list pointed to occupied slot"),
            }
        } else {
            let index = u32::try_from(self.slots.len()).expect("arena overflow");
            self.slots.push(Slot::Occupied {
                value,
                generation: 0,
            });
            SlotToken::new(index, 0)
        };
        self.len += 1;
        token
    }

    /// Removes the value the token refers to, if the token is still live.
    pub(crate) fn remove(&mut self, token: SlotToken) -> Option<T> {
        let slot = self.slots.get_mut(token.index() as usize)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == token.generation() => {
                let next_generation = generation.wrapping_add(1);
                let old = core::mem::replace(
                    slot,
                    Slot::Vacant {
                        next_free: self.free_head,
                        generation: next_generation,
                    },
                );
                self.free_head = Some(token.index());
                self.len -= 1;
                match old {
                    Slot::Occupied { value, .. } => Some(value),
                    Slot::Vacant { .. } => unreachable!(),
                }
            }
            _ => None,
        }
    }

    pub(crate) fn get(&self, token: SlotToken) -> Option<&T> {
        match self.slots.get(token.index() as usize)? {
            Slot::Occupied { value, generation } if *generation == token.generation() => {
                Some(value)
            }
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, token: SlotToken) -> Option<&mut T> {
        match self.slots.get_mut(token.index() as usize)? {
            Slot::Occupied { value, generation } if *generation == token.generation() => {
                Some(value)
            }
            _ => None,
        }
    }

    /// Iterates over occupied slots.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (SlotToken, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| match slot {
                Slot::Occupied { value, generation } => {
                    Some((SlotToken::new(i as u32, *generation), value))
                }
                Slot::Vacant { .. } => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let mut arena: Arena<&str> = Arena::with_capacity(4);
        assert!(arena.is_empty());

        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));

        assert_eq!(arena.remove(a), Some("a"));
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.remove(a), None);
    }

    #[test]
    fn reused_slot_gets_new_generation() {
        let mut arena: Arena<u32> = Arena::with_capacity(1);
        let first = arena.insert(10);
        arena.remove(first).expect("live token");

        let second = arena.insert(20);
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());

        // Stale token must not resolve to the new occupant.
        assert_eq!(arena.get(first), None);
        assert_eq!(arena.get(second), Some(&20));
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut arena: Arena<u32> = Arena::with_capacity(1);
        let token = arena.insert(1);
        *arena.get_mut(token).expect("live token") = 5;
        assert_eq!(arena.get(token), Some(&5));
    }

    #[test]
    fn iter_visits_only_occupied() {
        let mut arena: Arena<u32> = Arena::with_capacity(4);
        let a = arena.insert(1);
        let _b = arena.insert(2);
        let c = arena.insert(3);
        arena.remove(a).expect("live token");

        let mut seen: Vec<u32> = arena.iter().map(|(_, v)| *v).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![2, 3]);
        assert!(arena.iter().any(|(t, _)| t == c));
    }

    #[test]
    fn out_of_range_token_is_rejected() {
        let arena: Arena<u32> = Arena::with_capacity(0);
        assert_eq!(arena.get(SlotToken::new(99, 0)), None);
    }
}
