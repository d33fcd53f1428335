//! Weak channel membership for one mixer.

use crate::channel::{ChannelKey, ChannelSlots};
use crate::handle::ChannelHandle;

/// One registered channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    /// Slot key of the channel.
    pub key: ChannelKey,
    /// Native handle currently plugged into the mixer stream, or null.
    pub attached: ChannelHandle,
}

/// The set of channels a mixer holds, by key.
///
/// Keys never keep a channel alive. A member whose channel has been dropped
/// stays in the registry until [`take_dead`](MemberRegistry::take_dead) sweeps
/// it, but is never counted.
#[derive(Debug, Default)]
pub struct MemberRegistry {
    members: Vec<Member>,
}

impl MemberRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key` as a member. Returns `false` if it already was one.
    pub fn insert(&mut self, key: ChannelKey) -> bool {
        let duplicate = self.contains(key);
        debug_assert!(!duplicate, "channel {key} registered twice");
        if duplicate {
            return false;
        }
        self.members.push(Member {
            key,
            attached: ChannelHandle::NULL,
        });
        true
    }

    /// Forgets `key`, returning its entry if it was a member.
    pub fn remove(&mut self, key: ChannelKey) -> Option<Member> {
        let pos = self.members.iter().position(|m| m.key == key)?;
        Some(self.members.remove(pos))
    }

    /// Whether `key` is registered.
    pub fn contains(&self, key: ChannelKey) -> bool {
        self.members.iter().any(|m| m.key == key)
    }

    /// Entry for `key`.
    pub fn get(&self, key: ChannelKey) -> Option<&Member> {
        self.members.iter().find(|m| m.key == key)
    }

    /// Mutable entry for `key`.
    pub fn get_mut(&mut self, key: ChannelKey) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.key == key)
    }

    /// Registered entries, live or not, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    /// Mutable registered entries, live or not.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Member> {
        self.members.iter_mut()
    }

    /// Keys of members whose channel is still alive.
    pub fn live_keys(&self, slots: &ChannelSlots) -> Vec<ChannelKey> {
        self.members
            .iter()
            .filter(|m| slots.is_live(m.key))
            .map(|m| m.key)
            .collect()
    }

    /// Number of members whose channel is still alive.
    pub fn live_count(&self, slots: &ChannelSlots) -> usize {
        self.members.iter().filter(|m| slots.is_live(m.key)).count()
    }

    /// Removes and returns every member whose channel has been dropped.
    pub fn take_dead(&mut self, slots: &ChannelSlots) -> Vec<Member> {
        let mut dead = Vec::new();
        self.members.retain(|m| {
            if slots.is_live(m.key) {
                true
            } else {
                dead.push(*m);
                false
            }
        });
        dead
    }

    /// Total entries including dead ones not yet swept.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether there are no entries at all.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_remove_contains() {
        let slots = ChannelSlots::new();
        let a = slots.allocate();
        let b = slots.allocate();
        let mut reg = MemberRegistry::new();

        assert!(reg.insert(a));
        assert!(reg.insert(b));
        assert!(reg.contains(a));
        assert_eq!(reg.live_count(&slots), 2);

        let removed = reg.remove(a).unwrap();
        assert_eq!(removed.key, a);
        assert!(!reg.contains(a));
        assert!(reg.remove(a).is_none());
        assert_eq!(reg.live_keys(&slots), vec![b]);
    }

    #[test]
    fn dropped_channels_are_not_counted() {
        let slots = ChannelSlots::new();
        let a = slots.allocate();
        let b = slots.allocate();
        let mut reg = MemberRegistry::new();
        reg.insert(a);
        reg.insert(b);

        slots.release(a);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.live_count(&slots), 1);

        let dead = reg.take_dead(&slots);
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].key, a);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn reused_slot_is_not_a_member() {
        let slots = ChannelSlots::new();
        let a = slots.allocate();
        let mut reg = MemberRegistry::new();
        reg.insert(a);
        slots.release(a);
        let fresh = slots.allocate();
        assert_eq!(fresh.index(), a.index());
        assert!(!reg.contains(fresh));
        assert_eq!(reg.live_count(&slots), 0);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "registered twice"))]
    fn duplicate_insert_is_rejected() {
        let slots = ChannelSlots::new();
        let a = slots.allocate();
        let mut reg = MemberRegistry::new();
        reg.insert(a);
        assert!(!reg.insert(a));
        assert_eq!(reg.len(), 1);
    }
}
