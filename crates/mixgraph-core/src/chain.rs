//! Reconciliation of an observed effect list against native effect handles.
//!
//! A mixer's [`EffectChain`] mirrors its
//! [`ObservableList`](crate::ObservableList) of parameters entry for entry.
//! Every [`ListChange`] is applied by [`EffectChain::apply`], the single place
//! where priorities are reassigned, so after any change
//! `slots[i].priority == i` holds for every entry.
//!
//! Priority assignment has two paths:
//!
//! - **Cheap path**: an entry that already owns a native handle only has its
//!   priority updated. Reordering never tears down an effect's internal state.
//! - **First allocation**: an entry without a handle gets a new native effect
//!   created at its index, then its parameters pushed.
//!
//! Native calls are skipped while the mixer has no stream; entries stay
//! unallocated and are picked up by [`EffectChain::reapply`] once the stream
//! exists.

use std::ops::Range;
use std::sync::Arc;

use crate::backend::Backend;
use crate::effect::EffectParameters;
use crate::handle::{EffectHandle, StreamHandle};
use crate::observable::ListChange;

/// One entry of a mixer's effect chain.
#[derive(Debug, Clone)]
pub struct EffectSlot {
    /// Caller-owned parameters for this entry.
    pub parameters: Arc<EffectParameters>,
    /// Native effect handle, null until allocated.
    pub handle: EffectHandle,
    /// Zero-based position in the chain.
    pub priority: u32,
}

impl EffectSlot {
    fn new(parameters: Arc<EffectParameters>) -> Self {
        Self {
            parameters,
            handle: EffectHandle::NULL,
            priority: 0,
        }
    }
}

/// The native target a chain is reconciled against.
#[derive(Clone, Copy)]
pub struct ChainTarget<'a> {
    /// Backend used for effect calls.
    pub backend: &'a dyn Backend,
    /// Mixer stream the effects live on. Null while no stream exists.
    pub stream: StreamHandle,
    /// Mixer name, for logging.
    pub mixer: &'a str,
}

/// Ordered effect entries kept in lockstep with an observed list.
#[derive(Debug, Default)]
pub struct EffectChain {
    slots: Vec<EffectSlot>,
}

impl EffectChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries in chain order.
    pub fn slots(&self) -> &[EffectSlot] {
        &self.slots
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of entries holding a native handle.
    pub fn allocated(&self) -> usize {
        self.slots.iter().filter(|s| s.handle.is_allocated()).count()
    }

    /// Applies one observed list change.
    pub fn apply(&mut self, change: ListChange<Arc<EffectParameters>>, target: ChainTarget<'_>) {
        match change {
            ListChange::Insert { index, items } => {
                let at = index.unwrap_or(0).min(self.slots.len());
                let count = items.len();
                self.slots
                    .splice(at..at, items.into_iter().map(EffectSlot::new));
                tracing::trace!(mixer = target.mixer, at, count, "effects inserted");
                self.assign_priorities(at..self.slots.len(), target);
            }
            ListChange::Move { from, to } => {
                if from >= self.slots.len() || to >= self.slots.len() {
                    tracing::warn!(mixer = target.mixer, from, to, "effect move out of range");
                    return;
                }
                let slot = self.slots.remove(from);
                self.slots.insert(to, slot);
                self.assign_priorities(from.min(to)..self.slots.len(), target);
            }
            ListChange::Remove { index, count } => {
                let start = index.min(self.slots.len());
                let end = index.saturating_add(count).min(self.slots.len());
                let removed: Vec<_> = self.slots.drain(start..end).collect();
                for mut slot in removed {
                    release(&mut slot, target);
                }
                self.assign_priorities(start..self.slots.len(), target);
            }
            ListChange::Replace { index, item } => {
                let Some(slot) = self.slots.get_mut(index) else {
                    tracing::warn!(mixer = target.mixer, index, "effect replace out of range");
                    return;
                };
                release(slot, target);
                *slot = EffectSlot::new(item);
                self.assign_priorities(index..index + 1, target);
            }
            ListChange::Reset => {
                self.release_all(target);
                self.slots.clear();
            }
        }
    }

    /// Brings every entry's priority (and allocation) up to date.
    ///
    /// Used after a stream is (re)created: equivalent to a fresh insert of the
    /// whole chain.
    pub fn reapply(&mut self, target: ChainTarget<'_>) {
        self.assign_priorities(0..self.slots.len(), target);
    }

    /// Releases every native handle but keeps the entries.
    pub fn release_all(&mut self, target: ChainTarget<'_>) {
        for slot in &mut self.slots {
            release(slot, target);
        }
    }

    fn assign_priorities(&mut self, range: Range<usize>, target: ChainTarget<'_>) {
        for index in range {
            let Some(slot) = self.slots.get_mut(index) else {
                break;
            };
            let priority = index as u32;
            slot.priority = priority;

            if slot.handle.is_allocated() {
                if let Err(err) = target.backend.effect_set_priority(slot.handle, priority) {
                    tracing::warn!(
                        mixer = target.mixer,
                        effect = %slot.handle,
                        error = %err,
                        "failed to update effect priority"
                    );
                }
                continue;
            }

            if target.stream.is_null() {
                continue;
            }
            let kind = slot.parameters.kind();
            match target.backend.effect_set(target.stream, kind, priority) {
                Ok(handle) => {
                    slot.handle = handle;
                    if let Err(err) = target.backend.effect_set_parameters(handle, &slot.parameters)
                    {
                        tracing::warn!(
                            mixer = target.mixer,
                            effect = %handle,
                            error = %err,
                            "failed to apply effect parameters"
                        );
                    }
                    tracing::trace!(mixer = target.mixer, effect = %handle, %kind, priority, "effect allocated");
                }
                Err(err) => {
                    tracing::warn!(
                        mixer = target.mixer,
                        %kind,
                        error = %err,
                        "failed to allocate effect"
                    );
                }
            }
        }
    }
}

fn release(slot: &mut EffectSlot, target: ChainTarget<'_>) {
    let Some(handle) = slot.handle.take() else {
        return;
    };
    if target.stream.is_null() {
        return;
    }
    if let Err(err) = target.backend.effect_remove(target.stream, handle) {
        tracing::warn!(
            mixer = target.mixer,
            effect = %handle,
            error = %err,
            "failed to remove effect"
        );
    }
}
