//! Property-based tests for mixgraph-core.
//!
//! Random edit sequences against the effect list and random add/remove
//! sequences against mixers, checked against the native state of the
//! in-memory backend after every step.

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use mixgraph_core::{
    Channel, EffectHandle, EffectKind, EffectParameters, MixerGraph, MixerNode, SoftBackend,
};

#[derive(Debug, Clone)]
enum ListOp {
    Push(usize),
    InsertRange(usize, Vec<usize>),
    Move(usize, usize),
    RemoveRange(usize, usize),
    Replace(usize, usize),
    Clear,
}

fn list_op() -> impl Strategy<Value = ListOp> {
    let kind = 0usize..EffectKind::ALL.len();
    prop_oneof![
        3 => kind.clone().prop_map(ListOp::Push),
        2 => (0usize..8, prop::collection::vec(kind.clone(), 1..4))
            .prop_map(|(at, kinds)| ListOp::InsertRange(at, kinds)),
        3 => (0usize..8, 0usize..8).prop_map(|(from, to)| ListOp::Move(from, to)),
        2 => (0usize..8, 1usize..3).prop_map(|(at, n)| ListOp::RemoveRange(at, n)),
        2 => (0usize..8, kind).prop_map(|(at, k)| ListOp::Replace(at, k)),
        1 => Just(ListOp::Clear),
    ]
}

fn params(kind: usize) -> Arc<EffectParameters> {
    Arc::new(EffectParameters::new(EffectKind::ALL[kind]))
}

fn bound_graph() -> (Arc<SoftBackend>, MixerGraph) {
    let backend = Arc::new(SoftBackend::with_device(1));
    let graph = MixerGraph::with_backend(backend.clone());
    graph.queue().bind_current_thread();
    graph.queue().tick();
    (backend, graph)
}

fn apply(node: &MixerNode, op: &ListOp) {
    let list = node.effects();
    // Out-of-range edits are rejected by the list and emit nothing.
    match op {
        ListOp::Push(k) => list.push(params(*k)),
        ListOp::InsertRange(at, kinds) => {
            list.insert_range(*at, kinds.iter().map(|k| params(*k)));
        }
        ListOp::Move(from, to) => {
            list.move_item(*from, *to);
        }
        ListOp::RemoveRange(at, n) => {
            list.remove_range(*at, *n);
        }
        ListOp::Replace(at, k) => {
            list.replace(*at, params(*k));
        }
        ListOp::Clear => list.clear(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// After any sequence of list edits, every entry's priority equals its
    /// index, the chain mirrors the list, and the backend holds exactly the
    /// chain's handles in the same order.
    #[test]
    fn chain_tracks_list(ops in prop::collection::vec(list_op(), 1..40)) {
        let (backend, graph) = bound_graph();
        let node = graph.create_mixer("fx");
        let stream = node.stream_handle();

        for op in &ops {
            apply(&node, op);

            let snapshot = node.effect_snapshot();
            let list = node.effects().to_vec();
            prop_assert_eq!(snapshot.len(), list.len());
            for (i, (entry, item)) in snapshot.iter().zip(&list).enumerate() {
                prop_assert_eq!(entry.priority, i as u32);
                prop_assert_eq!(entry.kind, item.kind());
                prop_assert!(entry.handle.is_allocated());
            }

            let native = backend.effects_on(stream);
            let ours: Vec<EffectHandle> = snapshot.iter().map(|e| e.handle).collect();
            let theirs: Vec<EffectHandle> = native.iter().map(|e| e.handle).collect();
            prop_assert_eq!(ours, theirs);
            prop_assert_eq!(backend.effect_count(), snapshot.len());
        }
    }

    /// Moving an entry keeps its native handle.
    #[test]
    fn move_preserves_handle(
        kinds in prop::collection::vec(0usize..EffectKind::ALL.len(), 2..8),
        from_seed in any::<usize>(),
        to_seed in any::<usize>(),
    ) {
        let (_backend, graph) = bound_graph();
        let node = graph.create_mixer("fx");
        node.effects().insert_range(0, kinds.iter().map(|k| params(*k)));

        let len = kinds.len();
        let (from, to) = (from_seed % len, to_seed % len);
        let before = node.effect_snapshot();
        prop_assert!(node.effects().move_item(from, to));
        let after = node.effect_snapshot();

        prop_assert_eq!(after[to].handle, before[from].handle);
        let before_set: BTreeSet<_> = before.iter().map(|e| e.handle).collect();
        let after_set: BTreeSet<_> = after.iter().map(|e| e.handle).collect();
        prop_assert_eq!(before_set, after_set);
    }

    /// `contains` reflects the net effect of any add/remove sequence across
    /// two mixers, and a channel is plugged natively into exactly the stream
    /// of the mixer that holds it.
    #[test]
    fn membership_net_effect(
        ops in prop::collection::vec((0usize..4, 0usize..2, any::<bool>()), 1..40),
    ) {
        let (backend, graph) = bound_graph();
        let mixers = [graph.create_mixer("a"), graph.create_mixer("b")];
        let channels: Vec<Channel> = (0..4)
            .map(|_| {
                let c = graph.create_channel();
                c.set_handle(backend.create_channel(44_100, 1 << 16));
                c
            })
            .collect();
        let mut owner: [Option<usize>; 4] = [None; 4];

        for (c, m, add) in ops {
            if add {
                mixers[m].add(&channels[c]);
                owner[c] = Some(m);
            } else {
                mixers[m].remove(&channels[c]);
                if owner[c] == Some(m) {
                    owner[c] = None;
                }
            }

            for (i, channel) in channels.iter().enumerate() {
                for (j, mixer) in mixers.iter().enumerate() {
                    prop_assert_eq!(mixer.contains(channel), owner[i] == Some(j));
                }
                let plugged = backend.channel_mixer(channel.handle());
                let expected = owner[i].map(|j| mixers[j].stream_handle());
                prop_assert_eq!(plugged, expected);
            }
        }
        let total: usize = mixers.iter().map(|m| m.count()).sum();
        prop_assert_eq!(total, owner.iter().filter(|o| o.is_some()).count());
    }
}
