// Property-based tests for generator invariants.
//
// Random controllers with nested machines, colliding names, shared motions,
// and arbitrary cross-machine edges are generated, then checked for:
// 1. Determinism: two runs give identical output
// 2. Uniqueness: every allocated identifier is distinct
// 3. Cache discipline: every `objectCache["X"]` read has a matching write
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use std::collections::HashSet;

use ctrlgen::codegen::{codegen, GenOptions};
use ctrlgen::id::*;
use ctrlgen::model::*;
use proptest::prelude::*;

// ── Controller generator ────────────────────────────────────────────────────

/// Names drawn from a small pool so collisions are common.
const NAMES: &[&str] = &["Idle", "Walk", "Idle", "", "1st", "Run (fast)", "Base"];

#[derive(Debug, Clone)]
struct Shape {
    /// For machines 1..: parent index (mod i), or a new layer root.
    parents: Vec<(bool, usize)>,
    /// Per state: owning machine and name.
    states: Vec<(usize, usize)>,
    /// Per state: optional motion.
    state_motions: Vec<Option<usize>>,
    /// Clip/tree flags and names; trees take the next motion as a child.
    motions: Vec<(bool, usize)>,
    /// (source state, to machine?, destination index)
    transitions: Vec<(usize, bool, usize)>,
    /// (owner machine, source machine, destination state)
    machine_edges: Vec<(usize, usize, usize)>,
    /// Per machine: default state index, if any.
    defaults: Vec<Option<usize>>,
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    (
        prop::collection::vec((any::<bool>(), 0usize..64), 0..6),
        prop::collection::vec((0usize..64, 0usize..64), 1..12),
        prop::collection::vec(prop::option::of(0usize..64), 0..12),
        prop::collection::vec((any::<bool>(), 0usize..64), 0..5),
        prop::collection::vec((0usize..64, any::<bool>(), 0usize..64), 0..16),
        prop::collection::vec((0usize..64, 0usize..64, 0usize..64), 0..6),
        prop::collection::vec(prop::option::of(0usize..64), 0..7),
    )
        .prop_map(
            |(parents, states, state_motions, motions, transitions, machine_edges, defaults)| Shape {
                parents,
                states,
                state_motions,
                motions,
                transitions,
                machine_edges,
                defaults,
            },
        )
}

fn name(i: usize) -> &'static str {
    NAMES[i % NAMES.len()]
}

fn build(shape: &Shape) -> Controller {
    let mut c = Controller::named("Prop");

    let root = c.add_machine(StateMachine::named(name(0)));
    c.add_layer(Layer {
        name: "Base".into(),
        machine: root,
        ..Layer::default()
    });
    for (i, &(new_layer, parent)) in shape.parents.iter().enumerate() {
        let existing = i + 1;
        let machine = StateMachine::named(name(parent + i));
        if new_layer {
            let m = c.add_machine(machine);
            c.add_layer(Layer {
                name: name(parent).into(),
                machine: m,
                ..Layer::default()
            });
        } else {
            c.add_machine_to(MachineId((parent % existing) as u32), machine, Vec3::default());
        }
    }
    let machine_count = c.machines.len();

    for &(is_tree, n) in &shape.motions {
        let motion = if is_tree {
            Motion::BlendTree(BlendTree::named(name(n)))
        } else {
            Motion::Clip(Clip::named(name(n)))
        };
        c.add_motion(motion);
    }
    // Trees blend over the motion after them, so nesting stays acyclic.
    let motion_count = c.motions.len();
    for i in 0..motion_count {
        if i + 1 < motion_count {
            if let Motion::BlendTree(tree) = &mut c.motions[i] {
                tree.children.push(ChildMotion::of(MotionId(i as u32 + 1)));
            }
        }
    }

    for (i, &(owner, n)) in shape.states.iter().enumerate() {
        let state = c.add_state_to(
            MachineId((owner % machine_count) as u32),
            State::named(name(n)),
            Vec3::default(),
        );
        if let (Some(Some(m)), true) = (shape.state_motions.get(i), motion_count > 0) {
            c.states[state.index()].motion = Some(MotionId((m % motion_count) as u32));
        }
    }
    let state_count = c.states.len();

    for &(src, to_machine, dest) in &shape.transitions {
        let transition = if to_machine {
            Transition::to_machine(MachineId((dest % machine_count) as u32))
        } else {
            Transition::to_state(StateId((dest % state_count) as u32))
        };
        c.states[src % state_count].transitions.push(transition);
    }

    for &(owner, source, dest) in &shape.machine_edges {
        let source = MachineId((source % machine_count) as u32);
        let transition = Transition::to_state(StateId((dest % state_count) as u32));
        let owner = &mut c.machines[owner % machine_count];
        match owner.machine_transitions.iter_mut().find(|set| set.source == source) {
            Some(set) => set.transitions.push(transition),
            None => owner.machine_transitions.push(MachineTransitions {
                source,
                transitions: vec![transition],
            }),
        }
    }

    for (m, default) in shape.defaults.iter().enumerate().take(machine_count) {
        if let Some(d) = default {
            c.machines[m].default_state = Some(StateId((d % state_count) as u32));
        }
    }
    c
}

/// Split every `objectCache["X"]` occurrence into writes and reads.
fn cache_keys(source: &str) -> (HashSet<&str>, Vec<&str>) {
    const OPEN: &str = "objectCache[\"";
    let mut writes = HashSet::new();
    let mut reads = Vec::new();
    let mut rest = source;
    while let Some(pos) = rest.find(OPEN) {
        let after = &rest[pos + OPEN.len()..];
        let Some(end) = after.find("\"]") else { break };
        let key = &after[..end];
        let tail = &after[end + 2..];
        if tail.starts_with(" = ") {
            writes.insert(key);
        } else {
            reads.push(key);
        }
        rest = tail;
    }
    (writes, reads)
}

// ── Properties ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn generation_is_deterministic(shape in arb_shape()) {
        let c = build(&shape);
        let first = codegen(&c, &GenOptions::default()).unwrap();
        let second = codegen(&c, &GenOptions::default()).unwrap();
        prop_assert_eq!(first.source, second.source);
        prop_assert_eq!(first.machine_pairs, second.machine_pairs);
    }

    #[test]
    fn identifiers_are_unique(shape in arb_shape()) {
        let c = build(&shape);
        let generated = codegen(&c, &GenOptions::default()).unwrap();
        let mut seen = HashSet::new();
        for record in &generated.names {
            prop_assert!(
                seen.insert(record.ident.clone()),
                "duplicate identifier {}", record.ident
            );
        }
        // Every machine and state is reachable, so all of them are named.
        let named_states = generated.names.iter().filter(|r| r.kind == "State").count();
        prop_assert_eq!(named_states, c.states.len());
    }

    #[test]
    fn every_cache_read_has_a_write(shape in arb_shape()) {
        let c = build(&shape);
        let generated = codegen(&c, &GenOptions::default()).unwrap();
        let (writes, reads) = cache_keys(&generated.source);
        for key in reads {
            prop_assert!(writes.contains(key), "read of {} is never written", key);
        }
    }

    #[test]
    fn pair_count_matches_stored_sets(shape in arb_shape()) {
        let c = build(&shape);
        let generated = codegen(&c, &GenOptions::default()).unwrap();
        let stored: usize = c
            .machines
            .iter()
            .map(|m| m.machine_transitions.iter().filter(|s| !s.transitions.is_empty()).count())
            .sum();
        prop_assert_eq!(generated.machine_pairs.len(), stored);
    }
}
