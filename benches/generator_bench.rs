use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ctrlgen::codegen::{codegen, GenOptions};
use ctrlgen::model::*;
use ctrlgen::naming::NameTable;
use ctrlgen::pipeline;
use std::path::Path;

// KPI-aligned benchmark scenarios.

fn fixture_controller() -> Controller {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("locomotion.json");
    pipeline::load_controller(&path).expect("benchmark fixture must load")
}

/// Synthetic controller: `layers` layers, each a root machine with `subs`
/// sub-machines of `states` states. Every state links to the next one in the
/// following sub-machine, wrapping to the first layer, so wiring crosses
/// factories and some of it is deferred.
fn generate_scaling_controller(layers: usize, subs: usize, states: usize) -> Controller {
    let mut c = Controller::named("Scaling");
    let mut all_states = Vec::new();
    let mut all_subs = Vec::new();

    for l in 0..layers {
        let root = c.add_machine(StateMachine::named(format!("Layer{l}")));
        c.add_layer(Layer {
            name: format!("Layer{l}"),
            machine: root,
            ..Layer::default()
        });
        for s in 0..subs {
            let sub = c.add_machine_to(root, StateMachine::named(format!("Sub{s}")), Vec3::default());
            all_subs.push(sub);
            for i in 0..states {
                let clip = c.add_motion(Motion::Clip(Clip::named(format!("Clip{}", i % 4))));
                let mut state = State::named(format!("State{i}"));
                state.motion = Some(clip);
                all_states.push(c.add_state_to(sub, state, Vec3(i as f32 * 50.0, 0.0, 0.0)));
            }
        }
    }

    for (i, &state) in all_states.iter().enumerate() {
        let next = all_states[(i + states) % all_states.len()];
        c.states[state.index()].transitions.push(Transition {
            duration: 0.1,
            ..Transition::to_state(next)
        });
    }
    for pair in all_subs.windows(2) {
        c.machines[pair[0].index()].machine_transitions.push(MachineTransitions {
            source: pair[1],
            transitions: vec![Transition::to_machine(pair[1])],
        });
    }
    c
}

// KPI: end-to-end generation latency for the reference fixture.
fn bench_kpi_fixture_latency(c: &mut Criterion) {
    let controller = fixture_controller();
    let opts = GenOptions::default();
    c.bench_function("kpi/fixture_latency", |b| {
        b.iter(|| {
            let generated = codegen(black_box(&controller), &opts).expect("fixture must generate");
            black_box(generated);
        });
    });
}

// KPI: generation scaling vs graph size.
fn bench_kpi_generation_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/generation_scaling");
    let opts = GenOptions::default();

    for (layers, subs, states) in [(1_usize, 1_usize, 8_usize), (2, 4, 8), (4, 8, 16), (8, 8, 32)] {
        let controller = generate_scaling_controller(layers, subs, states);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}states", layers * subs * states)),
            &controller,
            |b, controller| {
                b.iter(|| {
                    let generated =
                        codegen(black_box(controller), &opts).expect("scenario must generate");
                    black_box(generated.source.len());
                });
            },
        );
    }

    group.finish();
}

// KPI: identifier allocation on a heavily colliding name set.
fn bench_kpi_name_allocation(c: &mut Criterion) {
    let controller = generate_scaling_controller(4, 8, 16);
    c.bench_function("kpi/name_allocation", |b| {
        b.iter(|| {
            let mut names = NameTable::new(&controller);
            for (i, state) in controller.states.iter().enumerate() {
                let node = ctrlgen::id::NodeRef::State(ctrlgen::id::StateId(i as u32));
                let _ = names.allocate(node, black_box(&state.name), ctrlgen::id::FactoryId::Entry);
            }
            black_box(names.len());
        });
    });
}

criterion_group!(
    benches,
    bench_kpi_fixture_latency,
    bench_kpi_generation_scaling,
    bench_kpi_name_allocation,
);
criterion_main!(benches);
