//! Benchmarks for tensegrity growth and the scalar physics engine.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use pretenst::{
    compute::{ScalarEngine, Stage, Tensegrity},
    schema::{
        FabricConfig, FaceName, GrowthConfig, MarkAction, PhysicsConfig, Tenscript, TenscriptNode,
    },
};

fn quick_physics() -> PhysicsConfig {
    PhysicsConfig {
        pretenst_countdown: 100,
        ..Default::default()
    }
}

fn quick_fabric() -> FabricConfig {
    FabricConfig {
        interval_countdown: 100.0,
        ..Default::default()
    }
}

fn column(steps: u32) -> Tenscript {
    Tenscript::new("column", TenscriptNode::new(steps))
}

fn arch(steps: u32) -> Tenscript {
    let tree = TenscriptNode::new(0)
        .branch(FaceName::A, TenscriptNode::new(steps).mark(FaceName::A, 1))
        .branch(FaceName::B, TenscriptNode::new(steps).mark(FaceName::A, 1));
    Tenscript::new("arch", tree).with_mark(1, MarkAction::Join)
}

fn tensegrity(tenscript: Tenscript) -> Tensegrity<ScalarEngine> {
    Tensegrity::new(
        ScalarEngine::new(quick_physics()),
        tenscript,
        quick_fabric(),
        GrowthConfig::default(),
    )
    .expect("valid tenscript")
}

/// Iterate to Pretenst, requesting each stage as soon as the previous settles.
fn settle(tensegrity: &mut Tensegrity<ScalarEngine>) {
    while tensegrity.stage() != Stage::Pretenst {
        match tensegrity.iterate().expect("iterate") {
            Stage::Shaping => tensegrity.request_stage(Stage::Slack).expect("slack"),
            Stage::Slack => tensegrity
                .request_stage(Stage::Pretensing)
                .expect("pretensing"),
            _ => {}
        }
    }
}

fn bench_grow_column(c: &mut Criterion) {
    let mut group = c.benchmark_group("grow_column");
    group.sample_size(10);

    for steps in [1, 4, 8, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(steps), &steps, |b, &steps| {
            b.iter(|| {
                let mut tensegrity = tensegrity(column(steps));
                while tensegrity.stage() == Stage::Growing {
                    tensegrity.iterate().expect("iterate");
                }
                black_box(tensegrity.fabric().joint_count())
            });
        });
    }

    group.finish();
}

fn bench_settle_arch(c: &mut Criterion) {
    let mut group = c.benchmark_group("settle_arch");
    group.sample_size(10);

    for steps in [2, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(steps), &steps, |b, &steps| {
            b.iter(|| {
                let mut tensegrity = tensegrity(arch(steps));
                settle(&mut tensegrity);
                black_box(tensegrity.fabric().stats())
            });
        });
    }

    group.finish();
}

fn bench_pretenst_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("pretenst_iterate");

    for steps in [4, 16, 32] {
        let mut tensegrity = tensegrity(column(steps));
        settle(&mut tensegrity);
        let intervals = tensegrity.fabric().interval_count();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{} intervals", intervals)),
            &intervals,
            |b, _| {
                b.iter(|| {
                    black_box(tensegrity.iterate().expect("iterate"));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_grow_column,
    bench_settle_arch,
    bench_pretenst_iterate
);
criterion_main!(benches);
