//! Quick evolution performance test

use cgmath::Point3;
use pretenst::{
    compute::{
        InstancePool, ScalarEngine, Stage, Tensegrity,
        evolution::{MemoryGenomeStore, Population},
    },
    schema::{
        EvolutionConfig, FabricConfig, GrowthConfig, PhysicsConfig, Tenscript, TenscriptNode,
    },
};
use std::time::Instant;

fn physics() -> PhysicsConfig {
    PhysicsConfig {
        pretenst_countdown: 100,
        ..Default::default()
    }
}

fn settled_column(steps: u32) -> Tensegrity<ScalarEngine> {
    let fabric = FabricConfig {
        interval_countdown: 100.0,
        ..Default::default()
    };
    let mut tensegrity = Tensegrity::new(
        ScalarEngine::new(physics()),
        Tenscript::new("column", TenscriptNode::new(steps)),
        fabric,
        GrowthConfig::default(),
    )
    .expect("valid tenscript");
    while tensegrity.stage() != Stage::Pretenst {
        match tensegrity.iterate().expect("iterate") {
            Stage::Shaping => tensegrity.request_stage(Stage::Slack).expect("slack"),
            Stage::Slack => tensegrity
                .request_stage(Stage::Pretensing)
                .expect("pretensing"),
            _ => {}
        }
    }
    tensegrity
}

/// Run a population to a terminal phase, returning (iterations, best proximity).
fn run(config: EvolutionConfig, tensegrity: &Tensegrity<ScalarEngine>) -> (usize, f32) {
    let leader = tensegrity.leader().expect("pretenst leader");
    let target = Point3::new(leader.midpoint.x + 7.0, 0.0, leader.midpoint.z);
    let mut pool = InstancePool::new(config.max_instances, || ScalarEngine::new(physics()));
    let mut population = Population::new(
        config,
        leader,
        target,
        "column",
        MemoryGenomeStore::new(),
        &mut pool,
    )
    .expect("population");

    let snapshots = population.subscribe();
    let mut iterations = 0;
    while !population.iterate(&mut pool).expect("iterate").is_terminal() {
        iterations += 1;
    }
    let best = snapshots
        .borrow()
        .last()
        .and_then(|snapshot| snapshot.evolvers.first().map(|evolver| evolver.proximity))
        .unwrap_or(f32::NAN);
    population.release(&mut pool);
    (iterations, best)
}

fn main() {
    println!("=== Evolution Performance Test ===\n");

    // Test different structure sizes
    for steps in [2, 4, 8] {
        println!("Column of {} bricks", steps + 1);

        let start = Instant::now();
        let tensegrity = settled_column(steps);
        let grown = start.elapsed();

        let config = EvolutionConfig {
            cycle_pattern: vec![2, 3],
            persistent_population: 4,
            challenger_population: 8,
            ticks_per_cycle: 500,
            random_seed: Some(42),
            ..Default::default()
        };

        let start = Instant::now();
        let (iterations, best) = run(config, &tensegrity);
        let elapsed = start.elapsed();

        println!("  Intervals:      {}", tensegrity.fabric().interval_count());
        println!("  Grown in:       {:.2}s", grown.as_secs_f64());
        println!("  Iterations:     {}", iterations);
        println!("  Elapsed:        {:.2}s", elapsed.as_secs_f64());
        println!(
            "  Iterations/sec: {:.1}",
            iterations as f64 / elapsed.as_secs_f64()
        );
        println!("  Best proximity: {:.4}", best);
        println!();
    }

    println!("=== Scalability Test (fixed 4-step column) ===\n");

    let tensegrity = settled_column(4);
    // Test different challenger counts
    for challengers in [4, 8, 16, 32] {
        let config = EvolutionConfig {
            cycle_pattern: vec![2],
            persistent_population: 4,
            challenger_population: challengers,
            ticks_per_cycle: 500,
            max_instances: 4 + challengers,
            random_seed: Some(42),
            ..Default::default()
        };

        let start = Instant::now();
        let (iterations, _) = run(config, &tensegrity);
        let elapsed = start.elapsed();

        println!(
            "Challengers {}: {} iterations in {:.2}s ({:.1} iterations/sec)",
            challengers,
            iterations,
            elapsed.as_secs_f64(),
            iterations as f64 / elapsed.as_secs_f64()
        );
    }
}
