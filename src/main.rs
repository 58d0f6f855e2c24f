//! Pretenst CLI - Grow and evolve tensegrities from JSON experiments.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use cgmath::Point3;
use pretenst::{
    compute::{
        InstancePool, ScalarEngine, Stage, Tensegrity,
        evolution::{DirectoryGenomeStore, Population},
    },
    schema::{EvolutionConfig, Experiment},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <experiment.json> [ticks]", args[0]);
        eprintln!();
        eprintln!("Grow a tensegrity from a JSON experiment and evolve its gait.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  experiment.json  Path to experiment file");
        eprintln!("  ticks            Maximum physics ticks for growth (default: 100000)");
        eprintln!();
        eprintln!("Example experiment is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_experiment();
        return;
    }

    let experiment_path = PathBuf::from(&args[1]);
    let ticks: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100_000);

    let experiment_str = fs::read_to_string(&experiment_path).unwrap_or_else(|e| {
        eprintln!("Error reading experiment file: {}", e);
        std::process::exit(1);
    });

    let experiment: Experiment = serde_json::from_str(&experiment_str).unwrap_or_else(|e| {
        eprintln!("Error parsing experiment: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = experiment.validate() {
        eprintln!("Invalid experiment: {}", e);
        std::process::exit(1);
    }

    println!("Pretenst");
    println!("========");
    println!("Tenscript: {}", experiment.tenscript.name);
    println!("Steps: {}", experiment.tenscript.tree.total_steps());
    println!("Max ticks: {}", ticks);
    println!();

    let engine = ScalarEngine::new(experiment.physics.clone());
    let mut tensegrity = Tensegrity::from_experiment(engine, &experiment).unwrap_or_else(|e| {
        eprintln!("Error starting growth: {}", e);
        std::process::exit(1);
    });

    println!("Growing...");
    let start = Instant::now();
    let mut tick = 0;
    while tensegrity.stage() != Stage::Pretenst && tick < ticks {
        let stage = tensegrity.iterate().unwrap_or_else(|e| {
            eprintln!("Error at tick {}: {}", tick, e);
            std::process::exit(1);
        });
        let next = match stage {
            Stage::Shaping => Some(Stage::Slack),
            Stage::Slack => Some(Stage::Pretensing),
            _ => None,
        };
        if let Some(next) = next {
            println!("  Tick {}: {:?} -> {:?}", tick, stage, next);
            if let Err(e) = tensegrity.request_stage(next) {
                eprintln!("Error requesting {:?}: {}", next, e);
                std::process::exit(1);
            }
        }
        tick += 1;
    }

    let elapsed = start.elapsed();
    let stats = tensegrity.fabric().stats();
    println!();
    println!("Fabric after {} ticks ({:?}):", tick, tensegrity.stage());
    println!("  Bricks: {}", tensegrity.growth().bricks() + 1);
    println!("  Joints: {}", stats.joint_count);
    println!("  Faces: {}", stats.face_count);
    println!(
        "  Pushes: {} [{:.4}, {:.4}]",
        stats.push_count, stats.push_range.0, stats.push_range.1
    );
    println!(
        "  Pulls: {} [{:.4}, {:.4}]",
        stats.pull_count, stats.pull_range.0, stats.pull_range.1
    );
    println!("  Height: {:.4}", stats.max_height);
    println!(
        "Time: {:.2}s ({:.1} ticks/s)",
        elapsed.as_secs_f32(),
        tick as f32 / elapsed.as_secs_f32()
    );

    if tensegrity.stage() != Stage::Pretenst {
        eprintln!("Structure did not settle within {} ticks", ticks);
        std::process::exit(1);
    }

    if let Some(evolution) = experiment.evolution.clone() {
        println!();
        evolve(&experiment, evolution, &tensegrity, &experiment_path);
    }
}

fn evolve(
    experiment: &Experiment,
    config: EvolutionConfig,
    tensegrity: &Tensegrity<ScalarEngine>,
    experiment_path: &Path,
) {
    let leader = tensegrity.leader().unwrap_or_else(|e| {
        eprintln!("Error capturing leader: {}", e);
        std::process::exit(1);
    });
    let store_dir = experiment_path.with_extension("genes");
    let store = DirectoryGenomeStore::new(&store_dir).unwrap_or_else(|e| {
        eprintln!("Error creating genome store {}: {}", store_dir.display(), e);
        std::process::exit(1);
    });
    let physics = experiment.physics.clone();
    let mut pool = InstancePool::new(config.max_instances, move || {
        ScalarEngine::new(physics.clone())
    });
    let target = Point3::new(
        leader.midpoint.x + experiment.target_distance,
        0.0,
        leader.midpoint.z,
    );

    println!(
        "Evolving {} ({} winners, {} challengers, cycles {:?})",
        experiment.tenscript.name,
        config.persistent_population,
        config.challenger_population,
        config.cycle_pattern
    );
    let mut population = Population::new(
        config,
        leader,
        target,
        experiment.tenscript.name.clone(),
        store,
        &mut pool,
    )
    .unwrap_or_else(|e| {
        eprintln!("Error building population: {}", e);
        std::process::exit(1);
    });

    let mut snapshots = population.subscribe();
    let start = Instant::now();
    loop {
        let phase = match population.iterate(&mut pool) {
            Ok(phase) => phase,
            Err(e) => {
                eprintln!("Evolution error: {}", e);
                population.release(&mut pool);
                std::process::exit(1);
            }
        };
        if snapshots.has_changed().unwrap_or(false)
            && let Some(snapshot) = snapshots.borrow_and_update().last()
            && let Some(best) = snapshot.evolvers.first()
        {
            println!(
                "  Tier {} cycle {}: best {} at {:.3} ({} tosses)",
                snapshot.tier, snapshot.cycle, best.name, best.proximity, best.tosses
            );
        }
        if phase.is_terminal() {
            println!();
            println!(
                "Finished in {:?} after {:.2}s",
                phase,
                start.elapsed().as_secs_f32()
            );
            break;
        }
    }
    println!("Genomes stored in {}", store_dir.display());
    population.release(&mut pool);
}

fn print_example_experiment() {
    let experiment = Experiment::default();

    println!("Example experiment (experiment.json):");
    match serde_json::to_string_pretty(&experiment) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing example: {}", e),
    }
}
