//! Entropy Audit CLI - Run audited microcosm simulations headless.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use entropy_audit::{
    compute::Simulation,
    recording::{RecorderConfig, RunRecorder},
    schema::SimulationConfig,
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json|--default> [steps] [out_dir]", args[0]);
        eprintln!();
        eprintln!("Run an audited microcosm simulation.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to simulation configuration file");
        eprintln!("  --default    Use the built-in reference configuration");
        eprintln!("  steps        Number of simulation ticks (default: 1000)");
        eprintln!("  out_dir      Directory for run folders (default: runs)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config = if args[1] == "--default" {
        SimulationConfig::default()
    } else {
        load_config(Path::new(&args[1]))
    };
    let steps: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1000);
    let out_dir = PathBuf::from(args.get(3).map(String::as_str).unwrap_or("runs"));

    let mut sim = Simulation::new(config).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    let run_id = format!("run_{}", sim.seed());
    let mut recorder = RunRecorder::new(
        out_dir.join(&run_id),
        &run_id,
        sim.config(),
        RecorderConfig::default(),
    )
    .unwrap_or_else(|e| {
        eprintln!("Error creating run folder: {}", e);
        std::process::exit(1);
    });

    let genesis = sim.snapshot();
    println!("Entropy Audit Simulation");
    println!("========================");
    println!("Grid: {}x{}", sim.fields().width(), sim.fields().height());
    println!(
        "Fields: {}",
        sim.fields().iter().map(|f| f.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    println!("Species: {}", genesis.species.len());
    println!("Agents: {}", genesis.total_population);
    println!("Seed: {}", sim.seed());
    println!("Steps: {}", steps);
    println!("Output: {}", recorder.dir().display());
    println!();

    println!("Running simulation...");
    let start = Instant::now();

    for i in 0..steps {
        if sim.run(1) == 0 {
            println!("  Extinction at tick {}", sim.tick());
            break;
        }

        let record = sim.snapshot();
        if let Err(e) = recorder.record_step(&record) {
            eprintln!("Error writing step record: {}", e);
            std::process::exit(1);
        }

        if sim.audit_due() {
            let report = sim.audit_report();
            if let Err(e) = recorder.record_audit(&report) {
                eprintln!("Error writing audit: {}", e);
                std::process::exit(1);
            }
        }

        // Print progress every 10%
        if (i + 1) % (steps / 10).max(1) == 0 {
            let elapsed = start.elapsed().as_secs_f32();
            println!(
                "  Tick {}/{}: population={}, avg_age={:.1}, {:.1} ticks/s",
                i + 1,
                steps,
                record.total_population,
                record.avg_age,
                (i + 1) as f32 / elapsed
            );
        }
    }

    let elapsed = start.elapsed();
    let report = sim.audit_report();
    let last = sim.snapshot();

    let stats = recorder
        .record_audit(&report)
        .and_then(|_| recorder.finish(sim.seed(), &last))
        .unwrap_or_else(|e| {
            eprintln!("Error finishing recording: {}", e);
            std::process::exit(1);
        });

    println!();
    println!("Final state (tick {}):", last.tick);
    println!("  Population: {}", last.total_population);
    for (id, species) in &last.species {
        println!(
            "  {}: {} alive, deaths starvation={} toxicity={} senescence={} heat={}",
            id,
            species.population,
            species.deaths.starvation,
            species.deaths.toxicity,
            species.deaths.senescence,
            species.deaths.heat
        );
    }
    println!();
    println!(
        "Mass audit:   {:?} (error {:.3e})",
        report.mass.status, report.mass.error
    );
    println!(
        "Energy audit: {:?} (error {:.3e})",
        report.energy.status, report.energy.error
    );
    println!("Recording: {}", stats);
    println!(
        "Time: {:.2}s ({:.1} ticks/s)",
        elapsed.as_secs_f32(),
        last.tick as f32 / elapsed.as_secs_f32()
    );
}

fn load_config(path: &Path) -> SimulationConfig {
    let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    })
}

fn print_example_config() {
    let config = SimulationConfig::default();
    match serde_json::to_string_pretty(&config) {
        Ok(json) => {
            println!("Example configuration (config.json):");
            println!("{}", json);
        }
        Err(e) => {
            eprintln!("Error serializing config: {}", e);
            std::process::exit(1);
        }
    }
}
