use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use mizu_common::Bounds;
use mizu_kernel::{SimConfig, World};
use mizu_persist::{Snapshot, SnapshotStore, WorldStore};
use mizu_render::{AsciiRenderer, Renderer};
use mizu_tools::PopulationInspector;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mizu", about = "H + O -> H2O particle simulation")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// World set-up shared by every simulating command.
#[derive(Args, Debug, Clone)]
struct SimArgs {
    /// Simulation area width
    #[arg(long, default_value = "800")]
    width: f64,
    /// Simulation area height
    #[arg(long, default_value = "600")]
    height: f64,
    /// Number of hydrogen atoms
    #[arg(long = "hydrogen", default_value = "60")]
    hydrogen: usize,
    /// Number of oxygen atoms
    #[arg(long = "oxygen", default_value = "30")]
    oxygen: usize,
    /// RNG seed for deterministic runs
    #[arg(short, long, default_value = "42")]
    seed: u64,
    /// Size multiplier, overrides the config file
    #[arg(long)]
    scale: Option<f64>,
    /// JSON file with simulation constants
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and default constants
    Info,
    /// Run the simulation and print a summary
    Run {
        #[command(flatten)]
        sim: SimArgs,
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "600")]
        ticks: u64,
        /// Print an ASCII frame every N ticks
        #[arg(long)]
        ascii: Option<u64>,
        /// ASCII frame width in characters
        #[arg(long, default_value = "80")]
        cols: usize,
        /// ASCII frame height in characters
        #[arg(long, default_value = "24")]
        rows: usize,
    },
    /// Check that two runs from the same seed stay identical
    Replay {
        #[command(flatten)]
        sim: SimArgs,
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "600")]
        ticks: u64,
    },
    /// Persist a run to disk, reload it and compare
    Snapshot {
        #[command(flatten)]
        sim: SimArgs,
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "300")]
        ticks: u64,
        /// Store directory
        #[arg(long, default_value = "mizu-store")]
        dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            let cfg = SimConfig::default();
            println!("mizu v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "sizes: H={} H2={} O={} H2O={}..{}",
                cfg.hydrogen_size,
                cfg.merged_hydrogen_size,
                cfg.oxygen_size,
                cfg.droplet_base,
                cfg.droplet_base + cfg.droplet_spread
            );
            println!(
                "motion: impulse={} max_speed={} fall_rate={}",
                cfg.impulse, cfg.max_speed, cfg.fall_rate
            );
        }
        Commands::Run {
            sim,
            ticks,
            ascii,
            cols,
            rows,
        } => {
            let mut world = build_world(&sim)?;
            let renderer = AsciiRenderer::new(cols, rows);
            for _ in 0..ticks {
                let frame = world.step()?;
                if let Some(every) = ascii.filter(|n| *n > 0) {
                    if frame.tick % every == 0 {
                        println!("--- tick {} ---", frame.tick);
                        println!("{}", renderer.render(&frame));
                    }
                }
            }
            println!("{}", PopulationInspector::summary(&world));
        }
        Commands::Replay { sim, ticks } => {
            println!("Deterministic replay: seed={}, ticks={ticks}", sim.seed);
            let mut first = build_world(&sim)?;
            let mut second = build_world(&sim)?;
            let mut diverged_at = None;
            for _ in 0..ticks {
                first.step()?;
                second.step()?;
                if diverged_at.is_none() && first.state_hash() != second.state_hash() {
                    diverged_at = Some(first.tick());
                }
            }
            println!("Run 1:  {}", PopulationInspector::summary(&first));
            println!("Run 2:  {}", PopulationInspector::summary(&second));
            match diverged_at {
                None => println!("Match: OK"),
                Some(tick) => bail!("runs diverged at tick {tick}"),
            }
        }
        Commands::Snapshot { sim, ticks, dir } => {
            let mut world = build_world(&sim)?;
            let half = ticks / 2;
            world.advance_to(half)?;

            // In-memory rollback point halfway through.
            let mut memory = SnapshotStore::new();
            memory.take_snapshot(&mut world);

            let mut store = WorldStore::open(&dir)
                .with_context(|| format!("opening store at {}", dir.display()))?;
            store.take_snapshot(&mut world)?;
            world.advance_to(ticks)?;
            store.append_events(&world.drain_events())?;
            store.verify_integrity()?;

            let loaded = WorldStore::open(&dir)?.load_latest()?;
            let snap = Snapshot::capture(&loaded);
            println!(
                "Stored: tick={}, hash={:#018x}, valid={}",
                snap.tick,
                loaded.state_hash(),
                snap.verify()
            );
            if loaded.state_hash() != world.state_hash() {
                bail!("reloaded world does not match the live run");
            }
            println!("Reload: OK ({})", dir.display());

            if let Some(rolled_back) = memory.rollback(0) {
                println!(
                    "Rollback: {}",
                    PopulationInspector::summary(&rolled_back)
                );
            }
        }
    }

    Ok(())
}

fn build_world(sim: &SimArgs) -> anyhow::Result<World> {
    let mut config = match &sim.config {
        Some(path) => load_config(path)?,
        None => SimConfig::default(),
    };
    if let Some(scale) = sim.scale {
        config.scale = scale;
    }
    let bounds = Bounds::new(sim.width, sim.height)?;
    let mut world = World::with_seed(bounds, config, sim.seed)?;
    world.init(sim.hydrogen, sim.oxygen)?;
    info!(seed = sim.seed, "simulation ready");
    Ok(world)
}

fn load_config(path: &Path) -> anyhow::Result<SimConfig> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: SimConfig = serde_json::from_reader(file)
        .with_context(|| format!("parsing config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
